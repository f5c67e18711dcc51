use crate::adapters::http::RetryingClient;
use crate::domain::model::{CanonicalDeck, CardEntry, CardMetadata};
use crate::domain::ports::SourceAdapter;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

pub const DEFAULT_GOLDFISH_BASE: &str = "https://www.mtggoldfish.com";
const DEFAULT_DECK_NAME: &str = "MTGGoldfish Deck";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Commander,
    Main,
    Side,
}

struct ArenaPatterns {
    card_line: Regex,
    set_suffix: Regex,
    textarea: Regex,
}

fn patterns() -> &'static ArenaPatterns {
    static PATTERNS: OnceLock<ArenaPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ArenaPatterns {
        card_line: Regex::new(r"^(\d+)x?\s+(.+)$").expect("valid regex"),
        set_suffix: Regex::new(r"\s*\(([A-Za-z0-9]+)\)(?:\s+(\S+))?\s*$").expect("valid regex"),
        textarea: Regex::new(r"(?is)<textarea[^>]*>(.*?)</textarea>").expect("valid regex"),
    })
}

fn decode_entities(text: &str) -> String {
    text.replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// 取出匯出頁面 `<textarea>` 內的 Arena 文字；沒有 textarea 時整個內文就是匯出文字
pub fn extract_arena_text(body: &str) -> String {
    match patterns().textarea.captures(body) {
        Some(caps) => decode_entities(caps[1].trim()),
        None => body.trim().to_string(),
    }
}

/// 拆出 `Name (SET) 123` 尾端的版本資訊
fn split_card_name(raw: &str) -> Option<(String, CardMetadata)> {
    let mut metadata = CardMetadata::default();
    let name = match patterns().set_suffix.captures(raw) {
        Some(caps) => {
            metadata.set_code = caps.get(1).map(|m| m.as_str().to_uppercase());
            metadata.collector_number = caps.get(2).map(|m| m.as_str().to_string());
            raw[..caps.get(0).map(|m| m.start()).unwrap_or(raw.len())].trim()
        }
        None => raw.trim(),
    };

    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), metadata))
}

/// 解析 Arena 匯出格式。
///
/// `Name <牌組名>` 為標頭，`Commander` / `Deck` / `Sideboard` 切換區段，
/// 其餘行為 `<數量> <卡名> [(SET) 編號]`。
pub fn parse_arena(content: &str) -> CanonicalDeck {
    let mut name = DEFAULT_DECK_NAME.to_string();
    let mut section = Section::Main;
    let mut commanders = Vec::new();
    let mut mainboard = Vec::new();
    let mut sideboard = Vec::new();

    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(deck_name) = line.strip_prefix("Name ") {
            name = deck_name.trim().to_string();
            continue;
        }

        match line.to_ascii_lowercase().as_str() {
            "commander" => {
                section = Section::Commander;
                continue;
            }
            "deck" | "main" | "mainboard" => {
                section = Section::Main;
                continue;
            }
            "sideboard" => {
                section = Section::Side;
                continue;
            }
            _ => {}
        }

        let Some(caps) = patterns().card_line.captures(line) else {
            tracing::debug!("Skipping Arena line: {}", line);
            continue;
        };
        let Ok(quantity) = caps[1].parse::<u32>() else {
            continue;
        };
        let Some((card_name, metadata)) = split_card_name(&caps[2]) else {
            tracing::debug!("Skipping card with unusable name: {}", line);
            continue;
        };

        match section {
            Section::Commander => commanders.push(card_name),
            Section::Main => mainboard.push(CardEntry::new(card_name, quantity).with_metadata(metadata)),
            Section::Side => sideboard.push(CardEntry::new(card_name, quantity).with_metadata(metadata)),
        }
    }

    let format_hint = if commanders.is_empty() { "standard" } else { "commander" };
    CanonicalDeck::new(name, Some(format_hint.to_string()), mainboard, sideboard, commanders)
}

/// MTGGoldfish 牌組頁（`https://www.mtggoldfish.com/deck/<數字>`），透過 Arena 匯出取得卡表
pub struct GoldfishAdapter {
    client: RetryingClient,
    base_url: String,
}

impl GoldfishAdapter {
    pub fn new(client: RetryingClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn deck_id(locator: &str) -> Option<String> {
        let url = Url::parse(locator.trim()).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();
        if host != "mtggoldfish.com" && host != "www.mtggoldfish.com" {
            return None;
        }

        let mut segments = url.path_segments()?;
        match (segments.next(), segments.next()) {
            (Some("deck"), Some(id)) if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) => {
                Some(id.to_string())
            }
            _ => None,
        }
    }
}

#[async_trait]
impl SourceAdapter for GoldfishAdapter {
    fn site_name(&self) -> &str {
        "MTGGoldfish"
    }

    fn can_handle(&self, locator: &str) -> bool {
        Self::deck_id(locator).is_some()
    }

    async fn fetch(&self, locator: &str) -> Result<CanonicalDeck> {
        let deck_id = Self::deck_id(locator).ok_or_else(|| {
            EtlError::not_found(format!("Not an MTGGoldfish deck URL: {}", locator))
        })?;

        let export_url = format!("{}/deck/arena_download/{}", self.base_url, deck_id);
        tracing::info!("🌐 Fetching MTGGoldfish deck {}", deck_id);

        let body = self.client.get_text(&export_url).await?;
        let deck = parse_arena(&extract_arena_text(&body));

        // 沒有卡就是錯誤，不產生佔位牌組
        if deck.mainboard.is_empty() && deck.commanders.is_empty() {
            return Err(EtlError::MalformedPayload {
                endpoint: export_url,
                message: "Arena export contained no cards".to_string(),
            });
        }

        tracing::debug!(
            "Parsed Arena export: {} main, {} side, {} commander(s)",
            deck.mainboard.len(),
            deck.sideboard.len(),
            deck.commanders.len()
        );
        Ok(deck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "Name Mono Red Aggro\n\
        Commander\n\
        1 Krenko, Mob Boss (M13) 139\n\
        \n\
        Deck\n\
        4 Lightning Bolt (M10) 146\n\
        20 Mountain\n\
        2 Delver of Secrets // Insectile Aberration (ISD)\n\
        1 X\n\
        \n\
        Sideboard\n\
        2 Smash to Smithereens\n";

    #[test]
    fn test_parse_arena_sections() {
        let deck = parse_arena(EXPORT);

        assert_eq!(deck.name, "Mono Red Aggro");
        assert_eq!(deck.commanders, vec!["Krenko, Mob Boss"]);
        assert_eq!(deck.format_hint.as_deref(), Some("commander"));
        assert_eq!(deck.mainboard.len(), 3);
        assert_eq!(deck.sideboard.len(), 1);

        let bolt = &deck.mainboard[0];
        assert_eq!(bolt.name, "Lightning Bolt");
        assert_eq!(bolt.quantity, 4);
        assert_eq!(bolt.metadata.set_code.as_deref(), Some("M10"));
        assert_eq!(bolt.metadata.collector_number.as_deref(), Some("146"));
    }

    #[test]
    fn test_double_faced_name_kept_for_converter() {
        let deck = parse_arena(EXPORT);
        assert_eq!(deck.mainboard[2].name, "Delver of Secrets // Insectile Aberration");
        assert_eq!(deck.mainboard[2].metadata.set_code.as_deref(), Some("ISD"));
    }

    #[test]
    fn test_long_modal_names_are_kept() {
        let deck = parse_arena("Deck\n1 Kianne, Dean of Substance // Imbraham, Dean of Theory\n20 Island\n");

        assert_eq!(deck.mainboard_count(), 21);
        assert_eq!(
            deck.mainboard[0].name,
            "Kianne, Dean of Substance // Imbraham, Dean of Theory"
        );
    }

    #[test]
    fn test_deck_without_commander_section_is_standard() {
        let deck = parse_arena("4 Opt\n20 Island\n");
        assert_eq!(deck.name, DEFAULT_DECK_NAME);
        assert_eq!(deck.format_hint.as_deref(), Some("standard"));
        assert!(deck.commanders.is_empty());
        assert_eq!(deck.mainboard_count(), 24);
    }

    #[test]
    fn test_textarea_is_extracted_and_decoded() {
        let page = "<html><body><textarea class=\"copy-paste-box\">Deck\n1 Atraxa, Praetors&#39; Voice\n</textarea></body></html>";
        let text = extract_arena_text(page);
        assert_eq!(text, "Deck\n1 Atraxa, Praetors' Voice");
    }

    #[test]
    fn test_deck_id_only_for_numeric_deck_pages() {
        assert_eq!(
            GoldfishAdapter::deck_id("https://www.mtggoldfish.com/deck/300499#paper"),
            Some("300499".to_string())
        );
        assert_eq!(
            GoldfishAdapter::deck_id("https://www.mtggoldfish.com/archetype/standard-izzet#paper"),
            None
        );
        assert_eq!(GoldfishAdapter::deck_id("https://www.mtggoldfish.com/deck/abc"), None);
        assert_eq!(GoldfishAdapter::deck_id("https://moxfield.com/deck/1"), None);
    }
}
