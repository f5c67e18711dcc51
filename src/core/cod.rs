//! Cockatrice `.cod` 牌組檔的寫出與讀回

use crate::domain::model::{FormatTag, OutputCard, OutputDeck};
use crate::utils::error::{EtlError, Result};
use crate::utils::fs::write_atomic;
use chrono::{DateTime, Local};
use regex::Regex;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const COD_EXTENSION: &str = "cod";
const FALLBACK_FILE_STEM: &str = "imported_deck";
const MAX_FILE_STEM_CHARS: usize = 100;
const TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// 牌組名稱轉成安全的檔名（不含副檔名）
pub fn sanitize_file_stem(deck_name: &str) -> String {
    let mut stem = deck_name
        .replace("Decklist", "")
        .replace(['(', ')'], "")
        .replace(' ', "_")
        .replace(['<', '>', ':', '"', '/', '\\', '|', '?', '*'], "");

    while stem.contains("__") {
        stem = stem.replace("__", "_");
    }
    let stem = stem.trim_matches('_');
    let stem: String = stem.chars().take(MAX_FILE_STEM_CHARS).collect();

    if stem.trim().is_empty() {
        FALLBACK_FILE_STEM.to_string()
    } else {
        stem
    }
}

pub fn file_name_for(deck: &OutputDeck) -> String {
    format!("{}.{}", sanitize_file_stem(&deck.name), COD_EXTENSION)
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn render_zone(out: &mut String, zone: &str, cards: &[OutputCard]) {
    if cards.is_empty() {
        let _ = writeln!(out, "  <zone name=\"{}\"/>", zone);
        return;
    }

    let _ = writeln!(out, "  <zone name=\"{}\">", zone);
    for card in cards {
        let _ = write!(
            out,
            "    <card number=\"{}\" name=\"{}\"",
            card.quantity,
            escape_xml(&card.name)
        );
        if let Some(set_code) = card.set_code.as_deref().filter(|s| !s.is_empty()) {
            let _ = write!(out, " setShortName=\"{}\"", escape_xml(set_code));
        }
        if let Some(number) = card.collector_number.as_deref().filter(|s| !s.is_empty()) {
            let _ = write!(out, " collectorNumber=\"{}\"", escape_xml(number));
        }
        if let Some(uuid) = card.uuid.as_deref().filter(|s| !s.is_empty()) {
            let _ = write!(out, " uuid=\"{}\"", escape_xml(uuid));
        }
        out.push_str("/>\n");
    }
    out.push_str("  </zone>\n");
}

pub fn render(deck: &OutputDeck, loaded_at: DateTime<Local>) -> String {
    let mut out = String::new();
    out.push_str("<?xml version='1.0' encoding='UTF-8'?>\n");
    out.push_str("<cockatrice_deck version=\"1\">\n");
    let _ = writeln!(
        out,
        "  <lastLoadedTimestamp>{}</lastLoadedTimestamp>",
        loaded_at.format(TIMESTAMP_FORMAT)
    );
    let _ = writeln!(out, "  <deckname>{}</deckname>", escape_xml(&deck.name));
    out.push_str("  <comments></comments>\n");
    let _ = writeln!(out, "  <bannerCard>{}</bannerCard>", escape_xml(&deck.banner));

    if deck.format == FormatTag::Unknown {
        out.push_str("  <tags/>\n");
    } else {
        let _ = writeln!(out, "  <tags>\n    <tag>{}</tag>\n  </tags>", deck.format);
    }

    render_zone(&mut out, "main", &deck.main);
    render_zone(&mut out, "side", &deck.side);
    out.push_str("</cockatrice_deck>\n");
    out
}

/// 寫出 `<destination>/<安全檔名>.cod`，目錄不存在時會建立。
///
/// 先寫暫存檔再 rename，中途失敗不會在目標路徑留下不完整的檔案。
pub fn write(deck: &OutputDeck, destination: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(destination)?;

    let path = destination.join(file_name_for(deck));
    let xml = render(deck, Local::now());
    write_atomic(&path, xml.as_bytes())?;

    tracing::info!(
        "💾 Wrote '{}' ({} main, {} side) to {}",
        deck.name,
        deck.main.len(),
        deck.side.len(),
        path.display()
    );
    Ok(path)
}

struct CodPatterns {
    deck_name: Regex,
    banner: Regex,
    tag: Regex,
    zone: Regex,
    card: Regex,
    attr: Regex,
}

fn patterns() -> &'static CodPatterns {
    static PATTERNS: OnceLock<CodPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| CodPatterns {
        deck_name: Regex::new(r"(?s)<deckname>(.*?)</deckname>").expect("valid regex"),
        banner: Regex::new(r"(?s)<bannerCard[^>]*>(.*?)</bannerCard>").expect("valid regex"),
        tag: Regex::new(r"(?s)<tag>(.*?)</tag>").expect("valid regex"),
        zone: Regex::new(r#"(?s)<zone name="([^"]*)">(.*?)</zone>"#).expect("valid regex"),
        card: Regex::new(r"<card\s([^>]*?)/?>").expect("valid regex"),
        attr: Regex::new(r#"(\w+)="([^"]*)""#).expect("valid regex"),
    })
}

fn parse_card(attrs: &str, path: &Path) -> Result<OutputCard> {
    let mut card = OutputCard::new(0, "");
    for caps in patterns().attr.captures_iter(attrs) {
        let value = unescape_xml(&caps[2]);
        match &caps[1] {
            "number" => {
                card.quantity = value.parse().map_err(|_| EtlError::MalformedPayload {
                    endpoint: path.display().to_string(),
                    message: format!("invalid card count '{}'", value),
                })?
            }
            "name" => card.name = value,
            "setShortName" => card.set_code = Some(value),
            "collectorNumber" => card.collector_number = Some(value),
            "uuid" => card.uuid = Some(value),
            _ => {}
        }
    }

    if card.name.is_empty() {
        return Err(EtlError::MalformedPayload {
            endpoint: path.display().to_string(),
            message: "card without a name".to_string(),
        });
    }
    Ok(card)
}

/// 讀回 `.cod` 檔，主要用來檢查輸出
pub fn read(path: &Path) -> Result<OutputDeck> {
    let xml = std::fs::read_to_string(path)?;
    let patterns = patterns();

    if !xml.contains("<cockatrice_deck") {
        return Err(EtlError::MalformedPayload {
            endpoint: path.display().to_string(),
            message: "not a Cockatrice deck file".to_string(),
        });
    }

    let name = patterns
        .deck_name
        .captures(&xml)
        .map(|c| unescape_xml(c[1].trim()))
        .unwrap_or_default();
    let banner = patterns
        .banner
        .captures(&xml)
        .map(|c| unescape_xml(c[1].trim()))
        .unwrap_or_default();
    let format = patterns
        .tag
        .captures_iter(&xml)
        .find_map(|c| FormatTag::from_label(&unescape_xml(&c[1])))
        .unwrap_or(FormatTag::Unknown);

    let mut main = Vec::new();
    let mut side = Vec::new();
    for zone in patterns.zone.captures_iter(&xml) {
        let target = match &zone[1] {
            "main" => &mut main,
            "side" => &mut side,
            other => {
                tracing::debug!("Skipping unknown zone '{}'", other);
                continue;
            }
        };
        for card in patterns.card.captures_iter(&zone[2]) {
            target.push(parse_card(&card[1], path)?);
        }
    }

    Ok(OutputDeck {
        name,
        format,
        main,
        side,
        banner,
    })
}
