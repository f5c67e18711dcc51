use crate::adapters::http::RetryingClient;
use crate::domain::model::{CanonicalDeck, CardEntry, CardMetadata};
use crate::domain::ports::SourceAdapter;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use url::Url;

pub const DEFAULT_MOXFIELD_API: &str = "https://api2.moxfield.com/v2";

#[derive(Debug, Deserialize)]
struct MoxfieldDeck {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    commanders: BTreeMap<String, MoxfieldBoardEntry>,
    #[serde(default)]
    mainboard: BTreeMap<String, MoxfieldBoardEntry>,
    #[serde(default)]
    sideboard: BTreeMap<String, MoxfieldBoardEntry>,
}

#[derive(Debug, Deserialize)]
struct MoxfieldBoardEntry {
    #[serde(default = "one")]
    quantity: u32,
    #[serde(default)]
    card: Option<MoxfieldCard>,
}

#[derive(Debug, Deserialize)]
struct MoxfieldCard {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    set: Option<String>,
    #[serde(default)]
    cn: Option<String>,
    #[serde(default)]
    scryfall_id: Option<String>,
}

fn one() -> u32 {
    1
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn board_entries(board: BTreeMap<String, MoxfieldBoardEntry>) -> Vec<CardEntry> {
    board
        .into_iter()
        .filter_map(|(key, entry)| {
            let card = entry.card?;
            let name = non_empty(card.name).unwrap_or(key);
            Some(CardEntry::new(name, entry.quantity).with_metadata(CardMetadata {
                set_code: non_empty(card.set).map(|s| s.to_uppercase()),
                collector_number: non_empty(card.cn),
                uuid: non_empty(card.scryfall_id),
            }))
        })
        .filter(|card| !card.name.trim().is_empty())
        .collect()
}

fn into_canonical(deck_id: &str, deck: MoxfieldDeck) -> CanonicalDeck {
    // 指揮官以 map 的 key 為準
    let commanders = deck.commanders.into_keys().collect();

    CanonicalDeck::new(
        non_empty(deck.name).unwrap_or_else(|| format!("Moxfield {}", deck_id)),
        non_empty(deck.format),
        board_entries(deck.mainboard),
        board_entries(deck.sideboard),
        commanders,
    )
}

/// Moxfield 公開牌組（`https://moxfield.com/decks/<id>`）
pub struct MoxfieldAdapter {
    client: RetryingClient,
    api_base: String,
}

impl MoxfieldAdapter {
    pub fn new(client: RetryingClient, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn deck_id(locator: &str) -> Option<String> {
        let url = Url::parse(locator.trim()).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();
        if host != "moxfield.com" && host != "www.moxfield.com" {
            return None;
        }

        let mut segments = url.path_segments()?;
        match (segments.next(), segments.next()) {
            (Some("decks"), Some(id)) if !id.is_empty() => Some(id.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl SourceAdapter for MoxfieldAdapter {
    fn site_name(&self) -> &str {
        "Moxfield"
    }

    fn can_handle(&self, locator: &str) -> bool {
        Self::deck_id(locator).is_some()
    }

    async fn fetch(&self, locator: &str) -> Result<CanonicalDeck> {
        let deck_id = Self::deck_id(locator)
            .ok_or_else(|| EtlError::not_found(format!("Not a Moxfield deck URL: {}", locator)))?;

        let api_url = format!("{}/decks/all/{}", self.api_base, deck_id);
        tracing::info!("🌐 Fetching Moxfield deck {}", deck_id);

        let deck: MoxfieldDeck = self.client.get_json(&api_url).await?;
        let deck = into_canonical(&deck_id, deck);

        if deck.mainboard.is_empty() && deck.commanders.is_empty() {
            return Err(EtlError::MalformedPayload {
                endpoint: api_url,
                message: "deck has no cards".to_string(),
            });
        }
        Ok(deck)
    }
}
