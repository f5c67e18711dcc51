use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 目錄中的一筆牌組（只有中繼資料，沒有卡表）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// 上游的 fileName，作為快取與明細請求的 key
    pub id: String,
    pub name: String,
    pub product_type: String,
    pub release_date: Option<NaiveDate>,
    pub set_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardMetadata {
    pub set_code: Option<String>,
    pub collector_number: Option<String>,
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardEntry {
    pub name: String,
    pub quantity: u32,
    #[serde(default)]
    pub metadata: CardMetadata,
}

impl CardEntry {
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            quantity,
            metadata: CardMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: CardMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// 與來源無關的牌組表示，由目錄明細或各站台 adapter 產生
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalDeck {
    pub name: String,
    pub format_hint: Option<String>,
    pub mainboard: Vec<CardEntry>,
    pub sideboard: Vec<CardEntry>,
    pub commanders: Vec<String>,
}

impl CanonicalDeck {
    /// 空白的指揮官名稱在這裡就被丟掉
    pub fn new(
        name: impl Into<String>,
        format_hint: Option<String>,
        mainboard: Vec<CardEntry>,
        sideboard: Vec<CardEntry>,
        commanders: Vec<String>,
    ) -> Self {
        let commanders = commanders
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        Self {
            name: name.into(),
            format_hint: format_hint.filter(|h| !h.trim().is_empty()),
            mainboard,
            sideboard,
            commanders,
        }
    }

    pub fn mainboard_count(&self) -> u32 {
        self.mainboard.iter().map(|c| c.quantity).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatTag {
    Commander,
    Standard,
    Limited,
    Historic,
    ModernLike,
    Unknown,
}

impl FormatTag {
    /// `Display` 的反向轉換
    pub fn from_label(label: &str) -> Option<Self> {
        [
            FormatTag::Commander,
            FormatTag::Standard,
            FormatTag::Limited,
            FormatTag::Historic,
            FormatTag::ModernLike,
            FormatTag::Unknown,
        ]
        .into_iter()
        .find(|tag| tag.to_string().eq_ignore_ascii_case(label.trim()))
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatTag::Commander => "Commander",
            FormatTag::Standard => "Standard",
            FormatTag::Limited => "Limited",
            FormatTag::Historic => "Historic",
            FormatTag::ModernLike => "Modern-like",
            FormatTag::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCard {
    pub quantity: u32,
    pub name: String,
    pub set_code: Option<String>,
    pub collector_number: Option<String>,
    pub uuid: Option<String>,
}

impl OutputCard {
    pub fn new(quantity: u32, name: impl Into<String>) -> Self {
        Self {
            quantity,
            name: name.into(),
            set_code: None,
            collector_number: None,
            uuid: None,
        }
    }
}

/// 目標格式的牌組：建立一次、寫出一次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDeck {
    pub name: String,
    pub format: FormatTag,
    pub main: Vec<OutputCard>,
    pub side: Vec<OutputCard>,
    pub banner: String,
}

/// 快取資料的新鮮程度
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Cached,
    Stale { reason: String },
}

#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub entries: Vec<CatalogEntry>,
    pub fetched_at: DateTime<Utc>,
    pub freshness: Freshness,
}

impl CatalogSnapshot {
    pub fn is_stale(&self) -> bool {
        matches!(self.freshness, Freshness::Stale { .. })
    }

    pub fn find(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }
}

/// 一次匯出請求：目錄中的 entry id 或外部站台網址
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckRequest {
    Catalog(String),
    Locator(String),
}

impl fmt::Display for DeckRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeckRequest::Catalog(id) => write!(f, "catalog:{}", id),
            DeckRequest::Locator(url) => f.write_str(url),
        }
    }
}
