use crate::adapters::http::RetryingClient;
use crate::core::cache::{CacheKey, CacheRecord, CacheStore};
use crate::core::filters;
use crate::core::flight::SingleFlight;
use crate::domain::model::{
    CanonicalDeck, CardEntry, CardMetadata, CatalogEntry, CatalogSnapshot, Freshness,
};
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CATALOG_ENDPOINT: &str = "https://mtgjson.com/api/v5/";
pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// MTGJSON 回應格式
mod mtgjson {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct Envelope<T> {
        pub data: T,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DeckListEntry {
        pub file_name: String,
        pub name: String,
        #[serde(rename = "type", default)]
        pub product_type: String,
        #[serde(default)]
        pub release_date: Option<String>,
        #[serde(default)]
        pub code: String,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DeckDetail {
        #[serde(default)]
        pub name: Option<String>,
        #[serde(rename = "type", default)]
        pub product_type: Option<String>,
        #[serde(default)]
        pub commander: Vec<DeckCard>,
        #[serde(default)]
        pub main_board: Vec<DeckCard>,
        #[serde(default)]
        pub side_board: Vec<DeckCard>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DeckCard {
        pub name: String,
        #[serde(default = "one")]
        pub count: u32,
        #[serde(default)]
        pub set_code: Option<String>,
        #[serde(default)]
        pub number: Option<String>,
        #[serde(default)]
        pub uuid: Option<String>,
    }

    fn one() -> u32 {
        1
    }
}

impl From<mtgjson::DeckListEntry> for CatalogEntry {
    fn from(raw: mtgjson::DeckListEntry) -> Self {
        let release_date = raw
            .release_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok());

        CatalogEntry {
            id: raw.file_name,
            name: raw.name,
            product_type: raw.product_type,
            release_date,
            set_code: raw.code,
        }
    }
}

impl From<mtgjson::DeckCard> for CardEntry {
    fn from(raw: mtgjson::DeckCard) -> Self {
        CardEntry::new(raw.name, raw.count).with_metadata(CardMetadata {
            set_code: raw.set_code,
            collector_number: raw.number,
            uuid: raw.uuid,
        })
    }
}

fn canonical_from_detail(entry_id: &str, detail: mtgjson::DeckDetail) -> CanonicalDeck {
    let name = detail
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| entry_id.to_string());
    let commanders = detail.commander.into_iter().map(|c| c.name).collect();

    CanonicalDeck::new(
        name,
        detail.product_type,
        detail.main_board.into_iter().map(CardEntry::from).collect(),
        detail.side_board.into_iter().map(CardEntry::from).collect(),
        commanders,
    )
}

/// 目錄與牌組明細的抓取器：目錄有 TTL，明細永久快取
#[derive(Clone)]
pub struct CatalogFetcher {
    inner: Arc<FetcherInner>,
}

struct FetcherInner {
    cache: Arc<CacheStore>,
    client: RetryingClient,
    base_url: Url,
    catalog_ttl: Duration,
    catalog_flight: SingleFlight<CatalogSnapshot>,
    detail_flight: SingleFlight<CanonicalDeck>,
}

impl CatalogFetcher {
    pub fn new(
        cache: CacheStore,
        client: RetryingClient,
        base_url: &str,
        catalog_ttl: Duration,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| EtlError::InvalidConfigValueError {
            field: "source.endpoint".to_string(),
            value: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            inner: Arc::new(FetcherInner {
                cache: Arc::new(cache),
                client,
                base_url,
                catalog_ttl,
                catalog_flight: SingleFlight::new(),
                detail_flight: SingleFlight::new(),
            }),
        })
    }

    pub fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    /// 取得完整目錄。
    ///
    /// 快取有效且未強制更新時直接回傳；否則從網路抓取並寫入快取。
    /// 網路失敗時退回任何現有快取（即使已過期）並標記為 `Stale`，
    /// 完全沒有快取才回傳錯誤。
    pub async fn fetch_catalog(&self, force_refresh: bool) -> Result<CatalogSnapshot> {
        if !force_refresh {
            if let Some(snapshot) = self.inner.cached_catalog().await {
                return Ok(snapshot);
            }
        }

        let inner = Arc::clone(&self.inner);
        self.inner
            .catalog_flight
            .run(&CacheKey::Catalog.name(), move || async move {
                inner.refresh_catalog(force_refresh).await
            })
            .await
    }

    pub async fn fetch_deck_detail(&self, entry_id: &str) -> Result<CanonicalDeck> {
        let key = CacheKey::Detail(entry_id.to_string());
        if let Some(deck) = self.inner.cached_detail(&key).await {
            tracing::debug!("📁 Deck '{}' served from cache", entry_id);
            return Ok(deck);
        }

        let inner = Arc::clone(&self.inner);
        let owned_id = entry_id.to_string();
        self.inner
            .detail_flight
            .run(&key.name(), move || async move {
                inner.refresh_detail(&owned_id).await
            })
            .await
    }

    pub async fn entry(&self, entry_id: &str) -> Result<CatalogEntry> {
        let snapshot = self.fetch_catalog(false).await?;
        snapshot
            .find(entry_id)
            .cloned()
            .ok_or_else(|| EtlError::not_found(format!("No catalog entry '{}'", entry_id)))
    }

    pub async fn deck_types(&self) -> Result<Vec<String>> {
        let snapshot = self.fetch_catalog(false).await?;
        Ok(filters::deck_types(&snapshot.entries))
    }
}

impl FetcherInner {
    /// 快取檔案的讀寫放到 blocking 執行緒，不佔用 async worker
    async fn with_cache<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&CacheStore) -> R + Send + 'static,
        R: Send + 'static,
    {
        let cache = Arc::clone(&self.cache);
        tokio::task::spawn_blocking(move || op(&cache))
            .await
            .map_err(|e| EtlError::TaskFailed {
                message: format!("cache task failed: {}", e),
            })
    }

    async fn cached_catalog(&self) -> Option<CatalogSnapshot> {
        let ttl = self.catalog_ttl;
        let record = self
            .with_cache(move |cache| {
                // 先看 metadata.json，過期就不必載入整份目錄
                let fetched_at = cache.timestamp(&CacheKey::Catalog)?;
                if !CacheStore::is_valid(fetched_at, ttl, Utc::now()) {
                    tracing::debug!("Catalog cache expired (fetched {})", fetched_at);
                    return None;
                }
                cache.get::<Vec<CatalogEntry>>(&CacheKey::Catalog)
            })
            .await
            .ok()
            .flatten()?;

        tracing::debug!("📁 Catalog served from cache ({} entries)", record.payload.len());
        Some(CatalogSnapshot {
            entries: record.payload,
            fetched_at: record.fetched_at,
            freshness: Freshness::Cached,
        })
    }

    async fn stale_catalog(&self) -> Option<CacheRecord<Vec<CatalogEntry>>> {
        self.with_cache(|cache| cache.get::<Vec<CatalogEntry>>(&CacheKey::Catalog))
            .await
            .ok()
            .flatten()
    }

    async fn cached_detail(&self, key: &CacheKey) -> Option<CanonicalDeck> {
        let key = key.clone();
        self.with_cache(move |cache| cache.get::<CanonicalDeck>(&key))
            .await
            .ok()
            .flatten()
            .map(|record| record.payload)
    }

    async fn store<T>(&self, key: CacheKey, payload: T, fetched_at: DateTime<Utc>) -> Result<()>
    where
        T: Serialize + Send + 'static,
    {
        self.with_cache(move |cache| cache.put(&key, &payload, fetched_at))
            .await?
    }

    async fn refresh_catalog(&self, force_refresh: bool) -> Result<CatalogSnapshot> {
        // 等待期間可能已被上一個抓取填好
        if !force_refresh {
            if let Some(snapshot) = self.cached_catalog().await {
                return Ok(snapshot);
            }
        }

        let url = self.endpoint(&["DeckList.json"])?;
        tracing::info!("🌐 Fetching deck catalog from {}", url);

        match self
            .client
            .get_json::<mtgjson::Envelope<Vec<mtgjson::DeckListEntry>>>(url.as_str())
            .await
        {
            Ok(envelope) => {
                let entries: Vec<CatalogEntry> =
                    envelope.data.into_iter().map(CatalogEntry::from).collect();
                let fetched_at = Utc::now();

                if let Err(e) = self
                    .store(CacheKey::Catalog, entries.clone(), fetched_at)
                    .await
                {
                    tracing::warn!("⚠️ Failed to cache catalog: {}", e);
                }

                tracing::info!("✅ Catalog loaded: {} decks", entries.len());
                Ok(CatalogSnapshot {
                    entries,
                    fetched_at,
                    freshness: Freshness::Fresh,
                })
            }
            Err(e) => match self.stale_catalog().await {
                Some(record) => {
                    tracing::warn!(
                        "⚠️ Catalog fetch failed, using cached copy from {}: {}",
                        record.fetched_at,
                        e
                    );
                    Ok(CatalogSnapshot {
                        entries: record.payload,
                        fetched_at: record.fetched_at,
                        freshness: Freshness::Stale {
                            reason: e.to_string(),
                        },
                    })
                }
                None => Err(e),
            },
        }
    }

    async fn refresh_detail(&self, entry_id: &str) -> Result<CanonicalDeck> {
        let key = CacheKey::Detail(entry_id.to_string());
        if let Some(deck) = self.cached_detail(&key).await {
            return Ok(deck);
        }

        let url = self.endpoint(&["decks", &format!("{}.json", entry_id)])?;
        tracing::info!("🌐 Fetching deck '{}'", entry_id);

        let envelope = self
            .client
            .get_json::<mtgjson::Envelope<mtgjson::DeckDetail>>(url.as_str())
            .await?;
        let deck = canonical_from_detail(entry_id, envelope.data);

        if let Err(e) = self.store(key, deck.clone(), Utc::now()).await {
            tracing::warn!("⚠️ Failed to cache deck '{}': {}", entry_id, e);
        }

        tracing::debug!(
            "Deck '{}': {} main cards, {} commander(s)",
            deck.name,
            deck.mainboard_count(),
            deck.commanders.len()
        );
        Ok(deck)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EtlError::ConfigError {
                message: format!("Catalog endpoint cannot be a base URL: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::testing::{fast_policy, ScriptedTransport};
    use chrono::TimeDelta;
    use tempfile::TempDir;

    const DECK_LIST: &str = r#"{"data":[
        {"code":"C18","fileName":"AdaptiveEnchantment_C18","name":"Adaptive Enchantment","releaseDate":"2018-08-10","type":"Commander Deck"},
        {"code":"SS1","fileName":"JaceVraskaSS1","name":"Jace vs. Vraska","releaseDate":null,"type":"Signature Spellbook"}
    ]}"#;

    fn fetcher(dir: &TempDir, transport: Arc<ScriptedTransport>) -> CatalogFetcher {
        let cache = CacheStore::open(dir.path()).unwrap();
        let client = RetryingClient::new(transport, fast_policy(3));
        CatalogFetcher::new(cache, client, "http://mtgjson.test/api/v5/", DEFAULT_CATALOG_TTL)
            .unwrap()
    }

    #[test]
    fn test_deck_list_entries_map_to_catalog_entries() {
        let envelope: mtgjson::Envelope<Vec<mtgjson::DeckListEntry>> =
            serde_json::from_str(DECK_LIST).unwrap();
        let entries: Vec<CatalogEntry> = envelope.data.into_iter().map(Into::into).collect();

        assert_eq!(entries[0].id, "AdaptiveEnchantment_C18");
        assert_eq!(entries[0].product_type, "Commander Deck");
        assert_eq!(
            entries[0].release_date,
            NaiveDate::from_ymd_opt(2018, 8, 10)
        );
        assert_eq!(entries[1].release_date, None);
    }

    #[test]
    fn test_detail_maps_commanders_and_metadata() {
        let raw = r#"{"name":"Adaptive Enchantment","type":"Commander Deck",
            "commander":[{"name":"Estrid, the Masked","count":1,"setCode":"C18","number":"40","uuid":"u-1"}],
            "mainBoard":[{"name":"Forest","count":10,"setCode":"C18","number":"299"}],
            "sideBoard":[]}"#;
        let detail: mtgjson::DeckDetail = serde_json::from_str(raw).unwrap();

        let deck = canonical_from_detail("AdaptiveEnchantment_C18", detail);

        assert_eq!(deck.commanders, vec!["Estrid, the Masked"]);
        assert_eq!(deck.format_hint.as_deref(), Some("Commander Deck"));
        assert_eq!(deck.mainboard[0].quantity, 10);
        assert_eq!(deck.mainboard[0].metadata.collector_number.as_deref(), Some("299"));
    }

    #[tokio::test]
    async fn test_stale_cache_served_when_source_down() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let fetcher = fetcher(&dir, transport.clone());

        let old = Utc::now() - TimeDelta::hours(48);
        let cached = vec![CatalogEntry {
            id: "Old_C18".to_string(),
            name: "Old".to_string(),
            product_type: "Commander Deck".to_string(),
            release_date: None,
            set_code: "C18".to_string(),
        }];
        fetcher.cache().put(&CacheKey::Catalog, &cached, old).unwrap();

        let snapshot = fetcher.fetch_catalog(false).await.unwrap();

        assert!(snapshot.is_stale());
        assert_eq!(snapshot.entries, cached);
        assert_eq!(snapshot.fetched_at, old);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_catalog_recovers_after_transient_failures() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![
            ScriptedTransport::status(500, "boom"),
            ScriptedTransport::status(500, "boom"),
            ScriptedTransport::status(200, DECK_LIST),
        ]));
        let fetcher = fetcher(&dir, transport.clone());

        let snapshot = fetcher.fetch_catalog(false).await.unwrap();

        assert_eq!(snapshot.freshness, Freshness::Fresh);
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(transport.calls(), 3);
        assert!(fetcher.cache().timestamp(&CacheKey::Catalog).is_some());

        let cached = fetcher.fetch_catalog(false).await.unwrap();
        assert_eq!(cached.freshness, Freshness::Cached);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_expired_metadata_forces_refetch() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![ScriptedTransport::status(
            200, DECK_LIST,
        )]));
        let fetcher = fetcher(&dir, transport.clone());
        fetcher
            .cache()
            .put(&CacheKey::Catalog, &Vec::<CatalogEntry>::new(), Utc::now())
            .unwrap();

        // 內容是新的，但 metadata 記錄的時間已過期
        let expired = Utc::now() - TimeDelta::hours(48);
        let metadata = serde_json::json!({
            "cache_version": "1.0",
            "last_fetched": {"catalog": expired},
        });
        std::fs::write(
            dir.path().join("metadata.json"),
            serde_json::to_vec(&metadata).unwrap(),
        )
        .unwrap();

        let snapshot = fetcher.fetch_catalog(false).await.unwrap();

        assert_eq!(snapshot.freshness, Freshness::Fresh);
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_cache_and_source_down_is_error() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let fetcher = fetcher(&dir, transport);

        let err = fetcher.fetch_catalog(false).await.unwrap_err();

        assert!(err.is_source_unavailable());
        assert!(!dir.path().join("catalog.json").exists());
    }

    #[tokio::test]
    async fn test_endpoint_keeps_base_path() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let fetcher = fetcher(&dir, transport);

        let url = fetcher
            .inner
            .endpoint(&["decks", "AdaptiveEnchantment_C18.json"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://mtgjson.test/api/v5/decks/AdaptiveEnchantment_C18.json"
        );
    }
}
