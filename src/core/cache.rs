//! 本機快取：`catalog.json`、`details/<id>.json` 與 `metadata.json`
//!
//! 只負責存取與時間戳，何時算過期由呼叫端的 TTL 決定。

use crate::utils::error::{EtlError, Result};
use crate::utils::fs::write_atomic;
use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub const CATALOG_FILE: &str = "catalog.json";
pub const DETAILS_DIR: &str = "details";
pub const METADATA_FILE: &str = "metadata.json";
const CACHE_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Catalog,
    Detail(String),
}

impl CacheKey {
    pub fn name(&self) -> String {
        match self {
            CacheKey::Catalog => "catalog".to_string(),
            CacheKey::Detail(id) => format!("{}/{}", DETAILS_DIR, safe_file_stem(id)),
        }
    }

    fn relative_path(&self) -> PathBuf {
        match self {
            CacheKey::Catalog => PathBuf::from(CATALOG_FILE),
            CacheKey::Detail(id) => {
                Path::new(DETAILS_DIR).join(format!("{}.json", safe_file_stem(id)))
            }
        }
    }
}

/// 以 URL 編碼產生檔名：可還原、不同 id 不會撞名，也不會含路徑分隔符
fn safe_file_stem(id: &str) -> String {
    url::form_urlencoded::byte_serialize(id.as_bytes())
        .collect::<String>()
        .replace('*', "%2A")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord<T> {
    pub fetched_at: DateTime<Utc>,
    pub payload: T,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheMetadata {
    #[serde(default)]
    cache_version: String,
    #[serde(default)]
    last_fetched: BTreeMap<String, DateTime<Utc>>,
}

pub struct CacheStore {
    root: PathBuf,
    metadata_lock: Mutex<()>,
}

impl CacheStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(DETAILS_DIR))?;
        tracing::debug!("Cache directory: {}", root.display());

        Ok(Self {
            root,
            metadata_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `now - timestamp < ttl`
    pub fn is_valid(timestamp: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
        match TimeDelta::from_std(ttl) {
            Ok(ttl) => now.signed_duration_since(timestamp) < ttl,
            // TTL 大到無法表示，視為不會過期
            Err(_) => true,
        }
    }

    /// 讀不到或內容損毀都回傳 `None`，讓呼叫端重新抓取
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<CacheRecord<T>> {
        match self.read_record(key) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("⚠️ Ignoring cache entry: {}", e);
                None
            }
        }
    }

    fn read_record<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<CacheRecord<T>>> {
        let path = self.root.join(key.relative_path());

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(EtlError::CorruptCache {
                    key: key.name(),
                    message: e.to_string(),
                })
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| EtlError::CorruptCache {
                key: key.name(),
                message: e.to_string(),
            })
    }

    pub fn put<T: Serialize>(&self, key: &CacheKey, payload: &T, timestamp: DateTime<Utc>) -> Result<()> {
        let record = CacheRecord {
            fetched_at: timestamp,
            payload,
        };
        let data = serde_json::to_vec_pretty(&record)?;
        write_atomic(&self.root.join(key.relative_path()), &data)?;
        self.record_timestamp(key, timestamp)?;

        tracing::debug!("💾 Cached '{}' ({} bytes)", key.name(), data.len());
        Ok(())
    }

    /// 只讀 metadata.json，不必載入大型內容就能判斷新鮮度
    pub fn timestamp(&self, key: &CacheKey) -> Option<DateTime<Utc>> {
        self.load_metadata().last_fetched.get(&key.name()).copied()
    }

    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock_metadata();

        remove_if_exists(&self.root.join(CATALOG_FILE))?;
        remove_if_exists(&self.root.join(METADATA_FILE))?;

        let details_dir = self.root.join(DETAILS_DIR);
        if details_dir.exists() {
            for entry in std::fs::read_dir(&details_dir)? {
                let path = entry?.path();
                if path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
                    std::fs::remove_file(&path)?;
                }
            }
        }

        tracing::info!("🧹 Cache cleared: {}", self.root.display());
        Ok(())
    }

    fn record_timestamp(&self, key: &CacheKey, timestamp: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock_metadata();

        let mut metadata = self.load_metadata();
        metadata.cache_version = CACHE_VERSION.to_string();
        metadata.last_fetched.insert(key.name(), timestamp);

        let data = serde_json::to_vec_pretty(&metadata)?;
        write_atomic(&self.root.join(METADATA_FILE), &data)
    }

    fn load_metadata(&self) -> CacheMetadata {
        let path = self.root.join(METADATA_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("⚠️ Cache metadata unreadable, starting fresh: {}", e);
                CacheMetadata::default()
            }),
            Err(_) => CacheMetadata::default(),
        }
    }

    fn lock_metadata(&self) -> std::sync::MutexGuard<'_, ()> {
        // 鎖只保護檔案寫入順序，poison 後仍可繼續使用
        self.metadata_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, CacheStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::open(temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_get_missing_key_returns_none() {
        let (_dir, store) = store();
        assert!(store.get::<Vec<String>>(&CacheKey::Catalog).is_none());
        assert!(store.timestamp(&CacheKey::Catalog).is_none());
    }

    #[test]
    fn test_put_then_get_returns_payload_and_timestamp() {
        let (_dir, store) = store();
        let now = Utc::now();

        store
            .put(&CacheKey::Catalog, &vec!["a".to_string(), "b".to_string()], now)
            .unwrap();

        let record = store.get::<Vec<String>>(&CacheKey::Catalog).unwrap();
        assert_eq!(record.payload, vec!["a", "b"]);
        assert_eq!(record.fetched_at, now);
        assert_eq!(store.timestamp(&CacheKey::Catalog), Some(now));
        assert!(store.root().join(CATALOG_FILE).exists());
        assert!(store.root().join(METADATA_FILE).exists());
    }

    #[test]
    fn test_detail_keys_land_under_details_dir() {
        let (_dir, store) = store();
        let key = CacheKey::Detail("AdaptiveEnchantment_C18".to_string());

        store.put(&key, &"payload", Utc::now()).unwrap();

        assert!(store
            .root()
            .join("details")
            .join("AdaptiveEnchantment_C18.json")
            .exists());
    }

    #[test]
    fn test_detail_key_cannot_escape_cache_dir() {
        let key = CacheKey::Detail("../../etc/passwd".to_string());
        assert_eq!(key.name(), "details/..%2F..%2Fetc%2Fpasswd");
    }

    #[test]
    fn test_similar_ids_get_separate_files() {
        let (_dir, store) = store();
        let spaced = CacheKey::Detail("Foo Bar".to_string());
        let underscored = CacheKey::Detail("Foo_Bar".to_string());

        store.put(&spaced, &"spaced", Utc::now()).unwrap();
        store.put(&underscored, &"underscored", Utc::now()).unwrap();

        assert_ne!(spaced.name(), underscored.name());
        assert_eq!(store.get::<String>(&spaced).unwrap().payload, "spaced");
        assert_eq!(store.get::<String>(&underscored).unwrap().payload, "underscored");
    }

    #[test]
    fn test_corrupt_payload_is_treated_as_miss() {
        let (_dir, store) = store();
        std::fs::write(store.root().join(CATALOG_FILE), "{ not json").unwrap();

        assert!(store.get::<Vec<String>>(&CacheKey::Catalog).is_none());
    }

    #[test]
    fn test_corrupt_metadata_does_not_break_put() {
        let (_dir, store) = store();
        std::fs::write(store.root().join(METADATA_FILE), "garbage").unwrap();

        assert!(store.timestamp(&CacheKey::Catalog).is_none());
        store.put(&CacheKey::Catalog, &1u32, Utc::now()).unwrap();
        assert!(store.timestamp(&CacheKey::Catalog).is_some());
    }

    #[test]
    fn test_is_valid_respects_ttl() {
        let now = Utc::now();
        let ttl = Duration::from_secs(24 * 60 * 60);

        assert!(CacheStore::is_valid(now - TimeDelta::hours(23), ttl, now));
        assert!(!CacheStore::is_valid(now - TimeDelta::hours(24), ttl, now));
        assert!(!CacheStore::is_valid(now - TimeDelta::hours(25), ttl, now));
    }

    #[test]
    fn test_clear_removes_everything() {
        let (_dir, store) = store();
        store.put(&CacheKey::Catalog, &1u32, Utc::now()).unwrap();
        store
            .put(&CacheKey::Detail("X_C18".to_string()), &2u32, Utc::now())
            .unwrap();

        store.clear().unwrap();

        assert!(store.get::<u32>(&CacheKey::Catalog).is_none());
        assert!(store.get::<u32>(&CacheKey::Detail("X_C18".to_string())).is_none());
        assert!(store.timestamp(&CacheKey::Catalog).is_none());
    }
}
