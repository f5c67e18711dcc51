use crate::adapters::goldfish::DEFAULT_GOLDFISH_BASE;
use crate::adapters::moxfield::DEFAULT_MOXFIELD_API;
use crate::core::catalog::DEFAULT_CATALOG_ENDPOINT;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub adapters: AdaptersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub timeout_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub directory: String,
    pub catalog_ttl_hours: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_output_path")]
    pub output_path: String,
    pub concurrent_requests: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptersConfig {
    #[serde(default = "default_moxfield_api")]
    pub moxfield_api: String,
    #[serde(default = "default_goldfish_base")]
    pub goldfish_base: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_seconds: None,
            retry_attempts: None,
            retry_delay_seconds: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_dir(),
            catalog_ttl_hours: None,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            concurrent_requests: None,
        }
    }
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            moxfield_api: default_moxfield_api(),
            goldfish_base: default_goldfish_base(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_CATALOG_ENDPOINT.to_string()
}

fn default_moxfield_api() -> String {
    DEFAULT_MOXFIELD_API.to_string()
}

fn default_goldfish_base() -> String {
    DEFAULT_GOLDFISH_BASE.to_string()
}

/// 平台快取目錄，例如 Linux 的 `~/.cache/precon-etl`
fn default_cache_dir() -> String {
    ProjectDirs::from("", "", "precon-etl")
        .map(|dirs| dirs.cache_dir().to_string_lossy().into_owned())
        .unwrap_or_else(|| "./cache".to_string())
}

/// Cockatrice 的牌組目錄，例如 Linux 的 `~/.local/share/Cockatrice/decks`
fn default_output_path() -> String {
    ProjectDirs::from("", "", "Cockatrice")
        .map(|dirs| dirs.data_dir().join("decks").to_string_lossy().into_owned())
        .unwrap_or_else(|| "./decks".to_string())
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CACHE_DIR})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("source.endpoint", &self.source.endpoint)?;
        validation::validate_url("adapters.moxfield_api", &self.adapters.moxfield_api)?;
        validation::validate_url("adapters.goldfish_base", &self.adapters.goldfish_base)?;

        validation::validate_path("cache.directory", &self.cache.directory)?;
        validation::validate_path("export.output_path", &self.export.output_path)?;

        if let Some(concurrent) = self.export.concurrent_requests {
            validation::validate_positive_number("export.concurrent_requests", concurrent, 1)?;
        }
        if let Some(attempts) = self.source.retry_attempts {
            validation::validate_range("source.retry_attempts", attempts, 1, 10)?;
        }
        if let Some(timeout) = self.source.timeout_seconds {
            validation::validate_range("source.timeout_seconds", timeout, 1, 600)?;
        }
        if let Some(ttl) = self.cache.catalog_ttl_hours {
            validation::validate_positive_number("cache.catalog_ttl_hours", ttl as usize, 1)?;
        }

        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn catalog_endpoint(&self) -> &str {
        &self.source.endpoint
    }

    fn cache_dir(&self) -> &str {
        &self.cache.directory
    }

    fn output_path(&self) -> &str {
        &self.export.output_path
    }

    fn concurrent_requests(&self) -> usize {
        self.export.concurrent_requests.unwrap_or(5)
    }

    fn retry_attempts(&self) -> u32 {
        self.source.retry_attempts.unwrap_or(3)
    }

    fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.source.retry_delay_seconds.unwrap_or(1))
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_seconds.unwrap_or(30))
    }

    fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.catalog_ttl_hours.unwrap_or(24) * 60 * 60)
    }

    fn moxfield_api(&self) -> &str {
        &self.adapters.moxfield_api
    }

    fn goldfish_base(&self) -> &str {
        &self.adapters.goldfish_base
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
