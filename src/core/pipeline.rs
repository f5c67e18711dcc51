use crate::adapters::http::{ReqwestTransport, RetryPolicy, RetryingClient};
use crate::adapters::registry::SourceRegistry;
use crate::core::catalog::CatalogFetcher;
use crate::core::cache::CacheStore;
use crate::core::{cod, convert, format};
use crate::domain::model::{CanonicalDeck, DeckRequest, OutputDeck};
use crate::domain::ports::{ConfigProvider, Pipeline};
use crate::utils::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 目錄明細或外部網址 → `.cod` 檔
pub struct DeckExportPipeline {
    fetcher: CatalogFetcher,
    registry: SourceRegistry,
    output_dir: PathBuf,
}

impl DeckExportPipeline {
    pub fn new(fetcher: CatalogFetcher, registry: SourceRegistry, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            registry,
            output_dir: output_dir.into(),
        }
    }

    /// 目錄抓取與站台 adapter 共用同一個 HTTP client 與重試設定
    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Result<Self> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        let client = RetryingClient::new(
            Arc::new(transport),
            RetryPolicy::new(config.retry_attempts(), config.retry_delay()),
        );

        let fetcher = CatalogFetcher::new(
            CacheStore::open(config.cache_dir())?,
            client.clone(),
            config.catalog_endpoint(),
            config.catalog_ttl(),
        )?;
        let registry =
            SourceRegistry::with_defaults(client, config.moxfield_api(), config.goldfish_base());

        Ok(Self::new(fetcher, registry, config.output_path()))
    }

    pub fn fetcher(&self) -> &CatalogFetcher {
        &self.fetcher
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait::async_trait]
impl Pipeline for DeckExportPipeline {
    async fn extract(&self, request: &DeckRequest) -> Result<CanonicalDeck> {
        match request {
            DeckRequest::Catalog(entry_id) => self.fetcher.fetch_deck_detail(entry_id).await,
            DeckRequest::Locator(locator) => self.registry.fetch(locator).await,
        }
    }

    async fn transform(&self, deck: CanonicalDeck) -> Result<OutputDeck> {
        let tag = format::infer_format(&deck);
        tracing::debug!("'{}' classified as {}", deck.name, tag);
        Ok(convert::convert(&deck, tag))
    }

    async fn load(&self, deck: OutputDeck) -> Result<PathBuf> {
        let output_dir = self.output_dir.clone();
        // 檔案寫入含 fsync，放到 blocking 執行緒
        tokio::task::spawn_blocking(move || cod::write(&deck, &output_dir))
            .await
            .map_err(|e| crate::utils::error::EtlError::TaskFailed {
                message: format!("write task failed: {}", e),
            })?
    }
}
