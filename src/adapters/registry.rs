use crate::adapters::goldfish::GoldfishAdapter;
use crate::adapters::http::RetryingClient;
use crate::adapters::moxfield::MoxfieldAdapter;
use crate::domain::model::CanonicalDeck;
use crate::domain::ports::SourceAdapter;
use crate::utils::error::{EtlError, Result};
use std::sync::Arc;

/// 外部站台 adapter 清單，依註冊順序比對，第一個能處理的勝出
#[derive(Default, Clone)]
pub struct SourceRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 內建的 Moxfield 與 MTGGoldfish adapter
    pub fn with_defaults(client: RetryingClient, moxfield_api: &str, goldfish_base: &str) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MoxfieldAdapter::new(client.clone(), moxfield_api)));
        registry.register(Arc::new(GoldfishAdapter::new(client, goldfish_base)));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        tracing::debug!("Registered deck source: {}", adapter.site_name());
        self.adapters.push(adapter);
    }

    pub fn resolve(&self, locator: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters
            .iter()
            .find(|adapter| adapter.can_handle(locator))
            .cloned()
    }

    pub async fn fetch(&self, locator: &str) -> Result<CanonicalDeck> {
        let adapter = self.resolve(locator).ok_or_else(|| {
            EtlError::not_found(format!(
                "Unsupported deck source: {} (supported: {})",
                locator,
                self.supported_sites().join(", ")
            ))
        })?;

        tracing::debug!("Using {} for {}", adapter.site_name(), locator);
        adapter.fetch(locator).await
    }

    pub fn supported_sites(&self) -> Vec<String> {
        self.adapters
            .iter()
            .map(|adapter| adapter.site_name().to_string())
            .collect()
    }
}
