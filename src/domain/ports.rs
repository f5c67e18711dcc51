use crate::domain::model::{CanonicalDeck, DeckRequest, OutputDeck};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// HTTP 回應（狀態碼 + 內文），重試判斷在 `RetryingClient`
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// 連線層失敗（逾時、無法連線等），一律視為暫時性
#[derive(Debug, Clone)]
pub struct TransportError {
    pub message: String,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> std::result::Result<HttpReply, TransportError>;
}

/// 外部牌組站台的 adapter
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn site_name(&self) -> &str;
    fn can_handle(&self, locator: &str) -> bool;
    async fn fetch(&self, locator: &str) -> Result<CanonicalDeck>;
}

pub trait ConfigProvider: Send + Sync {
    fn catalog_endpoint(&self) -> &str;
    fn cache_dir(&self) -> &str;
    fn output_path(&self) -> &str;
    fn concurrent_requests(&self) -> usize;
    fn retry_attempts(&self) -> u32;
    fn retry_delay(&self) -> Duration;
    fn request_timeout(&self) -> Duration;
    fn catalog_ttl(&self) -> Duration;
    fn moxfield_api(&self) -> &str;
    fn goldfish_base(&self) -> &str;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self, request: &DeckRequest) -> Result<CanonicalDeck>;
    async fn transform(&self, deck: CanonicalDeck) -> Result<OutputDeck>;
    async fn load(&self, deck: OutputDeck) -> Result<PathBuf>;
}
