// Adapters layer: HTTP access and the per-site deck sources.

pub mod goldfish;
pub mod http;
pub mod moxfield;
pub mod registry;

pub use goldfish::GoldfishAdapter;
pub use http::{ReqwestTransport, RetryPolicy, RetryingClient};
pub use moxfield::MoxfieldAdapter;
pub use registry::SourceRegistry;
