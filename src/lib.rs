pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::TomlConfig;

pub use crate::adapters::SourceRegistry;
pub use crate::core::{
    catalog::CatalogFetcher,
    etl::{ExportEngine, ExportOutcome, ExportReport},
    pipeline::DeckExportPipeline,
};
pub use utils::error::{EtlError, Result};
