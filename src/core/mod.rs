pub mod cache;
pub mod catalog;
pub mod cod;
pub mod convert;
pub mod etl;
pub mod filters;
pub mod flight;
pub mod format;
pub mod pipeline;

pub use crate::domain::model::{CanonicalDeck, CatalogEntry, CatalogSnapshot, FormatTag, OutputDeck};
pub use crate::domain::ports::{ConfigProvider, Pipeline, SourceAdapter};
pub use crate::utils::error::Result;
