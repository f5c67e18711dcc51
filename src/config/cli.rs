use crate::config::toml_config::TomlConfig;
use crate::core::filters::CatalogFilter;
use crate::utils::error::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "precon-etl")]
#[command(about = "Browse MTGJSON preconstructed decks and export them as Cockatrice .cod files")]
#[command(version)]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub cache_dir: Option<String>,

    #[arg(long, global = true, help = "Directory the .cod files are written to")]
    pub output_path: Option<String>,

    #[arg(long, global = true, help = "Catalog base URL")]
    pub endpoint: Option<String>,

    #[arg(long, global = true)]
    pub concurrent_requests: Option<usize>,

    #[arg(long, short, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List decks in the catalog
    Catalog(CatalogArgs),
    /// List the product types present in the catalog
    Types {
        #[arg(long)]
        refresh: bool,
    },
    /// Export catalog decks by id (MTGJSON fileName)
    Export {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Import decks from Moxfield or MTGGoldfish URLs
    Import {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Show the contents of a .cod file
    Inspect { file: PathBuf },
    /// Remove cached catalog and deck details
    ClearCache,
}

#[derive(Debug, Clone, Default, Args)]
pub struct CatalogArgs {
    /// Ignore the cache and refetch the catalog
    #[arg(long)]
    pub refresh: bool,

    #[arg(long = "type", value_name = "TYPE")]
    pub types: Vec<String>,

    #[arg(long = "set", value_name = "CODE")]
    pub sets: Vec<String>,

    #[arg(long)]
    pub name: Option<String>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub to: Option<NaiveDate>,

    #[arg(long)]
    pub limit: Option<usize>,
}

impl CatalogArgs {
    pub fn filter(&self) -> CatalogFilter {
        let mut filter = CatalogFilter::new().released_between(self.from, self.to);
        for product_type in &self.types {
            filter = filter.with_type(product_type.clone());
        }
        for set_code in &self.sets {
            filter = filter.with_set(set_code.clone());
        }
        if let Some(name) = &self.name {
            filter = filter.with_name(name.clone());
        }
        if let Some(limit) = self.limit {
            filter = filter.with_limit(limit);
        }
        filter
    }
}

impl CliConfig {
    /// 設定檔（或預設值）再套上命令列參數
    pub fn settings(&self) -> Result<TomlConfig> {
        let mut settings = match &self.config {
            Some(path) => {
                tracing::debug!("📁 Loading configuration from {}", path.display());
                TomlConfig::from_file(path)?
            }
            None => TomlConfig::default(),
        };

        if let Some(cache_dir) = &self.cache_dir {
            settings.cache.directory = cache_dir.clone();
        }
        if let Some(output_path) = &self.output_path {
            settings.export.output_path = output_path.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            settings.source.endpoint = endpoint.clone();
        }
        if let Some(concurrent) = self.concurrent_requests {
            settings.export.concurrent_requests = Some(concurrent);
        }

        Ok(settings)
    }
}
