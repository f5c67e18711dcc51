use anyhow::Context;
use clap::Parser;
use precon_etl::config::{CatalogArgs, CliConfig, Command};
use precon_etl::core::{cod, filters};
use precon_etl::domain::model::{DeckRequest, Freshness};
use precon_etl::domain::ports::ConfigProvider;
use precon_etl::utils::error::{ErrorSeverity, EtlError};
use precon_etl::utils::{logger, validation::Validate};
use precon_etl::{DeckExportPipeline, ExportEngine, ExportOutcome};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    if let Err(e) = run(cli).await {
        std::process::exit(report_failure(&e));
    }
}

async fn run(cli: CliConfig) -> anyhow::Result<()> {
    let settings = cli.settings().context("Failed to load configuration")?;
    settings.validate().context("Invalid configuration")?;

    let pipeline =
        DeckExportPipeline::from_config(&settings).context("Failed to set up the export pipeline")?;
    let engine = ExportEngine::new(pipeline, settings.concurrent_requests());

    match cli.command {
        Command::Catalog(args) => list_catalog(&engine, &args).await,
        Command::Types { refresh } => {
            let snapshot = engine.pipeline().fetcher().fetch_catalog(refresh).await?;
            warn_if_stale(&snapshot.freshness);
            for product_type in filters::deck_types(&snapshot.entries) {
                println!("{}", product_type);
            }
            Ok(())
        }
        Command::Export { ids } => {
            let requests = ids.into_iter().map(DeckRequest::Catalog).collect();
            export(&engine, requests).await
        }
        Command::Import { urls } => {
            let requests = urls.into_iter().map(DeckRequest::Locator).collect();
            export(&engine, requests).await
        }
        Command::Inspect { file } => {
            let deck = cod::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            println!("📦 {} ({})", deck.name, deck.format);
            println!("🏷️  Banner: {}", if deck.banner.is_empty() { "-" } else { deck.banner.as_str() });
            println!("Main ({} cards):", deck.main.iter().map(|c| c.quantity).sum::<u32>());
            for card in &deck.main {
                println!("  {} {}", card.quantity, card.name);
            }
            println!("Side ({} cards):", deck.side.iter().map(|c| c.quantity).sum::<u32>());
            for card in &deck.side {
                println!("  {} {}", card.quantity, card.name);
            }
            Ok(())
        }
        Command::ClearCache => {
            engine.pipeline().fetcher().cache().clear()?;
            println!("🧹 Cache cleared: {}", settings.cache_dir());
            Ok(())
        }
    }
}

async fn list_catalog(
    engine: &ExportEngine<DeckExportPipeline>,
    args: &CatalogArgs,
) -> anyhow::Result<()> {
    let snapshot = engine.pipeline().fetcher().fetch_catalog(args.refresh).await?;
    warn_if_stale(&snapshot.freshness);

    let selected = args.filter().apply(&snapshot.entries);
    for entry in &selected {
        let date = entry
            .release_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "----------".to_string());
        println!(
            "{:<44} {} {:<5} {:<22} {}",
            entry.id, date, entry.set_code, entry.product_type, entry.name
        );
    }
    println!(
        "📋 {} of {} decks (catalog fetched {})",
        selected.len(),
        snapshot.entries.len(),
        snapshot.fetched_at.format("%Y-%m-%d %H:%M UTC")
    );
    Ok(())
}

async fn export(
    engine: &ExportEngine<DeckExportPipeline>,
    requests: Vec<DeckRequest>,
) -> anyhow::Result<()> {
    let total = requests.len();
    let outcomes = engine.run_batch(requests).await;

    for outcome in &outcomes {
        print_outcome(outcome);
    }

    let mut failures = outcomes.into_iter().filter_map(|o| o.result.err());
    match failures.next() {
        None => {
            println!("✅ Exported {} deck(s) to {}", total, engine.pipeline().output_dir().display());
            Ok(())
        }
        Some(first) => {
            let failed = 1 + failures.count();
            Err(first).with_context(|| format!("{} of {} deck(s) failed to export", failed, total))
        }
    }
}

fn print_outcome(outcome: &ExportOutcome) {
    match &outcome.result {
        Ok(report) => println!(
            "✅ {} [{}] main {} / side {} / banner '{}' → {}",
            report.deck_name,
            report.format,
            report.main_cards,
            report.side_cards,
            report.banner,
            report.path.display()
        ),
        Err(e) => eprintln!("❌ {}: {}", outcome.request, e.user_friendly_message()),
    }
}

/// 記錄錯誤並回傳退出碼
fn report_failure(error: &anyhow::Error) -> i32 {
    let Some(e) = error.downcast_ref::<EtlError>() else {
        tracing::error!("❌ {:#}", error);
        eprintln!("❌ {:#}", error);
        return 1;
    };

    tracing::error!(
        "❌ {:#} (Category: {:?}, Severity: {:?})",
        error,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2, // 可重試
        ErrorSeverity::Critical => 3,
    }
}

fn warn_if_stale(freshness: &Freshness) {
    if let Freshness::Stale { reason } = freshness {
        tracing::warn!("⚠️ Showing cached catalog, refresh failed: {}", reason);
        eprintln!("⚠️ Catalog source unavailable, showing cached data ({})", reason);
    }
}
