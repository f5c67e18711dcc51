use crate::domain::model::{DeckRequest, FormatTag};
use crate::domain::ports::Pipeline;
use crate::utils::error::{EtlError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// 單一牌組匯出成功後的摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub deck_name: String,
    pub format: FormatTag,
    pub main_cards: u32,
    pub side_cards: u32,
    pub banner: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub request: DeckRequest,
    pub result: Result<ExportReport>,
}

impl ExportOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct ExportEngine<P: Pipeline> {
    pipeline: Arc<P>,
    concurrency: usize,
}

impl<P: Pipeline + 'static> ExportEngine<P> {
    pub fn new(pipeline: P, concurrency: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            concurrency: concurrency.max(1),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self, request: &DeckRequest) -> Result<ExportReport> {
        run_one(self.pipeline.as_ref(), request).await
    }

    /// 每個請求各自回報結果，單一失敗不影響其他牌組。結果順序與輸入相同。
    pub async fn run_batch(&self, requests: Vec<DeckRequest>) -> Vec<ExportOutcome> {
        tracing::info!(
            "🚀 Exporting {} deck(s), {} at a time",
            requests.len(),
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, request) in requests.iter().cloned().enumerate() {
            let pipeline = Arc::clone(&self.pipeline);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => run_one(pipeline.as_ref(), &request).await,
                    Err(e) => Err(EtlError::TaskFailed {
                        message: format!("worker pool closed: {}", e),
                    }),
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<ExportReport>>> = vec![None; requests.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => tracing::error!("❌ Export task panicked: {}", e),
            }
        }

        let outcomes: Vec<ExportOutcome> = requests
            .into_iter()
            .zip(results)
            .map(|(request, result)| ExportOutcome {
                request,
                result: result.unwrap_or_else(|| {
                    Err(EtlError::TaskFailed {
                        message: "export task did not complete".to_string(),
                    })
                }),
            })
            .collect();

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        tracing::info!(
            "✅ Export finished: {} succeeded, {} failed",
            succeeded,
            outcomes.len() - succeeded
        );
        outcomes
    }
}

async fn run_one<P: Pipeline + ?Sized>(pipeline: &P, request: &DeckRequest) -> Result<ExportReport> {
    tracing::debug!("Extracting {}", request);
    let deck = pipeline.extract(request).await?;

    let output = pipeline.transform(deck).await?;
    let report = ExportReport {
        deck_name: output.name.clone(),
        format: output.format,
        main_cards: output.main.iter().map(|c| c.quantity).sum(),
        side_cards: output.side.iter().map(|c| c.quantity).sum(),
        banner: output.banner.clone(),
        path: PathBuf::new(),
    };

    let path = pipeline.load(output).await?;
    tracing::info!("✅ {} → {}", request, path.display());

    Ok(ExportReport { path, ..report })
}
