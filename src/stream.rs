//! Streaming batch API: analyze many inputs, emit each result as it lands.
//!
//! Uploads are independent, so up to `config.concurrency` of them run at
//! once. Results arrive in completion order, each tagged with the input it
//! came from. A failure for one input never stops the others.

use crate::analyze::Analyzer;
use crate::error::MedImgError;
use crate::output::AnalysisReport;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{info, warn};

/// One finished input: the string it was given as, and its outcome.
pub type BatchItem = (String, Result<AnalysisReport, MedImgError>);

/// A boxed stream of batch results.
pub type ReportStream = Pin<Box<dyn Stream<Item = BatchItem> + Send>>;

/// Analyze every input (path or URL), yielding results as they complete.
///
/// Progress events go to `analyzer.config().progress_callback`, including
/// `on_batch_complete` once the stream is exhausted.
pub fn analyze_stream(analyzer: Arc<Analyzer>, inputs: Vec<String>) -> ReportStream {
    let s = indexed_stream(analyzer, inputs).map(|(_, item)| item);
    Box::pin(s)
}

/// Collect [`analyze_stream`] into a vector, in input order.
pub async fn analyze_batch(analyzer: Arc<Analyzer>, inputs: Vec<String>) -> Vec<BatchItem> {
    let mut results: Vec<(usize, BatchItem)> = indexed_stream(analyzer, inputs).collect().await;
    results.sort_unstable_by_key(|(idx, _)| *idx);
    results.into_iter().map(|(_, item)| item).collect()
}

/// The batch stream, with each result tagged by its position in `inputs`.
fn indexed_stream(
    analyzer: Arc<Analyzer>,
    inputs: Vec<String>,
) -> impl Stream<Item = (usize, BatchItem)> + Send {
    let total = inputs.len();
    let concurrency = analyzer.config().concurrency;
    let callback = analyzer.config().progress_callback.clone();
    let succeeded = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    info!("Starting batch of {} inputs (concurrency {})", total, concurrency);
    if let Some(ref cb) = callback {
        cb.on_batch_start(total);
        if total == 0 {
            cb.on_batch_complete(0, 0);
        }
    }

    stream::iter(inputs.into_iter().enumerate().map(move |(idx, input)| {
        let analyzer = Arc::clone(&analyzer);
        async move {
            let result = analyzer.analyze_input(&input).await;
            (idx, (input, result))
        }
    }))
    .buffer_unordered(concurrency)
    .map(move |(idx, (input, result))| {
        match &result {
            Ok(report) => {
                succeeded.fetch_add(1, Ordering::SeqCst);
                if let Some(ref cb) = callback {
                    cb.on_file_complete(&report.name, report.markdown.len());
                }
            }
            Err(e) => {
                warn!("{}: {}", input, e);
                if let Some(ref cb) = callback {
                    cb.on_file_error(&input, &e.to_string());
                }
            }
        }
        if finished.fetch_add(1, Ordering::SeqCst) + 1 == total {
            let ok = succeeded.load(Ordering::SeqCst);
            info!("Batch complete: {}/{} inputs analyzed", ok, total);
            if let Some(ref cb) = callback {
                cb.on_batch_complete(total, ok);
            }
        }
        (idx, (input, result))
    })
}
