//! Progress-callback trait for per-upload analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! events while a batch of uploads is analyzed. The CLI uses it to drive a
//! progress bar; a server could forward the same events to a socket.
//!
//! # Example
//!
//! ```rust
//! use medimg_dx::{AnalysisConfig, AnalysisProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl AnalysisProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, name: &str, report_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{name}: {report_len} bytes of report");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(counter as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the analysis pipeline as it processes each upload.
///
/// Implementations must be `Send + Sync`: in a batch, uploads are analyzed
/// concurrently and events for different files may arrive from different
/// threads and in any order. All methods default to no-ops.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once before a batch starts.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called after the upload is normalized, before the model call.
    fn on_file_start(&self, name: &str) {
        let _ = name;
    }

    /// Called when a report was produced.
    ///
    /// * `report_len` — byte length of the returned Markdown
    fn on_file_complete(&self, name: &str, report_len: usize) {
        let _ = (name, report_len);
    }

    /// Called when normalization or the model call failed.
    fn on_file_error(&self, name: &str, error: &str) {
        let _ = (name, error);
    }

    /// Called once after every upload in the batch was attempted.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
