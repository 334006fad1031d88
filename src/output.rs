//! Result types returned by the analysis entry points.

use crate::pipeline::input::SourceKind;
use serde::{Deserialize, Serialize};

/// The model's report for one upload, plus what was sent to get it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Upload file name.
    pub name: String,
    /// Which decoder produced the image.
    pub source_kind: SourceKind,
    /// Width of the normalized image in pixels.
    pub width: u32,
    /// Height of the normalized image in pixels.
    pub height: u32,
    /// Size of the PNG payload sent to the model.
    pub png_bytes: usize,
    /// Model output, unmodified.
    pub markdown: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Wall-clock time for normalization + model call.
    pub duration_ms: u64,
}

/// Normalization summary printed by `--inspect-only`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub name: String,
    pub source_kind: SourceKind,
    pub width: u32,
    pub height: u32,
    pub png_bytes: usize,
}
