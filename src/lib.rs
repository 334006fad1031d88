//! # medimg-dx
//!
//! Turn a medical image (PNG, JPEG, or DICOM) into a descriptive report from
//! a Vision Language Model.
//!
//! The crate does no diagnosis of its own. It does the part a hosted model
//! cannot: DICOM grids of arbitrary bit depth are stretched onto 0–255 and
//! replicated into RGB, raster images are forced to RGB8, and either one is
//! re-encoded as PNG so every upload reaches the model in the same shape.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (path / URL / bytes)
//!  │
//!  ├─ 1. Input      name + bytes; `.dcm` suffix picks the DICOM decoder
//!  ├─ 2. Normalize  DICOM → min-max u8 → RGB, or raster → RGB8; PNG encode
//!  ├─ 3. Encode     PNG → base64 ImageData / data URL
//!  ├─ 4. VLM        one chat call with the radiology prompt
//!  └─ 5. Output     Markdown report, passed through unmodified
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use medimg_dx::{AnalysisConfig, Analyzer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let analyzer = Analyzer::new(AnalysisConfig::default())?;
//!     let report = analyzer.analyze_input("knee.dcm").await?;
//!     println!("{}", report.markdown);
//!     Ok(())
//! }
//! ```
//!
//! Normalization alone needs no provider:
//!
//! ```rust,no_run
//! use medimg_dx::{normalize, UploadedFile};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let upload = UploadedFile::from_path("scan.dcm")?;
//! let image = normalize(&upload)?;
//! assert_eq!(image.source_kind().to_string(), "DICOM");
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `medimg-dx` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze_sync, inspect, Analyzer};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, DEFAULT_MODEL};
pub use error::MedImgError;
pub use output::{AnalysisReport, ImageSummary};
pub use pipeline::encode::data_url;
pub use pipeline::input::{ImageSource, SourceKind, UploadedFile};
pub use pipeline::normalize::{normalize, NormalizedImage};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{analyze_batch, analyze_stream, BatchItem, ReportStream};
