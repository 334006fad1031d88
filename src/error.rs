//! Error types for the medimg-dx library.
//!
//! Every failure is a [`MedImgError`]. The variants are grouped by the stage
//! that raises them:
//!
//! * **Normalization** — [`MedImgError::Decode`] and
//!   [`MedImgError::UnsupportedFormat`]. They are kept apart so callers can
//!   tell "these bytes are broken" from "these bytes are valid but carry
//!   nothing we can render" (for example a DICOM dataset without pixel data).
//!
//! * **Input** — file or URL could not be turned into an upload.
//!
//! * **Inference** — everything that goes wrong on the remote model call is
//!   folded into [`MedImgError::InferenceFailed`] (or the timeout variant).
//!   Network, authentication and rate-limit errors all look the same to the
//!   person waiting for a report.
//!
//! None of these are retried by the library.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the medimg-dx library.
#[derive(Debug, Error)]
pub enum MedImgError {
    // ── Normalization errors ──────────────────────────────────────────────
    /// The bytes cannot be parsed as the format implied by the upload.
    #[error("Failed to decode '{name}': {detail}")]
    Decode { name: String, detail: String },

    /// The bytes parsed, but the content is missing required data or uses a
    /// format the decoder does not handle.
    #[error("Unsupported image '{name}': {detail}")]
    UnsupportedFormat { name: String, detail: String },

    /// PNG encoding of the normalized grid failed.
    #[error("Failed to encode '{name}' as PNG: {detail}")]
    Encode { name: String, detail: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a usable file path nor an HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Inference errors ──────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The remote model call failed. Covers network, authentication,
    /// rate-limit and malformed-response failures alike.
    #[error("Image analysis failed: {message}")]
    InferenceFailed { message: String },

    /// The remote model call exceeded `api_timeout_secs`.
    #[error("Image analysis timed out after {secs}s")]
    InferenceTimeout { secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MedImgError {
    pub(crate) fn decode(name: &str, detail: impl ToString) -> Self {
        MedImgError::Decode {
            name: name.to_string(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn unsupported(name: &str, detail: impl ToString) -> Self {
        MedImgError::UnsupportedFormat {
            name: name.to_string(),
            detail: detail.to_string(),
        }
    }

    /// `true` for [`MedImgError::Decode`].
    pub fn is_decode_error(&self) -> bool {
        matches!(self, MedImgError::Decode { .. })
    }

    /// `true` for [`MedImgError::UnsupportedFormat`].
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, MedImgError::UnsupportedFormat { .. })
    }

    /// `true` when the failure came from the remote model call.
    pub fn is_inference_error(&self) -> bool {
        matches!(
            self,
            MedImgError::InferenceFailed { .. }
                | MedImgError::InferenceTimeout { .. }
                | MedImgError::ProviderNotConfigured { .. }
        )
    }
}
