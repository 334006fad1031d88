//! Pipeline stages for medical-image analysis.
//!
//! Each submodule implements exactly one step, so each can be tested without
//! the others (normalization in particular never needs a provider).
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ normalize ──▶ encode ──▶ llm
//! (path/URL)  (DICOM|raster → RGB8 PNG)  (base64)  (VLM)
//! ```
//!
//! 1. [`input`]     — read a path, stream, or URL into an `UploadedFile` and
//!    classify it by name
//! 2. [`normalize`] — decode and convert to an 8-bit RGB grid + PNG bytes;
//!    CPU-bound, run in `spawn_blocking` by async callers
//! 3. [`encode`]    — base64-wrap the PNG for the multimodal request body
//! 4. [`llm`]       — the single VLM call; the only stage with network I/O
//!    besides URL downloads

pub mod encode;
pub mod input;
pub mod llm;
pub mod normalize;
