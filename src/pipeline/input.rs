//! Input resolution: turn a path, URL, or byte stream into an [`UploadedFile`].
//!
//! An upload is nothing more than a name and the bytes behind it. The name
//! matters for exactly one thing: [`UploadedFile::classify`] picks the DICOM
//! decoder when it ends in a literal, lower-case `.dcm`. Everything else is
//! handed to the general raster decoder, which sniffs the format from the
//! content. `scan.DCM` therefore takes the raster path and fails there; that
//! is the expected behaviour, not a bug.
//!
//! Uploads are read fully into memory. Nothing is written to disk, including
//! URL downloads.

use crate::error::MedImgError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The only suffix that routes an upload to the DICOM decoder.
pub const DICOM_SUFFIX: &str = ".dcm";

/// An uploaded image: a file name plus its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    name: String,
    bytes: Vec<u8>,
}

/// Which decoder an upload is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource<'a> {
    /// Name ends with `.dcm`; bytes are parsed as a DICOM file.
    Dicom(&'a [u8]),
    /// Any other name; bytes are sniffed and decoded as a raster image.
    Standard(&'a [u8]),
}

impl ImageSource<'_> {
    pub fn kind(&self) -> SourceKind {
        match self {
            ImageSource::Dicom(_) => SourceKind::Dicom,
            ImageSource::Standard(_) => SourceKind::Standard,
        }
    }
}

/// Classification tag carried by every normalized image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "DICOM")]
    Dicom,
    #[serde(rename = "Standard")]
    Standard,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Dicom => f.write_str("DICOM"),
            SourceKind::Standard => f.write_str("Standard"),
        }
    }
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read an upload from any byte stream.
    pub fn from_reader(name: impl Into<String>, mut reader: impl Read) -> Result<Self, MedImgError> {
        let name = name.into();
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| MedImgError::Internal(format!("Failed to read '{}': {}", name, e)))?;
        Ok(Self { name, bytes })
    }

    /// Read an upload from a local file. The upload name is the file name
    /// component of `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MedImgError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MedImgError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => MedImgError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => MedImgError::Internal(format!("Failed to read {}: {}", path.display(), e)),
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        debug!("Read local upload {} ({} bytes)", path.display(), bytes.len());
        Ok(Self { name, bytes })
    }

    /// Download an upload over HTTP(S). The body is kept in memory.
    pub async fn fetch(url: &str, timeout_secs: u64) -> Result<Self, MedImgError> {
        info!("Downloading image from: {}", url);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| MedImgError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let response = client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MedImgError::DownloadTimeout {
                    url: url.to_string(),
                    secs: timeout_secs,
                }
            } else {
                MedImgError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(MedImgError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                MedImgError::DownloadTimeout {
                    url: url.to_string(),
                    secs: timeout_secs,
                }
            } else {
                MedImgError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let name = filename_from_url(url);
        info!("Downloaded {} ({} bytes)", name, bytes.len());
        Ok(Self {
            name,
            bytes: bytes.to_vec(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Pick the decoder for this upload from its name.
    pub fn classify(&self) -> ImageSource<'_> {
        if is_dicom_name(&self.name) {
            ImageSource::Dicom(&self.bytes)
        } else {
            ImageSource::Standard(&self.bytes)
        }
    }
}

/// Case-sensitive `.dcm` suffix test.
pub fn is_dicom_name(name: &str) -> bool {
    name.ends_with(DICOM_SUFFIX)
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a path or URL into an upload.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<UploadedFile, MedImgError> {
    if input.trim().is_empty() {
        return Err(MedImgError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        UploadedFile::fetch(input, timeout_secs).await
    } else {
        UploadedFile::from_path(PathBuf::from(input))
    }
}

/// Last non-empty URL path segment, or `"download"` when there is none.
///
/// The query string is ignored, so `.../scan.dcm?token=x` keeps its DICOM
/// routing.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(segments) = parsed.path_segments() {
            if let Some(last) = segments.filter(|s| !s.is_empty()).last() {
                return last.to_string();
            }
        }
    }
    "download".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn dcm_suffix_is_case_sensitive() {
        assert!(is_dicom_name("scan.dcm"));
        assert!(is_dicom_name("dir.with.dots/scan.dcm"));
        assert!(!is_dicom_name("scan.DCM"));
        assert!(!is_dicom_name("scan.Dcm"));
        assert!(!is_dicom_name("scan.png"));
        assert!(!is_dicom_name("scan.dcm.png"));
        assert!(!is_dicom_name("dcm"));
    }

    #[test]
    fn classify_routes_by_name() {
        let dicom = UploadedFile::new("scan.dcm", vec![1, 2, 3]);
        assert_eq!(dicom.classify(), ImageSource::Dicom(&[1, 2, 3]));
        assert_eq!(dicom.classify().kind(), SourceKind::Dicom);

        let upper = UploadedFile::new("scan.DCM", vec![1, 2, 3]);
        assert_eq!(upper.classify().kind(), SourceKind::Standard);

        let png = UploadedFile::new("scan.png", vec![]);
        assert_eq!(png.classify().kind(), SourceKind::Standard);
    }

    #[test]
    fn source_kind_display_and_serde() {
        assert_eq!(SourceKind::Dicom.to_string(), "DICOM");
        assert_eq!(SourceKind::Standard.to_string(), "Standard");
        assert_eq!(serde_json::to_string(&SourceKind::Dicom).unwrap(), "\"DICOM\"");
        let back: SourceKind = serde_json::from_str("\"Standard\"").unwrap();
        assert_eq!(back, SourceKind::Standard);
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/scan.png"));
        assert!(is_url("http://example.com/scan.dcm"));
        assert!(!is_url("/tmp/scan.png"));
        assert!(!is_url("scan.png"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url_uses_last_segment() {
        assert_eq!(filename_from_url("https://x.org/a/b/chest.dcm"), "chest.dcm");
        assert_eq!(filename_from_url("https://x.org/a/chest.dcm?sig=abc"), "chest.dcm");
        assert_eq!(filename_from_url("https://x.org/a/knee.png/"), "knee.png");
        assert_eq!(filename_from_url("https://x.org/"), "download");
    }

    #[test]
    fn from_path_reads_name_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hand.png");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"not really a png")
            .unwrap();

        let upload = UploadedFile::from_path(&path).unwrap();
        assert_eq!(upload.name(), "hand.png");
        assert_eq!(upload.bytes(), b"not really a png");
        assert_eq!(upload.len(), 16);
    }

    #[test]
    fn from_path_missing_file() {
        let err = UploadedFile::from_path("/definitely/not/here.dcm").unwrap_err();
        assert!(matches!(err, MedImgError::FileNotFound { .. }), "got: {err:?}");
    }

    #[test]
    fn from_reader_collects_stream() {
        let upload = UploadedFile::from_reader("x.jpg", &b"abc"[..]).unwrap();
        assert_eq!(upload.name(), "x.jpg");
        assert_eq!(upload.bytes(), b"abc");
    }

    #[tokio::test]
    async fn resolve_empty_input_is_invalid() {
        let err = resolve_input("  ", 5).await.unwrap_err();
        assert!(matches!(err, MedImgError::InvalidInput { .. }));
    }
}
