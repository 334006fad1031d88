//! Image encoding: RGB grid → PNG bytes → base64 `ImageData` / data URL.
//!
//! Vision APIs take images as base64 data URIs embedded in the JSON request
//! body. PNG is lossless, so the min-max stretched DICOM grid reaches the
//! model exactly as it was computed.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::RgbImage;
use std::io::Cursor;
use tracing::debug;

pub const PNG_MIME: &str = "image/png";

/// PNG-encode an 8-bit RGB grid.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} RGB grid → {} PNG bytes",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Wrap PNG bytes as an attachment for the VLM request.
///
/// `detail` is forwarded to providers that support it (`"high"`, `"low"`,
/// `"auto"`). Radiographs need `"high"`: fine structure is the whole point.
pub fn image_data(png: &[u8], detail: &str) -> ImageData {
    let b64 = STANDARD.encode(png);
    debug!("Encoded image → {} bytes base64", b64.len());
    ImageData::new(b64, PNG_MIME).with_detail(detail)
}

/// `data:image/png;base64,<payload>` for the given PNG bytes.
pub fn data_url(png: &[u8]) -> String {
    format!("data:{};base64,{}", PNG_MIME, STANDARD.encode(png))
}
