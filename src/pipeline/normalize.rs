//! Image normalization: any accepted upload → 8-bit RGB grid + PNG bytes.
//!
//! Two mutually exclusive branches, selected by [`UploadedFile::classify`]:
//!
//! ```text
//! scan.dcm ──▶ DICOM parse ──▶ first frame ──▶ min-max → u8 ──▶ gray → RGB ─┐
//!                                                                           ├─▶ PNG
//! other    ──▶ sniff format ──▶ raster decode ──▶ to RGB8 (alpha dropped) ──┘
//! ```
//!
//! ## Min-max, not windowing
//!
//! DICOM grids are stretched so their own minimum maps to 0 and their own
//! maximum to 255: `round((v - min) * 255 / (max - min))`. Window
//! center/width tags are ignored; the model always receives the
//! full dynamic range of whatever was stored. A constant grid has no range to
//! stretch and comes out all-zero. Rescale Slope/Intercept is not applied
//! either: the stretch runs over the stored values.
//!
//! The whole module is synchronous and stateless. Async callers should run
//! it on a blocking thread (see [`crate::analyze`]).

use crate::error::MedImgError;
use crate::pipeline::encode::encode_png;
use crate::pipeline::input::{ImageSource, SourceKind, UploadedFile};
use dicom_dictionary_std::tags;
use dicom_object::DefaultDicomObject;
use dicom_pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder, VoiLutOption};
use image::{GrayImage, RgbImage};
use tracing::{debug, info};

/// Preamble length preceding the `DICM` magic in a Part 10 file.
const DICOM_PREAMBLE_LEN: usize = 128;
const DICOM_MAGIC: &[u8; 4] = b"DICM";

/// The outcome of normalizing one upload.
///
/// `encoded_bytes` is the PNG encoding of `display_image`; both describe the
/// same H×W×3 8-bit grid.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    display_image: RgbImage,
    encoded_bytes: Vec<u8>,
    source_kind: SourceKind,
}

impl NormalizedImage {
    pub fn display_image(&self) -> &RgbImage {
        &self.display_image
    }

    pub fn encoded_bytes(&self) -> &[u8] {
        &self.encoded_bytes
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    pub fn width(&self) -> u32 {
        self.display_image.width()
    }

    pub fn height(&self) -> u32 {
        self.display_image.height()
    }

    pub fn into_parts(self) -> (RgbImage, Vec<u8>, SourceKind) {
        (self.display_image, self.encoded_bytes, self.source_kind)
    }
}

/// Normalize an upload into a displayable RGB image and its PNG encoding.
///
/// # Errors
/// - [`MedImgError::Decode`] — bytes are not a valid file of the routed type
/// - [`MedImgError::UnsupportedFormat`] — valid, but no renderable pixels
///   (DICOM without Pixel Data, multi-sample DICOM, codec not available)
/// - [`MedImgError::Encode`] — PNG encoding failed
pub fn normalize(upload: &UploadedFile) -> Result<NormalizedImage, MedImgError> {
    let name = upload.name();
    let source = upload.classify();
    debug!("Normalizing '{}' ({} bytes) as {}", name, upload.len(), source.kind());

    let display_image = match source {
        ImageSource::Dicom(bytes) => dicom_to_rgb(name, bytes)?,
        ImageSource::Standard(bytes) => raster_to_rgb(name, bytes)?,
    };

    let encoded_bytes = encode_png(&display_image).map_err(|e| MedImgError::Encode {
        name: name.to_string(),
        detail: e.to_string(),
    })?;

    info!(
        "Normalized '{}': {} {}x{} → {} PNG bytes",
        name,
        source.kind(),
        display_image.width(),
        display_image.height(),
        encoded_bytes.len()
    );

    Ok(NormalizedImage {
        display_image,
        encoded_bytes,
        source_kind: source.kind(),
    })
}

// ── DICOM branch ─────────────────────────────────────────────────────────

/// Parse a DICOM file held in memory. The 128-byte preamble is optional.
fn parse_dicom(name: &str, bytes: &[u8]) -> Result<DefaultDicomObject, MedImgError> {
    let body = match bytes.get(DICOM_PREAMBLE_LEN..DICOM_PREAMBLE_LEN + DICOM_MAGIC.len()) {
        Some(magic) if magic == DICOM_MAGIC => &bytes[DICOM_PREAMBLE_LEN..],
        _ => bytes,
    };
    dicom_object::from_reader(body).map_err(|e| MedImgError::decode(name, e))
}

fn dicom_to_rgb(name: &str, bytes: &[u8]) -> Result<RgbImage, MedImgError> {
    let obj = parse_dicom(name, bytes)?;

    if obj.element(tags::PIXEL_DATA).is_err() {
        return Err(MedImgError::unsupported(
            name,
            "DICOM dataset has no Pixel Data (7FE0,0010)",
        ));
    }

    let decoded = obj
        .decode_pixel_data()
        .map_err(|e| MedImgError::unsupported(name, e))?;

    let samples = decoded.samples_per_pixel();
    if samples != 1 {
        return Err(MedImgError::unsupported(
            name,
            format!("expected a single-channel grid, got {} samples per pixel", samples),
        ));
    }

    let (rows, cols) = (decoded.rows(), decoded.columns());
    if rows == 0 || cols == 0 {
        return Err(MedImgError::unsupported(
            name,
            format!("empty pixel grid ({}x{})", cols, rows),
        ));
    }
    if decoded.number_of_frames() > 1 {
        debug!(
            "'{}' has {} frames; using the first",
            name,
            decoded.number_of_frames()
        );
    }

    // Raw stored values, sign-extended per Pixel Representation. No rescale, no VOI.
    let options = ConvertOptions::new()
        .with_modality_lut(ModalityLutOption::None)
        .with_voi_lut(VoiLutOption::Identity);
    let values: Vec<f64> = decoded
        .to_vec_frame_with_options(0, &options)
        .map_err(|e| MedImgError::decode(name, e))?;

    let gray = min_max_to_u8(&values);
    debug!("'{}': {}x{} grid stretched to 0–255", name, cols, rows);
    gray_to_rgb(cols, rows, gray).ok_or_else(|| {
        MedImgError::Internal(format!("grid size mismatch for {}x{}", cols, rows))
    })
}

/// Linearly map the grid's own `[min, max]` onto `[0, 255]`.
///
/// A grid with no spread (constant, or empty) maps to all zeros.
pub fn min_max_to_u8(values: &[f64]) -> Vec<u8> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    let range = max - min;
    if !(range > 0.0 && range.is_finite()) {
        return vec![0; values.len()];
    }

    values
        .iter()
        .map(|&v| ((v - min) * 255.0 / range).round().clamp(0.0, 255.0) as u8)
        .collect()
}

/// Replicate a single 8-bit channel into R, G and B.
fn gray_to_rgb(width: u32, height: u32, gray: Vec<u8>) -> Option<RgbImage> {
    let gray = GrayImage::from_raw(width, height, gray)?;
    Some(image::DynamicImage::ImageLuma8(gray).to_rgb8())
}

// ── Standard branch ──────────────────────────────────────────────────────

fn raster_to_rgb(name: &str, bytes: &[u8]) -> Result<RgbImage, MedImgError> {
    let format = image::guess_format(bytes)
        .map_err(|_| MedImgError::decode(name, "content is not a recognised image format"))?;

    let img = image::load_from_memory_with_format(bytes, format).map_err(|e| match e {
        image::ImageError::Unsupported(_) => MedImgError::unsupported(name, e),
        other => MedImgError::decode(name, other),
    })?;

    debug!("'{}': decoded {:?} {:?}", name, format, img.color());
    Ok(img.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{DataElement, PrimitiveValue, VR};
    use dicom_object::{FileMetaTableBuilder, InMemDicomObject};
    use image::{DynamicImage, ImageFormat, Luma, Rgba, RgbaImage};
    use std::io::Cursor;

    // Secondary Capture Image Storage / Explicit VR Little Endian
    const SC_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.7";
    const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";

    fn image_attrs(rows: u16, cols: u16, bits: u16, signed: bool) -> InMemDicomObject {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(DataElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(SC_IMAGE_STORAGE)));
        obj.put(DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from("2.25.42")));
        obj.put(DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)));
        obj.put(DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            PrimitiveValue::from("MONOCHROME2"),
        ));
        obj.put(DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(rows)));
        obj.put(DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(cols)));
        obj.put(DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(bits)));
        obj.put(DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(bits)));
        obj.put(DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(bits - 1)));
        obj.put(DataElement::new(
            tags::PIXEL_REPRESENTATION,
            VR::US,
            PrimitiveValue::from(if signed { 1_u16 } else { 0_u16 }),
        ));
        obj
    }

    fn write_dicom(obj: InMemDicomObject) -> Vec<u8> {
        let file = obj
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(EXPLICIT_VR_LE)
                    .media_storage_sop_class_uid(SC_IMAGE_STORAGE)
                    .media_storage_sop_instance_uid("2.25.42"),
            )
            .expect("valid file meta");
        let mut buf = Vec::new();
        file.write_all(&mut buf).expect("write DICOM");
        buf
    }

    fn dicom_u16(rows: u16, cols: u16, pixels: Vec<u16>) -> Vec<u8> {
        let mut obj = image_attrs(rows, cols, 16, false);
        obj.put(DataElement::new(
            tags::PIXEL_DATA,
            VR::OW,
            PrimitiveValue::U16(pixels.into()),
        ));
        write_dicom(obj)
    }

    fn png_bytes(img: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn assert_png_rgb8(norm: &NormalizedImage) {
        let decoded = image::load_from_memory_with_format(norm.encoded_bytes(), ImageFormat::Png)
            .expect("encoded bytes are PNG");
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
        assert_eq!(decoded.width(), norm.width());
        assert_eq!(decoded.height(), norm.height());
        assert_eq!(decoded.to_rgb8().as_raw(), norm.display_image().as_raw());
    }

    // ── min-max ──────────────────────────────────────────────────────────

    #[test]
    fn min_max_spans_full_range() {
        let out = min_max_to_u8(&[100.0, 1550.0, 3000.0]);
        assert_eq!(out, vec![0, 128, 255]);
    }

    #[test]
    fn min_max_is_linear() {
        let input: Vec<f64> = (0..=10).map(|v| v as f64 * 10.0).collect();
        let out = min_max_to_u8(&input);
        assert_eq!(out[0], 0);
        assert_eq!(out[5], 128); // 127.5 rounds half away from zero
        assert_eq!(out[10], 255);
        assert!(out.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn min_max_handles_negative_values() {
        assert_eq!(min_max_to_u8(&[-1024.0, 0.0, 1024.0]), vec![0, 128, 255]);
    }

    #[test]
    fn min_max_constant_grid_is_all_zero() {
        assert_eq!(min_max_to_u8(&[742.0; 6]), vec![0; 6]);
        assert_eq!(min_max_to_u8(&[]), Vec::<u8>::new());
    }

    // ── DICOM branch ─────────────────────────────────────────────────────

    #[test]
    fn dicom_u16_is_stretched_and_replicated() {
        let bytes = dicom_u16(2, 2, vec![100, 200, 300, 3000]);
        let norm = normalize(&UploadedFile::new("ct.dcm", bytes)).expect("normalize");

        assert_eq!(norm.source_kind(), SourceKind::Dicom);
        assert_eq!((norm.width(), norm.height()), (2, 2));
        let px: Vec<[u8; 3]> = norm.display_image().pixels().map(|p| p.0).collect();
        assert_eq!(px[0], [0, 0, 0]);
        assert_eq!(px[3], [255, 255, 255]);
        assert!(px.iter().all(|p| p[0] == p[1] && p[1] == p[2]));
        // (200 - 100) * 255 / 2900 = 8.79
        assert_eq!(px[1][0], 9);
        assert_png_rgb8(&norm);
    }

    #[test]
    fn dicom_without_preamble_is_accepted() {
        let bytes = dicom_u16(1, 2, vec![0, 10]);
        assert_eq!(&bytes[128..132], b"DICM");
        let stripped = bytes[128..].to_vec();
        let norm = normalize(&UploadedFile::new("x.dcm", stripped)).expect("normalize");
        assert_eq!((norm.width(), norm.height()), (2, 1));
    }

    #[test]
    fn dicom_constant_grid_is_all_zero() {
        let bytes = dicom_u16(3, 3, vec![512; 9]);
        let norm = normalize(&UploadedFile::new("flat.dcm", bytes)).expect("normalize");
        assert!(norm.display_image().as_raw().iter().all(|&v| v == 0));
        assert_png_rgb8(&norm);
    }

    #[test]
    fn dicom_8bit_grid() {
        let mut obj = image_attrs(2, 2, 8, false);
        obj.put(DataElement::new(
            tags::PIXEL_DATA,
            VR::OB,
            PrimitiveValue::from(vec![10_u8, 20, 30, 40]),
        ));
        let norm = normalize(&UploadedFile::new("us.dcm", write_dicom(obj))).unwrap();
        let reds: Vec<u8> = norm.display_image().pixels().map(|p| p.0[0]).collect();
        assert_eq!(reds, vec![0, 85, 170, 255]);
    }

    #[test]
    fn dicom_signed_grid() {
        let mut obj = image_attrs(1, 3, 16, true);
        obj.put(DataElement::new(
            tags::PIXEL_DATA,
            VR::OW,
            PrimitiveValue::I16(vec![-1000_i16, 0, 1000].into()),
        ));
        let norm = normalize(&UploadedFile::new("mr.dcm", write_dicom(obj))).unwrap();
        let reds: Vec<u8> = norm.display_image().pixels().map(|p| p.0[0]).collect();
        assert_eq!(reds, vec![0, 128, 255]);
    }

    #[test]
    fn dicom_rescale_is_not_applied() {
        // A negative slope must not invert the stretch of the stored values.
        let mut obj = image_attrs(1, 3, 16, false);
        obj.put(DataElement::new(tags::RESCALE_SLOPE, VR::DS, PrimitiveValue::from("-1")));
        obj.put(DataElement::new(tags::RESCALE_INTERCEPT, VR::DS, PrimitiveValue::from("0")));
        obj.put(DataElement::new(
            tags::PIXEL_DATA,
            VR::OW,
            PrimitiveValue::U16(vec![100_u16, 200, 3000].into()),
        ));
        let norm = normalize(&UploadedFile::new("inv.dcm", write_dicom(obj))).unwrap();
        let reds: Vec<u8> = norm.display_image().pixels().map(|p| p.0[0]).collect();
        assert_eq!(reds, vec![0, 9, 255]);
    }

    #[test]
    fn dicom_without_pixel_data_is_unsupported() {
        let bytes = write_dicom(image_attrs(2, 2, 16, false));
        let err = normalize(&UploadedFile::new("meta-only.dcm", bytes)).unwrap_err();
        assert!(err.is_unsupported_format(), "got: {err:?}");
    }

    #[test]
    fn garbage_dicom_is_decode_error() {
        let err = normalize(&UploadedFile::new("bad.dcm", vec![0xAB; 10])).unwrap_err();
        assert!(err.is_decode_error(), "got: {err:?}");
    }

    #[test]
    fn png_named_dcm_takes_dicom_path_and_fails() {
        let png = png_bytes(DynamicImage::ImageLuma8(GrayImage::new(2, 2)));
        let err = normalize(&UploadedFile::new("scan.dcm", png)).unwrap_err();
        assert!(err.is_decode_error(), "got: {err:?}");
    }

    // ── Standard branch ──────────────────────────────────────────────────

    #[test]
    fn rgba_png_drops_alpha() {
        let src = RgbaImage::from_pixel(5, 4, Rgba([200, 100, 50, 0]));
        let png = png_bytes(DynamicImage::ImageRgba8(src));
        let norm = normalize(&UploadedFile::new("photo.png", png)).unwrap();

        assert_eq!(norm.source_kind(), SourceKind::Standard);
        assert_eq!((norm.width(), norm.height()), (5, 4));
        assert!(norm.display_image().pixels().all(|p| p.0 == [200, 100, 50]));
        assert_png_rgb8(&norm);
    }

    #[test]
    fn grayscale_png_becomes_rgb() {
        let src = GrayImage::from_pixel(3, 3, Luma([77]));
        let png = png_bytes(DynamicImage::ImageLuma8(src));
        let norm = normalize(&UploadedFile::new("xray.png", png)).unwrap();
        assert!(norm.display_image().pixels().all(|p| p.0 == [77, 77, 77]));
        assert_png_rgb8(&norm);
    }

    #[test]
    fn jpeg_becomes_rgb_png() {
        let src = RgbImage::from_pixel(16, 8, image::Rgb([120, 120, 120]));
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(src)
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();

        let norm = normalize(&UploadedFile::new("knee.jpeg", jpeg)).unwrap();
        assert_eq!((norm.width(), norm.height()), (16, 8));
        assert_png_rgb8(&norm);
    }

    #[test]
    fn uppercase_dcm_takes_standard_path() {
        let bytes = dicom_u16(2, 2, vec![1, 2, 3, 4]);
        let err = normalize(&UploadedFile::new("scan.DCM", bytes)).unwrap_err();
        assert!(err.is_decode_error(), "got: {err:?}");
    }

    #[test]
    fn truncated_png_is_decode_error() {
        let noisy = RgbImage::from_fn(64, 64, |x, y| {
            image::Rgb([(x * 7 + y * 13) as u8, (x * y) as u8, (x ^ y) as u8])
        });
        let png = png_bytes(DynamicImage::ImageRgb8(noisy));
        let truncated = png[..png.len() / 2].to_vec();
        let err = normalize(&UploadedFile::new("cut.png", truncated)).unwrap_err();
        assert!(err.is_decode_error(), "got: {err:?}");
    }

    #[test]
    fn unknown_bytes_are_decode_error() {
        let err = normalize(&UploadedFile::new("noise.png", vec![0x42; 10])).unwrap_err();
        assert!(err.is_decode_error(), "got: {err:?}");
    }

    #[test]
    fn known_but_disabled_format_is_unsupported() {
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;".to_vec();
        let err = normalize(&UploadedFile::new("anim.gif", gif)).unwrap_err();
        assert!(err.is_unsupported_format(), "got: {err:?}");
    }
}
