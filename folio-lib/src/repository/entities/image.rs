use base64::{Engine, engine::general_purpose};
use image::{
    ImageEncoder,
    codecs::jpeg::JpegEncoder,
    imageops::FilterType,
};

use crate::{Result, ValidationError};

/// Uploads above this size are rejected before decoding.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_WIDTH: u32 = 800;
pub const MAX_HEIGHT: u32 = 600;
const JPEG_QUALITY: u8 = 70;

/// Dimensions that fit within [`MAX_WIDTH`] x [`MAX_HEIGHT`] keeping the aspect ratio.
///
/// Images already inside the box keep their size; nothing is ever enlarged.
pub fn fit_within(width: u32, height: u32) -> (u32, u32) {
    if width <= MAX_WIDTH && height <= MAX_HEIGHT {
        return (width, height);
    }

    let (w, h) = (u64::from(width), u64::from(height));
    let (max_w, max_h) = (u64::from(MAX_WIDTH), u64::from(MAX_HEIGHT));

    // Width bound when max_w / w <= max_h / h
    let (new_w, new_h) = if max_w * h <= max_h * w {
        (max_w, round_div(h * max_w, w))
    } else {
        (round_div(w * max_h, h), max_h)
    };

    (
        u32::try_from(new_w.max(1)).unwrap_or(MAX_WIDTH),
        u32::try_from(new_h.max(1)).unwrap_or(MAX_HEIGHT),
    )
}

/// `n / d` rounded half up
fn round_div(n: u64, d: u64) -> u64 {
    (2 * n + d).checked_div(2 * d).unwrap_or(0)
}

/// Turn an uploaded file into an inline `data:image/jpeg;base64,...` URI.
///
/// The size limit is checked first, so oversized files are never decoded.
pub fn inline_jpeg(bytes: &[u8]) -> Result<String> {
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ValidationError::ImageTooLarge { size: bytes.len() }.into());
    }

    let img = image::load_from_memory(bytes)?;
    let (width, height) = fit_within(img.width(), img.height());
    let img = if (width, height) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(width, height, FilterType::Triangle)
    };

    let rgb = img.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).write_image(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        image::ExtendedColorType::Rgb8,
    )?;

    Ok(format!(
        "data:image/jpeg;base64,{}",
        general_purpose::STANDARD.encode(&jpeg)
    ))
}

#[cfg(test)]
pub(crate) mod test {
    use std::io::Cursor;

    use image::{ImageFormat, RgbImage};

    use super::*;
    use crate::Error;

    /// A PNG of the given size
    pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn decode(data_uri: &str) -> image::DynamicImage {
        let b64 = data_uri
            .strip_prefix("data:image/jpeg;base64,")
            .expect("inline jpeg");
        let bytes = general_purpose::STANDARD.decode(b64).unwrap();
        image::load_from_memory(&bytes).unwrap()
    }

    #[test]
    fn test_fit_within() {
        assert_eq!(fit_within(640, 480), (640, 480));
        assert_eq!(fit_within(800, 600), (800, 600));
        assert_eq!(fit_within(1600, 1200), (800, 600));
        assert_eq!(fit_within(2000, 500), (800, 200));
        assert_eq!(fit_within(500, 2000), (150, 600));
        // Width bound, 601 * 800 / 1000 = 480.8
        assert_eq!(fit_within(1000, 601), (800, 481));
        assert_eq!(fit_within(333, 1000), (200, 600));
    }

    #[test]
    fn test_shrinks_large_image() {
        let uri = inline_jpeg(&png(1600, 900)).unwrap();
        let img = decode(&uri);

        assert_eq!((img.width(), img.height()), (800, 450));
    }

    #[test]
    fn test_never_enlarges() {
        let uri = inline_jpeg(&png(120, 80)).unwrap();
        let img = decode(&uri);

        assert_eq!((img.width(), img.height()), (120, 80));
    }

    #[test]
    fn test_rejects_oversized_before_decoding() {
        // Not an image at all: the size check must fire before any decoding is attempted
        let bytes = vec![0_u8; MAX_UPLOAD_BYTES + 1];

        assert!(matches!(
            inline_jpeg(&bytes),
            Err(Error::Validation(ValidationError::ImageTooLarge { .. }))
        ));
    }

    #[test]
    fn test_garbage_is_image_error() {
        assert!(matches!(inline_jpeg(b"not an image"), Err(Error::Image(_))));
    }
}
