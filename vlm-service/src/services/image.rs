//! Decoding of uploaded images and encoding for transport to the backend.

use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Uploaded image is empty")]
    Empty,

    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
}

/// Decode raw upload bytes and normalise them to 8-bit RGB.
///
/// The format is sniffed from the content, not from the file name or the
/// declared content type.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }

    let image = image::load_from_memory(bytes).map_err(ImageError::Decode)?;
    Ok(image.to_rgb8())
}

/// Encode as PNG and wrap in a base64 `data:` URL.
pub fn to_png_data_url(image: &RgbImage) -> Result<String, ImageError> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(ImageError::Encode)?;

    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(image: &image::DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn decodes_jpeg_to_rgb() {
        let source = image::DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, image::Rgb([200, 10, 10])));
        let decoded = decode_rgb(&encode(&source, ImageFormat::Jpeg)).unwrap();

        assert_eq!(decoded.dimensions(), (8, 6));
        // JPEG is lossy; red must still dominate.
        let pixel = decoded.get_pixel(4, 3);
        assert!(pixel[0] > 150 && pixel[1] < 80 && pixel[2] < 80);
    }

    #[test]
    fn drops_alpha_channel() {
        let source = image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 0])));
        let decoded = decode_rgb(&encode(&source, ImageFormat::Png)).unwrap();

        assert_eq!(decoded.get_pixel(0, 0).0, [1, 2, 3]);
    }

    #[test]
    fn rejects_non_image_bytes() {
        assert!(matches!(
            decode_rgb(b"this is definitely not an image"),
            Err(ImageError::Decode(_))
        ));
    }

    #[test]
    fn rejects_empty_upload() {
        assert!(matches!(decode_rgb(&[]), Err(ImageError::Empty)));
    }

    #[test]
    fn data_url_round_trips_through_png() {
        let image = RgbImage::from_pixel(3, 3, image::Rgb([0, 128, 255]));
        let url = to_png_data_url(&image).unwrap();

        let payload = url.strip_prefix("data:image/png;base64,").unwrap();
        let png = base64::engine::general_purpose::STANDARD.decode(payload).unwrap();
        assert_eq!(decode_rgb(&png).unwrap(), image);
    }
}
