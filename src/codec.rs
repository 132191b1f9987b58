//! Conversion between image files and normalized `[0, 1]` arrays.
//!
//! Arrays use the `(row, column, channel)` layout expected by
//! [`crate::ReflectionRemover`]. Grayscale sources decode to a single channel,
//! everything else to three RGB channels.

use std::path::Path;

use image::{ColorType, DynamicImage, GrayImage, ImageFormat, RgbImage};
use ndarray::{Array3, ArrayView3};

use crate::error::{Error, Result};

/// Convert a decoded image into a `(height, width, channels)` array in `[0, 1]`.
///
/// Alpha channels are dropped.
#[must_use]
pub fn image_to_array(img: &DynamicImage) -> Array3<f64> {
    match img.color() {
        ColorType::L8 | ColorType::L16 => {
            let gray = img.to_luma8();
            let (w, h) = gray.dimensions();
            Array3::from_shape_fn((h as usize, w as usize, 1), |(y, x, _)| {
                #[allow(clippy::cast_possible_truncation)]
                let px = gray.get_pixel(x as u32, y as u32);
                f64::from(px[0]) / 255.0
            })
        }
        _ => {
            let rgb = img.to_rgb8();
            let (w, h) = rgb.dimensions();
            Array3::from_shape_fn((h as usize, w as usize, 3), |(y, x, c)| {
                #[allow(clippy::cast_possible_truncation)]
                let px = rgb.get_pixel(x as u32, y as u32);
                f64::from(px[c]) / 255.0
            })
        }
    }
}

/// Quantize a `(height, width, channels)` array to an 8-bit image.
///
/// Values are clamped to `[0, 1]` before scaling. One channel produces a
/// grayscale image, three channels an RGB image.
///
/// # Errors
///
/// Returns [`Error::ImageShape`] for any other channel count or for
/// dimensions that do not fit in `u32`.
pub fn array_to_image(array: ArrayView3<'_, f64>) -> Result<DynamicImage> {
    let (h, w, channels) = array.dim();
    let width = u32::try_from(w).map_err(|_| Error::ImageShape(format!("width {w} too large")))?;
    let height =
        u32::try_from(h).map_err(|_| Error::ImageShape(format!("height {h} too large")))?;

    // Logical iteration order is row, column, channel: the interleaved byte
    // order of `image` buffers.
    let raw: Vec<u8> = array.iter().map(|&v| quantize(v)).collect();

    let img = match channels {
        1 => GrayImage::from_raw(width, height, raw).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(width, height, raw).map(DynamicImage::ImageRgb8),
        n => {
            return Err(Error::ImageShape(format!(
                "cannot encode {n} channels, expected 1 or 3"
            )))
        }
    };

    img.ok_or_else(|| Error::ImageShape(format!("buffer does not match {w}x{h}x{channels}")))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn quantize(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Decode an image file into a normalized array.
///
/// # Errors
///
/// Returns [`Error::Image`] if the file cannot be opened or decoded.
pub fn load_image(path: &Path) -> Result<Array3<f64>> {
    let img = image::open(path)?;
    Ok(image_to_array(&img))
}

/// Encode a normalized array to disk, choosing the format from the extension.
///
/// JPEG is written at quality 100. Missing parent directories are created.
///
/// # Errors
///
/// Returns an error if the format is unsupported, the array has an
/// unsupported channel count, or writing fails.
pub fn save_image(array: ArrayView3<'_, f64>, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;
    let dyn_img = array_to_image(array)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&dyn_img)?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            dyn_img.save(path)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbaImage};

    #[test]
    fn rgb_image_maps_to_three_channels() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 1, Rgb([255, 0, 51]));

        let array = image_to_array(&DynamicImage::ImageRgb8(img));
        assert_eq!(array.dim(), (2, 3, 3));
        assert!((array[[1, 2, 0]] - 1.0).abs() < 1e-12);
        assert!(array[[1, 2, 1]].abs() < 1e-12);
        assert!((array[[1, 2, 2]] - 0.2).abs() < 1e-12);
        assert!(array[[0, 0, 0]].abs() < 1e-12);
    }

    #[test]
    fn gray_image_maps_to_one_channel() {
        let mut img = GrayImage::new(4, 5);
        img.put_pixel(1, 3, Luma([102]));

        let array = image_to_array(&DynamicImage::ImageLuma8(img));
        assert_eq!(array.dim(), (5, 4, 1));
        assert!((array[[3, 1, 0]] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn rgba_image_drops_alpha() {
        let img = RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 0]));
        let array = image_to_array(&DynamicImage::ImageRgba8(img));
        assert_eq!(array.dim(), (2, 2, 3));
    }

    #[test]
    fn array_to_image_round_trips_8bit_values() {
        let mut img = RgbImage::new(4, 3);
        for (x, y, px) in img.enumerate_pixels_mut() {
            #[allow(clippy::cast_possible_truncation)]
            let v = (x * 40 + y * 7) as u8;
            *px = Rgb([v, 255 - v, v / 2]);
        }
        let dyn_img = DynamicImage::ImageRgb8(img.clone());

        let array = image_to_array(&dyn_img);
        let back = array_to_image(array.view()).unwrap().to_rgb8();
        assert_eq!(back, img);
    }

    #[test]
    fn array_to_image_clamps_out_of_range_values() {
        let array = Array3::from_shape_vec((1, 2, 1), vec![-0.5, 1.5]).unwrap();
        let img = array_to_image(array.view()).unwrap().to_luma8();
        assert_eq!(img.get_pixel(0, 0)[0], 0);
        assert_eq!(img.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn array_to_image_rejects_unsupported_channel_count() {
        let array = Array3::<f64>::zeros((2, 2, 2));
        assert!(matches!(
            array_to_image(array.view()),
            Err(Error::ImageShape(_))
        ));
    }

    #[test]
    fn save_image_rejects_unknown_extension() {
        let array = Array3::<f64>::zeros((2, 2, 3));
        let path = std::env::temp_dir().join("frr_codec_test.unknownext");
        assert!(matches!(
            save_image(array.view(), &path),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn save_and_load_png_preserves_values() {
        let dir = std::env::temp_dir().join(format!("frr_codec_{}", std::process::id()));
        let path = dir.join("nested").join("gradient.png");

        #[allow(clippy::cast_precision_loss)]
        let array = Array3::from_shape_fn((6, 5, 3), |(y, x, c)| {
            ((y * 5 + x) * 3 + c) as f64 / 89.0
        });
        save_image(array.view(), &path).unwrap();
        let loaded = load_image(&path).unwrap();

        assert_eq!(loaded.dim(), array.dim());
        for (a, b) in loaded.iter().zip(array.iter()) {
            assert!((a - b).abs() <= 0.5 / 255.0 + 1e-12);
        }
        std::fs::remove_dir_all(&dir).ok();
    }
}
