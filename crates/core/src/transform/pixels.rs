//! Least-significant-bit pixel nudges for JPEG and PNG inputs.

use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, ImageFormat, Pixel};
use std::io::Cursor;

use crate::media::MediaFormat;

const JPEG_QUALITY: u8 = 95;

pub(crate) fn supports(format: MediaFormat) -> bool {
    matches!(format, MediaFormat::Jpeg | MediaFormat::Png)
}

/// Decodes `data`, moves each color channel of the center pixel and its
/// right and lower neighbours by one step, and re-encodes in the same
/// format. `nudges[3 * pixel + channel]` selects up (set) or down.
///
/// Other formats are returned unchanged.
pub fn nudge_pixels(
    data: &[u8],
    format: MediaFormat,
    nudges: &[bool; 9],
) -> Result<Vec<u8>, image::ImageError> {
    let image_format = match format {
        MediaFormat::Jpeg => ImageFormat::Jpeg,
        MediaFormat::Png => ImageFormat::Png,
        _ => return Ok(data.to_vec()),
    };

    let decoded = image::load_from_memory_with_format(data, image_format)?;
    let mut out = Vec::new();
    if format == MediaFormat::Jpeg {
        let mut rgb = decoded.to_rgb8();
        nudge(&mut rgb, nudges);
        JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&rgb)?;
    } else {
        let mut rgba = decoded.to_rgba8();
        nudge(&mut rgba, nudges);
        rgba.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    }
    Ok(out)
}

fn nudge<P: Pixel<Subpixel = u8>>(img: &mut ImageBuffer<P, Vec<u8>>, nudges: &[bool; 9]) {
    let (w, h) = img.dimensions();
    let (cx, cy) = (w / 2, h / 2);

    for (i, (x, y)) in [(cx, cy), (cx + 1, cy), (cx, cy + 1)].into_iter().enumerate() {
        if x >= w || y >= h {
            continue;
        }
        // Alpha stays untouched.
        for (c, value) in img.get_pixel_mut(x, y).channels_mut().iter_mut().take(3).enumerate() {
            *value = if nudges[i * 3 + c] {
                value.saturating_add(1)
            } else {
                value.saturating_sub(1)
            };
        }
    }
}
