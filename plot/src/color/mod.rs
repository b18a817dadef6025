mod threshold;

pub use threshold::{luma, threshold};

use crate::error::PackError;
use image::imageops::rotate270;
use image::GrayImage;

/// Packs a two-level image into the panel's 1 bit per pixel layout.
///
/// Bytes start out white (`0xFF`); every black pixel clears its bit, MSB first.
/// A portrait image is turned to landscape first, counter-clockwise.
pub fn gray_to_display_1bit(
    image: &GrayImage,
    panel_width: u32,
    panel_height: u32,
) -> Result<Vec<u8>, PackError> {
    let rotated;
    let image = match image.dimensions() {
        (w, h) if (w, h) == (panel_width, panel_height) => image,
        (w, h) if (w, h) == (panel_height, panel_width) => {
            rotated = rotate270(image);
            &rotated
        }
        (width, height) => {
            return Err(PackError::Dimensions {
                width,
                height,
                panel_width,
                panel_height,
            })
        }
    };

    let line_width = panel_width.div_ceil(8) as usize;
    let mut buffer = vec![0xFF; line_width * panel_height as usize];
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel.0[0] == 0 {
            buffer[y as usize * line_width + x as usize / 8] &= !(0x80 >> (x % 8));
        }
    }
    Ok(buffer)
}
