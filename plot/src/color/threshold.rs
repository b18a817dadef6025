use image::{GrayImage, Luma, Rgb, RgbImage};

/// ITU-R 601-2 luma, 16 bit fixed point.
pub fn luma(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0.map(u32::from);
    ((r * 19_595 + g * 38_470 + b * 7_471 + 0x8000) >> 16) as u8
}

/// Two-level image: luma strictly above `level` becomes white, everything else black.
pub fn threshold(image: &RgbImage, level: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if luma(image.get_pixel(x, y)) > level {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
