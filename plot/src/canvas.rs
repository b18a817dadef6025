use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use image::{Rgb, RgbImage};
use std::convert::Infallible;

/// `embedded-graphics` draw target backed by an RGB image.
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    /// White canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Canvas {
            image: RgbImage::from_pixel(width, height, Rgb([255, 255, 255])),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) else {
                continue;
            };
            if x < self.image.width() && y < self.image.height() {
                self.image
                    .put_pixel(x, y, Rgb([color.r(), color.g(), color.b()]));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clips_pixels_outside_the_image() {
        let mut canvas = Canvas::new(4, 3);
        let pixels = [
            Pixel(Point::new(1, 1), Rgb888::RED),
            Pixel(Point::new(-1, 0), Rgb888::RED),
            Pixel(Point::new(4, 0), Rgb888::RED),
        ];
        canvas.draw_iter(pixels).unwrap();
        assert_eq!(canvas.image().get_pixel(1, 1), &Rgb([255, 0, 0]));
        assert_eq!(canvas.image().get_pixel(3, 0), &Rgb([255, 255, 255]));
        assert_eq!(canvas.size(), Size::new(4, 3));
    }
}
