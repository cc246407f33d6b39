//! Rendered page bitmaps and their target sizes

use crate::error::{Error, Result};
use image::{imageops::FilterType, DynamicImage, Rgba, RgbaImage};
use std::path::Path;

/// Pixel size a page is rendered at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A4-like page size filling the available display width (height = width × √2).
    pub fn for_display_width(width: u32) -> Self {
        let height = (width as f32 * std::f32::consts::SQRT_2) as u32;
        Self { width, height }
    }

    /// Reject sizes with a zero dimension
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidTargetSize {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Bytes needed for an RGBA bitmap of this size
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// RGBA raster output of one page
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    image: RgbaImage,
}

impl Bitmap {
    /// White bitmap, the placeholder shown for pages that are not rendered yet
    pub fn blank(size: TargetSize) -> Self {
        Self {
            image: RgbaImage::from_pixel(size.width, size.height, Rgba([255, 255, 255, 255])),
        }
    }

    /// Wrap backend output, stretching it to exactly `size` when the backend
    /// preserved the page's own aspect ratio.
    pub fn from_image(image: DynamicImage, size: TargetSize) -> Self {
        let rgba = image.to_rgba8();
        if rgba.width() == size.width && rgba.height() == size.height {
            return Self { image: rgba };
        }
        Self {
            image: image::imageops::resize(&rgba, size.width, size.height, FilterType::Triangle),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn size(&self) -> TargetSize {
        TargetSize::new(self.width(), self.height())
    }

    /// Size of the pixel buffer in bytes
    pub fn byte_len(&self) -> usize {
        self.image.as_raw().len()
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// Encode the bitmap as PNG
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(Error::from)
    }
}
