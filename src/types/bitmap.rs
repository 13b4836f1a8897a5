use std::sync::Arc;

use image::{DynamicImage, RgbaImage};

/// A decoded image, shared cheaply between the loader and the scene.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pixels: Arc<RgbaImage>,
}

impl Bitmap {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// True when both handles point at the same decoded buffer.
    pub fn same_as(&self, other: &Bitmap) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

impl From<DynamicImage> for Bitmap {
    fn from(img: DynamicImage) -> Self {
        Bitmap::new(img.to_rgba8())
    }
}

impl From<RgbaImage> for Bitmap {
    fn from(img: RgbaImage) -> Self {
        Bitmap::new(img)
    }
}
