//! Core types shared across the pipeline.
//!
//! - [`PageContext`] - Host snapshot the resolver reads
//! - [`Bitmap`] - Decoded image handle

mod bitmap;
mod page;

pub use bitmap::Bitmap;
pub use page::{
    GalleryContainer, GalleryImage, ImageRef, PageContext, PageImage, ProductData, Variant,
};

pub use crate::canvas::CanvasSize;
