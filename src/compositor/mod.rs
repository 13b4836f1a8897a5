//! The on-page scene: one product background, at most one shopper overlay.
//!
//! All mutation goes through [`Compositor`] methods, each of which leaves
//! the scene consistent when it returns. Overlay lifecycle:
//! `Absent --set_overlay--> Present --remove_overlay--> Absent`, and
//! `set_overlay` on a present overlay replaces it in place.

pub(crate) mod raster;
mod transform;

use std::time::{SystemTime, UNIX_EPOCH};

use kurbo::{Affine, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canvas::CanvasSize;
use crate::types::Bitmap;

pub use raster::{encode_png, Color, RenderedImage};
pub use transform::{normalize_degrees, OverlayTransform};

pub const DEFAULT_MIN_OVERLAY_SIZE: f64 = 50.0;
pub const HANDLE_COLOR: Color = [0, 123, 255, 255];

#[derive(Debug, Clone, PartialEq)]
pub struct CompositorConfig {
    /// Space kept free around the fitted background, per side.
    pub background_padding: f64,
    pub fill_color: Color,
    /// Initial top-left of a new overlay; not centred, leaving room for
    /// the rotation knob above it.
    pub overlay_offset: (f64, f64),
    /// New overlays are shrunk to fit within this fraction of the canvas.
    pub overlay_max_fraction: f64,
    pub min_overlay_size: f64,
    pub handle_size: f64,
    pub handle_color: Color,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            background_padding: 0.0,
            fill_color: [255, 255, 255, 255],
            overlay_offset: (50.0, 50.0),
            overlay_max_fraction: 0.6,
            min_overlay_size: DEFAULT_MIN_OVERLAY_SIZE,
            handle_size: 12.0,
            handle_color: HANDLE_COLOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GestureError {
    #[error("no design is placed on the canvas")]
    NoOverlay,
    #[error("overlay must stay at least {min}x{min}")]
    BelowMinimum { min: u32 },
    #[error("invalid transform value")]
    InvalidValue,
}

/// The background as placed: uniformly scaled and centred.
#[derive(Debug, Clone)]
pub struct PlacedImage {
    pub bitmap: Bitmap,
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl PlacedImage {
    fn affine(&self) -> Affine {
        Affine::translate((self.x, self.y)) * Affine::scale(self.scale)
    }
}

#[derive(Debug, Clone)]
pub struct Overlay {
    pub bitmap: Bitmap,
    pub transform: OverlayTransform,
    /// Whether transform handles are attached.
    pub selected: bool,
}

impl Overlay {
    pub fn scaled_size(&self) -> (f64, f64) {
        self.transform.scaled_size(self.bitmap.dimensions())
    }
}

/// Solid rectangle painted beneath everything else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillRect {
    pub width: f64,
    pub height: f64,
    pub color: Color,
}

#[derive(Debug, Clone)]
pub struct SceneState {
    pub canvas: CanvasSize,
    pub fill: FillRect,
    pub background: Option<PlacedImage>,
    pub overlay: Option<Overlay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Absent,
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Overlay placement as attached to the cart line item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DesignData {
    pub position: Position,
    pub scale: Position,
    pub rotation: f64,
    pub width: u32,
    pub height: u32,
    pub timestamp: u64,
}

pub struct Compositor {
    scene: SceneState,
    config: CompositorConfig,
    decorations_visible: bool,
}

impl Compositor {
    pub fn new(canvas: CanvasSize, config: CompositorConfig) -> Self {
        let fill = FillRect {
            width: canvas.width as f64,
            height: canvas.height as f64,
            color: config.fill_color,
        };
        Self {
            scene: SceneState {
                canvas,
                fill,
                background: None,
                overlay: None,
            },
            config,
            decorations_visible: true,
        }
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn overlay_state(&self) -> OverlayState {
        if self.scene.overlay.is_some() {
            OverlayState::Present
        } else {
            OverlayState::Absent
        }
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.scene.overlay.as_ref()
    }

    pub fn background(&self) -> Option<&PlacedImage> {
        self.scene.background.as_ref()
    }

    /// Fit `bitmap` inside the canvas (less padding), centre it, and swap
    /// it in. The previous background stays until this single assignment.
    pub fn set_background(&mut self, bitmap: Bitmap) {
        let (cw, ch) = self.canvas_f64();
        let (bw, bh) = (bitmap.width() as f64, bitmap.height() as f64);
        if bw == 0.0 || bh == 0.0 {
            tracing::warn!("ignoring empty background bitmap");
            return;
        }
        let padding = self.config.background_padding;
        let avail_w = (cw - 2.0 * padding).max(1.0);
        let avail_h = (ch - 2.0 * padding).max(1.0);
        let scale = (avail_w / bw).min(avail_h / bh);

        let placed = PlacedImage {
            x: (cw - bw * scale) / 2.0,
            y: (ch - bh * scale) / 2.0,
            scale,
            bitmap,
        };
        tracing::debug!(scale, x = placed.x, y = placed.y, "background placed");
        self.scene.background = Some(placed);
    }

    /// Replace any overlay with `bitmap`, placed at the configured offset
    /// and selected for interaction.
    pub fn set_overlay(&mut self, bitmap: Bitmap) {
        let (cw, ch) = self.canvas_f64();
        let (bw, bh) = (bitmap.width().max(1) as f64, bitmap.height().max(1) as f64);
        let fraction = self.config.overlay_max_fraction;
        let scale = (cw * fraction / bw).min(ch * fraction / bh).min(1.0);
        let (x, y) = self.config.overlay_offset;

        self.scene.overlay = Some(Overlay {
            bitmap,
            transform: OverlayTransform {
                x,
                y,
                scale_x: scale,
                scale_y: scale,
                rotation: 0.0,
            },
            selected: true,
        });
    }

    /// Returns whether an overlay was removed.
    pub fn remove_overlay(&mut self) -> bool {
        self.scene.overlay.take().is_some()
    }

    pub fn center_overlay(&mut self) -> bool {
        let (cw, ch) = self.canvas_f64();
        let Some(overlay) = self.scene.overlay.as_mut() else {
            return false;
        };
        let (w, h) = overlay.scaled_size();
        overlay.transform.x = (cw - w) / 2.0;
        overlay.transform.y = (ch - h) / 2.0;
        true
    }

    pub fn drag_overlay(&mut self, dx: f64, dy: f64) -> Result<(), GestureError> {
        let (x, y) = {
            let t = &self.overlay_ref()?.transform;
            (t.x + dx, t.y + dy)
        };
        self.move_overlay_to(x, y)
    }

    pub fn move_overlay_to(&mut self, x: f64, y: f64) -> Result<(), GestureError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(GestureError::InvalidValue);
        }
        let overlay = self.overlay_mut()?;
        overlay.transform.x = x;
        overlay.transform.y = y;
        Ok(())
    }

    /// Interactive resize to `width` x `height` canvas units. Requests
    /// below the minimum are rejected and the last valid size is kept.
    pub fn resize_overlay(&mut self, width: f64, height: f64) -> Result<(), GestureError> {
        if !width.is_finite() || !height.is_finite() {
            return Err(GestureError::InvalidValue);
        }
        let min = self.config.min_overlay_size;
        let overlay = self.overlay_mut()?;
        if width < min || height < min {
            tracing::debug!(width, height, min, "overlay resize rejected");
            return Err(GestureError::BelowMinimum { min: min as u32 });
        }
        let (nw, nh) = overlay.bitmap.dimensions();
        overlay.transform.scale_x = width / nw.max(1) as f64;
        overlay.transform.scale_y = height / nh.max(1) as f64;
        Ok(())
    }

    /// Pinch-style uniform scaling, subject to the same minimum.
    pub fn scale_overlay_by(&mut self, factor: f64) -> Result<(), GestureError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(GestureError::InvalidValue);
        }
        let (w, h) = self.overlay_ref()?.scaled_size();
        self.resize_overlay(w * factor, h * factor)
    }

    pub fn rotate_overlay_by(&mut self, degrees: f64) -> Result<(), GestureError> {
        let current = self.overlay_ref()?.transform.rotation;
        self.set_overlay_rotation(current + degrees)
    }

    pub fn set_overlay_rotation(&mut self, degrees: f64) -> Result<(), GestureError> {
        if !degrees.is_finite() {
            return Err(GestureError::InvalidValue);
        }
        self.overlay_mut()?.transform.rotation = normalize_degrees(degrees);
        Ok(())
    }

    pub fn select_overlay(&mut self) -> bool {
        self.set_selected(true)
    }

    /// Detach handles from the overlay (keyboard escape).
    pub fn clear_selection(&mut self) -> bool {
        self.set_selected(false)
    }

    /// Applies only when the size actually changes. Image content is not
    /// rescaled; only the surface and fill follow. Sizes outside
    /// `1..=MAX_CANVAS_DIMENSION` are refused and leave the scene untouched.
    pub fn resize(&mut self, size: CanvasSize) -> bool {
        if size == self.scene.canvas {
            return false;
        }
        if let Err(err) = size.validate() {
            tracing::warn!(%size, "canvas resize refused: {err}");
            return false;
        }
        self.scene.canvas = size;
        self.scene.fill.width = size.width as f64;
        self.scene.fill.height = size.height as f64;
        true
    }

    /// Flatten the scene without any handle chrome. Decorations are hidden
    /// for the duration of the call and restored afterwards.
    pub fn render(&mut self) -> RenderedImage {
        let previous = std::mem::replace(&mut self.decorations_visible, false);
        let rendered = self.rasterize();
        self.decorations_visible = previous;
        rendered
    }

    /// Flatten the scene as the shopper sees it, handles included.
    pub fn preview(&self) -> RenderedImage {
        self.rasterize()
    }

    pub fn design_data(&self) -> Option<DesignData> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.design_data_at(now)
    }

    pub fn design_data_at(&self, timestamp: u64) -> Option<DesignData> {
        let overlay = self.scene.overlay.as_ref()?;
        let t = overlay.transform;
        Some(DesignData {
            position: Position { x: t.x, y: t.y },
            scale: Position {
                x: t.scale_x,
                y: t.scale_y,
            },
            rotation: t.rotation,
            width: overlay.bitmap.width(),
            height: overlay.bitmap.height(),
            timestamp,
        })
    }

    fn rasterize(&self) -> RenderedImage {
        let mut canvas = raster::SceneCanvas::new(self.scene.canvas);
        let fill = self.scene.fill;
        canvas.fill_rect(Rect::new(0.0, 0.0, fill.width, fill.height), fill.color);

        if let Some(background) = &self.scene.background {
            canvas.draw_image(background.bitmap.pixels(), background.affine());
        }

        if let Some(overlay) = &self.scene.overlay {
            let natural = overlay.bitmap.dimensions();
            canvas.draw_image(overlay.bitmap.pixels(), overlay.transform.to_affine(natural));
            if overlay.selected && self.decorations_visible {
                let (w, h) = overlay.scaled_size();
                canvas.draw_handles(
                    overlay.transform.box_affine(natural),
                    w,
                    h,
                    self.config.handle_size,
                    self.config.handle_color,
                );
            }
        }

        RenderedImage {
            image: canvas.finish(),
        }
    }

    fn set_selected(&mut self, selected: bool) -> bool {
        match self.scene.overlay.as_mut() {
            Some(overlay) => {
                overlay.selected = selected;
                true
            }
            None => false,
        }
    }

    fn overlay_ref(&self) -> Result<&Overlay, GestureError> {
        self.scene.overlay.as_ref().ok_or(GestureError::NoOverlay)
    }

    fn overlay_mut(&mut self) -> Result<&mut Overlay, GestureError> {
        self.scene.overlay.as_mut().ok_or(GestureError::NoOverlay)
    }

    fn canvas_f64(&self) -> (f64, f64) {
        (
            self.scene.canvas.width as f64,
            self.scene.canvas.height as f64,
        )
    }
}
