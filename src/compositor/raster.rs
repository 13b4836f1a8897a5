//! Scene rasterisation on `vello_cpu`, plus the PNG / data-URL glue.

use std::io::Cursor;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use kurbo::{Affine, BezPath, PathEl, Point, Rect};
use vello_cpu::peniko::color::PremulRgba8;

use crate::canvas::CanvasSize;
use crate::error::Result;

pub type Color = [u8; 4];

/// Distance of the rotation knob above the overlay's top edge.
const KNOB_OFFSET: f64 = 30.0;
const HANDLE_STROKE_WIDTH: f64 = 2.0;

/// A flattened, chrome-free (or chrome-bearing, for previews) scene.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    pub image: RgbaImage,
}

impl RenderedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }

    pub fn to_data_url(&self) -> Result<String> {
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(self.to_png()?)))
    }
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    PngEncoder::new(&mut buf).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgba8,
    )?;
    Ok(buf.into_inner())
}

/// One render pass. Draw calls are recorded on a `vello_cpu` context and
/// flattened into an [`RgbaImage`] by [`SceneCanvas::finish`].
pub struct SceneCanvas {
    ctx: vello_cpu::RenderContext,
    width: u16,
    height: u16,
}

impl SceneCanvas {
    /// Canvas sizes are capped well below `u16::MAX` by [`CanvasSize`].
    pub fn new(size: CanvasSize) -> Self {
        let width = u16::try_from(size.width).unwrap_or(u16::MAX);
        let height = u16::try_from(size.height).unwrap_or(u16::MAX);
        Self {
            ctx: vello_cpu::RenderContext::new(width, height),
            width,
            height,
        }
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_paint(paint_color(color));
        self.ctx.fill_rect(&rect_to_cpu(rect));
    }

    /// Draw `src` through `transform` (source pixel space to canvas space).
    pub fn draw_image(&mut self, src: &RgbaImage, transform: Affine) {
        let Some(paint) = image_paint(src) else {
            tracing::warn!(
                width = src.width(),
                height = src.height(),
                "image too large to rasterise, skipped"
            );
            return;
        };
        if transform.determinant().abs() < f64::EPSILON {
            return;
        }
        self.ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_transform(affine_to_cpu(transform));
        self.ctx.set_paint(paint);
        self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(src.width()),
            f64::from(src.height()),
        ));
    }

    /// Outline of a transformed `width` x `height` box, a stem up to the
    /// rotation knob, and square grips on the corners and the knob.
    pub fn draw_handles(
        &mut self,
        transform: Affine,
        width: f64,
        height: f64,
        handle_size: f64,
        color: Color,
    ) {
        let corners = [
            transform * Point::new(0.0, 0.0),
            transform * Point::new(width, 0.0),
            transform * Point::new(width, height),
            transform * Point::new(0.0, height),
        ];
        let top_mid = transform * Point::new(width / 2.0, 0.0);
        let knob = transform * Point::new(width / 2.0, -KNOB_OFFSET);

        let mut outline = BezPath::new();
        outline.move_to(corners[0]);
        for corner in &corners[1..] {
            outline.line_to(*corner);
        }
        outline.close_path();
        outline.move_to(top_mid);
        outline.line_to(knob);

        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_paint(paint_color(color));
        self.ctx
            .set_stroke(vello_cpu::kurbo::Stroke::new(HANDLE_STROKE_WIDTH));
        self.ctx.stroke_path(&bezpath_to_cpu(&outline));

        let half = handle_size / 2.0;
        for point in corners.into_iter().chain(std::iter::once(knob)) {
            self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                point.x - half,
                point.y - half,
                point.x + half,
                point.y + half,
            ));
        }
    }

    pub fn finish(mut self) -> RgbaImage {
        let mut pixmap = vello_cpu::Pixmap::new(self.width, self.height);
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut pixmap);
        let mut raw = pixmap.data_as_u8_slice().to_vec();
        unpremultiply_in_place(&mut raw);
        RgbaImage::from_raw(u32::from(self.width), u32::from(self.height), raw)
            .unwrap_or_else(|| RgbaImage::new(u32::from(self.width), u32::from(self.height)))
    }
}

fn paint_color([r, g, b, a]: Color) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(r, g, b, a)
}

/// `None` when the bitmap does not fit a `vello_cpu` pixmap.
fn image_paint(src: &RgbaImage) -> Option<vello_cpu::Image> {
    let width = u16::try_from(src.width()).ok()?;
    let height = u16::try_from(src.height()).ok()?;
    let mut may_have_opacities = false;
    let pixels: Vec<PremulRgba8> = src
        .pixels()
        .map(|px| {
            let [r, g, b, a] = px.0;
            may_have_opacities |= a != 255;
            PremulRgba8 {
                r: premultiply(r, a),
                g: premultiply(g, a),
                b: premultiply(b, a),
                a,
            }
        })
        .collect();
    let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(pixels, width, height, may_have_opacities);
    Some(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

fn premultiply(channel: u8, alpha: u8) -> u8 {
    ((u16::from(channel) * u16::from(alpha) + 127) / 255) as u8
}

pub(crate) fn unpremultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        match a {
            0 => px[..3].fill(0),
            255 => {}
            _ => {
                for c in &mut px[..3] {
                    *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn close(a: Color, b: Color) -> bool {
        a.iter().zip(b).all(|(x, y)| x.abs_diff(y) <= 2)
    }

    #[test]
    fn premultiply_round_trip_keeps_opaque_and_clears_transparent() {
        let mut raw = vec![
            premultiply(200, 255),
            premultiply(10, 255),
            premultiply(30, 255),
            255,
            premultiply(200, 0),
            0,
            0,
            0,
            premultiply(255, 128),
            premultiply(0, 128),
            premultiply(0, 128),
            128,
        ];
        unpremultiply_in_place(&mut raw);
        assert_eq!(&raw[0..4], &[200, 10, 30, 255]);
        assert_eq!(&raw[4..8], &[0, 0, 0, 0]);
        assert!(raw[8] >= 253 && raw[11] == 128);
    }

    #[test]
    fn translated_image_lands_on_its_pixels() {
        let mut canvas = SceneCanvas::new(CanvasSize::new(8, 8));
        canvas.fill_rect(Rect::new(0.0, 0.0, 8.0, 8.0), [255, 255, 255, 255]);
        let src = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        canvas.draw_image(&src, Affine::translate((2.0, 2.0)));
        let out = canvas.finish();

        assert!(close(out.get_pixel(3, 3).0, [10, 20, 30, 255]));
        assert!(close(out.get_pixel(4, 4).0, [10, 20, 30, 255]));
        assert!(close(out.get_pixel(0, 0).0, [255, 255, 255, 255]));
        assert!(close(out.get_pixel(7, 7).0, [255, 255, 255, 255]));
    }

    #[test]
    fn off_canvas_drawing_is_clipped() {
        let mut canvas = SceneCanvas::new(CanvasSize::new(4, 4));
        canvas.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), [255, 255, 255, 255]);
        let src = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        canvas.draw_image(&src, Affine::translate((10.0, -10.0)));
        let out = canvas.finish();
        assert!(out.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn handles_paint_grips_at_the_corners() {
        let mut canvas = SceneCanvas::new(CanvasSize::new(100, 100));
        canvas.draw_handles(Affine::translate((40.0, 40.0)), 40.0, 40.0, 12.0, [0, 123, 255, 255]);
        let out = canvas.finish();
        assert!(close(out.get_pixel(40, 40).0, [0, 123, 255, 255]));
        assert!(close(out.get_pixel(80, 80).0, [0, 123, 255, 255]));
        // knob above the top edge
        assert!(close(out.get_pixel(60, 10).0, [0, 123, 255, 255]));
        // box interior stays empty
        assert_eq!(out.get_pixel(60, 60).0[3], 0);
    }

    #[test]
    fn png_encoding_keeps_dimensions() {
        let rendered = RenderedImage {
            image: RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255])),
        };
        let decoded = image::load_from_memory(&rendered.to_png().unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
        assert!(rendered
            .to_data_url()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }
}
