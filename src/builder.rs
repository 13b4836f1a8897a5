//! The mockup builder context.
//!
//! One [`MockupBuilder`] per product page, owned by whoever drives it (the
//! runtime actor, or a CLI command). There is no global instance.

use crate::canvas::CanvasSize;
use crate::cart::{CartForm, CartSubmission};
use crate::compositor::{
    Compositor, CompositorConfig, DesignData, GestureError, OverlayState, RenderedImage,
};
use crate::config::Config;
use crate::error::{MockupError, Result};
use crate::events::Gesture;
use crate::image_loader::load_from_file;
use crate::resolver::{Resolution, Resolver};
use crate::types::{Bitmap, PageContext};
use crate::upload::{UploadConstraint, UploadedFile};

/// A background load the caller should perform and hand back to
/// [`MockupBuilder::apply_background`] with the same token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundRequest {
    pub token: u64,
    pub url: String,
    pub strategy: String,
}

#[derive(Debug)]
pub enum BackgroundOutcome {
    Applied { url: String },
    /// A newer request was issued after this one; the result was dropped.
    Stale,
    /// The latest request failed; the previous background is still shown.
    Failed(MockupError),
}

pub struct MockupBuilder {
    compositor: Compositor,
    resolver: Resolver,
    upload: UploadConstraint,
    latest_token: u64,
    pending: Option<BackgroundRequest>,
    displayed_url: Option<String>,
    design_file: Option<UploadedFile>,
}

impl MockupBuilder {
    pub fn new(
        canvas: CanvasSize,
        compositor: CompositorConfig,
        resolver: Resolver,
        upload: UploadConstraint,
    ) -> Self {
        Self {
            compositor: Compositor::new(canvas, compositor),
            resolver,
            upload,
            latest_token: 0,
            pending: None,
            displayed_url: None,
            design_file: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let compositor = config.compositor_config().map_err(MockupError::Config)?;
        Ok(Self::new(
            config.canvas_size(),
            compositor,
            Resolver::standard(&config.resolver),
            config.upload.clone(),
        ))
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn upload_constraint(&self) -> &UploadConstraint {
        &self.upload
    }

    pub fn displayed_url(&self) -> Option<&str> {
        self.displayed_url.as_deref()
    }

    pub fn pending_request(&self) -> Option<&BackgroundRequest> {
        self.pending.as_ref()
    }

    pub fn resolve(&self, page: &PageContext) -> Option<Resolution> {
        self.resolver.resolve_candidate(page)
    }

    /// Resolve the product image for `page` and issue a new request token.
    /// Returns `None` when nothing resolves, or when the resolved image is
    /// already on screen with no load in flight.
    pub fn begin_background_refresh(&mut self, page: &PageContext) -> Option<BackgroundRequest> {
        let Some(resolution) = self.resolver.resolve_candidate(page) else {
            tracing::warn!("no product image found for current variant");
            return None;
        };
        if self.pending.is_none() && self.displayed_url.as_deref() == Some(resolution.url.as_str())
        {
            tracing::debug!(url = %resolution.url, "background already displayed");
            return None;
        }
        Some(self.issue_request(resolution.url, resolution.strategy))
    }

    /// Issue a token for an explicit background URL, bypassing resolution.
    pub fn request_background(&mut self, url: impl Into<String>) -> BackgroundRequest {
        self.issue_request(url.into(), "explicit".to_string())
    }

    fn issue_request(&mut self, url: String, strategy: String) -> BackgroundRequest {
        self.latest_token += 1;
        let request = BackgroundRequest {
            token: self.latest_token,
            url,
            strategy,
        };
        tracing::debug!(token = request.token, url = %request.url, "background requested");
        self.pending = Some(request.clone());
        request
    }

    /// Apply a finished load. Only the most recently issued token may
    /// touch the scene; the swap happens only once the bitmap is decoded.
    pub fn apply_background(&mut self, token: u64, result: Result<Bitmap>) -> BackgroundOutcome {
        if token != self.latest_token {
            tracing::debug!(token, latest = self.latest_token, "discarding stale background");
            return BackgroundOutcome::Stale;
        }
        let Some(request) = self.pending.take() else {
            return BackgroundOutcome::Stale;
        };
        match result {
            Ok(bitmap) => {
                self.compositor.set_background(bitmap);
                self.displayed_url = Some(request.url.clone());
                BackgroundOutcome::Applied { url: request.url }
            }
            Err(err) => {
                tracing::warn!(url = %request.url, error = %err, "keeping previous background");
                BackgroundOutcome::Failed(err)
            }
        }
    }

    /// Validate and decode `file`, then place it as the overlay.
    pub fn select_file(&mut self, file: UploadedFile) -> Result<()> {
        let bitmap = load_from_file(&file, &self.upload)?;
        self.place_design(file, bitmap);
        Ok(())
    }

    /// Place an already decoded design.
    pub fn place_design(&mut self, file: UploadedFile, bitmap: Bitmap) {
        tracing::info!(file = %file.name, size = file.size(), "design placed");
        self.compositor.set_overlay(bitmap);
        self.design_file = Some(file);
    }

    pub fn design_file(&self) -> Option<&UploadedFile> {
        self.design_file.as_ref()
    }

    pub fn has_design(&self) -> bool {
        self.compositor.overlay_state() == OverlayState::Present
    }

    pub fn remove_design(&mut self) -> bool {
        self.design_file = None;
        self.compositor.remove_overlay()
    }

    pub fn center_design(&mut self) -> bool {
        self.compositor.center_overlay()
    }

    pub fn clear_selection(&mut self) -> bool {
        self.compositor.clear_selection()
    }

    pub fn apply_gesture(&mut self, gesture: Gesture) -> std::result::Result<(), GestureError> {
        let compositor = &mut self.compositor;
        match gesture {
            Gesture::Drag { dx, dy } => compositor.drag_overlay(dx, dy),
            Gesture::MoveTo { x, y } => compositor.move_overlay_to(x, y),
            Gesture::Resize { width, height } => compositor.resize_overlay(width, height),
            Gesture::Pinch { factor } => compositor.scale_overlay_by(factor),
            Gesture::Rotate { degrees } => compositor.rotate_overlay_by(degrees),
            Gesture::SetRotation { degrees } => compositor.set_overlay_rotation(degrees),
            Gesture::Select => {
                if compositor.select_overlay() {
                    Ok(())
                } else {
                    Err(GestureError::NoOverlay)
                }
            }
        }
    }

    pub fn resize_canvas(&mut self, size: CanvasSize) -> bool {
        self.compositor.resize(size)
    }

    pub fn design_data(&self) -> Option<DesignData> {
        self.compositor.design_data()
    }

    /// Chrome-free render of the current scene.
    pub fn screenshot(&mut self) -> RenderedImage {
        self.compositor.render()
    }

    /// Snapshot everything an add-to-cart request carries. Mockup parts
    /// are attached only when a design is placed.
    pub fn prepare_submission(&mut self, form: CartForm) -> CartSubmission {
        if !self.has_design() {
            return CartSubmission {
                form,
                screenshot: None,
                design_data: None,
                design_file: None,
            };
        }
        CartSubmission {
            form,
            screenshot: Some(self.screenshot()),
            design_data: self.design_data(),
            design_file: self.design_file.clone(),
        }
    }
}

impl Default for MockupBuilder {
    fn default() -> Self {
        Self::new(
            CanvasSize::default(),
            CompositorConfig::default(),
            Resolver::default(),
            UploadConstraint::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::encode_png;
    use image::{Rgba, RgbaImage};

    fn page(selected_image: &str) -> PageContext {
        PageContext::from_json(&format!(
            r#"{{
                "selectedVariantId": "1",
                "product": {{ "variants": [ {{ "id": 1, "featured_image": "{selected_image}" }} ] }}
            }}"#
        ))
        .expect("page json")
    }

    fn bitmap(width: u32, height: u32) -> Bitmap {
        Bitmap::new(RgbaImage::from_pixel(width, height, Rgba([9, 9, 9, 255])))
    }

    fn png_upload(name: &str, width: u32, height: u32) -> UploadedFile {
        let bytes = encode_png(&RgbaImage::from_pixel(width, height, Rgba([1, 2, 3, 255])))
            .expect("encode");
        UploadedFile::new(name, "image/png", bytes)
    }

    #[test]
    fn tokens_increase_and_latest_wins() {
        let mut builder = MockupBuilder::default();
        let first = builder
            .begin_background_refresh(&page("//cdn.shopify.com/a.png"))
            .expect("first request");
        let second = builder
            .begin_background_refresh(&page("//cdn.shopify.com/b.png"))
            .expect("second request");
        assert!(second.token > first.token);
        assert_eq!(second.url, "https://cdn.shopify.com/b.png");

        let newer = bitmap(20, 20);
        assert!(matches!(
            builder.apply_background(second.token, Ok(newer.clone())),
            BackgroundOutcome::Applied { .. }
        ));
        assert!(matches!(
            builder.apply_background(first.token, Ok(bitmap(10, 10))),
            BackgroundOutcome::Stale
        ));

        let shown = builder.compositor().background().expect("background");
        assert!(shown.bitmap.same_as(&newer));
        assert_eq!(builder.displayed_url(), Some("https://cdn.shopify.com/b.png"));
    }

    #[test]
    fn stale_result_arriving_first_is_still_discarded() {
        let mut builder = MockupBuilder::default();
        let first = builder
            .begin_background_refresh(&page("https://cdn.shopify.com/a.png"))
            .unwrap();
        let second = builder
            .begin_background_refresh(&page("https://cdn.shopify.com/b.png"))
            .unwrap();

        assert!(matches!(
            builder.apply_background(first.token, Ok(bitmap(10, 10))),
            BackgroundOutcome::Stale
        ));
        assert!(builder.compositor().background().is_none());
        assert!(matches!(
            builder.apply_background(second.token, Ok(bitmap(10, 10))),
            BackgroundOutcome::Applied { .. }
        ));
    }

    #[test]
    fn failed_load_keeps_last_known_good_background() {
        let mut builder = MockupBuilder::default();
        let ok = builder
            .begin_background_refresh(&page("https://cdn.shopify.com/a.png"))
            .unwrap();
        let good = bitmap(30, 30);
        builder.apply_background(ok.token, Ok(good.clone()));

        let failing = builder
            .begin_background_refresh(&page("https://cdn.shopify.com/b.png"))
            .unwrap();
        let outcome =
            builder.apply_background(failing.token, Err(MockupError::decode("truncated")));
        assert!(matches!(outcome, BackgroundOutcome::Failed(MockupError::Decode(_))));
        assert!(builder.compositor().background().unwrap().bitmap.same_as(&good));
        assert_eq!(builder.displayed_url(), Some("https://cdn.shopify.com/a.png"));
    }

    #[test]
    fn refresh_is_skipped_when_image_already_displayed() {
        let mut builder = MockupBuilder::default();
        let ctx = page("https://cdn.shopify.com/a.png");
        let request = builder.begin_background_refresh(&ctx).unwrap();
        builder.apply_background(request.token, Ok(bitmap(5, 5)));

        assert!(builder.begin_background_refresh(&ctx).is_none());
        assert!(builder
            .begin_background_refresh(&page("https://cdn.shopify.com/c.png"))
            .is_some());
    }

    #[test]
    fn unresolvable_page_issues_no_request() {
        let mut builder = MockupBuilder::default();
        assert!(builder
            .begin_background_refresh(&PageContext::default())
            .is_none());
        assert!(builder.pending_request().is_none());
    }

    #[test]
    fn valid_upload_becomes_overlay_and_invalid_is_rejected_first() {
        let mut builder = MockupBuilder::default();
        builder
            .select_file(png_upload("design.png", 40, 40))
            .expect("valid upload");
        assert!(builder.has_design());
        assert_eq!(builder.design_file().unwrap().name, "design.png");

        let oversized = UploadedFile::new("huge.jpg", "image/jpeg", vec![0; 6 * 1024 * 1024]);
        assert!(matches!(
            builder.select_file(oversized),
            Err(MockupError::Validation(_))
        ));
        assert_eq!(builder.design_file().unwrap().name, "design.png");
    }

    #[test]
    fn submission_carries_mockup_parts_only_with_design() {
        let mut builder = MockupBuilder::default();
        let bare = builder.prepare_submission(CartForm::for_variant("/cart/add", "1", 1));
        assert!(bare.screenshot.is_none() && bare.design_data.is_none());

        builder.select_file(png_upload("d.png", 60, 60)).unwrap();
        let full = builder.prepare_submission(CartForm::for_variant("/cart/add", "1", 1));
        let screenshot = full.screenshot.expect("screenshot");
        assert_eq!((screenshot.width(), screenshot.height()), (700, 700));
        assert_eq!(full.design_data.unwrap().width, 60);
        assert_eq!(full.design_file.unwrap().name, "d.png");
    }

    #[test]
    fn remove_design_clears_overlay_and_file() {
        let mut builder = MockupBuilder::default();
        builder.select_file(png_upload("d.png", 60, 60)).unwrap();
        assert!(builder.remove_design());
        assert!(!builder.remove_design());
        assert!(builder.design_file().is_none());
        assert_eq!(
            builder.apply_gesture(Gesture::Select),
            Err(GestureError::NoOverlay)
        );
    }
}
