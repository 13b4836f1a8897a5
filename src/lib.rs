//! Mockup Builder Library
//!
//! Lets a shopper place an uploaded design over a product photo and send
//! the composited result along with an add-to-cart request.
//!
//! # Module Overview
//!
//! - [`resolver`] - Picks the product image for the current variant
//! - [`image_loader`] - Fetch-with-retry and decoding of images and uploads
//! - [`compositor`] - Background/overlay scene, gestures and rasterisation
//! - [`builder`] - Per-page context tying the pipeline together
//! - [`runtime`] - Async actor driving a builder from host events
//! - [`cart`] - Add-to-cart submission
//! - [`config`] - Configuration file support
//! - [`output`] - JSON output schemas
//!
//! # Example
//!
//! ```no_run
//! use mockup_lib::{ImageLoader, MockupBuilder, PageContext, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> mockup_lib::Result<()> {
//! let page = PageContext::from_json(r#"{"gallery":[{"src":"//cdn.shopify.com/tee.png","container":"primary"}]}"#)?;
//! let mut builder = MockupBuilder::default();
//! let loader = ImageLoader::http(RetryPolicy::default(), Duration::from_secs(30))?;
//!
//! if let Some(request) = builder.begin_background_refresh(&page) {
//!     let result = loader.load(&request.url).await;
//!     builder.apply_background(request.token, result);
//! }
//! let png = builder.screenshot().to_png()?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod canvas;
pub mod cart;
pub mod compositor;
pub mod config;
pub mod debounce;
pub mod error;
pub mod events;
pub mod image_loader;
pub mod output;
pub mod resolver;
pub mod retry;
pub mod runtime;
pub mod source;
pub mod types;
pub mod upload;

pub use builder::{BackgroundOutcome, BackgroundRequest, MockupBuilder};
pub use canvas::{CanvasSize, CanvasSizeError, MAX_CANVAS_DIMENSION};
pub use cart::{
    is_cart_add_action, CartBackend, CartClient, CartForm, CartItem, CartSubmission,
    ScreenshotMode,
};
pub use compositor::{
    Compositor, CompositorConfig, DesignData, GestureError, OverlayState, OverlayTransform,
    RenderedImage,
};
pub use config::Config;
pub use debounce::debounce;
pub use error::{ErrorCategory, ErrorPayload, MockupError, Result};
pub use events::{Gesture, HostEvent, Notification, NotificationLevel, UiEvent, VariantSignalKind};
pub use image_loader::{
    decode_bytes, decode_with_hint, load_from_file, load_from_path, FetchError, Fetched, Fetcher, HttpFetcher,
    ImageLoader,
};
pub use output::{
    ComposeOutput, ErrorOutput, MockupOutput, ResolveOutput, SubmitOutput, MOCKUP_OUTPUT_VERSION,
};
pub use resolver::{
    normalize_image_url, CandidateStrategy, FnStrategy, Resolution, Resolver, ResolverConfig,
    StrategyError,
};
pub use retry::{retry_with_backoff, Backoff, RetryExhausted, RetryPolicy, Sleeper, TokioSleeper};
pub use runtime::{BuilderRuntime, RuntimeOptions};
pub use source::{parse_source, ImageSource, SourceParseError};
pub use types::{Bitmap, PageContext};
pub use upload::{UploadConstraint, UploadedFile, ValidationError};
