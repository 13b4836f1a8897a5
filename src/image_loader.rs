use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use thiserror::Error;
use url::Url;

use crate::error::{MockupError, Result};
use crate::resolver::normalize_image_url;
use crate::retry::{retry_with_backoff, RetryPolicy, Sleeper, TokioSleeper};
use crate::types::Bitmap;
use crate::upload::{UploadConstraint, UploadedFile};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Largest edge an SVG is rasterised to.
const MAX_SVG_DIMENSION: u32 = 4096;

/// Why a single fetch attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("{0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Retrieves raw bytes for a URL. One call is one attempt.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, std::result::Result<Fetched, FetchError>>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(MockupError::Network)?;
        Ok(Self { http })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, std::result::Result<Fetched, FetchError>> {
        Box::pin(async move {
            let response = self
                .http
                .get(url.clone())
                .send()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            let bytes = response
                .bytes()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;

            Ok(Fetched {
                bytes: bytes.to_vec(),
                content_type,
            })
        })
    }
}

/// Fetches and decodes images with bounded retry.
#[derive(Clone)]
pub struct ImageLoader {
    fetcher: Arc<dyn Fetcher>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl ImageLoader {
    pub fn new(fetcher: Arc<dyn Fetcher>, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            sleeper: Arc::new(TokioSleeper),
            policy,
        }
    }

    pub fn http(policy: RetryPolicy, timeout: Duration) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpFetcher::with_timeout(timeout)?), policy))
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn load(&self, url: &str) -> Result<Bitmap> {
        self.load_with_attempts(url, self.policy.max_attempts).await
    }

    /// Fetch with retry, then decode once. Decode failures are not retried.
    #[tracing::instrument(skip(self, url), fields(url = %url))]
    pub async fn load_with_attempts(&self, url: &str, max_attempts: u32) -> Result<Bitmap> {
        let normalized = normalize_image_url(url);
        let parsed = Url::parse(&normalized)?;
        let policy = self.policy.with_max_attempts(max_attempts);

        let fetched = retry_with_backoff(&policy, self.sleeper.as_ref(), |attempt| {
            tracing::debug!(attempt, "fetching image");
            self.fetcher.fetch(&parsed)
        })
        .await
        .map_err(|exhausted| {
            tracing::warn!(
                attempts = exhausted.attempts,
                error = %exhausted.last,
                "image load failed"
            );
            MockupError::Load {
                url: normalized.clone(),
                attempts: exhausted.attempts,
                cause: exhausted.last,
            }
        })?;

        decode_off_thread(fetched.bytes, fetched.content_type).await
    }
}

/// Decode on a blocking worker. The buffer moves into the worker and is
/// released when decoding finishes, whatever the outcome.
async fn decode_off_thread(bytes: Vec<u8>, content_type: Option<String>) -> Result<Bitmap> {
    tokio::task::spawn_blocking(move || decode_with_hint(bytes, content_type.as_deref()))
        .await
        .map_err(|e| MockupError::Unknown(format!("decode worker failed: {e}")))?
}

pub fn decode_bytes(bytes: Vec<u8>) -> Result<Bitmap> {
    decode_with_hint(bytes, None)
}

/// Decode raster formats through `image`, and SVG (by mime or by sniffing
/// the markup) through `resvg`.
pub fn decode_with_hint(bytes: Vec<u8>, mime: Option<&str>) -> Result<Bitmap> {
    let svg_mime = mime.is_some_and(|m| m.trim().starts_with("image/svg+xml"));
    if svg_mime || looks_like_svg(&bytes) {
        return rasterize_svg(&bytes);
    }
    let decoded = image::load_from_memory(&bytes).map_err(|e| {
        tracing::warn!(error = %e, len = bytes.len(), "image decode failed");
        MockupError::decode(e.to_string())
    })?;
    Ok(Bitmap::from(decoded))
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg"))
}

/// Rasterise at the document's intrinsic size, scaled down to fit
/// `MAX_SVG_DIMENSION` when larger.
fn rasterize_svg(bytes: &[u8]) -> Result<Bitmap> {
    let tree = usvg::Tree::from_data(bytes, &usvg::Options::default()).map_err(|e| {
        tracing::warn!(error = %e, len = bytes.len(), "svg parse failed");
        MockupError::decode(format!("invalid SVG: {e}"))
    })?;

    let size = tree.size();
    let (w, h) = (size.width(), size.height());
    if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
        return Err(MockupError::decode("SVG has no usable width/height"));
    }
    let fit = (MAX_SVG_DIMENSION as f32 / w.max(h)).min(1.0);
    let width = ((w * fit).ceil() as u32).max(1);
    let height = ((h * fit).ceil() as u32).max(1);

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| MockupError::decode("failed to allocate SVG pixmap"))?;
    let scale = resvg::tiny_skia::Transform::from_scale(width as f32 / w, height as f32 / h);
    resvg::render(&tree, scale, &mut pixmap.as_mut());

    let mut raw = pixmap.take();
    crate::compositor::raster::unpremultiply_in_place(&mut raw);
    let image = image::RgbaImage::from_raw(width, height, raw)
        .ok_or_else(|| MockupError::decode("SVG raster has unexpected length"))?;
    Ok(Bitmap::from(image))
}

/// Validate a shopper upload, then decode it once. Validation happens
/// before any decode attempt.
pub fn load_from_file(file: &UploadedFile, constraint: &UploadConstraint) -> Result<Bitmap> {
    constraint.validate(file).map_err(|e| {
        tracing::info!(file = %file.name, error = %e, "upload rejected");
        MockupError::Validation(e)
    })?;
    decode_with_hint(file.bytes.clone(), Some(&file.mime_type))
}

/// Load an image from a local path.
pub fn load_from_path(path: &Path) -> Result<Bitmap> {
    if !path.exists() {
        return Err(MockupError::Config(format!(
            "Local file not found: {}",
            path.display()
        )));
    }
    let bytes = std::fs::read(path)?;
    decode_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::encode_png;
    use crate::retry::tests::RecordingSleeper;
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct ScriptedFetcher {
        failures_before_success: usize,
        body: Vec<u8>,
        requests: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn new(failures_before_success: usize, body: Vec<u8>) -> Self {
            Self {
                failures_before_success,
                body,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Fetcher for ScriptedFetcher {
        fn fetch<'a>(
            &'a self,
            url: &'a Url,
        ) -> BoxFuture<'a, std::result::Result<Fetched, FetchError>> {
            let mut requests = self.requests.lock().unwrap();
            requests.push(url.to_string());
            let result = if requests.len() <= self.failures_before_success {
                Err(FetchError::Status(503))
            } else {
                Ok(Fetched {
                    bytes: self.body.clone(),
                    content_type: Some("image/png".into()),
                })
            };
            Box::pin(async move { result })
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 255])))
            .expect("encode png")
    }

    fn loader(fetcher: Arc<ScriptedFetcher>, sleeper: &RecordingSleeper) -> ImageLoader {
        ImageLoader::new(fetcher, RetryPolicy::default()).with_sleeper(Arc::new(sleeper.clone()))
    }

    #[tokio::test]
    async fn always_failing_url_makes_three_attempts_then_fails() {
        let fetcher = Arc::new(ScriptedFetcher::new(usize::MAX, Vec::new()));
        let sleeper = RecordingSleeper::default();

        let err = loader(fetcher.clone(), &sleeper)
            .load_with_attempts("https://cdn.example.com/a.png", 3)
            .await
            .unwrap_err();

        match err {
            MockupError::Load {
                attempts, cause, ..
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(cause, FetchError::Status(503));
            }
            other => panic!("expected load error, got {other:?}"),
        }
        assert_eq!(fetcher.requests().len(), 3);
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn transient_failure_recovers_and_decodes() {
        let fetcher = Arc::new(ScriptedFetcher::new(1, png(8, 4)));
        let sleeper = RecordingSleeper::default();

        let bitmap = loader(fetcher.clone(), &sleeper)
            .load("https://cdn.example.com/a.png")
            .await
            .expect("load after retry");

        assert_eq!(bitmap.dimensions(), (8, 4));
        assert_eq!(fetcher.requests().len(), 2);
    }

    #[tokio::test]
    async fn protocol_relative_url_is_fetched_over_https() {
        let fetcher = Arc::new(ScriptedFetcher::new(0, png(2, 2)));
        let sleeper = RecordingSleeper::default();

        loader(fetcher.clone(), &sleeper)
            .load("//cdn.example.com/a.png")
            .await
            .expect("load");

        assert_eq!(fetcher.requests(), vec!["https://cdn.example.com/a.png"]);
    }

    #[tokio::test]
    async fn malformed_bytes_fail_with_decode_error_without_retry() {
        let fetcher = Arc::new(ScriptedFetcher::new(0, b"not an image".to_vec()));
        let sleeper = RecordingSleeper::default();

        let err = loader(fetcher.clone(), &sleeper)
            .load("https://cdn.example.com/a.png")
            .await
            .unwrap_err();

        assert!(matches!(err, MockupError::Decode(_)));
        assert_eq!(fetcher.requests().len(), 1);
        assert!(sleeper.recorded().is_empty());
    }

    #[test]
    fn oversized_upload_fails_validation_before_decode() {
        let file = UploadedFile::new("big.jpg", "image/jpeg", vec![0u8; 6 * 1024 * 1024]);
        let err = load_from_file(&file, &UploadConstraint::default()).unwrap_err();
        assert!(matches!(err, MockupError::Validation(_)));
    }

    #[test]
    fn allowed_upload_decodes() {
        let file = UploadedFile::new("design.png", "image/png", png(30, 20));
        let bitmap = load_from_file(&file, &UploadConstraint::default()).expect("decode upload");
        assert_eq!(bitmap.dimensions(), (30, 20));
    }

    const LOGO_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="20">
        <rect x="0" y="0" width="20" height="20" fill="#ff0000"/>
    </svg>"##;

    #[test]
    fn svg_upload_is_rasterised_at_its_intrinsic_size() {
        let constraint = UploadConstraint {
            allowed_mime_types: vec!["image/svg+xml".into()],
            ..Default::default()
        };
        let file = UploadedFile::new("logo.svg", "image/svg+xml", LOGO_SVG.as_bytes().to_vec());

        let bitmap = load_from_file(&file, &constraint).expect("svg upload decodes");

        assert_eq!(bitmap.dimensions(), (40, 20));
        let pixels = bitmap.pixels();
        assert_eq!(pixels.get_pixel(5, 10).0, [255, 0, 0, 255]);
        assert_eq!(pixels.get_pixel(35, 10).0[3], 0);
    }

    #[tokio::test]
    async fn fetched_svg_is_sniffed_without_a_content_type() {
        let fetcher = Arc::new(ScriptedFetcher::new(0, LOGO_SVG.as_bytes().to_vec()));
        let sleeper = RecordingSleeper::default();

        let bitmap = loader(fetcher, &sleeper)
            .load("https://cdn.example.com/logo.svg")
            .await
            .expect("svg loads");
        assert_eq!(bitmap.dimensions(), (40, 20));
    }

    #[test]
    fn broken_svg_is_a_decode_error() {
        let err = decode_with_hint(b"<svg".to_vec(), Some("image/svg+xml")).unwrap_err();
        assert!(matches!(err, MockupError::Decode(_)));
    }

    #[test]
    fn load_from_path_reports_missing_files() {
        let result = load_from_path(Path::new("/nonexistent/path/image.png"));
        assert!(matches!(result, Err(MockupError::Config(_))));
    }

    #[test]
    fn load_from_path_reads_local_png() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("bg.png");
        std::fs::write(&path, png(10, 5)).expect("write png");

        let bitmap = load_from_path(&path).expect("load local image");
        assert_eq!(bitmap.dimensions(), (10, 5));
    }
}
