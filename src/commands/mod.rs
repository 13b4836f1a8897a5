mod compose;
mod resolve;
mod submit;

use std::path::Path;

use mockup_lib::{
    load_from_path, parse_source, BackgroundOutcome, ImageLoader, ImageSource, MockupBuilder,
    MockupError, PageContext, Result, UploadedFile,
};

pub use compose::{run_compose, ComposeArgs};
pub use resolve::run_resolve;
pub use submit::{run_submit, SubmitArgs};

/// Read a host page snapshot from disk.
fn read_page(path: &Path) -> Result<PageContext> {
    if !path.exists() {
        return Err(MockupError::Config(format!(
            "Page snapshot file not found: {}",
            path.display()
        )));
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(PageContext::from_json(&raw)?)
}

/// Read a design file the way a browser file input would report it.
fn read_design(path: &Path) -> Result<UploadedFile> {
    UploadedFile::from_path(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            MockupError::Config(format!("Local file not found: {}", path.display()))
        }
        _ => MockupError::Io(e),
    })
}

/// Resolve the product image from `page` and apply it. Returns the URL shown.
async fn background_from_page(
    builder: &mut MockupBuilder,
    loader: &ImageLoader,
    page: &PageContext,
) -> Result<String> {
    let request = builder.begin_background_refresh(page).ok_or_else(|| {
        MockupError::Config("No product image found in page snapshot".to_string())
    })?;
    let result = loader.load(&request.url).await;
    applied(builder.apply_background(request.token, result))
}

/// Load an explicit background (URL or local file) and apply it.
async fn background_from_source(
    builder: &mut MockupBuilder,
    loader: &ImageLoader,
    value: &str,
) -> Result<String> {
    let source = parse_source(value).map_err(|e| MockupError::Config(e.to_string()))?;
    let request = builder.request_background(source.to_string());
    let result = match &source {
        ImageSource::Remote(url) => loader.load(url.as_str()).await,
        ImageSource::Local(path) => load_from_path(path),
    };
    applied(builder.apply_background(request.token, result))
}

fn applied(outcome: BackgroundOutcome) -> Result<String> {
    match outcome {
        BackgroundOutcome::Applied { url } => Ok(url),
        BackgroundOutcome::Failed(err) => Err(err),
        BackgroundOutcome::Stale => Err(MockupError::Unknown(
            "background request was superseded".to_string(),
        )),
    }
}
