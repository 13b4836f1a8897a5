use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use url::Url;

use crate::resolver::normalize_image_url;

/// Where a background or design image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Remote(Url),
    Local(PathBuf),
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Remote(url) => write!(f, "{url}"),
            ImageSource::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceParseError {
    #[error("Invalid URL '{value}': {message}. Hint: include http(s):// and ensure the URL is well-formed.")]
    InvalidUrl { value: String, message: String },
    #[error("Local file not found: {path}. Hint: check the path relative to the current working directory or use an absolute path.")]
    FileNotFound { path: String },
    #[error("Unsupported file extension '{extension}'. Supported image extensions: {supported}.")]
    UnsupportedExtension {
        extension: String,
        supported: String,
    },
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

/// Parse a CLI image argument. `http(s)://` and protocol-relative `//`
/// values are remote; anything else is a local file that must exist.
pub fn parse_source(value: &str) -> Result<ImageSource, SourceParseError> {
    let trimmed = value.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") || trimmed.starts_with("//")
    {
        parse_remote(trimmed)
    } else {
        parse_local(trimmed)
    }
}

fn parse_remote(value: &str) -> Result<ImageSource, SourceParseError> {
    let normalized = normalize_image_url(value);
    Url::parse(&normalized)
        .map(ImageSource::Remote)
        .map_err(|e| SourceParseError::InvalidUrl {
            value: value.to_string(),
            message: e.to_string(),
        })
}

fn parse_local(value: &str) -> Result<ImageSource, SourceParseError> {
    let path = Path::new(value);

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(SourceParseError::UnsupportedExtension {
            extension: if extension.is_empty() {
                "no extension".to_string()
            } else {
                extension
            },
            supported: IMAGE_EXTENSIONS.join(", "),
        });
    }

    let is_file = fs::metadata(path).map(|m| m.is_file()).unwrap_or(false);
    if !is_file {
        return Err(SourceParseError::FileNotFound {
            path: path.to_string_lossy().into_owned(),
        });
    }

    Ok(ImageSource::Local(path.to_path_buf()))
}
