use crate::image_loader::FetchError;
use crate::upload::ValidationError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::ParseError;

#[derive(Debug, Error)]
pub enum MockupError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to load {url} after {attempts} attempt(s): {cause}")]
    Load {
        url: String,
        attempts: u32,
        cause: FetchError,
    },

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Add to cart failed (status: {status:?}): {message}")]
    Submission {
        status: Option<StatusCode>,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl MockupError {
    pub fn submission(status: Option<StatusCode>, message: impl Into<String>) -> Self {
        MockupError::Submission {
            status,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        MockupError::Decode(message.into())
    }

    /// Message suitable for an on-page notification.
    pub fn user_message(&self) -> String {
        match self {
            MockupError::Validation(e) => e.to_string(),
            MockupError::Load { .. } | MockupError::Network(_) => {
                "Could not load the image. Please try again.".to_string()
            }
            MockupError::Decode(_) | MockupError::Image(_) => {
                "The image could not be read. Please try a different file.".to_string()
            }
            MockupError::Submission { .. } => {
                "Failed to add product to cart. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            MockupError::Validation(e) => ErrorPayload::new(
                ErrorCategory::Validation,
                e.to_string(),
                "Upload a JPG, PNG, or WebP file within the configured size limit.",
            ),
            MockupError::Load { .. } => ErrorPayload::new(
                ErrorCategory::Network,
                self.to_string(),
                "Check the image URL and connectivity; retries are bounded by [retry] max_attempts.",
            ),
            MockupError::Network(e) => ErrorPayload::new(
                ErrorCategory::Network,
                e.to_string(),
                "Check connectivity/proxy/VPN and retry.",
            ),
            MockupError::Decode(msg) => ErrorPayload::new(
                ErrorCategory::Image,
                msg.to_string(),
                "Verify the file is a valid raster image (JPEG, PNG, WebP).",
            ),
            MockupError::Image(e) => ErrorPayload::new(
                ErrorCategory::Image,
                e.to_string(),
                "Verify image path/format and readability.",
            ),
            MockupError::Submission { status, message } => ErrorPayload::new(
                ErrorCategory::Submission,
                format!("Add to cart failed (status {:?}): {}", status, message),
                "Check the store URL and variant id; the page should be reloaded to resynchronize.",
            ),
            MockupError::Io(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check file paths/permissions.",
            ),
            MockupError::InvalidUrl(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Verify URL/format (e.g., https://cdn.example.com/product.png).",
            ),
            MockupError::Serialization(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check the page snapshot JSON; run with --verbose for details.",
            ),
            MockupError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("file not found") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Verify the file exists; use an absolute path or run from the working directory.",
                    )
                } else if lower.contains("unsupported file extension") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Use a supported image type (png, jpg, jpeg, webp, gif).",
                    )
                } else if lower.contains("no product image") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Include a selected variant image, gallery image, or product image in the page snapshot, or pass --background.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Check flags/paths (e.g., --canvas WIDTHxHEIGHT) and the config file.",
                    )
                }
            }
            MockupError::Unknown(msg) => ErrorPayload::new(
                ErrorCategory::Unknown,
                msg.to_string(),
                "Re-run with --verbose; file an issue if persistent.",
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, MockupError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Validation,
    Network,
    Image,
    Submission,
    Config,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}
