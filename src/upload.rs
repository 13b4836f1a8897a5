//! Upload constraints and validation for shopper-supplied design files.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File too large. Maximum size is {}", format_limit(*max))]
    TooLarge { size: u64, max: u64 },
    #[error("Invalid file type. Please upload {}.", describe_types(allowed))]
    UnsupportedType { mime: String, allowed: Vec<String> },
    #[error("File '{name}' is empty")]
    Empty { name: String },
}

/// Immutable upload policy supplied when the builder is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct UploadConstraint {
    pub allowed_mime_types: Vec<String>,
    pub max_bytes: u64,
}

impl Default for UploadConstraint {
    fn default() -> Self {
        Self {
            allowed_mime_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadConstraint {
    pub fn allows(&self, mime: &str) -> bool {
        self.allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime))
    }

    /// Size is checked before type so oversized files fail fast.
    pub fn validate(&self, file: &UploadedFile) -> Result<(), ValidationError> {
        if file.bytes.is_empty() {
            return Err(ValidationError::Empty {
                name: file.name.clone(),
            });
        }
        let size = file.size();
        if size > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }
        if !self.allows(&file.mime_type) {
            return Err(ValidationError::UnsupportedType {
                mime: file.mime_type.clone(),
                allowed: self.allowed_mime_types.clone(),
            });
        }
        Ok(())
    }
}

/// A file the shopper selected, as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, taking the MIME type from its extension the
    /// way a browser file input reports it.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            mime_type: mime_from_path(path).to_string(),
            bytes,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

pub fn mime_from_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Human-readable byte size, e.g. `1.5 MB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

fn format_limit(max: u64) -> String {
    let mb = max as f64 / 1024.0 / 1024.0;
    if mb.fract() == 0.0 {
        format!("{}MB", mb as u64)
    } else {
        format_file_size(max)
    }
}

fn describe_types(allowed: &[String]) -> String {
    let labels: Vec<&str> = allowed
        .iter()
        .map(|mime| match mime.as_str() {
            "image/jpeg" => "JPG",
            "image/png" => "PNG",
            "image/webp" => "WebP",
            "image/svg+xml" => "SVG",
            "image/gif" => "GIF",
            other => other,
        })
        .collect();
    match labels.as_slice() {
        [] => "a supported image".to_string(),
        [only] => format!("{only} files"),
        [init @ .., last] => format!("{}, or {} files", init.join(", "), last),
    }
}
