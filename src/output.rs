use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::canvas::CanvasSize;
use crate::compositor::DesignData;
use crate::error::ErrorPayload;

/// Schema version for output payloads.
pub const MOCKUP_OUTPUT_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum MockupOutput {
    Resolve(ResolveOutput),
    Compose(ComposeOutput),
    Submit(SubmitOutput),
    Error(ErrorOutput),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOutput {
    pub version: String,
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
    /// Strategy names in priority order.
    pub strategies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeOutput {
    pub version: String,
    pub canvas: CanvasSize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    pub design: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_data: Option<DesignData>,
    /// Handle chrome was included in the raster.
    pub preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Present when no output path was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutput {
    pub version: String,
    pub store: String,
    pub variant_id: String,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_data: Option<DesignData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub error: ErrorPayload,
}
