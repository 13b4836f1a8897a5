//! Add-to-cart submission with the composited mockup attached.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::compositor::{DesignData, RenderedImage};
use crate::error::{MockupError, Result};
use crate::upload::UploadedFile;

pub const DEFAULT_ADD_ENDPOINT: &str = "/cart/add.js";
pub const DEFAULT_ADD_ACTION_SUFFIX: &str = "/cart/add";

pub const SCREENSHOT_FIELD: &str = "properties[Mockup Screenshot]";
pub const SCREENSHOT_URL_FIELD: &str = "properties[Mockup Screenshot URL]";
pub const DESIGN_DATA_FIELD: &str = "properties[Design Data]";
pub const DESIGN_FILE_FIELD: &str = "properties[Design File]";

/// How the rendered mockup travels with the cart request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenshotMode {
    /// PNG file part.
    #[default]
    Attachment,
    /// `data:image/png;base64,...` text field.
    DataUrl,
}

/// A product form as submitted by the host page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CartForm {
    pub action: String,
    pub fields: Vec<(String, String)>,
}

impl CartForm {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Standard product form fields: variant id and quantity.
    pub fn for_variant(action: impl Into<String>, variant_id: &str, quantity: u32) -> Self {
        Self::new(action)
            .field("id", variant_id)
            .field("quantity", quantity.to_string())
    }
}

/// Whether a form action targets the cart-add endpoint. Query strings and
/// fragments are ignored; the action may be absolute or a bare path.
pub fn is_cart_add_action(action: &str, suffix: &str) -> bool {
    let path = match Url::parse(action) {
        Ok(url) => url.path().to_string(),
        Err(_) => action
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let suffix = suffix.trim_end_matches('/');
    !suffix.is_empty() && path.trim_end_matches('/').ends_with(suffix)
}

/// Everything sent with one add-to-cart request. Mockup parts are only
/// present when a design was placed.
#[derive(Debug, Clone)]
pub struct CartSubmission {
    pub form: CartForm,
    pub screenshot: Option<RenderedImage>,
    pub design_data: Option<DesignData>,
    pub design_file: Option<UploadedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CartItem {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub quantity: Option<u32>,
}

/// Where add-to-cart requests go. [`CartClient`] talks to the store; the
/// runtime only sees this trait.
pub trait CartBackend: Send + Sync {
    fn add(&self, submission: CartSubmission) -> BoxFuture<'_, Result<CartItem>>;
}

#[derive(Debug, Clone)]
pub struct CartClient {
    client: reqwest::Client,
    base_url: Url,
    endpoint: String,
    mode: ScreenshotMode,
}

impl CartClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(MockupError::Network)?;
        Ok(Self {
            client,
            base_url,
            endpoint: DEFAULT_ADD_ENDPOINT.to_string(),
            mode: ScreenshotMode::default(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_screenshot_mode(mut self, mode: ScreenshotMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn endpoint_url(&self) -> Result<Url> {
        Ok(self.base_url.join(&self.endpoint)?)
    }

    #[tracing::instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn add(&self, submission: CartSubmission) -> Result<CartItem> {
        let url = self.endpoint_url()?;
        let form = self.build_form(submission)?;

        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|e| MockupError::submission(None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body
            };
            tracing::warn!(status = status.as_u16(), "cart add rejected");
            return Err(MockupError::submission(Some(status), message));
        }

        let item: CartItem = response
            .json()
            .await
            .map_err(|e| MockupError::submission(Some(status), format!("invalid cart response: {e}")))?;
        tracing::info!(key = ?item.key, "added to cart");
        Ok(item)
    }

    fn build_form(&self, submission: CartSubmission) -> Result<Form> {
        let CartSubmission {
            form,
            screenshot,
            design_data,
            design_file,
        } = submission;

        // Stores key line-item properties on the literal field name.
        let mut multipart = Form::new().percent_encode_noop();
        for (name, value) in form.fields {
            multipart = multipart.text(name, value);
        }

        if let Some(screenshot) = screenshot {
            multipart = match self.mode {
                ScreenshotMode::Attachment => {
                    let part = Part::bytes(screenshot.to_png()?)
                        .file_name("mockup.png")
                        .mime_str("image/png")?;
                    multipart.part(SCREENSHOT_FIELD, part)
                }
                ScreenshotMode::DataUrl => {
                    multipart.text(SCREENSHOT_URL_FIELD, screenshot.to_data_url()?)
                }
            };
        }

        if let Some(data) = design_data {
            multipart = multipart.text(DESIGN_DATA_FIELD, serde_json::to_string(&data)?);
        }

        if let Some(file) = design_file {
            let part = Part::bytes(file.bytes)
                .file_name(file.name)
                .mime_str(&file.mime_type)?;
            multipart = multipart.part(DESIGN_FILE_FIELD, part);
        }

        Ok(multipart)
    }
}

impl CartBackend for CartClient {
    fn add(&self, submission: CartSubmission) -> BoxFuture<'_, Result<CartItem>> {
        Box::pin(CartClient::add(self, submission))
    }
}
