use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::canvas::CanvasSize;
use crate::cart::{ScreenshotMode, DEFAULT_ADD_ACTION_SUFFIX, DEFAULT_ADD_ENDPOINT};
use crate::compositor::{Color, CompositorConfig, DEFAULT_MIN_OVERLAY_SIZE, HANDLE_COLOR};
use crate::resolver::ResolverConfig;
use crate::retry::RetryPolicy;
use crate::upload::UploadConstraint;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub canvas: CanvasConfig,
    pub upload: UploadConstraint,
    pub overlay: OverlayConfig,
    pub retry: RetryPolicy,
    pub variants: VariantsConfig,
    pub resolver: ResolverConfig,
    pub cart: CartConfig,
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub background_padding: f64,
    /// `#rrggbb` or `#rrggbbaa`.
    pub fill: String,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        let size = CanvasSize::default();
        Self {
            width: size.width,
            height: size.height,
            background_padding: 0.0,
            fill: "#ffffff".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub offset_x: f64,
    pub offset_y: f64,
    pub min_size: f64,
    pub max_fraction: f64,
    pub handle_size: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            offset_x: 50.0,
            offset_y: 50.0,
            min_size: DEFAULT_MIN_OVERLAY_SIZE,
            max_fraction: 0.6,
            handle_size: 12.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantsConfig {
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,
}

impl Default for VariantsConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartConfig {
    pub endpoint: String,
    pub action_suffix: String,
    /// The theme renders a cart drawer that can be refreshed in place;
    /// otherwise the page reloads after a successful add.
    pub drawer: bool,
    pub screenshot_mode: ScreenshotMode,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ADD_ENDPOINT.to_string(),
            action_suffix: DEFAULT_ADD_ACTION_SUFFIX.to_string(),
            drawer: false,
            screenshot_mode: ScreenshotMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "humantime_serde")]
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load from `path`, else the central config file, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::central_config_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };
        let raw = fs::read_to_string(&path).map_err(|e| e.to_string())?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, String> {
        toml::from_str(raw).map_err(|e| e.to_string())
    }

    /// `$XDG_CONFIG_HOME/mockup/config.toml`, or `~/.config/mockup/config.toml`.
    pub fn central_config_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("mockup").join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.canvas_size().validate().map_err(|e| e.to_string())?;
        if self.canvas.background_padding < 0.0 {
            return Err("canvas.background_padding must not be negative".to_string());
        }
        parse_hex_color(&self.canvas.fill)?;
        if self.upload.max_bytes == 0 {
            return Err("upload.max_bytes must be greater than zero".to_string());
        }
        if self.upload.allowed_mime_types.is_empty() {
            return Err("upload.allowed_mime_types must not be empty".to_string());
        }
        if !(self.overlay.min_size > 0.0) {
            return Err("overlay.min_size must be positive".to_string());
        }
        if !(self.overlay.max_fraction > 0.0 && self.overlay.max_fraction <= 1.0) {
            return Err("overlay.max_fraction must be in (0, 1]".to_string());
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        if self.cart.endpoint.trim().is_empty() {
            return Err("cart.endpoint must not be empty".to_string());
        }
        Ok(())
    }

    pub fn canvas_size(&self) -> CanvasSize {
        CanvasSize::new(self.canvas.width, self.canvas.height)
    }

    pub fn compositor_config(&self) -> Result<CompositorConfig, String> {
        Ok(CompositorConfig {
            background_padding: self.canvas.background_padding,
            fill_color: parse_hex_color(&self.canvas.fill)?,
            overlay_offset: (self.overlay.offset_x, self.overlay.offset_y),
            overlay_max_fraction: self.overlay.max_fraction,
            min_overlay_size: self.overlay.min_size,
            handle_size: self.overlay.handle_size,
            handle_color: HANDLE_COLOR,
        })
    }
}

pub fn parse_hex_color(raw: &str) -> Result<Color, String> {
    let hex = raw.trim().trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
            .ok_or_else(|| format!("invalid colour '{raw}', expected #rrggbb"))
    };
    match hex.len() {
        6 => Ok([channel(0)?, channel(2)?, channel(4)?, 255]),
        8 => Ok([channel(0)?, channel(2)?, channel(4)?, channel(6)?]),
        _ => Err(format!("invalid colour '{raw}', expected #rrggbb")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Backoff;
    use tempfile::TempDir;

    #[test]
    fn default_values_match_expected() {
        let cfg = Config::default();

        assert_eq!(cfg.canvas_size(), CanvasSize::new(700, 700));
        assert_eq!(cfg.upload.max_bytes, 5 * 1024 * 1024);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.variants.debounce, Duration::from_millis(300));
        assert_eq!(cfg.cart.endpoint, "/cart/add.js");
        assert_eq!(cfg.timeouts.request, Duration::from_secs(30));
        assert!(cfg.validate().is_ok());

        let compositor = cfg.compositor_config().unwrap();
        assert_eq!(compositor, CompositorConfig::default());
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_sections() {
        let cfg = Config::from_toml(
            r##"
            [canvas]
            width = 500
            fill = "#000000"

            [retry]
            max_attempts = 5
            backoff = { kind = "fixed", delay = "250ms" }

            [variants]
            debounce = "100ms"

            [cart]
            drawer = true
            screenshot_mode = "data-url"
            "##,
        )
        .expect("parse config");

        assert_eq!(cfg.canvas_size(), CanvasSize::new(500, 700));
        assert_eq!(cfg.compositor_config().unwrap().fill_color, [0, 0, 0, 255]);
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(
            cfg.retry.backoff,
            Backoff::Fixed {
                delay: Duration::from_millis(250)
            }
        );
        assert_eq!(cfg.variants.debounce, Duration::from_millis(100));
        assert!(cfg.cart.drawer);
        assert_eq!(cfg.cart.screenshot_mode, ScreenshotMode::DataUrl);
        assert_eq!(cfg.upload, UploadConstraint::default());
    }

    #[test]
    fn validate_rejects_degenerate_values() {
        let mut cfg = Config::default();
        cfg.canvas.width = 0;
        assert!(cfg.validate().unwrap_err().contains("canvas"));

        let mut cfg = Config::default();
        cfg.upload.allowed_mime_types.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.retry.max_attempts = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.overlay.min_size = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.canvas.fill = "white".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_caps_canvas_dimensions() {
        let mut cfg = Config::default();
        cfg.canvas.height = crate::canvas::MAX_CANVAS_DIMENSION + 1;
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("canvas height"), "{err}");

        cfg.canvas.height = crate::canvas::MAX_CANVAS_DIMENSION;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn load_reads_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mockup.toml");
        std::fs::write(&path, "[upload]\nmax_bytes = 1024\n").unwrap();

        let cfg = Config::load(Some(&path)).unwrap();
        assert_eq!(cfg.upload.max_bytes, 1024);
        assert_eq!(cfg.upload.allowed_mime_types.len(), 3);
    }

    #[test]
    fn load_reports_missing_explicit_path() {
        assert!(Config::load(Some(Path::new("/nonexistent/mockup.toml"))).is_err());
    }

    #[test]
    fn hex_colours_parse() {
        assert_eq!(parse_hex_color("#007bff").unwrap(), [0, 123, 255, 255]);
        assert_eq!(parse_hex_color("00000080").unwrap(), [0, 0, 0, 128]);
        assert!(parse_hex_color("#12345").is_err());
    }
}
