use std::path::Path;

use mockup_lib::{CanvasSize, Config, MockupError};

/// Tracks which CLI flags were explicitly provided vs. defaulted.
#[derive(Debug, Default)]
pub struct ComposeFlagSources {
    pub canvas: bool,
}

impl ComposeFlagSources {
    pub fn from_args(args: &[String]) -> Self {
        Self {
            canvas: flag_present(args, "--canvas"),
        }
    }
}

/// Checks if a flag was present in the command-line arguments.
pub fn flag_present(args: &[String], flag: &str) -> bool {
    args.iter()
        .any(|arg| arg == flag || arg.starts_with(&format!("{flag}=")))
}

/// Canvas size after merging CLI args and config, preferring CLI when the
/// flag is present.
pub fn resolve_canvas(cli_canvas: CanvasSize, config: &Config, flags: &ComposeFlagSources) -> CanvasSize {
    if flags.canvas {
        cli_canvas
    } else {
        config.canvas_size()
    }
}

/// Load config from a TOML file, central config, or return defaults.
/// Priority: explicit path > ~/.config/mockup/config.toml > defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, MockupError> {
    let cfg = Config::load(path).map_err(|e| {
        let loc = path
            .map(|p| p.display().to_string())
            .or_else(|| Config::central_config_path().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "defaults".to_string());
        MockupError::Config(format!("Failed to read config {}: {}", loc, e))
    })?;

    cfg.validate().map_err(|e| {
        let prefix = path
            .map(|p| format!("Invalid config ({}): {}", p.display(), e))
            .unwrap_or_else(|| format!("Invalid config: {}", e));
        MockupError::Config(prefix)
    })?;
    Ok(cfg)
}

/// Format effective config as a single-line string.
pub fn format_effective_config(config: &Config, canvas: CanvasSize, config_source: Option<&Path>) -> String {
    let source = config_source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    format!(
        "Effective config [{source}]: canvas={}, upload: max={}B types={}, retry: attempts={} backoff={:?}, debounce={:?}, cart: endpoint={} drawer={} screenshot={:?}, request-timeout={:?}",
        canvas,
        config.upload.max_bytes,
        config.upload.allowed_mime_types.join(","),
        config.retry.max_attempts,
        config.retry.backoff,
        config.variants.debounce,
        config.cart.endpoint,
        config.cart.drawer,
        config.cart.screenshot_mode,
        config.timeouts.request,
    )
}

/// Log effective config (verbose mode).
pub fn log_effective_config(config: &Config, canvas: CanvasSize, config_source: Option<&Path>) {
    tracing::debug!("{}", format_effective_config(config, canvas, config_source));
}
