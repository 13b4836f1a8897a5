use std::path::{Path, PathBuf};
use std::process::ExitCode;

use mockup_lib::output::MOCKUP_OUTPUT_VERSION;
use mockup_lib::{
    CanvasSize, ComposeOutput, Gesture, ImageLoader, MockupBuilder, MockupError, MockupOutput,
    Resolver, Result,
};

use super::{background_from_page, background_from_source, read_design, read_page};
use crate::cli::OutputFormat;
use crate::formatting::{render_error, write_output};
use crate::settings::{load_config, log_effective_config, resolve_canvas, ComposeFlagSources};

pub struct ComposeArgs {
    pub page: Option<PathBuf>,
    pub background: Option<String>,
    pub design: PathBuf,
    pub canvas: CanvasSize,
    pub center: bool,
    pub rotate: Option<f64>,
    pub output: Option<PathBuf>,
    pub preview: bool,
}

/// Run the compose command.
pub async fn run_compose(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    verbose: bool,
    format: OutputFormat,
    args: ComposeArgs,
) -> ExitCode {
    let body = match compose(raw_args, config_path.as_deref(), verbose, args).await {
        Ok(body) => body,
        Err(err) => return render_error(err, format),
    };
    if let Err(err) = write_output(&body, format) {
        return render_error(MockupError::Config(err.to_string()), format);
    }
    ExitCode::SUCCESS
}

async fn compose(
    raw_args: &[String],
    config_path: Option<&Path>,
    verbose: bool,
    args: ComposeArgs,
) -> Result<MockupOutput> {
    let config = load_config(config_path)?;
    let flags = ComposeFlagSources::from_args(raw_args);
    let canvas = resolve_canvas(args.canvas, &config, &flags);
    if verbose {
        log_effective_config(&config, canvas, config_path);
    }

    let mut builder = MockupBuilder::new(
        canvas,
        config.compositor_config().map_err(MockupError::Config)?,
        Resolver::standard(&config.resolver),
        config.upload.clone(),
    );
    let loader = ImageLoader::http(config.retry, config.timeouts.request)?;

    let background = match (&args.page, &args.background) {
        (Some(page), _) => {
            let page = read_page(page)?;
            Some(background_from_page(&mut builder, &loader, &page).await?)
        }
        (None, Some(value)) => Some(background_from_source(&mut builder, &loader, value).await?),
        (None, None) => None,
    };

    builder.select_file(read_design(&args.design)?)?;
    if args.center {
        builder.center_design();
    }
    if let Some(degrees) = args.rotate {
        builder
            .apply_gesture(Gesture::SetRotation { degrees })
            .map_err(|e| MockupError::Config(format!("--rotate: {e}")))?;
    }

    let rendered = if args.preview {
        builder.compositor().preview()
    } else {
        builder.screenshot()
    };
    let data_url = match &args.output {
        Some(path) => {
            std::fs::write(path, rendered.to_png()?)?;
            tracing::info!(path = %path.display(), "mockup written");
            None
        }
        None => Some(rendered.to_data_url()?),
    };

    Ok(MockupOutput::Compose(ComposeOutput {
        version: MOCKUP_OUTPUT_VERSION.to_string(),
        canvas,
        background,
        design: args.design.display().to_string(),
        design_data: builder.design_data(),
        preview: args.preview,
        output_path: args.output,
        data_url,
    }))
}
