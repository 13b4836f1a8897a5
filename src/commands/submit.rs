use std::path::{Path, PathBuf};
use std::process::ExitCode;

use mockup_lib::output::MOCKUP_OUTPUT_VERSION;
use mockup_lib::{
    CartClient, CartForm, ImageLoader, MockupBuilder, MockupError, MockupOutput, Result,
    SubmitOutput,
};
use url::Url;

use super::{background_from_page, read_design, read_page};
use crate::cli::OutputFormat;
use crate::formatting::{render_error, write_output};
use crate::settings::{load_config, log_effective_config};

pub struct SubmitArgs {
    pub store: String,
    pub page: PathBuf,
    pub design: PathBuf,
    pub variant: Option<String>,
    pub quantity: u32,
}

/// Run the submit command.
pub async fn run_submit(
    config_path: Option<PathBuf>,
    verbose: bool,
    format: OutputFormat,
    args: SubmitArgs,
) -> ExitCode {
    let body = match submit(config_path.as_deref(), verbose, args).await {
        Ok(body) => body,
        Err(err) => return render_error(err, format),
    };
    if let Err(err) = write_output(&body, format) {
        return render_error(MockupError::Config(err.to_string()), format);
    }
    ExitCode::SUCCESS
}

async fn submit(config_path: Option<&Path>, verbose: bool, args: SubmitArgs) -> Result<MockupOutput> {
    let config = load_config(config_path)?;
    if verbose {
        log_effective_config(&config, config.canvas_size(), config_path);
    }
    let store = Url::parse(&args.store)?;
    let page = read_page(&args.page)?;
    let variant_id = args
        .variant
        .clone()
        .or_else(|| page.selected_variant_id.clone())
        .ok_or_else(|| {
            MockupError::Config(
                "No variant id: pass --variant or include selectedVariantId in the page snapshot"
                    .to_string(),
            )
        })?;

    let mut builder = MockupBuilder::from_config(&config)?;
    let loader = ImageLoader::http(config.retry, config.timeouts.request)?;

    // The mockup is still submitted over the fill colour if the product
    // image cannot be loaded.
    let background = match background_from_page(&mut builder, &loader, &page).await {
        Ok(url) => Some(url),
        Err(err) => {
            tracing::warn!(error = %err, "continuing without product image");
            None
        }
    };
    builder.select_file(read_design(&args.design)?)?;

    let client = CartClient::new(store.clone(), config.timeouts.request)?
        .with_endpoint(config.cart.endpoint.clone())
        .with_screenshot_mode(config.cart.screenshot_mode);
    let form = CartForm::for_variant(config.cart.action_suffix.clone(), &variant_id, args.quantity);
    let submission = builder.prepare_submission(form);
    let design_data = submission.design_data.clone();

    let item = client.add(submission).await?;

    Ok(MockupOutput::Submit(SubmitOutput {
        version: MOCKUP_OUTPUT_VERSION.to_string(),
        store: store.to_string(),
        variant_id,
        quantity: args.quantity,
        background,
        cart_key: item.key,
        design_data,
    }))
}
