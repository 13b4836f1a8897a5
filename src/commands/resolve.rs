use std::path::{Path, PathBuf};
use std::process::ExitCode;

use mockup_lib::output::MOCKUP_OUTPUT_VERSION;
use mockup_lib::{MockupError, MockupOutput, ResolveOutput, Resolver, Result};

use super::read_page;
use crate::cli::OutputFormat;
use crate::formatting::{render_error, write_output};
use crate::settings::load_config;

/// Run the resolve command.
pub async fn run_resolve(config_path: Option<PathBuf>, format: OutputFormat, page: PathBuf) -> ExitCode {
    let body = match resolve(config_path.as_deref(), &page) {
        Ok(body) => body,
        Err(err) => return render_error(err, format),
    };
    if let Err(err) = write_output(&body, format) {
        return render_error(MockupError::Config(err.to_string()), format);
    }
    ExitCode::SUCCESS
}

fn resolve(config_path: Option<&Path>, page: &Path) -> Result<MockupOutput> {
    let config = load_config(config_path)?;
    let page = read_page(page)?;
    let resolver = Resolver::standard(&config.resolver);
    let resolution = resolver.resolve_candidate(&page);

    Ok(MockupOutput::Resolve(ResolveOutput {
        version: MOCKUP_OUTPUT_VERSION.to_string(),
        url: resolution.as_ref().map(|r| r.url.clone()),
        strategy: resolution.as_ref().map(|r| r.strategy.clone()),
        rank: resolution.as_ref().map(|r| r.rank),
        strategies: resolver
            .strategy_names()
            .into_iter()
            .map(str::to_owned)
            .collect(),
    }))
}
