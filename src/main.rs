mod cli;
mod commands;
mod formatting;
mod settings;

use std::process::ExitCode;

use cli::Commands;
use commands::{run_compose, run_resolve, run_submit, ComposeArgs, SubmitArgs};
use tracing_subscriber::filter::LevelFilter;

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

async fn run() -> ExitCode {
    let raw_args: Vec<String> = std::env::args().collect();
    let args = cli::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Resolve { page } => run_resolve(args.config, args.format, page).await,
        Commands::Compose {
            page,
            background,
            design,
            canvas,
            center,
            rotate,
            output,
            preview,
        } => {
            run_compose(
                &raw_args,
                args.config,
                args.verbose,
                args.format,
                ComposeArgs {
                    page,
                    background,
                    design,
                    canvas,
                    center,
                    rotate,
                    output,
                    preview,
                },
            )
            .await
        }
        Commands::Submit {
            store,
            page,
            design,
            variant,
            quantity,
        } => {
            run_submit(
                args.config,
                args.verbose,
                args.format,
                SubmitArgs {
                    store,
                    page,
                    design,
                    variant,
                    quantity,
                },
            )
            .await
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
