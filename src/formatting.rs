use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::process::ExitCode;

use mockup_lib::output::MOCKUP_OUTPUT_VERSION;
use mockup_lib::{ErrorOutput, MockupError, MockupOutput};

use crate::cli::OutputFormat;

/// Write output to stdout in the requested format.
pub fn write_output(body: &MockupOutput, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(body)?),
        OutputFormat::Pretty => write_pretty_output(body)?,
    };
    Ok(())
}

/// Render an error and return the appropriate exit code.
pub fn render_error(err: MockupError, format: OutputFormat) -> ExitCode {
    tracing::error!(error = %err, "command failed");
    let error_payload = err.to_payload();
    let payload = MockupOutput::Error(ErrorOutput {
        version: MOCKUP_OUTPUT_VERSION.to_string(),
        message: Some(error_payload.message.clone()),
        error: error_payload,
    });

    match format {
        OutputFormat::Json => {
            let content =
                serde_json::to_string(&payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into());
            println!("{content}");
        }
        OutputFormat::Pretty => {
            if let Err(write_err) = write_pretty_output(&payload) {
                eprintln!("Failed to write error output: {}", write_err);
            }
        }
    };

    ExitCode::from(2)
}

fn write_pretty_output(body: &MockupOutput) -> io::Result<()> {
    if std::io::stdout().is_terminal() {
        println!("{}", format_pretty(body, true));
        return Ok(());
    }

    // Non-tty: keep JSON shape for pipelines.
    let content =
        serde_json::to_string_pretty(body).unwrap_or_else(|_| "{\"mode\":\"error\"}".to_string());
    println!("{content}");
    Ok(())
}

/// Format output for human consumption in a terminal.
pub fn format_pretty(body: &MockupOutput, colorize: bool) -> String {
    let mut buf = String::new();
    match body {
        MockupOutput::Resolve(out) => {
            let header = color("[RESOLVE]", "36", colorize);
            match (&out.url, &out.strategy) {
                (Some(url), Some(strategy)) => {
                    writeln!(buf, "{header} {url}").ok();
                    writeln!(
                        buf,
                        "Matched by: {} (rank {})",
                        strategy,
                        out.rank.map(|r| r + 1).unwrap_or_default()
                    )
                    .ok();
                }
                _ => {
                    writeln!(buf, "{header} {}", color("no product image found", "33", colorize)).ok();
                }
            }
            if !out.strategies.is_empty() {
                writeln!(buf, "Strategies: {}", out.strategies.join(" > ")).ok();
            }
        }
        MockupOutput::Compose(out) => {
            let header = color("[COMPOSE]", "32", colorize);
            let kind = if out.preview { "preview" } else { "mockup" };
            writeln!(buf, "{header} {} {kind} of {}", out.canvas, out.design).ok();
            if let Some(background) = &out.background {
                writeln!(buf, "Background: {background}").ok();
            }
            if let Some(data) = &out.design_data {
                writeln!(
                    buf,
                    "Design: at ({:.1}, {:.1}) scale {:.3}x{:.3} rotation {:.1}°",
                    data.position.x, data.position.y, data.scale.x, data.scale.y, data.rotation
                )
                .ok();
            }
            match (&out.output_path, &out.data_url) {
                (Some(path), _) => {
                    writeln!(buf, "Written to: {}", path.display()).ok();
                }
                (None, Some(url)) => {
                    writeln!(buf, "Data URL: {} bytes", url.len()).ok();
                }
                (None, None) => {}
            }
        }
        MockupOutput::Submit(out) => {
            let header = color("[CART]", "32", colorize);
            writeln!(
                buf,
                "{header} Added variant {} x{} at {}",
                out.variant_id, out.quantity, out.store
            )
            .ok();
            if let Some(key) = &out.cart_key {
                writeln!(buf, "Line item: {key}").ok();
            }
            if out.design_data.is_none() {
                writeln!(buf, "No design attached").ok();
            }
        }
        MockupOutput::Error(out) => {
            let header = color("[ERROR]", "31", colorize);
            let message = out
                .message
                .as_deref()
                .unwrap_or_else(|| out.error.message.as_str());
            writeln!(buf, "{} {}", header, message).ok();
            if let Some(remediation) = &out.error.remediation {
                writeln!(buf, "Hint: {}", remediation).ok();
            }
        }
    }
    buf
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockup_lib::output::{ComposeOutput, ResolveOutput};
    use mockup_lib::CanvasSize;
    use std::path::PathBuf;

    #[test]
    fn render_error_always_returns_fatal_exit_code() {
        let code = render_error(MockupError::Config("boom".to_string()), OutputFormat::Json);
        assert_eq!(code, ExitCode::from(2));
    }

    #[test]
    fn format_pretty_shows_resolution() {
        let output = MockupOutput::Resolve(ResolveOutput {
            version: MOCKUP_OUTPUT_VERSION.to_string(),
            url: Some("https://cdn.shopify.com/tee.png".into()),
            strategy: Some("visible-gallery".into()),
            rank: Some(1),
            strategies: vec!["selected-variant".into(), "visible-gallery".into()],
        });

        let pretty = format_pretty(&output, false);
        assert!(pretty.contains("[RESOLVE] https://cdn.shopify.com/tee.png"));
        assert!(pretty.contains("visible-gallery (rank 2)"));
        assert!(pretty.contains("selected-variant > visible-gallery"));
    }

    #[test]
    fn format_pretty_shows_unresolved_page() {
        let output = MockupOutput::Resolve(ResolveOutput {
            version: MOCKUP_OUTPUT_VERSION.to_string(),
            url: None,
            strategy: None,
            rank: None,
            strategies: Vec::new(),
        });
        assert!(format_pretty(&output, false).contains("no product image found"));
    }

    #[test]
    fn format_pretty_shows_compose_destination() {
        let output = MockupOutput::Compose(ComposeOutput {
            version: MOCKUP_OUTPUT_VERSION.to_string(),
            canvas: CanvasSize::new(700, 700),
            background: None,
            design: "logo.png".into(),
            design_data: None,
            preview: true,
            output_path: Some(PathBuf::from("out.png")),
            data_url: None,
        });
        let pretty = format_pretty(&output, false);
        assert!(pretty.contains("700x700 preview of logo.png"));
        assert!(pretty.contains("Written to: out.png"));
    }

    #[test]
    fn format_pretty_handles_errors() {
        let output = MockupOutput::Error(ErrorOutput {
            version: MOCKUP_OUTPUT_VERSION.to_string(),
            message: Some("bad input".to_string()),
            error: mockup_lib::error::ErrorPayload {
                category: mockup_lib::error::ErrorCategory::Config,
                message: "bad input".to_string(),
                remediation: Some("check flags".to_string()),
            },
        });

        let pretty = format_pretty(&output, false);
        assert!(pretty.contains("[ERROR] bad input"));
        assert!(pretty.contains("Hint: check flags"));
    }
}
