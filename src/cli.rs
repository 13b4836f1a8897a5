use clap::{Parser, Subcommand, ValueEnum};
use mockup_lib::CanvasSize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mockup")]
#[command(
    version,
    about = "Mockup builder - place a design over a product photo and add it to the cart",
    long_about = "Mockup builder\n\nModes:\n- resolve: pick the product image for the selected variant from a page snapshot.\n- compose: render a design over the product image to a PNG.\n- submit: render the mockup and send it with an add-to-cart request.\n\nUse --help on any subcommand for details."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose (debug) logging on stderr")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML) with canvas/upload/overlay/retry/cart defaults; CLI flags override config"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value = "json", help = "Output format")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the product image URL for a page snapshot
    Resolve {
        #[arg(long, value_name = "FILE", help = "Page snapshot (JSON)")]
        page: PathBuf,
    },

    /// Composite a design over the product image
    Compose {
        #[arg(
            long,
            value_name = "FILE",
            conflicts_with = "background",
            help = "Page snapshot (JSON); the product image is resolved from it"
        )]
        page: Option<PathBuf>,

        #[arg(long, help = "Background image (URL or local file)")]
        background: Option<String>,

        #[arg(long, value_name = "FILE", help = "Design file to place over the product")]
        design: PathBuf,

        #[arg(
            long,
            default_value = "700x700",
            help = "Canvas dimensions (WIDTHxHEIGHT)"
        )]
        canvas: CanvasSize,

        #[arg(long, help = "Center the design on the canvas")]
        center: bool,

        #[arg(long, value_name = "DEGREES", allow_negative_numbers = true, help = "Rotate the design")]
        rotate: Option<f64>,

        #[arg(long, short, help = "Write the PNG here (data URL in the output if omitted)")]
        output: Option<PathBuf>,

        #[arg(long, help = "Include the transform handles in the render")]
        preview: bool,
    },

    /// Render the mockup and add it to the cart
    Submit {
        #[arg(long, help = "Store base URL (e.g., https://shop.example.com)")]
        store: String,

        #[arg(long, value_name = "FILE", help = "Page snapshot (JSON)")]
        page: PathBuf,

        #[arg(long, value_name = "FILE", help = "Design file to place over the product")]
        design: PathBuf,

        #[arg(long, help = "Variant id (defaults to the snapshot's selected variant)")]
        variant: Option<String>,

        #[arg(long, default_value = "1", help = "Quantity to add")]
        quantity: u32,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}
