//! Damay - terminal client for the school assistant.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use damay::cli::{self, Overrides};
use damay::XdgDirs;

/// Damay - ask the school assistant from your terminal
#[derive(Parser, Debug)]
#[command(name = "damay")]
#[command(version, about, long_about = None)]
struct Args {
    /// Ask a single question and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Use the admin endpoint and show the reasoning trace
    #[arg(long)]
    admin: bool,

    /// Backend base URL (overrides config and DAMAY_BASE_URL)
    #[arg(long)]
    url: Option<String>,

    /// Print answers as formatted HTML
    #[arg(long)]
    html: bool,

    /// Write the effective settings to the config file and exit
    #[arg(long)]
    save_config: bool,

    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short = 'd', long)]
    debug: bool,

    /// Enable verbose logging (equivalent to RUST_LOG=trace)
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "trace"
    } else if args.debug {
        "debug"
    } else {
        "warn" // Quiet by default for normal use
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if args.debug || args.verbose {
        tracing::info!("Debug logging enabled");
    }

    let dirs = XdgDirs::new();
    let overrides = Overrides {
        base_url: args.url,
        admin: args.admin,
        html: args.html,
    };
    let settings = cli::load_settings(&dirs, &overrides)?;

    if args.save_config {
        return cli::save_settings(&dirs, &settings);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        match args.prompt {
            Some(prompt) => cli::run_single_prompt(settings, &prompt).await,
            None => cli::run_interactive(settings).await,
        }
    })
}
