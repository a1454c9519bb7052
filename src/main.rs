use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use stale_comments::cli::CliApp;
use stale_comments::cli_types::{Cli, Commands};

const LOG_ENV: &str = "STALE_COMMENTS_LOG";

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if std::env::var("STALE_COMMENTS_LOG_JSON").is_ok() {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let colors_enabled = !cli.no_color && std::env::var_os("NO_COLOR").is_none();
    let threshold = match &cli.command {
        Commands::Scan(args) => args.threshold,
        Commands::List(args) => args.threshold,
        _ => None,
    };
    let app = CliApp::new(&cli.root, threshold, cli.verbose, colors_enabled)?;

    match cli.command {
        Commands::Scan(args) => app.scan(args).await,
        Commands::List(args) => app.list(args).await,
        Commands::Dismiss(args) => app.dismiss(args).await,
        Commands::Config => app.show_config(),
    }
}
