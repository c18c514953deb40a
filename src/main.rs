//! aerorag binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use aerorag::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "aerorag=debug" } else { "aerorag=warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli::execute(&cli).await {
        Ok(output) => {
            println!("{output}");
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(e.exit_code());
        }
    }
}
