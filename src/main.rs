use clap::Parser;

use healthcare_uploader::commands::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    log::debug!("Starting Healthcare File Uploader");

    let code = commands::execute(cli).await?;
    std::process::exit(code);
}
