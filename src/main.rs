use anyhow::Result;
use clap::Parser;
use log_archiver::cli::{run, Cli};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.json_logs);
    tracing::info!("log-archiver startup: tracing initialised, environment loaded");

    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("Run completed successfully"),
        Err(e) => tracing::error!(error = %e, "Run failed"),
    }
    result
}
