use anyhow::Result;
use waitress::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::try_parse_args(std::env::args_os()).unwrap_or_else(|e| e.exit());
    let log_file = waitress::logging::init(cli.verbose, &cli.log_dir)?;
    tracing::info!(log_file = %log_file.display(), "Initiating Remote Action library loader");

    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("waitress completed successfully"),
        Err(e) => tracing::error!(error = %e, "waitress exited with error"),
    }
    result
}
