use anyhow::Result;
use clap::Parser;
use pdf_relay::cli::{run, Cli, RunStatus};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays machine-readable JSON.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let cli = Cli::parse();
    match run(cli).await {
        Ok(RunStatus::Success) => {
            tracing::info!("CLI completed successfully");
            Ok(())
        }
        Ok(RunStatus::Incomplete) => {
            tracing::warn!("CLI completed, but not every document was published");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!(error = %e, "CLI exited with error");
            Err(e)
        }
    }
}
