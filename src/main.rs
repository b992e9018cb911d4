use anyhow::Result;
use mailkey::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
