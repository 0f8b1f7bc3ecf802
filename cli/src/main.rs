use clap::Parser;
use musiconn_cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    musiconn_cli::init_logging();
    Cli::parse().run().await
}
