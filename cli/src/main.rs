use clap::Parser;
use taskboard_cli::Cli;
use taskboard_cli::run_main;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run_main(Cli::parse()).await
}
