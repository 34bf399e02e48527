use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = higbook::cli::Cli::parse();
    higbook::logging::init(cli.log_format).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        higbook::cli::Command::Discover(args) => {
            higbook::discover::run(args).await.context("discover")?;
        }
        higbook::cli::Command::Build(args) => {
            higbook::build::run(args).await.context("build")?;
        }
        higbook::cli::Command::Markdown(args) => {
            higbook::export::run(args).await.context("markdown")?;
        }
    }

    Ok(())
}
