//! caldemo entry point.

use std::process::ExitCode;

use clap::Parser;

use caldemo_auth::ConsolePrompt;
use caldemo_cli::app;
use caldemo_cli::cli::Cli;
use caldemo_cli::error::CliResult;
use caldemo_cli::settings::Settings;
use caldemo_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    init_tracing(TracingConfig::cli(cli.debug).with_format(cli.log_format.into()))?;

    let settings = Settings::load(cli.settings.as_deref())?.merge_cli(&cli);
    let prompt = ConsolePrompt::new().with_open_browser(settings.open_browser);

    app::run(&settings, Box::new(prompt)).await
}
