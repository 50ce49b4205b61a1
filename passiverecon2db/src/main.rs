use std::io::BufReader;
use std::process::ExitCode;

use clap::Parser;

use passiverecon2db::cli::Cli;
use passiverecon2db::error::CliError;
use passiverecon2db::signals::SignalGuard;
use passiverecon2db::{logging, run};

/// stdin read buffer
const INPUT_BUFFER_SIZE: usize = 64 * 1024;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match run::resolve_config(&cli).await {
        Ok(config) => config,
        Err(e) => return fail(&e),
    };

    if let Err(e) = logging::init_tracing(&config.general) {
        return fail(&CliError::Runtime(e.to_string()));
    }

    let signals = SignalGuard::install();
    let input = BufReader::with_capacity(INPUT_BUFFER_SIZE, std::io::stdin());

    let result = run::execute(config, input)
        .await
        .and_then(|summary| run::check_summary(&summary));

    if signals.deferred() > 0 {
        tracing::info!(
            deferred = signals.deferred(),
            "input consumed after deferred termination signal(s)"
        );
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, exit_code = e.exit_code(), "passiverecon2db failed");
            fail(&e)
        }
    }
}

fn fail(e: &CliError) -> ExitCode {
    eprintln!("passiverecon2db: {e}");
    ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
}
