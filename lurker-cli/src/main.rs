use lurker_cli::{logging, runner, Cli, Settings};
use lurker_core::{Error, Interface, Result};
use lurker_dispatch::{RunSummary, StopHandle};
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    if cli.list_interfaces {
        for iface in Interface::list_all() {
            println!("{}", iface);
        }
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("lurker: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<RunSummary> {
    let settings = Settings::load(&cli)?;
    logging::init(cli.verbose, settings.log_level.as_deref())?;
    let config = settings.validate()?;

    let stop = StopHandle::new();
    let on_signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping");
            on_signal.stop();
        }
    });

    tokio::task::spawn_blocking(move || runner::run(&config, &stop))
        .await
        .map_err(|e| Error::capture(format!("dispatch thread failed: {}", e)))?
}
