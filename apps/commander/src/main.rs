use commander::error::CommanderError;
use commander::logger::initialize as LoggerInitialize;
use commander::run::{execute, parse_args};
use commander::settings;

use std::process::ExitCode;

use log::{error, info};
use serde_json::{Value, json};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            let detail = serde_json::to_value(&e).unwrap_or(Value::Null);
            println!("{}", json!({ "error": detail }));
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<bool, CommanderError> {
    let invocation = parse_args(std::env::args().skip(1))?;

    let log_dir = settings::log_dir()?;
    LoggerInitialize(&log_dir)?;

    info!("Commander starting");
    info!("Log directory: {}", log_dir.display());

    let config = settings::resolve()?;
    info!("Connecting to {}", config.endpoint);

    let outcome = execute(config, invocation).await?;
    println!("{}", outcome.to_json());

    Ok(outcome.is_success())
}
