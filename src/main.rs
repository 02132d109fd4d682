/* src/main.rs */

use log::{error, info};
use ramdrain::setup::config::Config;
use ramdrain::setup::gen_conf::generate_default_config;
use ramdrain::setup::{check, logging};
use ramdrain::RamDiskTransfer;
use std::env;
use std::process::ExitCode;

const DEFAULT_CONFIG: &str = "ramdrain.toml";

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.len() == 1 {
        return match generate_default_config(DEFAULT_CONFIG) {
            Ok(()) => {
                println!(
                    "> Default config generated. Use '-c {}' to run.",
                    DEFAULT_CONFIG
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("! Could not write '{}': {}", DEFAULT_CONFIG, e);
                ExitCode::FAILURE
            }
        };
    }

    if args.len() == 3 && args[1] == "-c" {
        return match run(&args[2]).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                let message = with_causes(&e);
                error!("! {}", message);
                eprintln!("\nApplication Error: {}\n", message);
                ExitCode::FAILURE
            }
        };
    }

    println!(
        "! Invalid usage. Use '-c <config_path>' to run \
         or no arguments to generate a default config."
    );
    ExitCode::FAILURE
}

async fn run(config_path: &str) -> ramdrain::Result<()> {
    let config = Config::from_file(config_path)?;
    check::validate_config(&config)?;
    logging::init(&config.setup)?;

    let transfer = RamDiskTransfer::new(config.transfer)?;
    let stop = transfer.stop_handle();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("> Shutdown requested");
        stop.stop();
    });

    let report = transfer.start().await;
    if report.workers_abandoned > 0 {
        info!(
            "> {} worker(s) were still copying at exit",
            report.workers_abandoned
        );
    }
    Ok(())
}

fn with_causes(err: &ramdrain::Error) -> String {
    let mut message = err.to_string();
    let mut cause = std::error::Error::source(err);
    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        cause = inner.source();
    }
    message
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            error!("! Could not listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
