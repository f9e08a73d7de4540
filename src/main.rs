mod commands;
mod logging;
mod reporter;

use std::io::{self, Write};
use std::path::Path;
use std::process;
use std::sync::atomic::Ordering;

use anyhow::Context;
use clap::Parser;
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use reporter::CliReporter;
use sd_uploader::config::{self, AppConfig};
use sd_uploader::{space, Ledger, MountedShare, UploadEngine, VolumeMonitor};
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    match args.command.unwrap_or(Commands::Watch) {
        Commands::Watch => run_watch(config)?,
        Commands::Upload => run_upload(config)?,
        Commands::InFlight => list_in_flight(&config)?,
        Commands::ResetLedger => {
            match prompt_confirm(
                "Are you SURE you want to forget every uploaded file?",
                Some(false),
            ) {
                Ok(true) => {
                    let ledger = Ledger::open(&config.ledger_path)?;
                    ledger.clear_all()?;
                    println!("Upload ledger cleared");
                }
                _ => process::exit(0),
            }
        }
        Commands::Storage => {
            let share = MountedShare::from_config(&config.remote);
            println!("Storage: {}", space::estimate_storage(&config, &share));
        }
        Commands::PrintConfig => {
            println!("Configuration: {:#?}", config);
        }
        Commands::WriteDefaultConfig => {
            let path = Path::new("Config.toml");
            if config::write_default_configuration(path)? {
                println!("Wrote {}", path.display());
            } else {
                println!("{} already exists", path.display());
            }
        }
    }

    Ok(())
}

fn run_watch(config: AppConfig) -> anyhow::Result<()> {
    let monitor = VolumeMonitor::new(config.poll_interval());
    let engine = UploadEngine::open(config)?;
    let reporter = CliReporter::new();

    let flag = monitor.stop_handle();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;

    monitor.run(&engine, &reporter);
    Ok(())
}

fn run_upload(config: AppConfig) -> anyhow::Result<()> {
    let engine = UploadEngine::open(config)?;
    let reporter = CliReporter::new();
    let report = engine.run_session(&reporter)?;

    println!();
    info!(
        "Scan: {}, Transfer: {}",
        format!("{:.2}s", report.scan_duration.as_secs_f64()).green(),
        format!("{:.2}s", report.transfer_duration.as_secs_f64()).green(),
    );
    info!(
        "{} detected, {} uploaded, {} skipped, {} failed, {} recovered",
        format!("{}", report.counters.detected).cyan(),
        format!("{}", report.transfer.uploaded).green(),
        format!("{}", report.transfer.skipped).yellow(),
        format!("{}", report.transfer.failed).red(),
        report.recovered,
    );
    Ok(())
}

fn list_in_flight(config: &AppConfig) -> anyhow::Result<()> {
    let ledger = Ledger::open(&config.ledger_path)?;
    let entries = ledger.list_in_flight()?;
    if entries.is_empty() {
        println!("No interrupted uploads");
    }
    for (fp, dest) in entries {
        println!("{}  {}", fp.prefix(), dest.display());
    }
    println!("{} files uploaded so far", ledger.completed_count()?);
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
