//! Gavel CLI - binary entry point.
//!
//! Loads configuration, opens the store and maps each subcommand onto the
//! [`gavel_engine::GavelApi`] facade. Every command prints its JSON body on
//! stdout and exits non-zero when the operation did not succeed. Logs never
//! go to stdout.

mod commands;

use std::{
    fs::{self, OpenOptions},
    io,
    path::PathBuf,
    process::ExitCode,
    sync::Mutex,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use gavel_engine::{GavelConfig, gavel_dir};

use crate::commands::Cli;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_gavel_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::debug!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // stdout carries command output, so the fallback is stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_gavel_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in gavel_log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn gavel_log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.gavel/logs/gavel.log
    if let Some(dir) = gavel_dir() {
        candidates.push(dir.join("logs").join("gavel.log"));
    }

    // Fallback: ./.gavel/logs/gavel.log
    candidates.push(PathBuf::from(".gavel").join("logs").join("gavel.log"));

    candidates
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let config = GavelConfig::load().context("failed to load configuration")?;
    let settings = config.resolve();

    let response = commands::run(cli, &settings).await?;
    let rendered =
        serde_json::to_string_pretty(&response.body).context("failed to render response")?;
    println!("{rendered}");

    if response.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::debug!(status = response.status, "command failed");
        Ok(ExitCode::FAILURE)
    }
}
