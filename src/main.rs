mod capture;
mod console;
mod models;
mod utils;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use log::{debug, error, info, warn};
use std::io::{BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use termcolor::{Color, ColorSpec, WriteColor};

use crate::capture::artifact::CaptureArtifact;
use crate::capture::ingest::run_ingestion;
use crate::capture::manager::CaptureManager;
use crate::capture::provider::{self, TsharkProvider};
use crate::console::commands::run_command_loop;
use crate::console::input::spawn_operator_reader;
use crate::console::render::{self, Console, ConsoleWriter};
use crate::models::config::{AppConfig, ColorMode};
use crate::utils::logging;

#[derive(Parser, Debug)]
#[clap(author, version, about = "An interactive live packet monitor driven by tshark")]
struct Args {
    /// Interface(s) to capture on; repeat or comma separate. Defaults to all.
    #[clap(short, long, value_delimiter = ',')]
    interface: Vec<String>,

    /// Print the interfaces the capture provider can see and exit
    #[clap(long)]
    list_interfaces: bool,

    /// Directory for the raw capture file
    #[clap(long, default_value = "captures")]
    capture_dir: PathBuf,

    /// Path to the tshark executable
    #[clap(long, default_value = "tshark")]
    tshark: String,

    /// Field separator requested from tshark
    #[clap(long, default_value = "|")]
    separator: char,

    /// Colour console output
    #[clap(long, value_enum, default_value = "auto")]
    color: ColorMode,

    /// Seconds to wait for tshark to flush the capture file on shutdown
    #[clap(long, default_value = "5")]
    stop_timeout: u64,

    /// Log level (trace, debug, info, warn, error, off)
    #[clap(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> AppConfig {
        AppConfig {
            capture_dir: self.capture_dir,
            tshark_path: self.tshark,
            separator: self.separator,
            color: self.color,
            stop_timeout_secs: self.stop_timeout,
            ..AppConfig::default()
        }
        .with_interfaces(self.interface)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger with specified level
    logging::init_logger(logging::get_log_level(&args.log_level));

    info!("Starting RustShark Monitor v{}", env!("CARGO_PKG_VERSION"));

    let list_only = args.list_interfaces;
    let config = args.into_config();
    config.validate()?;
    debug!("Effective configuration: {}", serde_json::to_string(&config)?);

    if list_only {
        return print_interfaces(&config).await;
    }

    run_monitor(config).await
}

/// Print the provider's interface list
async fn print_interfaces(config: &AppConfig) -> Result<()> {
    let interfaces = provider::list_interfaces(&config.tshark_path)
        .await
        .context("Unable to list capture interfaces")?;

    let mut console = Console::stdout(config.color.choice());
    console.emit(|out| {
        out.set_color(ColorSpec::new().set_bold(true))?;
        writeln!(out, "Available Interfaces")?;
        out.reset()?;
        for iface in &interfaces {
            writeln!(out, "{}", iface)?;
        }
        Ok(())
    })?;
    Ok(())
}

/// Run one capture: start the provider, run both loops until stopped, then
/// tear the provider down and report on the capture file.
async fn run_monitor(config: AppConfig) -> Result<()> {
    tokio::fs::create_dir_all(&config.capture_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.capture_dir.display()))?;

    let capture_file = config.capture_file(Local::now());
    let mut tshark = TsharkProvider::new(&config, capture_file.clone()).spawn()?;
    let output = tshark.take_output()?;

    let mut console = Console::stdout(config.color.choice());
    console.emit(|out| render::write_banner(out, &capture_file))?;

    let manager = Arc::new(CaptureManager::new());

    let ingest_task = tokio::spawn(run_ingestion(
        output,
        manager.clone(),
        config.separator,
        console.clone(),
    ));

    let commands = spawn_operator_reader(BufReader::new(std::io::stdin()))?;
    let command_task = tokio::spawn(run_command_loop(commands, manager.clone(), console.clone()));

    manager.wait_for_shutdown().await;

    console.emit(|out| {
        writeln!(out)?;
        render::write_notice(out, Color::Yellow, "Stopping capture...")
    })?;

    match tshark.stop(config.stop_timeout()).await {
        Ok(status) if !status.success() => warn!("tshark exited with {}", status),
        Ok(_) => {}
        Err(e) => error!("Failed to stop capture provider: {}", e),
    }

    match ingest_task.await {
        Ok(summary) => info!(
            "Ingested {} lines ({} skipped, {} not printed), ended by {:?}",
            summary.lines_read, summary.lines_skipped, summary.render_failures, summary.end
        ),
        Err(e) => error!("Ingestion task panicked: {}", e),
    }

    if let Err(e) = command_task.await {
        error!("Command task panicked: {}", e);
    }

    info!(
        "Final statistics: {}",
        serde_json::to_string(&manager.stats())?
    );

    match CaptureArtifact::inspect(&capture_file).await {
        Ok(CaptureArtifact::Saved { path, bytes }) => {
            info!("Capture file holds {} bytes", bytes);
            console.emit(|out| {
                render::write_notice(out, Color::Green, &format!("✓ Capture saved: {}", path.display()))
            })?;
        }
        Ok(artifact) => {
            warn!("Capture artifact not usable: {:?}", artifact);
            console.emit(|out| render::write_notice(out, Color::Magenta, "✗ Capture failed or empty file"))?;
        }
        Err(e) => {
            warn!("Unable to inspect {}: {}", capture_file.display(), e);
            console.emit(|out| render::write_notice(out, Color::Magenta, "✗ Capture failed or empty file"))?;
        }
    }

    Ok(())
}
