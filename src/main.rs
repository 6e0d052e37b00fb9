// src/main.rs

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    append::file::FileAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiki2md::{
    reporter_for, spawn_report, AppError, CommandLineInput, ConfluenceHttpClient, ExportScope,
    ExportSummary, Exporter, PipelineConfig, UsageReport,
};

/// Exit code when the requested page or space does not exist.
const EXIT_NOT_FOUND: u8 = 2;

/// Sets up logging configuration.
fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let log_file_path = std::env::temp_dir().join("wiki2md.log");
    if let Some(parent) = log_file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let pattern = if verbose {
        "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}"
    } else {
        "{m}{n}"
    };

    let stdout_appender = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build();

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}",
        )))
        .build(&log_file_path)?;

    let config = Config::builder()
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(log_level)))
                .build("stdout", Box::new(stdout_appender)),
        )
        .appender(Appender::builder().build("file", Box::new(file_appender)))
        .build(
            Root::builder()
                .appender("stdout")
                .appender("file")
                .build(LevelFilter::Debug),
        )?;

    log4rs::init_config(config)?;
    log::debug!("Logging initialized. Log file: {}", log_file_path.display());
    Ok(())
}

/// Cancels the run on Ctrl-C.
fn cancel_on_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; stopping after in-flight writes");
            cancel.cancel();
        }
    });
}

/// Runs the configured scope and reports the outcome.
async fn execute(config: &PipelineConfig, cancel: CancellationToken) -> Result<ExitCode, AppError> {
    let client =
        ConfluenceHttpClient::for_run(&config.connection, &config.export, cancel.clone())?;
    let exporter = Exporter::new(Arc::new(client), config.export.clone(), cancel);

    let summary = match &config.scope {
        ExportScope::ListSpaces => {
            let spaces = exporter.list_spaces().await?;
            for space in &spaces {
                println!(
                    "{:<12} {}  ({}, {})",
                    space.key,
                    space.display_name(),
                    space.kind,
                    space.status
                );
            }
            println!("{} spaces", spaces.len());
            return Ok(ExitCode::SUCCESS);
        }
        ExportScope::Page(id) => exporter.export_page(id).await?,
        ExportScope::Space(key) => exporter.export_space(key).await?,
        ExportScope::Hierarchy(id) => exporter.export_hierarchy(id).await?,
        ExportScope::AllSpaces => Some(exporter.export_all_spaces().await?),
    };

    let Some(summary) = summary else {
        eprintln!("✗ Nothing to export: the requested {} was not found.", config.scope.name());
        return Ok(ExitCode::from(EXIT_NOT_FOUND));
    };

    print_summary(config, &summary);

    let report = spawn_report(reporter_for(config), UsageReport::new(config, &summary));
    if let Err(e) = report.await {
        log::warn!("Usage report task failed: {}", e);
    }

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Reports completion to the user.
fn print_summary(config: &PipelineConfig, summary: &ExportSummary) {
    let stats = &summary.stats;
    println!(
        "✓ Exported {} pages ({} assets) to {} in {:.1}s",
        stats.pages_exported,
        stats.assets_downloaded,
        config.export.output_dir.display(),
        stats.elapsed.as_secs_f64()
    );

    if stats.duplicates_skipped > 0 {
        println!("  {} pages were already exported in this run", stats.duplicates_skipped);
    }
    if stats.assets_failed > 0 {
        eprintln!("⚠️  {} assets could not be downloaded", stats.assets_failed);
    }
    for failed in &summary.failed {
        eprintln!("✗ {} ({}): {}", failed.title, failed.id, failed.error);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = CommandLineInput::parse();

    setup_logging(cli.verbose).context("Failed to initialize logging")?;

    let config = PipelineConfig::resolve(cli).context("Invalid configuration")?;

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let code = execute(&config, cancel)
        .await
        .with_context(|| format!("{} export failed", config.scope.name()))?;

    Ok(code)
}
