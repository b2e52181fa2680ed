//! gnstart: Gn starting-protocol decision support.
//!
//! Interactive terminal: runs the TUI. Piped stdin: reads one JSON object of
//! named feature values and prints the assessment as JSON.

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gnstart::adapters::artifacts::load_from_config;
use gnstart::adapters::sanitize::SanitizingMakeWriter;
use gnstart::application::AssessmentService;
use gnstart::config::AppConfig;
use gnstart::tui::App;

fn main() -> Result<()> {
    let config = AppConfig::from_env().map_err(|e| anyhow!("Invalid configuration: {e}"))?;

    // Logs on the terminal would corrupt the TUI (alternate screen), and stdout
    // carries batch output, so logs go to a file or stderr.
    let interactive = std::io::stdout().is_terminal();
    let (writer, _guard) = if config.log_mode.use_file(interactive) {
        if let Some(parent) = config.log_file.parent() {
            // Best-effort: don't fail startup just because the directory is missing.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .with_context(|| format!("Failed to open log file {:?}", config.log_file))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    tracing::info!("Starting gnstart...");

    // Refuse to start if any artifact cannot be loaded or verified.
    let context = load_from_config(&config).with_context(|| {
        format!("Failed to load artifacts from {:?}", config.artifact_dir)
    })?;
    let context = Arc::new(context);

    if std::io::stdin().is_terminal() {
        let mut app = App::new(context);
        app.run()?;
    } else {
        run_batch(context)?;
    }

    tracing::info!("gnstart shutdown complete.");
    Ok(())
}

/// One assessment from JSON on stdin to JSON on stdout.
fn run_batch(context: Arc<gnstart::application::ModelContext>) -> Result<()> {
    let stdin = std::io::stdin().lock();
    let stdout = std::io::stdout().lock();

    AssessmentService::new(context)
        .assess_json(stdin, stdout)
        .context("Batch assessment failed")?;
    Ok(())
}
