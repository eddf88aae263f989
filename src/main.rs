use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use proptax::batch::{count_rows, export_batch_summary, run_batch, BatchSummary, HaltReason, InputReader};
use proptax::browser::ChromeSession;
use proptax::cli::Cli;
use proptax::config::{self, AppConfig};
use proptax::fetcher::HttpDocumentFetcher;
use proptax::logger::{BatchLogger, VerbosityLevel};
use proptax::pipeline::{PipelineSettings, RetrievalPipeline};
use proptax::record_writer::RecordWriter;

/// Global flag for interrupt signaling - the batch stops after the current record
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Exit status when the input file contains a malformed row
const EXIT_MALFORMED_INPUT: i32 = 2;
/// 128 + SIGINT(2), standard exit code for Ctrl-C
const EXIT_INTERRUPTED: i32 = 130;

fn init_tracing(verbosity: VerbosityLevel) {
    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.tracing_directive()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_config() -> AppConfig {
    match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(config::ConfigError::FileNotFound(path)) => {
            // Config not found - prompt to create if interactive
            match AppConfig::prompt_create_config() {
                Ok(Some(created_path)) => {
                    println!("✅ Created default configuration file at: {}", created_path.display());
                    println!("   Edit this file to customize settings, then run proptax again.");
                    std::process::exit(0);
                }
                Ok(None) => {
                    eprintln!("❌ Configuration file not found at: {}", path.display());
                    eprintln!("   Run with --init to create a default configuration file.");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("❌ Failed to create configuration file: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle --init flag first (before any other processing)
    if cli.init {
        match AppConfig::create_default_config() {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run proptax again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut app_config = load_config();

    let verbosity = VerbosityLevel::from_verbose_count(cli.verbose);
    init_tracing(verbosity);

    let logger = Arc::new(match &cli.log_file {
        Some(log_file_path) => BatchLogger::with_log_file(verbosity, log_file_path.clone()),
        None => BatchLogger::new(verbosity),
    });

    ctrlc::set_handler(move || {
        if INTERRUPTED.swap(true, Ordering::SeqCst) {
            eprintln!("\n⚠️  Second interrupt received. Exiting immediately.");
            std::process::exit(EXIT_INTERRUPTED);
        }
        eprintln!("\n⚠️  Interrupt received. Stopping after the current record...");
    })
    .unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: Failed to set Ctrl-C handler: {}. Interrupt signals may not be handled gracefully.", e);
    });

    if let Err(e) = cli.validate() {
        logger.critical(&format!("Invalid arguments: {}", e));
        std::process::exit(1);
    }

    // Command line overrides
    if let Some(headless) = cli.headless_override() {
        app_config.browser.headless = headless;
    }
    if let Some(chrome_path) = &cli.chrome_path {
        app_config.browser.chrome_path = Some(chrome_path.clone());
    }
    if let Some(tax_year) = cli.tax_year {
        app_config.output.tax_year = Some(tax_year);
    }

    let input_path = cli.input.clone().ok_or_else(|| anyhow!("--input is required"))?;
    let pdf_dir = cli.pdf_dir.clone().ok_or_else(|| anyhow!("--pdf-dir is required"))?;
    let output_path = cli
        .output_path()
        .ok_or_else(|| anyhow!("Cannot determine output file"))?;

    if let Err(e) = std::fs::create_dir_all(&pdf_dir) {
        logger.critical(&format!("Failed to create PDF directory '{}': {}", pdf_dir.display(), e));
        std::process::exit(1);
    }

    let total_rows = count_rows(&input_path)?;
    logger.debug(&format!("{} rows in {}", total_rows, input_path.display()));

    let summary = {
        let logger = Arc::clone(&logger);
        let input_path = input_path.clone();
        let pdf_dir = pdf_dir.clone();
        let output_path = output_path.clone();

        // headless_chrome and reqwest::blocking both block; keep them off the runtime
        tokio::task::spawn_blocking(move || -> Result<BatchSummary> {
            let mut session = ChromeSession::launch(&app_config)?;
            let fetcher = HttpDocumentFetcher::new(&app_config.http)?;
            let pipeline = RetrievalPipeline::new(
                PipelineSettings::from_config(&app_config),
                &fetcher,
                &*logger,
                pdf_dir,
            );
            let mut writer = RecordWriter::open(&output_path)?;
            let records = InputReader::open(&input_path)?;

            logger.start_progress(total_rows);
            run_batch(
                records,
                &mut session,
                &pipeline,
                &mut writer,
                &*logger,
                Some(&INTERRUPTED),
            )
        })
        .await
        .context("Batch worker panicked")?
    };

    let summary = match summary {
        Ok(summary) => summary,
        Err(e) => {
            logger.finish_progress("Batch aborted");
            logger.critical(&format!("{:#}", e));
            export_logs(&logger);
            std::process::exit(1);
        }
    };

    if summary.processed > 0 {
        logger.finish_progress("Download complete!");
    } else {
        logger.finish_progress("No records processed");
    }

    logger.print_final_summary(&summary, &output_path, &pdf_dir);

    if let Some(summary_path) = &cli.summary_json {
        write_summary(&logger, &summary, summary_path);
    }

    export_logs(&logger);

    match summary.halt {
        Some(HaltReason::MalformedInput { .. }) => std::process::exit(EXIT_MALFORMED_INPUT),
        Some(HaltReason::Interrupted) => std::process::exit(EXIT_INTERRUPTED),
        None => Ok(()),
    }
}

fn write_summary(logger: &BatchLogger, summary: &BatchSummary, path: &Path) {
    match export_batch_summary(summary, path) {
        Ok(()) => println!("📄 Batch summary written to: {}", path.display()),
        Err(e) => logger.warn(&format!("Failed to write batch summary: {:#}", e)),
    }
}

fn export_logs(logger: &BatchLogger) {
    if !logger.is_log_export_enabled() {
        return;
    }
    match logger.export_logs() {
        Ok(()) => println!("📄 Execution logs exported ({} entries)", logger.get_log_count()),
        Err(e) => eprintln!("⚠️ Warning: Failed to export logs: {}", e),
    }
}
