use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use indicatif::{ProgressBar, ProgressStyle};

use crate::batch::{BatchObserver, BatchSummary, HaltReason};
use crate::events::{EventSink, PipelineEvent, Severity};
use crate::pipeline::{InputRecord, RetrievalResult, RetrievalStatus};

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,    // Only show progress bar, critical messages and final summary
    Summary = 1,   // Per-record start lines and outcomes (default)
    Detailed = 2,  // Warnings
    Debug = 3,     // Everything
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    /// Default `tracing` filter directive for this verbosity
    pub fn tracing_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Silent | VerbosityLevel::Summary => "warn",
            VerbosityLevel::Detailed => "info",
            VerbosityLevel::Debug => "debug",
        }
    }
}

/// Console and log-file front end for a batch run.
///
/// Receives pipeline events and batch progress callbacks; the pipeline itself
/// knows nothing about it.
pub struct BatchLogger {
    verbosity: VerbosityLevel,
    progress_bar: Mutex<Option<ProgressBar>>,
    started: Mutex<Option<Instant>>,
    log_buffer: Mutex<Vec<String>>,
    log_file_path: Option<String>,
}

impl BatchLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress_bar: Mutex::new(None),
            started: Mutex::new(None),
            log_buffer: Mutex::new(Vec::new()),
            log_file_path: None,
        }
    }

    pub fn with_log_file(verbosity: VerbosityLevel, log_file_path: String) -> Self {
        Self {
            log_file_path: Some(log_file_path),
            ..Self::new(verbosity)
        }
    }

    /// Whether lines at `level` reach the console
    pub fn shows(&self, level: VerbosityLevel) -> bool {
        self.verbosity >= level
    }

    pub fn info(&self, message: &str) {
        if self.shows(VerbosityLevel::Summary) {
            self.print_message("INFO", message);
        } else {
            self.buffer_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("WARN", message);
        } else {
            self.buffer_message("WARN", message);
        }
    }

    pub fn critical(&self, message: &str) {
        // Failures are always shown regardless of verbosity
        self.print_message("CRITICAL", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn format_message(&self, level: &str, message: &str) -> String {
        format!("[{}] {}: {}", self.get_timestamp(), level, message)
    }

    /// Keep a message for the log file without showing it
    fn buffer_message(&self, level: &str, message: &str) {
        if self.log_file_path.is_some() {
            let msg = self.format_message(level, message);
            if let Ok(mut buffer) = self.log_buffer.lock() {
                buffer.push(msg);
            }
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let msg = self.format_message(level, message);

        if self.log_file_path.is_some() {
            if let Ok(mut buffer) = self.log_buffer.lock() {
                buffer.push(msg.clone());
            }
        }

        // Route through the progress bar so it keeps its position
        if let Ok(guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    fn get_timestamp(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let secs = now.as_secs();
        let millis = now.subsec_millis();

        let hours = (secs / 3600) % 24;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
    }

    pub fn start_progress(&self, total_rows: u64) {
        let pb = ProgressBar::new(total_rows);

        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| {
                    ProgressStyle::default_bar()
                        .template("{bar:40} {pos}/{len} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                })
                .progress_chars("##-"),
        );
        pb.set_message("Starting...");

        if let Ok(mut guard) = self.progress_bar.lock() {
            *guard = Some(pb);
        }
        if let Ok(mut started) = self.started.lock() {
            *started = Some(Instant::now());
        }
    }

    fn update_progress(&self, message: &str) {
        if let Ok(guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.set_message(message.to_string());
            }
        }
    }

    fn advance_progress(&self) {
        if let Ok(guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.inc(1);
            }
        }
    }

    pub fn finish_progress(&self, final_message: &str) {
        if let Ok(mut guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
        self.info(final_message);
    }

    pub fn print_final_summary(&self, summary: &BatchSummary, output_file: &Path, pdf_dir: &Path) {
        let elapsed = self
            .started
            .lock()
            .ok()
            .and_then(|s| *s)
            .map(|start| start.elapsed());

        println!("\n=== BATCH SUMMARY ===");
        if let Some(elapsed) = elapsed {
            println!("Duration: {:.2}s", elapsed.as_secs_f64());
        }
        println!("Records Processed: {}", summary.processed);
        if summary.skipped > 0 {
            println!("Rows Skipped (no account): {}", summary.skipped);
        }
        for status in [
            RetrievalStatus::Matched,
            RetrievalStatus::NoMatch,
            RetrievalStatus::Delinquent,
            RetrievalStatus::MissingAmount,
            RetrievalStatus::DownloadFailed,
            RetrievalStatus::Timeout,
            RetrievalStatus::MalformedAddress,
        ] {
            let count = summary.count_for(status);
            if count > 0 {
                println!("  {}: {}", status.marker(), count);
            }
        }
        println!("Results File: {}", output_file.display());
        println!("Statements Directory: {}", pdf_dir.display());
        match &summary.halt {
            Some(HaltReason::MalformedInput { row, .. }) => {
                println!("Stopped early: malformed input at row {}", row)
            }
            Some(HaltReason::Interrupted) => println!("Stopped early: interrupted"),
            None => {}
        }
        println!("=====================\n");
    }

    /// Write all collected log lines to the log file, replacing its content
    pub fn export_logs(&self) -> io::Result<()> {
        let Some(ref log_file_path) = self.log_file_path else {
            return Ok(());
        };
        let buffer = match self.log_buffer.lock() {
            Ok(buffer) => buffer,
            Err(_) => return Ok(()),
        };

        if let Some(parent) = Path::new(log_file_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)?;

        for log_entry in buffer.iter() {
            writeln!(file, "{}", log_entry)?;
        }

        file.flush()
    }

    pub fn is_log_export_enabled(&self) -> bool {
        self.log_file_path.is_some()
    }

    pub fn get_log_count(&self) -> usize {
        self.log_buffer.lock().map(|b| b.len()).unwrap_or(0)
    }
}

impl EventSink for BatchLogger {
    fn emit(&self, event: PipelineEvent) {
        match event.severity {
            Severity::Info => self.info(&event.message),
            Severity::Critical => self.critical(&event.message),
        }
    }
}

impl BatchObserver for BatchLogger {
    fn record_started(&self, record: &InputRecord) {
        self.update_progress(&record.account_number);
        self.info(&format!("Retrieving data for: {}...", record.account_number));
    }

    fn record_finished(&self, _result: &RetrievalResult) {
        self.advance_progress();
    }

    fn batch_halted(&self, reason: &HaltReason) {
        match reason {
            HaltReason::MalformedInput { message, .. } => {
                self.critical(&format!("malformed csv file: {}", message))
            }
            HaltReason::Interrupted => {
                self.warn("Interrupted: stopping after the current record")
            }
        }
    }
}
