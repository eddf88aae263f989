//! Batch processing of property records from a CSV file
//!
//! Supports:
//! - Header-less CSV input: field 0 = account number, field 2 = address
//! - Strictly sequential processing against one portal session
//! - Halting the whole batch on a malformed row (fewer than three fields)
//! - Halting after the in-flight record when interrupted
//! - A JSON summary of the run

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info};

use crate::pipeline::{InputRecord, RetrievalPipeline, RetrievalResult, RetrievalStatus};
use crate::record_writer::RecordWriter;
use crate::session::PortalSession;

/// Minimum number of fields in an input row
pub const MIN_FIELDS: usize = 3;

const ACCOUNT_FIELD: usize = 0;
const ADDRESS_FIELD: usize = 2;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Malformed input row {row}: expected at least {} fields, found {found}", MIN_FIELDS)]
    MalformedRow { row: u64, found: usize },

    #[error("Failed to read input row {row}: {message}")]
    Unreadable { row: u64, message: String },
}

impl InputError {
    pub fn row(&self) -> u64 {
        match self {
            InputError::MalformedRow { row, .. } | InputError::Unreadable { row, .. } => *row,
        }
    }
}

/// Reader over the input CSV.
///
/// Every physical line outside a quoted field is one row, blank lines
/// included: a blank line is a row with no fields and halts the batch like any
/// other short row. A final line terminator does not start another row.
pub struct InputReader {
    rows: std::vec::IntoIter<String>,
    row: u64,
}

impl InputReader {
    pub fn open(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to open input file: {}", path.display()))?;

        Ok(Self::from_content(&content))
    }

    pub fn from_content(content: &str) -> Self {
        Self {
            rows: split_rows(content).into_iter(),
            row: 0,
        }
    }
}

impl Iterator for InputReader {
    type Item = Result<InputRecord, InputError>;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.rows.next()?;
        self.row += 1;
        Some(read_row(self.row, &text))
    }
}

/// Group physical lines into rows, keeping quoted line breaks inside their row.
fn split_rows(content: &str) -> Vec<String> {
    let mut rows = Vec::new();
    let mut pending: Option<String> = None;

    for line in content.lines() {
        let text = match pending.take() {
            Some(mut open) => {
                open.push('\n');
                open.push_str(line);
                open
            }
            None => line.to_string(),
        };

        // Odd quote count: a quoted field continues on the next line
        if text.matches('"').count() % 2 == 1 {
            pending = Some(text);
        } else {
            rows.push(text);
        }
    }

    // Unterminated quote; let the CSV parser report it
    rows.extend(pending);
    rows
}

fn read_row(row: u64, text: &str) -> Result<InputRecord, InputError> {
    if text.is_empty() {
        return Err(InputError::MalformedRow { row, found: 0 });
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => parse_row(row, &record),
        Ok(false) => Err(InputError::MalformedRow { row, found: 0 }),
        Err(e) => Err(InputError::Unreadable {
            row,
            message: e.to_string(),
        }),
    }
}

fn parse_row(row: u64, record: &csv::StringRecord) -> Result<InputRecord, InputError> {
    if record.len() < MIN_FIELDS {
        return Err(InputError::MalformedRow {
            row,
            found: record.len(),
        });
    }

    Ok(InputRecord::new(
        record.get(ACCOUNT_FIELD).unwrap_or_default().trim(),
        record.get(ADDRESS_FIELD).unwrap_or_default().trim(),
    ))
}

/// Count input rows, used to size progress output before the run starts
pub fn count_rows(path: &Path) -> Result<u64> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    Ok(split_rows(&content).len() as u64)
}

/// Why a batch stopped before reaching the end of its input
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum HaltReason {
    MalformedInput { row: u64, message: String },
    Interrupted,
}

/// Summary of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    /// Records run through the pipeline
    pub processed: usize,
    /// Rows skipped because the account field was empty
    pub skipped: usize,
    /// Rows appended to the output file
    pub rows_written: usize,
    /// Count of records per terminal status
    pub status_counts: BTreeMap<String, usize>,
    /// Set when the batch stopped early
    pub halt: Option<HaltReason>,
    /// Timestamp when batch started
    pub started_at: String,
    /// Timestamp when batch completed
    pub completed_at: String,
}

impl BatchSummary {
    pub fn new() -> Self {
        Self {
            processed: 0,
            skipped: 0,
            rows_written: 0,
            status_counts: BTreeMap::new(),
            halt: None,
            started_at: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            completed_at: String::new(),
        }
    }

    fn record(&mut self, status: RetrievalStatus) {
        self.processed += 1;
        *self
            .status_counts
            .entry(status.marker().to_string())
            .or_insert(0) += 1;
    }

    pub fn count_for(&self, status: RetrievalStatus) -> usize {
        self.status_counts.get(status.marker()).copied().unwrap_or(0)
    }

    pub fn succeeded(&self) -> usize {
        self.count_for(RetrievalStatus::Matched)
    }

    pub fn failed(&self) -> usize {
        self.processed - self.succeeded()
    }

    fn finalize(&mut self) {
        self.completed_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    }
}

impl Default for BatchSummary {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress hooks for whoever presents the batch to a user
pub trait BatchObserver {
    fn record_started(&self, _record: &InputRecord) {}
    fn record_finished(&self, _result: &RetrievalResult) {}
    fn batch_halted(&self, _reason: &HaltReason) {}
}

/// Observer that ignores everything
pub struct SilentObserver;

impl BatchObserver for SilentObserver {}

/// Run every record through the pipeline, one at a time, appending one row
/// per record to `writer`.
///
/// A malformed row stops the batch; rows already written stay in the sink.
/// If `interrupt` is set, the batch stops after the in-flight record.
/// Only sink write failures are returned as errors.
pub fn run_batch<I, S>(
    records: I,
    session: &mut S,
    pipeline: &RetrievalPipeline<'_>,
    writer: &mut RecordWriter,
    observer: &dyn BatchObserver,
    interrupt: Option<&AtomicBool>,
) -> Result<BatchSummary>
where
    I: IntoIterator<Item = Result<InputRecord, InputError>>,
    S: PortalSession + ?Sized,
{
    let mut summary = BatchSummary::new();

    for item in records {
        if interrupt.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            let reason = HaltReason::Interrupted;
            observer.batch_halted(&reason);
            summary.halt = Some(reason);
            break;
        }

        let record = match item {
            Ok(record) => record,
            Err(e) => {
                let reason = HaltReason::MalformedInput {
                    row: e.row(),
                    message: e.to_string(),
                };
                observer.batch_halted(&reason);
                summary.halt = Some(reason);
                break;
            }
        };

        if record.account_number.is_empty() {
            debug!("Skipping row without account number");
            summary.skipped += 1;
            continue;
        }

        observer.record_started(&record);
        let result = pipeline.process(session, &record);
        writer.append(&result)?;
        summary.record(result.status);
        observer.record_finished(&result);
    }

    summary.rows_written = writer.count();
    summary.finalize();
    info!(
        "Batch finished: {} processed, {} matched, {} failed",
        summary.processed,
        summary.succeeded(),
        summary.failed()
    );
    Ok(summary)
}

/// Export batch summary to JSON file
pub fn export_batch_summary(summary: &BatchSummary, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)
        .context("Failed to serialize batch summary")?;

    fs::write(output_path, json)
        .context(format!("Failed to write batch summary to: {}", output_path.display()))?;

    Ok(())
}
