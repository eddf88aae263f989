//! Per-record retrieval: search, disambiguate, classify, extract, download.
//!
//! [`RetrievalPipeline::process`] turns one [`InputRecord`] into exactly one
//! [`RetrievalResult`]. It never returns an error: every failure is classified
//! into a terminal [`RetrievalStatus`] carrying whatever was obtained before
//! the failure, and one [`PipelineEvent`] is emitted describing the outcome.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::address::{parse_address, ParsedAddress};
use crate::config::AppConfig;
use crate::events::{EventSink, PipelineEvent};
use crate::fetcher::DocumentFetcher;
use crate::output_path::{current_tax_year, resolve_document_path};
use crate::session::{PortalSession, ReadyCondition, SessionError};

/// A last token that looks like money: optional `$`, optional sign, digits with
/// optional thousands separators and decimals.
static MONETARY_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$?-?\d[\d,]*(\.\d+)?$").unwrap());

/// One (account number, address) pair from the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRecord {
    pub account_number: String,
    pub raw_address: String,
}

impl InputRecord {
    pub fn new(account_number: impl Into<String>, raw_address: impl Into<String>) -> Self {
        Self {
            account_number: account_number.into(),
            raw_address: raw_address.into(),
        }
    }
}

/// Terminal classification of a record's retrieval attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetrievalStatus {
    Matched,
    NoMatch,
    Delinquent,
    MissingAmount,
    DownloadFailed,
    Timeout,
    MalformedAddress,
}

impl RetrievalStatus {
    /// Literal written to the output sink when no amount is available.
    pub fn marker(&self) -> &'static str {
        match self {
            RetrievalStatus::Matched => "MATCHED",
            RetrievalStatus::NoMatch => "NO MATCHING ACCOUNT",
            RetrievalStatus::Delinquent => "DELINQUENT",
            RetrievalStatus::MissingAmount => "MISSING TAX AMOUNT",
            RetrievalStatus::DownloadFailed => "DOWNLOAD FAILED",
            RetrievalStatus::Timeout => "TIMEOUT",
            RetrievalStatus::MalformedAddress => "MALFORMED ADDRESS",
        }
    }

    pub fn is_success(&self) -> bool {
        *self == RetrievalStatus::Matched
    }
}

/// Outcome of one record. Produced once, written to the sink, then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub account_number: String,
    pub raw_address: String,
    pub status: RetrievalStatus,
    pub tax_amount: Option<String>,
    pub document_path: Option<PathBuf>,
    /// Human-readable description of the outcome.
    pub detail: String,
}

impl RetrievalResult {
    /// Third output column: the amount when one was extracted, otherwise the
    /// status marker.
    pub fn output_field(&self) -> &str {
        match &self.tax_amount {
            Some(amount) => amount,
            None => self.status.marker(),
        }
    }

    pub fn output_row(&self) -> [&str; 3] {
        [&self.account_number, &self.raw_address, self.output_field()]
    }
}

/// Knobs the pipeline needs from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub delinquent_marker: String,
    pub page_ready_timeout: Duration,
    pub search_ready_timeout: Duration,
    pub detail_ready_timeout: Duration,
    /// Fixed tax year; the previous calendar year at call time when `None`.
    pub tax_year: Option<i32>,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            delinquent_marker: config.portal.delinquent_marker.clone(),
            page_ready_timeout: config.timing.page_ready_timeout(),
            search_ready_timeout: config.timing.search_ready_timeout(),
            detail_ready_timeout: config.timing.detail_ready_timeout(),
            tax_year: config.output.tax_year,
        }
    }
}

/// Does this result row mention the account, street name and street number?
///
/// Account numbers in the input sometimes lack leading zeroes, so the account
/// number alone can match unrelated rows; the address parts pin it down.
pub fn row_matches(row_text: &str, account_number: &str, address: &ParsedAddress) -> bool {
    let row = row_text.to_uppercase();
    [
        account_number.to_uppercase(),
        address.street_name.to_uppercase(),
        address.street_number.to_uppercase(),
    ]
    .iter()
    .all(|needle| row.contains(needle.as_str()))
}

/// Indices of all rows satisfying [`row_matches`], in page order.
pub fn matching_rows(rows: &[String], account_number: &str, address: &ParsedAddress) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| row_matches(row, account_number, address))
        .map(|(i, _)| i)
        .collect()
}

/// Take the last whitespace-delimited token of a totals row as the amount.
pub fn extract_amount(row_text: &str) -> Option<String> {
    let token = row_text.split_whitespace().last()?;
    if MONETARY_TOKEN.is_match(token) {
        Some(token.to_string())
    } else {
        None
    }
}

struct Terminal {
    status: RetrievalStatus,
    tax_amount: Option<String>,
    document_path: Option<PathBuf>,
    detail: String,
}

impl Terminal {
    fn new(status: RetrievalStatus, tax_amount: Option<&str>, detail: String) -> Self {
        Self {
            status,
            tax_amount: tax_amount.map(str::to_string),
            document_path: None,
            detail,
        }
    }
}

/// Classify a session failure. Timeouts keep their own status; anything else
/// is reported as a missing amount before extraction and a failed download
/// after it.
fn session_fault(err: SessionError, account_number: &str, amount: Option<&str>) -> Terminal {
    match err {
        SessionError::Timeout { .. } => Terminal::new(
            RetrievalStatus::Timeout,
            amount,
            format!("Portal did not respond in time for account {}: {}", account_number, err),
        ),
        other => {
            let status = if amount.is_some() {
                RetrievalStatus::DownloadFailed
            } else {
                RetrievalStatus::MissingAmount
            };
            Terminal::new(
                status,
                amount,
                format!("Portal error for account {}: {}", account_number, other),
            )
        }
    }
}

pub struct RetrievalPipeline<'a> {
    settings: PipelineSettings,
    fetcher: &'a dyn DocumentFetcher,
    events: &'a dyn EventSink,
    document_dir: PathBuf,
}

impl<'a> RetrievalPipeline<'a> {
    pub fn new(
        settings: PipelineSettings,
        fetcher: &'a dyn DocumentFetcher,
        events: &'a dyn EventSink,
        document_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            settings,
            fetcher,
            events,
            document_dir: document_dir.into(),
        }
    }

    pub fn document_dir(&self) -> &Path {
        &self.document_dir
    }

    /// Resolve one record against the portal.
    pub fn process<S>(&self, session: &mut S, record: &InputRecord) -> RetrievalResult
    where
        S: PortalSession + ?Sized,
    {
        let terminal = match self.retrieve(session, record) {
            Ok(t) | Err(t) => t,
        };

        self.events.emit(PipelineEvent::terminal(
            &record.account_number,
            terminal.status,
            terminal.detail.clone(),
        ));

        RetrievalResult {
            account_number: record.account_number.clone(),
            raw_address: record.raw_address.clone(),
            status: terminal.status,
            tax_amount: terminal.tax_amount,
            document_path: terminal.document_path,
            detail: terminal.detail,
        }
    }

    /// Both arms carry a terminal; `Err` short-circuits at the failing stage.
    fn retrieve<S>(&self, session: &mut S, record: &InputRecord) -> Result<Terminal, Terminal>
    where
        S: PortalSession + ?Sized,
    {
        let account = record.account_number.as_str();
        let fault = |e| session_fault(e, account, None);

        let address = parse_address(&record.raw_address).map_err(|e| {
            Terminal::new(
                RetrievalStatus::MalformedAddress,
                None,
                format!("Skipping account {}: {}", account, e),
            )
        })?;

        // Search
        session.open_portal().map_err(fault)?;
        session
            .wait_until_ready(ReadyCondition::SearchForm, self.settings.page_ready_timeout)
            .map_err(fault)?;
        session.submit_search(account).map_err(fault)?;
        session
            .wait_until_ready(ReadyCondition::SearchResults, self.settings.search_ready_timeout)
            .map_err(fault)?;

        // Disambiguate
        let rows = session.result_rows().map_err(fault)?;
        let matches = matching_rows(&rows, account, &address);
        let row_index = match matches.last() {
            Some(&i) => i,
            None => {
                return Err(Terminal::new(
                    RetrievalStatus::NoMatch,
                    None,
                    format!(
                        "Unable to find match for account {} ({} result rows) - skipping",
                        account,
                        rows.len()
                    ),
                ))
            }
        };

        session.open_result(row_index, account).map_err(fault)?;
        session
            .wait_until_ready(ReadyCondition::AccountDetail, self.settings.detail_ready_timeout)
            .map_err(fault)?;

        // Classify
        let title = session.account_title().map_err(fault)?;
        if title.contains(&self.settings.delinquent_marker) {
            return Err(Terminal::new(
                RetrievalStatus::Delinquent,
                None,
                format!("Account {} is {}", account, self.settings.delinquent_marker),
            ));
        }

        // Extract
        let amount = session
            .first_totals_row()
            .map_err(fault)?
            .as_deref()
            .and_then(extract_amount)
            .ok_or_else(|| {
                Terminal::new(
                    RetrievalStatus::MissingAmount,
                    None,
                    format!("Failure retrieving tax amount for account {}", account),
                )
            })?;

        let download_failed = |detail: String| {
            Terminal::new(RetrievalStatus::DownloadFailed, Some(&amount), detail)
        };

        // Resolve link
        let url = session
            .statement_url()
            .map_err(|e| session_fault(e, account, Some(&amount)))?
            .ok_or_else(|| {
                download_failed(format!("No statement link found for account {}", account))
            })?;

        // Download
        let document = self.fetcher.fetch(&url).map_err(|e| {
            download_failed(format!(
                "Unable to download PDF report for account {}: {}",
                account, e
            ))
        })?;

        let tax_year = self.settings.tax_year.unwrap_or_else(current_tax_year);
        let path = resolve_document_path(
            &self.document_dir,
            &address.street_name,
            &address.street_number,
            tax_year,
        )
        .map_err(|e| download_failed(format!("Cannot store statement for account {}: {}", account, e)))?;

        write_new_file(&path, &document.bytes).map_err(|e| {
            download_failed(format!(
                "Failed to write statement for account {} to {}: {}",
                account,
                path.display(),
                e
            ))
        })?;

        let mut detail = format!(
            "Account {}: tax amount {}, statement saved to {}",
            account,
            amount,
            path.display()
        );
        if matches.len() > 1 {
            detail.push_str(&format!(" ({} result rows matched; used the last)", matches.len()));
        }

        Ok(Terminal {
            status: RetrievalStatus::Matched,
            tax_amount: Some(amount),
            document_path: Some(path),
            detail,
        })
    }
}

/// Write bytes to a path that must not exist yet.
fn write_new_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)?;
    file.flush()
}
