//! The interactive portal session as seen by the retrieval pipeline.
//!
//! [`PortalSession`] is the only way the pipeline touches the browser. The
//! production implementation is [`crate::browser::ChromeSession`]; tests use a
//! scripted fake. Readiness is explicit: the pipeline asks the session to wait
//! for a [`ReadyCondition`] with a bounded timeout instead of sleeping.

use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Page states the pipeline waits for before reading the DOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyCondition {
    /// The search input is present on the portal page.
    SearchForm,
    /// The results table rendered at least one data row or its empty-state row.
    SearchResults,
    /// The account detail page shows its title block.
    AccountDetail,
}

impl fmt::Display for ReadyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadyCondition::SearchForm => "search form",
            ReadyCondition::SearchResults => "search results",
            ReadyCondition::AccountDetail => "account detail page",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Timed out after {waited:?} waiting for {condition}")]
    Timeout {
        condition: ReadyCondition,
        waited: Duration,
    },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Browser error: {0}")]
    Browser(String),
}

/// One interactive browsing session against the tax portal.
///
/// Implementations are driven by a single record at a time; every method takes
/// `&mut self` so the borrow checker enforces that.
pub trait PortalSession {
    /// Load the portal search page.
    fn open_portal(&mut self) -> Result<(), SessionError>;

    /// Block until `condition` holds or `timeout` elapses.
    fn wait_until_ready(
        &mut self,
        condition: ReadyCondition,
        timeout: Duration,
    ) -> Result<(), SessionError>;

    /// Type the account number into the search field and submit it.
    fn submit_search(&mut self, account_number: &str) -> Result<(), SessionError>;

    /// Full visible text of every search result row, in page order.
    fn result_rows(&mut self) -> Result<Vec<String>, SessionError>;

    /// Follow the account link inside result row `row_index`.
    fn open_result(&mut self, row_index: usize, account_number: &str) -> Result<(), SessionError>;

    /// Title/status text of the account detail page.
    fn account_title(&mut self) -> Result<String, SessionError>;

    /// Text of the first row of the totals table, if the table has any rows.
    fn first_totals_row(&mut self) -> Result<Option<String>, SessionError>;

    /// Target URL of the statement print control, if present.
    fn statement_url(&mut self) -> Result<Option<String>, SessionError>;
}

/// Poll `probe` every `interval` until it reports ready or `timeout` elapses.
///
/// The probe runs at least once, so a zero timeout still checks the current
/// state. Probe errors end the wait immediately.
pub fn poll_until<F>(
    condition: ReadyCondition,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<(), SessionError>
where
    F: FnMut() -> Result<bool, SessionError>,
{
    let start = Instant::now();
    loop {
        if probe()? {
            return Ok(());
        }

        let waited = start.elapsed();
        if waited >= timeout {
            return Err(SessionError::Timeout { condition, waited });
        }

        std::thread::sleep(interval.min(timeout - waited));
    }
}
