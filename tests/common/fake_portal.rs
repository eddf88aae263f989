use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use proptax::fetcher::{DocumentFetcher, FetchError, FetchedDocument};
use proptax::session::{PortalSession, ReadyCondition, SessionError};

/// What the portal shows for one searched account number.
#[derive(Debug, Clone, Default)]
pub struct FakeAccountPage {
    pub rows: Vec<String>,
    pub title: String,
    pub totals_row: Option<String>,
    pub statement_url: Option<String>,
}

impl FakeAccountPage {
    /// A page with one result row and a payable statement.
    pub fn payable(row: &str, amount: &str, statement_url: &str) -> Self {
        Self {
            rows: vec![row.to_string()],
            title: "Property Tax Account".to_string(),
            totals_row: Some(format!("Total Amount Due {}", amount)),
            statement_url: Some(statement_url.to_string()),
        }
    }
}

/// Scripted [`PortalSession`]: serves canned pages keyed by account number and
/// records what the pipeline did with them.
#[derive(Debug, Default)]
pub struct FakeSession {
    pages: HashMap<String, FakeAccountPage>,
    current: Option<String>,
    /// Readiness condition that never becomes true.
    pub stall_on: Option<ReadyCondition>,
    pub portal_loads: usize,
    pub searches: Vec<String>,
    /// (account number, row index) for every opened result.
    pub opened: Vec<(String, usize)>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, account_number: &str, page: FakeAccountPage) -> Self {
        self.pages.insert(account_number.to_string(), page);
        self
    }

    pub fn stalling_on(mut self, condition: ReadyCondition) -> Self {
        self.stall_on = Some(condition);
        self
    }

    fn page(&self) -> Option<&FakeAccountPage> {
        self.current.as_ref().and_then(|acct| self.pages.get(acct))
    }

    fn detail_page(&self) -> Result<&FakeAccountPage, SessionError> {
        self.page()
            .ok_or_else(|| SessionError::ElementNotFound("account detail".to_string()))
    }
}

impl PortalSession for FakeSession {
    fn open_portal(&mut self) -> Result<(), SessionError> {
        self.portal_loads += 1;
        self.current = None;
        Ok(())
    }

    fn wait_until_ready(
        &mut self,
        condition: ReadyCondition,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        if self.stall_on == Some(condition) {
            return Err(SessionError::Timeout {
                condition,
                waited: timeout,
            });
        }
        Ok(())
    }

    fn submit_search(&mut self, account_number: &str) -> Result<(), SessionError> {
        self.searches.push(account_number.to_string());
        self.current = Some(account_number.to_string());
        Ok(())
    }

    fn result_rows(&mut self) -> Result<Vec<String>, SessionError> {
        Ok(self.page().map(|p| p.rows.clone()).unwrap_or_default())
    }

    fn open_result(&mut self, row_index: usize, account_number: &str) -> Result<(), SessionError> {
        self.opened.push((account_number.to_string(), row_index));
        let rows = self.page().map(|p| p.rows.len()).unwrap_or(0);
        if row_index >= rows {
            return Err(SessionError::ElementNotFound(format!("row {}", row_index)));
        }
        Ok(())
    }

    fn account_title(&mut self) -> Result<String, SessionError> {
        Ok(self.detail_page()?.title.clone())
    }

    fn first_totals_row(&mut self) -> Result<Option<String>, SessionError> {
        Ok(self.detail_page()?.totals_row.clone())
    }

    fn statement_url(&mut self) -> Result<Option<String>, SessionError> {
        Ok(self.detail_page()?.statement_url.clone())
    }
}

/// In-memory [`DocumentFetcher`]. Unknown URLs fail with a transport error.
#[derive(Default)]
pub struct StubFetcher {
    documents: HashMap<String, Result<Vec<u8>, u16>>,
    pub requested: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serving(mut self, url: &str, bytes: &[u8]) -> Self {
        self.documents.insert(url.to_string(), Ok(bytes.to_vec()));
        self
    }

    pub fn failing(mut self, url: &str, status: u16) -> Self {
        self.documents.insert(url.to_string(), Err(status));
        self
    }

    pub fn request_count(&self) -> usize {
        self.requested.lock().unwrap().len()
    }
}

impl DocumentFetcher for StubFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        match self.documents.get(url) {
            Some(Ok(bytes)) => Ok(FetchedDocument {
                bytes: bytes.clone(),
                content_type: Some("application/pdf".to_string()),
            }),
            Some(Err(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
                body_preview: String::new(),
            }),
            None => Err(FetchError::Transport {
                url: url.to_string(),
                message: "connection refused".to_string(),
            }),
        }
    }
}
