//! Headless Chrome backed portal session.
//!
//! One Chrome process and one tab serve the whole batch. All calls are
//! blocking; run them from a blocking thread, never directly on the async
//! runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use tracing::{debug, info};

use crate::config::{AppConfig, BrowserConfig, SelectorConfig};
use crate::session::{poll_until, PortalSession, ReadyCondition, SessionError};

/// Chrome closes its DevTools connection after this long without traffic.
/// Slow portals and long downloads stay well inside it.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

fn browser_err(e: impl std::fmt::Display) -> SessionError {
    SessionError::Browser(e.to_string())
}

/// Locate the Chrome binary: explicit setting, then CHROME_PATH, then the
/// Windows install seen from WSL. `None` lets headless_chrome search itself.
fn resolve_chrome_path(configured: Option<&Path>) -> Option<PathBuf> {
    configured
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("CHROME_PATH").ok().map(PathBuf::from))
        .or_else(|| {
            let wsl_path = Path::new("/mnt/c/Program Files/Google/Chrome/Application/chrome.exe");
            if wsl_path.exists() { Some(wsl_path.to_path_buf()) } else { None }
        })
}

/// Launch Chrome.
/// Automatically disables sandbox when running inside a container
/// (detected via /.dockerenv or PROPTAX_CONTAINER env var).
pub fn create_browser(config: &BrowserConfig) -> Result<Browser> {
    let is_container = std::env::var("PROPTAX_CONTAINER").is_ok()
        || Path::new("/.dockerenv").exists();
    let chrome_path = resolve_chrome_path(config.chrome_path.as_deref());

    debug!(
        "Launching Chrome (headless: {}, sandbox: {}, path: {:?})",
        config.headless, !is_container, chrome_path
    );

    let options = LaunchOptions::default_builder()
        .headless(config.headless)
        .sandbox(!is_container)
        .path(chrome_path)
        .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
        .build()
        .map_err(|e| anyhow!("Failed to build Chrome launch options: {}", e))?;

    Browser::new(options).map_err(|e| anyhow!("Failed to launch headless Chrome: {}", e))
}

/// Does the page currently satisfy `condition`? `present` reports whether a
/// selector matches anything on the page.
///
/// The detail page counts as ready only once the result rows are gone, so a
/// title element rendered on the search page cannot satisfy it early.
fn condition_met(
    condition: ReadyCondition,
    selectors: &SelectorConfig,
    present: impl Fn(&str) -> bool,
) -> bool {
    match condition {
        ReadyCondition::SearchForm => present(selectors.search_input.as_str()),
        ReadyCondition::SearchResults => {
            present(selectors.result_row.as_str()) || present(selectors.empty_result_row.as_str())
        }
        ReadyCondition::AccountDetail => {
            present(selectors.account_title.as_str()) && !present(selectors.result_row.as_str())
        }
    }
}

pub struct ChromeSession {
    // Dropping the browser kills the Chrome process.
    _browser: Browser,
    tab: Arc<Tab>,
    search_url: String,
    selectors: SelectorConfig,
    poll_interval: Duration,
}

impl ChromeSession {
    pub fn launch(config: &AppConfig) -> Result<Self> {
        let browser = create_browser(&config.browser)?;
        let tab = browser
            .new_tab()
            .map_err(|e| anyhow!("Failed to create browser tab: {}", e))?;

        info!("Browser session ready for {}", config.portal.search_url);

        Ok(Self {
            _browser: browser,
            tab,
            search_url: config.portal.search_url.clone(),
            selectors: config.portal.selectors.clone(),
            poll_interval: config.timing.poll_interval(),
        })
    }

    fn has_element(&self, selector: &str) -> bool {
        self.tab.find_element(selector).is_ok()
    }

    fn require(&self, selector: &str) -> Result<Element<'_>, SessionError> {
        self.tab
            .find_element(selector)
            .map_err(|_| SessionError::ElementNotFound(selector.to_string()))
    }

    /// headless_chrome reports "no nodes matched" as an error.
    fn all(&self, selector: &str) -> Vec<Element<'_>> {
        self.tab.find_elements(selector).unwrap_or_default()
    }

    /// Resolve a possibly relative link against the current page URL.
    fn absolute_url(&self, href: &str) -> String {
        url::Url::parse(&self.tab.get_url())
            .and_then(|base| base.join(href))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string())
    }
}

impl PortalSession for ChromeSession {
    fn open_portal(&mut self) -> Result<(), SessionError> {
        debug!("Navigating to {}", self.search_url);
        self.tab.navigate_to(&self.search_url).map_err(browser_err)?;
        self.tab.wait_until_navigated().map_err(browser_err)?;
        Ok(())
    }

    fn wait_until_ready(
        &mut self,
        condition: ReadyCondition,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        let selectors = &self.selectors;
        poll_until(condition, timeout, self.poll_interval, || {
            Ok(condition_met(condition, selectors, |s| self.has_element(s)))
        })
    }

    fn submit_search(&mut self, account_number: &str) -> Result<(), SessionError> {
        let input = self.require(&self.selectors.search_input)?;
        input.click().map_err(browser_err)?;
        input.type_into(account_number).map_err(browser_err)?;
        self.tab.press_key("Enter").map_err(browser_err)?;
        Ok(())
    }

    fn result_rows(&mut self) -> Result<Vec<String>, SessionError> {
        self.all(&self.selectors.result_row)
            .iter()
            .map(|row| row.get_inner_text().map_err(browser_err))
            .collect()
    }

    fn open_result(&mut self, row_index: usize, account_number: &str) -> Result<(), SessionError> {
        let rows = self.all(&self.selectors.result_row);
        let row = rows.get(row_index).ok_or_else(|| {
            SessionError::ElementNotFound(format!("{}[{}]", self.selectors.result_row, row_index))
        })?;

        let links = row.find_elements("a").unwrap_or_default();
        let link = links
            .iter()
            .find(|a| {
                a.get_inner_text()
                    .map(|text| text.contains(account_number))
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                SessionError::ElementNotFound(format!("link containing '{}'", account_number))
            })?;

        link.click().map_err(browser_err)?;
        self.tab.wait_until_navigated().map_err(browser_err)?;
        Ok(())
    }

    fn account_title(&mut self) -> Result<String, SessionError> {
        self.require(&self.selectors.account_title)?
            .get_inner_text()
            .map_err(browser_err)
    }

    fn first_totals_row(&mut self) -> Result<Option<String>, SessionError> {
        let table = self.require(&self.selectors.totals_table)?;
        let rows = table.find_elements("tr").unwrap_or_default();
        match rows.first() {
            Some(row) => row.get_inner_text().map(Some).map_err(browser_err),
            None => Ok(None),
        }
    }

    fn statement_url(&mut self) -> Result<Option<String>, SessionError> {
        let link = match self.tab.find_element(&self.selectors.statement_link) {
            Ok(link) => link,
            Err(_) => return Ok(None),
        };

        let href = link.get_attribute_value("href").map_err(browser_err)?;
        Ok(href
            .filter(|h| !h.trim().is_empty())
            .map(|h| self.absolute_url(h.trim())))
    }
}
