//! Plain HTTP download of statement documents.
//!
//! Statements are fetched outside the browser session with a browser-like
//! `User-Agent`; the portal rejects default client identifiers.

use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::debug;

use crate::config::HttpConfig;

/// How much of an error body is kept for the log line.
const ERROR_BODY_PREVIEW: usize = 200;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status} from {url}: {body_preview}")]
    Status {
        url: String,
        status: u16,
        body_preview: String,
    },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

pub trait DocumentFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError>;
}

/// Blocking `reqwest` fetcher. Must not be called from inside an async task;
/// the batch runs on a blocking thread.
pub struct HttpDocumentFetcher {
    client: reqwest::blocking::Client,
}

impl HttpDocumentFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }
}

impl DocumentFetcher for HttpDocumentFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        debug!("Fetching statement: {}", url);

        let response = self.client.get(url).send().map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body_preview: body.chars().take(ERROR_BODY_PREVIEW).collect(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: format!("failed to read body: {}", e),
        })?;

        debug!("Fetched {} bytes from {}", bytes.len(), url);

        Ok(FetchedDocument {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
