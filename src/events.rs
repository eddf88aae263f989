//! Structured events emitted by the retrieval pipeline.
//!
//! The pipeline never writes to a global logger. It hands one
//! [`PipelineEvent`] per record to an [`EventSink`], and the caller decides
//! how to render it (console, progress bar, log file, test channel).

use std::sync::mpsc::Sender;

use crate::pipeline::RetrievalStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Critical,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineEvent {
    pub account_number: String,
    pub status: RetrievalStatus,
    pub severity: Severity,
    pub message: String,
}

impl PipelineEvent {
    /// Build the terminal event for a record. Only `Matched` is informational.
    pub fn terminal(account_number: &str, status: RetrievalStatus, message: String) -> Self {
        let severity = if status == RetrievalStatus::Matched {
            Severity::Info
        } else {
            Severity::Critical
        };
        Self {
            account_number: account_number.to_string(),
            status,
            severity,
            message,
        }
    }
}

pub trait EventSink {
    fn emit(&self, event: PipelineEvent);
}

impl EventSink for Sender<PipelineEvent> {
    fn emit(&self, event: PipelineEvent) {
        // A dropped receiver only means nobody is listening anymore.
        let _ = self.send(event);
    }
}

/// Discards every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: PipelineEvent) {}
}
