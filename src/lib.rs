pub mod address;
pub mod batch;
pub mod browser;
pub mod cli;
pub mod config;
pub mod events;
pub mod fetcher;
pub mod logger;
pub mod output_path;
pub mod pipeline;
pub mod record_writer;
pub mod session;

pub use batch::{run_batch, BatchSummary, HaltReason, InputReader};
pub use events::{EventSink, PipelineEvent, Severity};
pub use fetcher::{DocumentFetcher, FetchError, FetchedDocument};
pub use pipeline::{InputRecord, PipelineSettings, RetrievalPipeline, RetrievalResult, RetrievalStatus};
pub use record_writer::RecordWriter;
pub use session::{PortalSession, ReadyCondition, SessionError};
