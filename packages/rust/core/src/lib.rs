//! Bulk content import: source resolution, chunked submission, and result
//! presentation.
//!
//! The flow is `source` → `submitter` (driving a [`processor::RecordProcessor`])
//! → `presenter`, with every step recorded as a transition of
//! [`state::ImportRunState`]. [`session::ImportSession`] ties them together.

pub mod client;
pub mod local;
pub mod media;
pub mod presenter;
pub mod processor;
pub mod session;
pub mod source;
pub mod state;
pub mod submitter;

pub use processor::{HttpProcessor, RecordProcessor};
pub use session::ImportSession;
pub use state::{ImportEvent, ImportRunState};
pub use submitter::{BatchSubmitter, CHUNK_SIZE, ProgressReporter, SilentProgress};
