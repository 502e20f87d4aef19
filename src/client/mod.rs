//! Edge client: card capture, durable buffering and delivery to the server.
//!
//! - [`capture`] - card readers and operator feedback
//! - [`transport`] - HTTP delivery and reply classification
//! - [`sync`] - oldest-first drain of the local queue
//! - [`runner`] - the sequential capture loop

pub mod capture;
mod config;
pub mod runner;
pub mod sync;
pub mod transport;

pub use capture::{CardReader, Feedback, LineReader, ScriptedReader, SilentFeedback, TerminalBell};
pub use config::ClientConfig;
pub use runner::{block_on_client, RunSummary, RunnerConfig, ScanClient, READ_SHUTDOWN_GRACE};
pub use sync::{HaltReason, SyncConfig, SyncEngine, SyncReport, SyncedScan};
pub use transport::{Delivery, HttpTransport, ScanTransport, ServerReply, TransportError};
