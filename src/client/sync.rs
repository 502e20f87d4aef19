//! Sync engine: drains the local queue to the ingestion service
//!
//! Records are delivered oldest first, one at a time. A definitive reply
//! removes the record; the first transient failure ends the pass with that
//! record and everything after it left in place, so the next pass resumes at
//! the oldest record still queued.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use super::transport::{Delivery, ScanTransport};
use crate::domain::CardUid;
use crate::infra::LocalQueue;

/// Why a pass stopped before the queue was empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// The server was unreachable or did not adjudicate the scan
    Transient { scan_id: i64, reason: String },
    /// Reading or updating the local queue failed
    Queue(String),
}

/// A scan removed from the queue after a definitive reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedScan {
    pub scan_id: i64,
    pub card_uid: CardUid,
    pub delivery: Delivery,
    pub message: Option<String>,
}

/// Result of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Delivery attempts made
    pub attempted: usize,
    /// Records removed after a definitive reply
    pub removed: usize,
    /// Records still queued when the pass ended
    pub remaining: u64,
    pub outcomes: Vec<SyncedScan>,
    pub halted: Option<HaltReason>,
}

impl SyncReport {
    /// Definitive result for a given scan, if it was delivered in this pass
    pub fn delivery_for(&self, scan_id: i64) -> Option<&SyncedScan> {
        self.outcomes.iter().find(|s| s.scan_id == scan_id)
    }

    pub fn is_complete(&self) -> bool {
        self.halted.is_none() && self.remaining == 0
    }
}

/// Sync engine configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Records fetched per queue read
    pub batch_limit: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { batch_limit: 100 }
    }
}

pub struct SyncEngine {
    queue: LocalQueue,
    transport: Arc<dyn ScanTransport>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(queue: LocalQueue, transport: Arc<dyn ScanTransport>, config: SyncConfig) -> Self {
        Self {
            queue,
            transport,
            config,
        }
    }

    pub fn queue(&self) -> &LocalQueue {
        &self.queue
    }

    /// Deliver queued scans until the queue is empty or a pass must stop.
    ///
    /// Never fails: every problem is logged and reported in [`SyncReport::halted`].
    pub async fn drain(&self) -> SyncReport {
        self.deliver(None).await
    }

    /// Deliver at most one batch of `batch_limit` scans, oldest first.
    ///
    /// Bounds the time the capture loop spends on a backlog; whatever is left
    /// shows up in [`SyncReport::remaining`].
    pub async fn drain_batch(&self) -> SyncReport {
        self.deliver(Some(1)).await
    }

    #[instrument(skip(self))]
    async fn deliver(&self, max_batches: Option<usize>) -> SyncReport {
        let mut report = SyncReport::default();
        let mut batches = 0usize;

        'batches: loop {
            if max_batches.is_some_and(|max| batches >= max) {
                break;
            }
            batches += 1;

            let batch = match self.queue.peek_oldest_batch(self.config.batch_limit).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(error = %e, "failed to read pending scans");
                    report.halted = Some(HaltReason::Queue(e.to_string()));
                    break;
                }
            };

            if batch.is_empty() {
                break;
            }
            debug!(batch = batch.len(), "delivering pending scans");

            for scan in batch {
                report.attempted += 1;

                let reply = match self.transport.deliver(&scan).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        warn!(scan_id = scan.id, error = %e, "server unreachable, keeping scan queued");
                        report.halted = Some(HaltReason::Transient {
                            scan_id: scan.id,
                            reason: e.to_string(),
                        });
                        break 'batches;
                    }
                };

                match reply.delivery {
                    Delivery::Adjudicated(outcome) => info!(
                        scan_id = scan.id,
                        card_uid = %scan.card_uid,
                        outcome = %outcome,
                        reply = reply.message.as_deref().unwrap_or(""),
                        "scan adjudicated"
                    ),
                    Delivery::Malformed { status } => warn!(
                        scan_id = scan.id,
                        card_uid = %scan.card_uid,
                        status,
                        "server refused scan, discarding"
                    ),
                }

                if let Err(e) = self.queue.remove(scan.id).await {
                    error!(scan_id = scan.id, error = %e, "failed to remove delivered scan");
                    report.halted = Some(HaltReason::Queue(e.to_string()));
                    break 'batches;
                }

                report.removed += 1;
                report.outcomes.push(SyncedScan {
                    scan_id: scan.id,
                    card_uid: scan.card_uid,
                    delivery: reply.delivery,
                    message: reply.message,
                });
            }
        }

        match self.queue.count().await {
            Ok(remaining) => report.remaining = remaining,
            Err(e) => {
                error!(error = %e, "failed to count pending scans");
                if report.halted.is_none() {
                    report.halted = Some(HaltReason::Queue(e.to_string()));
                }
            }
        }

        if report.attempted > 0 {
            info!(
                attempted = report.attempted,
                removed = report.removed,
                remaining = report.remaining,
                "sync pass finished"
            );
        }

        report
    }
}
