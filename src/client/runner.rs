//! Edge client loop: capture, queue, sync.
//!
//! Each scan is handled sequentially: feedback, durable enqueue, then one
//! batch of delivery. While no card is presented, a non-empty queue is retried
//! on a fixed interval, one batch at a time.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::capture::{CardReader, Feedback};
use super::sync::{SyncEngine, SyncReport};
use crate::domain::CardUid;

/// Timing knobs for the client loop
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Pause after each scan before the reader is polled again
    pub scan_cooldown: Duration,
    /// Retry interval for a non-empty queue while idle (must be non-zero)
    pub retry_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            scan_cooldown: Duration::from_secs(3),
            retry_interval: Duration::from_secs(30),
        }
    }
}

/// Totals for one client run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Cards read and queued
    pub captured: u64,
    /// Captured scans adjudicated right away
    pub confirmed: u64,
    /// Scans still queued when the loop stopped
    pub pending: u64,
}

/// How long process exit waits for a card read still blocked on the reader
pub const READ_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Drive `main` on a dedicated runtime and abandon blocking tasks that outlive
/// it by more than `grace`.
///
/// A card read blocked on stdin cannot be cancelled, so dropping a runtime the
/// usual way would hold the process open until the next line arrives.
pub fn block_on_client<F, T>(main: F, grace: Duration) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build async runtime")?;
    let result = runtime.block_on(main);
    runtime.shutdown_timeout(grace);
    result
}

type ReadTask<R> = JoinHandle<(R, io::Result<Option<CardUid>>)>;

fn spawn_read<R: CardReader + 'static>(mut reader: R) -> ReadTask<R> {
    tokio::task::spawn_blocking(move || {
        let result = reader.read_card();
        (reader, result)
    })
}

pub struct ScanClient<R> {
    reader: R,
    sync: SyncEngine,
    feedback: Arc<dyn Feedback>,
    config: RunnerConfig,
}

impl<R: CardReader + 'static> ScanClient<R> {
    pub fn new(
        reader: R,
        sync: SyncEngine,
        feedback: Arc<dyn Feedback>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            reader,
            sync,
            feedback,
            config,
        }
    }

    /// Run until the reader is exhausted or `shutdown` resolves.
    ///
    /// Only local failures (reader or queue) end the loop with an error;
    /// server outages never do.
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let Self {
            reader,
            sync,
            feedback,
            config,
        } = self;
        tokio::pin!(shutdown);

        let mut summary = RunSummary::default();

        let mut retry = interval_at(
            Instant::now() + config.retry_interval,
            config.retry_interval,
        );
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Replay whatever a previous run left behind
        let report = sync.drain_batch().await;
        let mut pending = report.remaining > 0;
        if backlog_flowing(&report) {
            retry.reset_immediately();
        }

        let mut read = spawn_read(reader);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping scan client");
                    break;
                }
                _ = retry.tick(), if pending => {
                    debug!("retrying queued scans");
                    let report = sync.drain_batch().await;
                    pending = report.remaining > 0;
                    if backlog_flowing(&report) {
                        retry.reset_immediately();
                    }
                }
                joined = &mut read => {
                    let (reader, result) = joined.context("card reader task failed")?;
                    let Some(card_uid) = result.context("card reader failed")? else {
                        info!("Card reader closed");
                        break;
                    };

                    feedback.captured();
                    let scan_id = sync
                        .queue()
                        .enqueue(&card_uid, Utc::now())
                        .await
                        .context("failed to queue scan")?;
                    summary.captured += 1;
                    info!(scan_id, card_uid = %card_uid, "card captured");

                    let report = sync.drain_batch().await;
                    if report_confirms(&report, scan_id, feedback.as_ref()) {
                        summary.confirmed += 1;
                    }
                    pending = report.remaining > 0;
                    if backlog_flowing(&report) {
                        retry.reset_immediately();
                    }

                    if !config.scan_cooldown.is_zero() {
                        tokio::select! {
                            _ = &mut shutdown => {
                                info!("Shutdown requested, stopping scan client");
                                break;
                            }
                            _ = tokio::time::sleep(config.scan_cooldown) => {}
                        }
                    }

                    read = spawn_read(reader);
                }
            }
        }

        summary.pending = sync.queue().count().await.unwrap_or_else(|e| {
            warn!(error = %e, "failed to count pending scans");
            0
        });
        Ok(summary)
    }
}

/// The server answered the whole batch and more scans are waiting
fn backlog_flowing(report: &SyncReport) -> bool {
    report.halted.is_none() && report.remaining > 0
}

/// Signal the operator about a freshly captured scan. Returns whether the
/// server adjudicated it during this pass.
fn report_confirms(report: &SyncReport, scan_id: i64, feedback: &dyn Feedback) -> bool {
    match report.delivery_for(scan_id) {
        Some(synced) => {
            if let Some(outcome) = synced.delivery.outcome() {
                feedback.confirmed(outcome);
            }
            true
        }
        None => {
            info!(scan_id, "scan kept for later delivery");
            feedback.queued_offline();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::capture::{MockFeedback, ScriptedReader};
    use crate::client::sync::SyncConfig;
    use crate::client::transport::{Delivery, MockScanTransport, ServerReply, TransportError};
    use crate::domain::ScanOutcome;
    use crate::infra::LocalQueue;

    fn uids(raw: &[&str]) -> Vec<CardUid> {
        raw.iter().map(|r| CardUid::parse(r).unwrap()).collect()
    }

    fn fast() -> RunnerConfig {
        RunnerConfig {
            scan_cooldown: Duration::ZERO,
            retry_interval: Duration::from_secs(3600),
        }
    }

    #[tokio::test]
    async fn test_online_scans_are_confirmed_and_removed() {
        let queue = LocalQueue::in_memory().await.unwrap();

        let mut transport = MockScanTransport::new();
        transport.expect_deliver().times(2).returning(|scan| {
            let outcome = if scan.card_uid.as_str() == "1234" {
                ScanOutcome::Accepted
            } else {
                ScanOutcome::UnknownCard
            };
            Ok(ServerReply {
                status: outcome.http_status(),
                delivery: Delivery::Adjudicated(outcome),
                message: None,
            })
        });

        let mut feedback = MockFeedback::new();
        feedback.expect_captured().times(2).return_const(());
        feedback.expect_queued_offline().never();
        feedback
            .expect_confirmed()
            .withf(|o| *o == ScanOutcome::Accepted)
            .times(1)
            .return_const(());
        feedback
            .expect_confirmed()
            .withf(|o| *o == ScanOutcome::UnknownCard)
            .times(1)
            .return_const(());

        let sync = SyncEngine::new(queue.clone(), Arc::new(transport), SyncConfig::default());
        let client = ScanClient::new(
            ScriptedReader::new(uids(&["1234", "9999"])),
            sync,
            Arc::new(feedback),
            fast(),
        );

        let summary = client.run(std::future::pending()).await.unwrap();
        assert_eq!(
            summary,
            RunSummary {
                captured: 2,
                confirmed: 2,
                pending: 0
            }
        );
        assert_eq!(queue.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_offline_scans_stay_queued() {
        let queue = LocalQueue::in_memory().await.unwrap();

        let mut transport = MockScanTransport::new();
        transport.expect_deliver().returning(|_| {
            Err(TransportError::Connect("connection refused".to_string()))
        });

        let mut feedback = MockFeedback::new();
        feedback.expect_captured().times(3).return_const(());
        feedback.expect_queued_offline().times(3).return_const(());
        feedback.expect_confirmed().never();

        let sync = SyncEngine::new(queue.clone(), Arc::new(transport), SyncConfig::default());
        let client = ScanClient::new(
            ScriptedReader::new(uids(&["1", "2", "3"])),
            sync,
            Arc::new(feedback),
            fast(),
        );

        let summary = client.run(std::future::pending()).await.unwrap();
        assert_eq!(summary.captured, 3);
        assert_eq!(summary.confirmed, 0);
        assert_eq!(summary.pending, 3);

        let queued = queue.peek_oldest_batch(10).await.unwrap();
        let order: Vec<&str> = queued.iter().map(|s| s.card_uid.as_str()).collect();
        assert_eq!(order, ["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_backlog_is_replayed_on_start() {
        let queue = LocalQueue::in_memory().await.unwrap();
        queue
            .enqueue(&CardUid::parse("old").unwrap(), Utc::now())
            .await
            .unwrap();

        let mut transport = MockScanTransport::new();
        transport.expect_deliver().times(1).returning(|_| {
            Ok(ServerReply {
                status: 200,
                delivery: Delivery::Adjudicated(ScanOutcome::AlreadyRecorded),
                message: None,
            })
        });

        let mut feedback = MockFeedback::new();
        feedback.expect_captured().never();

        let sync = SyncEngine::new(queue.clone(), Arc::new(transport), SyncConfig::default());
        let client = ScanClient::new(ScriptedReader::default(), sync, Arc::new(feedback), fast());

        let summary = client.run(std::future::pending()).await.unwrap();
        assert_eq!(summary, RunSummary::default());
        assert_eq!(queue.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_loop() {
        struct BlockedReader;
        impl CardReader for BlockedReader {
            fn read_card(&mut self) -> io::Result<Option<CardUid>> {
                std::thread::sleep(Duration::from_millis(200));
                Ok(None)
            }
        }

        let queue = LocalQueue::in_memory().await.unwrap();
        let mut transport = MockScanTransport::new();
        transport.expect_deliver().never();

        let sync = SyncEngine::new(queue, Arc::new(transport), SyncConfig::default());
        let client = ScanClient::new(
            BlockedReader,
            sync,
            Arc::new(MockFeedback::new()),
            fast(),
        );

        let summary = client.run(async {}).await.unwrap();
        assert_eq!(summary.captured, 0);
    }

    #[test]
    fn test_stuck_reader_does_not_hold_up_exit() {
        struct StuckReader;
        impl CardReader for StuckReader {
            fn read_card(&mut self) -> io::Result<Option<CardUid>> {
                std::thread::sleep(Duration::from_secs(8));
                Ok(None)
            }
        }

        let started = std::time::Instant::now();
        let summary = block_on_client(
            async {
                let queue = LocalQueue::in_memory().await?;
                let mut transport = MockScanTransport::new();
                transport.expect_deliver().never();

                let sync = SyncEngine::new(queue, Arc::new(transport), SyncConfig::default());
                let client =
                    ScanClient::new(StuckReader, sync, Arc::new(MockFeedback::new()), fast());
                client
                    .run(tokio::time::sleep(Duration::from_millis(100)))
                    .await
            },
            Duration::from_millis(200),
        )
        .unwrap();

        assert_eq!(summary.captured, 0);
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "exit took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn test_backlog_is_delivered_in_batches_while_idle() {
        struct SlowReader;
        impl CardReader for SlowReader {
            fn read_card(&mut self) -> io::Result<Option<CardUid>> {
                std::thread::sleep(Duration::from_millis(500));
                Ok(None)
            }
        }

        let queue = LocalQueue::in_memory().await.unwrap();
        for raw in ["a", "b", "c", "d", "e"] {
            queue
                .enqueue(&CardUid::parse(raw).unwrap(), Utc::now())
                .await
                .unwrap();
        }

        let mut transport = MockScanTransport::new();
        transport.expect_deliver().times(5).returning(|_| {
            Ok(ServerReply {
                status: 201,
                delivery: Delivery::Adjudicated(ScanOutcome::Accepted),
                message: None,
            })
        });

        // Retry interval is an hour, so only immediate follow-up batches
        // can empty the queue before the reader closes
        let sync = SyncEngine::new(queue.clone(), Arc::new(transport), SyncConfig { batch_limit: 2 });
        let client = ScanClient::new(SlowReader, sync, Arc::new(MockFeedback::new()), fast());

        let summary = client.run(std::future::pending()).await.unwrap();
        assert_eq!(summary.pending, 0);
        assert_eq!(queue.count().await.unwrap(), 0);
    }
}
