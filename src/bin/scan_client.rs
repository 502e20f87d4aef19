//! Edge scan client: reads cards, queues them durably and syncs to the server.
//!
//! Cards are read one UID per line from stdin, which covers keyboard-wedge
//! and serial readers as well as manual testing.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use card_attendance::client::{
    block_on_client, ClientConfig, Feedback, HttpTransport, LineReader, ScanClient,
    SilentFeedback, SyncEngine, TerminalBell, READ_SHUTDOWN_GRACE,
};
use card_attendance::infra::{shutdown_signal, LocalQueue};
use card_attendance::server::init_tracing;

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = ClientConfig::from_env()?;
    // A read still blocked on stdin must not keep the process alive
    block_on_client(run(config), READ_SHUTDOWN_GRACE)
}

async fn run(config: ClientConfig) -> anyhow::Result<()> {
    info!("Attendance scan client v{}", env!("CARGO_PKG_VERSION"));
    info!("  Server endpoint: {}", config.scan_endpoint());
    info!("  Queue file: {}", config.queue_path.display());
    info!("  Request timeout: {:?}", config.request_timeout);

    let queue = LocalQueue::open(&config.queue_path)
        .await
        .with_context(|| format!("opening queue at {}", config.queue_path.display()))?;
    info!("  Pending scans: {}", queue.count().await?);

    let transport = HttpTransport::new(config.scan_endpoint(), config.request_timeout)?;
    let sync = SyncEngine::new(queue.clone(), Arc::new(transport), config.sync_config());

    let feedback: Arc<dyn Feedback> = if config.silent {
        Arc::new(SilentFeedback)
    } else {
        Arc::new(TerminalBell)
    };

    info!("Waiting for cards...");
    let client = ScanClient::new(LineReader::stdin(), sync, feedback, config.runner_config());
    let summary = client.run(shutdown_signal()).await?;

    info!(
        captured = summary.captured,
        confirmed = summary.confirmed,
        pending = summary.pending,
        "Scan client stopped"
    );
    queue.close().await;
    Ok(())
}
