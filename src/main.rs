//! Attendance ingestion server entry point.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    card_attendance::server::run().await
}
