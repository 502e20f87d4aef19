use std::collections::VecDeque;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDate};

use card_attendance::client::{ClientConfig, HaltReason, HttpTransport, SyncEngine};
use card_attendance::domain::HistoryQuery;
use card_attendance::infra::LocalQueue;
use card_attendance::server::connect_store;
use card_attendance::{AttendanceError, AttendanceStore, CardUid};

fn print_help() {
    eprintln!(
        "\
attendance-admin

USAGE:
  attendance-admin <command> [options]

COMMANDS:
  migrate                         Run database migrations
  add-person                      Register a card holder
  remove-person                   Remove a card holder with no attendance history
  list-people                     List registered card holders
  export-history                  Export accepted check-ins (newest first)
  queue-status                    Show scans pending on this edge device
  sync-once                       Deliver pending scans once and exit

COMMON OPTIONS (server commands):
  --database-url <url>            (defaults to env DATABASE_URL; postgres:// or sqlite:)

add-person OPTIONS:
  --uid <card_uid>                (required)
  --name <full_name>              (required)

remove-person OPTIONS:
  --uid <card_uid>                (required)

export-history OPTIONS:
  --date <YYYY-MM-DD>             (optional) Only this calendar day
  --today                         (optional) Only today (server local date)
  --limit <n>                     (default: 500, max 5000)
  --output <path>                 (optional) Output file path (default: stdout)
  --format <json|ndjson>          (default: json)

queue-status / sync-once OPTIONS:
  --queue-path <path>             (defaults to env QUEUE_PATH or pending_scans.db)
  --server-url <url>              (sync-once only; defaults to env SERVER_URL)
"
    );
}

fn require_database_url(database_url: Option<String>) -> anyhow::Result<String> {
    database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required (or pass --database-url)"))
}

fn take_value(args: &mut VecDeque<String>, flag: &str) -> anyhow::Result<String> {
    args.pop_front()
        .ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))
}

async fn open_store(database_url: Option<String>) -> anyhow::Result<Arc<dyn AttendanceStore>> {
    let database_url = require_database_url(database_url)?;
    connect_store(&database_url, 5, false).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let mut args: VecDeque<String> = std::env::args().skip(1).collect();
    let Some(command) = args.pop_front() else {
        print_help();
        return Ok(());
    };

    if matches!(command.as_str(), "-h" | "--help" | "help") {
        print_help();
        return Ok(());
    }

    match command.as_str() {
        "migrate" => {
            let mut database_url: Option<String> = None;
            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--database-url" => database_url = Some(take_value(&mut args, &arg)?),
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let database_url = require_database_url(database_url)?;
            connect_store(&database_url, 5, true).await?;
            println!("ok: migrations applied");
            Ok(())
        }
        "add-person" => {
            let mut database_url: Option<String> = None;
            let mut uid: Option<CardUid> = None;
            let mut name: Option<String> = None;

            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--database-url" => database_url = Some(take_value(&mut args, &arg)?),
                    "--uid" => uid = Some(CardUid::parse(&take_value(&mut args, &arg)?)?),
                    "--name" => name = Some(take_value(&mut args, &arg)?),
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let uid = uid.ok_or_else(|| anyhow::anyhow!("--uid is required"))?;
            let name = name.ok_or_else(|| anyhow::anyhow!("--name is required"))?;

            let store = open_store(database_url).await?;
            match store.register_person(&uid, &name).await {
                Ok(person) => {
                    println!("ok: registered {} ({})", person.full_name, person.card_uid);
                    Ok(())
                }
                Err(AttendanceError::PersonExists(uid)) => {
                    anyhow::bail!("a person with card UID {uid} already exists")
                }
                Err(e) => Err(e.into()),
            }
        }
        "remove-person" => {
            let mut database_url: Option<String> = None;
            let mut uid: Option<CardUid> = None;

            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--database-url" => database_url = Some(take_value(&mut args, &arg)?),
                    "--uid" => uid = Some(CardUid::parse(&take_value(&mut args, &arg)?)?),
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let uid = uid.ok_or_else(|| anyhow::anyhow!("--uid is required"))?;
            let store = open_store(database_url).await?;
            if store.remove_person(&uid).await? {
                println!("ok: removed {uid}");
            } else {
                println!("no person registered for {uid}");
            }
            Ok(())
        }
        "list-people" => {
            let mut database_url: Option<String> = None;
            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--database-url" => database_url = Some(take_value(&mut args, &arg)?),
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let store = open_store(database_url).await?;
            let people = store.list_people().await?;
            for person in &people {
                println!(
                    "{}\t{}\t{}",
                    person.card_uid,
                    person.full_name,
                    person.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            eprintln!("{} people", people.len());
            Ok(())
        }
        "export-history" => {
            let mut database_url: Option<String> = None;
            let mut date: Option<NaiveDate> = None;
            let mut limit: Option<u32> = None;
            let mut output_path: Option<PathBuf> = None;
            let mut format = "json".to_string();

            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--database-url" => database_url = Some(take_value(&mut args, &arg)?),
                    "--date" => {
                        let raw = take_value(&mut args, &arg)?;
                        date = Some(
                            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                                .map_err(|e| anyhow::anyhow!("invalid --date {raw:?}: {e}"))?,
                        );
                    }
                    "--today" => date = Some(Local::now().date_naive()),
                    "--limit" => limit = Some(take_value(&mut args, &arg)?.parse()?),
                    "--output" => output_path = Some(PathBuf::from(take_value(&mut args, &arg)?)),
                    "--format" => format = take_value(&mut args, &arg)?,
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            if !matches!(format.as_str(), "json" | "ndjson") {
                anyhow::bail!("--format must be 'json' or 'ndjson'");
            }

            let store = open_store(database_url).await?;
            let entries = store.history(&HistoryQuery { date, limit }).await?;

            let mut output: Box<dyn Write> = match &output_path {
                Some(path) => Box::new(std::fs::File::create(path)?),
                None => Box::new(std::io::stdout()),
            };

            if format == "json" {
                serde_json::to_writer_pretty(&mut output, &entries)?;
                writeln!(output)?;
            } else {
                for entry in &entries {
                    serde_json::to_writer(&mut output, entry)?;
                    writeln!(output)?;
                }
            }
            output.flush()?;

            eprintln!("exported {} entries", entries.len());
            Ok(())
        }
        "queue-status" | "sync-once" => {
            let mut config = ClientConfig::from_env()?;
            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--queue-path" => config.queue_path = PathBuf::from(take_value(&mut args, &arg)?),
                    "--server-url" if command == "sync-once" => {
                        config.server_url = take_value(&mut args, &arg)?;
                    }
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let queue = LocalQueue::open(&config.queue_path).await?;

            if command == "queue-status" {
                let pending = queue.peek_oldest_batch(config.sync_batch_limit).await?;
                let total = queue.count().await?;
                println!("pending scans: {total}");
                for scan in &pending {
                    println!(
                        "{}\t{}\t{}",
                        scan.id,
                        scan.card_uid,
                        scan.captured_at.to_rfc3339()
                    );
                }
                if total > pending.len() as u64 {
                    println!("... {} more", total - pending.len() as u64);
                }
                queue.close().await;
                return Ok(());
            }

            let transport = HttpTransport::new(config.scan_endpoint(), config.request_timeout)?;
            let sync = SyncEngine::new(queue.clone(), Arc::new(transport), config.sync_config());
            let report = sync.drain().await;
            queue.close().await;

            for synced in &report.outcomes {
                let verdict = match synced.delivery.outcome() {
                    Some(outcome) => outcome.to_string(),
                    None => "malformed".to_string(),
                };
                println!(
                    "{}\t{}\t{}\t{}",
                    synced.scan_id,
                    synced.card_uid,
                    verdict,
                    synced.message.as_deref().unwrap_or("")
                );
            }
            println!(
                "delivered {} of {} attempted, {} remaining",
                report.removed, report.attempted, report.remaining
            );

            match report.halted {
                None => Ok(()),
                Some(HaltReason::Transient { scan_id, reason }) => {
                    anyhow::bail!("stopped at scan {scan_id}: {reason}")
                }
                Some(HaltReason::Queue(reason)) => anyhow::bail!("local queue error: {reason}"),
            }
        }
        other => {
            print_help();
            anyhow::bail!("unknown command: {other}")
        }
    }
}
