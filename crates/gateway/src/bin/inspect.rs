//! Submission inspection tool
//!
//! Connects with the gateway's configuration and prints status counts and
//! the most recent submissions as JSON.

use anyhow::Context;
use clap::Parser;
use linkdir_common::config::AppConfig;
use linkdir_common::db::models::SubmissionStatus;
use linkdir_common::db::{DbPool, Repository, SubmissionStore};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "inspect", version, about = "Inspect stored directory submissions")]
struct Args {
    /// Number of recent submissions to print
    #[arg(short, long, default_value_t = 20)]
    limit: u64,

    /// Only show submissions with this status (pending, verified, published, rejected)
    #[arg(short, long)]
    status: Option<SubmissionStatus>,

    /// Print compact JSON instead of pretty
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let pool = DbPool::new(&config.database).await?;
    let store = Repository::new(pool);

    let counts: serde_json::Map<String, serde_json::Value> = store
        .count_by_status()
        .await?
        .into_iter()
        .map(|(status, count)| (status, json!(count)))
        .collect();

    let recent = store.list_recent(args.status, args.limit).await?;

    let report = json!({
        "counts": counts,
        "filter": args.status.map(|s| s.as_str()),
        "recent": recent,
    });

    let output = if args.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{output}");

    Ok(())
}
