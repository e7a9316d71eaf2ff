use clap::Args;
use std::path::{Path, PathBuf};
use tenant_lifecycle::config::AppConfig;
use tenant_lifecycle::error::AppError;
use tenant_lifecycle::telemetry;
use tenant_lifecycle::workflows::lifecycle::{Collaborators, TenantEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

const CHANNEL_CAPACITY: usize = 32;

#[derive(Args, Debug)]
pub(crate) struct ReplayArgs {
    /// Newline-delimited JSON file of `{"kind": ..., "record": {...}}` events
    #[arg(long)]
    pub(crate) events: PathBuf,
}

pub(crate) async fn run_replay(args: ReplayArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let events = read_events(&args.events).await?;
    info!(count = events.len(), path = %args.events.display(), "replaying tenant events");

    let dispatcher = Collaborators::live(&config.lifecycle)?.dispatcher(&config.lifecycle);

    let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
    let producer = tokio::spawn(async move {
        for event in events {
            if sender.send(event).await.is_err() {
                break;
            }
        }
    });

    let summary = dispatcher.run(receiver).await;
    producer.await.ok();

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(err) => println!("Replay summary unavailable: {}", err),
    }
    Ok(())
}

/// Parse every line up front so malformed input never leaves a partial replay behind.
pub(crate) async fn read_events(path: &Path) -> Result<Vec<TenantEvent>, AppError> {
    let file = tokio::fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut events = Vec::new();
    let mut line_number = 0;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line).map_err(|source| AppError::Event {
            line: line_number,
            source,
        })?;
        events.push(event);
    }

    Ok(events)
}
