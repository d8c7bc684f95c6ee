//! Drowsiness Monitor - Main Entry Point
//!
//! `drowsiness-monitor <frames.jsonl|-> [settings-file]`
//!
//! Replays a recorded frame file in timestamp order, or with `-` runs a live
//! session fed from stdin. Emissions are written to stdout as JSON lines.

use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use drowsiness_monitor::{
    init_logging, run_session, DetectorSession, FrameRecord, JsonLinesSink, MonitorSettings,
};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

const USAGE: &str = "usage: drowsiness-monitor <frames.jsonl|-> [settings-file]";

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(input) = args.next() else {
        bail!(USAGE);
    };
    let settings_path = args.next().map(PathBuf::from);

    let settings =
        MonitorSettings::load(settings_path.as_deref()).context("failed to load settings")?;
    init_logging(&settings.log_level, settings.json_logs)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    let session = DetectorSession::new(settings.detection, settings.gate)?;

    if input == "-" {
        live(session).await
    } else {
        replay(session, &input)
    }
}

fn replay(mut session: DetectorSession, path: &str) -> Result<()> {
    let file = std::fs::File::open(path).with_context(|| format!("cannot open {path}"))?;

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        if let Some(record) = FrameRecord::parse(&line?, index + 1)? {
            records.push(record);
        }
    }
    records.sort_by_key(FrameRecord::timestamp_ms);

    let Some(first) = records.first() else {
        warn!(path, "No frames to replay");
        return Ok(());
    };
    info!(path, frames = records.len(), "Replaying recorded frames");

    session.start(first.timestamp_ms());
    let detection = session.detection().clone();
    let mut sink = JsonLinesSink::new(io::stdout().lock());
    for record in records {
        session.process_frame(record.into_input(&detection), &mut sink);
    }
    session.stop();
    Ok(())
}

async fn live(session: DetectorSession) -> Result<()> {
    let (tx, rx) = mpsc::channel(64);
    let detection = session.detection().clone();
    let runner = tokio::spawn(run_session(session, rx, JsonLinesSink::new(io::stdout())));

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut line_number = 0;
    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        match FrameRecord::parse(&line, line_number) {
            Ok(Some(record)) => {
                if tx.send(record.into_input(&detection)).await.is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Skipping malformed frame"),
        }
    }
    drop(tx);

    let session = runner.await.context("session runner failed")?;
    info!(frames = session.frames_processed(), "Live session finished");
    Ok(())
}
