//! Replay recorded input streams.
//!
//! Input is one JSON envelope per line, e.g.
//!
//! ```text
//! {"at_ms":0,"input":{"command":"prepare"}}
//! {"at_ms":10,"input":{"command":"add","activity_id":3,"note":"legs"}}
//! {"at_ms":900,"input":{"sensor":"proximity","near":true,"at_ms":900}}
//! ```
//!
//! `add` commands may name an `activity_id` instead of a full activity; it
//! is resolved against the catalog. Every emitted event is printed as one
//! JSON line on stdout.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use actrec_core::recording::{self, Envelope, RecordingSession};
use actrec_core::sensors::SensorEvent;
use actrec_core::storage::{Config, Database};
use actrec_core::{Catalog, CoreError, ManualClock, Result};
use clap::Args;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::info;

use super::load_catalog;

#[derive(Args)]
pub struct ReplayArgs {
    /// JSON-lines input file ("-" for stdin)
    pub file: PathBuf,
    /// Catalog used to resolve `activity_id` in add commands
    #[arg(long)]
    pub catalog: Option<PathBuf>,
    /// Keep finished records in memory only
    #[arg(long)]
    pub no_persist: bool,
    /// Insert clock ticks every `session.tick_interval_ms` between inputs
    #[arg(long)]
    pub ticks: bool,
}

pub fn run(args: ReplayArgs) -> Result<()> {
    let config = Config::load()?;
    let catalog = load_catalog(args.catalog.as_deref())?;

    let reader: Box<dyn BufRead> = if args.file.as_os_str() == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        Box::new(BufReader::new(std::fs::File::open(&args.file)?))
    };
    let mut envelopes = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let envelope = parse_line(trimmed, &catalog, &config)
            .map_err(|e| CoreError::Custom(format!("line {}: {e}", index + 1)))?;
        envelopes.push(envelope);
    }
    if args.ticks {
        envelopes = with_ticks(envelopes, config.session.tick_interval_ms);
    }
    info!(count = envelopes.len(), "replaying input stream");

    let store = if args.no_persist {
        Database::open_memory()?
    } else {
        Database::open()?
    };
    let start_ms = envelopes.first().map(|e| e.at_ms).unwrap_or(0);
    let session =
        RecordingSession::new(store, config).with_time(Arc::new(ManualClock::new(start_ms)));

    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    for envelope in envelopes {
        in_tx
            .send(envelope)
            .map_err(|e| CoreError::Custom(e.to_string()))?;
    }
    drop(in_tx);

    let runtime = tokio::runtime::Runtime::new()?;
    let session = runtime.block_on(async move {
        let driver = tokio::spawn(recording::run(session, in_rx, out_tx));
        while let Some(event) = out_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("error: cannot encode {}: {e}", event.kind()),
            }
        }
        driver.await
    })
    .map_err(|e| CoreError::Custom(format!("replay driver failed: {e}")))?;
    info!(state = ?session.state(), "replay finished");
    Ok(())
}

fn parse_line(line: &str, catalog: &Catalog, config: &Config) -> Result<Envelope, String> {
    let mut value: Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
    if let Some(input) = value.get_mut("input").and_then(Value::as_object_mut) {
        if input.get("command").and_then(Value::as_str) == Some("add") {
            if !input.contains_key("activity") {
                let id = input
                    .get("activity_id")
                    .and_then(Value::as_i64)
                    .ok_or("add needs `activity` or `activity_id`")?;
                let activity = catalog
                    .activity(id)
                    .ok_or_else(|| format!("unknown activity {id}"))?;
                let activity = serde_json::to_value(activity).map_err(|e| e.to_string())?;
                input.insert("activity".into(), activity);
            }
            input.remove("activity_id");
            input
                .entry("finish_on_covering_ms")
                .or_insert_with(|| config.session.finish_on_covering_ms.into());
        }
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

fn with_ticks(envelopes: Vec<Envelope>, interval_ms: u64) -> Vec<Envelope> {
    let Some(first) = envelopes.first().map(|e| e.at_ms) else {
        return envelopes;
    };
    if interval_ms == 0 {
        return envelopes;
    }
    let mut out = Vec::with_capacity(envelopes.len());
    let mut next_tick = first + interval_ms;
    for envelope in envelopes {
        while next_tick <= envelope.at_ms {
            out.push(Envelope::sensor(SensorEvent::Tick { at_ms: next_tick }));
            next_tick += interval_ms;
        }
        out.push(envelope);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use actrec_core::recording::{Command, Input};

    fn catalog() -> Catalog {
        Catalog::from_toml(
            r#"
            [[categories]]
            id = 1
            name = "Strength"

            [[activities]]
            id = 3
            name = "Squats"
            category_id = 1
            use_repeats = true
            "#,
        )
        .unwrap()
    }

    #[test]
    fn resolves_activity_id_from_catalog() {
        let mut config = Config::default();
        config.session.finish_on_covering_ms = 4_000;
        let envelope = parse_line(
            r#"{"at_ms":10,"input":{"command":"add","activity_id":3,"note":"legs"}}"#,
            &catalog(),
            &config,
        )
        .unwrap();
        match envelope.input {
            Input::Command(Command::Add {
                activity,
                note,
                finish_on_covering_ms,
            }) => {
                assert_eq!(activity.name, "Squats");
                assert!(activity.use_repeats);
                assert_eq!(note, "legs");
                assert_eq!(finish_on_covering_ms, 4_000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_activity_is_an_error() {
        let err = parse_line(
            r#"{"at_ms":10,"input":{"command":"add","activity_id":99}}"#,
            &catalog(),
            &Config::default(),
        )
        .unwrap_err();
        assert!(err.contains("unknown activity 99"));
    }

    #[test]
    fn ticks_fill_gaps() {
        let envelopes = vec![
            Envelope::command(0, Command::Prepare),
            Envelope::command(2_500, Command::Finish),
        ];
        let ticks: Vec<u64> = with_ticks(envelopes, 1_000)
            .iter()
            .filter(|e| matches!(e.input, Input::Sensor(SensorEvent::Tick { .. })))
            .map(|e| e.at_ms)
            .collect();
        assert_eq!(ticks, vec![1_000, 2_000]);
    }
}
