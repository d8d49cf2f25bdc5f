use crate::event::LogEntry;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to read events: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Event is not a JSON object")]
    NotAnObject,
}

/// Events read from one source, plus how many lines had to be skipped
#[derive(Debug, Default)]
pub struct EventBatch {
    pub events: Vec<LogEntry>,
    pub skipped: usize,
}

/// Parse one newline-delimited JSON record
pub fn parse_event_line(line: &str) -> Result<LogEntry, IngestError> {
    let value: Value = serde_json::from_str(line)?;
    LogEntry::from_json(value).ok_or(IngestError::NotAnObject)
}

/// Read newline-delimited JSON events from a file
pub fn read_events(path: impl AsRef<Path>) -> Result<EventBatch, IngestError> {
    let file = File::open(path)?;
    read_events_from(file)
}

/// Read newline-delimited JSON events from any reader.
///
/// Blank lines are ignored. Lines that are not JSON objects are skipped and
/// counted rather than aborting the whole read.
pub fn read_events_from(reader: impl Read) -> Result<EventBatch, IngestError> {
    let reader = BufReader::new(reader);
    let mut batch = EventBatch::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match parse_event_line(&line) {
            Ok(entry) => batch.events.push(entry),
            Err(IngestError::Io(e)) => return Err(IngestError::Io(e)),
            Err(e) => {
                log::warn!("skipping line {}: {}", idx + 1, e);
                batch.skipped += 1;
            }
        }
    }

    Ok(batch)
}
