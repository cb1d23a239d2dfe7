//! Persisted watermark and change detection.

use std::fs;
use std::io::Write;
use std::path::Path;

use binlog::LogEvent;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::MonitorError;

/// The single most-recent admitted event of the last successful run.
///
/// Serialized as the JSON cache file; an absent file means "no prior
/// run" and places no lower bound on event selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    /// Time offset of the boundary event, in seconds since the epoch
    /// configured for the log.
    pub time: u64,
    /// Message text of the boundary event.
    pub message: String,
    /// Human-readable display time of the boundary event.
    pub datetime: String,
}

impl Watermark {
    pub fn from_event(event: &LogEvent) -> Self {
        Self {
            time: event.time_offset_secs,
            message: event.message.clone(),
            datetime: event.display_time_string(),
        }
    }

    /// Read the watermark back, or `None` when no prior run exists.
    pub fn load(path: &Path) -> Result<Option<Self>, MonitorError> {
        if !path.exists() {
            debug!(path = %path.display(), "no cache file, treating all events as new");
            return Ok(None);
        }
        let raw = fs::read_to_string(path).map_err(|source| MonitorError::CacheRead {
            path: path.to_owned(),
            source,
        })?;
        let watermark = serde_json::from_str(&raw).map_err(|source| MonitorError::CacheParse {
            path: path.to_owned(),
            source,
        })?;
        Ok(Some(watermark))
    }

    /// Replace the cache file atomically: the new content is written to a
    /// temporary file and renamed over the old one, so a crash never
    /// leaves a partially written watermark behind.
    pub fn store(&self, path: &Path) -> Result<(), MonitorError> {
        let persist = |source| MonitorError::CachePersist {
            path: path.to_owned(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir).map_err(persist)?;
        serde_json::to_writer(&mut file, self)
            .map_err(|source| MonitorError::CachePersist {
                path: path.to_owned(),
                source: source.into(),
            })?;
        file.flush().map_err(persist)?;
        file.persist(path).map_err(|e| persist(e.error))?;
        Ok(())
    }
}

/// Select the events strictly newer than the watermark, preserving file
/// order. An event whose time equals the watermark is already reported.
pub fn select_new(events: Vec<LogEvent>, watermark: Option<&Watermark>) -> Vec<LogEvent> {
    match watermark {
        None => events,
        Some(mark) => events
            .into_iter()
            .filter(|event| event.time_offset_secs > mark.time)
            .collect(),
    }
}
