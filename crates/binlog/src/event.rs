use chrono::NaiveDateTime;

/// Display format for event timestamps, matching the cache file format.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One decoded log record.
///
/// Immutable once decoded. The ordering key is `time_offset_secs`; ties
/// are allowed and keep file order. `display_time` is derived from the
/// configured epoch and exists for human inspection only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Seconds since the configured record epoch.
    pub time_offset_secs: u64,
    /// Message text with all zero bytes removed.
    pub message: String,
    /// Epoch + time offset.
    pub display_time: NaiveDateTime,
}

impl LogEvent {
    /// The display time rendered in cache-file format.
    pub fn display_time_string(&self) -> String {
        self.display_time.format(DATE_FORMAT).to_string()
    }
}
