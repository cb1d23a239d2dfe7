//! Run coordination.
//!
//! One run walks Idle → Decoding → Filtering → DetectingNew and stops
//! there when nothing is new; otherwise it acquires the advisory lock,
//! dispatches, and commits the watermark only when dispatch succeeded.
//! A crash or dispatch failure leaves the watermark untouched, so the
//! next run re-attempts the same events (at-least-once delivery).

use std::path::PathBuf;

use binlog::{RecordDecoder, RecordLayout};
use bytes::Bytes;
use chrono::NaiveDateTime;
use notify::Dispatcher;
use tracing::{debug, info, warn};

use crate::error::MonitorError;
use crate::filter::FilterSet;
use crate::lock::DispatchLock;
use crate::watermark::{Watermark, select_new};

/// Outcome of one monitoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Records decoded from the file.
    pub decoded: usize,
    /// Events that survived filtering.
    pub admitted: usize,
    /// Events newer than the watermark.
    pub fresh: usize,
    /// Whether a new watermark was persisted.
    pub watermark_committed: bool,
}

/// Sequences decode → filter → detect-new → dispatch → commit.
pub struct RunCoordinator {
    layout: RecordLayout,
    epoch: NaiveDateTime,
    filters: FilterSet,
    cache_path: PathBuf,
    lock_path: Option<PathBuf>,
}

impl RunCoordinator {
    pub fn new(
        layout: RecordLayout,
        epoch: NaiveDateTime,
        filters: FilterSet,
        cache_path: impl Into<PathBuf>,
        lock_path: Option<PathBuf>,
    ) -> Self {
        Self {
            layout,
            epoch,
            filters,
            cache_path: cache_path.into(),
            lock_path,
        }
    }

    /// Process one complete file image and dispatch whatever is new.
    pub async fn run(
        &self,
        buffer: Bytes,
        dispatcher: &Dispatcher,
        dry_run: bool,
    ) -> Result<RunReport, MonitorError> {
        let decoder = RecordDecoder::new(buffer, self.layout.clone(), self.epoch);
        let mut decoded = 0usize;
        let mut admitted = Vec::new();
        for item in decoder {
            let event = item?;
            decoded += 1;
            if self.filters.admit(&event) {
                admitted.push(event);
            }
        }
        let admitted_count = admitted.len();
        debug!(decoded, admitted = admitted_count, "file processed");

        let watermark = Watermark::load(&self.cache_path)?;
        let mut fresh = select_new(admitted, watermark.as_ref());
        if fresh.is_empty() {
            info!("no new events since last run");
            return Ok(RunReport {
                decoded,
                admitted: admitted_count,
                fresh: 0,
                watermark_committed: false,
            });
        }

        // Newest first for rendering; the sort is stable, so equal
        // timestamps keep file order.
        fresh.sort_by(|a, b| b.time_offset_secs.cmp(&a.time_offset_secs));
        for event in &fresh {
            debug!(
                time = event.time_offset_secs,
                datetime = %event.display_time_string(),
                "new event"
            );
            warn!("{}", event.message);
        }
        let candidate = fresh
            .iter()
            .max_by_key(|event| event.time_offset_secs)
            .map(Watermark::from_event);

        // The lock guards the critical section only; it is released as
        // soon as dispatch returns.
        {
            let _lock = match &self.lock_path {
                Some(path) => Some(DispatchLock::acquire(path)?),
                None => None,
            };
            dispatcher.dispatch(&fresh, dry_run).await?;
        }

        let mut watermark_committed = false;
        if let Some(mark) = candidate {
            mark.store(&self.cache_path)?;
            info!(time = mark.time, "watermark committed");
            watermark_committed = true;
        }

        Ok(RunReport {
            decoded,
            admitted: admitted_count,
            fresh: fresh.len(),
            watermark_committed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use binlog::{Endianness, FieldSpec, LogEvent};
    use chrono::NaiveDate;
    use notify::{Channel, TransportError};
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Records rendered batches and sends; optionally fails every send.
    #[derive(Debug)]
    struct RecordingChannel {
        to: Vec<String>,
        fail: bool,
        rendered: Arc<Mutex<Vec<Vec<String>>>>,
        sends: Arc<AtomicU32>,
    }

    /// Shared view of a [`RecordingChannel`]'s activity, kept by the test
    /// after the channel is boxed into the dispatcher.
    #[derive(Clone)]
    struct ChannelProbe {
        rendered: Arc<Mutex<Vec<Vec<String>>>>,
        sends: Arc<AtomicU32>,
    }

    impl ChannelProbe {
        fn first_batch(&self) -> Vec<String> {
            self.rendered.lock().unwrap().first().cloned().unwrap_or_default()
        }

        fn send_count(&self) -> u32 {
            self.sends.load(Ordering::Relaxed)
        }
    }

    impl RecordingChannel {
        fn new(to: Vec<&str>, fail: bool) -> (Self, ChannelProbe) {
            let rendered = Arc::new(Mutex::new(Vec::new()));
            let sends = Arc::new(AtomicU32::new(0));
            let probe = ChannelProbe {
                rendered: Arc::clone(&rendered),
                sends: Arc::clone(&sends),
            };
            (
                Self {
                    to: to.into_iter().map(str::to_owned).collect(),
                    fail,
                    rendered,
                    sends,
                },
                probe,
            )
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &'static str {
            "sms"
        }

        fn destinations(&self) -> &[String] {
            &self.to
        }

        fn render(&self, batch: &[LogEvent]) -> String {
            let messages: Vec<String> = batch.iter().map(|e| e.message.clone()).collect();
            let payload = messages.join(",");
            self.rendered.lock().unwrap().push(messages);
            payload
        }

        async fn send(&self, _: &str, payload: &str) -> Result<String, TransportError> {
            self.sends.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                Err(TransportError::MissingReceipt)
            } else {
                Ok(payload.to_owned())
            }
        }

        fn describe_dry_run(&self, destination: &str, payload: &str) -> String {
            format!("to: {destination}, ({payload})")
        }
    }

    fn epoch() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn layout() -> RecordLayout {
        RecordLayout::new(
            16,
            Endianness::Little,
            vec![FieldSpec::U32, FieldSpec::Bytes(12)],
            1,
            0,
        )
        .unwrap()
    }

    fn record(time: u32, message: &[u8]) -> Vec<u8> {
        let mut out = time.to_le_bytes().to_vec();
        let mut field = message.to_vec();
        field.resize(12, 0);
        out.extend_from_slice(&field);
        out
    }

    fn two_record_log() -> Bytes {
        let mut buffer = record(10, b"A");
        buffer.extend(record(20, b"B"));
        Bytes::from(buffer)
    }

    fn coordinator(cache: &Path, filters: FilterSet) -> RunCoordinator {
        RunCoordinator::new(layout(), epoch(), filters, cache, None)
    }

    fn dispatcher_over(channel: RecordingChannel) -> Dispatcher {
        Dispatcher::new(vec![Box::new(channel)])
            .unwrap()
            .with_throttle(Duration::ZERO)
    }

    #[tokio::test]
    async fn first_run_reports_everything_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        let (channel, probe) = RecordingChannel::new(vec!["a"], false);
        let dispatcher = dispatcher_over(channel);

        let report = coordinator(&cache, FilterSet::default())
            .run(two_record_log(), &dispatcher, false)
            .await
            .unwrap();

        assert_eq!(report.decoded, 2);
        assert_eq!(report.fresh, 2);
        assert!(report.watermark_committed);
        // rendering sees the batch sorted with the newest event first
        assert_eq!(probe.first_batch(), ["B", "A"]);

        let mark = Watermark::load(&cache).unwrap().unwrap();
        assert_eq!(mark.time, 20);
        assert_eq!(mark.message, "B");
    }

    #[tokio::test]
    async fn prior_watermark_limits_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        Watermark {
            time: 10,
            message: "A".into(),
            datetime: "2024-01-01 00:00:10".into(),
        }
        .store(&cache)
        .unwrap();

        let (channel, probe) = RecordingChannel::new(vec!["a"], false);
        let dispatcher = dispatcher_over(channel);
        let report = coordinator(&cache, FilterSet::default())
            .run(two_record_log(), &dispatcher, false)
            .await
            .unwrap();

        assert_eq!(report.fresh, 1);
        assert_eq!(probe.first_batch(), ["B"]);
        assert_eq!(Watermark::load(&cache).unwrap().unwrap().time, 20);
    }

    #[tokio::test]
    async fn up_to_date_watermark_skips_dispatch_and_commit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        let prior = Watermark {
            time: 20,
            message: "B".into(),
            datetime: "2024-01-01 00:00:20".into(),
        };
        prior.store(&cache).unwrap();
        let before = fs::read(&cache).unwrap();

        let (channel, probe) = RecordingChannel::new(vec!["a"], false);
        let dispatcher = dispatcher_over(channel);
        let report = coordinator(&cache, FilterSet::default())
            .run(two_record_log(), &dispatcher, false)
            .await
            .unwrap();

        assert_eq!(report.fresh, 0);
        assert!(!report.watermark_committed);
        assert_eq!(probe.send_count(), 0);
        assert_eq!(fs::read(&cache).unwrap(), before);
    }

    #[tokio::test]
    async fn failed_dispatch_leaves_the_watermark_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        let prior = Watermark {
            time: 10,
            message: "A".into(),
            datetime: "2024-01-01 00:00:10".into(),
        };
        prior.store(&cache).unwrap();
        let before = fs::read(&cache).unwrap();

        let (channel, _probe) = RecordingChannel::new(vec!["a"], true);
        let dispatcher = Dispatcher::new(vec![Box::new(channel)])
            .unwrap()
            .with_throttle(Duration::ZERO)
            .with_failure_cap(3);
        let err = coordinator(&cache, FilterSet::default())
            .run(two_record_log(), &dispatcher, false)
            .await
            .unwrap_err();

        assert!(matches!(err, MonitorError::Dispatch(_)));
        assert_eq!(fs::read(&cache).unwrap(), before);
    }

    #[tokio::test]
    async fn filtered_events_never_reach_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        let mut buffer = record(10, b"DEBUG: noop");
        buffer.extend(record(20, b"INFO: ok"));

        let filters = FilterSet::compile(&[], &["DEBUG".to_owned()]).unwrap();
        let (channel, probe) = RecordingChannel::new(vec!["a"], false);
        let dispatcher = dispatcher_over(channel);
        let report = coordinator(&cache, filters)
            .run(Bytes::from(buffer), &dispatcher, false)
            .await
            .unwrap();

        assert_eq!(report.decoded, 2);
        assert_eq!(report.admitted, 1);
        assert_eq!(probe.first_batch(), ["INFO: ok"]);
        assert_eq!(Watermark::load(&cache).unwrap().unwrap().message, "INFO: ok");
    }

    #[tokio::test]
    async fn dry_run_commits_without_sending() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        let (channel, probe) = RecordingChannel::new(vec!["a", "b"], true);
        let dispatcher = dispatcher_over(channel);

        // every send would fail, but dry-run never reaches the channel
        let report = coordinator(&cache, FilterSet::default())
            .run(two_record_log(), &dispatcher, true)
            .await
            .unwrap();

        assert!(report.watermark_committed);
        assert_eq!(probe.send_count(), 0);
        assert_eq!(Watermark::load(&cache).unwrap().unwrap().time, 20);
    }

    #[tokio::test]
    async fn decode_error_abandons_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        let (channel, probe) = RecordingChannel::new(vec!["a"], false);
        let dispatcher = dispatcher_over(channel);

        let err = coordinator(&cache, FilterSet::default())
            .run(Bytes::from(record(1, &[0x41, 0xC3])), &dispatcher, false)
            .await
            .unwrap_err();

        assert!(matches!(err, MonitorError::Decode(_)));
        assert_eq!(probe.send_count(), 0);
        assert!(!cache.exists());
    }

    #[tokio::test]
    async fn lock_file_is_created_around_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        let lock = dir.path().join("binmon.lock");
        let (channel, _probe) = RecordingChannel::new(vec!["a"], false);
        let dispatcher = dispatcher_over(channel);

        let coordinator = RunCoordinator::new(
            layout(),
            epoch(),
            FilterSet::default(),
            &cache,
            Some(lock.clone()),
        );
        coordinator
            .run(two_record_log(), &dispatcher, false)
            .await
            .unwrap();

        assert!(lock.exists());
    }
}
