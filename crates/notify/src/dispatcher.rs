//! FIFO dispatch queue with per-target retry.
//!
//! The queue is fully materialized before processing begins: one task per
//! (channel × destination), each carrying everything it needs to execute
//! independently. A failed send re-enqueues its task at the tail; a
//! target whose failure count exceeds the cap aborts the whole dispatch.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use binlog::LogEvent;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::error::NotifyError;

/// Per-(destination, channel) failure budget before the run is abandoned.
pub const MAX_TARGET_FAILURES: u32 = 100;

/// Delay between consecutive send attempts while more than one task
/// remains, to respect downstream rate limits.
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(1);

/// One unit of outbound work: one rendered payload to one destination
/// over one channel.
struct DispatchTask {
    channel: usize,
    destination: String,
    payload: Arc<str>,
    failures: u32,
}

/// Drains a work queue of notification tasks over the configured
/// channels.
pub struct Dispatcher {
    channels: Vec<Box<dyn Channel>>,
    throttle: Duration,
    failure_cap: u32,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn Channel>>) -> Result<Self, NotifyError> {
        if channels.is_empty() {
            return Err(NotifyError::NoChannels);
        }
        Ok(Self {
            channels,
            throttle: DEFAULT_THROTTLE,
            failure_cap: MAX_TARGET_FAILURES,
        })
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_failure_cap(mut self, failure_cap: u32) -> Self {
        self.failure_cap = failure_cap;
        self
    }

    /// Deliver the batch to every (channel × destination) combination.
    ///
    /// In dry-run mode every task is described instead of sent and no
    /// gateway call is made. Returns `Ok` only if the queue drains
    /// completely without any target exceeding the failure cap.
    pub async fn dispatch(&self, batch: &[LogEvent], dry_run: bool) -> Result<(), NotifyError> {
        let mut queue: VecDeque<DispatchTask> = VecDeque::new();
        for (index, channel) in self.channels.iter().enumerate() {
            let payload: Arc<str> = Arc::from(channel.render(batch));
            info!(channel = channel.name(), payload = %payload, "rendered payload");
            for destination in channel.destinations() {
                queue.push_back(DispatchTask {
                    channel: index,
                    destination: destination.clone(),
                    payload: Arc::clone(&payload),
                    failures: 0,
                });
            }
        }
        debug!(tasks = queue.len(), dry_run, "work queue materialized");

        while let Some(mut task) = queue.pop_front() {
            let channel = &self.channels[task.channel];
            if dry_run {
                let line = channel.describe_dry_run(&task.destination, &task.payload);
                debug!("{line}");
                println!("{line}");
            } else {
                info!(
                    channel = channel.name(),
                    destination = %task.destination,
                    "sending notification"
                );
                match channel.send(&task.destination, &task.payload).await {
                    Ok(receipt) => {
                        info!(
                            channel = channel.name(),
                            destination = %task.destination,
                            receipt = %receipt,
                            "notification delivered"
                        );
                    }
                    Err(source) => {
                        task.failures += 1;
                        warn!(
                            channel = channel.name(),
                            destination = %task.destination,
                            failures = task.failures,
                            error = %source,
                            "unable to send message"
                        );
                        if task.failures > self.failure_cap {
                            return Err(NotifyError::Exhausted {
                                channel: channel.name(),
                                destination: task.destination,
                                attempts: task.failures,
                                source,
                            });
                        }
                        queue.push_back(task);
                    }
                }
            }

            if queue.len() > 1 {
                tokio::time::sleep(self.throttle).await;
            }
        }

        info!("messages sent");
        Ok(())
    }
}
