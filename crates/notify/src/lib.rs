//! # Notify
//!
//! Outbound notification dispatch for new log events.
//!
//! Channels are tagged variants behind one capability set (render a
//! payload, execute a send, describe a dry-run), selected by
//! configuration section rather than by subclassing. The dispatcher
//! expands (channel × destination) into an explicit FIFO work queue and
//! processes it with per-target retry, a failure cap, and throttling.

pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod gateway;

pub use channel::{CallChannel, CallConfig, Channel, SmsChannel, SmsConfig, build_channels};
pub use dispatcher::{Dispatcher, MAX_TARGET_FAILURES};
pub use error::{NotifyError, TransportError};
pub use gateway::{GatewayConfig, HttpGateway, MessageGateway};
