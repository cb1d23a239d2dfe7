//! # Monitor
//!
//! Incremental change detection over a decoded binary log.
//!
//! Ties together the decode → filter → detect-new → dispatch → commit
//! sequence: events admitted by the whitelist/blacklist [`FilterSet`]
//! are compared against the persisted [`Watermark`], and only strictly
//! newer ones are handed to the dispatcher. The watermark is committed
//! if and only if dispatch fully succeeds, so a crash or failed run
//! re-attempts the same events on the next invocation.

pub mod coordinator;
pub mod error;
pub mod filter;
pub mod lock;
pub mod watermark;

pub use coordinator::{RunCoordinator, RunReport};
pub use error::MonitorError;
pub use filter::{FilterError, FilterSet};
pub use lock::DispatchLock;
pub use watermark::{Watermark, select_new};
