//! # Binlog
//!
//! Fixed-stride binary log decoding.
//!
//! A binary log is a flat byte buffer holding one record every
//! `record_size` bytes. A declarative [`RecordLayout`] describes how each
//! stride unpacks into typed fields and which of those fields carry the
//! message text and the time offset. [`RecordDecoder`] walks the buffer
//! and yields one [`LogEvent`] per complete record.

pub mod decoder;
pub mod error;
pub mod event;
pub mod layout;

pub use decoder::RecordDecoder;
pub use error::DecodeError;
pub use event::LogEvent;
pub use layout::{Endianness, FieldSpec, RecordLayout};
