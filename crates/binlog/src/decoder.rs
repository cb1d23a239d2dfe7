//! Stride-walking record decoder.

use bytes::Bytes;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{NaiveDateTime, TimeDelta};
use tracing::trace;

use crate::error::DecodeError;
use crate::event::LogEvent;
use crate::layout::{Endianness, FieldSpec, RecordLayout};

/// One unpacked field value.
#[derive(Debug, Clone)]
enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Bytes(Bytes),
}

/// Decodes a flat byte buffer into a finite sequence of [`LogEvent`]s.
///
/// The decoder walks the buffer in `record_size` strides starting at
/// offset 0 and unpacks each stride per the layout's field pattern. A
/// trailing partial record is dropped without error. The iterator is
/// consumed by the walk and cannot be restarted.
pub struct RecordDecoder {
    buffer: Bytes,
    layout: RecordLayout,
    epoch: NaiveDateTime,
    offset: usize,
}

impl RecordDecoder {
    pub fn new(buffer: Bytes, layout: RecordLayout, epoch: NaiveDateTime) -> Self {
        Self {
            buffer,
            layout,
            epoch,
            offset: 0,
        }
    }

    fn decode_record(&self, offset: usize) -> Result<LogEvent, DecodeError> {
        let record = &self.buffer[offset..offset + self.layout.record_size()];
        let endianness = self.layout.endianness();

        let mut values = Vec::with_capacity(self.layout.fields().len());
        let mut pos = 0usize;
        for spec in self.layout.fields() {
            let width = spec.width();
            let raw = &record[pos..pos + width];
            match spec {
                FieldSpec::Skip(_) => {}
                FieldSpec::Bytes(_) => {
                    let start = offset + pos;
                    values.push(FieldValue::Bytes(self.buffer.slice(start..start + width)));
                }
                FieldSpec::U8 => values.push(FieldValue::Unsigned(raw[0] as u64)),
                FieldSpec::I8 => values.push(FieldValue::Signed(raw[0] as i8 as i64)),
                FieldSpec::U16 => values.push(FieldValue::Unsigned(read_u16(endianness, raw))),
                FieldSpec::U32 => values.push(FieldValue::Unsigned(read_u32(endianness, raw))),
                FieldSpec::U64 => values.push(FieldValue::Unsigned(read_u64(endianness, raw))),
                FieldSpec::I16 => values.push(FieldValue::Signed(read_i16(endianness, raw))),
                FieldSpec::I32 => values.push(FieldValue::Signed(read_i32(endianness, raw))),
                FieldSpec::I64 => values.push(FieldValue::Signed(read_i64(endianness, raw))),
            }
            pos += width;
        }

        let time_offset_secs = match &values[self.layout.time_index()] {
            FieldValue::Unsigned(v) => *v,
            FieldValue::Signed(v) if *v >= 0 => *v as u64,
            FieldValue::Signed(v) => {
                return Err(DecodeError::NegativeTime { offset, value: *v });
            }
            FieldValue::Bytes(_) => {
                return Err(DecodeError::TimeNotInteger {
                    index: self.layout.time_index(),
                });
            }
        };

        let raw_message = match &values[self.layout.message_index()] {
            FieldValue::Bytes(b) => b.as_ref(),
            _ => {
                return Err(DecodeError::MessageNotBytes {
                    index: self.layout.message_index(),
                });
            }
        };
        // Zero bytes are stripped wherever they occur in the field, not
        // treated as a terminator.
        let cleaned: Vec<u8> = raw_message.iter().copied().filter(|b| *b != 0).collect();
        if !cleaned.is_ascii() {
            return Err(DecodeError::NonAsciiMessage { offset });
        }
        let message =
            String::from_utf8(cleaned).map_err(|_| DecodeError::NonAsciiMessage { offset })?;

        let display_time = i64::try_from(time_offset_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|delta| self.epoch.checked_add_signed(delta))
            .ok_or(DecodeError::TimeOutOfRange { offset })?;

        Ok(LogEvent {
            time_offset_secs,
            message,
            display_time,
        })
    }
}

impl Iterator for RecordDecoder {
    type Item = Result<LogEvent, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let stride = self.layout.record_size();
        if self.offset + stride > self.buffer.len() {
            return None;
        }
        let offset = self.offset;
        self.offset += stride;

        let result = self.decode_record(offset);
        if let Ok(event) = &result {
            trace!(offset, time = event.time_offset_secs, "decoded record");
        }
        Some(result)
    }
}

fn read_u16(endianness: Endianness, raw: &[u8]) -> u64 {
    match endianness {
        Endianness::Little => LittleEndian::read_u16(raw) as u64,
        Endianness::Big => BigEndian::read_u16(raw) as u64,
    }
}

fn read_u32(endianness: Endianness, raw: &[u8]) -> u64 {
    match endianness {
        Endianness::Little => LittleEndian::read_u32(raw) as u64,
        Endianness::Big => BigEndian::read_u32(raw) as u64,
    }
}

fn read_u64(endianness: Endianness, raw: &[u8]) -> u64 {
    match endianness {
        Endianness::Little => LittleEndian::read_u64(raw),
        Endianness::Big => BigEndian::read_u64(raw),
    }
}

fn read_i16(endianness: Endianness, raw: &[u8]) -> i64 {
    match endianness {
        Endianness::Little => LittleEndian::read_i16(raw) as i64,
        Endianness::Big => BigEndian::read_i16(raw) as i64,
    }
}

fn read_i32(endianness: Endianness, raw: &[u8]) -> i64 {
    match endianness {
        Endianness::Little => LittleEndian::read_i32(raw) as i64,
        Endianness::Big => BigEndian::read_i32(raw) as i64,
    }
}

fn read_i64(endianness: Endianness, raw: &[u8]) -> i64 {
    match endianness {
        Endianness::Little => LittleEndian::read_i64(raw),
        Endianness::Big => BigEndian::read_i64(raw),
    }
}
