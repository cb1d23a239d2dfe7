//! Declarative record layout.
//!
//! A layout names the byte stride of one record and the ordered list of
//! typed fields inside that stride. Integer and byte-array fields produce
//! values; `skip:N` fields cover padding and produce none. The message and
//! time indices address the value-producing fields only.

use serde::Deserialize;

use crate::error::DecodeError;

/// Byte order for the integer fields of a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// One typed field inside a record stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSpec {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    /// Fixed-width byte array, e.g. a zero-padded message field.
    Bytes(usize),
    /// Padding; consumes bytes but produces no value.
    Skip(usize),
}

impl FieldSpec {
    /// Parse one pattern token, e.g. `"u32"`, `"bytes:100"`, `"skip:4"`.
    pub fn parse(token: &str) -> Result<Self, DecodeError> {
        let spec = match token {
            "u8" => Self::U8,
            "u16" => Self::U16,
            "u32" => Self::U32,
            "u64" => Self::U64,
            "i8" => Self::I8,
            "i16" => Self::I16,
            "i32" => Self::I32,
            "i64" => Self::I64,
            _ => {
                let (kind, width) = token.split_once(':').ok_or_else(|| {
                    DecodeError::UnknownFieldSpec {
                        token: token.to_owned(),
                    }
                })?;
                let width: usize =
                    width
                        .parse()
                        .map_err(|_| DecodeError::UnknownFieldSpec {
                            token: token.to_owned(),
                        })?;
                match kind {
                    "bytes" => Self::Bytes(width),
                    "skip" => Self::Skip(width),
                    _ => {
                        return Err(DecodeError::UnknownFieldSpec {
                            token: token.to_owned(),
                        });
                    }
                }
            }
        };
        if spec.width() == 0 {
            return Err(DecodeError::ZeroWidthField {
                token: token.to_owned(),
            });
        }
        Ok(spec)
    }

    /// Width of the field in bytes.
    pub fn width(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 => 4,
            Self::U64 | Self::I64 => 8,
            Self::Bytes(n) | Self::Skip(n) => *n,
        }
    }

    /// Whether the field contributes a value to the unpacked record.
    pub fn produces_value(&self) -> bool {
        !matches!(self, Self::Skip(_))
    }
}

/// Validated description of one fixed-stride record.
#[derive(Debug, Clone)]
pub struct RecordLayout {
    record_size: usize,
    endianness: Endianness,
    fields: Vec<FieldSpec>,
    message_index: usize,
    time_index: usize,
}

impl RecordLayout {
    /// Build a layout, checking the stride against the pattern width and
    /// the message/time indices against the value-producing fields.
    pub fn new(
        record_size: usize,
        endianness: Endianness,
        fields: Vec<FieldSpec>,
        message_index: usize,
        time_index: usize,
    ) -> Result<Self, DecodeError> {
        if fields.is_empty() {
            return Err(DecodeError::EmptyPattern);
        }
        let pattern_width: usize = fields.iter().map(FieldSpec::width).sum();
        if pattern_width != record_size {
            return Err(DecodeError::SizeMismatch {
                record_size,
                pattern_width,
            });
        }

        let values: Vec<&FieldSpec> = fields.iter().filter(|f| f.produces_value()).collect();
        for (name, index) in [("message", message_index), ("time", time_index)] {
            if index >= values.len() {
                return Err(DecodeError::IndexOutOfRange {
                    field: name,
                    index,
                    values: values.len(),
                });
            }
        }
        if !matches!(values[message_index], FieldSpec::Bytes(_)) {
            return Err(DecodeError::MessageNotBytes {
                index: message_index,
            });
        }
        if matches!(values[time_index], FieldSpec::Bytes(_)) {
            return Err(DecodeError::TimeNotInteger { index: time_index });
        }

        Ok(Self {
            record_size,
            endianness,
            fields,
            message_index,
            time_index,
        })
    }

    /// Parse a list of pattern tokens into field specs.
    pub fn parse_pattern(tokens: &[String]) -> Result<Vec<FieldSpec>, DecodeError> {
        tokens.iter().map(|t| FieldSpec::parse(t)).collect()
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn message_index(&self) -> usize {
        self.message_index
    }

    pub fn time_index(&self) -> usize {
        self.time_index
    }
}
