use thiserror::Error;

/// Errors raised while validating a record layout or decoding a buffer.
///
/// Any decode failure is fatal for the whole run: the batch is abandoned
/// and the caller must not advance its watermark.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("field pattern is empty")]
    EmptyPattern,

    #[error("unknown field spec `{token}`")]
    UnknownFieldSpec { token: String },

    #[error("field spec `{token}` has zero width")]
    ZeroWidthField { token: String },

    #[error("record size {record_size} does not match pattern width {pattern_width}")]
    SizeMismatch {
        record_size: usize,
        pattern_width: usize,
    },

    #[error("{field} field index {index} is out of range ({values} values per record)")]
    IndexOutOfRange {
        field: &'static str,
        index: usize,
        values: usize,
    },

    #[error("message field at index {index} is not a byte field")]
    MessageNotBytes { index: usize },

    #[error("time field at index {index} is not an integer field")]
    TimeNotInteger { index: usize },

    #[error("record at offset {offset}: time field is negative ({value})")]
    NegativeTime { offset: usize, value: i64 },

    #[error("record at offset {offset}: time offset does not map to a representable date")]
    TimeOutOfRange { offset: usize },

    #[error("record at offset {offset}: message bytes are not 7-bit text")]
    NonAsciiMessage { offset: usize },
}
