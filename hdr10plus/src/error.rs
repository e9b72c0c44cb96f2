use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed reading input: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    JsonSyntax(#[from] serde_json::Error),

    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("field `{field}` has the wrong type: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("field `{field}` is out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: i128,
        min: i128,
        max: i128,
    },

    #[error("invalid metadata structure: {0}")]
    Structural(String),

    #[error("no metadata for frame {index}, document has {len} frame(s)")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("encoded payload too large: {bits} bits, at most {max_bits} allowed")]
    EncodeOverflow { bits: usize, max_bits: usize },

    #[error("unsupported payload mode: {0}")]
    UnsupportedMode(u32),

    #[error("invalid HDR10+ payload: {0}")]
    InvalidPayload(String),
}

impl Error {
    pub(crate) fn out_of_range(
        field: impl Into<String>,
        value: impl Into<i128>,
        min: impl Into<i128>,
        max: impl Into<i128>,
    ) -> Self {
        Error::OutOfRange {
            field: field.into(),
            value: value.into(),
            min: min.into(),
            max: max.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
