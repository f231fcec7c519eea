//! Error types for the DMAP codec, validator and converter.

use crate::types::TypeTag;
use thiserror::Error;

/// Result type alias for DMAP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`], used by callers to pick a policy
/// (abort the file, skip the record, reject or coerce a record).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Structural problem found while decoding or encoding bytes
    Decode,
    /// Record decoded fine but does not satisfy a format profile
    Validation,
    /// Converter produced, or was asked for, something it cannot deliver
    Conversion,
    /// Filesystem error
    Io,
    /// Error from an export backend (Parquet, JSON)
    Output,
}

/// Errors that can occur when reading, writing, validating or converting DMAP records.
#[derive(Error, Debug)]
pub enum Error {
    /// Input buffer holds no bytes at all
    #[error("Empty file: no DMAP records to read")]
    EmptyFile,

    /// Stream preamble is missing, has the wrong magic, or an unsupported version
    #[error("Invalid DMAP format: {0}")]
    InvalidFormat(String),

    /// Record header or field runs past the available bytes
    #[error("Truncated record at offset {offset}: needs {needed} bytes, {available} available")]
    TruncatedRecord {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Type code outside the known table
    #[error("Unknown type code {code} for field '{field}' at offset {offset}")]
    UnknownTypeTag {
        offset: usize,
        code: u8,
        field: String,
    },

    /// Array rank or extents are impossible, or its data overruns the record
    #[error("Corrupt array shape for '{name}': {reason}")]
    CorruptArrayShape { name: String, reason: String },

    /// Bytes consumed by the fields differ from the declared record length
    #[error("Record length mismatch at offset {offset}: declared {declared} bytes, consumed {consumed}")]
    RecordLengthMismatch {
        offset: usize,
        declared: usize,
        consumed: usize,
    },

    /// Field name or string value is not valid UTF-8
    #[error("Invalid UTF-8 string at offset {offset}")]
    InvalidString { offset: usize },

    /// Two fields in one record share a name
    #[error("Duplicate field '{0}' in record")]
    DuplicateField(String),

    /// Record cannot be represented with 32-bit length fields
    #[error("Record too large to encode: {0} bytes")]
    RecordTooLarge(usize),

    /// Required field absent from the record
    #[error("Missing field '{0}'")]
    MissingField(String),

    /// Field present with a different type tag than the profile expects
    #[error("Type mismatch for '{name}': expected {expected}, found {actual}")]
    TypeMismatch {
        name: String,
        expected: TypeTag,
        actual: TypeTag,
    },

    /// Field present with the wrong rank or extents
    #[error("Shape mismatch for '{name}': expected {expected}, found {actual}")]
    ShapeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Field value has no entry in a lookup table the converter relies on
    #[error("No mapping for value '{value}' of field '{field}'")]
    UnmappedValue { field: String, value: String },

    /// A converted record failed validation against its target profile
    #[error("Conversion produced an invalid record for beam index {beam}: {source}")]
    ConversionInvariantViolation {
        beam: usize,
        #[source]
        source: Box<Error>,
    },

    /// No converter exists between the two profiles
    #[error("Unsupported conversion from {from} to {to}")]
    UnsupportedConversion { from: String, to: String },

    /// I/O error occurred while reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Output format error (e.g., Parquet write error)
    #[error("Output error: {0}")]
    OutputError(String),
}

impl Error {
    /// Category of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::EmptyFile
            | Error::InvalidFormat(_)
            | Error::TruncatedRecord { .. }
            | Error::UnknownTypeTag { .. }
            | Error::CorruptArrayShape { .. }
            | Error::RecordLengthMismatch { .. }
            | Error::InvalidString { .. }
            | Error::DuplicateField(_)
            | Error::RecordTooLarge(_) => ErrorClass::Decode,
            Error::MissingField(_)
            | Error::TypeMismatch { .. }
            | Error::ShapeMismatch { .. }
            | Error::UnmappedValue { .. } => ErrorClass::Validation,
            Error::ConversionInvariantViolation { .. } | Error::UnsupportedConversion { .. } => {
                ErrorClass::Conversion
            }
            Error::Io(_) => ErrorClass::Io,
            Error::OutputError(_) => ErrorClass::Output,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::OutputError(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::OutputError(err.to_string())
    }
}
