//! Error types for ipwkit

use std::fmt;
use std::io;

/// Result type for ipwkit operations
pub type Result<T> = std::result::Result<T, Error>;

/// The four failure classes a caller can act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Header structurally invalid or inconsistent
    Format,
    /// Payload too short or bit width unsupported
    Decode,
    /// Out-of-range band index or undefined rescale
    Value,
    /// Output creation or write failure
    Io,
}

impl ErrorKind {
    /// Returns the name of this error class
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Format => "FormatError",
            ErrorKind::Decode => "DecodeError",
            ErrorKind::Value => "ValueError",
            ErrorKind::Io => "IOError",
        }
    }
}

/// Error types that can occur in ipwkit operations
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(io::Error),

    /// Invalid header structure
    InvalidFormat(String),

    /// Mandatory global key absent from the header
    MissingKey(&'static str),

    /// A per-band key was never declared before the payload sentinel
    MissingBandKey { band: usize, key: &'static str },

    /// Numeric header field that does not parse
    InvalidNumber { key: String, value: String },

    /// Band block index out of sequence
    BandOrder { expected: usize, found: i64 },

    /// Declared band count differs from the blocks found
    BandCountMismatch { declared: usize, found: usize },

    /// Payload shorter than the declared bands require
    TruncatedPayload { required: usize, available: usize },

    /// Bit width the decoder cannot materialize
    UnsupportedBits { band: usize, bits: u32 },

    /// Payload decoding failure
    Decode(String),

    /// Band index outside the container
    BandOutOfRange { index: usize, band_count: usize },

    /// Invalid argument value
    InvalidValue(String),

    /// Serialization error (config or archive records)
    Serialization(String),
}

impl Error {
    /// Classifies this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidFormat(_)
            | Error::MissingKey(_)
            | Error::MissingBandKey { .. }
            | Error::InvalidNumber { .. }
            | Error::BandOrder { .. }
            | Error::BandCountMismatch { .. } => ErrorKind::Format,
            Error::TruncatedPayload { .. } | Error::UnsupportedBits { .. } | Error::Decode(_) => {
                ErrorKind::Decode
            }
            Error::BandOutOfRange { .. } | Error::InvalidValue(_) | Error::Serialization(_) => {
                ErrorKind::Value
            }
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
            Error::MissingKey(key) => write!(f, "Missing required header key: {}", key),
            Error::MissingBandKey { band, key } => {
                write!(f, "Band {} does not declare required key: {}", band, key)
            }
            Error::InvalidNumber { key, value } => {
                write!(f, "Invalid numeric value for {}: {:?}", key, value)
            }
            Error::BandOrder { expected, found } => write!(
                f,
                "Band blocks out of order: expected band {}, found band {}",
                expected, found
            ),
            Error::BandCountMismatch { declared, found } => write!(
                f,
                "Header declares {} bands but {} band blocks were found",
                declared, found
            ),
            Error::TruncatedPayload { required, available } => write!(
                f,
                "Payload too short: {} bytes required, {} available",
                required, available
            ),
            Error::UnsupportedBits { band, bits } => {
                write!(f, "Unsupported bit width {} for band {}", bits, band)
            }
            Error::Decode(msg) => write!(f, "Decode error: {}", msg),
            Error::BandOutOfRange { index, band_count } => write!(
                f,
                "Band index {} out of range for {} bands",
                index, band_count
            ),
            Error::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization(error.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Error::Serialization(error.to_string())
    }
}
