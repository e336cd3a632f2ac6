//! Error types for srpack operations.
//!
//! A single error type covers the capture-format failures (metadata,
//! channel ranges, sample width, entry naming) as well as the container
//! and codec failures raised by the archive store.

use std::io;
use thiserror::Error;

/// The main error type for srpack operations.
#[derive(Debug, Error)]
pub enum SrpackError {
    /// I/O error from underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Compression backend error.
    #[error("Codec error: {0}")]
    Codec(#[from] oxiarc_core::OxiArcError),

    /// Malformed capture metadata or version information.
    #[error("Format error: {message}")]
    Format {
        /// Description of the problem.
        message: String,
    },

    /// A probe index lies outside the channels a sample word can hold.
    #[error("Probe index {index} out of range for unitsize {unitsize} (max {max})")]
    ProbeRange {
        /// The offending 1-based probe index.
        index: usize,
        /// Sample word width in bytes.
        unitsize: usize,
        /// Highest valid probe index.
        max: usize,
    },

    /// Sample words wider than 16 channels.
    #[error("Unsupported unitsize {unitsize}: only 16 channels or less supported")]
    UnsupportedWidth {
        /// Sample word width in bytes.
        unitsize: usize,
    },

    /// A capture entry does not follow the naming grammar of the declared version.
    #[error("Malformed capture entry name '{name}': {reason}")]
    MalformedEntryName {
        /// The entry name as stored in the archive.
        name: String,
        /// What was expected.
        reason: String,
    },

    /// Invalid container header.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// Entry not found in archive.
    #[error("Entry not found: {name}")]
    EntryNotFound {
        /// Name of the missing entry.
        name: String,
    },

    /// Unsupported compression method.
    #[error("Unsupported compression method: {method}")]
    UnsupportedMethod {
        /// The compression method identifier.
        method: String,
    },

    /// CRC checksum mismatch.
    #[error("CRC mismatch in '{name}': expected {expected:#x}, computed {computed:#x}")]
    CrcMismatch {
        /// Entry name.
        name: String,
        /// Expected CRC value from archive.
        expected: u32,
        /// Computed CRC value from data.
        computed: u32,
    },
}

/// Result type alias for srpack operations.
pub type Result<T> = std::result::Result<T, SrpackError>;

impl SrpackError {
    /// Create a format error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Create a probe range error.
    pub fn probe_range(index: usize, unitsize: usize) -> Self {
        Self::ProbeRange {
            index,
            unitsize,
            max: unitsize.saturating_mul(8),
        }
    }

    /// Create an unsupported width error.
    pub fn unsupported_width(unitsize: usize) -> Self {
        Self::UnsupportedWidth { unitsize }
    }

    /// Create a malformed entry name error.
    pub fn malformed_entry(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedEntryName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create an entry not found error.
    pub fn entry_not_found(name: impl Into<String>) -> Self {
        Self::EntryNotFound { name: name.into() }
    }

    /// Create an unsupported method error.
    pub fn unsupported_method(method: impl Into<String>) -> Self {
        Self::UnsupportedMethod {
            method: method.into(),
        }
    }

    /// Create a CRC mismatch error.
    pub fn crc_mismatch(name: impl Into<String>, expected: u32, computed: u32) -> Self {
        Self::CrcMismatch {
            name: name.into(),
            expected,
            computed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SrpackError::probe_range(17, 2);
        assert!(err.to_string().contains("Probe index 17"));
        assert!(err.to_string().contains("max 16"));

        let err = SrpackError::unsupported_width(4);
        assert!(err.to_string().contains("16 channels"));

        let err = SrpackError::malformed_entry("logic-1-x", "expected <capturefile>-<segment>");
        assert!(err.to_string().contains("logic-1-x"));

        let err = SrpackError::crc_mismatch("metadata", 0x12345678, 0xDEADBEEF);
        assert!(err.to_string().contains("CRC mismatch"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: SrpackError = io_err.into();
        assert!(matches!(err, SrpackError::Io(_)));
    }
}
