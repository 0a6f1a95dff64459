//! Error types for picprog-core
//!
//! This module provides a no_std compatible error type that is used
//! throughout the crate. Every algorithm step propagates the first failure
//! verbatim; nothing is retried except the EEPROM write-completion poll.

use core::fmt;

/// Details about a malformed firmware file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexFault {
    /// A record could not be parsed (bad hex digits, checksum, length)
    InvalidRecord {
        /// 1-based line number of the offending record
        line: usize,
    },
    /// A record type the image loader cannot apply
    UnsupportedRecord {
        /// 1-based line number of the offending record
        line: usize,
    },
    /// The image could not be serialised back to Intel HEX
    Unwritable,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Transport errors
    /// A transmit/receive call on the ICSP transport failed
    TransportFailure,
    /// EEPROM write-completion poll exhausted its attempt budget
    Timeout,

    // Device errors
    /// Device ID does not match any known family or part
    UnsupportedDevice(u16),
    /// The context has no identified device bound to it
    NoDevice,

    // Address/size errors
    /// Region write would exceed the allocated or fixed bounds
    InsufficientCapacity {
        /// Offset of the rejected write
        offset: u32,
        /// Length of the rejected write
        len: u32,
        /// Capacity of the region
        capacity: u32,
    },
    /// Address does not fit in the 24-bit table pointer
    InvalidAddress(u32),
    /// Code reads must start and end on a 16-bit word boundary
    InvalidAlignment,

    // Image errors
    /// Malformed Intel HEX input
    FileFormat(HexFault),
    /// Read-back contents differ from the source image
    VerifyFailed {
        /// Number of bytes compared
        bytes_compared: usize,
    },
}

impl fmt::Display for HexFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRecord { line } => write!(f, "invalid record on line {}", line),
            Self::UnsupportedRecord { line } => {
                write!(f, "unsupported record on line {}", line)
            }
            Self::Unwritable => write!(f, "image cannot be encoded as Intel HEX"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportFailure => write!(f, "ICSP transport failure"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::UnsupportedDevice(id) => write!(f, "unsupported device (ID 0x{:04X})", id),
            Self::NoDevice => write!(f, "no device identified"),
            Self::InsufficientCapacity {
                offset,
                len,
                capacity,
            } => write!(
                f,
                "write of {} bytes at offset 0x{:06X} exceeds capacity of {} bytes",
                len, offset, capacity
            ),
            Self::InvalidAddress(addr) => {
                write!(f, "address 0x{:08X} does not fit the table pointer", addr)
            }
            Self::InvalidAlignment => write!(f, "code offset and size must be word aligned"),
            Self::FileFormat(fault) => write!(f, "file format error: {}", fault),
            Self::VerifyFailed { bytes_compared } => write!(
                f,
                "verify failed: data mismatch ({} bytes compared)",
                bytes_compared
            ),
        }
    }
}

#[cfg(any(feature = "std", test))]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
