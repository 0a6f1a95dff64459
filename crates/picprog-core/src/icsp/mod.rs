//! ICSP types and the transport abstraction
//!
//! This module provides the 4-bit command vocabulary, the
//! [`IcspTransport`] trait every programmer implements, the PIC18
//! instruction encodings, and the diagnostic command log.

mod command;
mod command_log;
pub mod opcodes;
mod traits;

pub use command::{CommandOnly, IcspCommand, LineLevels, COMMAND_BIT_COUNT};
pub use command_log::{CommandLog, LogRecord, LoggedTransport};
pub use traits::IcspTransport;
