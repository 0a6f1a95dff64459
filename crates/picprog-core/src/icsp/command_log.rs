//! Diagnostic command log
//!
//! A bounded, append-only record of every `(command, data)` pair exchanged
//! with the target. It exists purely for human-readable tracing: a full log
//! silently stops recording and never fails the ICSP operation itself.

use alloc::vec::Vec;
use core::fmt;

use super::command::{CommandOnly, IcspCommand};
use super::traits::IcspTransport;
use crate::error::Result;

/// A single logged transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord {
    /// Command sent
    pub command: IcspCommand,
    /// Data sent, or the byte read back for read commands
    pub data: u16,
}

/// Bounded append-only command log
#[derive(Debug, Clone)]
pub struct CommandLog {
    records: Vec<LogRecord>,
    capacity: usize,
}

impl CommandLog {
    /// Create a log holding at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record; returns `false` (and records nothing) when full
    pub fn record(&mut self, command: IcspCommand, data: u16) -> bool {
        if self.is_full() {
            return false;
        }
        self.records.push(LogRecord { command, data });
        true
    }

    /// Maximum number of records
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record has been logged
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether further records will be dropped
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    /// Logged records, oldest first
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }
}

impl fmt::Display for CommandLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, record) in self.records.iter().enumerate() {
            writeln!(
                f,
                "[{:03}] cmd({}) data({:04X})",
                idx, record.command, record.data
            )?;
        }
        Ok(())
    }
}

/// Transport decorator that records every transfer into a [`CommandLog`]
pub struct LoggedTransport<T> {
    inner: T,
    log: CommandLog,
    overflow_reported: bool,
}

impl<T: IcspTransport> LoggedTransport<T> {
    /// Wrap `inner`, logging up to `capacity` transfers
    pub fn new(inner: T, capacity: usize) -> Self {
        Self {
            inner,
            log: CommandLog::new(capacity),
            overflow_reported: false,
        }
    }

    /// The log collected so far
    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    /// Get a reference to the wrapped transport
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Unwrap into the inner transport and the collected log
    pub fn into_parts(self) -> (T, CommandLog) {
        (self.inner, self.log)
    }

    fn note(&mut self, command: IcspCommand, data: u16) {
        if !self.log.record(command, data) && !self.overflow_reported {
            log::warn!(
                "Command log full ({} records), further transfers are not recorded",
                self.log.capacity()
            );
            self.overflow_reported = true;
        }
    }
}

impl<T: IcspTransport> IcspTransport for LoggedTransport<T> {
    fn transmit(&mut self, command: IcspCommand, data: u16) -> Result<()> {
        self.note(command, data);
        self.inner.transmit(command, data)
    }

    fn receive(&mut self, command: IcspCommand) -> Result<u8> {
        let result = self.inner.receive(command);
        // Failed reads are logged as zero, like the driver reports them
        let value = *result.as_ref().unwrap_or(&0);
        self.note(command, value as u16);
        result
    }

    fn command_only(&mut self, op: &CommandOnly) -> Result<()> {
        self.inner.command_only(op)
    }

    fn data_only(&mut self, data: u32) -> Result<()> {
        self.inner.data_only(data)
    }

    fn delay_us(&mut self, us: u32) -> Result<()> {
        self.inner.delay_us(us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use alloc::string::ToString;

    #[test]
    fn test_log_full_is_noop() {
        let mut log = CommandLog::new(2);
        assert!(log.record(IcspCommand::CoreInstruction, 0x0E3F));
        assert!(log.record(IcspCommand::CoreInstruction, 0x6EF8));
        assert!(!log.record(IcspCommand::CoreInstruction, 0x0000));
        assert_eq!(log.len(), 2);
        assert!(log.is_full());
    }

    #[test]
    fn test_log_format() {
        let mut log = CommandLog::new(4);
        log.record(IcspCommand::CoreInstruction, 0x0E3F);
        log.record(IcspCommand::TableReadPostInc, 0x00AB);
        assert_eq!(
            log.to_string(),
            "[000] cmd(0000) data(0E3F)\n[001] cmd(1001) data(00AB)\n"
        );
    }

    #[test]
    fn test_full_log_does_not_abort_transfers() {
        let mut transport = LoggedTransport::new(MockTransport::new(), 1);
        transport.transmit(IcspCommand::CoreInstruction, 0).unwrap();
        transport.transmit(IcspCommand::CoreInstruction, 0).unwrap();
        transport.transmit(IcspCommand::CoreInstruction, 0).unwrap();

        let (inner, log) = transport.into_parts();
        assert_eq!(log.len(), 1);
        assert_eq!(inner.transfers().len(), 3);
    }
}
