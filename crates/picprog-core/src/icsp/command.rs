//! ICSP 4-bit commands and command-only transfer descriptors

use core::fmt;

use bitflags::bitflags;

/// Number of bits in an ICSP command
pub const COMMAND_BIT_COUNT: u32 = 4;

/// 4-bit ICSP operation selector
///
/// Every ICSP transfer starts with one of these, followed by a 16-bit data
/// payload (writes) or 8 clocks of dummy data and 8 bits read back (reads).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IcspCommand {
    /// Execute the payload as a core instruction
    CoreInstruction = 0b0000,
    /// Shift out the TABLAT register
    ShiftOutTablat = 0b0010,
    /// Table read
    TableRead = 0b1000,
    /// Table read, post-increment
    TableReadPostInc = 0b1001,
    /// Table read, post-decrement
    TableReadPostDec = 0b1010,
    /// Table read, pre-increment
    TableReadPreInc = 0b1011,
    /// Table write, post-increment
    TableWritePostInc = 0b1100,
    /// Table write, post-increment by 2
    TableWritePostInc2 = 0b1101,
    /// Table write, post-increment by 2, start programming
    TableWriteProgPostInc2 = 0b1110,
    /// Table write, start programming
    TableWriteProg = 0b1111,
}

impl IcspCommand {
    /// Raw 4-bit value of the command
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Decode a raw 4-bit command value
    pub const fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits {
            0b0000 => Self::CoreInstruction,
            0b0010 => Self::ShiftOutTablat,
            0b1000 => Self::TableRead,
            0b1001 => Self::TableReadPostInc,
            0b1010 => Self::TableReadPostDec,
            0b1011 => Self::TableReadPreInc,
            0b1100 => Self::TableWritePostInc,
            0b1101 => Self::TableWritePostInc2,
            0b1110 => Self::TableWriteProgPostInc2,
            0b1111 => Self::TableWriteProg,
            _ => return None,
        })
    }

    /// Whether this command reads 8 bits back from the target
    pub const fn is_read(self) -> bool {
        matches!(
            self,
            Self::ShiftOutTablat
                | Self::TableRead
                | Self::TableReadPostInc
                | Self::TableReadPostDec
                | Self::TableReadPreInc
        )
    }
}

/// Formats the command as its 4-bit binary pattern, MSB first
impl fmt::Display for IcspCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04b}", self.bits())
    }
}

bitflags! {
    /// PGC/PGD line levels to leave asserted after a command-only transfer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LineLevels: u8 {
        /// Programming clock held high
        const PGC = 1 << 0;
        /// Programming data held high
        const PGD = 1 << 1;
    }
}

/// A command-only transfer with explicit line-hold timing
///
/// Used where the target needs the clock held in a given state while an
/// internal erase or write cycle runs (P9, P11 in the programming specs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOnly {
    /// Command clocked out before the hold
    pub command: IcspCommand,
    /// Line levels held after the 4th command bit
    pub lines_after: LineLevels,
    /// Hold time, milliseconds part
    pub hold_ms: u32,
    /// Hold time, microseconds part
    pub hold_us: u32,
}

impl CommandOnly {
    /// Post-program NOP: PGC held high for P9 (1 ms) plus 250 us of margin
    pub const POST_PROGRAM: Self = Self {
        command: IcspCommand::CoreInstruction,
        lines_after: LineLevels::PGC,
        hold_ms: 1,
        hold_us: 250,
    };

    /// Bulk-erase pulse: both lines low for `hold_ms` (P11)
    pub const fn erase_hold(hold_ms: u32) -> Self {
        Self {
            command: IcspCommand::CoreInstruction,
            lines_after: LineLevels::empty(),
            hold_ms,
            hold_us: 0,
        }
    }

    /// Total hold time in microseconds
    pub const fn hold_time_us(&self) -> u64 {
        self.hold_ms as u64 * 1000 + self.hold_us as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_command_bits_round_trip() {
        for bits in 0..16u8 {
            if let Some(cmd) = IcspCommand::from_bits(bits) {
                assert_eq!(cmd.bits(), bits);
            }
        }
        assert_eq!(IcspCommand::from_bits(0b0001), None);
    }

    #[test]
    fn test_command_display_is_binary() {
        assert_eq!(IcspCommand::TableReadPostInc.to_string(), "1001");
        assert_eq!(IcspCommand::CoreInstruction.to_string(), "0000");
    }

    #[test]
    fn test_post_program_hold() {
        let op = CommandOnly::POST_PROGRAM;
        assert!(op.lines_after.contains(LineLevels::PGC));
        assert!(!op.lines_after.contains(LineLevels::PGD));
        assert_eq!(op.hold_time_us(), 1250);
    }
}
