//! Recording transport double for unit tests

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::icsp::opcodes::{self, TBLPTRH, TBLPTRL, TBLPTRU};
use crate::icsp::{CommandOnly, IcspCommand, IcspTransport};

/// One call made on the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transfer {
    Transmit(IcspCommand, u16),
    Receive(IcspCommand),
    CommandOnly(CommandOnly),
    DataOnly(u32),
    Delay(u32),
}

/// A mock transport that records every transfer and simulates table memory
///
/// - MOVLW/MOVWF into TBLPTRU/H/L and INCF TBLPTRL drive a simulated table pointer
/// - Table writes store addressed bytes (one byte by address parity at or
///   above the config base, a little-endian word below it)
/// - Table reads serve those bytes, 0xFF where nothing was written
/// - TABLAT shift-outs return a fixed, programmable value
pub(crate) struct MockTransport {
    transfers: Vec<Transfer>,
    memory: BTreeMap<u32, u8>,
    tblptr: u32,
    w: u8,
    fail_at: Option<usize>,
    shift_out: u8,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            transfers: Vec::new(),
            memory: BTreeMap::new(),
            tblptr: 0,
            w: 0,
            fail_at: None,
            shift_out: 0,
        }
    }

    /// Fail the transfer with the given zero-based index (and every later one)
    pub(crate) fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Value returned by every TABLAT shift-out
    pub(crate) fn with_shift_out(mut self, value: u8) -> Self {
        self.shift_out = value;
        self
    }

    pub(crate) fn set_byte(&mut self, addr: u32, value: u8) {
        self.memory.insert(addr, value);
    }

    pub(crate) fn byte(&self, addr: u32) -> u8 {
        self.memory.get(&addr).copied().unwrap_or(0xFF)
    }

    pub(crate) fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    pub(crate) fn tblptr(&self) -> u32 {
        self.tblptr
    }

    /// Data words sent with the given command, in order
    pub(crate) fn sent_with(&self, command: IcspCommand) -> Vec<u16> {
        self.transfers
            .iter()
            .filter_map(|t| match t {
                Transfer::Transmit(c, data) if *c == command => Some(*data),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn command_only_count(&self) -> usize {
        self.transfers
            .iter()
            .filter(|t| matches!(t, Transfer::CommandOnly(_)))
            .count()
    }

    fn begin(&mut self, transfer: Transfer) -> Result<()> {
        let index = self.transfers.len();
        self.transfers.push(transfer);
        match self.fail_at {
            Some(fail) if index >= fail => Err(Error::TransportFailure),
            _ => Ok(()),
        }
    }

    fn execute(&mut self, opcode: u16) {
        let operand = opcode as u8;
        match opcode & 0xFF00 {
            0x0E00 => self.w = operand,
            0x6E00 => match operand {
                TBLPTRU => self.tblptr = (self.tblptr & 0x00FFFF) | (self.w as u32) << 16,
                TBLPTRH => self.tblptr = (self.tblptr & 0xFF00FF) | (self.w as u32) << 8,
                TBLPTRL => self.tblptr = (self.tblptr & 0xFFFF00) | self.w as u32,
                _ => {}
            },
            _ if opcode == opcodes::INC_TBLPTRL => {
                let low = (self.tblptr as u8).wrapping_add(1);
                self.tblptr = (self.tblptr & 0xFFFF00) | low as u32;
            }
            _ => {}
        }
    }

    fn table_write(&mut self, data: u16) {
        let addr = self.tblptr;
        if addr >= opcodes::CONFIG_BASE_ADDRESS {
            let value = if addr & 1 == 0 { data as u8 } else { (data >> 8) as u8 };
            self.memory.insert(addr, value);
        } else {
            let base = addr & !1;
            self.memory.insert(base, data as u8);
            self.memory.insert(base + 1, (data >> 8) as u8);
        }
    }
}

impl IcspTransport for MockTransport {
    fn transmit(&mut self, command: IcspCommand, data: u16) -> Result<()> {
        self.begin(Transfer::Transmit(command, data))?;
        match command {
            IcspCommand::CoreInstruction => self.execute(data),
            IcspCommand::TableWritePostInc => {
                self.table_write(data);
                self.tblptr += 1;
            }
            IcspCommand::TableWritePostInc2 | IcspCommand::TableWriteProgPostInc2 => {
                self.table_write(data);
                self.tblptr += 2;
            }
            IcspCommand::TableWriteProg => self.table_write(data),
            _ => {}
        }
        Ok(())
    }

    fn receive(&mut self, command: IcspCommand) -> Result<u8> {
        self.begin(Transfer::Receive(command))?;
        let value = match command {
            IcspCommand::ShiftOutTablat => self.shift_out,
            IcspCommand::TableRead => self.byte(self.tblptr),
            IcspCommand::TableReadPostInc => {
                let value = self.byte(self.tblptr);
                self.tblptr += 1;
                value
            }
            IcspCommand::TableReadPostDec => {
                let value = self.byte(self.tblptr);
                self.tblptr = self.tblptr.wrapping_sub(1);
                value
            }
            IcspCommand::TableReadPreInc => {
                self.tblptr += 1;
                self.byte(self.tblptr)
            }
            _ => 0,
        };
        Ok(value)
    }

    fn command_only(&mut self, op: &CommandOnly) -> Result<()> {
        self.begin(Transfer::CommandOnly(*op))
    }

    fn data_only(&mut self, data: u32) -> Result<()> {
        self.begin(Transfer::DataOnly(data))
    }

    fn delay_us(&mut self, us: u32) -> Result<()> {
        self.begin(Transfer::Delay(us))
    }
}
