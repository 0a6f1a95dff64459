//! PIC18 instruction execution
//!
//! Every sequence here is a short-circuiting chain: the first transfer that
//! fails aborts the sequence and its error is returned untouched.

use crate::error::{Error, Result};
use crate::icsp::opcodes::{self, TBLPTRH, TBLPTRL, TBLPTRU};
use crate::icsp::{CommandOnly, IcspCommand, IcspTransport};

/// Delay between the post-program hold and the trailing data phase
pub const POST_PROGRAM_SETTLE_US: u32 = 5;

/// Execute a single core instruction
pub fn exec_instruction<T: IcspTransport + ?Sized>(transport: &mut T, opcode: u16) -> Result<()> {
    log::trace!("core instruction {:04X}", opcode);
    transport.transmit(IcspCommand::CoreInstruction, opcode)
}

/// Execute a sequence of core instructions in order
pub fn exec_sequence<T: IcspTransport + ?Sized>(transport: &mut T, opcodes: &[u16]) -> Result<()> {
    for &opcode in opcodes {
        exec_instruction(transport, opcode)?;
    }
    Ok(())
}

/// Load a register through W (`MOVLW value; MOVWF register`)
pub fn load_register<T: IcspTransport + ?Sized>(
    transport: &mut T,
    register: u8,
    value: u8,
) -> Result<()> {
    exec_instruction(transport, opcodes::movlw(value))?;
    exec_instruction(transport, opcodes::movwf(register))
}

/// Point the 24-bit table pointer at `address`
///
/// Loads TBLPTRU, TBLPTRH and TBLPTRL in that order. Addresses above
/// 24 bits are rejected before anything is sent.
pub fn tblptr_set<T: IcspTransport + ?Sized>(transport: &mut T, address: u32) -> Result<()> {
    if address > opcodes::TBLPTR_MAX {
        return Err(Error::InvalidAddress(address));
    }
    load_register(transport, TBLPTRU, (address >> 16) as u8)?;
    load_register(transport, TBLPTRH, (address >> 8) as u8)?;
    load_register(transport, TBLPTRL, address as u8)
}

/// Write a 16-bit value at `address` with one post-increment table write
pub fn write16<T: IcspTransport + ?Sized>(transport: &mut T, address: u32, data: u16) -> Result<()> {
    tblptr_set(transport, address)?;
    transport.transmit(IcspCommand::TableWritePostInc, data)
}

/// Read the byte at the table pointer and advance it
pub fn read_byte_post_inc<T: IcspTransport + ?Sized>(transport: &mut T) -> Result<u8> {
    transport.receive(IcspCommand::TableReadPostInc)
}

/// Read a 16-bit value starting at `address`
///
/// The first byte read (at `address`) is the low byte of the result.
pub fn read16<T: IcspTransport + ?Sized>(transport: &mut T, address: u32) -> Result<u16> {
    tblptr_set(transport, address)?;
    let lsb = read_byte_post_inc(transport)?;
    let msb = read_byte_post_inc(transport)?;
    Ok(((msb as u16) << 8) | lsb as u16)
}

/// Shift out the current TABLAT contents
pub fn shift_out_tablat<T: IcspTransport + ?Sized>(transport: &mut T) -> Result<u8> {
    transport.receive(IcspCommand::ShiftOutTablat)
}

/// Post-program NOP: PGC held high through the write cycle, a short settle,
/// then a zero data phase
pub fn post_program_nop<T: IcspTransport + ?Sized>(transport: &mut T) -> Result<()> {
    transport.command_only(&CommandOnly::POST_PROGRAM)?;
    transport.delay_us(POST_PROGRAM_SETTLE_US)?;
    transport.data_only(0)
}

/// Read the raw 16-bit device ID word
pub fn read_device_id<T: IcspTransport + ?Sized>(transport: &mut T) -> Result<u16> {
    read16(transport, opcodes::DEVICE_ID_ADDRESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, Transfer};

    #[test]
    fn test_tblptr_round_trip() {
        let addresses = [0u32, 1, 0x7FFF, 0x00_8000, 0x12_3456, 0x30_000D, 0xFF_FFFF];
        for (i, &addr) in addresses.iter().enumerate() {
            let mut mock = MockTransport::new();
            mock.set_byte(addr, 0xA0 + i as u8);
            tblptr_set(&mut mock, addr).unwrap();
            assert_eq!(mock.tblptr(), addr);
            assert_eq!(read_byte_post_inc(&mut mock).unwrap(), 0xA0 + i as u8);
        }
    }

    #[test]
    fn test_tblptr_most_significant_first() {
        let mut mock = MockTransport::new();
        tblptr_set(&mut mock, 0x3C_0004).unwrap();
        assert_eq!(
            mock.sent_with(IcspCommand::CoreInstruction),
            [0x0E3C, 0x6EF8, 0x0E00, 0x6EF7, 0x0E04, 0x6EF6]
        );
    }

    #[test]
    fn test_tblptr_rejects_wide_address() {
        let mut mock = MockTransport::new();
        assert_eq!(
            tblptr_set(&mut mock, 0x100_0000),
            Err(Error::InvalidAddress(0x100_0000))
        );
        assert!(mock.transfers().is_empty());
    }

    #[test]
    fn test_tblptr_failure_short_circuits() {
        let mut mock = MockTransport::new().failing_at(2);
        assert_eq!(tblptr_set(&mut mock, 0x12_3456), Err(Error::TransportFailure));
        // Two successful instructions plus the failed attempt
        assert_eq!(mock.transfers().len(), 3);
    }

    #[test]
    fn test_read16_first_byte_is_low() {
        let mut mock = MockTransport::new();
        mock.set_byte(0x3F_FFFE, 0x04);
        mock.set_byte(0x3F_FFFF, 0x25);
        assert_eq!(read_device_id(&mut mock).unwrap(), 0x2504);
    }

    #[test]
    fn test_write16_single_table_write() {
        let mut mock = MockTransport::new();
        write16(&mut mock, 0x3C_0006, 0x0000).unwrap();
        let writes: usize = mock
            .transfers()
            .iter()
            .filter(|t| matches!(t, Transfer::Transmit(IcspCommand::TableWritePostInc, _)))
            .count();
        assert_eq!(writes, 1);
        assert_eq!(mock.transfers().len(), 7);
    }

    #[test]
    fn test_post_program_nop_sequence() {
        let mut mock = MockTransport::new();
        post_program_nop(&mut mock).unwrap();
        assert_eq!(
            mock.transfers(),
            [
                Transfer::CommandOnly(CommandOnly::POST_PROGRAM),
                Transfer::Delay(5),
                Transfer::DataOnly(0),
            ]
        );
    }
}
