//! Algorithms shared by the PIC18F family tables

use alloc::vec::Vec;

use super::Geometry;
use crate::error::{Error, Result};
use crate::flash::ProgressTracker;
use crate::icsp::opcodes::{self, EEADR, EEADRH, EECON1, EECON1_WR, EECON2, EEDATA, TABLAT};
use crate::icsp::{IcspCommand, IcspTransport};
use crate::image::Image;
use crate::protocol::{
    exec_instruction, exec_sequence, load_register, post_program_nop, shift_out_tablat,
    tblptr_set,
};

/// Attempts at observing EECON1.WR clear after an EEPROM write
pub const EEPROM_WRITE_POLLS: u32 = 100;
/// Delay between EEPROM completion polls
pub const EEPROM_POLL_INTERVAL_US: u32 = 1000;

/// Stream the code contents of `image` through the device write buffer
///
/// Buffers cover whole write blocks of `code_words_per_write` words. Each is
/// loaded with post-increment-by-2 writes; its last word uses the programming
/// write (no increment) and is followed by the post-program NOP. An image
/// origin inside a block is reached by padding the first buffer with erased
/// words, which leave the device untouched. The caller must already have
/// entered code write mode.
pub(crate) fn write_code_buffers(
    transport: &mut dyn IcspTransport,
    geometry: &Geometry,
    image: &Image,
    progress: &mut ProgressTracker<'_>,
) -> Result<()> {
    if image.origin() & 1 != 0 {
        return Err(Error::InvalidAlignment);
    }
    let total_words = image.word_count();
    let per_write = geometry.code_words_per_write.max(1) as usize;
    let block_bytes = 2 * per_write as u32;
    let block_start = image.origin() - image.origin() % block_bytes;
    let lead = ((image.origin() - block_start) / 2) as usize;
    let end = lead + total_words;
    let mut slot = 0;

    progress.start();
    while slot < end {
        let count = per_write.min(end - slot);
        tblptr_set(transport, block_start + 2 * slot as u32)?;

        for i in 0..count {
            let command = if i + 1 == count {
                IcspCommand::TableWriteProg
            } else {
                IcspCommand::TableWritePostInc2
            };
            let data = match (slot + i).checked_sub(lead) {
                Some(word) => image.code_word(word),
                None => 0xFFFF,
            };
            transport.transmit(command, data)?;
        }
        post_program_nop(transport)?;

        slot += count;
        progress.update(slot.saturating_sub(lead) * 2);
    }
    progress.finish();

    log::debug!("Programmed {} code words", total_words);
    Ok(())
}

/// Program the populated configuration bytes
///
/// Config words hold one significant byte each: odd offsets travel in the
/// high half, even offsets in the low half. The table pointer advances by
/// one byte per offset whether or not the offset is populated.
pub(crate) fn program_config(
    transport: &mut dyn IcspTransport,
    geometry: &Geometry,
    image: &Image,
) -> Result<()> {
    exec_sequence(
        transport,
        &[
            opcodes::SET_EEPGD,
            opcodes::SET_CFGS,
            opcodes::GOTO_100000_0,
            opcodes::GOTO_100000_1,
        ],
    )?;
    tblptr_set(transport, geometry.config_address)?;

    for offset in 0..geometry.config_bytes as usize {
        if let Some(byte) = image.config_byte(offset) {
            let value = if offset & 1 == 1 {
                (byte as u16) << 8
            } else {
                byte as u16
            };
            transport.transmit(IcspCommand::TableWriteProg, value)?;
            post_program_nop(transport)?;
        }
        exec_instruction(transport, opcodes::INC_TBLPTRL)?;
    }

    let written = image
        .config_valid()
        .iter()
        .filter(|&offset| offset < geometry.config_bytes as usize)
        .count();
    log::debug!("Programmed {} configuration bytes", written);
    Ok(())
}

/// Erase code memory one page at a time
///
/// The caller must already have entered the family's erase mode. The first
/// failing page aborts the loop; pages already erased stay erased.
pub(crate) fn erase_pages(
    transport: &mut dyn IcspTransport,
    geometry: &Geometry,
    progress: &mut ProgressTracker<'_>,
) -> Result<()> {
    let page = geometry.code_erase_page_size.max(1);
    let mut address = 0;

    progress.start();
    while address < geometry.code_memory_size {
        exec_sequence(
            transport,
            &[opcodes::SET_EEPGD, opcodes::CLR_CFGS, opcodes::SET_FREE],
        )?;
        tblptr_set(transport, address)?;
        transport.transmit(IcspCommand::TableWriteProg, 0)?;
        post_program_nop(transport)?;

        address += page;
        progress.update(address as usize);
    }
    progress.finish();
    Ok(())
}

fn load_eeprom_address(transport: &mut dyn IcspTransport, address: u32) -> Result<()> {
    load_register(transport, EEADR, address as u8)?;
    load_register(transport, EEADRH, (address >> 8) as u8)
}

fn select_eeprom(transport: &mut dyn IcspTransport) -> Result<()> {
    exec_sequence(transport, &[opcodes::CLR_EEPGD, opcodes::CLR_CFGS])
}

/// Read every EEPROM byte into the image
///
/// The image is only updated once the whole scan has succeeded.
pub(crate) fn read_eeprom(
    transport: &mut dyn IcspTransport,
    geometry: &Geometry,
    image: &mut Image,
    progress: &mut ProgressTracker<'_>,
) -> Result<()> {
    let size = geometry.eeprom_bytes;
    let mut data = Vec::with_capacity(size as usize);

    select_eeprom(transport)?;
    progress.start();
    for address in 0..size {
        load_eeprom_address(transport, address)?;
        exec_sequence(
            transport,
            &[
                opcodes::SET_RD,
                opcodes::movf_w(EEDATA),
                opcodes::movwf(TABLAT),
            ],
        )?;
        data.push(shift_out_tablat(transport)?);
        progress.update(address as usize + 1);
    }
    progress.finish();

    image.write_eeprom(0, &data)
}

/// Write the image EEPROM contents byte by byte
///
/// Each byte goes through the unlock sequence and is polled for completion.
/// Write enable is only cleared once every byte has been written.
pub(crate) fn write_eeprom(
    transport: &mut dyn IcspTransport,
    geometry: &Geometry,
    image: &Image,
    progress: &mut ProgressTracker<'_>,
) -> Result<()> {
    let data = image.eeprom();
    if data.len() > geometry.eeprom_bytes as usize {
        return Err(Error::InsufficientCapacity {
            offset: 0,
            len: data.len() as u32,
            capacity: geometry.eeprom_bytes,
        });
    }

    select_eeprom(transport)?;
    progress.start();
    for (address, &byte) in data.iter().enumerate() {
        load_eeprom_address(transport, address as u32)?;
        load_register(transport, EEDATA, byte)?;
        exec_instruction(transport, opcodes::SET_WREN)?;
        load_register(transport, EECON2, 0x55)?;
        load_register(transport, EECON2, 0xAA)?;
        exec_instruction(transport, opcodes::SET_WR)?;
        wait_eeprom_write(transport).inspect_err(|_| {
            log::debug!("EEPROM write at 0x{:03X} did not complete", address);
        })?;
        progress.update(address + 1);
    }
    progress.finish();

    exec_instruction(transport, opcodes::CLR_WREN)
}

/// Poll EECON1.WR until the hardware clears it
fn wait_eeprom_write(transport: &mut dyn IcspTransport) -> Result<()> {
    for _ in 0..EEPROM_WRITE_POLLS {
        exec_sequence(
            transport,
            &[
                opcodes::movf_w(EECON1),
                opcodes::movwf(TABLAT),
                opcodes::NOP,
            ],
        )?;
        let eecon1 = shift_out_tablat(transport)?;
        if eecon1 & (1 << EECON1_WR) == 0 {
            return Ok(());
        }
        transport.delay_us(EEPROM_POLL_INTERVAL_US)?;
    }

    Err(Error::Timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Pic18f2xx4xx;
    use crate::device::DeviceOps;
    use crate::flash::Operation;
    use crate::testing::{MockTransport, Transfer};

    fn pic18f452() -> &'static Geometry {
        Pic18f2xx4xx.open(0x2004).unwrap()
    }

    #[test]
    fn test_config_byte_parity() {
        let mut image = Image::new(0);
        image.set_config(0, 0x11).unwrap();
        image.set_config(3, 0x44).unwrap();

        let mut mock = MockTransport::new();
        program_config(&mut mock, pic18f452(), &image).unwrap();

        assert_eq!(mock.sent_with(IcspCommand::TableWriteProg), [0x0011, 0x4400]);
        // One INCF TBLPTRL per config offset
        let increments = mock
            .sent_with(IcspCommand::CoreInstruction)
            .iter()
            .filter(|&&op| op == opcodes::INC_TBLPTRL)
            .count();
        assert_eq!(increments, 14);
        assert_eq!(mock.byte(0x30_0000), 0x11);
        assert_eq!(mock.byte(0x30_0003), 0x44);
        assert_eq!(mock.byte(0x30_0001), 0xFF);
        assert_eq!(mock.command_only_count(), 2);
    }

    #[test]
    fn test_code_buffers_end_with_program_write() {
        let mut image = Image::new(64);
        let data: Vec<u8> = (0..10).collect();
        image.write_code(0, &data).unwrap();

        let mut mock = MockTransport::new();
        let mut progress = ProgressTracker::disabled(Operation::Program, 10);
        write_code_buffers(&mut mock, pic18f452(), &image, &mut progress).unwrap();

        // 5 words: one full buffer of 4, then a buffer of 1
        let commands: Vec<IcspCommand> = mock
            .transfers()
            .iter()
            .filter_map(|t| match t {
                Transfer::Transmit(c, _) if *c != IcspCommand::CoreInstruction => Some(*c),
                _ => None,
            })
            .collect();
        assert_eq!(
            commands,
            [
                IcspCommand::TableWritePostInc2,
                IcspCommand::TableWritePostInc2,
                IcspCommand::TableWritePostInc2,
                IcspCommand::TableWriteProg,
                IcspCommand::TableWriteProg,
            ]
        );
        assert_eq!(mock.command_only_count(), 2);
        for address in 0..10u32 {
            assert_eq!(mock.byte(address), address as u8);
        }
    }

    #[test]
    fn test_code_buffers_start_on_write_block() {
        let mut image = Image::with_origin(16, 0x1002);
        let data: Vec<u8> = (1..=8).collect();
        image.write_code(0, &data).unwrap();

        let mut mock = MockTransport::new();
        let mut progress = ProgressTracker::disabled(Operation::Program, 8);
        write_code_buffers(&mut mock, pic18f452(), &image, &mut progress).unwrap();

        // Block 0x1000 gets an erased lead word plus three words, block
        // 0x1008 the last word
        assert_eq!(
            mock.sent_with(IcspCommand::TableWritePostInc2),
            [0xFFFF, 0x0201, 0x0403]
        );
        assert_eq!(mock.sent_with(IcspCommand::TableWriteProg), [0x0605, 0x0807]);
        assert_eq!(mock.tblptr(), 0x1008);
        assert_eq!(mock.byte(0x1000), 0xFF);
        assert_eq!(mock.byte(0x1001), 0xFF);
        for (i, &byte) in data.iter().enumerate() {
            assert_eq!(mock.byte(0x1002 + i as u32), byte);
        }
    }

    #[test]
    fn test_code_buffers_reject_odd_origin() {
        let mut image = Image::with_origin(16, 0x1001);
        image.write_code(0, &[0x00, 0x01]).unwrap();

        let mut mock = MockTransport::new();
        let mut progress = ProgressTracker::disabled(Operation::Program, 2);
        assert_eq!(
            write_code_buffers(&mut mock, pic18f452(), &image, &mut progress),
            Err(Error::InvalidAlignment)
        );
        assert!(mock.transfers().is_empty());
    }

    #[test]
    fn test_eeprom_write_times_out() {
        let mut image = Image::new(0);
        image.write_eeprom(0, &[0x5A, 0xA5]).unwrap();

        // WR never clears
        let mut mock = MockTransport::new().with_shift_out(1 << EECON1_WR);
        let mut progress = ProgressTracker::disabled(Operation::EepromWrite, 2);
        let result = write_eeprom(&mut mock, pic18f452(), &image, &mut progress);

        assert_eq!(result, Err(Error::Timeout));
        let polls = mock
            .transfers()
            .iter()
            .filter(|t| matches!(t, Transfer::Receive(IcspCommand::ShiftOutTablat)))
            .count();
        assert_eq!(polls, EEPROM_WRITE_POLLS as usize);
        // Second byte never attempted, write enable never cleared
        assert!(!mock
            .sent_with(IcspCommand::CoreInstruction)
            .contains(&opcodes::CLR_WREN));
        assert_eq!(
            mock.sent_with(IcspCommand::CoreInstruction)
                .iter()
                .filter(|&&op| op == opcodes::SET_WR)
                .count(),
            1
        );
    }

    #[test]
    fn test_eeprom_write_unlock_sequence() {
        let mut image = Image::new(0);
        image.write_eeprom(0, &[0x5A]).unwrap();

        let mut mock = MockTransport::new();
        let mut progress = ProgressTracker::disabled(Operation::EepromWrite, 1);
        write_eeprom(&mut mock, pic18f452(), &image, &mut progress).unwrap();

        let core = mock.sent_with(IcspCommand::CoreInstruction);
        let unlock = [
            opcodes::SET_WREN,
            opcodes::movlw(0x55),
            opcodes::movwf(EECON2),
            opcodes::movlw(0xAA),
            opcodes::movwf(EECON2),
            opcodes::SET_WR,
        ];
        assert!(core.windows(unlock.len()).any(|w| w == unlock));
        assert_eq!(core.last(), Some(&opcodes::CLR_WREN));
    }

    #[test]
    fn test_eeprom_read_stores_each_address() {
        let mut mock = MockTransport::new().with_shift_out(0x3C);
        let mut image = Image::new(0);
        let mut progress = ProgressTracker::disabled(Operation::EepromRead, 256);
        read_eeprom(&mut mock, pic18f452(), &mut image, &mut progress).unwrap();

        assert_eq!(image.eeprom().len(), 256);
        assert!(image.eeprom().iter().all(|&b| b == 0x3C));

        let core = mock.sent_with(IcspCommand::CoreInstruction);
        assert_eq!(&core[..2], &[opcodes::CLR_EEPGD, opcodes::CLR_CFGS]);
        // Address low byte goes to EEADR before the high byte to EEADRH
        let load_ff = [
            opcodes::movlw(0xFF),
            opcodes::movwf(EEADR),
            opcodes::movlw(0x00),
            opcodes::movwf(EEADRH),
        ];
        assert!(core.windows(4).any(|w| w == load_ff));
    }

    #[test]
    fn test_eeprom_read_failure_leaves_image() {
        let mut mock = MockTransport::new().failing_at(40);
        let mut image = Image::new(0);
        let mut progress = ProgressTracker::disabled(Operation::EepromRead, 256);
        assert_eq!(
            read_eeprom(&mut mock, pic18f452(), &mut image, &mut progress),
            Err(Error::TransportFailure)
        );
        assert!(image.eeprom().is_empty());
    }

    #[test]
    fn test_page_erase_aborts_on_failure() {
        let mut mock = MockTransport::new().failing_at(20);
        let mut progress = ProgressTracker::disabled(Operation::Erase, 32 * 1024);
        assert_eq!(
            erase_pages(&mut mock, pic18f452(), &mut progress),
            Err(Error::TransportFailure)
        );
        // Failure lands in the second page; nothing after it is attempted
        assert_eq!(mock.transfers().len(), 21);
        assert_eq!(mock.command_only_count(), 1);
    }
}
