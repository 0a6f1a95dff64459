//! PIC18F2xxx/4xxx family (PIC18F2455/2550/4455/4550)

use super::{common, DeviceOps, Geometry};
use crate::error::Result;
use crate::flash::ProgressTracker;
use crate::icsp::opcodes::{
    self, BULK_ERASE_CTL_HIGH, BULK_ERASE_CTL_LOW, CONFIG_BASE_ADDRESS, PANEL_WRITE_CTL,
};
use crate::icsp::{CommandOnly, IcspTransport};
use crate::image::Image;
use crate::protocol::{exec_instruction, exec_sequence, write16};

/// Value written to the high erase control register
pub const BULK_ERASE_HIGH: u16 = 0x3F3F;
/// Value written to the low erase control register
pub const BULK_ERASE_LOW: u16 = 0x8F8F;
/// Erase pulse hold (P11), milliseconds
pub const BULK_ERASE_HOLD_MS: u32 = 5;
/// Settle after the erase pulse (P10), microseconds
pub const BULK_ERASE_SETTLE_US: u32 = 200;

const fn part(name: &'static str, pattern: u8, code_kib: u32) -> Geometry {
    Geometry {
        name,
        family_code: 0x12,
        pattern,
        code_memory_size: code_kib * 1024,
        code_words_per_write: 16,
        code_erase_page_size: 64,
        config_address: CONFIG_BASE_ADDRESS,
        config_bytes: 14,
        eeprom_bytes: 256,
    }
}

static PARTS: [Geometry; 4] = [
    part("PIC18F4550", 0b000, 32),
    part("PIC18F4455", 0b001, 24),
    part("PIC18F2550", 0b010, 32),
    part("PIC18F2455", 0b011, 24),
];

/// Capability table for the PIC18F2xxx/4xxx family
#[derive(Debug, Clone, Copy, Default)]
pub struct Pic18f2xxx4xxx;

impl DeviceOps for Pic18f2xxx4xxx {
    fn family_name(&self) -> &'static str {
        "18F2xxx/4xxx"
    }

    fn family_codes(&self) -> &'static [u8] {
        &[0x12]
    }

    fn parts(&self) -> &'static [Geometry] {
        &PARTS
    }

    fn bulk_erase(&self, transport: &mut dyn IcspTransport) -> Result<()> {
        write16(transport, BULK_ERASE_CTL_HIGH, BULK_ERASE_HIGH)?;
        write16(transport, BULK_ERASE_CTL_LOW, BULK_ERASE_LOW)?;
        transport.command_only(&CommandOnly::erase_hold(BULK_ERASE_HOLD_MS))?;
        transport.delay_us(BULK_ERASE_SETTLE_US)
    }

    fn non_bulk_erase(
        &self,
        transport: &mut dyn IcspTransport,
        geometry: &Geometry,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<()> {
        // Row erase needs WREN, which config writes on this family leave clear
        self.start_config_write(transport)?;
        exec_instruction(transport, opcodes::SET_WREN)?;
        write16(transport, PANEL_WRITE_CTL, 0x0000)?;
        common::erase_pages(transport, geometry, progress)
    }

    fn start_code_write(&self, transport: &mut dyn IcspTransport) -> Result<()> {
        exec_sequence(transport, &[opcodes::SET_EEPGD, opcodes::CLR_CFGS])
    }

    fn start_config_write(&self, transport: &mut dyn IcspTransport) -> Result<()> {
        exec_sequence(transport, &[opcodes::SET_EEPGD, opcodes::SET_CFGS])
    }

    fn program_code(
        &self,
        transport: &mut dyn IcspTransport,
        geometry: &Geometry,
        image: &Image,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<()> {
        self.start_code_write(transport)?;
        common::write_code_buffers(transport, geometry, image, progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::Operation;
    use crate::icsp::IcspCommand;
    use crate::testing::{MockTransport, Transfer};

    #[test]
    fn test_bulk_erase_magic_words() {
        let mut mock = MockTransport::new();
        Pic18f2xxx4xxx.bulk_erase(&mut mock).unwrap();

        assert_eq!(
            mock.sent_with(IcspCommand::TableWritePostInc),
            [0x3F3F, 0x8F8F]
        );
        let tail = &mock.transfers()[mock.transfers().len() - 2..];
        assert_eq!(
            tail,
            [
                Transfer::CommandOnly(CommandOnly::erase_hold(5)),
                Transfer::Delay(200),
            ]
        );
    }

    #[test]
    fn test_sixteen_word_buffers() {
        let geometry = Pic18f2xxx4xxx.open(0x2012).unwrap();
        assert_eq!(geometry.name, "PIC18F4455");
        assert_eq!(geometry.code_memory_size, 24 * 1024);

        let mut image = Image::new(128);
        image.write_code(0, &[0u8; 40]).unwrap();
        let mut mock = MockTransport::new();
        let mut progress = ProgressTracker::disabled(Operation::Program, 40);
        Pic18f2xxx4xxx
            .program_code(&mut mock, geometry, &image, &mut progress)
            .unwrap();

        // 20 words: 16 + 4
        assert_eq!(mock.sent_with(IcspCommand::TableWritePostInc2).len(), 15 + 3);
        assert_eq!(mock.sent_with(IcspCommand::TableWriteProg).len(), 2);
        assert_eq!(
            &mock.sent_with(IcspCommand::CoreInstruction)[..2],
            &[opcodes::SET_EEPGD, opcodes::CLR_CFGS]
        );
    }

    #[test]
    fn test_page_erase_enables_writes_first() {
        let geometry = Pic18f2xxx4xxx.open(0x1212).unwrap();
        assert_eq!(geometry.name, "PIC18F4550");

        let mut mock = MockTransport::new();
        let mut progress = ProgressTracker::disabled(Operation::Erase, 32 * 1024);
        Pic18f2xxx4xxx
            .non_bulk_erase(&mut mock, geometry, &mut progress)
            .unwrap();

        let core = mock.sent_with(IcspCommand::CoreInstruction);
        assert_eq!(
            &core[..3],
            &[opcodes::SET_EEPGD, opcodes::SET_CFGS, opcodes::SET_WREN]
        );
        assert_eq!(mock.sent_with(IcspCommand::TableWritePostInc), [0x0000]);
        assert_eq!(mock.byte(PANEL_WRITE_CTL), 0x00);
        assert_eq!(mock.sent_with(IcspCommand::TableWriteProg).len(), 512);
    }

    #[test]
    fn test_config_write_without_wren() {
        let mut mock = MockTransport::new();
        Pic18f2xxx4xxx.start_config_write(&mut mock).unwrap();
        assert_eq!(
            mock.sent_with(IcspCommand::CoreInstruction),
            [opcodes::SET_EEPGD, opcodes::SET_CFGS]
        );
    }
}
