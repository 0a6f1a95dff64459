//! PIC18F2xx/4xx family (PIC18FXX2, PIC18FXX8)

use super::{common, DeviceOps, Geometry};
use crate::error::Result;
use crate::flash::ProgressTracker;
use crate::icsp::opcodes::{self, BULK_ERASE_CTL_LOW, CONFIG_BASE_ADDRESS, PANEL_WRITE_CTL};
use crate::icsp::{CommandOnly, IcspTransport};
use crate::image::Image;
use crate::protocol::{exec_instruction, exec_sequence, write16};

/// Bulk erase command written to the erase control register
pub const BULK_ERASE_COMMAND: u16 = 0x0080;
/// Erase pulse hold (P11), milliseconds
pub const BULK_ERASE_HOLD_MS: u32 = 10;
/// Settle after the erase pulse (P10), microseconds
pub const BULK_ERASE_SETTLE_US: u32 = 50;

const fn part(name: &'static str, family_code: u8, pattern: u8, code_kib: u32) -> Geometry {
    Geometry {
        name,
        family_code,
        pattern,
        code_memory_size: code_kib * 1024,
        code_words_per_write: 4,
        code_erase_page_size: 64,
        config_address: CONFIG_BASE_ADDRESS,
        config_bytes: 14,
        eeprom_bytes: 256,
    }
}

static PARTS: [Geometry; 8] = [
    part("PIC18F252", 0x04, 0b000, 32),
    part("PIC18F452", 0x04, 0b001, 32),
    part("PIC18F242", 0x04, 0b100, 16),
    part("PIC18F442", 0x04, 0b101, 16),
    part("PIC18F248", 0x08, 0b000, 16),
    part("PIC18F448", 0x08, 0b001, 16),
    part("PIC18F258", 0x08, 0b010, 32),
    part("PIC18F458", 0x08, 0b011, 32),
];

/// Capability table for the PIC18F2xx/4xx family
#[derive(Debug, Clone, Copy, Default)]
pub struct Pic18f2xx4xx;

impl Pic18f2xx4xx {
    /// Enter configuration write mode and disable multi-panel writes
    fn start_single_panel_write(&self, transport: &mut dyn IcspTransport) -> Result<()> {
        self.start_config_write(transport)?;
        write16(transport, PANEL_WRITE_CTL, 0x0000)
    }
}

impl DeviceOps for Pic18f2xx4xx {
    fn family_name(&self) -> &'static str {
        "18F2xx/4xx"
    }

    fn family_codes(&self) -> &'static [u8] {
        &[0x04, 0x08]
    }

    fn parts(&self) -> &'static [Geometry] {
        &PARTS
    }

    fn bulk_erase(&self, transport: &mut dyn IcspTransport) -> Result<()> {
        write16(transport, BULK_ERASE_CTL_LOW, BULK_ERASE_COMMAND)?;
        exec_instruction(transport, opcodes::NOP)?;
        transport.command_only(&CommandOnly::erase_hold(BULK_ERASE_HOLD_MS))?;
        transport.delay_us(BULK_ERASE_SETTLE_US)
    }

    fn non_bulk_erase(
        &self,
        transport: &mut dyn IcspTransport,
        geometry: &Geometry,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<()> {
        self.start_single_panel_write(transport)?;
        common::erase_pages(transport, geometry, progress)
    }

    fn start_code_write(&self, transport: &mut dyn IcspTransport) -> Result<()> {
        exec_sequence(transport, &[opcodes::SET_EEPGD, opcodes::CLR_CFGS])
    }

    fn start_config_write(&self, transport: &mut dyn IcspTransport) -> Result<()> {
        exec_sequence(
            transport,
            &[opcodes::SET_EEPGD, opcodes::SET_CFGS, opcodes::SET_WREN],
        )
    }

    fn program_code(
        &self,
        transport: &mut dyn IcspTransport,
        geometry: &Geometry,
        image: &Image,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<()> {
        self.start_single_panel_write(transport)?;
        self.start_code_write(transport)?;
        common::write_code_buffers(transport, geometry, image, progress)
    }
}
