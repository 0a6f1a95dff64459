//! picprog-dummy - In-memory PIC18F emulator for testing
//!
//! This crate provides a dummy ICSP programmer with an emulated PIC18F
//! attached. It executes the part of the PIC18 instruction set that the
//! programming algorithms use (table pointer loads, table reads and writes,
//! EECON1 manipulation, the EEPROM unlock sequence) and models the flash
//! write latch, row erase and bulk erase, so the whole engine can be
//! exercised without hardware.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use picprog_core::device::{known_parts, pic18f2xx_4xx, pic18f2xxx_4xxx, DeviceFamily, Geometry};
use picprog_core::error::{Error, Result};
use picprog_core::icsp::opcodes::{
    self, BULK_ERASE_CTL_LOW, CONFIG_BASE_ADDRESS, DEVICE_ID_ADDRESS, EEADR, EEADRH, EECON1,
    EECON1_CFGS, EECON1_EEPGD, EECON1_FREE, EECON1_RD, EECON1_WR, EECON1_WREN, EECON2, EEDATA,
    PANEL_WRITE_CTL, TABLAT, TBLPTRH, TBLPTRL, TBLPTRU, TBLPTR_MAX,
};
use picprog_core::icsp::{CommandOnly, IcspCommand, IcspTransport, LineLevels};
use picprog_core::image::ERASED;

/// Family code of the parts keyed with the two-register bulk erase
const FAMILY_2XXX_4XXX: u8 = 0x12;

/// Configuration for the emulated part
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Device ID word served at the device ID address
    pub device_id: u16,
    /// Code memory size in bytes
    pub code_size: u32,
    /// Row erase size in bytes
    pub erase_page_size: u32,
    /// Code write latch size in bytes
    pub write_block_size: u32,
    /// Number of configuration bytes
    pub config_bytes: u32,
    /// Data EEPROM size in bytes
    pub eeprom_size: u32,
    /// EECON1 reads for which WR stays set after an EEPROM write starts
    pub eeprom_busy_reads: u32,
    /// Never complete EEPROM writes
    pub eeprom_stuck: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            device_id: 0x2004, // PIC18F452, rev 0
            code_size: 32 * 1024,
            erase_page_size: 64,
            write_block_size: 8,
            config_bytes: 14,
            eeprom_size: 256,
            eeprom_busy_reads: 2,
            eeprom_stuck: false,
        }
    }
}

impl DummyConfig {
    /// Configuration for a known part, by name ("PIC18F2550" or "18F2550")
    pub fn for_part(name: &str) -> Option<Self> {
        known_parts(DeviceFamily::Pic18F)
            .map(|(_, geometry)| geometry)
            .find(|geometry| part_name_matches(geometry.name, name))
            .map(Self::from_geometry)
    }

    /// Configuration matching a part geometry, silicon revision 0
    pub fn from_geometry(geometry: &Geometry) -> Self {
        Self {
            device_id: (geometry.pattern as u16) << 13 | geometry.family_code as u16,
            code_size: geometry.code_memory_size,
            erase_page_size: geometry.code_erase_page_size,
            write_block_size: geometry.code_words_per_write * 2,
            config_bytes: geometry.config_bytes,
            eeprom_size: geometry.eeprom_bytes,
            ..Self::default()
        }
    }

    /// Set the silicon revision reported in the device ID
    pub fn with_revision(mut self, revision: u8) -> Self {
        self.device_id = (self.device_id & !0x1F00) | ((revision as u16 & 0x1F) << 8);
        self
    }

    fn family_code(&self) -> u8 {
        self.device_id as u8
    }
}

fn part_name_matches(part: &str, name: &str) -> bool {
    let name = name.trim();
    part.eq_ignore_ascii_case(name)
        || part
            .get(3..)
            .is_some_and(|short| short.eq_ignore_ascii_case(name))
}

/// Progress of the EECON2 unlock sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unlock {
    Locked,
    Primed,
    Ready,
}

/// Dummy ICSP programmer with an emulated PIC18F attached
pub struct DummyPic {
    config: DummyConfig,
    code: Vec<u8>,
    config_data: Vec<u8>,
    eeprom: Vec<u8>,
    tblptr: u32,
    w: u8,
    tablat: u8,
    eecon1: u8,
    eeadr: u16,
    eedata: u8,
    unlock: Unlock,
    eeprom_busy: u32,
    /// Bulk erase control and multi-panel control registers
    control: [u8; 3],
    /// Code write latch, keyed by offset within the write block
    latch: BTreeMap<u32, u8>,
    config_latch: BTreeMap<u32, u8>,
    /// Table pointer of the programming write that armed the next cycle
    armed: Option<u32>,
    transfers: usize,
    fail_after: Option<usize>,
    bulk_erases: usize,
    row_erases: usize,
}

impl DummyPic {
    /// Create a new emulated part with the given configuration
    ///
    /// Every memory starts erased.
    pub fn new(config: DummyConfig) -> Self {
        Self {
            code: vec![ERASED; config.code_size as usize],
            config_data: vec![ERASED; config.config_bytes as usize],
            eeprom: vec![ERASED; config.eeprom_size as usize],
            config,
            tblptr: 0,
            w: 0,
            tablat: 0,
            eecon1: 0,
            eeadr: 0,
            eedata: 0,
            unlock: Unlock::Locked,
            eeprom_busy: 0,
            control: [0; 3],
            latch: BTreeMap::new(),
            config_latch: BTreeMap::new(),
            armed: None,
            transfers: 0,
            fail_after: None,
            bulk_erases: 0,
            row_erases: 0,
        }
    }

    /// Create a new emulated part with the default configuration (PIC18F452)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create an emulated part with pre-filled code memory
    pub fn with_code(config: DummyConfig, initial_code: &[u8]) -> Self {
        let mut pic = Self::new(config);
        let len = core::cmp::min(initial_code.len(), pic.code.len());
        pic.code[..len].copy_from_slice(&initial_code[..len]);
        pic
    }

    /// Fail every transfer after the first `count`, as if the link was lost
    pub fn fail_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Code memory, in address order
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Mutable code memory, in address order
    pub fn code_mut(&mut self) -> &mut [u8] {
        &mut self.code
    }

    /// Configuration bytes, from the configuration base address
    pub fn config_data(&self) -> &[u8] {
        &self.config_data
    }

    /// Data EEPROM
    pub fn eeprom(&self) -> &[u8] {
        &self.eeprom
    }

    /// Mutable data EEPROM
    pub fn eeprom_mut(&mut self) -> &mut [u8] {
        &mut self.eeprom
    }

    /// Number of transfers clocked so far, failed ones included
    pub fn transfers(&self) -> usize {
        self.transfers
    }

    /// Number of bulk erases performed
    pub fn bulk_erases(&self) -> usize {
        self.bulk_erases
    }

    /// Number of row erases performed
    pub fn row_erases(&self) -> usize {
        self.row_erases
    }

    /// Byte the table read logic returns at `address`
    ///
    /// Unimplemented memory reads as zero.
    pub fn peek(&self, address: u32) -> u8 {
        let config_end = CONFIG_BASE_ADDRESS + self.config.config_bytes;
        if address < self.config.code_size {
            self.code[address as usize]
        } else if (CONFIG_BASE_ADDRESS..config_end).contains(&address) {
            self.config_data[(address - CONFIG_BASE_ADDRESS) as usize]
        } else if address == DEVICE_ID_ADDRESS {
            self.config.device_id as u8
        } else if address == DEVICE_ID_ADDRESS + 1 {
            (self.config.device_id >> 8) as u8
        } else {
            0
        }
    }

    fn begin(&mut self) -> Result<()> {
        let index = self.transfers;
        self.transfers += 1;
        match self.fail_after {
            Some(limit) if index >= limit => Err(Error::TransportFailure),
            _ => Ok(()),
        }
    }

    fn bit(&self, bit: u8) -> bool {
        self.eecon1 & (1 << bit) != 0
    }

    fn execute(&mut self, opcode: u16) -> Result<()> {
        let operand = opcode as u8;
        let bit = ((opcode >> 9) & 0x7) as u8;
        match opcode >> 8 {
            0x00 if opcode == opcodes::NOP => {}
            0x0E => self.w = operand,
            0x6E => self.write_register(operand, self.w),
            0x50 => {
                self.w = self.read_register(operand);
                if operand == EECON1 {
                    self.tick_eeprom();
                }
            }
            0x2A => {
                let value = self.read_register(operand).wrapping_add(1);
                self.write_register(operand, value);
            }
            0x80..=0x8F => self.set_bit(operand, bit),
            0x90..=0x9F => self.clear_bit(operand, bit),
            // GOTO and its second word
            0xEF | 0xF0..=0xFF => {}
            _ => {
                log::warn!("Unsupported core instruction 0x{:04X}", opcode);
                return Err(Error::TransportFailure);
            }
        }
        Ok(())
    }

    fn read_register(&self, register: u8) -> u8 {
        match register {
            TBLPTRU => (self.tblptr >> 16) as u8,
            TBLPTRH => (self.tblptr >> 8) as u8,
            TBLPTRL => self.tblptr as u8,
            TABLAT => self.tablat,
            EEADR => self.eeadr as u8,
            EEADRH => (self.eeadr >> 8) as u8,
            EEDATA => self.eedata,
            EECON1 => self.eecon1,
            _ => 0,
        }
    }

    fn write_register(&mut self, register: u8, value: u8) {
        match register {
            TBLPTRU => self.tblptr = (self.tblptr & 0x00_FFFF) | (value as u32) << 16,
            TBLPTRH => self.tblptr = (self.tblptr & 0xFF_00FF) | (value as u32) << 8,
            TBLPTRL => self.tblptr = (self.tblptr & 0xFF_FF00) | value as u32,
            TABLAT => self.tablat = value,
            EEADR => self.eeadr = (self.eeadr & 0xFF00) | value as u16,
            EEADRH => self.eeadr = (self.eeadr & 0x00FF) | (value as u16) << 8,
            EEDATA => self.eedata = value,
            EECON1 => self.eecon1 = value,
            EECON2 => {
                self.unlock = match (self.unlock, value) {
                    (Unlock::Locked, 0x55) => Unlock::Primed,
                    (Unlock::Primed, 0xAA) => Unlock::Ready,
                    _ => Unlock::Locked,
                };
            }
            _ => log::trace!("Write to unmodelled register 0x{:02X}", register),
        }
    }

    fn set_bit(&mut self, register: u8, bit: u8) {
        if register != EECON1 {
            let value = self.read_register(register) | 1 << bit;
            self.write_register(register, value);
            return;
        }
        match bit {
            EECON1_RD => {
                if !self.bit(EECON1_EEPGD) && !self.bit(EECON1_CFGS) {
                    self.eedata = self.eeprom.get(self.eeadr as usize).copied().unwrap_or(0);
                }
            }
            EECON1_WR => self.start_eeprom_write(),
            _ => self.eecon1 |= 1 << bit,
        }
    }

    fn clear_bit(&mut self, register: u8, bit: u8) {
        // WR can only be cleared by the hardware
        if register == EECON1 && bit == EECON1_WR {
            return;
        }
        let value = self.read_register(register) & !(1 << bit);
        self.write_register(register, value);
    }

    fn start_eeprom_write(&mut self) {
        let unlocked = self.unlock == Unlock::Ready;
        self.unlock = Unlock::Locked;
        if !unlocked || !self.bit(EECON1_WREN) || self.bit(EECON1_EEPGD) || self.bit(EECON1_CFGS)
        {
            log::debug!("EEPROM write at 0x{:03X} not armed, ignored", self.eeadr);
            return;
        }

        if let Some(byte) = self.eeprom.get_mut(self.eeadr as usize) {
            *byte = self.eedata;
        }
        log::trace!("EEPROM[0x{:03X}] = 0x{:02X}", self.eeadr, self.eedata);

        self.eecon1 |= 1 << EECON1_WR;
        self.eeprom_busy = self.config.eeprom_busy_reads;
        if self.eeprom_busy == 0 && !self.config.eeprom_stuck {
            self.eecon1 &= !(1 << EECON1_WR);
        }
    }

    /// Advance a running EEPROM write by one EECON1 read
    fn tick_eeprom(&mut self) {
        if self.config.eeprom_stuck || self.eeprom_busy == 0 {
            return;
        }
        self.eeprom_busy -= 1;
        if self.eeprom_busy == 0 {
            self.eecon1 &= !(1 << EECON1_WR);
        }
    }

    fn table_write(&mut self, data: u16) {
        let address = self.tblptr;
        let selected = if address & 1 == 0 {
            data as u8
        } else {
            (data >> 8) as u8
        };

        if (BULK_ERASE_CTL_LOW..=PANEL_WRITE_CTL).contains(&address) {
            self.control[(address - BULK_ERASE_CTL_LOW) as usize] = selected;
        } else if address >= CONFIG_BASE_ADDRESS {
            self.config_latch.insert(address, selected);
        } else {
            let offset = (address & !1) % self.block_size();
            self.latch.insert(offset, data as u8);
            self.latch.insert(offset + 1, (data >> 8) as u8);
        }
    }

    fn block_size(&self) -> u32 {
        self.config.write_block_size.max(2)
    }

    fn advance(&mut self, step: u32) {
        self.tblptr = (self.tblptr + step) & TBLPTR_MAX;
    }

    /// Run the programming cycle started by the last programming table write
    ///
    /// Code goes to the write block holding `trigger`; the latch only knows
    /// offsets within a block.
    fn commit(&mut self, trigger: u32) {
        let latch = core::mem::take(&mut self.latch);
        let config_latch = core::mem::take(&mut self.config_latch);

        if !self.bit(EECON1_EEPGD) {
            log::debug!("Programming cycle with EEPGD clear ignored");
            return;
        }
        if self.bit(EECON1_FREE) {
            self.eecon1 &= !(1 << EECON1_FREE);
            if self.bit(EECON1_WREN) {
                self.erase_row(trigger);
            } else {
                log::debug!("Row erase at 0x{:06X} with WREN clear ignored", trigger);
            }
            return;
        }

        if self.bit(EECON1_CFGS) {
            let config_end = CONFIG_BASE_ADDRESS + self.config.config_bytes;
            for (address, byte) in config_latch {
                if (CONFIG_BASE_ADDRESS..config_end).contains(&address) {
                    self.config_data[(address - CONFIG_BASE_ADDRESS) as usize] = byte;
                } else {
                    log::trace!("Latched byte at 0x{:06X} dropped", address);
                }
            }
            return;
        }

        let block = trigger - trigger % self.block_size();
        for (offset, byte) in latch {
            let address = block + offset;
            if address < self.config.code_size {
                // Programming can only clear bits
                self.code[address as usize] &= byte;
            } else {
                log::trace!("Latched byte at 0x{:06X} dropped", address);
            }
        }
    }

    fn erase_row(&mut self, address: u32) {
        let page = self.config.erase_page_size.max(1);
        let start = address - address % page;
        if start >= self.config.code_size {
            return;
        }
        let end = core::cmp::min(start + page, self.config.code_size);
        self.code[start as usize..end as usize].fill(ERASED);
        self.row_erases += 1;
    }

    fn bulk_erase_keyed(&self) -> bool {
        let [low, high, _] = self.control;
        let key = |value: u16| value as u8;
        match self.config.family_code() {
            FAMILY_2XXX_4XXX => {
                high == key(pic18f2xxx_4xxx::BULK_ERASE_HIGH)
                    && low == key(pic18f2xxx_4xxx::BULK_ERASE_LOW)
            }
            _ => low == key(pic18f2xx_4xx::BULK_ERASE_COMMAND),
        }
    }

    fn bulk_erase(&mut self) {
        log::debug!("Bulk erase");
        self.code.fill(ERASED);
        self.config_data.fill(ERASED);
        self.eeprom.fill(ERASED);
        self.control[..2].fill(0);
        self.latch.clear();
        self.config_latch.clear();
        self.bulk_erases += 1;
    }
}

impl IcspTransport for DummyPic {
    fn transmit(&mut self, command: IcspCommand, data: u16) -> Result<()> {
        self.begin()?;
        match command {
            IcspCommand::CoreInstruction => return self.execute(data),
            IcspCommand::TableWritePostInc => {
                self.table_write(data);
                self.advance(1);
            }
            IcspCommand::TableWritePostInc2 => {
                self.table_write(data);
                self.advance(2);
            }
            IcspCommand::TableWriteProgPostInc2 => {
                self.table_write(data);
                self.armed = Some(self.tblptr);
                self.advance(2);
            }
            IcspCommand::TableWriteProg => {
                self.table_write(data);
                self.armed = Some(self.tblptr);
            }
            _ => {
                log::warn!("Read command {} sent as a write", command);
                return Err(Error::TransportFailure);
            }
        }
        Ok(())
    }

    fn receive(&mut self, command: IcspCommand) -> Result<u8> {
        self.begin()?;
        let value = match command {
            IcspCommand::ShiftOutTablat => return Ok(self.tablat),
            IcspCommand::TableRead => self.peek(self.tblptr),
            IcspCommand::TableReadPostInc => {
                let value = self.peek(self.tblptr);
                self.advance(1);
                value
            }
            IcspCommand::TableReadPostDec => {
                let value = self.peek(self.tblptr);
                self.tblptr = self.tblptr.wrapping_sub(1) & TBLPTR_MAX;
                value
            }
            IcspCommand::TableReadPreInc => {
                self.advance(1);
                self.peek(self.tblptr)
            }
            _ => {
                log::warn!("Write command {} sent as a read", command);
                return Err(Error::TransportFailure);
            }
        };
        self.tablat = value;
        Ok(value)
    }

    fn command_only(&mut self, op: &CommandOnly) -> Result<()> {
        self.begin()?;
        if op.lines_after.contains(LineLevels::PGC) {
            if let Some(trigger) = self.armed.take() {
                self.commit(trigger);
            }
        } else if self.bulk_erase_keyed() {
            self.bulk_erase();
        }
        Ok(())
    }

    fn data_only(&mut self, _data: u32) -> Result<()> {
        self.begin()
    }

    fn delay_us(&mut self, _us: u32) -> Result<()> {
        // No delay needed for in-memory operations
        self.begin()
    }
}
