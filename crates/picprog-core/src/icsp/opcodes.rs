//! PIC18 core instructions and special function registers
//!
//! This module defines the instruction encodings and register addresses the
//! programming algorithms feed to the core through the ICSP
//! "core instruction" command. All register operands use the access bank
//! (`a = 0`), so only the low byte of each SFR address is encoded.

// ============================================================================
// Special function registers (access bank addresses)
// ============================================================================

/// Table pointer upper byte
pub const TBLPTRU: u8 = 0xF8;
/// Table pointer high byte
pub const TBLPTRH: u8 = 0xF7;
/// Table pointer low byte
pub const TBLPTRL: u8 = 0xF6;
/// Table latch, shifted out by the TABLAT shift command
pub const TABLAT: u8 = 0xF5;
/// EEPROM address high byte
pub const EEADRH: u8 = 0xAA;
/// EEPROM address low byte
pub const EEADR: u8 = 0xA9;
/// EEPROM data register
pub const EEDATA: u8 = 0xA8;
/// EEPROM unlock register (not a physical register)
pub const EECON2: u8 = 0xA7;
/// EEPROM/flash control register 1
pub const EECON1: u8 = 0xA6;

// ============================================================================
// EECON1 bit numbers
// ============================================================================

/// Flash program / data EEPROM select
pub const EECON1_EEPGD: u8 = 7;
/// Configuration / flash select
pub const EECON1_CFGS: u8 = 6;
/// Flash row erase enable
pub const EECON1_FREE: u8 = 4;
/// Write enable
pub const EECON1_WREN: u8 = 2;
/// Write control (set by software, cleared by hardware on completion)
pub const EECON1_WR: u8 = 1;
/// Read control
pub const EECON1_RD: u8 = 0;

// ============================================================================
// Instruction encoders
// ============================================================================

/// `MOVLW k` - move literal to W
pub const fn movlw(literal: u8) -> u16 {
    0x0E00 | literal as u16
}

/// `MOVWF f` - move W to register
pub const fn movwf(register: u8) -> u16 {
    0x6E00 | register as u16
}

/// `MOVF f, W` - move register to W
pub const fn movf_w(register: u8) -> u16 {
    0x5000 | register as u16
}

/// `BSF f, b` - set bit in register
pub const fn bsf(register: u8, bit: u8) -> u16 {
    0x8000 | ((bit as u16 & 0x7) << 9) | register as u16
}

/// `BCF f, b` - clear bit in register
pub const fn bcf(register: u8, bit: u8) -> u16 {
    0x9000 | ((bit as u16 & 0x7) << 9) | register as u16
}

/// `INCF f, F` - increment register in place
pub const fn incf(register: u8) -> u16 {
    0x2A00 | register as u16
}

// ============================================================================
// Fixed instructions
// ============================================================================

/// No operation
pub const NOP: u16 = 0x0000;
/// Point to flash program memory
pub const SET_EEPGD: u16 = bsf(EECON1, EECON1_EEPGD);
/// Point to data EEPROM
pub const CLR_EEPGD: u16 = bcf(EECON1, EECON1_EEPGD);
/// Access configuration registers
pub const SET_CFGS: u16 = bsf(EECON1, EECON1_CFGS);
/// Access flash program or data EEPROM memory
pub const CLR_CFGS: u16 = bcf(EECON1, EECON1_CFGS);
/// Enable row erase on the next write
pub const SET_FREE: u16 = bsf(EECON1, EECON1_FREE);
/// Enable writes
pub const SET_WREN: u16 = bsf(EECON1, EECON1_WREN);
/// Disable writes
pub const CLR_WREN: u16 = bcf(EECON1, EECON1_WREN);
/// Start a data EEPROM write
pub const SET_WR: u16 = bsf(EECON1, EECON1_WR);
/// Start a data EEPROM read
pub const SET_RD: u16 = bsf(EECON1, EECON1_RD);
/// Advance the table pointer by one byte
pub const INC_TBLPTRL: u16 = incf(TBLPTRL);
/// `GOTO 0x100000`, first word
pub const GOTO_100000_0: u16 = 0xEF00;
/// `GOTO 0x100000`, second word
pub const GOTO_100000_1: u16 = 0xF800;

// ============================================================================
// Fixed addresses
// ============================================================================

/// Device ID words (DEVID1/DEVID2)
pub const DEVICE_ID_ADDRESS: u32 = 0x3F_FFFE;
/// Configuration region base for every PIC18F part
pub const CONFIG_BASE_ADDRESS: u32 = 0x30_0000;
/// Bulk erase control register, low byte
pub const BULK_ERASE_CTL_LOW: u32 = 0x3C_0004;
/// Bulk erase control register, high byte
pub const BULK_ERASE_CTL_HIGH: u32 = 0x3C_0005;
/// Multi-panel write control
pub const PANEL_WRITE_CTL: u32 = 0x3C_0006;
/// Highest address reachable through the 24-bit table pointer
pub const TBLPTR_MAX: u32 = 0xFF_FFFF;
