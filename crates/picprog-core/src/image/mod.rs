//! In-memory firmware image
//!
//! An [`Image`] holds the three programmable regions of a PIC18 part:
//!
//! - `code`: a byte buffer of caller-chosen capacity, erased (`0xFF`) until
//!   written, stored in device word order (the two bytes of every 16-bit
//!   word swapped relative to their addresses)
//! - `config`: a fixed array of configuration bytes with a per-offset
//!   validity set, since a firmware file need not specify every fuse
//! - `eeprom`: a fixed-capacity byte array with a used length
//!
//! Every writer rejects out-of-bounds data with
//! [`Error::InsufficientCapacity`] and leaves the image untouched.

#[cfg(any(feature = "std", test))]
mod hex;

#[cfg(any(feature = "std", test))]
pub use hex::*;

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::error::{Error, Result};

/// Capacity of the configuration region, in bytes
pub const CONFIG_CAPACITY: usize = 32;

/// Capacity of the EEPROM region, in bytes
pub const EEPROM_CAPACITY: usize = 1024;

/// Value of an erased byte
pub const ERASED: u8 = 0xFF;

/// Number of 16-bit words needed to hold `bytes` bytes
pub const fn word_count(bytes: usize) -> usize {
    bytes.div_ceil(2)
}

/// Set of configuration byte offsets holding meaningful data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigMask([bool; CONFIG_CAPACITY]);

impl ConfigMask {
    /// An empty set
    pub const fn new() -> Self {
        Self([false; CONFIG_CAPACITY])
    }

    /// Whether `offset` is in the set
    pub fn contains(&self, offset: usize) -> bool {
        self.0.get(offset).copied().unwrap_or(false)
    }

    /// Number of offsets in the set
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&valid| valid).count()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Offsets in the set, ascending
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(offset, &valid)| valid.then_some(offset))
    }

    fn insert(&mut self, offset: usize) {
        self.0[offset] = true;
    }
}

impl Default for ConfigMask {
    fn default() -> Self {
        Self::new()
    }
}

/// A firmware image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    code: Vec<u8>,
    origin: u32,
    contents_size: usize,
    config: [u8; CONFIG_CAPACITY],
    config_valid: ConfigMask,
    eeprom: heapless::Vec<u8, EEPROM_CAPACITY>,
}

impl Image {
    /// Create an empty image whose code region starts at device address 0
    pub fn new(code_capacity: usize) -> Self {
        Self::with_origin(code_capacity, 0)
    }

    /// Create an empty image whose first code byte maps to device address `origin`
    pub fn with_origin(code_capacity: usize, origin: u32) -> Self {
        Self {
            code: vec![ERASED; code_capacity],
            origin,
            contents_size: 0,
            config: [ERASED; CONFIG_CAPACITY],
            config_valid: ConfigMask::new(),
            eeprom: heapless::Vec::new(),
        }
    }

    /// Allocated size of the code region
    pub fn code_capacity(&self) -> usize {
        self.code.len()
    }

    /// Device address of the first code byte
    pub fn origin(&self) -> u32 {
        self.origin
    }

    /// High-water mark of code bytes written
    pub fn contents_size(&self) -> usize {
        self.contents_size
    }

    /// Number of 16-bit code words covering the written contents
    pub fn word_count(&self) -> usize {
        word_count(self.contents_size)
    }

    /// Code region in device word order, including unwritten capacity
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Code word `index` as it is transmitted to the device
    ///
    /// The byte at the even address ends up in the low half of the word.
    /// Words past the allocated capacity read as erased.
    pub fn code_word(&self, index: usize) -> u16 {
        let hi = self.code.get(2 * index).copied().unwrap_or(ERASED);
        let lo = self.code.get(2 * index + 1).copied().unwrap_or(ERASED);
        ((hi as u16) << 8) | lo as u16
    }

    /// Code byte at image offset `offset`, in address order
    pub fn code_byte(&self, offset: usize) -> Option<u8> {
        self.code.get(offset ^ 1).copied()
    }

    /// Store `data` at image offset `offset`, in address order
    ///
    /// Bytes are given as they appear at ascending device (or file)
    /// addresses and are swapped into device word order. The write must fit
    /// within the whole words of the capacity.
    pub fn write_code(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(data.len())
            .ok_or_else(|| self.code_overflow(offset, data.len()))?;
        if word_count(end) > self.code.len() / 2 {
            return Err(self.code_overflow(offset, data.len()));
        }

        for (i, &byte) in data.iter().enumerate() {
            self.code[(offset + i) ^ 1] = byte;
        }
        self.contents_size = self.contents_size.max(end);
        Ok(())
    }

    fn code_overflow(&self, offset: usize, len: usize) -> Error {
        Error::InsufficientCapacity {
            offset: offset as u32,
            len: len as u32,
            capacity: self.code.len() as u32,
        }
    }

    /// Configuration bytes, valid or not
    pub fn config(&self) -> &[u8; CONFIG_CAPACITY] {
        &self.config
    }

    /// Configuration byte at `offset`, if it was explicitly populated
    pub fn config_byte(&self, offset: usize) -> Option<u8> {
        self.config_valid
            .contains(offset)
            .then(|| self.config[offset])
    }

    /// Offsets of the populated configuration bytes
    pub fn config_valid(&self) -> &ConfigMask {
        &self.config_valid
    }

    /// Populate the configuration byte at `offset`
    pub fn set_config(&mut self, offset: usize, value: u8) -> Result<()> {
        if offset >= CONFIG_CAPACITY {
            return Err(Error::InsufficientCapacity {
                offset: offset as u32,
                len: 1,
                capacity: CONFIG_CAPACITY as u32,
            });
        }
        self.config[offset] = value;
        self.config_valid.insert(offset);
        Ok(())
    }

    /// Used part of the EEPROM region
    pub fn eeprom(&self) -> &[u8] {
        &self.eeprom
    }

    /// Store `data` at EEPROM offset `offset`
    ///
    /// Gaps below `offset` are filled with erased bytes.
    pub fn write_eeprom(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let end = offset.saturating_add(data.len());
        if end > EEPROM_CAPACITY {
            return Err(Error::InsufficientCapacity {
                offset: offset as u32,
                len: data.len() as u32,
                capacity: EEPROM_CAPACITY as u32,
            });
        }
        if end > self.eeprom.len() {
            // Cannot fail: end is within capacity
            let _ = self.eeprom.resize(end, ERASED);
        }
        self.eeprom[offset..end].copy_from_slice(data);
        Ok(())
    }
}

/// Hex dump of the code contents, then the populated config bytes
impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = self.word_count() * 2;
        let contents = &self.code[..words.min(self.code.len())];
        for (row, chunk) in contents.chunks(16).enumerate() {
            write!(f, "{:06X}:", self.origin as usize + row * 16)?;
            for byte in chunk {
                write!(f, " {:02X}", byte)?;
            }
            writeln!(f)?;
        }
        if !self.config_valid.is_empty() {
            writeln!(f, "config:")?;
            for offset in self.config_valid.iter() {
                writeln!(f, "  [{:02}] {:02X}", offset, self.config[offset])?;
            }
        }
        Ok(())
    }
}
