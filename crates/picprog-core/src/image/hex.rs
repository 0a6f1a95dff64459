//! Intel HEX import and export
//!
//! Record parsing and serialisation are delegated to the `ihex` crate; this
//! module maps record addresses onto the image regions:
//!
//! | Address range         | Region                         |
//! |-----------------------|--------------------------------|
//! | `0x000000..0x200000`  | code                           |
//! | `0x200000..0x300000`  | ID locations (ignored)         |
//! | `0x300000..`          | configuration bytes            |
//! | `0xF00000..`          | data EEPROM                    |

use std::fs;
use std::path::Path;
use std::string::String;
use std::vec::Vec;

use ihex::{Reader, Record};

use super::{Image, CONFIG_CAPACITY, EEPROM_CAPACITY};
use crate::error::{Error, HexFault, Result};
use crate::icsp::opcodes::CONFIG_BASE_ADDRESS;

/// Start of the user ID locations, just past the code address space
pub const ID_LOCATIONS_ADDRESS: u32 = 0x20_0000;
/// Start of the data EEPROM in HEX files
pub const EEPROM_FILE_ADDRESS: u32 = 0xF0_0000;

const RECORD_DATA_LEN: usize = 16;

/// Error type for HEX file operations
#[derive(Debug, thiserror::Error)]
pub enum HexFileError {
    /// Reading or writing the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file contents could not be applied to or produced from an image
    #[error(transparent)]
    Image(#[from] Error),
}

enum Region {
    Code(usize),
    IdLocations,
    Config(usize),
    Eeprom(usize),
    Unknown,
}

fn region_of(address: u32) -> Region {
    if address < ID_LOCATIONS_ADDRESS {
        Region::Code(address as usize)
    } else if address < CONFIG_BASE_ADDRESS {
        Region::IdLocations
    } else if address < CONFIG_BASE_ADDRESS + CONFIG_CAPACITY as u32 {
        Region::Config((address - CONFIG_BASE_ADDRESS) as usize)
    } else if (EEPROM_FILE_ADDRESS..EEPROM_FILE_ADDRESS + EEPROM_CAPACITY as u32).contains(&address)
    {
        Region::Eeprom((address - EEPROM_FILE_ADDRESS) as usize)
    } else {
        Region::Unknown
    }
}

/// Parse Intel HEX text into a new image with the given code capacity
pub fn parse_hex(text: &str, code_capacity: usize) -> Result<Image> {
    let mut image = Image::new(code_capacity);
    let mut upper: u32 = 0;

    for (index, record) in Reader::new(text).enumerate() {
        let line = index + 1;
        let record = record.map_err(|e| {
            log::debug!("HEX record {} rejected: {}", line, e);
            Error::FileFormat(HexFault::InvalidRecord { line })
        })?;

        match record {
            Record::Data { offset, value } => {
                apply_data(&mut image, upper + offset as u32, &value, line)?;
            }
            Record::ExtendedLinearAddress(segment) => upper = (segment as u32) << 16,
            Record::ExtendedSegmentAddress(segment) => upper = (segment as u32) << 4,
            Record::StartSegmentAddress { .. } | Record::StartLinearAddress(_) => {}
            Record::EndOfFile => break,
        }
    }

    log::debug!(
        "Loaded image: {} code bytes, {} config bytes, {} EEPROM bytes",
        image.contents_size(),
        image.config_valid().count(),
        image.eeprom().len()
    );
    Ok(image)
}

fn apply_data(image: &mut Image, address: u32, data: &[u8], line: usize) -> Result<()> {
    match region_of(address) {
        Region::Code(offset) => image.write_code(offset, data),
        Region::Config(offset) => {
            for (i, &byte) in data.iter().enumerate() {
                image.set_config(offset + i, byte)?;
            }
            Ok(())
        }
        Region::Eeprom(offset) => image.write_eeprom(offset, data),
        Region::IdLocations => {
            log::warn!(
                "Ignoring {} bytes of ID location data at 0x{:06X}",
                data.len(),
                address
            );
            Ok(())
        }
        Region::Unknown => {
            log::debug!("No region at 0x{:06X}", address);
            Err(Error::FileFormat(HexFault::UnsupportedRecord { line }))
        }
    }
}

/// Serialise an image to Intel HEX text
///
/// Code is emitted in address order starting at the image origin, followed
/// by the populated configuration bytes and the EEPROM contents.
pub fn to_hex(image: &Image) -> Result<String> {
    let mut records = Vec::new();
    let mut upper: u32 = 0;

    let code: Vec<u8> = (0..image.contents_size())
        .filter_map(|offset| image.code_byte(offset))
        .collect();
    push_data(&mut records, &mut upper, image.origin(), &code);

    // Config bytes are emitted in contiguous runs of populated offsets
    let mut run: Vec<u8> = Vec::new();
    let mut run_start = 0;
    for offset in 0..=CONFIG_CAPACITY {
        match image.config_byte(offset) {
            Some(byte) => {
                if run.is_empty() {
                    run_start = offset;
                }
                run.push(byte);
            }
            None if !run.is_empty() => {
                let address = CONFIG_BASE_ADDRESS + run_start as u32;
                push_data(&mut records, &mut upper, address, &run);
                run.clear();
            }
            None => {}
        }
    }

    push_data(&mut records, &mut upper, EEPROM_FILE_ADDRESS, image.eeprom());
    records.push(Record::EndOfFile);

    ihex::create_object_file_representation(&records)
        .map_err(|_| Error::FileFormat(HexFault::Unwritable))
}

fn push_data(records: &mut Vec<Record>, upper: &mut u32, start: u32, data: &[u8]) {
    let mut address = start;
    let mut rest = data;
    while !rest.is_empty() {
        // Never let a record cross a 64 KiB segment
        let room = 0x1_0000 - (address & 0xFFFF) as usize;
        let len = rest.len().min(RECORD_DATA_LEN).min(room);

        if address >> 16 != *upper {
            *upper = address >> 16;
            records.push(Record::ExtendedLinearAddress(*upper as u16));
        }
        records.push(Record::Data {
            offset: address as u16,
            value: rest[..len].to_vec(),
        });

        address += len as u32;
        rest = &rest[len..];
    }
}

/// Load an Intel HEX file into a new image
pub fn load_hex_file(
    path: impl AsRef<Path>,
    code_capacity: usize,
) -> core::result::Result<Image, HexFileError> {
    let text = fs::read_to_string(path)?;
    Ok(parse_hex(&text, code_capacity)?)
}

/// Write an image to an Intel HEX file
pub fn save_hex_file(
    path: impl AsRef<Path>,
    image: &Image,
) -> core::result::Result<(), HexFileError> {
    let text = to_hex(image)?;
    fs::write(path, text)?;
    Ok(())
}
