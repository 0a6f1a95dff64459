//! Device identification and family dispatch
//!
//! A PIC18 part is identified by the 16-bit word read from the device ID
//! address. Its low byte is the family code, which selects the family's
//! [`DeviceOps`] table; bits 7..5 of the high byte then select the exact part
//! within that family (see [`DeviceOps::open`]).
//!
//! The bound table is chosen once during identification and never changes
//! for the lifetime of a [`Device`].

mod common;
pub mod pic18f2xx_4xx;
pub mod pic18f2xxx_4xxx;

use core::fmt;
use core::str::FromStr;

use crate::error::{Error, Result};
use crate::flash::ProgressTracker;
use crate::icsp::IcspTransport;
use crate::image::Image;
use crate::protocol;

pub use pic18f2xx_4xx::Pic18f2xx4xx;
pub use pic18f2xxx_4xxx::Pic18f2xxx4xxx;

/// Device families the engine knows how to identify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceFamily {
    /// PIC18F
    #[default]
    Pic18F,
}

impl DeviceFamily {
    /// Family tables that can be bound for parts of this family
    pub fn tables(self) -> &'static [&'static dyn DeviceOps] {
        match self {
            Self::Pic18F => PIC18F_TABLES,
        }
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pic18F => write!(f, "18F"),
        }
    }
}

/// Error returned when parsing an unknown family name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFamily;

impl fmt::Display for UnknownFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown device family (supported: 18f)")
    }
}

#[cfg(any(feature = "std", test))]
impl std::error::Error for UnknownFamily {}

impl FromStr for DeviceFamily {
    type Err = UnknownFamily;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s {
            _ if s.eq_ignore_ascii_case("18f") || s.eq_ignore_ascii_case("pic18f") => {
                Ok(Self::Pic18F)
            }
            _ => Err(UnknownFamily),
        }
    }
}

static PIC18F_TABLES: &[&dyn DeviceOps] = &[&Pic18f2xx4xx, &Pic18f2xxx4xxx];

/// Memory geometry of one part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Part name, e.g. "PIC18F452"
    pub name: &'static str,
    /// Family code (low byte of the device ID)
    pub family_code: u8,
    /// Part pattern (bits 7..5 of the device ID high byte)
    pub pattern: u8,
    /// Code memory size in bytes
    pub code_memory_size: u32,
    /// Words committed per buffered write
    pub code_words_per_write: u32,
    /// Erase page size in bytes
    pub code_erase_page_size: u32,
    /// Start of the configuration region
    pub config_address: u32,
    /// Number of configuration bytes
    pub config_bytes: u32,
    /// Data EEPROM size in bytes
    pub eeprom_bytes: u32,
}

impl Geometry {
    /// Whether this part matches a raw device ID
    pub const fn matches(&self, id: u16) -> bool {
        id as u8 == self.family_code && part_pattern(id) == self.pattern
    }
}

/// Bits 7..5 of the device ID high byte
pub const fn part_pattern(id: u16) -> u8 {
    ((id >> 8) as u8 & 0xE0) >> 5
}

/// Family code of a raw device ID
pub const fn family_code(id: u16) -> u8 {
    id as u8
}

/// Family capability table
///
/// One implementation exists per device family. Algorithms take the
/// transport as a trait object so a table can be shared as
/// `&'static dyn DeviceOps`.
pub trait DeviceOps: Sync {
    /// Short family name, e.g. "18F2xx/4xx"
    fn family_name(&self) -> &'static str;

    /// Family codes (device ID low bytes) handled by this table
    fn family_codes(&self) -> &'static [u8];

    /// Every part this table knows
    fn parts(&self) -> &'static [Geometry];

    /// Resolve the exact part geometry from a device ID
    fn open(&self, id: u16) -> Result<&'static Geometry> {
        self.parts()
            .iter()
            .find(|part| part.matches(id))
            .ok_or(Error::UnsupportedDevice(id))
    }

    /// Erase the whole part
    fn bulk_erase(&self, transport: &mut dyn IcspTransport) -> Result<()>;

    /// Erase code memory page by page
    fn non_bulk_erase(
        &self,
        transport: &mut dyn IcspTransport,
        geometry: &Geometry,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<()>;

    /// Enter code write mode
    fn start_code_write(&self, transport: &mut dyn IcspTransport) -> Result<()>;

    /// Enter configuration write mode
    fn start_config_write(&self, transport: &mut dyn IcspTransport) -> Result<()>;

    /// Program the code contents of `image`
    fn program_code(
        &self,
        transport: &mut dyn IcspTransport,
        geometry: &Geometry,
        image: &Image,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<()>;

    /// Program the populated configuration bytes of `image`
    fn program_config(
        &self,
        transport: &mut dyn IcspTransport,
        geometry: &Geometry,
        image: &Image,
    ) -> Result<()> {
        common::program_config(transport, geometry, image)
    }

    /// Read the data EEPROM into `image`
    fn read_eeprom_into(
        &self,
        transport: &mut dyn IcspTransport,
        geometry: &Geometry,
        image: &mut Image,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<()> {
        common::read_eeprom(transport, geometry, image, progress)
    }

    /// Write the EEPROM contents of `image`
    fn write_eeprom_from(
        &self,
        transport: &mut dyn IcspTransport,
        geometry: &Geometry,
        image: &Image,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<()> {
        common::write_eeprom(transport, geometry, image, progress)
    }
}

/// An identified part bound to its family table
#[derive(Clone, Copy)]
pub struct Device {
    id: u16,
    geometry: &'static Geometry,
    ops: &'static dyn DeviceOps,
}

impl Device {
    /// Bind a device ID to a family table, resolving its geometry
    pub fn bind(id: u16, ops: &'static dyn DeviceOps) -> Result<Self> {
        let geometry = ops.open(id)?;
        Ok(Self { id, geometry, ops })
    }

    /// Raw 16-bit device ID
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Silicon revision (bits 4..0 of the ID high byte)
    pub fn revision(&self) -> u8 {
        (self.id >> 8) as u8 & 0x1F
    }

    /// Part name
    pub fn name(&self) -> &'static str {
        self.geometry.name
    }

    /// Memory geometry
    pub fn geometry(&self) -> &'static Geometry {
        self.geometry
    }

    /// Bound family table
    pub fn ops(&self) -> &'static dyn DeviceOps {
        self.ops
    }

    /// Code memory size in bytes
    pub fn code_memory_size(&self) -> u32 {
        self.geometry.code_memory_size
    }

    /// Words committed per buffered write
    pub fn code_words_per_write(&self) -> u32 {
        self.geometry.code_words_per_write
    }

    /// Erase page size in bytes
    pub fn code_erase_page_size(&self) -> u32 {
        self.geometry.code_erase_page_size
    }

    /// Start of the configuration region
    pub fn config_address(&self) -> u32 {
        self.geometry.config_address
    }

    /// Number of configuration bytes
    pub fn config_bytes(&self) -> u32 {
        self.geometry.config_bytes
    }

    /// Data EEPROM size in bytes
    pub fn eeprom_bytes(&self) -> u32 {
        self.geometry.eeprom_bytes
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &format_args!("0x{:04X}", self.id))
            .field("family", &self.ops.family_name())
            .field("geometry", self.geometry)
            .finish()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (ID 0x{:04X}, rev {}, family {})",
            self.name(),
            self.id,
            self.revision(),
            self.ops.family_name()
        )
    }
}

/// Look up the family table for a raw device ID
pub fn table_for_id(family: DeviceFamily, id: u16) -> Option<&'static dyn DeviceOps> {
    family
        .tables()
        .iter()
        .copied()
        .find(|ops| ops.family_codes().contains(&family_code(id)))
}

/// Read the device ID and bind the matching family table
///
/// Fails with [`Error::UnsupportedDevice`] when no table claims the family
/// code or the table does not know the part pattern.
pub fn identify_and_bind<T: IcspTransport + ?Sized>(
    transport: &mut T,
    family: DeviceFamily,
) -> Result<Device> {
    let id = protocol::read_device_id(transport)?;
    log::debug!("Device ID word: 0x{:04X}", id);

    let ops = table_for_id(family, id).ok_or_else(|| {
        log::debug!("No {} table for family code 0x{:02X}", family, family_code(id));
        Error::UnsupportedDevice(id)
    })?;
    let device = Device::bind(id, ops)?;

    log::debug!("Bound {}", device);
    Ok(device)
}

/// Every part known for a family, with the name of its table
pub fn known_parts(family: DeviceFamily) -> impl Iterator<Item = (&'static str, &'static Geometry)> {
    family
        .tables()
        .iter()
        .flat_map(|ops| ops.parts().iter().map(move |part| (ops.family_name(), part)))
}
