//! Read and verify operations
//!
//! These are the building blocks the [`Context`](super::Context) composes
//! into its read-device, write-device and verify flows. They take the
//! transport and the identified device explicitly so they can be used
//! without a context.

use crate::device::Device;
use crate::error::{Error, Result};
use crate::icsp::IcspTransport;
use crate::image::Image;
use crate::protocol::{read_byte_post_inc, tblptr_set};

use super::ProgressTracker;

/// Statistics from a verify operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyStats {
    /// Code bytes compared
    pub code_bytes: usize,
    /// Configuration bytes compared
    pub config_bytes: usize,
}

impl VerifyStats {
    /// Total number of bytes compared
    pub fn bytes_compared(&self) -> usize {
        self.code_bytes + self.config_bytes
    }
}

/// Check that `len` code bytes at `offset` lie within the device
pub fn check_code_range(device: &Device, offset: u32, len: usize) -> Result<()> {
    let capacity = device.code_memory_size();
    let end = offset as u64 + len as u64;
    if end > capacity as u64 {
        return Err(Error::InsufficientCapacity {
            offset,
            len: len as u32,
            capacity,
        });
    }
    Ok(())
}

/// Read `size` code bytes starting at device address `offset`
///
/// Both must be word aligned. A `size` of zero reads up to the end of code
/// memory, so `offset` must then lie inside it. The returned image has its
/// origin at `offset`.
pub fn read_code<T: IcspTransport + ?Sized>(
    transport: &mut T,
    device: &Device,
    offset: u32,
    size: usize,
    progress: &mut ProgressTracker<'_>,
) -> Result<Image> {
    if offset % 2 != 0 || size % 2 != 0 {
        return Err(Error::InvalidAlignment);
    }
    let capacity = device.code_memory_size();
    let size = match size {
        0 if offset >= capacity => {
            return Err(Error::InsufficientCapacity {
                offset,
                len: 0,
                capacity,
            })
        }
        0 => (capacity - offset) as usize,
        n => n,
    };
    check_code_range(device, offset, size)?;

    let mut image = Image::with_origin(size, offset);
    tblptr_set(transport, offset)?;

    progress.start();
    for index in (0..size).step_by(2) {
        let lo = read_byte_post_inc(transport)?;
        let hi = read_byte_post_inc(transport)?;
        image.write_code(index, &[lo, hi])?;
        progress.update(index + 2);
    }
    progress.finish();

    log::debug!("Read {} code bytes at 0x{:06X}", size, offset);
    Ok(image)
}

/// Read every configuration byte of the device into `image`
///
/// Each byte read is marked valid.
pub fn read_config_into<T: IcspTransport + ?Sized>(
    transport: &mut T,
    device: &Device,
    image: &mut Image,
) -> Result<()> {
    tblptr_set(transport, device.config_address())?;
    for offset in 0..device.config_bytes() as usize {
        let byte = read_byte_post_inc(transport)?;
        image.set_config(offset, byte)?;
    }
    Ok(())
}

/// Compare a source image against one read back from the device
///
/// Compares the word-rounded code contents of `source` and every
/// configuration byte `source` populates within the device's config region.
/// Only the outcome and the number of compared bytes are reported.
pub fn compare_images(device: &Device, source: &Image, readback: &Image) -> Result<VerifyStats> {
    let code_len = source.word_count() * 2;
    let mut stats = VerifyStats::default();
    let mut matches = true;

    let expected = source.code().get(..code_len);
    let actual = readback.code().get(..code_len);
    match (expected, actual) {
        (Some(expected), Some(actual)) => matches &= expected == actual,
        _ => matches = false,
    }
    stats.code_bytes = code_len;

    for offset in source.config_valid().iter() {
        if offset >= device.config_bytes() as usize {
            continue;
        }
        matches &= source.config_byte(offset) == readback.config_byte(offset);
        stats.config_bytes += 1;
    }

    if matches {
        Ok(stats)
    } else {
        Err(Error::VerifyFailed {
            bytes_compared: stats.bytes_compared(),
        })
    }
}
