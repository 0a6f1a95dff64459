//! Programming session context

use alloc::boxed::Box;
use core::fmt;

use crate::device::{self, Device, DeviceFamily};
use crate::error::{Error, Result};
use crate::icsp::IcspTransport;
use crate::image::Image;

use super::operations::{
    check_code_range, compare_images, read_code, read_config_into, VerifyStats,
};
use super::progress::{Operation, ProgressSink, ProgressTracker};

/// Extra settle after a family bulk erase has completed
pub const BULK_ERASE_EXTRA_SETTLE_US: u32 = 20;

/// How code memory is erased before programming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EraseMode {
    /// Erase the whole part in one pulse
    #[default]
    Bulk,
    /// Erase code memory page by page
    Pages,
}

impl fmt::Display for EraseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bulk => write!(f, "bulk"),
            Self::Pages => write!(f, "page-wise"),
        }
    }
}

/// A programming session
///
/// The context owns the transport for its whole lifetime, so at most one
/// context drives a given programmer. A device must be identified with
/// [`identify`](Self::identify) before any memory operation; until then
/// those operations fail with [`Error::NoDevice`].
pub struct Context<T: IcspTransport> {
    transport: T,
    family: DeviceFamily,
    device: Option<Device>,
    progress: Option<Box<dyn ProgressSink>>,
}

fn tracker<'a>(
    sink: &'a mut Option<Box<dyn ProgressSink>>,
    operation: Operation,
    total: usize,
) -> ProgressTracker<'a> {
    let sink: Option<&'a mut dyn ProgressSink> = match sink {
        Some(sink) => Some(sink.as_mut()),
        None => None,
    };
    ProgressTracker::new(sink, operation, total)
}

impl<T: IcspTransport> Context<T> {
    /// Create a context for `family` on top of an open transport
    pub fn new(transport: T, family: DeviceFamily) -> Self {
        Self {
            transport,
            family,
            device: None,
            progress: None,
        }
    }

    /// Attach a progress sink
    pub fn with_progress(mut self, sink: Box<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Replace (or remove) the progress sink
    pub fn set_progress(&mut self, sink: Option<Box<dyn ProgressSink>>) {
        self.progress = sink;
    }

    /// Device family this context identifies
    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    /// Borrow the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Tear down the context and return the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Read the raw device ID word without binding a device
    pub fn device_id(&mut self) -> Result<u16> {
        crate::protocol::read_device_id(&mut self.transport)
    }

    /// Identify the attached part and bind its family table
    ///
    /// On failure the context is left without a device.
    pub fn identify(&mut self) -> Result<Device> {
        self.device = None;
        let device = device::identify_and_bind(&mut self.transport, self.family)?;
        self.device = Some(device);
        Ok(device)
    }

    /// The identified device
    pub fn device(&self) -> Result<Device> {
        self.device.ok_or(Error::NoDevice)
    }

    /// Erase the whole part
    pub fn bulk_erase(&mut self) -> Result<()> {
        let device = self.device()?;
        log::debug!("Bulk erasing {}", device.name());
        device.ops().bulk_erase(&mut self.transport)?;
        self.transport.delay_us(BULK_ERASE_EXTRA_SETTLE_US)
    }

    /// Erase code memory page by page
    pub fn non_bulk_erase(&mut self) -> Result<()> {
        let device = self.device()?;
        let geometry = device.geometry();
        log::debug!(
            "Erasing {} pages of {} bytes",
            geometry.code_memory_size / geometry.code_erase_page_size.max(1),
            geometry.code_erase_page_size
        );
        let mut progress = tracker(
            &mut self.progress,
            Operation::Erase,
            geometry.code_memory_size as usize,
        )
        .with_granularity(geometry.code_erase_page_size as usize);
        device
            .ops()
            .non_bulk_erase(&mut self.transport, geometry, &mut progress)
    }

    /// Erase using the given mode
    pub fn erase(&mut self, mode: EraseMode) -> Result<()> {
        match mode {
            EraseMode::Bulk => self.bulk_erase(),
            EraseMode::Pages => self.non_bulk_erase(),
        }
    }

    /// Program the code contents of `image`
    ///
    /// The target range must already be erased.
    pub fn program_code(&mut self, image: &Image) -> Result<()> {
        let device = self.device()?;
        check_code_range(&device, image.origin(), image.word_count() * 2)?;
        let mut progress = tracker(&mut self.progress, Operation::Program, image.contents_size());
        device
            .ops()
            .program_code(&mut self.transport, device.geometry(), image, &mut progress)
    }

    /// Program the populated configuration bytes of `image`
    pub fn program_config(&mut self, image: &Image) -> Result<()> {
        let device = self.device()?;
        device
            .ops()
            .program_config(&mut self.transport, device.geometry(), image)
    }

    /// Write the EEPROM contents of `image`
    pub fn program_eeprom(&mut self, image: &Image) -> Result<()> {
        let device = self.device()?;
        let mut progress = tracker(
            &mut self.progress,
            Operation::EepromWrite,
            image.eeprom().len(),
        );
        device
            .ops()
            .write_eeprom_from(&mut self.transport, device.geometry(), image, &mut progress)
    }

    /// Read `size` code bytes at `offset` (zero size reads to the end)
    pub fn read_code(&mut self, offset: u32, size: usize) -> Result<Image> {
        let device = self.device()?;
        let total = match size {
            0 => device.code_memory_size().saturating_sub(offset) as usize,
            n => n,
        };
        let mut progress = tracker(&mut self.progress, Operation::Read, total);
        read_code(&mut self.transport, &device, offset, size, &mut progress)
    }

    /// Read every configuration byte into `image`
    pub fn read_config_into(&mut self, image: &mut Image) -> Result<()> {
        let device = self.device()?;
        read_config_into(&mut self.transport, &device, image)
    }

    /// Read the data EEPROM into `image`
    pub fn read_eeprom_into(&mut self, image: &mut Image) -> Result<()> {
        let device = self.device()?;
        let mut progress = tracker(
            &mut self.progress,
            Operation::EepromRead,
            device.eeprom_bytes() as usize,
        );
        device
            .ops()
            .read_eeprom_into(&mut self.transport, device.geometry(), image, &mut progress)
    }

    /// Read the device into a new image
    ///
    /// Reads code (see [`read_code`](Self::read_code)), then every
    /// configuration byte, then the EEPROM if `eeprom` is set.
    pub fn read_device(&mut self, offset: u32, size: usize, eeprom: bool) -> Result<Image> {
        let mut image = self.read_code(offset, size)?;
        self.read_config_into(&mut image)?;
        if eeprom {
            self.read_eeprom_into(&mut image)?;
        }
        Ok(image)
    }

    /// Erase the device, then program the code and configuration of `image`
    ///
    /// Nothing is rolled back on failure: an aborted write leaves the
    /// device in an indeterminate state that needs a full erase.
    pub fn write_device(&mut self, image: &Image, mode: EraseMode) -> Result<()> {
        let device = self.device()?;
        check_code_range(&device, image.origin(), image.word_count() * 2)?;

        log::debug!("Erasing ({})", mode);
        self.erase(mode)?;
        log::debug!("Programming {} code bytes", image.contents_size());
        self.program_code(image)?;
        log::debug!(
            "Programming {} configuration bytes",
            image.config_valid().count()
        );
        self.program_config(image)
    }

    /// Read back the region `source` covers and compare it byte for byte
    pub fn verify(&mut self, source: &Image) -> Result<VerifyStats> {
        let device = self.device()?;
        let code_len = source.word_count() * 2;
        let mut readback = match code_len {
            0 => Image::with_origin(0, source.origin()),
            len => self.read_code(source.origin(), len)?,
        };
        if !source.config_valid().is_empty() {
            self.read_config_into(&mut readback)?;
        }
        let stats = compare_images(&device, source, &readback)?;
        log::debug!("Verified {} bytes", stats.bytes_compared());
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, Transfer};
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    /// Sink sharing its reports with the test
    struct SharedRecorder(Rc<RefCell<Vec<(Operation, usize, usize)>>>);

    impl ProgressSink for SharedRecorder {
        fn report(&mut self, operation: Operation, done: usize, total: usize) {
            self.0.borrow_mut().push((operation, done, total));
        }
    }

    fn context_with_id(id: u16) -> Context<MockTransport> {
        let mut mock = MockTransport::new();
        mock.set_byte(0x3F_FFFE, id as u8);
        mock.set_byte(0x3F_FFFF, (id >> 8) as u8);
        Context::new(mock, DeviceFamily::Pic18F)
    }

    #[test]
    fn test_operations_refuse_without_device() {
        let mut ctx = context_with_id(0x2004);
        let image = Image::new(4);
        assert_eq!(ctx.bulk_erase(), Err(Error::NoDevice));
        assert_eq!(ctx.write_device(&image, EraseMode::Bulk), Err(Error::NoDevice));
        assert_eq!(ctx.read_code(0, 2), Err(Error::NoDevice));
        assert!(ctx.transport().transfers().is_empty());
    }

    #[test]
    fn test_failed_identification_unbinds() {
        let mut ctx = context_with_id(0x2004);
        ctx.identify().unwrap();
        ctx.transport_mut().set_byte(0x3F_FFFE, 0x99);
        assert_eq!(ctx.identify().unwrap_err(), Error::UnsupportedDevice(0x2099));
        assert_eq!(ctx.device().unwrap_err(), Error::NoDevice);
    }

    #[test]
    fn test_identify_binds_pic18f452() {
        let mut ctx = context_with_id(0x2004);
        let device = ctx.identify().unwrap();
        assert_eq!(device.ops().family_name(), "18F2xx/4xx");
        assert_eq!(device.name(), "PIC18F452");
        assert_eq!(device.code_memory_size(), 32768);
        assert_eq!(device.code_erase_page_size(), 64);
        assert_eq!(device.code_words_per_write(), 4);
    }

    #[test]
    fn test_bulk_erase_adds_settle() {
        let mut ctx = context_with_id(0x2004);
        ctx.identify().unwrap();
        ctx.bulk_erase().unwrap();
        let transfers = ctx.transport().transfers();
        assert_eq!(
            transfers[transfers.len() - 2..],
            [Transfer::Delay(50), Transfer::Delay(20)]
        );
    }

    #[test]
    fn test_bulk_erase_failure_reported() {
        let mut ctx = context_with_id(0x2004);
        ctx.identify().unwrap();
        *ctx.transport_mut() = MockTransport::new().failing_at(0);
        assert_eq!(ctx.bulk_erase(), Err(Error::TransportFailure));
        assert_eq!(ctx.transport().command_only_count(), 0);
    }

    #[test]
    fn test_page_erase_reports_every_page() {
        let reports = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = context_with_id(0x2004)
            .with_progress(Box::new(SharedRecorder(Rc::clone(&reports))));
        ctx.identify().unwrap();
        ctx.non_bulk_erase().unwrap();

        let reports = reports.borrow();
        assert_eq!(reports.len(), 32 * 1024 / 64 + 1);
        for (page, &(operation, done, total)) in reports.iter().enumerate() {
            assert_eq!(operation, Operation::Erase);
            assert_eq!(done, page * 64);
            assert_eq!(total, 32 * 1024);
        }
    }

    #[test]
    fn test_write_then_verify() {
        let mut ctx = context_with_id(0x2004);
        ctx.identify().unwrap();

        let mut image = Image::new(1024);
        let data: Vec<u8> = (0..100u8).map(|b| b.wrapping_mul(7)).collect();
        image.write_code(0, &data).unwrap();

        ctx.program_code(&image).unwrap();
        let stats = ctx.verify(&image).unwrap();
        assert_eq!(stats.bytes_compared(), image.contents_size());
        assert_eq!(stats.config_bytes, 0);

        // An odd length is compared up to the end of its last word
        let mut odd = Image::with_origin(16, 0x200);
        odd.write_code(0, &[0xA1, 0xB2, 0xC3]).unwrap();
        ctx.program_code(&odd).unwrap();
        let stats = ctx.verify(&odd).unwrap();
        assert_eq!(odd.contents_size(), 3);
        assert_eq!(stats.code_bytes, 4);
        assert_eq!(ctx.transport().byte(0x203), 0xFF);
    }

    #[test]
    fn test_verify_reports_mismatch() {
        let mut ctx = context_with_id(0x2004);
        ctx.identify().unwrap();

        let mut image = Image::new(16);
        image.write_code(0, &[1, 2, 3, 4]).unwrap();
        ctx.program_code(&image).unwrap();
        ctx.transport_mut().set_byte(3, 0x00);

        assert_eq!(
            ctx.verify(&image),
            Err(Error::VerifyFailed { bytes_compared: 4 })
        );
    }

    #[test]
    fn test_write_rejects_oversized_image() {
        let mut ctx = context_with_id(0x2004);
        ctx.identify().unwrap();
        let before = ctx.transport().transfers().len();

        let mut image = Image::new(64 * 1024);
        image.write_code(0x8000, &[0]).unwrap();
        assert!(matches!(
            ctx.write_device(&image, EraseMode::Bulk),
            Err(Error::InsufficientCapacity { .. })
        ));
        assert_eq!(ctx.transport().transfers().len(), before);
    }

    #[test]
    fn test_read_device_includes_config() {
        let mut ctx = context_with_id(0x2004);
        ctx.identify().unwrap();
        ctx.transport_mut().set_byte(0x30_0005, 0x81);

        let image = ctx.read_device(0, 64, false).unwrap();
        assert_eq!(image.contents_size(), 64);
        assert_eq!(image.config_valid().count(), 14);
        assert_eq!(image.config_byte(5), Some(0x81));
        assert!(image.eeprom().is_empty());
    }
}
