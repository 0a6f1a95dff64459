//! Transport trait definitions

use super::command::{CommandOnly, IcspCommand};
use crate::error::Result;

/// ICSP transport (the electrical layer behind a device handle)
///
/// This trait represents a programmer that can clock ICSP transfers into a
/// PIC18 target. Implementations return [`Error::TransportFailure`] when the
/// underlying driver rejects a transfer or the link is lost; the engine never
/// retries a failed transfer.
///
/// All calls block until the transfer (and any hold time it carries) has
/// completed.
///
/// ## Example
///
/// ```ignore
/// impl IcspTransport for MyDriver {
///     fn transmit(&mut self, command: IcspCommand, data: u16) -> Result<()> {
///         self.ioctl_tx(command.bits(), data).map_err(|_| Error::TransportFailure)
///     }
///     // ...
/// }
/// ```
///
/// [`Error::TransportFailure`]: crate::error::Error::TransportFailure
pub trait IcspTransport {
    /// Send a 4-bit command followed by a 16-bit data payload
    fn transmit(&mut self, command: IcspCommand, data: u16) -> Result<()>;

    /// Send a 4-bit command and read back 8 bits
    fn receive(&mut self, command: IcspCommand) -> Result<u8>;

    /// Send only a 4-bit command, then hold the lines as described
    fn command_only(&mut self, op: &CommandOnly) -> Result<()>;

    /// Clock out a data phase without a preceding command
    fn data_only(&mut self, data: u32) -> Result<()>;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32) -> Result<()>;
}

impl<T: IcspTransport + ?Sized> IcspTransport for alloc::boxed::Box<T> {
    fn transmit(&mut self, command: IcspCommand, data: u16) -> Result<()> {
        (**self).transmit(command, data)
    }

    fn receive(&mut self, command: IcspCommand) -> Result<u8> {
        (**self).receive(command)
    }

    fn command_only(&mut self, op: &CommandOnly) -> Result<()> {
        (**self).command_only(op)
    }

    fn data_only(&mut self, data: u32) -> Result<()> {
        (**self).data_only(data)
    }

    fn delay_us(&mut self, us: u32) -> Result<()> {
        (**self).delay_us(us)
    }
}

impl<T: IcspTransport + ?Sized> IcspTransport for &mut T {
    fn transmit(&mut self, command: IcspCommand, data: u16) -> Result<()> {
        (**self).transmit(command, data)
    }

    fn receive(&mut self, command: IcspCommand) -> Result<u8> {
        (**self).receive(command)
    }

    fn command_only(&mut self, op: &CommandOnly) -> Result<()> {
        (**self).command_only(op)
    }

    fn data_only(&mut self, data: u32) -> Result<()> {
        (**self).data_only(data)
    }

    fn delay_us(&mut self, us: u32) -> Result<()> {
        (**self).delay_us(us)
    }
}
