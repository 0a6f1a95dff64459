//! picprog-core - Core engine for PIC18F in-circuit serial programming
//!
//! This crate provides the functionality for erasing, programming, reading
//! and verifying the non-volatile memories of Microchip PIC18F parts over
//! ICSP. The electrical layer is not implemented here: it is reached through
//! the [`icsp::IcspTransport`] trait, which every programmer backend
//! implements.
//!
//! # Layers
//!
//! - [`icsp`] - ICSP command vocabulary, the transport trait and the
//!   diagnostic command log
//! - [`protocol`] - PIC18 instruction execution (table pointer, table
//!   reads/writes, post-program timing)
//! - [`device`] - device identification and per-family capability tables
//! - [`image`] - in-memory firmware image (code, config, EEPROM)
//! - [`flash`] - session context and the read/write/verify flows
//!
//! # Features
//!
//! - `std` - Enable standard library support (Intel HEX files, `std::error::Error`)
//!
//! # Example
//!
//! ```ignore
//! use picprog_core::device::DeviceFamily;
//! use picprog_core::flash::{Context, EraseMode};
//!
//! let mut ctx = Context::new(transport, DeviceFamily::Pic18F);
//! let device = ctx.identify()?;
//! println!("Found: {} ({} bytes)", device.name(), device.code_memory_size());
//! ctx.write_device(&image, EraseMode::Bulk)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod device;
pub mod error;
pub mod flash;
pub mod icsp;
pub mod image;
pub mod protocol;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
