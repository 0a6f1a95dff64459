//! Protocol implementations
//!
//! This module contains the PIC18 instruction execution layer: core
//! instruction dispatch, table pointer handling and table reads/writes on
//! top of an [`IcspTransport`](crate::icsp::IcspTransport).

mod pic18;

pub use pic18::*;
