//! Session context and high-level programming flows
//!
//! This module provides the [`Context`] that owns a transport and the
//! identified device, the read/verify building blocks it composes, and
//! progress reporting.

mod context;
mod operations;
mod progress;

pub use context::{Context, EraseMode, BULK_ERASE_EXTRA_SETTLE_US};
pub use operations::*;
pub use progress::*;
