/* src/lib.rs */

pub mod error;
pub mod mover;
pub mod setup;

pub use error::{Error, Result};
pub use mover::controller::{RamDiskTransfer, ShutdownReport, StopHandle};
