//! sstflash-core - Programming engine for SST39SF0x0 flash ROMs
//!
//! This crate drives an SST39SF0x0-family NOR flash chip mapped into the
//! legacy 1 MiB memory window through its JEDEC-style software command
//! protocol: device identification, sector erase, and byte program, with
//! timing calibrated against the BIOS tick because the target host has no
//! other short-interval clock.
//!
//! The hardware seam is the [`bus::MemoryBus`] trait. The real
//! implementation (`sstflash-internal`) performs volatile accesses over a
//! physical mapping of low memory; the test implementation
//! (`sstflash-dummy`) models the device over a scratch buffer. Everything
//! above the trait is safe code.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bus;
pub mod chip;
pub mod controller;
pub mod error;
pub mod flash;
pub mod image;
pub mod plan;
pub mod protocol;
pub mod timer;

pub use error::{Error, Result};
