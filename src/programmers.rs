//! Programmer registration and dispatch
//!
//! Two backends: the real hardware bus over /dev/mem, and the in-memory
//! device model for dry runs and development. Both sit behind
//! `dyn MemoryBus`, so the workflow code never knows which one it got.

use sstflash_core::bus::{MemoryBus, LOW_MEM_SIZE};
use sstflash_core::plan::WINDOW_SIZE;
use sstflash_dummy::{DummyBus, DummyConfig};
use sstflash_internal::LowMemBus;

/// Available programmer backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Programmer {
    /// Memory-mapped hardware via /dev/mem; requires root.
    Internal,
    /// In-memory SST39SF020 model; nothing is written to hardware.
    Dummy,
}

impl Programmer {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "internal" => Some(Self::Internal),
            "dummy" => Some(Self::Dummy),
            _ => None,
        }
    }
}

/// Open the selected programmer and run `f` against it.
pub fn with_programmer<R>(
    kind: Programmer,
    dest_seg: u16,
    f: impl FnOnce(&mut dyn MemoryBus) -> R,
) -> Result<R, Box<dyn std::error::Error>> {
    match kind {
        Programmer::Internal => {
            let mut bus = LowMemBus::open()?;
            Ok(f(&mut bus))
        }
        Programmer::Dummy => {
            let mut bus = DummyBus::new(dummy_config_for(dest_seg));
            Ok(f(&mut bus))
        }
    }
}

/// Size the modeled device so it covers both the destination range and
/// whichever command window the planner picks for it.
fn dummy_config_for(dest_seg: u16) -> DummyConfig {
    let device_base = ((dest_seg as u32) << 4) & !(WINDOW_SIZE - 1);
    let device_size = (LOW_MEM_SIZE - device_base).min(0x40000);
    DummyConfig {
        device_base,
        device_size,
        ..DummyConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_backends() {
        assert_eq!(Programmer::parse("internal"), Some(Programmer::Internal));
        assert_eq!(Programmer::parse("dummy"), Some(Programmer::Dummy));
        assert_eq!(Programmer::parse("serprog"), None);
    }

    #[test]
    fn dummy_device_covers_the_window_and_destination() {
        let config = dummy_config_for(0xC800);
        assert_eq!(config.device_base, 0xC0000);
        assert!(config.device_base + config.device_size >= 0xD0000);

        // Top of the address space: device must not extend past 1 MiB.
        let config = dummy_config_for(0xF800);
        assert_eq!(config.device_base, 0xF8000);
        assert_eq!(config.device_base + config.device_size, LOW_MEM_SIZE);
    }
}
