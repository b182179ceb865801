//! SST39SF0x0 device identification
//!
//! The supported parts share one command set and one 4 KiB sector size;
//! only the capacity differs, and capacity never matters to the engine
//! because the image length bounds every loop. Identification exists to
//! refuse to drive anything that is not an SST39SF0x0.

/// Software ID pair read from the device (dest:0, dest:1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId {
    /// Vendor byte; SST parts report [`SST_MANUFACTURER`].
    pub vendor: u8,
    /// Device byte selecting the part within the family.
    pub device: u8,
}

/// JEDEC manufacturer ID for SST.
pub const SST_MANUFACTURER: u8 = 0xBF;

const SUPPORTED: &[(u8, &str)] = &[
    (0xB4, "SST39SF512"),
    (0xB5, "SST39SF010"),
    (0xB6, "SST39SF020"),
    (0xB7, "SST39SF040"),
];

impl DeviceId {
    /// Part name for a recognized ID, `None` for anything else.
    pub fn name(self) -> Option<&'static str> {
        if self.vendor != SST_MANUFACTURER {
            return None;
        }
        SUPPORTED
            .iter()
            .find(|(device, _)| *device == self.device)
            .map(|(_, name)| *name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_the_sst39sf_family() {
        let id = |vendor, device| DeviceId { vendor, device };
        assert_eq!(id(0xBF, 0xB4).name(), Some("SST39SF512"));
        assert_eq!(id(0xBF, 0xB5).name(), Some("SST39SF010"));
        assert_eq!(id(0xBF, 0xB6).name(), Some("SST39SF020"));
        assert_eq!(id(0xBF, 0xB7).name(), Some("SST39SF040"));
    }

    #[test]
    fn rejects_unknown_ids() {
        let id = |vendor, device| DeviceId { vendor, device };
        assert_eq!(id(0xBF, 0x00).name(), None);
        assert_eq!(id(0xBF, 0xB8).name(), None);
        // Right device byte under the wrong vendor is still unknown.
        assert_eq!(id(0xEF, 0xB6).name(), None);
        assert_eq!(id(0xFF, 0xFF).name(), None);
    }
}
