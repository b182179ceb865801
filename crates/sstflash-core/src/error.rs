//! Error types for sstflash-core

use core::fmt;
use std::io;

/// Core error type.
///
/// Every variant that can be raised before the first destructive device
/// access is recoverable: print it and exit. [`Error::EraseTimeout`] and
/// [`Error::ProgramTimeout`] are not; they surface through
/// [`RunStatus::Fault`](crate::controller::RunStatus) because the device
/// contents are indeterminate once they fire.
#[derive(Debug)]
pub enum Error {
    /// ROM image file could not be opened
    ImageOpen(io::Error),
    /// I/O failure while reading the ROM image
    ImageRead(io::Error),
    /// ROM image file is empty
    ImageEmpty,
    /// ROM image file exceeds the 256 KiB cap
    ImageTooLarge,
    /// ROM image length is not a multiple of the 2 KiB option-ROM granule
    ImageAlignment,
    /// Software ID did not match any supported SST39SF0x0 part
    DeviceNotRecognized {
        /// Vendor byte read at dest:0
        vendor: u8,
        /// Device byte read at dest:1
        device: u8,
        /// Destination segment probed
        dest_seg: u16,
        /// Command-window segment the unlock cycles were issued through
        seq_seg: u16,
    },
    /// Sector erase polling exhausted its 250 ms budget
    EraseTimeout,
    /// Byte program polling exhausted its ~215 us budget
    ProgramTimeout,
    /// Post-programming re-read found a mismatch
    VerifyFailed,
    /// User declined the confirmation prompt
    Aborted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageOpen(e) => write!(f, "unable to open ROM image file: {}", e),
            Self::ImageRead(e) => write!(f, "unable to read ROM image file: {}", e),
            Self::ImageEmpty => write!(f, "ROM image file is empty"),
            Self::ImageTooLarge => write!(f, "ROM image file exceeds max size of 256K"),
            Self::ImageAlignment => write!(f, "ROM image file must be a multiple of 2K"),
            Self::DeviceNotRecognized {
                vendor,
                device,
                dest_seg,
                seq_seg,
            } => {
                write!(
                    f,
                    "unable to detect SST39SF0x0 flash ROM at address {:04X}",
                    dest_seg
                )?;
                if seq_seg != dest_seg {
                    write!(f, " (sequence address {:04X})", seq_seg)?;
                }
                write!(f, ", software ID read {:02X}/{:02X}", vendor, device)
            }
            Self::EraseTimeout => write!(f, "timeout erasing block"),
            Self::ProgramTimeout => write!(f, "timeout programming block"),
            Self::VerifyFailed => write!(f, "flash contents do not match the image"),
            Self::Aborted => write!(f, "aborted by user"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ImageOpen(e) | Self::ImageRead(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias using the core [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_not_recognized_names_both_segments() {
        let err = Error::DeviceNotRecognized {
            vendor: 0xBF,
            device: 0x00,
            dest_seg: 0xC800,
            seq_seg: 0xC000,
        };
        let msg = err.to_string();
        assert!(msg.contains("C800"));
        assert!(msg.contains("sequence address C000"));
        assert!(msg.contains("BF/00"));
    }

    #[test]
    fn sequence_segment_elided_when_equal() {
        let err = Error::DeviceNotRecognized {
            vendor: 0x00,
            device: 0x00,
            dest_seg: 0xC800,
            seq_seg: 0xC800,
        };
        assert!(!err.to_string().contains("sequence address"));
    }
}
