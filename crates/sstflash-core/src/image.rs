//! ROM image loading
//!
//! Programming proceeds in 4 KiB sectors because that is the device's
//! erase granularity, but option-ROM files historically come in 2 KiB
//! granules. The loader buckets the file into fully initialized 4 KiB
//! blocks, zero-padding the tail, and optionally truncates or zero-extends
//! to an explicit size override. Zero is the pad value because tail bytes
//! hold code that is never reached.

use crate::error::{Error, Result};
use crate::protocol::SECTOR_SIZE;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Cap on the programmed image: 64 blocks = 256 KiB.
pub const MAX_BLOCKS: usize = 64;

/// Option-ROM length granule; image files must be a multiple of this.
pub const ROM_GRANULE: u32 = 2048;

/// A ROM image conditioned for block-aligned programming.
///
/// Invariants: every block is fully initialized (zero-padded past the file
/// data), there are at most [`MAX_BLOCKS`] blocks, and the original file
/// length is a non-zero multiple of [`ROM_GRANULE`].
pub struct RomImage {
    blocks: Vec<[u8; SECTOR_SIZE]>,
    orig_len: u32,
}

impl RomImage {
    /// Load an image file, honoring an optional size override in KiB.
    ///
    /// Without an override the file must fit in 256 KiB. With one, the
    /// image is truncated or zero-extended to exactly the override, which
    /// may be smaller or larger than the file.
    pub fn load(path: &Path, size_override_kib: Option<u16>) -> Result<Self> {
        let file = File::open(path).map_err(Error::ImageOpen)?;
        Self::from_reader(file, size_override_kib)
    }

    /// Load an image from any reader; see [`RomImage::load`].
    pub fn from_reader<R: Read>(mut reader: R, size_override_kib: Option<u16>) -> Result<Self> {
        let limit = match size_override_kib {
            Some(kib) => kib as usize * 1024,
            None => MAX_BLOCKS * SECTOR_SIZE,
        };

        let mut blocks = Vec::new();
        let mut orig_len = 0usize;
        let mut remaining = limit;

        while remaining > 0 {
            let want = remaining.min(SECTOR_SIZE);
            let mut block = [0u8; SECTOR_SIZE];
            let got = read_up_to(&mut reader, &mut block[..want]).map_err(Error::ImageRead)?;
            if got == 0 {
                break;
            }

            blocks.push(block);
            orig_len += got;
            remaining -= want;

            if got < want {
                break;
            }
        }

        // Without an override the limit is the hard cap; anything left in
        // the file past it is an oversized image, not silent truncation.
        if size_override_kib.is_none() && remaining == 0 {
            let mut probe = [0u8; 1];
            if read_up_to(&mut reader, &mut probe).map_err(Error::ImageRead)? != 0 {
                return Err(Error::ImageTooLarge);
            }
        }

        // Zero-extend up to an explicit override.
        if size_override_kib.is_some() {
            while blocks.len() * SECTOR_SIZE < limit {
                blocks.push([0u8; SECTOR_SIZE]);
            }
        }

        if orig_len == 0 {
            return Err(Error::ImageEmpty);
        }
        if orig_len as u32 % ROM_GRANULE != 0 {
            return Err(Error::ImageAlignment);
        }

        Ok(Self {
            blocks,
            orig_len: orig_len as u32,
        })
    }

    /// The 4 KiB blocks to program, in destination order.
    pub fn blocks(&self) -> &[[u8; SECTOR_SIZE]] {
        &self.blocks
    }

    /// Bytes actually read from the image file.
    pub fn orig_len(&self) -> u32 {
        self.orig_len
    }

    /// Length that will be programmed: blocks x 4096.
    pub fn programmed_len(&self) -> u32 {
        (self.blocks.len() * SECTOR_SIZE) as u32
    }

    /// Whether the programmed range extends past the file data. Callers
    /// report this to the user; it is not an error.
    pub fn is_padded(&self) -> bool {
        self.orig_len < self.programmed_len()
    }
}

/// Read until `buf` is full or EOF; returns the byte count.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn six_kib_file_pads_the_tail_block() {
        let data = bytes(6144);
        let image = RomImage::from_reader(Cursor::new(&data), None).unwrap();

        assert_eq!(image.blocks().len(), 2);
        assert_eq!(image.orig_len(), 6144);
        assert_eq!(image.programmed_len(), 8192);
        assert!(image.is_padded());

        assert_eq!(&image.blocks()[0][..], &data[..4096]);
        assert_eq!(&image.blocks()[1][..2048], &data[4096..]);
        assert!(image.blocks()[1][2048..].iter().all(|&b| b == 0));
    }

    #[test]
    fn exact_multiple_is_not_padded() {
        let image = RomImage::from_reader(Cursor::new(bytes(8192)), None).unwrap();
        assert_eq!(image.blocks().len(), 2);
        assert!(!image.is_padded());
    }

    #[test]
    fn size_override_zero_extends() {
        let data = bytes(10 * 1024);
        let image = RomImage::from_reader(Cursor::new(&data), Some(32)).unwrap();

        assert_eq!(image.blocks().len(), 8);
        assert_eq!(image.orig_len(), 10 * 1024);
        assert_eq!(image.programmed_len(), 32 * 1024);

        assert_eq!(&image.blocks()[2][..2048], &data[8192..]);
        assert!(image.blocks()[2][2048..].iter().all(|&b| b == 0));
        for block in &image.blocks()[3..] {
            assert!(block.iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn size_override_truncates_a_larger_file() {
        let image = RomImage::from_reader(Cursor::new(bytes(10 * 1024)), Some(2)).unwrap();
        assert_eq!(image.orig_len(), 2048);
        // Still programs a whole sector.
        assert_eq!(image.programmed_len(), 4096);
    }

    #[test]
    fn empty_file_is_rejected() {
        let err = RomImage::from_reader(Cursor::new(Vec::new()), None);
        assert!(matches!(err, Err(Error::ImageEmpty)));
    }

    #[test]
    fn odd_length_is_rejected() {
        let err = RomImage::from_reader(Cursor::new(bytes(3000)), None);
        assert!(matches!(err, Err(Error::ImageAlignment)));
    }

    #[test]
    fn oversized_file_is_rejected_without_override() {
        let err = RomImage::from_reader(Cursor::new(bytes(256 * 1024 + 2048)), None);
        assert!(matches!(err, Err(Error::ImageTooLarge)));
    }

    #[test]
    fn max_size_file_loads_fully() {
        let image = RomImage::from_reader(Cursor::new(bytes(256 * 1024)), None).unwrap();
        assert_eq!(image.blocks().len(), MAX_BLOCKS);
        assert!(!image.is_padded());
    }
}
