//! Flash and verify workflow
//!
//! Programs an image block-by-block: compare first and skip matching
//! sectors (idempotence, and the chip has finite erase endurance), erase
//! and reprogram the rest. Verification is a separate full re-read pass so
//! a transient glitch during the write loop cannot mask itself.

use crate::bus::{IrqGuard, MemoryBus};
use crate::error::{Error, Result};
use crate::image::RomImage;
use crate::plan::WindowPlan;
use crate::protocol::{self, SECTOR_SIZE};
use crate::timer::CalibratedTimeout;

/// Per-block progress callback for the programming pass.
pub trait FlashProgress {
    /// Called after each block is handled, whether programmed or skipped.
    fn block_done(&mut self, completed: usize, total: usize);
}

/// A no-op progress reporter.
pub struct NoProgress;

impl FlashProgress for NoProgress {
    fn block_done(&mut self, _completed: usize, _total: usize) {}
}

/// Program every image block that differs from the device.
///
/// The whole pass runs in one critical section; the interrupt mask is
/// restored on every return path, including timeouts. Returns the number
/// of blocks written; zero means the device already matched. On
/// [`Error::EraseTimeout`] or [`Error::ProgramTimeout`] the device
/// contents are indeterminate and only a retry after reboot can help.
pub fn flash_rom<B: MemoryBus + ?Sized, P: FlashProgress + ?Sized>(
    bus: &mut B,
    plan: &WindowPlan,
    image: &RomImage,
    timeout: CalibratedTimeout,
    progress: &mut P,
) -> Result<usize> {
    let mut bus = IrqGuard::new(bus);
    let total = image.blocks().len();
    let mut flashed = 0;

    for (index, block) in image.blocks().iter().enumerate() {
        let dest = block_addr(plan, index);

        if sector_matches(&mut *bus, dest, block) {
            progress.block_done(index + 1, total);
            continue;
        }

        protocol::erase_sector(&mut *bus, plan.seq_seg, dest, timeout)?;
        protocol::program_sector(&mut *bus, plan.seq_seg, dest, block, timeout)?;

        flashed += 1;
        log::debug!("programmed block {} of {} at {:05X}", index + 1, total, dest);
        progress.block_done(index + 1, total);
    }

    Ok(flashed)
}

/// Re-read the destination range and compare byte-for-byte.
pub fn verify_rom<B: MemoryBus + ?Sized>(
    bus: &mut B,
    plan: &WindowPlan,
    image: &RomImage,
) -> Result<()> {
    for (index, block) in image.blocks().iter().enumerate() {
        if !sector_matches(bus, block_addr(plan, index), block) {
            return Err(Error::VerifyFailed);
        }
    }
    Ok(())
}

fn block_addr(plan: &WindowPlan, index: usize) -> u32 {
    ((plan.dest_seg as u32) << 4) + (index * SECTOR_SIZE) as u32
}

fn sector_matches<B: MemoryBus + ?Sized>(
    bus: &mut B,
    dest: u32,
    block: &[u8; SECTOR_SIZE],
) -> bool {
    for (i, &byte) in block.iter().enumerate() {
        if bus.read8(dest + i as u32) != byte {
            return false;
        }
    }
    true
}
