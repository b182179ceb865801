//! SST39SF0x0 software command protocol
//!
//! Every command is a three-write unlock prefix into the 32 KiB command
//! window (0x5555 then 0x2AAA, then the command byte back at 0x5555)
//! followed by a command-specific access, with bounded polling for
//! completion. The device returns complemented data while an erase or
//! program is in flight, so polling for the expected value doubles as the
//! completion check.
//!
//! Sequences must run with interrupts masked: an unrelated handler that
//! reads the same chip mid-sequence leaves the device in an undefined
//! state. [`software_id`] takes its own [`IrqGuard`]; erase and program
//! run inside the guard the flash workflow already holds.

use crate::bus::{segment_addr, IrqGuard, MemoryBus};
use crate::chip::DeviceId;
use crate::error::{Error, Result};
use crate::timer::{CalibratedTimeout, ERASE_TIMEOUT_UNITS};

/// First and third unlock write, relative to the command window.
pub const UNLOCK1_OFFSET: u16 = 0x5555;
/// Second unlock write, relative to the command window.
pub const UNLOCK2_OFFSET: u16 = 0x2AAA;

/// Flash sector size, the smallest unit the device can erase.
pub const SECTOR_SIZE: usize = 4096;

/// Value every byte of an erased sector reads back as.
pub const ERASED: u8 = 0xFF;

const UNLOCK1: u8 = 0xAA;
const UNLOCK2: u8 = 0x55;
const CMD_SOFTWARE_ID_ENTRY: u8 = 0x90;
const CMD_SOFTWARE_ID_EXIT: u8 = 0xF0;
const CMD_ERASE_SETUP: u8 = 0x80;
const CMD_SECTOR_ERASE: u8 = 0x30;
const CMD_BYTE_PROGRAM: u8 = 0xA0;

/// Poll `addr` until it reads `value`, giving up after `iterations` reads.
///
/// Returns within `iterations` polls regardless of device behavior; one
/// call with the calibrated loop count burns roughly 215 us against the
/// destination.
pub fn wait_for_value<B: MemoryBus + ?Sized>(
    bus: &mut B,
    addr: u32,
    value: u8,
    iterations: u16,
) -> bool {
    for _ in 0..iterations {
        if bus.read8(addr) == value {
            return true;
        }
    }
    false
}

/// Write the three-byte unlock prefix ending in `command`.
fn unlock<B: MemoryBus + ?Sized>(bus: &mut B, seq_seg: u16, command: u8) {
    bus.write8(segment_addr(seq_seg, UNLOCK1_OFFSET), UNLOCK1);
    bus.write8(segment_addr(seq_seg, UNLOCK2_OFFSET), UNLOCK2);
    bus.write8(segment_addr(seq_seg, UNLOCK1_OFFSET), command);
}

/// Read the software ID: vendor at dest:0, device at dest:1.
///
/// Non-destructive; this is the probe that gates everything else. Runs
/// under its own interrupt guard.
pub fn software_id<B: MemoryBus + ?Sized>(bus: &mut B, seq_seg: u16, dest_seg: u16) -> DeviceId {
    let mut bus = IrqGuard::new(bus);
    let dest = segment_addr(dest_seg, 0);

    unlock(&mut *bus, seq_seg, CMD_SOFTWARE_ID_ENTRY);

    // Devices have been observed to return stale data on the first reads
    // after the ID command; give the bus time to settle.
    for _ in 0..3 {
        let _ = bus.read8(dest);
    }

    let vendor = bus.read8(dest);
    let device = bus.read8(dest + 1);

    bus.write8(segment_addr(seq_seg, UNLOCK1_OFFSET), CMD_SOFTWARE_ID_EXIT);

    DeviceId { vendor, device }
}

/// Erase the 4 KiB sector at physical address `dest`.
///
/// Polls dest:0 for the erased value, bounded at
/// [`ERASE_TIMEOUT_UNITS`] x ~215 us (~250 ms). The caller must hold the
/// interrupt guard for the surrounding operation.
pub fn erase_sector<B: MemoryBus + ?Sized>(
    bus: &mut B,
    seq_seg: u16,
    dest: u32,
    timeout: CalibratedTimeout,
) -> Result<()> {
    unlock(bus, seq_seg, CMD_ERASE_SETUP);
    bus.write8(segment_addr(seq_seg, UNLOCK1_OFFSET), UNLOCK1);
    bus.write8(segment_addr(seq_seg, UNLOCK2_OFFSET), UNLOCK2);
    bus.write8(dest, CMD_SECTOR_ERASE);

    for _ in 0..ERASE_TIMEOUT_UNITS {
        if wait_for_value(bus, dest, ERASED, timeout.loops()) {
            return Ok(());
        }
    }

    Err(Error::EraseTimeout)
}

/// Program one full sector byte-by-byte from `data`.
///
/// The destination sector must already be erased; programming can only
/// clear bits. Each byte gets its own unlock prefix and a ~215 us poll
/// (ten times the datasheet's 20 us maximum). The caller holds the
/// interrupt guard.
pub fn program_sector<B: MemoryBus + ?Sized>(
    bus: &mut B,
    seq_seg: u16,
    dest: u32,
    data: &[u8; SECTOR_SIZE],
    timeout: CalibratedTimeout,
) -> Result<()> {
    for (i, &byte) in data.iter().enumerate() {
        unlock(bus, seq_seg, CMD_BYTE_PROGRAM);

        let addr = dest + i as u32;
        bus.write8(addr, byte);

        if !wait_for_value(bus, addr, byte, timeout.loops()) {
            return Err(Error::ProgramTimeout);
        }
    }

    Ok(())
}
