//! Top-level programming workflow
//!
//! Drives a full run: calibrate, plan the command window, identify the
//! device, warn about overlapping ROMs, get the user's go-ahead, program,
//! verify. Everything interactive goes through [`FlashUi`] so the same
//! controller runs under the console front end and the test harness.

use crate::bus::MemoryBus;
use crate::error::{Error, Result};
use crate::flash::{self, FlashProgress};
use crate::image::RomImage;
use crate::plan::{self, WindowPlan};
use crate::protocol;
use crate::timer::{self, CalibratedTimeout};

/// Callbacks that surface controller progress to the user interface.
pub trait FlashUi: FlashProgress {
    /// Timing calibration finished.
    fn calibrated(&mut self, timeout: CalibratedTimeout);

    /// Another ROM image was found inside the command window.
    fn overlap_warning(&mut self, plan: &WindowPlan);

    /// Present the summary and ask for a go/no-go; `false` aborts the run
    /// before anything is written.
    fn confirm(&mut self, kib: u32, device: &'static str, plan: &WindowPlan) -> bool;

    /// Programming is about to start; there is no cancellation past this
    /// point.
    fn programming_started(&mut self);
}

/// Terminal state of a run that reached the programming pass.
///
/// Errors raised before the first destructive access come back as
/// [`Error`] and are recoverable. These statuses are what is left once
/// writing has started: after a fault or a failed verify the running
/// firmware cannot be trusted, and the caller's only safe move on real
/// hardware is to halt until the user power-cycles.
#[derive(Debug)]
pub enum RunStatus {
    /// Device contents already matched the image; nothing was written.
    UpToDate,
    /// Blocks were written and the verify pass matched.
    Programmed {
        /// Number of 4 KiB blocks actually written.
        blocks: usize,
    },
    /// Erase or program timed out; device contents are indeterminate.
    Fault(Error),
    /// Programming finished but the re-read pass found a mismatch.
    VerifyFailed,
}

/// Run the full programming workflow against `bus`.
pub fn run<B: MemoryBus + ?Sized, U: FlashUi>(
    bus: &mut B,
    dest_seg: u16,
    image: &RomImage,
    ui: &mut U,
) -> Result<RunStatus> {
    let timeout = timer::calibrate(bus, dest_seg);
    ui.calibrated(timeout);
    log::debug!("calibrated timeout: {} loops per ~215us", timeout.loops());

    let plan = WindowPlan::new(dest_seg, image.programmed_len());
    log::debug!(
        "command window at {:04X} for destination {:04X}+{}K",
        plan.seq_seg,
        plan.dest_seg,
        plan.flash_len / 1024
    );

    let id = protocol::software_id(bus, plan.seq_seg, plan.dest_seg);
    let device = id.name().ok_or(Error::DeviceNotRecognized {
        vendor: id.vendor,
        device: id.device,
        dest_seg: plan.dest_seg,
        seq_seg: plan.seq_seg,
    })?;
    log::info!("detected {} ({:02X}/{:02X})", device, id.vendor, id.device);

    if plan::has_overlapping_rom(bus, &plan) {
        ui.overlap_warning(&plan);
    }

    if !ui.confirm(image.programmed_len() / 1024, device, &plan) {
        return Err(Error::Aborted);
    }

    ui.programming_started();

    let flashed = match flash::flash_rom(bus, &plan, image, timeout, ui) {
        Ok(0) => return Ok(RunStatus::UpToDate),
        Ok(n) => n,
        Err(e) => return Ok(RunStatus::Fault(e)),
    };

    match flash::verify_rom(bus, &plan, image) {
        Ok(()) => Ok(RunStatus::Programmed { blocks: flashed }),
        Err(_) => Ok(RunStatus::VerifyFailed),
    }
}
