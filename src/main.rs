//! sstflash - Programs SST39SF0x0 flash ROMs in place
//!
//! Reflashes an option ROM (e.g. a BIOS extension) on an SST39SF0x0-family
//! NOR flash chip mapped into the legacy upper memory area, using the
//! device's JEDEC-style software command protocol.
//!
//! # Architecture
//!
//! The engine lives in `sstflash-core` behind the `MemoryBus` trait. Two
//! programmers implement it:
//! - **internal** - volatile accesses over a /dev/mem mapping of the low
//!   1 MiB window (requires root on x86 Linux)
//! - **dummy** - an in-memory SST39SF device model, for dry runs
//!
//! After a successful flash on real hardware the firmware that launched us
//! has been overwritten, so the process busy-halts instead of returning;
//! the user power-cycles.

mod cli;
mod programmers;
mod ui;

use clap::Parser;
use cli::Cli;
use programmers::Programmer;
use sstflash_core::bus::LOW_MEM_SIZE;
use sstflash_core::controller::{self, RunStatus};
use sstflash_core::image::RomImage;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.verbose {
        0 => {}
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    println!(
        "SSTFLASH {} - Programs SST39SF0x0 Flash ROMs",
        env!("CARGO_PKG_VERSION")
    );
    println!();

    let Some(programmer) = Programmer::parse(&cli.programmer) else {
        eprintln!(
            "Error: unknown programmer '{}' (use \"internal\" or \"dummy\")",
            cli.programmer
        );
        std::process::exit(1);
    };

    let image = match RomImage::load(&cli.image, cli.size) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if image.is_padded() {
        println!(
            "{}K image will be rounded up to {}K (4K multiple) with zeros.",
            image.orig_len() / 1024,
            image.programmed_len() / 1024
        );
    }

    if ((cli.segment as u32) << 4) + image.programmed_len() > LOW_MEM_SIZE {
        eprintln!(
            "Error: a {}K image at segment {:04X} extends past the 1M boundary",
            image.programmed_len() / 1024,
            cli.segment
        );
        std::process::exit(1);
    }

    let result = programmers::with_programmer(programmer, cli.segment, |bus| {
        let mut ui = ui::ConsoleUi::new();
        controller::run(bus, cli.segment, &image, &mut ui)
    });

    let status = match result {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match status {
        RunStatus::UpToDate => {
            println!();
            println!("Flash ROM already up to date. No programming done.");
        }
        RunStatus::Programmed { blocks } => {
            println!();
            println!(
                "Programming complete ({} blocks written)! Please reboot your computer.",
                blocks
            );
            finish(programmer, 0);
        }
        RunStatus::Fault(e) => {
            println!();
            println!("Error during programming: {}.", e);
            println!("The flash ROM might now have corrupt data. Please reboot your computer.");
            finish(programmer, 1);
        }
        RunStatus::VerifyFailed => {
            println!();
            println!("Verify failed! The flash ROM does not have correct data.");
            println!("Please reboot your computer.");
            finish(programmer, 1);
        }
    }
}

/// End a run whose programming pass touched the device. On real hardware
/// the firmware still executing is the one that was just overwritten, so
/// the only safe exit is to idle until the user power-cycles. Dummy runs
/// just report through the exit code.
fn finish(programmer: Programmer, code: i32) -> ! {
    if programmer == Programmer::Internal {
        loop {
            std::hint::spin_loop();
        }
    }
    std::process::exit(code);
}
