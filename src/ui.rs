//! Interactive console front end for the programming workflow
//!
//! Prints the session the way a firmware tool should: a calibration line,
//! the overlap warning when it applies, a one-line summary of what is
//! about to happen, a single-keystroke Y/N gate, then a progress bar over
//! the programming pass.

use indicatif::{ProgressBar, ProgressStyle};
use sstflash_core::controller::FlashUi;
use sstflash_core::flash::FlashProgress;
use sstflash_core::plan::WindowPlan;
use sstflash_core::timer::CalibratedTimeout;
use std::io::{self, Read, Write};

pub struct ConsoleUi {
    bar: Option<ProgressBar>,
}

impl ConsoleUi {
    pub fn new() -> Self {
        Self { bar: None }
    }
}

/// `D`, with the sequence segment appended when it differs.
fn format_address(plan: &WindowPlan) -> String {
    if plan.seq_seg == plan.dest_seg {
        format!("{:04X}", plan.dest_seg)
    } else {
        format!(
            "{:04X} (sequence address {:04X})",
            plan.dest_seg, plan.seq_seg
        )
    }
}

impl FlashProgress for ConsoleUi {
    fn block_done(&mut self, completed: usize, total: usize) {
        if let Some(bar) = &self.bar {
            bar.set_length(total as u64);
            bar.set_position(completed as u64);
            if completed == total {
                bar.finish_with_message("done");
            }
        }
    }
}

impl FlashUi for ConsoleUi {
    fn calibrated(&mut self, timeout: CalibratedTimeout) {
        println!(
            "Calibrated timeout timer: {} loops per 215us.",
            timeout.loops()
        );
    }

    fn overlap_warning(&mut self, plan: &WindowPlan) {
        println!();
        println!("*** WARNING: Another ROM image was found in the 32K programming range ***");
        println!(
            "*** starting at {:04X}. If there is a second SST flash ROM in this     ***",
            plan.seq_seg
        );
        println!("*** range, its data may become corrupted after programming.          ***");
    }

    fn confirm(&mut self, kib: u32, device: &'static str, plan: &WindowPlan) -> bool {
        println!();
        println!(
            "Will program {}K to {} at address {}.",
            kib,
            device,
            format_address(plan)
        );
        print!("Continue Y/N? ");
        let _ = io::stdout().flush();

        loop {
            let key = match read_key() {
                Ok(key) => key.to_ascii_lowercase(),
                // No way to ask means no consent.
                Err(_) => b'n',
            };
            match key {
                b'y' => {
                    println!("y");
                    return true;
                }
                b'n' => {
                    println!("n");
                    return false;
                }
                _ => continue,
            }
        }
    }

    fn programming_started(&mut self) {
        println!("Programming...");
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.cyan/blue}] {pos}/{len} blocks {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.bar = Some(bar);
    }
}

/// Read one raw keystroke from the terminal, or the first byte of a line
/// when stdin is not a tty.
#[cfg(unix)]
fn read_key() -> io::Result<u8> {
    use std::os::unix::io::AsRawFd;

    let fd = io::stdin().as_raw_fd();
    if unsafe { libc::isatty(fd) } == 0 {
        return read_key_line();
    }

    unsafe {
        let mut termios = std::mem::zeroed::<libc::termios>();
        if libc::tcgetattr(fd, &mut termios) != 0 {
            return Err(io::Error::last_os_error());
        }
        let saved = termios;

        termios.c_lflag &= !(libc::ICANON | libc::ECHO);
        termios.c_cc[libc::VMIN] = 1;
        termios.c_cc[libc::VTIME] = 0;
        if libc::tcsetattr(fd, libc::TCSANOW, &termios) != 0 {
            return Err(io::Error::last_os_error());
        }

        let mut byte = 0u8;
        let n = libc::read(fd, &mut byte as *mut u8 as *mut libc::c_void, 1);
        libc::tcsetattr(fd, libc::TCSANOW, &saved);

        if n != 1 {
            return Err(io::Error::last_os_error());
        }
        Ok(byte)
    }
}

#[cfg(not(unix))]
fn read_key() -> io::Result<u8> {
    read_key_line()
}

fn read_key_line() -> io::Result<u8> {
    let mut byte = [0u8; 1];
    let n = io::stdin().read(&mut byte)?;
    if n == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of input"));
    }
    Ok(byte[0])
}
