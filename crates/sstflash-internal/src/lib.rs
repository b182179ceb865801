//! sstflash-internal - Real-hardware access to the legacy low 1 MiB window
//!
//! Maps physical addresses 0x00000..0xFFFFF through /dev/mem and performs
//! volatile byte accesses over the mapping, which is what makes the flash
//! command protocol observable on the bus. Interrupt masking uses
//! `cli`/`sti`, legal in user space once `iopl(3)` has granted the I/O
//! privilege level.
//!
//! # Safety
//!
//! Accessing physical memory is inherently unsafe and requires root.
//! Everything above the [`MemoryBus`] impl is safe code; the unsafety is
//! confined to the mapping and the volatile accessors here.

use core::fmt;

use sstflash_core::bus::{MemoryBus, LOW_MEM_SIZE};

/// Error type for the hardware bus.
#[derive(Debug)]
pub enum InternalError {
    /// /dev/mem could not be opened or mapped
    MemoryMap {
        /// Physical base address of the attempted mapping
        address: u64,
        /// Length of the attempted mapping
        size: usize,
    },
    /// `iopl(3)` was refused; `cli`/`sti` would fault
    IoPrivilege,
    /// Platform cannot drive the hardware at all
    NotSupported(&'static str),
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemoryMap { address, size } => write!(
                f,
                "failed to map {} bytes of physical memory at {:#X} (need root and /dev/mem)",
                size, address
            ),
            Self::IoPrivilege => {
                write!(f, "failed to raise the I/O privilege level (need root)")
            }
            Self::NotSupported(what) => write!(f, "{}", what),
        }
    }
}

impl std::error::Error for InternalError {}

/// Volatile bus over the real low 1 MiB window.
#[cfg(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64")))]
pub struct LowMemBus {
    ptr: *mut u8,
}

#[cfg(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64")))]
impl LowMemBus {
    /// Map the low 1 MiB window and acquire the I/O privilege level.
    pub fn open() -> Result<Self, InternalError> {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;
        use std::os::unix::io::AsRawFd;

        // cli/sti in ring 3 require IOPL 3.
        if unsafe { libc::iopl(3) } != 0 {
            return Err(InternalError::IoPrivilege);
        }

        // O_SYNC keeps the mapping uncached, required for device memory.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open("/dev/mem")
            .map_err(|_| InternalError::MemoryMap {
                address: 0,
                size: LOW_MEM_SIZE as usize,
            })?;

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                LOW_MEM_SIZE as usize,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(InternalError::MemoryMap {
                address: 0,
                size: LOW_MEM_SIZE as usize,
            });
        }

        log::debug!("mapped the low 1 MiB window via /dev/mem");

        Ok(Self { ptr: ptr as *mut u8 })
    }
}

#[cfg(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64")))]
impl MemoryBus for LowMemBus {
    #[inline]
    fn read8(&mut self, addr: u32) -> u8 {
        debug_assert!(addr < LOW_MEM_SIZE);
        unsafe { core::ptr::read_volatile(self.ptr.add(addr as usize)) }
    }

    #[inline]
    fn write8(&mut self, addr: u32, value: u8) {
        debug_assert!(addr < LOW_MEM_SIZE);
        unsafe { core::ptr::write_volatile(self.ptr.add(addr as usize), value) }
    }

    fn disable_interrupts(&mut self) {
        unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
    }

    fn enable_interrupts(&mut self) {
        unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
    }
}

#[cfg(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64")))]
impl Drop for LowMemBus {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, LOW_MEM_SIZE as usize);
        }
    }
}

// The mapping aliases device memory, not Rust-managed allocations.
#[cfg(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64")))]
unsafe impl Send for LowMemBus {}

/// Stub for platforms without /dev/mem or cli/sti.
#[cfg(not(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64"))))]
pub struct LowMemBus {
    _private: (),
}

#[cfg(not(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64"))))]
impl LowMemBus {
    /// Always fails; the hardware bus needs Linux on x86.
    pub fn open() -> Result<Self, InternalError> {
        Err(InternalError::NotSupported(
            "hardware flashing is only supported on x86 Linux",
        ))
    }
}

#[cfg(not(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64"))))]
impl MemoryBus for LowMemBus {
    fn read8(&mut self, _addr: u32) -> u8 {
        0
    }

    fn write8(&mut self, _addr: u32, _value: u8) {}

    fn disable_interrupts(&mut self) {}

    fn enable_interrupts(&mut self) {}
}
