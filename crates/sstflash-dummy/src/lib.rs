//! sstflash-dummy - In-memory flash emulator for testing
//!
//! Models the low 1 MiB window as a heap buffer preinitialized to 0xAA
//! (distinguishable from both natural fill values 0xFF and 0x00) with an
//! SST39SF device decoding a configurable address range. The model
//! mutates its state only in response to the documented command sequences
//! and panics on anything else; a stray or misordered write is a bug in
//! the engine, not something to paper over.
//!
//! The modeled BIOS tick advances on `tick_lsb` reads so timing
//! calibration terminates deterministically, and erase/program completion
//! can be delayed or hung to exercise the timeout paths.

use sstflash_core::bus::{MemoryBus, LOW_MEM_SIZE};
use sstflash_core::protocol::SECTOR_SIZE;

/// Configuration for the modeled device and host.
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Software ID vendor byte.
    pub vendor_id: u8,
    /// Software ID device byte.
    pub device_id: u8,
    /// Physical base of the device's decoded range; 32 KiB-aligned.
    pub device_base: u32,
    /// Decoded range length in bytes.
    pub device_size: u32,
    /// Reads returning stale memory after software-ID entry, before the
    /// ID bytes become visible.
    pub id_settle_reads: u8,
    /// `tick_lsb` reads per modeled BIOS tick.
    pub tick_period: u32,
    /// Busy reads (complemented data) before an erase completes.
    pub erase_busy_polls: u32,
    /// Busy reads before a byte program completes.
    pub program_busy_polls: u32,
    /// Never complete erases; polling runs to its bound.
    pub hang_erase: bool,
    /// Never complete byte programs.
    pub hang_program: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            vendor_id: 0xBF,
            device_id: 0xB6, // SST39SF020
            device_base: 0xC0000,
            device_size: 0x40000,
            id_settle_reads: 2,
            tick_period: 16,
            erase_busy_polls: 0,
            program_busy_polls: 0,
            hang_erase: false,
            hang_program: false,
        }
    }
}

/// Where the command decoder is within a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandState {
    Idle,
    Unlock1,
    Unlock2,
    SoftwareId { settle: u8 },
    EraseSetup,
    EraseUnlock1,
    EraseArmed,
    ProgramArmed,
}

/// An erase or program in flight: reads inside the range return
/// complemented data until the poll budget drains.
#[derive(Debug, Clone, Copy)]
struct Busy {
    start: u32,
    len: u32,
    polls_left: u32,
    hang: bool,
}

/// In-memory bus with a modeled SST39SF device.
pub struct DummyBus {
    config: DummyConfig,
    mem: Vec<u8>,
    state: CommandState,
    busy: Option<Busy>,
    irq_enabled: bool,
    tick: u8,
    tick_reads: u32,
    id_entries: usize,
    erases: usize,
    program_writes: usize,
}

impl DummyBus {
    /// Create a bus with the given device configuration.
    pub fn new(config: DummyConfig) -> Self {
        assert!(config.device_base % 0x8000 == 0, "device base not 32K-aligned");
        assert!(
            config.device_base + config.device_size <= LOW_MEM_SIZE,
            "device range exceeds the 1 MiB window"
        );
        assert!(config.tick_period > 0, "tick period must be nonzero");
        Self {
            config,
            mem: vec![0xAA; LOW_MEM_SIZE as usize],
            state: CommandState::Idle,
            busy: None,
            irq_enabled: true,
            tick: 0,
            tick_reads: 0,
            id_entries: 0,
            erases: 0,
            program_writes: 0,
        }
    }

    /// Create a bus with the default SST39SF020 at 0xC0000.
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Copy `data` straight into backing memory, bypassing the device
    /// model. Test fixture setup only.
    pub fn preload(&mut self, addr: u32, data: &[u8]) {
        let addr = addr as usize;
        self.mem[addr..addr + data.len()].copy_from_slice(data);
    }

    /// A view of backing memory, bypassing the device model.
    pub fn contents(&self, addr: u32, len: usize) -> &[u8] {
        &self.mem[addr as usize..addr as usize + len]
    }

    /// Whether maskable interrupts are currently enabled.
    pub fn irq_enabled(&self) -> bool {
        self.irq_enabled
    }

    /// Software-ID entry sequences observed.
    pub fn id_entry_count(&self) -> usize {
        self.id_entries
    }

    /// Sector erase sequences observed.
    pub fn erase_count(&self) -> usize {
        self.erases
    }

    /// Byte-program sequences observed.
    pub fn program_count(&self) -> usize {
        self.program_writes
    }

    fn in_device(&self, addr: u32) -> bool {
        addr >= self.config.device_base && addr < self.config.device_base + self.config.device_size
    }

    fn begin_busy(&mut self, start: u32, len: u32, polls: u32, hang: bool) {
        if polls > 0 || hang {
            self.busy = Some(Busy {
                start,
                len,
                polls_left: polls,
                hang,
            });
        }
    }

    fn busy_read(&mut self, addr: u32) -> Option<u8> {
        let busy = self.busy?;
        if addr < busy.start || addr >= busy.start + busy.len {
            return None;
        }
        if busy.hang {
            return Some(!self.mem[addr as usize]);
        }
        if busy.polls_left > 0 {
            self.busy = Some(Busy {
                polls_left: busy.polls_left - 1,
                ..busy
            });
            return Some(!self.mem[addr as usize]);
        }
        self.busy = None;
        None
    }

    fn erase_sector_at(&mut self, addr: u32) {
        let rel = addr - self.config.device_base;
        let sector = self.config.device_base + (rel & !(SECTOR_SIZE as u32 - 1));
        log::trace!("dummy: sector erase at {:05X}", sector);
        for byte in &mut self.mem[sector as usize..sector as usize + SECTOR_SIZE] {
            *byte = 0xFF;
        }
        self.erases += 1;
        self.begin_busy(
            sector,
            SECTOR_SIZE as u32,
            self.config.erase_busy_polls,
            self.config.hang_erase,
        );
    }

    fn program_byte_at(&mut self, addr: u32, value: u8) {
        // NOR programming can only clear bits.
        self.mem[addr as usize] &= value;
        self.program_writes += 1;
        self.begin_busy(
            addr,
            1,
            self.config.program_busy_polls,
            self.config.hang_program,
        );
    }
}

impl MemoryBus for DummyBus {
    fn read8(&mut self, addr: u32) -> u8 {
        assert!(addr < LOW_MEM_SIZE, "read outside the 1 MiB window");

        if let Some(value) = self.busy_read(addr) {
            return value;
        }

        if self.in_device(addr) {
            if let CommandState::SoftwareId { ref mut settle } = self.state {
                if *settle > 0 {
                    *settle -= 1;
                    return self.mem[addr as usize];
                }
                return if addr & 1 == 0 {
                    self.config.vendor_id
                } else {
                    self.config.device_id
                };
            }
        }

        self.mem[addr as usize]
    }

    fn write8(&mut self, addr: u32, value: u8) {
        assert!(addr < LOW_MEM_SIZE, "write outside the 1 MiB window");
        assert!(
            self.in_device(addr),
            "write outside the flash device at {:05X}",
            addr
        );
        assert!(
            !self.irq_enabled,
            "flash command write at {:05X} with interrupts enabled",
            addr
        );
        assert!(
            self.busy.is_none(),
            "flash command write at {:05X} while the device is busy",
            addr
        );

        // The device decodes A14..A0 for the unlock addresses, so the
        // offset is relative to whichever 32 KiB window got the write.
        let rel = (addr - self.config.device_base) & 0x7FFF;

        use CommandState::*;
        self.state = match (self.state, rel, value) {
            (Idle, 0x5555, 0xAA) => Unlock1,
            (Unlock1, 0x2AAA, 0x55) => Unlock2,
            (Unlock2, 0x5555, 0x90) => {
                self.id_entries += 1;
                SoftwareId {
                    settle: self.config.id_settle_reads,
                }
            }
            (SoftwareId { .. }, 0x5555, 0xF0) => Idle,
            (Unlock2, 0x5555, 0x80) => EraseSetup,
            (EraseSetup, 0x5555, 0xAA) => EraseUnlock1,
            (EraseUnlock1, 0x2AAA, 0x55) => EraseArmed,
            (EraseArmed, _, 0x30) => {
                self.erase_sector_at(addr);
                Idle
            }
            (Unlock2, 0x5555, 0xA0) => ProgramArmed,
            (ProgramArmed, _, _) => {
                self.program_byte_at(addr, value);
                Idle
            }
            (state, rel, value) => panic!(
                "unexpected flash command write: state {:?}, offset {:04X}, value {:02X}",
                state, rel, value
            ),
        };
    }

    fn tick_lsb(&mut self) -> u8 {
        self.tick_reads += 1;
        if self.tick_reads % self.config.tick_period == 0 {
            self.tick = self.tick.wrapping_add(1);
        }
        self.tick
    }

    fn disable_interrupts(&mut self) {
        assert!(self.irq_enabled, "interrupts disabled twice");
        self.irq_enabled = false;
    }

    fn enable_interrupts(&mut self) {
        assert!(!self.irq_enabled, "interrupts enabled twice");
        self.irq_enabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sstflash_core::protocol;
    use sstflash_core::timer::CalibratedTimeout;

    #[test]
    fn software_id_reports_the_configured_part() {
        let mut bus = DummyBus::new_default();
        let id = protocol::software_id(&mut bus, 0xC000, 0xC800);
        assert_eq!(id.vendor, 0xBF);
        assert_eq!(id.device, 0xB6);
        assert_eq!(bus.id_entry_count(), 1);
        assert!(bus.irq_enabled());
    }

    #[test]
    fn stale_reads_precede_the_id_bytes() {
        let mut bus = DummyBus::new(DummyConfig {
            id_settle_reads: 2,
            ..DummyConfig::default()
        });
        bus.disable_interrupts();
        bus.write8(0xC5555, 0xAA);
        bus.write8(0xC2AAA, 0x55);
        bus.write8(0xC5555, 0x90);
        // First reads still see the old bus contents.
        assert_eq!(bus.read8(0xC8000), 0xAA);
        assert_eq!(bus.read8(0xC8000), 0xAA);
        assert_eq!(bus.read8(0xC8000), 0xBF);
        assert_eq!(bus.read8(0xC8001), 0xB6);
        bus.write8(0xC5555, 0xF0);
        bus.enable_interrupts();
    }

    #[test]
    fn erase_sets_the_sector_to_ff() {
        let mut bus = DummyBus::new_default();
        bus.preload(0xC8000, &[0x12; SECTOR_SIZE]);
        bus.disable_interrupts();
        protocol::erase_sector(&mut bus, 0xC000, 0xC8000, CalibratedTimeout::from_loops(4))
            .unwrap();
        bus.enable_interrupts();
        assert!(bus.contents(0xC8000, SECTOR_SIZE).iter().all(|&b| b == 0xFF));
        assert_eq!(bus.erase_count(), 1);
    }

    #[test]
    fn erase_busy_polls_delay_completion() {
        let mut bus = DummyBus::new(DummyConfig {
            erase_busy_polls: 3,
            ..DummyConfig::default()
        });
        bus.disable_interrupts();
        protocol::erase_sector(&mut bus, 0xC000, 0xC8000, CalibratedTimeout::from_loops(2))
            .unwrap();
        bus.enable_interrupts();
        assert!(bus.contents(0xC8000, SECTOR_SIZE).iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn program_clears_bits_only() {
        let mut bus = DummyBus::new_default();
        bus.disable_interrupts();
        protocol::erase_sector(&mut bus, 0xC000, 0xC8000, CalibratedTimeout::from_loops(4))
            .unwrap();
        let mut data = [0xFFu8; SECTOR_SIZE];
        data[0] = 0x12;
        data[SECTOR_SIZE - 1] = 0x34;
        protocol::program_sector(
            &mut bus,
            0xC000,
            0xC8000,
            &data,
            CalibratedTimeout::from_loops(4),
        )
        .unwrap();
        bus.enable_interrupts();
        assert_eq!(bus.contents(0xC8000, SECTOR_SIZE), &data[..]);
    }

    #[test]
    #[should_panic(expected = "interrupts enabled")]
    fn command_writes_require_the_interrupt_mask() {
        let mut bus = DummyBus::new_default();
        bus.write8(0xC5555, 0xAA);
    }

    #[test]
    #[should_panic(expected = "unexpected flash command write")]
    fn stray_data_writes_panic() {
        let mut bus = DummyBus::new_default();
        bus.disable_interrupts();
        bus.write8(0xC8000, 0x12);
    }

    #[test]
    fn tick_advances_on_schedule() {
        let mut bus = DummyBus::new(DummyConfig {
            tick_period: 4,
            ..DummyConfig::default()
        });
        let first = bus.tick_lsb();
        let mut changed = 0;
        let mut last = first;
        for _ in 0..16 {
            let t = bus.tick_lsb();
            if t != last {
                changed += 1;
                last = t;
            }
        }
        assert_eq!(changed, 4);
    }
}
