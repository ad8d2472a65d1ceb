//! Simulated bench backing the emulator session.
//!
//! RAM, flash and the stack guard live in plain host memory; the march and
//! CRC primitives run for real over those images, so fault injection works by
//! actually corrupting the simulated hardware rather than by stubbing
//! verdicts wherever it can.

use selftest_core::bench::{DiagnosticBench, FlashLayout, RamWindow, SafeStateHandler};
use selftest_core::config::PhaseGroup;
use selftest_core::phase::{FaultKind, MarchStatus, Verdict};
use selftest_core::stack_guard::{self, GUARD_WORDS};

/// Simulated SRAM base address.
pub const RAM_BASE: u32 = 0x2000_0000;
/// Simulated flash base address.
pub const FLASH_BASE: u32 = 0x0800_0000;
/// Bytes of simulated march region.
pub const RAM_LEN: usize = 4 * 1024;
/// Bytes of simulated application image.
pub const FLASH_LEN: usize = 16 * 1024;

/// CRC-16/CCITT over `bytes`, continuing from `acc`.
fn crc16_ccitt(mut acc: u16, bytes: &[u8]) -> u16 {
    for &byte in bytes {
        acc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            acc = if acc & 0x8000 == 0 {
                acc << 1
            } else {
                (acc << 1) ^ 0x1021
            };
        }
    }
    acc
}

/// In-memory hardware model with per-group fault injection.
pub struct SimBench {
    ram: Vec<u8>,
    flash: Vec<u8>,
    stored_crc: u16,
    guard: [u16; GUARD_WORDS],
    forced: Vec<PhaseGroup>,
    fault: Option<FaultKind>,
    ticks: u64,
}

impl SimBench {
    pub fn new() -> Self {
        let flash: Vec<u8> = (0..FLASH_LEN).map(|i| (i % 239) as u8).collect();
        let stored_crc = !crc16_ccitt(0, &flash);
        let mut guard = [0u16; GUARD_WORDS];
        stack_guard::fill(&mut guard);

        Self {
            ram: vec![0u8; RAM_LEN],
            flash,
            stored_crc,
            guard,
            forced: Vec::new(),
            fault: None,
            ticks: 0,
        }
    }

    /// Arms a fault in the named group.
    ///
    /// Memory-backed groups corrupt the simulated hardware; the rest force a
    /// failing verdict on their next check.
    pub fn force(&mut self, group: PhaseGroup) {
        match group {
            PhaseGroup::Stack => self.guard[0] ^= 0x0001,
            PhaseGroup::Flash => self.flash[0] ^= 0x01,
            other => {
                if !self.forced.contains(&other) {
                    self.forced.push(other);
                }
            }
        }
    }

    /// The fault that drove the bench into the safe state, if any.
    pub fn fault(&self) -> Option<FaultKind> {
        self.fault
    }

    fn tick(&mut self) {
        self.ticks += 1;
    }

    fn scripted(&mut self, group: PhaseGroup) -> Verdict {
        self.tick();
        Verdict::from_pass(!self.forced.contains(&group))
    }
}

impl Default for SimBench {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticBench for SimBench {
    fn check_cpu_registers(&mut self) -> Verdict {
        self.scripted(PhaseGroup::CpuRegister)
    }

    fn check_program_counter(&mut self) -> Verdict {
        self.scripted(PhaseGroup::CpuProgramCounter)
    }

    fn check_time_base(&mut self) -> Verdict {
        self.scripted(PhaseGroup::TimeBase)
    }

    fn check_save_buffer(&mut self) -> Verdict {
        self.tick();
        Verdict::Pass
    }

    fn ram_region(&self) -> RamWindow {
        RamWindow::new(RAM_BASE, RAM_LEN as u32)
    }

    fn march_ram(&mut self, window: RamWindow) -> MarchStatus {
        self.tick();
        if self.forced.contains(&PhaseGroup::Ram) {
            return MarchStatus::Error;
        }

        let region = self.ram_region();
        if window.end() > region.end() {
            return MarchStatus::Error;
        }

        let start = (window.base - RAM_BASE) as usize;
        let end = start + window.len as usize;
        for cell in &mut self.ram[start..end] {
            let saved = *cell;
            for pattern in [0xAAu8, 0x55u8] {
                *cell = pattern;
                if *cell != pattern {
                    return MarchStatus::Error;
                }
            }
            *cell = saved;
        }

        if window.end() == region.end() {
            MarchStatus::Complete
        } else {
            MarchStatus::StillTesting
        }
    }

    fn flash_layout(&self) -> FlashLayout {
        FlashLayout::new(FLASH_BASE, self.flash.len() as u32)
    }

    fn crc_step(&mut self, addr: u32, len: u32, acc: u16) -> u16 {
        self.tick();
        let start = (addr - FLASH_BASE) as usize;
        let end = start + len as usize;
        crc16_ccitt(acc, &self.flash[start..end])
    }

    fn stored_crc(&self, _segment: u32) -> u16 {
        self.stored_crc
    }

    fn stack_guard(&mut self) -> &mut [u16] {
        self.tick();
        &mut self.guard
    }

    fn check_stack_limit(&mut self) -> Verdict {
        self.scripted(PhaseGroup::StackOverflow)
    }

    fn io_port_count(&self) -> u32 {
        4
    }

    fn check_io_port(&mut self, _port: u32) -> Verdict {
        self.scripted(PhaseGroup::Io)
    }

    fn check_adc(&mut self) -> Verdict {
        self.scripted(PhaseGroup::Adc)
    }

    fn init_uart(&mut self) -> Verdict {
        self.scripted(PhaseGroup::Uart)
    }

    fn check_uart(&mut self) -> Verdict {
        self.scripted(PhaseGroup::Uart)
    }

    fn now_ticks(&self) -> u64 {
        self.ticks
    }
}

impl SafeStateHandler for SimBench {
    fn enter_safe_state(&mut self, fault: FaultKind) {
        // Record and return: the session reports the halt instead of hanging.
        self.fault = Some(fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn march_covers_and_restores_the_region() {
        let mut bench = SimBench::new();
        bench.ram[10] = 0xC3;

        let status = bench.march_ram(RamWindow::new(RAM_BASE, RAM_LEN as u32));
        assert_eq!(status, MarchStatus::Complete);
        assert_eq!(bench.ram[10], 0xC3);
    }

    #[test]
    fn forced_flash_fault_breaks_the_crc() {
        let mut bench = SimBench::new();
        let layout = bench.flash_layout();
        let intact = bench.crc_step(layout.base, layout.code_len, 0);
        assert_eq!(!intact, bench.stored_crc(0));

        bench.force(PhaseGroup::Flash);
        let corrupted = bench.crc_step(layout.base, layout.code_len, 0);
        assert_ne!(!corrupted, bench.stored_crc(0));
    }
}
