#![allow(dead_code)]

//! Scripted bench shared by the integration suites.

use selftest_core::bench::{DiagnosticBench, FlashLayout, RamWindow, SafeStateHandler};
use selftest_core::phase::{FaultKind, MarchStatus, Verdict};
use selftest_core::stack_guard;

pub const RAM_BASE: u32 = 0x2000_0000;
pub const FLASH_BASE: u32 = 0x0800_0000;

/// CRC-16/CCITT step used by the scripted flash image.
pub fn crc16_ccitt(mut acc: u16, bytes: &[u8]) -> u16 {
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

/// Deterministic bench with scripted verdicts and full call recording.
pub struct MockBench {
    pub region: RamWindow,
    pub march_error_at: Option<u32>,
    pub march_windows: Vec<RamWindow>,
    pub flash: Vec<u8>,
    pub stored: u16,
    pub guard: Vec<u16>,
    pub io_ports: u32,
    pub io_failures: Vec<u32>,
    pub failing: Vec<&'static str>,
    pub calls: Vec<String>,
    pub faults: Vec<FaultKind>,
    pub tick: u64,
}

impl MockBench {
    pub fn new() -> Self {
        let flash: Vec<u8> = (0u32..512).map(|i| (i % 251) as u8).collect();
        let stored = !crc16_ccitt(0, &flash);
        let mut guard = vec![0u16; 8];
        stack_guard::fill(&mut guard);

        Self {
            region: RamWindow::new(RAM_BASE, 64),
            march_error_at: None,
            march_windows: Vec::new(),
            flash,
            stored,
            guard,
            io_ports: 2,
            io_failures: Vec::new(),
            failing: Vec::new(),
            calls: Vec::new(),
            faults: Vec::new(),
            tick: 0,
        }
    }

    /// Replaces the flash image and recomputes the stored reference.
    pub fn with_flash_len(mut self, len: usize) -> Self {
        self.flash = (0..len).map(|i| (i % 251) as u8).collect();
        self.stored = !crc16_ccitt(0, &self.flash);
        self
    }

    /// Forces the named one-shot check to fail.
    pub fn fail(mut self, name: &'static str) -> Self {
        self.failing.push(name);
        self
    }

    fn note(&mut self, name: impl Into<String>) {
        self.tick += 1;
        self.calls.push(name.into());
    }

    fn scripted(&mut self, name: &'static str) -> Verdict {
        self.note(name);
        Verdict::from_pass(!self.failing.contains(&name))
    }
}

impl DiagnosticBench for MockBench {
    fn check_cpu_registers(&mut self) -> Verdict {
        self.scripted("cpu-register")
    }

    fn check_program_counter(&mut self) -> Verdict {
        self.scripted("program-counter")
    }

    fn check_time_base(&mut self) -> Verdict {
        self.scripted("time-base")
    }

    fn check_save_buffer(&mut self) -> Verdict {
        self.scripted("save-buffer")
    }

    fn ram_region(&self) -> RamWindow {
        self.region
    }

    fn march_ram(&mut self, window: RamWindow) -> MarchStatus {
        self.note("march");
        self.march_windows.push(window);
        assert!(window.end() <= self.region.end(), "march ran past the region");

        if self.march_error_at == Some(window.base) {
            MarchStatus::Error
        } else if window.end() >= self.region.end() {
            MarchStatus::Complete
        } else {
            MarchStatus::StillTesting
        }
    }

    fn flash_layout(&self) -> FlashLayout {
        FlashLayout::new(FLASH_BASE, u32::try_from(self.flash.len()).unwrap())
    }

    fn crc_step(&mut self, addr: u32, len: u32, acc: u16) -> u16 {
        self.note("crc");
        let start = (addr - FLASH_BASE) as usize;
        let end = start + len as usize;
        crc16_ccitt(acc, &self.flash[start..end])
    }

    fn stored_crc(&self, _segment: u32) -> u16 {
        self.stored
    }

    fn stack_guard(&mut self) -> &mut [u16] {
        self.note("stack-guard");
        &mut self.guard
    }

    fn check_stack_limit(&mut self) -> Verdict {
        self.scripted("stack-limit")
    }

    fn io_port_count(&self) -> u32 {
        self.io_ports
    }

    fn check_io_port(&mut self, port: u32) -> Verdict {
        self.note(format!("io{port}"));
        Verdict::from_pass(!self.io_failures.contains(&port))
    }

    fn check_adc(&mut self) -> Verdict {
        self.scripted("adc")
    }

    fn init_uart(&mut self) -> Verdict {
        self.scripted("uart-init")
    }

    fn check_uart(&mut self) -> Verdict {
        self.scripted("uart-check")
    }

    fn now_ticks(&self) -> u64 {
        self.tick
    }

    fn memory_init(&mut self) {
        self.note("memory-init");
    }
}

impl SafeStateHandler for MockBench {
    fn enter_safe_state(&mut self, fault: FaultKind) {
        self.faults.push(fault);
    }
}
