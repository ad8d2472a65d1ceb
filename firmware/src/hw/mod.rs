//! MCU-backed implementations of the self-test bench.
//!
//! Everything here touches STM32 hardware or raw memory and only compiles for
//! the firmware target. The march and guard regions are dedicated blocks
//! reserved through `memory.x` link sections, so the destructive march never
//! aliases live data; the flash geometry and reference CRC come from symbols
//! patched into the image tail by the release tooling.

use core::arch::asm;
use core::ptr;

use defmt::error;
use embassy_stm32::adc::{Adc, SampleTime, VrefInt};
use embassy_stm32::gpio::Output;
use embassy_stm32::peripherals::ADC1;
use embassy_time::Instant;

use selftest_core::bench::{DiagnosticBench, FlashLayout, RamWindow, SafeStateHandler};
use selftest_core::phase::{FaultKind, MarchStatus, Verdict};
use selftest_core::stack_guard::GUARD_WORDS;

/// Base of the application flash image.
const FLASH_BASE: u32 = 0x0800_0000;
/// Flash size of the STM32G0B1KE.
const FLASH_LEN: u32 = 512 * 1024;

/// Factory-programmed VREFINT calibration constant, sampled at 3.0 V.
const VREFINT_CAL_ADDR: *const u16 = 0x1FFF_75AA as *const u16;

/// Register patterns exercised by the CPU check.
const REGISTER_PATTERNS: [u32; 2] = [0xAAAA_AAAA, 0x5555_5555];

/// Bytes of SRAM reserved for the tiled march.
const MARCH_WINDOW_LEN: usize = 0x800;

/// Diagnostics lines exercised by the I/O check.
const IO_LINE_COUNT: usize = 2;

#[unsafe(link_section = ".selftest.march")]
static mut MARCH_WINDOW: [u8; MARCH_WINDOW_LEN] = [0; MARCH_WINDOW_LEN];

/// Bytes in the one-shot save buffer.
const SAVE_BUFFER_LEN: usize = 64;

/// Scratch block verified in one shot before the tiled march starts.
#[unsafe(link_section = ".selftest.save")]
static mut SAVE_BUFFER: [u8; SAVE_BUFFER_LEN] = [0; SAVE_BUFFER_LEN];

/// Guard zone directly above the working stack.
#[unsafe(link_section = ".selftest.guard")]
static mut GUARD_ZONE: [u16; GUARD_WORDS] = [0; GUARD_WORDS];

unsafe extern "C" {
    /// First byte past the application image, placed by the linker script.
    static __image_end: u8;
    /// Reference CRC patched into the image tail by the release tooling.
    static __image_crc: u16;
}

fn march_window_base() -> u32 {
    (&raw const MARCH_WINDOW) as u32
}

fn guard_zone_end() -> u32 {
    (&raw const GUARD_ZONE) as u32 + (GUARD_WORDS * 2) as u32
}

/// Write/readback march element over one byte, pattern then complement.
///
/// Restores the original cell value on the way out so the scan stays
/// transparent to the rest of the firmware.
unsafe fn march_element(cell: *mut u8) -> bool {
    let saved = unsafe { cell.read_volatile() };
    for pattern in [0xAAu8, 0x55u8] {
        unsafe { cell.write_volatile(pattern) };
        if unsafe { cell.read_volatile() } != pattern {
            unsafe { cell.write_volatile(saved) };
            return false;
        }
    }
    unsafe { cell.write_volatile(saved) };
    unsafe { cell.read_volatile() } == saved
}

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

/// Loads a pattern into a scratch register, complements it twice and checks
/// the round trip.
fn register_pattern_cycle(pattern: u32) -> bool {
    let mut value = pattern;
    unsafe {
        asm!(
            "mvns {v}, {v}",
            "mvns {v}, {v}",
            v = inout(reg) value,
            options(nomem, nostack),
        );
    }
    value == pattern
}

/// Hardware bench for the supervisor.
pub struct McuBench<'d> {
    adc: Adc<'d, ADC1>,
    vrefint: VrefInt,
    io_lines: [Output<'d>; IO_LINE_COUNT],
    console_ready: bool,
}

impl<'d> McuBench<'d> {
    /// Builds the bench and enables the internal voltage reference.
    pub fn new(mut adc: Adc<'d, ADC1>, io_lines: [Output<'d>; IO_LINE_COUNT]) -> Self {
        adc.set_sample_time(SampleTime::CYCLES160_5);
        let vrefint = adc.enable_vrefint();
        Self {
            adc,
            vrefint,
            io_lines,
            console_ready: false,
        }
    }

    /// Marks the console UART as configured; the UART checks verify this.
    pub fn set_console_ready(&mut self) {
        self.console_ready = true;
    }
}

impl<'d> DiagnosticBench for McuBench<'d> {
    fn check_cpu_registers(&mut self) -> Verdict {
        let pass = REGISTER_PATTERNS.iter().all(|&p| register_pattern_cycle(p));
        Verdict::from_pass(pass)
    }

    fn check_program_counter(&mut self) -> Verdict {
        let pc: u32;
        unsafe {
            asm!("mov {0}, pc", out(reg) pc, options(nomem, nostack));
        }
        Verdict::from_pass((FLASH_BASE..FLASH_BASE + FLASH_LEN).contains(&pc))
    }

    fn check_time_base(&mut self) -> Verdict {
        let start = Instant::now();
        for _ in 0..10_000 {
            cortex_m::asm::nop();
        }
        Verdict::from_pass(Instant::now() > start)
    }

    fn check_save_buffer(&mut self) -> Verdict {
        let base = (&raw mut SAVE_BUFFER).cast::<u8>();
        for offset in 0..SAVE_BUFFER_LEN {
            if !unsafe { march_element(base.add(offset)) } {
                return Verdict::Fail;
            }
        }
        Verdict::Pass
    }

    fn ram_region(&self) -> RamWindow {
        RamWindow::new(march_window_base(), MARCH_WINDOW_LEN as u32)
    }

    fn march_ram(&mut self, window: RamWindow) -> MarchStatus {
        let region = self.ram_region();
        if window.end() > region.end() {
            return MarchStatus::Error;
        }

        let mut cell = window.base as *mut u8;
        let end = window.end() as *mut u8;
        while cell < end {
            if !unsafe { march_element(cell) } {
                return MarchStatus::Error;
            }
            cell = unsafe { cell.add(1) };
        }

        if window.end() == region.end() {
            MarchStatus::Complete
        } else {
            MarchStatus::StillTesting
        }
    }

    fn flash_layout(&self) -> FlashLayout {
        let image_end = (&raw const __image_end) as u32;
        FlashLayout::new(FLASH_BASE, image_end.saturating_sub(FLASH_BASE))
    }

    fn crc_step(&mut self, addr: u32, len: u32, acc: u16) -> u16 {
        let bytes = unsafe { core::slice::from_raw_parts(addr as *const u8, len as usize) };
        crc16_ccitt(acc, bytes)
    }

    fn stored_crc(&self, _segment: u32) -> u16 {
        unsafe { ptr::read_volatile(&raw const __image_crc) }
    }

    fn stack_guard(&mut self) -> &mut [u16] {
        unsafe { &mut *(&raw mut GUARD_ZONE) }
    }

    fn check_stack_limit(&mut self) -> Verdict {
        let sp: u32;
        unsafe {
            asm!("mov {0}, sp", out(reg) sp, options(nomem, nostack));
        }
        // The stack grows down toward the guard zone; a pointer at or below
        // its top means the limit has been breached.
        Verdict::from_pass(sp > guard_zone_end())
    }

    fn io_port_count(&self) -> u32 {
        IO_LINE_COUNT as u32
    }

    fn check_io_port(&mut self, port: u32) -> Verdict {
        let Some(line) = self.io_lines.get_mut(port as usize) else {
            return Verdict::Fail;
        };

        line.set_high();
        let high_seen = line.is_set_high();
        line.set_low();
        let low_seen = line.is_set_low();
        Verdict::from_pass(high_seen && low_seen)
    }

    fn check_adc(&mut self) -> Verdict {
        let calibration = unsafe { ptr::read_volatile(VREFINT_CAL_ADDR) };
        let reading = self.adc.blocking_read(&mut self.vrefint);

        // Sanity band around the factory constant; a dead or railed ADC
        // lands far outside it.
        let low = calibration / 2;
        let high = calibration.saturating_mul(3) / 2;
        Verdict::from_pass((low..=high).contains(&reading))
    }

    fn init_uart(&mut self) -> Verdict {
        Verdict::from_pass(self.console_ready)
    }

    fn check_uart(&mut self) -> Verdict {
        // The console owns the UART, so the cyclic check stays disabled by
        // default; at startup it only confirms the port came up.
        Verdict::from_pass(self.console_ready)
    }

    fn now_ticks(&self) -> u64 {
        Instant::now().as_ticks()
    }
}

impl<'d> SafeStateHandler for McuBench<'d> {
    fn enter_safe_state(&mut self, fault: FaultKind) {
        error!("self-test fault: {}", fault);

        // Release the diagnostic lines and park the core. The hardware
        // watchdog stops being refreshed here and resets the device.
        for line in &mut self.io_lines {
            line.set_low();
        }
        loop {
            cortex_m::asm::wfi();
        }
    }
}
