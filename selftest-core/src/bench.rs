//! Hardware seam between the supervisor and the fault-detection primitives.
//!
//! The scheduler treats every check as an opaque operation behind
//! [`DiagnosticBench`]: firmware backs them with MCU registers and raw memory,
//! the emulator with in-memory images, tests with scripted mocks. Only the
//! contracts matter here; how a check detects a fault is the bench's business.

use crate::phase::{FaultKind, MarchStatus, Verdict};

/// Address window handed to the RAM march primitive.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RamWindow {
    /// First byte of the window.
    pub base: u32,
    /// Window length in bytes.
    pub len: u32,
}

impl RamWindow {
    #[must_use]
    pub const fn new(base: u32, len: u32) -> Self {
        Self { base, len }
    }

    /// First byte past the window.
    #[must_use]
    pub const fn end(self) -> u32 {
        self.base + self.len
    }
}

/// Geometry of the flash image under test.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashLayout {
    /// First byte of the application image.
    pub base: u32,
    /// Total application code length in bytes. Zero means nothing to test.
    pub code_len: u32,
}

impl FlashLayout {
    #[must_use]
    pub const fn new(base: u32, code_len: u32) -> Self {
        Self { base, code_len }
    }
}

/// Fault-detection primitives consumed by the supervisor.
///
/// Every operation is bounded in time by construction: one register pattern,
/// one march tile, one port, one conversion. The march and CRC primitives are
/// the only ones carrying partial progress, and they carry it in the
/// scheduler, not in the bench.
pub trait DiagnosticBench {
    /// CPU general-purpose register pattern check.
    fn check_cpu_registers(&mut self) -> Verdict;

    /// Program-counter integrity check.
    fn check_program_counter(&mut self) -> Verdict;

    /// Time-base/interrupt check: verifies the system tick is advancing at
    /// the expected rate.
    fn check_time_base(&mut self) -> Verdict;

    /// One-shot check of the fixed save-buffer block.
    fn check_save_buffer(&mut self) -> Verdict;

    /// The SRAM region the cyclic march scans, tile by tile.
    fn ram_region(&self) -> RamWindow;

    /// March test over `window`, bounded by the bench's hard upper address.
    ///
    /// Returns [`MarchStatus::Complete`] when the scan reached that bound,
    /// [`MarchStatus::StillTesting`] when more remains above the window.
    fn march_ram(&mut self, window: RamWindow) -> MarchStatus;

    /// Geometry of the application flash image.
    fn flash_layout(&self) -> FlashLayout;

    /// Feeds `len` bytes at `addr` into the running CRC accumulator.
    fn crc_step(&mut self, addr: u32, len: u32, acc: u16) -> u16;

    /// Stored reference value for the given flash segment: the expected
    /// bit-inverted final accumulator.
    fn stored_crc(&self, segment: u32) -> u16;

    /// Guard region directly above the stack, as whole words.
    fn stack_guard(&mut self) -> &mut [u16];

    /// Stack-limit/overflow guard check.
    fn check_stack_limit(&mut self) -> Verdict;

    /// Number of I/O ports covered by the port check.
    fn io_port_count(&self) -> u32;

    /// Check of a single I/O port.
    fn check_io_port(&mut self, port: u32) -> Verdict;

    /// ADC self-check. Runs an extra conversion, which may perturb a live
    /// conversion in flight; schedule accordingly.
    fn check_adc(&mut self) -> Verdict;

    /// UART self-check setup.
    fn init_uart(&mut self) -> Verdict;

    /// UART self-check.
    fn check_uart(&mut self) -> Verdict;

    /// Monotonic tick counter, used only for supercycle duration.
    fn now_ticks(&self) -> u64;

    /// Memory/hardware initialization hook between the early and late
    /// startup check groups. Only the startup sequencer calls this.
    fn memory_init(&mut self) {}
}

/// Terminal fail-stop sink.
///
/// On hardware this call must not return: release outputs, stop refreshing
/// the watchdog, park the core. Test and emulator handlers record the fault
/// and return instead; the supervisor latches its halted state either way, so
/// forward progress stops even when the handler comes back.
pub trait SafeStateHandler {
    fn enter_safe_state(&mut self, fault: FaultKind);
}
