//! Run-to-completion startup sequence.
//!
//! Executed exactly once at boot, before the cyclic scheduler exists. The
//! sequencer owns the CPU at this point, so unlike the cyclic scheduler it
//! may block: the RAM march and the flash CRC run to completion in a loop
//! here instead of being tiled across ticks.
//!
//! The order is fixed. The register, program-counter, RAM and stack checks
//! run first because memory initialization cannot be trusted until they pass;
//! the time-base, flash, ADC and UART checks need initialized memory and run
//! after the [`DiagnosticBench::memory_init`] hook.
//!
//! The first failing check enters the safe state and stops the sequence.
//! Control must reach the application entry point only on
//! [`StartupOutcome::Completed`]; if the application ever returns, the caller
//! is required to enter the safe state permanently rather than fall through.

use crate::bench::{DiagnosticBench, RamWindow, SafeStateHandler};
use crate::config::{PhaseGroup, SelfTestConfig};
use crate::phase::{FaultKind, MarchStatus, TestId, Verdict};
use crate::stack_guard;

/// Result of the boot sequence, visible to test harnesses.
///
/// On hardware the fault arm is unobservable: the safe-state handler never
/// returns there.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartupOutcome {
    /// Every enabled check passed; hand control to the application.
    Completed,
    /// A check failed; the safe state has been entered.
    Faulted(FaultKind),
}

impl StartupOutcome {
    /// Returns `true` when the boot checks all passed.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, StartupOutcome::Completed)
    }
}

/// Runs the boot-time check sequence.
pub fn run_startup<B>(bench: &mut B, config: &SelfTestConfig) -> StartupOutcome
where
    B: DiagnosticBench + SafeStateHandler,
{
    // Early group: runs before memory initialization can be trusted.
    if let Err(fault) = gate(bench, config, TestId::CpuRegister, B::check_cpu_registers) {
        return StartupOutcome::Faulted(fault);
    }
    if let Err(fault) = gate(
        bench,
        config,
        TestId::CpuProgramCounter,
        B::check_program_counter,
    ) {
        return StartupOutcome::Faulted(fault);
    }
    if let Err(fault) = gate(bench, config, TestId::RamSetup, ram_integrity) {
        return StartupOutcome::Faulted(fault);
    }
    if let Err(fault) = gate(bench, config, TestId::Stack, stack_pattern) {
        return StartupOutcome::Faulted(fault);
    }

    bench.memory_init();

    // Late group: needs initialized memory.
    if let Err(fault) = gate(bench, config, TestId::TimeBase, B::check_time_base) {
        return StartupOutcome::Faulted(fault);
    }
    if let Err(fault) = gate(bench, config, TestId::FlashCrc, |bench| {
        flash_image_crc(bench, config.flash_tile)
    }) {
        return StartupOutcome::Faulted(fault);
    }
    if let Err(fault) = gate(bench, config, TestId::Adc, B::check_adc) {
        return StartupOutcome::Faulted(fault);
    }
    if let Err(fault) = gate(bench, config, TestId::UartCheck, uart_round) {
        return StartupOutcome::Faulted(fault);
    }

    StartupOutcome::Completed
}

/// Runs one gated check: skip when disabled, fail-stop on a bad verdict.
fn gate<B, F>(
    bench: &mut B,
    config: &SelfTestConfig,
    id: TestId,
    check: F,
) -> Result<(), FaultKind>
where
    B: DiagnosticBench + SafeStateHandler,
    F: FnOnce(&mut B) -> Verdict,
{
    let Some(group) = PhaseGroup::of(id) else {
        return Ok(());
    };
    if !config.startup.enabled(group) {
        return Ok(());
    }

    let mut verdict = check(bench);
    if config.inject.forced(group) {
        verdict = Verdict::Fail;
    }

    if verdict.is_pass() {
        Ok(())
    } else {
        let fault = FaultKind::Phase(id);
        bench.enter_safe_state(fault);
        Err(fault)
    }
}

/// Save-buffer check plus a full march over the test region, tile by tile.
fn ram_integrity<B: DiagnosticBench>(bench: &mut B) -> Verdict {
    if !bench.check_save_buffer().is_pass() {
        return Verdict::Fail;
    }

    let region = bench.ram_region();
    let mut offset = 0;
    while offset < region.len {
        let len = region.len - offset;
        match bench.march_ram(RamWindow::new(region.base + offset, len)) {
            MarchStatus::StillTesting => offset += len,
            MarchStatus::Complete => return Verdict::Pass,
            MarchStatus::Error => return Verdict::Fail,
        }
    }
    // The bench never signalled completion inside its own region.
    Verdict::Fail
}

/// Guard pattern fill followed by the first scan.
fn stack_pattern<B: DiagnosticBench>(bench: &mut B) -> Verdict {
    stack_guard::fill(bench.stack_guard());
    Verdict::from_pass(stack_guard::check(bench.stack_guard()).is_intact())
}

/// Full-image CRC, accumulated tile by tile and compared bit-inverted
/// against the stored reference.
fn flash_image_crc<B: DiagnosticBench>(bench: &mut B, tile: u32) -> Verdict {
    let layout = bench.flash_layout();
    if layout.code_len == 0 {
        return Verdict::Pass;
    }

    let mut remaining = i64::from(layout.code_len);
    let mut addr = layout.base;
    let mut crc: u16 = 0;
    while remaining > 0 {
        let feed = tile.min(u32::try_from(remaining).unwrap_or(u32::MAX));
        crc = bench.crc_step(addr, feed, crc);
        addr += feed;
        remaining -= i64::from(feed);
    }
    Verdict::from_pass(!crc == bench.stored_crc(0))
}

/// UART init followed by its check.
fn uart_round<B: DiagnosticBench>(bench: &mut B) -> Verdict {
    if !bench.init_uart().is_pass() {
        return Verdict::Fail;
    }
    bench.check_uart()
}
