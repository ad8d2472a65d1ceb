//! Cyclic self-test scheduler.
//!
//! One [`CyclicScheduler::poll`] call performs at most one bounded unit of
//! work and returns: one register pattern, one march tile, one flash CRC
//! tile, one port check. Long-running tests are decomposed into tiles and the
//! progress cursor lives in [`PhaseContext`], so the surrounding control loop
//! never loses more than a single slice to the self-test. A full traversal of
//! all enabled phases from `Init` back to `Init` is one supercycle.
//!
//! Fail-stop: any detected fault writes the result log, latches the scheduler
//! and enters the safe state. There are no retries and no recovery.

use crate::bench::{DiagnosticBench, RamWindow, SafeStateHandler};
use crate::config::{PhaseGroup, SelfTestConfig};
use crate::phase::{FaultKind, MarchStatus, ResultCode, TestId, Verdict};
use crate::report::{LogSnapshot, ResultLog};
use crate::stack_guard;

/// Per-phase progress carried between cyclic calls.
///
/// One variant per multi-step phase, selected by the cursor. A dispatch arm
/// that finds the wrong variant for its phase has hit corrupted scheduler
/// state and halts.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhaseContext {
    /// No multi-step phase in flight.
    Idle,
    /// RAM march scan window and position.
    Ram {
        region: RamWindow,
        offset: u32,
        status: MarchStatus,
    },
    /// Flash CRC position, segment index, signed remaining-byte counter and
    /// running accumulator. The counter is signed so it can pass below zero
    /// as the completion sentinel.
    Flash {
        addr: u32,
        segment: u32,
        remaining: i64,
        crc: u16,
    },
    /// I/O port scan position.
    Io { port: u32 },
}

/// The resumable cyclic state machine.
///
/// Exactly one instance drives a device; it is owned by the periodic caller
/// and mutated only from its tick context. The scheduler itself never blocks,
/// spins or sleeps.
pub struct CyclicScheduler {
    cursor: TestId,
    context: PhaseContext,
    log: ResultLog,
    config: SelfTestConfig,
    cycle_started_at: u64,
    last_cycle_ticks: u64,
    halted: Option<FaultKind>,
}

impl CyclicScheduler {
    /// Builds the scheduler with its cursor at `Init`.
    ///
    /// Must be constructed once, after the startup sequence, before the first
    /// [`poll`](Self::poll).
    #[must_use]
    pub const fn new(config: SelfTestConfig) -> Self {
        Self {
            cursor: TestId::Init,
            context: PhaseContext::Idle,
            log: ResultLog::new(),
            config,
            cycle_started_at: 0,
            last_cycle_ticks: 0,
            halted: None,
        }
    }

    /// The phase the cursor currently points at.
    #[must_use]
    pub const fn current_test(&self) -> TestId {
        self.cursor
    }

    /// The in-flight multi-step context.
    #[must_use]
    pub const fn context(&self) -> PhaseContext {
        self.context
    }

    /// The fault that latched the scheduler, if any.
    #[must_use]
    pub const fn halted(&self) -> Option<FaultKind> {
        self.halted
    }

    /// Read-only view of the result log.
    #[must_use]
    pub const fn log(&self) -> &ResultLog {
        &self.log
    }

    /// Duration of the last completed supercycle in ticks.
    #[must_use]
    pub const fn last_supercycle_ticks(&self) -> u64 {
        self.last_cycle_ticks
    }

    /// Read-only snapshot for diagnostics readers and watchdog-refresh logic.
    #[must_use]
    pub const fn snapshot(&self) -> LogSnapshot {
        LogSnapshot::new(&self.log, self.last_cycle_ticks)
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &SelfTestConfig {
        &self.config
    }

    /// Advances the state machine by one bounded step.
    ///
    /// Once a fault has latched the scheduler, every later call re-enters the
    /// safe state and performs no work.
    pub fn poll<B>(&mut self, bench: &mut B)
    where
        B: DiagnosticBench + SafeStateHandler,
    {
        if let Some(fault) = self.halted {
            bench.enter_safe_state(fault);
            return;
        }

        match self.cursor {
            TestId::Init => {
                self.context = PhaseContext::Idle;
                self.cycle_started_at = bench.now_ticks();
                self.cursor = self.next_enabled(TestId::CpuRegister);
            }
            TestId::CpuRegister => {
                let verdict = bench.check_cpu_registers();
                self.one_shot(bench, TestId::CpuRegister, verdict, TestId::CpuProgramCounter);
            }
            TestId::CpuProgramCounter => {
                let verdict = bench.check_program_counter();
                self.one_shot(bench, TestId::CpuProgramCounter, verdict, TestId::TimeBase);
            }
            TestId::TimeBase => {
                let verdict = bench.check_time_base();
                self.one_shot(bench, TestId::TimeBase, verdict, TestId::RamSetup);
            }
            TestId::RamSetup => self.ram_setup(bench),
            TestId::RamMarch => self.ram_march(bench),
            TestId::RamAdvance => self.ram_advance(bench),
            TestId::Stack => {
                let intact = stack_guard::check(bench.stack_guard()).is_intact();
                self.one_shot(
                    bench,
                    TestId::Stack,
                    Verdict::from_pass(intact),
                    TestId::StackOverflow,
                );
            }
            TestId::StackOverflow => {
                let verdict = bench.check_stack_limit();
                self.one_shot(bench, TestId::StackOverflow, verdict, TestId::FlashSetup);
            }
            TestId::FlashSetup => self.flash_setup(bench),
            TestId::FlashCrc => self.flash_crc(bench),
            TestId::IoSetup => self.io_setup(bench),
            TestId::IoPort => self.io_port(bench),
            TestId::UdbSetup | TestId::UdbCheck => {
                // Reserved identifiers: advance without logging.
                self.context = PhaseContext::Idle;
                self.cursor = self.next_enabled(TestId::Adc);
            }
            TestId::Adc => {
                let verdict = bench.check_adc();
                self.one_shot(bench, TestId::Adc, verdict, TestId::UartSetup);
            }
            TestId::UartSetup => {
                let verdict = self.apply_injection(TestId::UartSetup, bench.init_uart());
                if verdict.is_pass() {
                    self.cursor = TestId::UartCheck;
                } else {
                    self.fault(bench, FaultKind::Phase(TestId::UartSetup));
                }
            }
            TestId::UartCheck => {
                let verdict = bench.check_uart();
                self.one_shot(bench, TestId::UartCheck, verdict, TestId::Exit);
            }
            TestId::Exit => {
                let now = bench.now_ticks();
                self.last_cycle_ticks = now.saturating_sub(self.cycle_started_at);
                self.log
                    .record_transition(TestId::Exit, ResultCode::NotExecuted, TestId::Init);
                self.context = PhaseContext::Idle;
                self.cursor = TestId::Init;
            }
        }
    }

    /// Runs the verdict of a single-call phase: log and advance on pass,
    /// fail-stop otherwise.
    fn one_shot<B>(&mut self, bench: &mut B, id: TestId, verdict: Verdict, next_entry: TestId)
    where
        B: SafeStateHandler,
    {
        match self.apply_injection(id, verdict) {
            Verdict::Pass => {
                let next = self.next_enabled(next_entry);
                self.log.record_transition(id, ResultCode::Ok, next);
                self.cursor = next;
            }
            Verdict::Fail => self.fault(bench, FaultKind::Phase(id)),
        }
    }

    fn ram_setup<B>(&mut self, bench: &mut B)
    where
        B: DiagnosticBench + SafeStateHandler,
    {
        let verdict = self.apply_injection(TestId::RamSetup, bench.check_save_buffer());
        if verdict.is_pass() {
            self.context = PhaseContext::Ram {
                region: bench.ram_region(),
                offset: 0,
                status: MarchStatus::StillTesting,
            };
            self.cursor = TestId::RamMarch;
        } else {
            self.fault(bench, FaultKind::Phase(TestId::RamSetup));
        }
    }

    fn ram_march<B>(&mut self, bench: &mut B)
    where
        B: DiagnosticBench + SafeStateHandler,
    {
        let PhaseContext::Ram { region, offset, .. } = self.context else {
            self.fault(bench, FaultKind::Internal(TestId::RamMarch));
            return;
        };
        if offset >= region.len {
            self.fault(bench, FaultKind::Internal(TestId::RamMarch));
            return;
        }

        let tile = self.config.ram_tile.min(region.len - offset);
        let status = bench.march_ram(RamWindow::new(region.base + offset, tile));
        self.context = PhaseContext::Ram {
            region,
            offset,
            status,
        };
        self.cursor = TestId::RamAdvance;
    }

    fn ram_advance<B>(&mut self, bench: &mut B)
    where
        B: SafeStateHandler,
    {
        let PhaseContext::Ram {
            region,
            offset,
            status,
        } = self.context
        else {
            self.fault(bench, FaultKind::Internal(TestId::RamAdvance));
            return;
        };

        match status {
            MarchStatus::StillTesting => {
                let advance = self.config.ram_tile.min(region.len - offset);
                self.context = PhaseContext::Ram {
                    region,
                    offset: offset + advance,
                    status,
                };
                self.cursor = TestId::RamMarch;
            }
            MarchStatus::Complete => {
                self.context = PhaseContext::Idle;
                let next = self.next_enabled(TestId::Stack);
                self.log
                    .record_transition(TestId::RamAdvance, ResultCode::Ok, next);
                self.cursor = next;
            }
            MarchStatus::Error => self.fault(bench, FaultKind::Phase(TestId::RamAdvance)),
        }
    }

    fn flash_setup<B>(&mut self, bench: &mut B)
    where
        B: DiagnosticBench + SafeStateHandler,
    {
        let layout = bench.flash_layout();
        if layout.code_len == 0 {
            // Nothing to test: fall through to the I/O phase in this call.
            self.context = PhaseContext::Idle;
            self.cursor = self.next_enabled(TestId::IoSetup);
        } else {
            self.context = PhaseContext::Flash {
                addr: layout.base,
                segment: 0,
                remaining: i64::from(layout.code_len),
                crc: 0,
            };
            self.cursor = TestId::FlashCrc;
        }
    }

    fn flash_crc<B>(&mut self, bench: &mut B)
    where
        B: DiagnosticBench + SafeStateHandler,
    {
        let PhaseContext::Flash {
            addr,
            segment,
            remaining,
            crc,
        } = self.context
        else {
            self.fault(bench, FaultKind::Internal(TestId::FlashCrc));
            return;
        };
        if remaining < 1 {
            self.fault(bench, FaultKind::Internal(TestId::FlashCrc));
            return;
        }

        let feed = self
            .config
            .flash_tile
            .min(u32::try_from(remaining).unwrap_or(u32::MAX));
        let crc = bench.crc_step(addr, feed, crc);
        let remaining = remaining - i64::from(self.config.flash_tile);

        if remaining < 1 {
            let matches = !crc == bench.stored_crc(segment);
            let verdict = self.apply_injection(TestId::FlashCrc, Verdict::from_pass(matches));
            if verdict.is_pass() {
                self.context = PhaseContext::Idle;
                let next = self.next_enabled(TestId::IoSetup);
                self.log
                    .record_transition(TestId::FlashCrc, ResultCode::Ok, next);
                self.cursor = next;
            } else {
                self.fault(bench, FaultKind::Phase(TestId::FlashCrc));
            }
        } else {
            self.context = PhaseContext::Flash {
                addr: addr + feed,
                segment,
                remaining,
                crc,
            };
        }
    }

    fn io_setup<B>(&mut self, bench: &mut B)
    where
        B: DiagnosticBench + SafeStateHandler,
    {
        if bench.io_port_count() == 0 {
            // No ports wired: fall through like an empty flash image.
            self.context = PhaseContext::Idle;
            self.cursor = self.next_enabled(TestId::Adc);
        } else {
            self.context = PhaseContext::Io { port: 0 };
            self.cursor = TestId::IoPort;
        }
    }

    fn io_port<B>(&mut self, bench: &mut B)
    where
        B: DiagnosticBench + SafeStateHandler,
    {
        let PhaseContext::Io { port } = self.context else {
            self.fault(bench, FaultKind::Internal(TestId::IoPort));
            return;
        };

        let verdict = self.apply_injection(TestId::IoPort, bench.check_io_port(port));
        if !verdict.is_pass() {
            self.fault(bench, FaultKind::Phase(TestId::IoPort));
            return;
        }

        let next_port = port + 1;
        if next_port >= bench.io_port_count() {
            self.context = PhaseContext::Idle;
            let next = self.next_enabled(TestId::Adc);
            self.log
                .record_transition(TestId::IoPort, ResultCode::Ok, next);
            self.cursor = next;
        } else {
            self.context = PhaseContext::Io { port: next_port };
        }
    }

    /// First enabled major entry at or after `entry` in supercycle order.
    fn next_enabled(&self, entry: TestId) -> TestId {
        let start = TestId::MAJOR_ENTRIES
            .iter()
            .position(|candidate| *candidate == entry)
            .unwrap_or(TestId::MAJOR_ENTRIES.len() - 1);

        for candidate in &TestId::MAJOR_ENTRIES[start..] {
            if self.config.cyclic.entry_enabled(*candidate) {
                return *candidate;
            }
        }
        TestId::Exit
    }

    /// Applies the validation-only injection switches to a verdict.
    fn apply_injection(&self, id: TestId, verdict: Verdict) -> Verdict {
        let forced = PhaseGroup::of(id).is_some_and(|group| self.config.inject.forced(group));
        if forced { Verdict::Fail } else { verdict }
    }

    /// Records the fault, latches the scheduler and enters the safe state.
    ///
    /// The log write happens before the halt so a post-mortem reader can see
    /// which phase failed.
    fn fault<B>(&mut self, bench: &mut B, fault: FaultKind)
    where
        B: SafeStateHandler,
    {
        self.log.record_fault(fault.phase());
        self.halted = Some(fault);
        bench.enter_safe_state(fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhaseSwitches;

    fn scheduler_with(cyclic: PhaseSwitches) -> CyclicScheduler {
        CyclicScheduler::new(SelfTestConfig::new(PhaseSwitches::all(), cyclic))
    }

    #[test]
    fn skip_chain_walks_to_first_enabled_entry() {
        let sched = scheduler_with(
            PhaseSwitches::none()
                .with(PhaseGroup::Stack, true)
                .with(PhaseGroup::Adc, true),
        );

        assert_eq!(sched.next_enabled(TestId::CpuRegister), TestId::Stack);
        assert_eq!(sched.next_enabled(TestId::StackOverflow), TestId::Adc);
        assert_eq!(sched.next_enabled(TestId::UartSetup), TestId::Exit);
    }

    #[test]
    fn skip_chain_never_lands_on_reserved_entries() {
        let sched = scheduler_with(PhaseSwitches::none().with(PhaseGroup::Uart, true));
        assert_eq!(sched.next_enabled(TestId::IoSetup), TestId::UartSetup);
    }

    #[test]
    fn injection_flips_only_the_forced_group() {
        let config = SelfTestConfig::new(PhaseSwitches::all(), PhaseSwitches::all())
            .with_injection(crate::config::FaultInjection::forcing(PhaseGroup::Adc));
        let sched = CyclicScheduler::new(config);

        assert_eq!(
            sched.apply_injection(TestId::Adc, Verdict::Pass),
            Verdict::Fail
        );
        assert_eq!(
            sched.apply_injection(TestId::Stack, Verdict::Pass),
            Verdict::Pass
        );
    }
}
