//! Result log consumed by external diagnostics and watchdog-refresh logic.
//!
//! The log keeps a one-deep history: the phase currently executing and the
//! last fully decided phase. It is written before any halt, so a post-mortem
//! reader always sees which phase stopped the supervisor.

use crate::phase::{ResultCode, TestId};

/// One `(identifier, result)` pair.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhaseRecord {
    pub id: TestId,
    pub result: ResultCode,
}

impl PhaseRecord {
    #[must_use]
    pub const fn new(id: TestId, result: ResultCode) -> Self {
        Self { id, result }
    }
}

/// Current and previous phase records.
///
/// Invariants: `previous` reflects the last phase whose verdict was decided;
/// `active` reflects the phase executing or about to execute, with
/// [`ResultCode::NotExecuted`] until its verdict lands.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResultLog {
    active: PhaseRecord,
    previous: PhaseRecord,
}

impl ResultLog {
    /// Fresh log: nothing decided, cursor at `Init`.
    #[must_use]
    pub const fn new() -> Self {
        let blank = PhaseRecord::new(TestId::Init, ResultCode::NotExecuted);
        Self {
            active: blank,
            previous: blank,
        }
    }

    /// Records the verdict of the phase that just completed and arms the log
    /// for the next phase.
    ///
    /// The completed pair moves into `previous`; `active` becomes
    /// `(next, NotExecuted)`, meaning "now running, no verdict yet".
    pub fn record_transition(&mut self, completed: TestId, verdict: ResultCode, next: TestId) {
        self.previous = PhaseRecord::new(completed, verdict);
        self.active = PhaseRecord::new(next, ResultCode::NotExecuted);
    }

    /// Marks the active record as failed.
    ///
    /// Called before entering the safe state; `id` names the exact sub-step
    /// that detected the fault.
    pub fn record_fault(&mut self, id: TestId) {
        self.active = PhaseRecord::new(id, ResultCode::Error);
    }

    /// The phase currently executing.
    #[must_use]
    pub const fn active(&self) -> PhaseRecord {
        self.active
    }

    /// The last fully decided phase.
    #[must_use]
    pub const fn previous(&self) -> PhaseRecord {
        self.previous
    }
}

impl Default for ResultLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only copy of the log plus supercycle timing, for external reporting.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogSnapshot {
    pub active_id: TestId,
    pub active_result: ResultCode,
    pub previous_id: TestId,
    pub previous_result: ResultCode,
    /// Duration of the last completed supercycle in ticks; zero until one
    /// completes.
    pub last_supercycle_ticks: u64,
}

impl LogSnapshot {
    #[must_use]
    pub const fn new(log: &ResultLog, last_supercycle_ticks: u64) -> Self {
        Self {
            active_id: log.active.id,
            active_result: log.active.result,
            previous_id: log.previous.id,
            previous_result: log.previous.result,
            last_supercycle_ticks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_log_has_nothing_decided() {
        let log = ResultLog::new();
        assert_eq!(
            log.active(),
            PhaseRecord::new(TestId::Init, ResultCode::NotExecuted)
        );
        assert_eq!(log.active(), log.previous());
    }

    #[test]
    fn transition_shifts_the_decided_pair() {
        let mut log = ResultLog::new();
        log.record_transition(TestId::CpuRegister, ResultCode::Ok, TestId::CpuProgramCounter);

        assert_eq!(
            log.previous(),
            PhaseRecord::new(TestId::CpuRegister, ResultCode::Ok)
        );
        assert_eq!(
            log.active(),
            PhaseRecord::new(TestId::CpuProgramCounter, ResultCode::NotExecuted)
        );
    }

    #[test]
    fn fault_overwrites_only_the_active_record() {
        let mut log = ResultLog::new();
        log.record_transition(TestId::Stack, ResultCode::Ok, TestId::FlashSetup);
        log.record_fault(TestId::FlashCrc);

        assert_eq!(
            log.active(),
            PhaseRecord::new(TestId::FlashCrc, ResultCode::Error)
        );
        assert_eq!(log.previous(), PhaseRecord::new(TestId::Stack, ResultCode::Ok));
    }

    #[test]
    fn snapshot_copies_both_records() {
        let mut log = ResultLog::new();
        log.record_transition(TestId::Adc, ResultCode::Ok, TestId::UartSetup);
        let snapshot = LogSnapshot::new(&log, 42);

        assert_eq!(snapshot.previous_id, TestId::Adc);
        assert_eq!(snapshot.previous_result, ResultCode::Ok);
        assert_eq!(snapshot.active_id, TestId::UartSetup);
        assert_eq!(snapshot.active_result, ResultCode::NotExecuted);
        assert_eq!(snapshot.last_supercycle_ticks, 42);
    }
}
