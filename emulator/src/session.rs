//! Interactive session driving the supervisor against the simulated bench.

use selftest_core::config::{PhaseGroup, PhaseSwitches, SelfTestConfig};
use selftest_core::diag::{self, DiagCommand, HELP_LINES};
use selftest_core::phase::{ResultCode, TestId};
use selftest_core::sched::CyclicScheduler;
use selftest_core::startup::{StartupOutcome, run_startup};

use crate::bench::SimBench;

/// Scenario selected on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScenarioProfile {
    /// Production switch set: cyclic UART check disabled.
    Nominal,
    /// Every phase enabled cyclically, UART included.
    Full,
}

impl ScenarioProfile {
    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("nominal") {
            Ok(Self::Nominal)
        } else if tag.eq_ignore_ascii_case("full") {
            Ok(Self::Full)
        } else {
            Err(format!("Unknown scenario profile `{tag}`"))
        }
    }

    fn config(self) -> SelfTestConfig {
        match self {
            ScenarioProfile::Nominal => SelfTestConfig::default(),
            ScenarioProfile::Full => {
                SelfTestConfig::new(PhaseSwitches::all(), PhaseSwitches::all())
            }
        }
    }
}

pub struct Session {
    scheduler: CyclicScheduler,
    bench: SimBench,
    boot: StartupOutcome,
    steps: u64,
}

impl Session {
    /// Boots the simulated device: startup checks first, then the cyclic
    /// scheduler armed at `Init`.
    pub fn new(profile: ScenarioProfile) -> Self {
        let config = profile.config();
        let mut bench = SimBench::new();
        let boot = run_startup(&mut bench, &config);

        Self {
            scheduler: CyclicScheduler::new(config),
            bench,
            boot,
            steps: 0,
        }
    }

    /// One-line summary of the boot checks.
    pub fn boot_report(&self) -> String {
        match self.boot {
            StartupOutcome::Completed => "startup self-test passed".to_string(),
            StartupOutcome::Faulted(fault) => {
                format!("startup self-test FAILED in {}", fault.phase())
            }
        }
    }

    /// Handles one console line and returns the response lines.
    pub fn handle_command(&mut self, line: &str) -> Vec<String> {
        match diag::parse_line(line) {
            Ok(DiagCommand::Status) => vec![self.status_line()],
            Ok(DiagCommand::Step(count)) => self.step(count),
            Ok(DiagCommand::Inject(group)) => {
                self.bench.force(group);
                vec![format!("armed fault in {}", group.name())]
            }
            Ok(DiagCommand::Config) => vec![self.config_line()],
            Ok(DiagCommand::Help) => {
                let mut lines: Vec<String> = HELP_LINES.iter().map(|s| (*s).to_string()).collect();
                lines.push("exit              close the session".to_string());
                lines
            }
            Err(error) => vec![format!("{error}")],
        }
    }

    fn step(&mut self, count: u32) -> Vec<String> {
        let mut lines = Vec::new();
        for _ in 0..count {
            if self.scheduler.halted().is_some() {
                break;
            }
            self.scheduler.poll(&mut self.bench);
            self.steps += 1;

            if let Some(fault) = self.bench.fault() {
                lines.push(format!(
                    "SAFE STATE after {} steps: fault in {}",
                    self.steps,
                    fault.phase()
                ));
                break;
            }
            if self.scheduler.current_test() == TestId::Init {
                lines.push(format!(
                    "supercycle complete in {} ticks",
                    self.scheduler.last_supercycle_ticks()
                ));
            }
        }
        lines.push(self.status_line());
        lines
    }

    fn status_line(&self) -> String {
        let snapshot = self.scheduler.snapshot();
        format!(
            "step {} cursor {} | active {}:{} previous {}:{} | cycle {} ticks",
            self.steps,
            self.scheduler.current_test(),
            snapshot.active_id,
            result_name(snapshot.active_result),
            snapshot.previous_id,
            result_name(snapshot.previous_result),
            snapshot.last_supercycle_ticks,
        )
    }

    fn config_line(&self) -> String {
        let cyclic = self.scheduler.config().cyclic;
        let enabled: Vec<&str> = PhaseGroup::ALL
            .iter()
            .filter(|group| cyclic.enabled(**group))
            .map(|group| group.name())
            .collect();
        format!("cyclic: {}", enabled.join(" "))
    }

}

fn result_name(code: ResultCode) -> &'static str {
    match code {
        ResultCode::Ok => "ok",
        ResultCode::Error => "error",
        ResultCode::NotExecuted => "not-executed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_cycle(session: &mut Session) -> Vec<String> {
        session.handle_command("step 200")
    }

    #[test]
    fn nominal_boot_passes() {
        let session = Session::new(ScenarioProfile::Nominal);
        assert_eq!(session.boot_report(), "startup self-test passed");
    }

    #[test]
    fn a_full_supercycle_reports_completion() {
        let mut session = Session::new(ScenarioProfile::Nominal);
        let lines = run_cycle(&mut session);
        assert!(
            lines
                .iter()
                .any(|line| line.starts_with("supercycle complete")),
            "{lines:?}"
        );
    }

    #[test]
    fn injected_flash_fault_reaches_the_safe_state() {
        let mut session = Session::new(ScenarioProfile::Nominal);
        session.handle_command("inject flash");
        let lines = run_cycle(&mut session);

        assert!(
            lines
                .iter()
                .any(|line| line.contains("SAFE STATE") && line.contains("flash-crc")),
            "{lines:?}"
        );
        let snapshot = session.scheduler.snapshot();
        assert_eq!(snapshot.active_id, TestId::FlashCrc);
        assert_eq!(snapshot.active_result, ResultCode::Error);
    }

    #[test]
    fn halted_session_stops_stepping() {
        let mut session = Session::new(ScenarioProfile::Nominal);
        session.handle_command("inject adc");
        run_cycle(&mut session);
        let steps_at_halt = session.steps;

        session.handle_command("step 50");
        assert_eq!(session.steps, steps_at_halt);
    }

    #[test]
    fn unknown_commands_get_a_bounded_reply() {
        let mut session = Session::new(ScenarioProfile::Nominal);
        let lines = session.handle_command("warp 9");
        assert_eq!(lines, ["unrecognized command"]);
    }

    #[test]
    fn config_lists_the_profile_switches() {
        let nominal = Session::new(ScenarioProfile::Nominal);
        assert!(!nominal.config_line().contains("uart"));

        let full = Session::new(ScenarioProfile::Full);
        assert!(full.config_line().contains("uart"));
    }
}
