#![no_std]

//! Runtime self-test supervisor for a Class B safety controller.
//!
//! The crate holds the whole supervisor — phase identifiers, result log,
//! cyclic scheduler, startup sequencer, stack guard and diagnostics grammar —
//! behind a hardware seam ([`bench`]) so the same state machine runs on the
//! MCU, in the host emulator and under unit tests. It stays portable by
//! avoiding the Rust standard library and keeping every operation bounded.

pub mod bench;
pub mod config;
pub mod diag;
pub mod phase;
pub mod report;
pub mod sched;
pub mod stack_guard;
pub mod startup;

pub use bench::{DiagnosticBench, FlashLayout, RamWindow, SafeStateHandler};
pub use config::{FaultInjection, PhaseGroup, PhaseSwitches, SelfTestConfig};
pub use phase::{FaultKind, MarchStatus, ResultCode, TestId, Verdict};
pub use report::{LogSnapshot, PhaseRecord, ResultLog};
pub use sched::{CyclicScheduler, PhaseContext};
pub use startup::{StartupOutcome, run_startup};
