//! Phase ordering and skip behavior over whole supercycles.

mod common;

use common::MockBench;
use selftest_core::config::{PhaseGroup, PhaseSwitches, SelfTestConfig};
use selftest_core::phase::{ResultCode, TestId};
use selftest_core::sched::CyclicScheduler;

/// Polls until the cursor returns to `Init`, collecting every decided
/// `(phase, result)` pair in order.
fn run_supercycle(
    scheduler: &mut CyclicScheduler,
    bench: &mut MockBench,
) -> Vec<(TestId, ResultCode)> {
    let mut decided = Vec::new();
    let mut last = scheduler.log().previous();

    for _ in 0..1_000 {
        scheduler.poll(bench);
        let previous = scheduler.log().previous();
        if previous != last {
            decided.push((previous.id, previous.result));
            last = previous;
        }
        if scheduler.current_test() == TestId::Init {
            return decided;
        }
    }
    panic!("supercycle did not close");
}

#[test]
fn all_enabled_phases_complete_in_fixed_order() {
    let mut bench = MockBench::new();
    let mut scheduler = CyclicScheduler::new(SelfTestConfig::new(
        PhaseSwitches::all(),
        PhaseSwitches::all(),
    ));

    let decided = run_supercycle(&mut scheduler, &mut bench);

    let expected = [
        (TestId::CpuRegister, ResultCode::Ok),
        (TestId::CpuProgramCounter, ResultCode::Ok),
        (TestId::TimeBase, ResultCode::Ok),
        (TestId::RamAdvance, ResultCode::Ok),
        (TestId::Stack, ResultCode::Ok),
        (TestId::StackOverflow, ResultCode::Ok),
        (TestId::FlashCrc, ResultCode::Ok),
        (TestId::IoPort, ResultCode::Ok),
        (TestId::Adc, ResultCode::Ok),
        (TestId::UartCheck, ResultCode::Ok),
        (TestId::Exit, ResultCode::NotExecuted),
    ];
    assert_eq!(decided, expected);
    assert!(bench.faults.is_empty());
}

#[test]
fn default_config_skips_the_cyclic_uart_check() {
    let mut bench = MockBench::new();
    let mut scheduler = CyclicScheduler::new(SelfTestConfig::default());

    let decided = run_supercycle(&mut scheduler, &mut bench);

    assert!(decided.iter().all(|(id, _)| *id != TestId::UartCheck));
    assert_eq!(decided.last(), Some(&(TestId::Exit, ResultCode::NotExecuted)));
    assert!(!bench.calls.iter().any(|call| call.starts_with("uart")));
}

#[test]
fn disabled_phases_are_invisible_in_the_log() {
    // Only the register and stack checks run; everything between them and
    // after them is skipped without a log entry.
    let cyclic = PhaseSwitches::none()
        .with(PhaseGroup::CpuRegister, true)
        .with(PhaseGroup::Stack, true);
    let mut bench = MockBench::new();
    let mut scheduler = CyclicScheduler::new(SelfTestConfig::new(PhaseSwitches::all(), cyclic));

    // Init arms the cursor directly at the first enabled phase.
    scheduler.poll(&mut bench);
    assert_eq!(scheduler.current_test(), TestId::CpuRegister);

    scheduler.poll(&mut bench);
    assert_eq!(scheduler.log().previous().id, TestId::CpuRegister);
    assert_eq!(scheduler.current_test(), TestId::Stack);

    // Stack completes; StackOverflow is disabled, so the cursor jumps past it
    // with no log entry for the skipped phase.
    scheduler.poll(&mut bench);
    assert_eq!(scheduler.log().previous().id, TestId::Stack);
    assert_eq!(scheduler.log().previous().result, ResultCode::Ok);
    assert_eq!(scheduler.current_test(), TestId::Exit);

    scheduler.poll(&mut bench);
    assert_eq!(scheduler.current_test(), TestId::Init);

    let touched: Vec<&str> = bench.calls.iter().map(String::as_str).collect();
    assert_eq!(touched, ["cpu-register", "stack-guard"]);
}

#[test]
fn exit_marks_a_fresh_cycle_and_captures_duration() {
    let mut bench = MockBench::new();
    let mut scheduler = CyclicScheduler::new(SelfTestConfig::default());

    assert_eq!(scheduler.last_supercycle_ticks(), 0);
    run_supercycle(&mut scheduler, &mut bench);

    assert_eq!(scheduler.log().previous().id, TestId::Exit);
    assert_eq!(scheduler.log().previous().result, ResultCode::NotExecuted);
    assert_eq!(scheduler.log().active().id, TestId::Init);
    assert_eq!(scheduler.log().active().result, ResultCode::NotExecuted);

    // The mock tick advances once per bench call, so a completed cycle spans
    // a non-zero tick window.
    assert!(scheduler.last_supercycle_ticks() > 0);

    let snapshot = scheduler.snapshot();
    assert_eq!(snapshot.previous_id, TestId::Exit);
    assert_eq!(snapshot.active_id, TestId::Init);
    assert_eq!(
        snapshot.last_supercycle_ticks,
        scheduler.last_supercycle_ticks()
    );
}

#[test]
fn supercycles_repeat_without_drift() {
    let mut bench = MockBench::new();
    let mut scheduler = CyclicScheduler::new(SelfTestConfig::default());

    let first = run_supercycle(&mut scheduler, &mut bench);
    let second = run_supercycle(&mut scheduler, &mut bench);
    assert_eq!(first, second);
    assert!(bench.faults.is_empty());
}
