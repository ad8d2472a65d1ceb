//! Fixed-rate driver for the cyclic scheduler.

use defmt::info;
use embassy_time::{Duration, Ticker};

use selftest_core::phase::TestId;
use selftest_core::sched::CyclicScheduler;

use super::SNAPSHOT;
use crate::hw::McuBench;

/// One bounded self-test step per tick.
const TICK: Duration = Duration::from_millis(10);

#[embassy_executor::task]
pub async fn run(mut scheduler: CyclicScheduler, mut bench: McuBench<'static>) -> ! {
    let mut ticker = Ticker::every(TICK);
    loop {
        ticker.next().await;
        scheduler.poll(&mut bench);

        let snapshot = scheduler.snapshot();
        SNAPSHOT.lock(|cell| cell.set(Some(snapshot)));

        if scheduler.current_test() == TestId::Init {
            info!(
                "supercycle complete in {} ticks",
                snapshot.last_supercycle_ticks
            );
        }
    }
}
