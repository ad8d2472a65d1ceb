use core::cell::Cell;

use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::Adc;
use embassy_stm32::bind_interrupts;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::peripherals;
use embassy_stm32::usart::{self, BufferedUart};
use embassy_sync::blocking_mutex::CriticalSectionMutex;
use static_cell::StaticCell;

use crate::hw::McuBench;
use selftest_core::config::SelfTestConfig;
use selftest_core::report::LogSnapshot;
use selftest_core::sched::CyclicScheduler;
use selftest_core::startup::run_startup;

mod console_task;
mod selftest_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Latest snapshot published by the self-test task for the console.
pub(super) static SNAPSHOT: CriticalSectionMutex<Cell<Option<LogSnapshot>>> =
    CriticalSectionMutex::new(Cell::new(None));

bind_interrupts!(struct Irqs {
    USART1 => usart::BufferedInterruptHandler<peripherals::USART1>;
});

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA9,
        PA10,
        ADC1,
        USART1,
        ..
    } = hal::init(config);

    let adc = Adc::new(ADC1);
    let io_lines = [
        Output::new(PA0, Level::Low, Speed::Low),
        Output::new(PA1, Level::Low, Speed::Low),
    ];
    let mut bench = McuBench::new(adc, io_lines);

    static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
    static RX_BUF: StaticCell<[u8; 64]> = StaticCell::new();
    let uart = BufferedUart::new(
        USART1,
        Irqs,
        PA10,
        PA9,
        TX_BUF.init([0; 256]),
        RX_BUF.init([0; 64]),
        usart::Config::default(),
    )
    .expect("console usart init");
    bench.set_console_ready();

    let selftest_config = SelfTestConfig::default();

    // Boot checks run before anything else is spawned; a failing check parks
    // the core inside the bench and never comes back.
    let outcome = run_startup(&mut bench, &selftest_config);
    defmt::info!("startup self-test: {}", outcome);

    let scheduler = CyclicScheduler::new(selftest_config);
    let cyclic = selftest_config.cyclic;

    spawner
        .spawn(selftest_task::run(scheduler, bench))
        .expect("failed to spawn self-test task");
    spawner
        .spawn(console_task::run(uart, cyclic))
        .expect("failed to spawn console task");

    core::future::pending::<()>().await;
}
