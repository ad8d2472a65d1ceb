//! UART diagnostics console.
//!
//! Serves read-only queries against the snapshot published by the self-test
//! task. The scheduler-stepping and fault-injection commands exist only in
//! the host emulator; here they get a short refusal instead.

use embassy_stm32::usart::BufferedUart;
use embedded_io_async::Write;

use selftest_core::config::PhaseSwitches;
use selftest_core::diag::{DiagCommand, HELP_LINES};

use super::SNAPSHOT;
use crate::console::{LineBuffer, render_config, render_status};

#[embassy_executor::task]
pub async fn run(mut uart: BufferedUart<'static>, cyclic: PhaseSwitches) -> ! {
    let mut line = LineBuffer::new();
    let mut chunk = [0u8; 16];

    loop {
        let Ok(count) = embedded_io_async::Read::read(&mut uart, &mut chunk).await else {
            continue;
        };

        for &byte in &chunk[..count] {
            let Some(parsed) = line.push(byte) else {
                continue;
            };

            match parsed {
                Ok(DiagCommand::Status) => match SNAPSHOT.lock(|cell| cell.get()) {
                    Some(snapshot) => {
                        let text = render_status(&snapshot);
                        let _ = uart.write_all(text.as_bytes()).await;
                        let _ = uart.write_all(b"\r\n").await;
                    }
                    None => {
                        let _ = uart.write_all(b"no snapshot yet\r\n").await;
                    }
                },
                Ok(DiagCommand::Config) => {
                    let text = render_config(&cyclic);
                    let _ = uart.write_all(text.as_bytes()).await;
                    let _ = uart.write_all(b"\r\n").await;
                }
                Ok(DiagCommand::Help) => {
                    for help in HELP_LINES {
                        let _ = uart.write_all(help.as_bytes()).await;
                        let _ = uart.write_all(b"\r\n").await;
                    }
                }
                Ok(DiagCommand::Step(_) | DiagCommand::Inject(_)) => {
                    let _ = uart.write_all(b"emulator-only command\r\n").await;
                }
                Err(_) => {
                    let _ = uart.write_all(b"unrecognized command\r\n").await;
                }
            }
        }
    }
}
