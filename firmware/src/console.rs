//! Line assembly and response rendering for the UART diagnostics console.
//!
//! Kept free of hardware types so the command handling and the exact response
//! text can be unit tested on the host.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::fmt::Write as _;

use heapless::{String, Vec};
use selftest_core::config::{PhaseGroup, PhaseSwitches};
use selftest_core::diag::{self, DiagCommand, DiagParseError};
use selftest_core::phase::ResultCode;
use selftest_core::report::LogSnapshot;

/// Longest accepted console line, terminator excluded.
pub const MAX_LINE: usize = 64;

/// Longest rendered response line.
pub const MAX_RESPONSE: usize = 128;

/// Accumulates received bytes into commands, one line at a time.
pub struct LineBuffer {
    buf: Vec<u8, MAX_LINE>,
    overflowed: bool,
}

impl LineBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            overflowed: false,
        }
    }

    /// Feeds one received byte.
    ///
    /// Returns the parse result when the byte completes a line; blank lines
    /// are swallowed. An over-long line is consumed to its terminator and
    /// reported as unrecognized.
    pub fn push(&mut self, byte: u8) -> Option<Result<DiagCommand, DiagParseError>> {
        if byte == b'\r' || byte == b'\n' {
            let overflowed = self.overflowed;
            self.overflowed = false;

            let result = if overflowed {
                Some(Err(DiagParseError::Unrecognized))
            } else {
                match core::str::from_utf8(&self.buf) {
                    Ok(line) => match diag::parse_line(line) {
                        Err(DiagParseError::Empty) => None,
                        other => Some(other),
                    },
                    Err(_) => Some(Err(DiagParseError::Unrecognized)),
                }
            };
            self.buf.clear();
            return result;
        }

        if self.buf.push(byte).is_err() {
            self.overflowed = true;
        }
        None
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn result_name(code: ResultCode) -> &'static str {
    match code {
        ResultCode::Ok => "ok",
        ResultCode::Error => "error",
        ResultCode::NotExecuted => "not-executed",
    }
}

/// Renders the `status` response line.
#[must_use]
pub fn render_status(snapshot: &LogSnapshot) -> String<MAX_RESPONSE> {
    let mut line = String::new();
    let _ = write!(
        line,
        "active {}:{} previous {}:{} cycle {}t",
        snapshot.active_id,
        result_name(snapshot.active_result),
        snapshot.previous_id,
        result_name(snapshot.previous_result),
        snapshot.last_supercycle_ticks,
    );
    line
}

/// Renders the `config` response line: the enabled cyclic phases.
#[must_use]
pub fn render_config(cyclic: &PhaseSwitches) -> String<MAX_RESPONSE> {
    let mut line = String::new();
    let _ = line.push_str("cyclic:");
    for group in PhaseGroup::ALL {
        if cyclic.enabled(group) {
            let _ = line.push(' ');
            let _ = line.push_str(group.name());
        }
    }
    line
}
