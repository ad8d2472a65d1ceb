//! Diagnostics console grammar.
//!
//! A bounded command language shared by the host emulator and the firmware
//! UART console. Commands stay short; the parser composes `winnow`
//! combinators directly over the input line and never allocates, so the same
//! grammar runs on the MCU and on the host. Unknown input produces a parse
//! error, never a panic.

use core::fmt;

use winnow::ascii::{dec_uint, space1};
use winnow::combinator::{alt, preceded};
use winnow::prelude::*;

use crate::config::PhaseGroup;

/// Parsed console command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiagCommand {
    /// Print the current log snapshot.
    Status,
    /// Advance the cyclic scheduler by `n` ticks.
    Step(u32),
    /// Force the named phase group to fail (validation only).
    Inject(PhaseGroup),
    /// Print the active configuration switches.
    Config,
    /// List the available commands.
    Help,
}

/// Why a console line was rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiagParseError {
    /// The line held no command.
    Empty,
    /// The line did not match the grammar.
    Unrecognized,
}

impl fmt::Display for DiagParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagParseError::Empty => f.write_str("empty command line"),
            DiagParseError::Unrecognized => f.write_str("unrecognized command"),
        }
    }
}

/// Parses one console line into a command.
///
/// Leading and trailing whitespace is ignored; anything else must match the
/// grammar exactly.
pub fn parse_line(line: &str) -> Result<DiagCommand, DiagParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(DiagParseError::Empty);
    }
    command
        .parse(trimmed)
        .map_err(|_| DiagParseError::Unrecognized)
}

fn command(input: &mut &str) -> ModalResult<DiagCommand> {
    alt((
        preceded(("step", space1), dec_uint).map(DiagCommand::Step),
        "step".value(DiagCommand::Step(1)),
        "status".value(DiagCommand::Status),
        "config".value(DiagCommand::Config),
        "help".value(DiagCommand::Help),
        preceded(("inject", space1), phase_group).map(DiagCommand::Inject),
    ))
    .parse_next(input)
}

fn phase_group(input: &mut &str) -> ModalResult<PhaseGroup> {
    // `stack-overflow` must come before its `stack` prefix.
    alt((
        "cpu-register".value(PhaseGroup::CpuRegister),
        "program-counter".value(PhaseGroup::CpuProgramCounter),
        "time-base".value(PhaseGroup::TimeBase),
        "ram".value(PhaseGroup::Ram),
        "stack-overflow".value(PhaseGroup::StackOverflow),
        "stack".value(PhaseGroup::Stack),
        "flash".value(PhaseGroup::Flash),
        "io".value(PhaseGroup::Io),
        "adc".value(PhaseGroup::Adc),
        "uart".value(PhaseGroup::Uart),
    ))
    .parse_next(input)
}

/// One help line per command, for console `help` output.
pub const HELP_LINES: [&str; 5] = [
    "status            print active/previous phase and last supercycle ticks",
    "step [n]          advance the scheduler by n ticks (default 1)",
    "inject <phase>    force the named phase to fail (validation only)",
    "config            print the enabled phase switches",
    "help              this list",
];
