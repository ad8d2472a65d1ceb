//! Phase identifiers and verdict types shared by the cyclic scheduler and the
//! startup sequencer.
//!
//! Identifiers are spaced with a stride of ten between major phases so a phase
//! that grows sub-steps (the RAM march occupies three consecutive values, the
//! flash CRC two) never collides with its successor. The numeric values are
//! part of the diagnostics surface: an external reader that captures a raw
//! identifier after a halt can map it back without a firmware image.

use core::fmt;

/// Spacing between major phase identifiers.
pub const PHASE_STRIDE: u16 = 10;

/// One step of the self-test sequence.
///
/// The order of the variants is the execution order of one supercycle.
/// `Exit` is not a test: reaching it means a full supercycle completed and the
/// cursor resets to `Init`. The `Udb*` identifiers are reserved for a
/// programmable-logic block check and currently never execute.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum TestId {
    Init = 0,
    CpuRegister = 10,
    CpuProgramCounter = 20,
    TimeBase = 30,
    RamSetup = 40,
    RamMarch = 41,
    RamAdvance = 42,
    Stack = 50,
    StackOverflow = 60,
    FlashSetup = 70,
    FlashCrc = 71,
    IoSetup = 80,
    IoPort = 81,
    UdbSetup = 90,
    UdbCheck = 91,
    Adc = 100,
    UartSetup = 110,
    UartCheck = 111,
    Exit = 120,
}

impl TestId {
    /// Major phase entry points in supercycle order.
    ///
    /// The skip chain walks this table when a phase is disabled; `Exit` is the
    /// unconditional terminator.
    pub const MAJOR_ENTRIES: [TestId; 12] = [
        TestId::CpuRegister,
        TestId::CpuProgramCounter,
        TestId::TimeBase,
        TestId::RamSetup,
        TestId::Stack,
        TestId::StackOverflow,
        TestId::FlashSetup,
        TestId::IoSetup,
        TestId::UdbSetup,
        TestId::Adc,
        TestId::UartSetup,
        TestId::Exit,
    ];

    /// Raw identifier value as reported over diagnostics channels.
    #[must_use]
    pub const fn as_raw(self) -> u16 {
        self as u16
    }

    /// Attempts to decode a raw identifier captured from a diagnostics reader.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(TestId::Init),
            10 => Some(TestId::CpuRegister),
            20 => Some(TestId::CpuProgramCounter),
            30 => Some(TestId::TimeBase),
            40 => Some(TestId::RamSetup),
            41 => Some(TestId::RamMarch),
            42 => Some(TestId::RamAdvance),
            50 => Some(TestId::Stack),
            60 => Some(TestId::StackOverflow),
            70 => Some(TestId::FlashSetup),
            71 => Some(TestId::FlashCrc),
            80 => Some(TestId::IoSetup),
            81 => Some(TestId::IoPort),
            90 => Some(TestId::UdbSetup),
            91 => Some(TestId::UdbCheck),
            100 => Some(TestId::Adc),
            110 => Some(TestId::UartSetup),
            111 => Some(TestId::UartCheck),
            120 => Some(TestId::Exit),
            _ => None,
        }
    }

    /// Stable name used by the diagnostics console and the emulator.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            TestId::Init => "init",
            TestId::CpuRegister => "cpu-register",
            TestId::CpuProgramCounter => "program-counter",
            TestId::TimeBase => "time-base",
            TestId::RamSetup => "ram-setup",
            TestId::RamMarch => "ram-march",
            TestId::RamAdvance => "ram-advance",
            TestId::Stack => "stack",
            TestId::StackOverflow => "stack-overflow",
            TestId::FlashSetup => "flash-setup",
            TestId::FlashCrc => "flash-crc",
            TestId::IoSetup => "io-setup",
            TestId::IoPort => "io-port",
            TestId::UdbSetup => "udb-setup",
            TestId::UdbCheck => "udb-check",
            TestId::Adc => "adc",
            TestId::UartSetup => "uart-setup",
            TestId::UartCheck => "uart-check",
            TestId::Exit => "exit",
        }
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logged outcome of a phase.
///
/// A phase skipped by configuration keeps `NotExecuted`: a test that never ran
/// must not be reported as a passed test.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResultCode {
    Ok,
    Error,
    NotExecuted,
}

/// Outcome of a one-shot hardware check.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    /// Builds a verdict from a boolean pass condition.
    #[must_use]
    pub const fn from_pass(pass: bool) -> Self {
        if pass { Verdict::Pass } else { Verdict::Fail }
    }

    /// Returns `true` for [`Verdict::Pass`].
    #[must_use]
    pub const fn is_pass(self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Outcome of one RAM march tile.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MarchStatus {
    /// Tile passed; more of the region remains below the hard upper address.
    StillTesting,
    /// Tile passed and the scan reached the hard upper address.
    Complete,
    /// A cell failed the march pattern.
    Error,
}

/// Reason the supervisor entered the safe state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultKind {
    /// A hardware check reported a fault in the named phase.
    Phase(TestId),
    /// The scheduler found internally inconsistent state while dispatching
    /// the named phase.
    Internal(TestId),
}

impl FaultKind {
    /// The phase the supervisor was executing when it stopped.
    #[must_use]
    pub const fn phase(self) -> TestId {
        match self {
            FaultKind::Phase(id) | FaultKind::Internal(id) => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_strided_and_ordered() {
        let mut previous = TestId::Init.as_raw();
        for entry in &TestId::MAJOR_ENTRIES {
            let raw = entry.as_raw();
            assert!(raw > previous, "{entry} out of order");
            assert_eq!(raw % PHASE_STRIDE, 0, "{entry} off the stride grid");
            previous = raw;
        }
    }

    #[test]
    fn sub_steps_sit_between_their_neighbours() {
        assert_eq!(TestId::RamMarch.as_raw(), TestId::RamSetup.as_raw() + 1);
        assert_eq!(TestId::RamAdvance.as_raw(), TestId::RamSetup.as_raw() + 2);
        assert!(TestId::RamAdvance.as_raw() < TestId::Stack.as_raw());
        assert_eq!(TestId::FlashCrc.as_raw(), TestId::FlashSetup.as_raw() + 1);
        assert_eq!(TestId::IoPort.as_raw(), TestId::IoSetup.as_raw() + 1);
        assert_eq!(TestId::UartCheck.as_raw(), TestId::UartSetup.as_raw() + 1);
    }

    #[test]
    fn raw_round_trip_covers_every_identifier() {
        let all = [
            TestId::Init,
            TestId::CpuRegister,
            TestId::CpuProgramCounter,
            TestId::TimeBase,
            TestId::RamSetup,
            TestId::RamMarch,
            TestId::RamAdvance,
            TestId::Stack,
            TestId::StackOverflow,
            TestId::FlashSetup,
            TestId::FlashCrc,
            TestId::IoSetup,
            TestId::IoPort,
            TestId::UdbSetup,
            TestId::UdbCheck,
            TestId::Adc,
            TestId::UartSetup,
            TestId::UartCheck,
            TestId::Exit,
        ];
        for id in all {
            assert_eq!(TestId::from_raw(id.as_raw()), Some(id));
        }
        assert_eq!(TestId::from_raw(1), None);
        assert_eq!(TestId::from_raw(121), None);
    }

    #[test]
    fn fault_kind_reports_the_failing_phase() {
        assert_eq!(FaultKind::Phase(TestId::Adc).phase(), TestId::Adc);
        assert_eq!(
            FaultKind::Internal(TestId::FlashCrc).phase(),
            TestId::FlashCrc
        );
    }
}
