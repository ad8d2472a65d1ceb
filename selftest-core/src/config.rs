//! Runtime configuration for the supervisor.
//!
//! The original safety library selected phases with preprocessor switches; here
//! every switch is a plain value handed to the supervisor at construction, so
//! one binary can run the full matrix of configurations under test. Startup
//! and cyclic execution carry independent switch sets: a phase may run at boot
//! but be skipped cyclically (the UART check usually is, because injected test
//! bytes would corrupt live bus traffic).

use crate::phase::TestId;

/// Default march tile in bytes. One cyclic call never scans more than this.
pub const DEFAULT_RAM_TILE: u32 = 0x100;

/// Default flash CRC tile in bytes.
pub const DEFAULT_FLASH_TILE: u32 = 0x400;

/// Major phase groups that can be switched on and off.
///
/// One value per configurable group; the RAM and flash groups cover all of
/// their sub-steps. The reserved programmable-logic identifiers have no
/// switch because they never execute.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhaseGroup {
    CpuRegister,
    CpuProgramCounter,
    TimeBase,
    Ram,
    Stack,
    StackOverflow,
    Flash,
    Io,
    Adc,
    Uart,
}

impl PhaseGroup {
    /// Every switchable group, in supercycle order.
    pub const ALL: [PhaseGroup; 10] = [
        PhaseGroup::CpuRegister,
        PhaseGroup::CpuProgramCounter,
        PhaseGroup::TimeBase,
        PhaseGroup::Ram,
        PhaseGroup::Stack,
        PhaseGroup::StackOverflow,
        PhaseGroup::Flash,
        PhaseGroup::Io,
        PhaseGroup::Adc,
        PhaseGroup::Uart,
    ];

    /// Stable name accepted by the diagnostics console.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            PhaseGroup::CpuRegister => "cpu-register",
            PhaseGroup::CpuProgramCounter => "program-counter",
            PhaseGroup::TimeBase => "time-base",
            PhaseGroup::Ram => "ram",
            PhaseGroup::Stack => "stack",
            PhaseGroup::StackOverflow => "stack-overflow",
            PhaseGroup::Flash => "flash",
            PhaseGroup::Io => "io",
            PhaseGroup::Adc => "adc",
            PhaseGroup::Uart => "uart",
        }
    }

    /// The group a dispatchable identifier belongs to, if it has a switch.
    #[must_use]
    pub const fn of(id: TestId) -> Option<Self> {
        match id {
            TestId::CpuRegister => Some(PhaseGroup::CpuRegister),
            TestId::CpuProgramCounter => Some(PhaseGroup::CpuProgramCounter),
            TestId::TimeBase => Some(PhaseGroup::TimeBase),
            TestId::RamSetup | TestId::RamMarch | TestId::RamAdvance => Some(PhaseGroup::Ram),
            TestId::Stack => Some(PhaseGroup::Stack),
            TestId::StackOverflow => Some(PhaseGroup::StackOverflow),
            TestId::FlashSetup | TestId::FlashCrc => Some(PhaseGroup::Flash),
            TestId::IoSetup | TestId::IoPort => Some(PhaseGroup::Io),
            TestId::Adc => Some(PhaseGroup::Adc),
            TestId::UartSetup | TestId::UartCheck => Some(PhaseGroup::Uart),
            TestId::Init | TestId::UdbSetup | TestId::UdbCheck | TestId::Exit => None,
        }
    }
}

/// Enable switches for one execution context (startup or cyclic).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhaseSwitches {
    pub cpu_register: bool,
    pub cpu_program_counter: bool,
    pub time_base: bool,
    pub ram: bool,
    pub stack: bool,
    pub stack_overflow: bool,
    pub flash: bool,
    pub io: bool,
    pub adc: bool,
    pub uart: bool,
}

impl PhaseSwitches {
    /// Every phase enabled.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            cpu_register: true,
            cpu_program_counter: true,
            time_base: true,
            ram: true,
            stack: true,
            stack_overflow: true,
            flash: true,
            io: true,
            adc: true,
            uart: true,
        }
    }

    /// Every phase disabled. Useful as a base for test configurations.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            cpu_register: false,
            cpu_program_counter: false,
            time_base: false,
            ram: false,
            stack: false,
            stack_overflow: false,
            flash: false,
            io: false,
            adc: false,
            uart: false,
        }
    }

    /// Returns a copy with the named group switched.
    #[must_use]
    pub const fn with(mut self, group: PhaseGroup, enabled: bool) -> Self {
        match group {
            PhaseGroup::CpuRegister => self.cpu_register = enabled,
            PhaseGroup::CpuProgramCounter => self.cpu_program_counter = enabled,
            PhaseGroup::TimeBase => self.time_base = enabled,
            PhaseGroup::Ram => self.ram = enabled,
            PhaseGroup::Stack => self.stack = enabled,
            PhaseGroup::StackOverflow => self.stack_overflow = enabled,
            PhaseGroup::Flash => self.flash = enabled,
            PhaseGroup::Io => self.io = enabled,
            PhaseGroup::Adc => self.adc = enabled,
            PhaseGroup::Uart => self.uart = enabled,
        }
        self
    }

    /// Whether the named group is enabled.
    #[must_use]
    pub const fn enabled(&self, group: PhaseGroup) -> bool {
        match group {
            PhaseGroup::CpuRegister => self.cpu_register,
            PhaseGroup::CpuProgramCounter => self.cpu_program_counter,
            PhaseGroup::TimeBase => self.time_base,
            PhaseGroup::Ram => self.ram,
            PhaseGroup::Stack => self.stack,
            PhaseGroup::StackOverflow => self.stack_overflow,
            PhaseGroup::Flash => self.flash,
            PhaseGroup::Io => self.io,
            PhaseGroup::Adc => self.adc,
            PhaseGroup::Uart => self.uart,
        }
    }

    /// Whether the major phase starting at `entry` runs in this context.
    ///
    /// `Exit` always runs; the reserved identifiers never do.
    #[must_use]
    pub const fn entry_enabled(&self, entry: TestId) -> bool {
        match entry {
            TestId::Exit => true,
            TestId::UdbSetup | TestId::UdbCheck => false,
            other => match PhaseGroup::of(other) {
                Some(group) => self.enabled(group),
                None => false,
            },
        }
    }
}

impl Default for PhaseSwitches {
    fn default() -> Self {
        // The cyclic UART check stays off by default: the console owns the
        // UART and injected test bytes would corrupt it.
        Self::all().with(PhaseGroup::Uart, false)
    }
}

/// Validation-only fault injection.
///
/// Each switch forces the named phase to report an error so the fail-stop
/// path can be exercised end to end. All switches default off and must stay
/// off outside validation builds.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultInjection {
    pub cpu_register: bool,
    pub cpu_program_counter: bool,
    pub time_base: bool,
    pub ram: bool,
    pub stack: bool,
    pub stack_overflow: bool,
    pub flash: bool,
    pub io: bool,
    pub adc: bool,
    pub uart: bool,
}

impl FaultInjection {
    /// No fault injected.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            cpu_register: false,
            cpu_program_counter: false,
            time_base: false,
            ram: false,
            stack: false,
            stack_overflow: false,
            flash: false,
            io: false,
            adc: false,
            uart: false,
        }
    }

    /// Returns a copy that forces the named group to fail.
    #[must_use]
    pub const fn forcing(group: PhaseGroup) -> Self {
        Self::disabled().with(group, true)
    }

    /// Returns a copy with the named group's injection switched.
    #[must_use]
    pub const fn with(mut self, group: PhaseGroup, inject: bool) -> Self {
        match group {
            PhaseGroup::CpuRegister => self.cpu_register = inject,
            PhaseGroup::CpuProgramCounter => self.cpu_program_counter = inject,
            PhaseGroup::TimeBase => self.time_base = inject,
            PhaseGroup::Ram => self.ram = inject,
            PhaseGroup::Stack => self.stack = inject,
            PhaseGroup::StackOverflow => self.stack_overflow = inject,
            PhaseGroup::Flash => self.flash = inject,
            PhaseGroup::Io => self.io = inject,
            PhaseGroup::Adc => self.adc = inject,
            PhaseGroup::Uart => self.uart = inject,
        }
        self
    }

    /// Whether an error is forced for the named group.
    #[must_use]
    pub const fn forced(&self, group: PhaseGroup) -> bool {
        match group {
            PhaseGroup::CpuRegister => self.cpu_register,
            PhaseGroup::CpuProgramCounter => self.cpu_program_counter,
            PhaseGroup::TimeBase => self.time_base,
            PhaseGroup::Ram => self.ram,
            PhaseGroup::Stack => self.stack,
            PhaseGroup::StackOverflow => self.stack_overflow,
            PhaseGroup::Flash => self.flash,
            PhaseGroup::Io => self.io,
            PhaseGroup::Adc => self.adc,
            PhaseGroup::Uart => self.uart,
        }
    }
}

/// Full supervisor configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SelfTestConfig {
    /// Phases executed by the startup sequencer.
    pub startup: PhaseSwitches,
    /// Phases executed by the cyclic scheduler.
    pub cyclic: PhaseSwitches,
    /// Validation-only forced faults.
    pub inject: FaultInjection,
    /// Bytes of RAM marched per cyclic call.
    pub ram_tile: u32,
    /// Bytes of flash fed to the CRC per cyclic call.
    pub flash_tile: u32,
}

impl SelfTestConfig {
    /// Configuration with the given switch sets and default tile sizes.
    #[must_use]
    pub const fn new(startup: PhaseSwitches, cyclic: PhaseSwitches) -> Self {
        Self {
            startup,
            cyclic,
            inject: FaultInjection::disabled(),
            ram_tile: DEFAULT_RAM_TILE,
            flash_tile: DEFAULT_FLASH_TILE,
        }
    }

    /// Returns a copy with the given fault injection switches.
    #[must_use]
    pub const fn with_injection(mut self, inject: FaultInjection) -> Self {
        self.inject = inject;
        self
    }

    /// Returns a copy with the given tile sizes. Both must be non-zero.
    #[must_use]
    pub const fn with_tiles(mut self, ram_tile: u32, flash_tile: u32) -> Self {
        assert!(ram_tile > 0 && flash_tile > 0);
        self.ram_tile = ram_tile;
        self.flash_tile = flash_tile;
        self
    }
}

impl Default for SelfTestConfig {
    fn default() -> Self {
        Self::new(PhaseSwitches::all(), PhaseSwitches::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cyclic_switches_keep_uart_off() {
        let config = SelfTestConfig::default();
        assert!(config.startup.uart);
        assert!(!config.cyclic.uart);
        assert!(config.cyclic.ram);
        assert_eq!(config.inject, FaultInjection::disabled());
    }

    #[test]
    fn entry_enabled_follows_group_switches() {
        let switches = PhaseSwitches::none()
            .with(PhaseGroup::Ram, true)
            .with(PhaseGroup::Adc, true);
        assert!(switches.entry_enabled(TestId::RamSetup));
        assert!(switches.entry_enabled(TestId::Adc));
        assert!(!switches.entry_enabled(TestId::Stack));
        assert!(switches.entry_enabled(TestId::Exit));
    }

    #[test]
    fn reserved_entries_never_enable() {
        let switches = PhaseSwitches::all();
        assert!(!switches.entry_enabled(TestId::UdbSetup));
        assert!(!switches.entry_enabled(TestId::UdbCheck));
    }

    #[test]
    fn injection_targets_one_group() {
        let inject = FaultInjection::forcing(PhaseGroup::Flash);
        assert!(inject.forced(PhaseGroup::Flash));
        assert!(!inject.forced(PhaseGroup::Ram));
        assert_eq!(inject.with(PhaseGroup::Flash, false), FaultInjection::disabled());
    }

    #[test]
    fn sub_steps_map_to_their_group() {
        assert_eq!(PhaseGroup::of(TestId::RamMarch), Some(PhaseGroup::Ram));
        assert_eq!(PhaseGroup::of(TestId::FlashCrc), Some(PhaseGroup::Flash));
        assert_eq!(PhaseGroup::of(TestId::UartCheck), Some(PhaseGroup::Uart));
        assert_eq!(PhaseGroup::of(TestId::Exit), None);
        assert_eq!(PhaseGroup::of(TestId::UdbSetup), None);
    }
}
