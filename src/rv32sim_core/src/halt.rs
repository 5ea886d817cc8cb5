//! Halt reasons and trap causes.

use std::fmt;

/// Why the core stopped running.
///
/// Produced when the run loop transitions to the halted state and reported
/// back through the debug interface's `wait` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// An operator requested a halt (debug `halt` call or SIGINT).
    UserHalt,
    /// A software breakpoint at the given address was hit.
    Breakpoint(u32),
    /// The program signalled completion through `ecall`.
    ProgramDone,
    /// A semihosting backend requested program exit.
    SemihostHalt {
        /// The exit code the program passed to the host.
        exit_code: u32,
    },
    /// An unrecoverable trap was taken.
    FatalTrap(TrapCause),
    /// The requested number of stepped instructions has retired.
    StepComplete,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserHalt => write!(f, "halted by user"),
            Self::Breakpoint(addr) => write!(f, "breakpoint at {addr:#010x}"),
            Self::ProgramDone => write!(f, "program done"),
            Self::SemihostHalt { exit_code } => {
                write!(f, "semihosting exit (code {exit_code})")
            }
            Self::FatalTrap(cause) => write!(f, "fatal trap: {cause}"),
            Self::StepComplete => write!(f, "step complete"),
        }
    }
}

/// Machine-mode trap causes, with their `mcause` exception codes.
///
/// Only the causes this simulator can actually raise are listed. The
/// memory model permits unaligned data access, so the misaligned
/// load/store causes never fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCause {
    InstructionAddressMisaligned,
    IllegalInstruction,
    Breakpoint,
    EnvironmentCall,
}

impl TrapCause {
    /// The exception code written to `mcause`.
    pub fn code(self) -> u32 {
        match self {
            Self::InstructionAddressMisaligned => 0,
            Self::IllegalInstruction => 2,
            Self::Breakpoint => 3,
            // Environment call from M-mode; this simulator runs machine
            // mode only.
            Self::EnvironmentCall => 11,
        }
    }
}

impl fmt::Display for TrapCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InstructionAddressMisaligned => "instruction address misaligned",
            Self::IllegalInstruction => "illegal instruction",
            Self::Breakpoint => "breakpoint",
            Self::EnvironmentCall => "environment call",
        };
        f.write_str(name)
    }
}
