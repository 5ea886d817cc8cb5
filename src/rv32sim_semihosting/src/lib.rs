//! Semihosting backends: services a simulated program requests from its
//! host.
//!
//! Two conventions are supported, selected by the driver (mutually
//! exclusive):
//!
//!  - **HTIF**: a shared-memory rendezvous over magic addresses resolved
//!    from the executable's `tohost`/`fromhost` symbols ([`htif`]).
//!  - **ARM-style calls**: an `ebreak` bracketed by a sentinel instruction
//!    sequence, call number in `a0`, argument block in `a1` ([`arm`]).
//!
//! Both deliver program exit as a [`rv32sim_core::HaltReason::SemihostHalt`]
//! request, which the engine consumes at the next instruction boundary.

pub mod arm;
pub mod htif;

use std::io::Write;

/// Host-side output stream for the guest's console writes. Swappable so
/// tests can capture output.
pub(crate) type HostOutput = Box<dyn Write + Send>;

pub(crate) fn stdout_output() -> HostOutput {
    Box::new(std::io::stdout())
}
