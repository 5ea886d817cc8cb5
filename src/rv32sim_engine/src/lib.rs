//! The core top: run/step/halt state machine and the debug interface.
//!
//! Two threads cooperate: the simulation thread runs the single execution
//! loop, and a control thread (shell, signal handler) may request a halt at
//! any time. The halt request is one atomic flag polled at every
//! instruction boundary; run-state transitions are published under a mutex
//! and condition variable that [`Core::wait`] blocks on. All other control
//! operations require the core to be halted and return a structured error
//! otherwise.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use rv32sim_core::{ArchState, RegAccessError};

pub mod counter;
mod machine;
#[cfg(unix)]
mod signal;

pub use counter::{Counters, RetireSink};
pub use rv32sim_core::HaltReason;

use machine::Machine;

/// The core's run-state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Constructed, never run.
    Idle,
    /// The simulation thread is executing instructions.
    Running,
    /// Stopped; debug access is permitted.
    Halted(HaltReason),
}

#[derive(Debug, thiserror::Error)]
pub enum DebugError {
    #[error("operation requires a halted core")]
    NotHalted,
    #[error(transparent)]
    Register(#[from] RegAccessError),
    #[error("no breakpoint at {0:#010x}")]
    NoBreakpoint(u32),
    #[error("breakpoint already set at {0:#010x}")]
    BreakpointExists(u32),
}

struct Shared {
    halt_req: AtomicBool,
    run_state: Mutex<RunState>,
    halted: Condvar,
    machine: Mutex<Machine>,
}

/// A single simulated hart with its execution loop and debug surface.
pub struct Core {
    shared: Arc<Shared>,
}

impl Core {
    pub fn new(state: ArchState) -> Self {
        Self {
            shared: Arc::new(Shared {
                halt_req: AtomicBool::new(false),
                run_state: Mutex::new(RunState::Idle),
                halted: Condvar::new(),
                machine: Mutex::new(Machine::new(state)),
            }),
        }
    }

    /// Start free-running execution. Returns immediately; use [`wait`] to
    /// block until the next halt.
    ///
    /// [`wait`]: Core::wait
    pub fn run(&self) -> Result<(), DebugError> {
        self.start(None)
    }

    /// Advance exactly `n` retired instructions, then halt with
    /// [`HaltReason::StepComplete`]. Returns immediately.
    pub fn step(&self, n: u64) -> Result<(), DebugError> {
        self.start(Some(n))
    }

    fn start(&self, budget: Option<u64>) -> Result<(), DebugError> {
        {
            let mut run_state = self.shared.run_state.lock().unwrap();
            if matches!(*run_state, RunState::Running) {
                return Err(DebugError::NotHalted);
            }
            *run_state = RunState::Running;
        }
        // A halt requested before this run (e.g. a SIGINT that arrived
        // while halted) does not carry over.
        self.shared.halt_req.store(false, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        thread::spawn(move || {
            let reason = shared.machine.lock().unwrap().run(&shared.halt_req, budget);
            *shared.run_state.lock().unwrap() = RunState::Halted(reason);
            shared.halted.notify_all();
        });
        Ok(())
    }

    /// Request a halt at the next instruction boundary. Non-blocking and
    /// safe from any thread; repeated requests are idempotent.
    pub fn halt(&self) {
        self.shared.halt_req.store(true, Ordering::SeqCst);
    }

    /// Block until the core is halted; returns the halt reason.
    pub fn wait(&self) -> HaltReason {
        let mut run_state = self.shared.run_state.lock().unwrap();
        loop {
            if let RunState::Halted(reason) = *run_state {
                return reason;
            }
            run_state = self.shared.halted.wait(run_state).unwrap();
        }
    }

    pub fn run_state(&self) -> RunState {
        *self.shared.run_state.lock().unwrap()
    }

    /// Route SIGINT to [`halt`] through the process-wide handler slot.
    ///
    /// [`halt`]: Core::halt
    #[cfg(unix)]
    pub fn attach_sigint(&self) {
        signal::install_handler();
        // The flag lives inside our Arc'd shared block; the destructor
        // disarms the slot before the block can be dropped.
        unsafe { signal::set_active(&self.shared.halt_req) };
    }

    #[cfg(not(unix))]
    pub fn attach_sigint(&self) {}

    /// Run `f` against the architectural state. Requires a non-running
    /// core; used by the driver for image loading and semihosting setup.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut ArchState) -> R) -> Result<R, DebugError> {
        let mut machine = self.lock_halted()?;
        Ok(f(&mut machine.state))
    }

    pub fn read_register(&self, name: &str) -> Result<u64, DebugError> {
        let machine = self.lock_halted()?;
        Ok(machine.state.read_register(name)?)
    }

    pub fn write_register(&self, name: &str, value: u64) -> Result<(), DebugError> {
        let mut machine = self.lock_halted()?;
        machine.state.write_register(name, value)?;
        Ok(())
    }

    /// Read memory through the debug port. Active software breakpoints are
    /// transparent: the returned bytes are the program's own.
    pub fn read_memory(&self, addr: u32, len: u32) -> Result<Vec<u8>, DebugError> {
        let machine = self.lock_halted()?;
        Ok(machine.read_memory(addr, len))
    }

    pub fn write_memory(&self, addr: u32, bytes: &[u8]) -> Result<(), DebugError> {
        let mut machine = self.lock_halted()?;
        machine.write_memory(addr, bytes);
        Ok(())
    }

    /// Install a software breakpoint: the instruction memory at `addr` is
    /// rewritten with the `ebreak` encoding and the original bytes are
    /// kept for restore and for debug reads.
    pub fn set_sw_breakpoint(&self, addr: u32) -> Result<(), DebugError> {
        self.lock_halted()?.set_breakpoint(addr)
    }

    pub fn clear_sw_breakpoint(&self, addr: u32) -> Result<(), DebugError> {
        self.lock_halted()?.clear_breakpoint(addr)
    }

    pub fn clear_all_breakpoints(&self) -> Result<(), DebugError> {
        self.lock_halted()?.clear_all_breakpoints();
        Ok(())
    }

    /// Register a retirement sink (trace consumers, external counters).
    pub fn add_retire_sink(&self, sink: Box<dyn RetireSink>) -> Result<(), DebugError> {
        self.lock_halted()?.add_sink(sink);
        Ok(())
    }

    /// Snapshot of the named counters.
    pub fn counters(&self) -> Result<Vec<(String, u64)>, DebugError> {
        Ok(self.lock_halted()?.counters.snapshot())
    }

    fn lock_halted(&self) -> Result<std::sync::MutexGuard<'_, Machine>, DebugError> {
        let run_state = self.shared.run_state.lock().unwrap();
        if matches!(*run_state, RunState::Running) {
            return Err(DebugError::NotHalted);
        }
        // The simulation thread only holds the machine lock while
        // Running, so this acquisition cannot block on it.
        Ok(self.shared.machine.lock().unwrap())
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        #[cfg(unix)]
        signal::clear_active(&self.shared.halt_req);
        // Transition through Halted so the simulation thread is not left
        // running against a torn-down driver.
        if matches!(self.run_state(), RunState::Running) {
            self.halt();
            self.wait();
        }
    }
}
