//! The machine behind the core's mutex: architectural state plus the
//! engine-owned bookkeeping (decode cache, breakpoints, counters, sinks).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rv32sim_core::{ArchState, HaltReason};
use rv32sim_isa::{decode_at, Instruction, Outcome};

use crate::counter::{Counters, RetireSink};
use crate::DebugError;

/// A software breakpoint: the bytes the `ebreak` stub replaced.
struct Breakpoint {
    original: Vec<u8>,
}

/// The full-width and compressed `ebreak` encodings written over
/// breakpointed instructions.
const EBREAK: u32 = 0x0010_0073;
const C_EBREAK: u16 = 0x9002;

pub(crate) struct Machine {
    pub(crate) state: ArchState,
    /// Decoded instructions memoized by PC. Entries whose byte range a
    /// store touches are dropped before the next fetch.
    icache: HashMap<u32, Instruction>,
    breakpoints: HashMap<u32, Breakpoint>,
    /// Addresses with an active breakpoint, shared with the `ebreak` hook
    /// installed in the state.
    bp_addrs: Arc<Mutex<HashSet<u32>>>,
    pub(crate) counters: Counters,
    sinks: Vec<Box<dyn RetireSink>>,
}

impl Machine {
    pub(crate) fn new(mut state: ArchState) -> Self {
        let bp_addrs = Arc::new(Mutex::new(HashSet::new()));
        let hook_addrs = Arc::clone(&bp_addrs);
        // First in line for ebreak events: a hit on a registered address
        // reports the breakpoint; anything else (semihosting, a program's
        // own ebreak) passes to later handlers.
        state.add_ebreak_handler(Box::new(move |view: &mut rv32sim_core::HartView<'_>| {
            if hook_addrs.lock().unwrap().contains(&view.pc) {
                view.request_halt(HaltReason::Breakpoint(view.pc));
                rv32sim_core::Handled::Yes
            } else {
                rv32sim_core::Handled::No
            }
        }));
        Self {
            state,
            icache: HashMap::new(),
            breakpoints: HashMap::new(),
            bp_addrs,
            counters: Counters::new(),
            sinks: Vec::new(),
        }
    }

    pub(crate) fn add_sink(&mut self, sink: Box<dyn RetireSink>) {
        self.sinks.push(sink);
    }

    /// The single execution loop: fetch, decode, execute, retire, check.
    /// Returns the halt reason once any halt condition fires at an
    /// instruction boundary.
    pub(crate) fn run(&mut self, halt_req: &AtomicBool, budget: Option<u64>) -> HaltReason {
        let mut executed = 0u64;
        loop {
            // Instruction boundary: consume pending conditions in priority
            // order. Pending halts recorded by the previous instruction
            // (traps, semihost exits, breakpoints) win over an async halt
            // request, which wins over step completion.
            if let Some(reason) = self.state.take_pending_halt() {
                log::debug!("halting: {reason}");
                return reason;
            }
            if halt_req.swap(false, Ordering::SeqCst) {
                log::debug!("halting: user request");
                return HaltReason::UserHalt;
            }
            if let Some(limit) = budget {
                if executed >= limit {
                    return HaltReason::StepComplete;
                }
            }

            self.invalidate_written_decodes();

            let pc = self.state.pc;
            let inst = match self.icache.get(&pc) {
                Some(cached) => *cached,
                None => {
                    let decoded = decode_at(&mut self.state, pc);
                    self.icache.insert(pc, decoded);
                    decoded
                }
            };

            match inst.execute(&mut self.state) {
                Outcome::Advance => self.state.pc = pc.wrapping_add(inst.width),
                Outcome::Jump(target) => self.state.pc = target,
                // The instruction did not retire; the boundary check picks
                // up whatever it recorded.
                Outcome::Trapped => continue,
            }

            executed += 1;
            self.state.csrs.minstret += 1;
            self.state.csrs.mcycle += 1;
            self.counters.retire(inst.class);
            for sink in &mut self.sinks {
                sink.retired(pc, &inst);
            }
        }
    }

    /// Drop cached decodes whose bytes were overwritten since the last
    /// boundary (program stores, debug pokes, breakpoint stubs alike).
    fn invalidate_written_decodes(&mut self) {
        if self.state.mem.journal_is_empty() {
            return;
        }
        for (addr, len) in self.state.mem.drain_journal() {
            let end = addr.wrapping_add(len);
            self.icache
                .retain(|pc, inst| !(*pc < end && pc.wrapping_add(inst.width) > addr));
        }
    }

    // Debug-side memory access bypasses the watcher (a debugger pokes raw
    // memory, it does not perform HTIF rendezvous) and sees the original
    // bytes under active breakpoints.

    pub(crate) fn read_memory(&self, addr: u32, len: u32) -> Vec<u8> {
        let mut buf = vec![0u8; len as usize];
        self.state.mem.load(addr, &mut buf);
        for (bp_addr, bp) in &self.breakpoints {
            let bp_len = bp.original.len() as u32;
            for i in 0..bp_len {
                let byte_addr = bp_addr.wrapping_add(i);
                if byte_addr.wrapping_sub(addr) < len {
                    buf[byte_addr.wrapping_sub(addr) as usize] = bp.original[i as usize];
                }
            }
        }
        buf
    }

    pub(crate) fn write_memory(&mut self, addr: u32, bytes: &[u8]) {
        self.state.mem.store(addr, bytes);
        self.state.atomics.note_store(addr, bytes.len() as u32);
    }

    pub(crate) fn set_breakpoint(&mut self, addr: u32) -> Result<(), DebugError> {
        if self.breakpoints.contains_key(&addr) {
            return Err(DebugError::BreakpointExists(addr));
        }
        // Compressed originals get the compressed stub so the following
        // parcel is preserved.
        let lo = self.state.mem.load_u16(addr);
        let original = if lo & 3 == 3 {
            let bytes = self.read_memory(addr, 4);
            self.write_memory(addr, &EBREAK.to_le_bytes());
            bytes
        } else {
            let bytes = self.read_memory(addr, 2);
            self.write_memory(addr, &C_EBREAK.to_le_bytes());
            bytes
        };
        log::debug!("breakpoint set at {addr:#010x}");
        self.breakpoints.insert(addr, Breakpoint { original });
        self.bp_addrs.lock().unwrap().insert(addr);
        Ok(())
    }

    pub(crate) fn clear_breakpoint(&mut self, addr: u32) -> Result<(), DebugError> {
        let bp = self
            .breakpoints
            .remove(&addr)
            .ok_or(DebugError::NoBreakpoint(addr))?;
        self.bp_addrs.lock().unwrap().remove(&addr);
        self.state.mem.store(addr, &bp.original);
        self.state.atomics.note_store(addr, bp.original.len() as u32);
        log::debug!("breakpoint cleared at {addr:#010x}");
        Ok(())
    }

    pub(crate) fn clear_all_breakpoints(&mut self) {
        let addrs: Vec<u32> = self.breakpoints.keys().copied().collect();
        for addr in addrs {
            let _ = self.clear_breakpoint(addr);
        }
    }
}
