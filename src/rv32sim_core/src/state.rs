//! The architectural state of the hart.
//!
//! [`ArchState`] aggregates the register banks, CSR space, FP/vector
//! sideband state, program counter, and memory (with its atomic layer and
//! watcher). Instruction semantics execute against this type; the engine
//! drives it through the fetch interface and consumes the halt requests
//! recorded here.

use crate::csr::{self, CsrError, MachineCsrs};
use crate::fpu::FpState;
use crate::halt::{HaltReason, TrapCause};
use crate::mem::{AtomicLayer, Memory};
use crate::reg::{self, FRegs, RegAccessError, RegisterRef, VRegs, XRegs};
use crate::vec::VectorState;
use crate::watch::{MemoryWatcher, ReadHook, WatchError, WriteHook};
use crate::VLENB;

/// Verdict of an `ecall`/`ebreak` handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// The handler consumed the event; later handlers are not consulted.
    Yes,
    /// The event is offered to the next handler.
    No,
}

/// Handler for `ecall`/`ebreak` events, offered in registration order.
pub type TrapHook = Box<dyn FnMut(&mut HartView<'_>) -> Handled + Send>;

/// A mutable view of the hart handed to watcher callbacks and
/// `ecall`/`ebreak` handlers.
///
/// The view deliberately excludes the watcher and the hook lists so a
/// callback cannot re-enter its own dispatch.
pub struct HartView<'a> {
    pub mem: &'a mut Memory,
    pub atomics: &'a mut AtomicLayer,
    pub xregs: &'a mut XRegs,
    pub fregs: &'a mut FRegs,
    /// PC of the instruction that caused the event.
    pub pc: u32,
    pending_halt: &'a mut Option<HaltReason>,
}

impl HartView<'_> {
    /// Ask the engine to halt at the next instruction boundary.
    pub fn request_halt(&mut self, reason: HaltReason) {
        if self.pending_halt.is_none() {
            *self.pending_halt = Some(reason);
        }
    }
}

/// Architectural state of a single RV32 hart.
pub struct ArchState {
    pub pc: u32,
    pub xregs: XRegs,
    pub fregs: FRegs,
    pub vregs: VRegs,
    pub fp: FpState,
    pub vector: VectorState,
    pub csrs: MachineCsrs,
    pub mem: Memory,
    pub atomics: AtomicLayer,
    watcher: MemoryWatcher,
    ecall_hooks: Vec<TrapHook>,
    ebreak_hooks: Vec<TrapHook>,
    pending_halt: Option<HaltReason>,
    /// Names registered at runtime (extra cells and aliases), layered
    /// over the built-in table. Every name still resolves to exactly one
    /// cell.
    extra_names: std::collections::HashMap<String, RegisterRef>,
    /// Cells created by `add_register`, as `(value, width)`.
    scratch: Vec<(u64, u32)>,
}

impl Default for ArchState {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchState {
    pub fn new() -> Self {
        Self {
            pc: 0,
            xregs: XRegs::new(),
            fregs: FRegs::new(),
            vregs: VRegs::new(),
            fp: FpState::new(),
            vector: VectorState::new(),
            csrs: MachineCsrs::new(),
            mem: Memory::new(),
            atomics: AtomicLayer::new(),
            watcher: MemoryWatcher::new(),
            ecall_hooks: Vec::new(),
            ebreak_hooks: Vec::new(),
            pending_halt: None,
            extra_names: std::collections::HashMap::new(),
            scratch: Vec::new(),
        }
    }

    /// Create an additional named register cell of the given width (32 or
    /// 64 bits). The architectural banks are fixed; this covers scratch
    /// cells used by tooling.
    pub fn add_register(&mut self, name: &str, width: u32) -> Result<(), RegAccessError> {
        if !matches!(width, 32 | 64) {
            return Err(RegAccessError::BadWidth(width));
        }
        if self.resolve(name).is_ok() {
            return Err(RegAccessError::Exists(name.to_owned()));
        }
        let idx = self.scratch.len() as u16;
        self.scratch.push((0, width));
        self.extra_names
            .insert(name.to_owned(), RegisterRef::Scratch(idx));
        Ok(())
    }

    /// Register `alias` as another name for `existing`'s cell.
    pub fn add_register_alias(&mut self, existing: &str, alias: &str) -> Result<(), RegAccessError> {
        if self.resolve(alias).is_ok() {
            return Err(RegAccessError::Exists(alias.to_owned()));
        }
        let cell = self.resolve(existing)?;
        self.extra_names.insert(alias.to_owned(), cell);
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<RegisterRef, RegAccessError> {
        if let Some(cell) = self.extra_names.get(name) {
            return Ok(*cell);
        }
        reg::lookup(name)
    }

    /// Register a watched memory range (see [`MemoryWatcher`]).
    pub fn watch_memory(
        &mut self,
        base: u32,
        len: u32,
        on_read: Option<ReadHook>,
        on_write: Option<WriteHook>,
    ) -> Result<(), WatchError> {
        self.watcher.watch(base, len, on_read, on_write)
    }

    /// Read memory, routing through the watcher.
    pub fn read_memory(&mut self, addr: u32, buf: &mut [u8]) {
        let Self {
            mem,
            atomics,
            xregs,
            fregs,
            pc,
            pending_halt,
            watcher,
            ..
        } = self;
        if let Some(idx) = watcher.find(addr, buf.len() as u32) {
            let mut view = HartView {
                mem,
                atomics,
                xregs,
                fregs,
                pc: *pc,
                pending_halt,
            };
            if watcher.dispatch_read(idx, &mut view, addr, buf) {
                return;
            }
        }
        mem.load(addr, buf);
    }

    /// Write memory, routing through the watcher. Non-diverted stores
    /// reach the backing store and cancel intersecting reservations.
    pub fn write_memory(&mut self, addr: u32, bytes: &[u8]) {
        let Self {
            mem,
            atomics,
            xregs,
            fregs,
            pc,
            pending_halt,
            watcher,
            ..
        } = self;
        if let Some(idx) = watcher.find(addr, bytes.len() as u32) {
            let mut view = HartView {
                mem,
                atomics,
                xregs,
                fregs,
                pc: *pc,
                pending_halt,
            };
            if watcher.dispatch_write(idx, &mut view, addr, bytes) {
                return;
            }
        }
        mem.store(addr, bytes);
        atomics.note_store(addr, bytes.len() as u32);
    }

    pub fn read_u8(&mut self, addr: u32) -> u8 {
        let mut b = [0u8; 1];
        self.read_memory(addr, &mut b);
        b[0]
    }

    pub fn read_u16(&mut self, addr: u32) -> u16 {
        let mut b = [0u8; 2];
        self.read_memory(addr, &mut b);
        u16::from_le_bytes(b)
    }

    pub fn read_u32(&mut self, addr: u32) -> u32 {
        let mut b = [0u8; 4];
        self.read_memory(addr, &mut b);
        u32::from_le_bytes(b)
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) {
        self.write_memory(addr, &[value]);
    }

    pub fn write_u16(&mut self, addr: u32, value: u16) {
        self.write_memory(addr, &value.to_le_bytes());
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) {
        self.write_memory(addr, &value.to_le_bytes());
    }

    /// Instruction fetch: one 16-bit parcel. The decoder calls this once
    /// or twice per instruction depending on the encoding length.
    pub fn fetch16(&mut self, addr: u32) -> u16 {
        self.read_u16(addr)
    }

    /// Read a register by canonical name or alias.
    pub fn read_register(&self, name: &str) -> Result<u64, RegAccessError> {
        match self.resolve(name)? {
            RegisterRef::X(i) => Ok(self.xregs.read(i) as u64),
            RegisterRef::F(i) => Ok(self.fregs.read_raw(i)),
            RegisterRef::V(_) => Err(RegAccessError::NotScalar(name.to_owned())),
            RegisterRef::Csr(addr) => self
                .read_csr(addr)
                .map(|v| v as u64)
                .map_err(|_| RegAccessError::NotFound(name.to_owned())),
            RegisterRef::Pc => Ok(self.pc as u64),
            RegisterRef::Scratch(i) => Ok(self.scratch[i as usize].0),
        }
    }

    /// Write a register by canonical name or alias. Writes to "x0" (and
    /// its alias "zero") are silently dropped.
    pub fn write_register(&mut self, name: &str, value: u64) -> Result<(), RegAccessError> {
        match self.resolve(name)? {
            RegisterRef::X(i) => self.xregs.write(i, value as u32),
            RegisterRef::F(i) => self.fregs.write_raw(i, value),
            RegisterRef::V(_) => return Err(RegAccessError::NotScalar(name.to_owned())),
            RegisterRef::Csr(addr) => self
                .write_csr(addr, value as u32)
                .map_err(|_| RegAccessError::NotFound(name.to_owned()))?,
            RegisterRef::Pc => self.pc = value as u32,
            RegisterRef::Scratch(i) => {
                let cell = &mut self.scratch[i as usize];
                cell.0 = if cell.1 == 32 { value & 0xffff_ffff } else { value };
            }
        }
        Ok(())
    }

    /// Read a CSR by 12-bit index, routing to the owning sideband state.
    pub fn read_csr(&self, addr: u16) -> Result<u32, CsrError> {
        Ok(match addr {
            csr::FFLAGS => self.fp.read_fflags(),
            csr::FRM => self.fp.read_frm(),
            csr::FCSR => self.fp.read_fcsr(),
            csr::VSTART => self.vector.vstart,
            csr::VXSAT => self.vector.vxsat as u32,
            csr::VXRM => self.vector.vxrm,
            csr::VCSR => self.vector.read_vcsr(),
            csr::VL => self.vector.vl,
            csr::VTYPE => self.vector.vtype_raw(),
            csr::VLENB_CSR => VLENB,
            _ => self.csrs.read(addr)?,
        })
    }

    /// Write a CSR by 12-bit index. Side-effect hooks (e.g. `frm` feeding
    /// the dynamic rounding mode, `vcsr` mirroring `vxrm`/`vxsat`) fire
    /// here.
    pub fn write_csr(&mut self, addr: u16, value: u32) -> Result<(), CsrError> {
        match addr {
            csr::FFLAGS => self.fp.write_fflags(value),
            csr::FRM => self.fp.write_frm(value),
            csr::FCSR => self.fp.write_fcsr(value),
            csr::VSTART => self.vector.vstart = value & (8 * VLENB - 1),
            csr::VXSAT => self.vector.vxsat = value & 1 != 0,
            csr::VXRM => self.vector.vxrm = value & 3,
            csr::VCSR => self.vector.write_vcsr(value),
            // vl and vtype are read-only; they change via vset{i}vl{i}.
            csr::VL | csr::VTYPE | csr::VLENB_CSR => return Err(CsrError::ReadOnly(addr)),
            _ => self.csrs.write(addr, value)?,
        }
        Ok(())
    }

    /// Register an `ecall` handler. Handlers run in registration order;
    /// the first to return [`Handled::Yes`] stops propagation.
    pub fn on_ecall(&mut self, hook: TrapHook) {
        self.ecall_hooks.push(hook);
    }

    /// Register an `ebreak` handler (same propagation rule).
    pub fn add_ebreak_handler(&mut self, hook: TrapHook) {
        self.ebreak_hooks.push(hook);
    }

    /// Offer an `ecall` to the handlers. Returns whether one consumed it.
    pub fn raise_ecall(&mut self) -> Handled {
        Self::dispatch_hooks(
            &mut self.ecall_hooks,
            &mut self.mem,
            &mut self.atomics,
            &mut self.xregs,
            &mut self.fregs,
            self.pc,
            &mut self.pending_halt,
        )
    }

    /// Offer an `ebreak` to the handlers. Returns whether one consumed it.
    pub fn raise_ebreak(&mut self) -> Handled {
        Self::dispatch_hooks(
            &mut self.ebreak_hooks,
            &mut self.mem,
            &mut self.atomics,
            &mut self.xregs,
            &mut self.fregs,
            self.pc,
            &mut self.pending_halt,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch_hooks(
        hooks: &mut [TrapHook],
        mem: &mut Memory,
        atomics: &mut AtomicLayer,
        xregs: &mut XRegs,
        fregs: &mut FRegs,
        pc: u32,
        pending_halt: &mut Option<HaltReason>,
    ) -> Handled {
        for hook in hooks {
            let mut view = HartView {
                mem,
                atomics,
                xregs,
                fregs,
                pc,
                pending_halt,
            };
            if hook(&mut view) == Handled::Yes {
                return Handled::Yes;
            }
        }
        Handled::No
    }

    /// Record a trap: writes `mepc`/`mcause`/`mtval` and requests a
    /// fatal-trap halt. The run loop observes the request at the next
    /// instruction boundary.
    pub fn trap(&mut self, cause: TrapCause, pc: u32, tval: u32) {
        log::debug!("trap: {cause} at {pc:#010x} (tval {tval:#010x})");
        self.csrs.mepc = pc & !1;
        self.csrs.mcause = cause.code();
        self.csrs.mtval = tval;
        self.request_halt(HaltReason::FatalTrap(cause));
    }

    /// Ask the engine to halt at the next instruction boundary. The first
    /// request wins; later ones are dropped.
    pub fn request_halt(&mut self, reason: HaltReason) {
        if self.pending_halt.is_none() {
            self.pending_halt = Some(reason);
        }
    }

    /// Consume the pending halt request, if any.
    pub fn take_pending_halt(&mut self) -> Option<HaltReason> {
        self.pending_halt.take()
    }

    pub fn has_pending_halt(&self) -> bool {
        self.pending_halt.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_access_by_name_and_alias() {
        let mut state = ArchState::new();
        state.write_register("sp", 0x1000).unwrap();
        assert_eq!(state.read_register("x2").unwrap(), 0x1000);
        state.write_register("x0", 99).unwrap();
        assert_eq!(state.read_register("zero").unwrap(), 0);
        state.write_register("pc", 0x80).unwrap();
        assert_eq!(state.pc, 0x80);
        assert!(state.read_register("nosuch").is_err());
        assert!(state.read_register("v3").is_err());
    }

    #[test]
    fn runtime_registers_and_aliases() {
        let mut state = ArchState::new();
        state.add_register("scratch0", 32).unwrap();
        state.write_register("scratch0", 0x1_2345_6789).unwrap();
        // Truncated to the declared width.
        assert_eq!(state.read_register("scratch0").unwrap(), 0x2345_6789);

        state.add_register_alias("x5", "counter").unwrap();
        state.write_register("counter", 77).unwrap();
        assert_eq!(state.xregs.read(5), 77);
        assert_eq!(state.read_register("counter").unwrap(), 77);

        // One storage cell per name: collisions are rejected.
        assert_eq!(
            state.add_register("sp", 32),
            Err(RegAccessError::Exists("sp".to_owned()))
        );
        assert_eq!(
            state.add_register_alias("x1", "counter"),
            Err(RegAccessError::Exists("counter".to_owned()))
        );
        assert_eq!(state.add_register("bad", 16), Err(RegAccessError::BadWidth(16)));
        assert!(state.add_register_alias("nosuch", "other").is_err());

        // An alias of x0 inherits the hard-wired behavior.
        state.add_register_alias("zero", "null").unwrap();
        state.write_register("null", 9).unwrap();
        assert_eq!(state.read_register("null").unwrap(), 0);
    }

    #[test]
    fn csr_routing_reaches_fp_state() {
        let mut state = ArchState::new();
        state.write_csr(csr::FRM, 2).unwrap();
        assert_eq!(state.read_csr(csr::FCSR).unwrap(), 2 << 5);
        assert_eq!(state.read_register("frm").unwrap(), 2);
        assert_eq!(state.read_csr(csr::VLENB_CSR).unwrap(), VLENB);
        assert!(state.write_csr(csr::VL, 1).is_err());
    }

    #[test]
    fn watcher_diverts_watched_writes() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let mut state = ArchState::new();
        let seen = Arc::new(AtomicU32::new(0));
        let seen2 = Arc::clone(&seen);
        state
            .watch_memory(
                0x4000,
                4,
                None,
                Some(Box::new(move |_view: &mut HartView<'_>, _addr, bytes| {
                    let mut word = [0u8; 4];
                    word[..bytes.len()].copy_from_slice(bytes);
                    seen2.store(u32::from_le_bytes(word), Ordering::Relaxed);
                })),
            )
            .unwrap();

        state.write_u32(0x4000, 0xabcd);
        assert_eq!(seen.load(Ordering::Relaxed), 0xabcd);
        // The underlying store was bypassed.
        assert_eq!(state.mem.load_u32(0x4000), 0);
        // Unwatched addresses pass through.
        state.write_u32(0x4008, 7);
        assert_eq!(state.mem.load_u32(0x4008), 7);
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let mut state = ArchState::new();
        state.on_ecall(Box::new(|view| {
            // First handler consumes calls with a7 == 1.
            if view.xregs.read(17) == 1 {
                view.request_halt(HaltReason::ProgramDone);
                Handled::Yes
            } else {
                Handled::No
            }
        }));
        state.on_ecall(Box::new(|view| {
            view.xregs.write(10, 0xff);
            Handled::Yes
        }));

        state.xregs.write(17, 1);
        assert_eq!(state.raise_ecall(), Handled::Yes);
        assert_eq!(state.xregs.read(10), 0);
        assert_eq!(state.take_pending_halt(), Some(HaltReason::ProgramDone));

        state.xregs.write(17, 2);
        assert_eq!(state.raise_ecall(), Handled::Yes);
        assert_eq!(state.xregs.read(10), 0xff);
        assert!(!state.has_pending_halt());
    }

    #[test]
    fn trap_records_cause_and_requests_halt() {
        let mut state = ArchState::new();
        state.trap(TrapCause::IllegalInstruction, 0x104, 0xdead);
        assert_eq!(state.csrs.mepc, 0x104);
        assert_eq!(state.csrs.mcause, 2);
        assert_eq!(state.csrs.mtval, 0xdead);
        assert_eq!(
            state.take_pending_halt(),
            Some(HaltReason::FatalTrap(TrapCause::IllegalInstruction))
        );
    }

    #[test]
    fn first_halt_request_wins() {
        let mut state = ArchState::new();
        state.request_halt(HaltReason::ProgramDone);
        state.request_halt(HaltReason::UserHalt);
        assert_eq!(state.take_pending_halt(), Some(HaltReason::ProgramDone));
    }
}
