//! ARM-convention semihosting over `ebreak`.
//!
//! A semihosting call is an `ebreak` bracketed by the sentinel sequence
//! `slli x0, x0, 0x1f` / `srai x0, x0, 7`. The call number is read from
//! `a0`, the argument block pointer from `a1`; the result is returned in
//! `a0`. An `ebreak` without the sentinel is left to later handlers (or
//! to trap), so programs that use plain breakpoints are unaffected.

use rv32sim_core::{ArchState, HaltReason, Handled, HartView};

use crate::HostOutput;

/// `slli x0, x0, 0x1f`, immediately before the `ebreak`.
const SENTINEL_BEFORE: u32 = 0x01f0_1013;
/// `srai x0, x0, 7`, immediately after the `ebreak`.
const SENTINEL_AFTER: u32 = 0x4070_5013;

// Call numbers, per the ARM semihosting interface.
const SYS_WRITEC: u32 = 0x03;
const SYS_WRITE0: u32 = 0x04;
const SYS_WRITE: u32 = 0x05;
const SYS_EXIT: u32 = 0x18;

/// The `SYS_EXIT` reason reporting normal termination.
const ADP_STOPPED_APPLICATION_EXIT: u32 = 0x20026;

/// The a0/a1 argument and result registers.
const REG_A0: u8 = 10;
const REG_A1: u8 = 11;

/// Install the ARM semihosting backend as an `ebreak` handler.
pub fn install(state: &mut ArchState) {
    install_with_output(state, crate::stdout_output())
}

pub fn install_with_output(state: &mut ArchState, mut output: HostOutput) {
    state.add_ebreak_handler(Box::new(move |view: &mut HartView<'_>| {
        if view.mem.load_u32(view.pc.wrapping_sub(4)) != SENTINEL_BEFORE
            || view.mem.load_u32(view.pc.wrapping_add(4)) != SENTINEL_AFTER
        {
            return Handled::No;
        }
        handle_call(view, &mut output);
        Handled::Yes
    }));
}

fn handle_call(view: &mut HartView<'_>, output: &mut HostOutput) {
    let nr = view.xregs.read(REG_A0);
    let arg = view.xregs.read(REG_A1);
    log::trace!("semihosting call {nr:#x}({arg:#010x})");

    match nr {
        SYS_WRITEC => {
            let byte = view.mem.load_u8(arg);
            write_host(output, &[byte]);
            view.xregs.write(REG_A0, 0);
        }
        SYS_WRITE0 => {
            let mut bytes = Vec::new();
            let mut addr = arg;
            loop {
                let byte = view.mem.load_u8(addr);
                if byte == 0 {
                    break;
                }
                bytes.push(byte);
                addr = addr.wrapping_add(1);
            }
            write_host(output, &bytes);
            view.xregs.write(REG_A0, 0);
        }
        SYS_WRITE => {
            // Argument block: [fd, buffer, length].
            let fd = view.mem.load_u32(arg);
            let buffer = view.mem.load_u32(arg.wrapping_add(4));
            let length = view.mem.load_u32(arg.wrapping_add(8));
            if fd == 1 || fd == 2 {
                let mut bytes = vec![0u8; length as usize];
                view.mem.load(buffer, &mut bytes);
                write_host(output, &bytes);
                // Result: the number of bytes NOT written.
                view.xregs.write(REG_A0, 0);
            } else {
                view.xregs.write(REG_A0, length);
            }
        }
        SYS_EXIT => {
            let exit_code = if arg == ADP_STOPPED_APPLICATION_EXIT { 0 } else { 1 };
            log::debug!("semihosting exit, reason {arg:#x}");
            view.request_halt(HaltReason::SemihostHalt { exit_code });
        }
        _ => {
            log::warn!("unsupported semihosting call {nr:#x}");
            view.xregs.write(REG_A0, u32::MAX);
        }
    }
}

fn write_host(output: &mut HostOutput, bytes: &[u8]) {
    use std::io::Write as _;
    if let Err(e) = output.write_all(bytes).and_then(|()| output.flush()) {
        log::warn!("semihosting write failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rv32sim_engine::Core;
    use rv32sim_isa::asm;
    use std::sync::{Arc, Mutex};

    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// A semihosting call site: sentinel, ebreak, sentinel.
    fn call_site(words: &mut Vec<u32>) {
        words.push(SENTINEL_BEFORE);
        words.push(asm::ebreak());
        words.push(SENTINEL_AFTER);
    }

    #[test]
    fn write0_and_exit() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let core = Core::new(ArchState::new());

        let mut program = vec![
            asm::addi(10, 0, SYS_WRITE0 as i32), // a0 = SYS_WRITE0
            asm::addi(11, 0, 0x100),             // a1 = string address
        ];
        call_site(&mut program);
        program.push(asm::addi(10, 0, SYS_EXIT as i32));
        program.push(asm::lui(11, 0x20));
        program.push(asm::addi(11, 11, 0x26)); // a1 = 0x20026
        call_site(&mut program);

        core.with_state(|st| {
            install_with_output(st, Box::new(SharedBuf(Arc::clone(&captured))));
            for (i, word) in program.iter().enumerate() {
                st.mem.store_u32(i as u32 * 4, *word);
            }
            st.mem.store(0x100, b"hi\0");
            st.pc = 0;
        })
        .unwrap();

        core.run().unwrap();
        assert_eq!(
            core.wait(),
            rv32sim_engine::HaltReason::SemihostHalt { exit_code: 0 }
        );
        assert_eq!(&*captured.lock().unwrap(), b"hi");
    }

    #[test]
    fn plain_ebreak_is_not_intercepted() {
        let core = Core::new(ArchState::new());
        core.with_state(|st| {
            install(st);
            st.mem.store_u32(0, asm::ebreak());
            st.pc = 0;
        })
        .unwrap();
        core.run().unwrap();
        // No sentinel: the ebreak falls through to the trap path.
        assert_eq!(
            core.wait(),
            rv32sim_engine::HaltReason::FatalTrap(rv32sim_core::TrapCause::Breakpoint)
        );
    }

    #[test]
    fn sys_write_block() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let mut state = ArchState::new();
        install_with_output(&mut state, Box::new(SharedBuf(Arc::clone(&captured))));

        // Surround address 0x40 with the sentinel bracket.
        state.mem.store_u32(0x3c, SENTINEL_BEFORE);
        state.mem.store_u32(0x40, asm::ebreak());
        state.mem.store_u32(0x44, SENTINEL_AFTER);
        // Argument block: write(1, 0x200, 3).
        state.mem.store_u32(0x80, 1);
        state.mem.store_u32(0x84, 0x200);
        state.mem.store_u32(0x88, 3);
        state.mem.store(0x200, b"abc");

        state.pc = 0x40;
        state.xregs.write(REG_A0, SYS_WRITE);
        state.xregs.write(REG_A1, 0x80);
        assert_eq!(state.raise_ebreak(), Handled::Yes);
        assert_eq!(&*captured.lock().unwrap(), b"abc");
        assert_eq!(state.xregs.read(REG_A0), 0);
    }
}
