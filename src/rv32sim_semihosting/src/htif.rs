//! HTIF host-target rendezvous.
//!
//! The target writes a 64-bit request word to `tohost`; the host performs
//! the operation and acknowledges through `fromhost`. A request with the
//! low bit set is program exit carrying `value >> 1` as the exit code.
//! Anything else is a pointer to a syscall block of four little-endian
//! 64-bit words `[nr, a0, a1, a2]`; `write` (64) to stdout/stderr is the
//! call statically linked test programs use for console output.
//!
//! When the executable also exports `tohost_ready`/`fromhost_ready`, the
//! host keeps `tohost_ready` nonzero whenever it is able to accept a
//! request and raises `fromhost_ready` along with each response.

use rv32sim_core::{ArchState, HaltReason, HartView, Memory, WatchError};

use crate::HostOutput;

/// The `write` syscall number in the HTIF proxy-kernel convention.
const SYS_WRITE: u64 = 64;

/// Magic addresses resolved from the executable's symbols.
#[derive(Debug, Clone, Copy)]
pub struct HtifAddrs {
    pub tohost: u32,
    pub fromhost: u32,
    pub tohost_ready: Option<u32>,
    pub fromhost_ready: Option<u32>,
}

/// Install the HTIF backend: watches the `tohost` word and services
/// requests as the target stores them.
pub fn install(state: &mut ArchState, addrs: HtifAddrs) -> Result<(), WatchError> {
    install_with_output(state, addrs, crate::stdout_output())
}

pub fn install_with_output(
    state: &mut ArchState,
    addrs: HtifAddrs,
    mut output: HostOutput,
) -> Result<(), WatchError> {
    log::debug!(
        "HTIF rendezvous at tohost={:#010x} fromhost={:#010x}",
        addrs.tohost,
        addrs.fromhost
    );

    // Ready from the start.
    if let Some(ready) = addrs.tohost_ready {
        state.mem.store_u64(ready, 1);
    }

    // The target may write the 64-bit word with one sd or two sw stores;
    // a shadow accumulates partial writes and the request fires once the
    // assembled value becomes nonzero.
    let mut shadow = 0u64;
    state.watch_memory(
        addrs.tohost,
        8,
        None,
        Some(Box::new(move |view: &mut HartView<'_>, addr, bytes| {
            let offset = addr.wrapping_sub(addrs.tohost);
            let mut word = shadow.to_le_bytes();
            for (i, byte) in bytes.iter().enumerate() {
                let slot = offset as usize + i;
                if slot < 8 {
                    word[slot] = *byte;
                }
            }
            shadow = u64::from_le_bytes(word);
            if shadow != 0 {
                let request = shadow;
                shadow = 0;
                service(view, &addrs, request, &mut output);
            }
        })),
    )
}

fn service(view: &mut HartView<'_>, addrs: &HtifAddrs, request: u64, output: &mut HostOutput) {
    if let Some(ready) = addrs.tohost_ready {
        view.mem.store_u64(ready, 0);
    }

    if request & 1 != 0 {
        let exit_code = (request >> 1) as u32;
        log::debug!("HTIF exit request, code {exit_code}");
        view.request_halt(HaltReason::SemihostHalt { exit_code });
    } else {
        let block = request as u32;
        let nr = view.mem.load_u64(block);
        let a0 = view.mem.load_u64(block.wrapping_add(8));
        let a1 = view.mem.load_u64(block.wrapping_add(16));
        let a2 = view.mem.load_u64(block.wrapping_add(24));
        let result = dispatch(view.mem, nr, a0, a1, a2, output);
        view.mem.store_u64(addrs.fromhost, result);
        if let Some(ready) = addrs.fromhost_ready {
            view.mem.store_u64(ready, 1);
        }
    }

    if let Some(ready) = addrs.tohost_ready {
        view.mem.store_u64(ready, 1);
    }
}

fn dispatch(mem: &Memory, nr: u64, a0: u64, a1: u64, a2: u64, output: &mut HostOutput) -> u64 {
    match nr {
        SYS_WRITE => {
            // a0 = fd, a1 = buffer, a2 = length. Both stdout and stderr
            // land on the host output stream.
            if a0 == 1 || a0 == 2 {
                let mut buf = vec![0u8; a2 as usize];
                mem.load(a1 as u32, &mut buf);
                match output.write_all(&buf) {
                    Ok(()) => {
                        let _ = output.flush();
                        a2
                    }
                    Err(e) => {
                        log::warn!("HTIF write failed: {e}");
                        0
                    }
                }
            } else {
                log::warn!("HTIF write to unsupported fd {a0}");
                0
            }
        }
        _ => {
            log::warn!("unsupported HTIF syscall {nr}");
            // Nonzero acknowledgement so the target does not spin.
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    const ADDRS: HtifAddrs = HtifAddrs {
        tohost: 0x8000_1000,
        fromhost: 0x8000_1040,
        tohost_ready: None,
        fromhost_ready: None,
    };

    #[test]
    fn exit_request_halts_with_code() {
        let mut state = ArchState::new();
        install(&mut state, ADDRS).unwrap();
        // Exit with code 3: value = 3 << 1 | 1.
        state.write_u32(ADDRS.tohost, 7);
        assert_eq!(
            state.take_pending_halt(),
            Some(HaltReason::SemihostHalt { exit_code: 3 })
        );
    }

    #[test]
    fn split_word_writes_assemble() {
        let mut state = ArchState::new();
        install(&mut state, ADDRS).unwrap();
        // High word first (zero: no request yet), then the low word.
        state.write_u32(ADDRS.tohost + 4, 0);
        assert!(state.take_pending_halt().is_none());
        state.write_u32(ADDRS.tohost, 1);
        assert_eq!(
            state.take_pending_halt(),
            Some(HaltReason::SemihostHalt { exit_code: 0 })
        );
    }

    #[test]
    fn write_syscall_reaches_host_output() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let mut state = ArchState::new();
        install_with_output(&mut state, ADDRS, Box::new(SharedBuf(Arc::clone(&captured))))
            .unwrap();

        // Syscall block at 0x2000: write(1, 0x3000, 5).
        state.mem.store_u64(0x2000, SYS_WRITE);
        state.mem.store_u64(0x2008, 1);
        state.mem.store_u64(0x2010, 0x3000);
        state.mem.store_u64(0x2018, 5);
        state.mem.store(0x3000, b"hello");

        state.write_u32(ADDRS.tohost, 0x2000);
        assert!(state.take_pending_halt().is_none());
        assert_eq!(&*captured.lock().unwrap(), b"hello");
        // Acknowledged through fromhost.
        assert_eq!(state.mem.load_u64(ADDRS.fromhost), 5);
    }

    #[test]
    fn ready_words_toggle() {
        let addrs = HtifAddrs {
            tohost_ready: Some(0x8000_1080),
            fromhost_ready: Some(0x8000_10c0),
            ..ADDRS
        };
        let mut state = ArchState::new();
        install(&mut state, addrs).unwrap();
        assert_eq!(state.mem.load_u64(0x8000_1080), 1);
        state.write_u32(addrs.tohost, 1);
        // Consumed and re-armed.
        assert_eq!(state.mem.load_u64(0x8000_1080), 1);
        assert!(state.take_pending_halt().is_some());
    }
}
