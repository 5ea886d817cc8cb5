//! SIGINT-to-halt plumbing.
//!
//! The handler must be async-signal-safe, so it only reads one atomic slot
//! and stores one atomic flag. The slot holds a pointer to the active
//! core's halt-request flag; the driver arms it before entering the run
//! loop and the core clears it on teardown.

use std::os::raw::c_int;
use std::ptr::null_mut;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::Once;

static ACTIVE_HALT_FLAG: AtomicPtr<AtomicBool> = AtomicPtr::new(null_mut());

/// Arm the slot with `flag`.
///
/// # Safety
///
/// `flag` must stay valid until [`clear_active`] is called with the same
/// pointer (the core owns the flag and clears the slot in its destructor).
pub(crate) unsafe fn set_active(flag: *const AtomicBool) {
    ACTIVE_HALT_FLAG.store(flag as *mut _, Ordering::SeqCst);
}

/// Disarm the slot if it still points at `flag`.
pub(crate) fn clear_active(flag: *const AtomicBool) {
    let _ = ACTIVE_HALT_FLAG.compare_exchange(
        flag as *mut _,
        null_mut(),
        Ordering::SeqCst,
        Ordering::SeqCst,
    );
}

/// Register the SIGINT handler (idempotent).
pub(crate) fn install_handler() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let action = libc::sigaction {
            sa_sigaction: sigint_handler as libc::sighandler_t,
            // `SA_SIGINFO`: the handler uses the three-parameter signature.
            sa_flags: libc::SA_SIGINFO,
            ..unsafe { std::mem::zeroed() }
        };
        let result = unsafe { libc::sigaction(libc::SIGINT, &action, null_mut()) };
        if result != 0 {
            log::warn!("failed to register the SIGINT handler");
        }
    });
}

extern "C" fn sigint_handler(
    _signo: c_int,
    _info: *mut libc::siginfo_t,
    _ctx: *mut libc::c_void,
) {
    let flag = ACTIVE_HALT_FLAG.load(Ordering::SeqCst);
    if !flag.is_null() {
        // Repeated delivery is idempotent: the flag is already set.
        unsafe { &*flag }.store(true, Ordering::SeqCst);
    }
}
