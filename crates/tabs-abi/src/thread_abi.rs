//! ABI layer for thread lifecycle functions.
//!
//! A `tabs_thread_t` is a pointer to a heap-allocated [`Thread`] owned by the C
//! caller. `tabs_join_thread` and `tabs_detach_thread` take that allocation
//! back, so each handle must be passed to exactly one of them.

use std::ffi::{c_int, c_void};

use tabs_core::Thread;

use crate::{TABS_ERROR, TABS_SUCCESS, status};

/// Entry function: one untyped argument in, one pointer-sized value out.
pub type tabs_thread_func_t = unsafe extern "C" fn(*mut c_void) -> *mut c_void;

/// Opaque identity of a thread, for comparison and logging.
pub type tabs_thread_id_t = u64;

/// Opaque thread object; only ever seen behind [`tabs_thread_t`].
#[repr(C)]
pub struct tabs_thread {
    _private: [u8; 0],
}

/// Handle to a joinable thread.
pub type tabs_thread_t = *mut tabs_thread;

type AbiThread = Thread<usize>;

fn into_handle(thread: AbiThread) -> tabs_thread_t {
    Box::into_raw(Box::new(thread)).cast::<tabs_thread>()
}

/// # Safety
///
/// `handle` must be non-null and come from [`into_handle`], not yet reclaimed.
unsafe fn from_handle(handle: tabs_thread_t) -> Box<AbiThread> {
    // SAFETY: caller guarantees provenance and single reclamation.
    unsafe { Box::from_raw(handle.cast::<AbiThread>()) }
}

/// Start `func(arg)` on a new thread and store its handle in `*thread`.
///
/// On failure `*thread` is left untouched and no thread runs.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tabs_create_thread(
    thread: *mut tabs_thread_t,
    func: Option<tabs_thread_func_t>,
    arg: *mut c_void,
) -> c_int {
    if thread.is_null() {
        return TABS_ERROR;
    }
    let Some(func) = func else {
        return TABS_ERROR;
    };

    let arg_addr = arg as usize;
    let spawned = tabs_core::spawn(move || {
        // SAFETY: the caller supplies a valid entry point and an argument it
        // keeps alive for the thread's use.
        let retval = unsafe { func(arg_addr as *mut c_void) };
        retval as usize
    });

    match spawned {
        Ok(handle) => {
            // SAFETY: `thread` was checked non-null above.
            unsafe { *thread = into_handle(handle) };
            TABS_SUCCESS
        }
        Err(_) => TABS_ERROR,
    }
}

/// Wait for `thread` to finish. When `exit_code` is non-null it receives the
/// entry function's return value truncated to `int`.
///
/// The handle is released whether or not the join succeeds.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tabs_join_thread(thread: tabs_thread_t, exit_code: *mut c_int) -> c_int {
    if thread.is_null() {
        return TABS_ERROR;
    }
    // SAFETY: non-null handle from tabs_create_thread, consumed once per contract.
    let handle = unsafe { from_handle(thread) };
    match handle.join() {
        Ok(retval) => {
            if !exit_code.is_null() {
                // SAFETY: caller-provided output pointer.
                unsafe { *exit_code = retval as isize as c_int };
            }
            TABS_SUCCESS
        }
        Err(_) => TABS_ERROR,
    }
}

/// Make `thread` non-joinable; the OS reclaims it when it exits.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tabs_detach_thread(thread: tabs_thread_t) -> c_int {
    if thread.is_null() {
        return TABS_ERROR;
    }
    // SAFETY: non-null handle from tabs_create_thread, consumed once per contract.
    let handle = unsafe { from_handle(thread) };
    status(handle.detach())
}

/// Identity of the calling thread.
#[unsafe(no_mangle)]
pub extern "C" fn tabs_current_thread_id() -> tabs_thread_id_t {
    tabs_core::current_thread_id().as_u64()
}

/// Sleep for at least `milliseconds`.
#[unsafe(no_mangle)]
pub extern "C" fn tabs_sleep_ms(milliseconds: u32) {
    tabs_core::sleep_ms(milliseconds);
}

/// Offer the rest of the time slice to other threads.
#[unsafe(no_mangle)]
pub extern "C" fn tabs_yield() {
    tabs_core::yield_now();
}
