//! ABI layer for mutex functions.
//!
//! `tabs_mutex_t` is the host's native mutex type, so C callers allocate it
//! inline. These exports forward straight to the platform after the null
//! check; unlike `tabs_core::RawMutex` they keep no lifecycle state.

use std::ffi::c_int;

use tabs_core::platform::{Host, Platform};

use crate::{TABS_ERROR, TABS_SUCCESS, status};

/// Native mutex storage (`pthread_mutex_t` on Unix, `SRWLOCK` on Windows).
pub type tabs_mutex_t = <Host as Platform>::MutexSlot;

/// Initialize `*mutex` in the unlocked state.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tabs_mutex_init(mutex: *mut tabs_mutex_t) -> c_int {
    // SAFETY: null is rejected by the platform; otherwise caller-owned storage.
    status(unsafe { Host::mutex_init(mutex) })
}

/// Destroy an unlocked mutex.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tabs_mutex_destroy(mutex: *mut tabs_mutex_t) -> c_int {
    // SAFETY: null is rejected by the platform; otherwise an initialized mutex.
    status(unsafe { Host::mutex_destroy(mutex) })
}

/// Block until the mutex is held by the calling thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tabs_mutex_lock(mutex: *mut tabs_mutex_t) -> c_int {
    // SAFETY: null is rejected by the platform; otherwise an initialized mutex.
    status(unsafe { Host::mutex_lock(mutex) })
}

/// Acquire without blocking. `TABS_ERROR` when the mutex is already held.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tabs_mutex_trylock(mutex: *mut tabs_mutex_t) -> c_int {
    // SAFETY: null is rejected by the platform; otherwise an initialized mutex.
    match unsafe { Host::mutex_try_lock(mutex) } {
        Ok(true) => TABS_SUCCESS,
        Ok(false) | Err(_) => TABS_ERROR,
    }
}

/// Release a mutex held by the calling thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tabs_mutex_unlock(mutex: *mut tabs_mutex_t) -> c_int {
    // SAFETY: null is rejected by the platform; otherwise held by the caller.
    status(unsafe { Host::mutex_unlock(mutex) })
}
