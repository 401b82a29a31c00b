// Every export takes raw pointers from C callers; the contracts live in
// include/tabs.h rather than on each function.
#![allow(clippy::missing_safety_doc)]
//! # tabs-abi
//!
//! `extern "C"` surface over `tabs-core`, producing a `cdylib` for C callers.
//!
//! ```text
//! C caller -> tabs_* export (this crate) -> tabs-core -> platform::Host -> OS
//! ```
//!
//! Every export returns [`TABS_SUCCESS`] or [`TABS_ERROR`]; the richer
//! `TabsError` is discarded at this boundary. Null arguments are rejected
//! before any OS call. Caller-contract violations (double join, unlocking a
//! mutex the caller does not hold, using a destroyed mutex) are not detected
//! here and behave as the native primitive does.

#![allow(non_camel_case_types)]

pub mod mutex_abi;
pub mod thread_abi;

use std::ffi::c_int;

/// Operation succeeded.
pub const TABS_SUCCESS: c_int = 0;
/// Operation failed; no further detail is reported.
pub const TABS_ERROR: c_int = -1;

#[inline]
pub(crate) fn status<T>(result: tabs_core::Result<T>) -> c_int {
    match result {
        Ok(_) => TABS_SUCCESS,
        Err(_) => TABS_ERROR,
    }
}

pub use mutex_abi::{
    tabs_mutex_destroy, tabs_mutex_init, tabs_mutex_lock, tabs_mutex_t, tabs_mutex_trylock,
    tabs_mutex_unlock,
};
pub use thread_abi::{
    tabs_create_thread, tabs_current_thread_id, tabs_detach_thread, tabs_join_thread,
    tabs_sleep_ms, tabs_thread, tabs_thread_func_t, tabs_thread_id_t, tabs_thread_t, tabs_yield,
};
