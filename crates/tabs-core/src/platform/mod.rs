//! Native threading capability set.
//!
//! [`Platform`] names every operation the thread and mutex layers need from the
//! host OS. Exactly one implementation is compiled in, selected by target
//! configuration and exported as [`Host`]:
//!
//! - [`posix::Posix`] on `cfg(unix)`: pthreads via `libc`.
//! - [`windows::Win32`] on `cfg(windows)`: kernel32 threads and SRW locks.
//!
//! Null slot pointers are rejected here, before any OS call, so both the safe
//! layer and the C ABI inherit the same precondition checks.

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};

use crate::error::Result;

#[cfg(unix)]
pub mod posix;
#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub use posix::Posix as Host;
#[cfg(windows)]
pub use windows::Win32 as Host;

/// Type-erased body of a new thread. Receives no argument and returns nothing;
/// payload and result travel inside the closure.
pub type ThreadMain = Box<dyn FnOnce() + Send + 'static>;

/// Operations a host threading facility provides.
///
/// # Safety
///
/// Implementations must uphold the mutex contract: a successful `mutex_lock`
/// or `mutex_try_lock(..) == Ok(true)` gives the caller exclusive ownership
/// until the matching `mutex_unlock`, with acquire/release ordering across the
/// hand-off.
pub unsafe trait Platform {
    /// OS handle for a joinable thread.
    type Native: Send;
    /// Caller-owned storage for one native mutex.
    type MutexSlot;

    /// Start `main` on a new OS thread. `stack_size` of `None` uses the OS default.
    fn spawn(main: ThreadMain, stack_size: Option<usize>) -> Result<Self::Native>;
    /// Block until the thread terminates, then release its handle.
    fn join(native: Self::Native) -> Result<()>;
    /// Release the handle; the OS reclaims the thread when it exits.
    fn detach(native: Self::Native) -> Result<()>;
    /// Opaque identity of the calling thread.
    fn current_id() -> u64;
    /// Give up the rest of the current time slice.
    fn yield_now();
    /// Sleep for at least `ms` milliseconds.
    fn sleep_ms(ms: u32);

    /// Construct a mutex in the unlocked state.
    ///
    /// # Safety
    ///
    /// `slot` must be null or valid for writes and not hold a live mutex.
    unsafe fn mutex_init(slot: *mut Self::MutexSlot) -> Result<()>;
    /// Release the OS resources of an unlocked mutex.
    ///
    /// # Safety
    ///
    /// `slot` must be null or point to an initialized mutex that no thread is
    /// blocked on.
    unsafe fn mutex_destroy(slot: *mut Self::MutexSlot) -> Result<()>;
    /// Block until the mutex is acquired.
    ///
    /// # Safety
    ///
    /// `slot` must be null or point to an initialized mutex.
    unsafe fn mutex_lock(slot: *mut Self::MutexSlot) -> Result<()>;
    /// Acquire without blocking; `Ok(false)` when another owner holds it.
    ///
    /// # Safety
    ///
    /// `slot` must be null or point to an initialized mutex.
    unsafe fn mutex_try_lock(slot: *mut Self::MutexSlot) -> Result<bool>;
    /// Release a mutex held by the calling thread.
    ///
    /// # Safety
    ///
    /// `slot` must be null or point to an initialized mutex locked by the
    /// calling thread.
    unsafe fn mutex_unlock(slot: *mut Self::MutexSlot) -> Result<()>;
}

/// Move `main` behind a thin pointer that fits the native entry argument.
fn main_into_raw(main: ThreadMain) -> *mut c_void {
    Box::into_raw(Box::new(main)).cast::<c_void>()
}

/// Run the closure handed over by [`main_into_raw`] on the new thread.
///
/// Unwinding must not cross the native entry frame, so any panic that escapes
/// the closure is swallowed here.
///
/// # Safety
///
/// `data` must come from [`main_into_raw`] and be consumed exactly once.
unsafe fn run_main(data: *mut c_void) {
    // SAFETY: caller guarantees `data` is an unconsumed `main_into_raw` pointer.
    let main = unsafe { Box::from_raw(data.cast::<ThreadMain>()) };
    let _ = panic::catch_unwind(AssertUnwindSafe(main));
}

/// Reclaim a closure whose thread never started.
///
/// # Safety
///
/// Same as [`run_main`].
unsafe fn drop_main(data: *mut c_void) {
    // SAFETY: caller guarantees `data` is an unconsumed `main_into_raw` pointer.
    drop(unsafe { Box::from_raw(data.cast::<ThreadMain>()) });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn raw_main_runs_once_and_contains_panics() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_main = Arc::clone(&hits);
        let data = main_into_raw(Box::new(move || {
            hits_main.fetch_add(1, Ordering::SeqCst);
            panic!("boom");
        }));
        // SAFETY: `data` was produced just above and is consumed once.
        unsafe { run_main(data) };
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_main_releases_captures() {
        let token = Arc::new(());
        let captured = Arc::clone(&token);
        let data = main_into_raw(Box::new(move || drop(captured)));
        assert_eq!(Arc::strong_count(&token), 2);
        // SAFETY: `data` was produced just above and is consumed once.
        unsafe { drop_main(data) };
        assert_eq!(Arc::strong_count(&token), 1);
    }

    #[test]
    fn host_mutex_roundtrip() {
        let mut slot = std::mem::MaybeUninit::<<Host as Platform>::MutexSlot>::uninit();
        let ptr = slot.as_mut_ptr();
        // SAFETY: `ptr` is valid local storage used in lifecycle order.
        unsafe {
            Host::mutex_init(ptr).unwrap();
            Host::mutex_lock(ptr).unwrap();
            assert!(!Host::mutex_try_lock(ptr).unwrap());
            Host::mutex_unlock(ptr).unwrap();
            assert!(Host::mutex_try_lock(ptr).unwrap());
            Host::mutex_unlock(ptr).unwrap();
            Host::mutex_destroy(ptr).unwrap();
        }
    }

    #[test]
    fn host_rejects_null_slots() {
        use crate::error::ErrorKind;
        let null = std::ptr::null_mut::<<Host as Platform>::MutexSlot>();
        // SAFETY: null is an accepted input and is never dereferenced.
        unsafe {
            assert_eq!(Host::mutex_init(null).unwrap_err().kind(), ErrorKind::Init);
            assert_eq!(
                Host::mutex_destroy(null).unwrap_err().kind(),
                ErrorKind::Destroy
            );
            assert_eq!(Host::mutex_lock(null).unwrap_err().kind(), ErrorKind::Lock);
            assert_eq!(
                Host::mutex_try_lock(null).unwrap_err().kind(),
                ErrorKind::Lock
            );
            assert_eq!(Host::mutex_unlock(null).unwrap_err().kind(), ErrorKind::Lock);
        }
    }

    #[test]
    fn host_spawn_and_join() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_main = Arc::clone(&hits);
        let native = Host::spawn(
            Box::new(move || {
                hits_main.fetch_add(1, Ordering::SeqCst);
            }),
            None,
        )
        .unwrap();
        Host::join(native).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
