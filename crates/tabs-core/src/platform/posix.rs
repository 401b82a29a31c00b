//! pthreads-backed variant.
//!
//! `pthread_*` functions report failure through their return value (an errno
//! number), never through `errno`; those numbers become the [`OsCode`] payload.
//!
//! [`OsCode`]: crate::error::OsCode

use std::ffi::{c_int, c_void};
use std::mem::MaybeUninit;

use super::{Platform, ThreadMain, drop_main, main_into_raw, run_main};
use crate::error::{ErrorKind, Result, TabsError};

/// POSIX threads.
#[derive(Debug, Clone, Copy)]
pub struct Posix;

/// Joinable pthread handle.
#[derive(Debug)]
pub struct PosixThread(libc::pthread_t);

// SAFETY: a pthread_t is an identifier; any thread may join or detach it.
unsafe impl Send for PosixThread {}

#[inline]
fn check(kind: ErrorKind, rc: c_int) -> Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(TabsError::from_os(kind, rc))
    }
}

extern "C" fn thread_start(data: *mut c_void) -> *mut c_void {
    // SAFETY: `data` is the `main_into_raw` pointer passed to pthread_create,
    // and each created thread receives its own.
    unsafe { run_main(data) };
    std::ptr::null_mut()
}

fn page_size() -> usize {
    // SAFETY: sysconf has no memory preconditions.
    let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if raw > 0 { raw as usize } else { 4096 }
}

/// Smallest stack `pthread_attr_setstacksize` accepts. glibc computes it at
/// run time (it grows with the signal frame size), so ask sysconf first.
fn min_stack_size() -> usize {
    // SAFETY: sysconf has no memory preconditions.
    let raw = unsafe { libc::sysconf(libc::_SC_THREAD_STACK_MIN) };
    if raw > 0 {
        (raw as usize).max(libc::PTHREAD_STACK_MIN)
    } else {
        libc::PTHREAD_STACK_MIN
    }
}

/// Clamp to the platform minimum and round up to a whole page; some hosts
/// reject unaligned sizes with EINVAL.
fn native_stack_size(requested: usize) -> usize {
    let page = page_size();
    let size = requested.max(min_stack_size());
    size.div_ceil(page).saturating_mul(page)
}

unsafe impl Platform for Posix {
    type Native = PosixThread;
    type MutexSlot = libc::pthread_mutex_t;

    fn spawn(main: ThreadMain, stack_size: Option<usize>) -> Result<PosixThread> {
        let mut attr = MaybeUninit::<libc::pthread_attr_t>::uninit();
        // SAFETY: `attr` is writable storage for pthread_attr_init.
        check(ErrorKind::Creation, unsafe {
            libc::pthread_attr_init(attr.as_mut_ptr())
        })?;

        if let Some(requested) = stack_size {
            // SAFETY: `attr` was initialized above.
            let rc = unsafe {
                libc::pthread_attr_setstacksize(attr.as_mut_ptr(), native_stack_size(requested))
            };
            if rc != 0 {
                // SAFETY: `attr` was initialized above and is destroyed once.
                unsafe { libc::pthread_attr_destroy(attr.as_mut_ptr()) };
                return Err(TabsError::from_os(ErrorKind::Creation, rc));
            }
        }

        let data = main_into_raw(main);
        let mut native = MaybeUninit::<libc::pthread_t>::uninit();
        // SAFETY: `native` is writable, `attr` is initialized, `thread_start`
        // matches the pthread entry signature and takes ownership of `data`.
        let rc = unsafe {
            libc::pthread_create(native.as_mut_ptr(), attr.as_ptr(), thread_start, data)
        };
        // SAFETY: `attr` was initialized above and is destroyed once.
        unsafe { libc::pthread_attr_destroy(attr.as_mut_ptr()) };

        if rc != 0 {
            // SAFETY: no thread was started, so `data` was never consumed.
            unsafe { drop_main(data) };
            return Err(TabsError::from_os(ErrorKind::Creation, rc));
        }
        // SAFETY: pthread_create succeeded and wrote the handle.
        Ok(PosixThread(unsafe { native.assume_init() }))
    }

    fn join(native: PosixThread) -> Result<()> {
        let mut retval: *mut c_void = std::ptr::null_mut();
        // SAFETY: `native` came from a successful pthread_create and is
        // consumed here, so it is joined at most once.
        check(ErrorKind::Join, unsafe {
            libc::pthread_join(native.0, &mut retval)
        })
    }

    fn detach(native: PosixThread) -> Result<()> {
        // SAFETY: as in `join`, the handle is consumed.
        check(ErrorKind::Detach, unsafe { libc::pthread_detach(native.0) })
    }

    fn current_id() -> u64 {
        // SAFETY: pthread_self cannot fail.
        let id = unsafe { libc::pthread_self() };
        id as usize as u64
    }

    fn yield_now() {
        // SAFETY: sched_yield has no preconditions; its result is advisory.
        let _ = unsafe { libc::sched_yield() };
    }

    fn sleep_ms(ms: u32) {
        let mut req = libc::timespec {
            tv_sec: (ms / 1000) as libc::time_t,
            tv_nsec: ((ms % 1000) * 1_000_000) as _,
        };
        loop {
            let mut rem = libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            };
            // SAFETY: both timespecs are valid for the duration of the call.
            if unsafe { libc::nanosleep(&req, &mut rem) } == 0 {
                return;
            }
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            if errno != libc::EINTR {
                return;
            }
            req = rem;
        }
    }

    unsafe fn mutex_init(slot: *mut libc::pthread_mutex_t) -> Result<()> {
        if slot.is_null() {
            return Err(TabsError::rejected(ErrorKind::Init));
        }
        let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
        // SAFETY: `attr` is writable storage.
        check(ErrorKind::Init, unsafe {
            libc::pthread_mutexattr_init(attr.as_mut_ptr())
        })?;
        // NORMAL makes a relock deadlock instead of being undefined.
        // SAFETY: `attr` was initialized above.
        let mut rc = unsafe {
            libc::pthread_mutexattr_settype(attr.as_mut_ptr(), libc::PTHREAD_MUTEX_NORMAL)
        };
        if rc == 0 {
            // SAFETY: caller guarantees `slot` is writable; `attr` is initialized.
            rc = unsafe { libc::pthread_mutex_init(slot, attr.as_ptr()) };
        }
        // SAFETY: `attr` was initialized above and is destroyed once.
        unsafe { libc::pthread_mutexattr_destroy(attr.as_mut_ptr()) };
        check(ErrorKind::Init, rc)
    }

    unsafe fn mutex_destroy(slot: *mut libc::pthread_mutex_t) -> Result<()> {
        if slot.is_null() {
            return Err(TabsError::rejected(ErrorKind::Destroy));
        }
        // SAFETY: caller guarantees `slot` holds an initialized mutex.
        check(ErrorKind::Destroy, unsafe {
            libc::pthread_mutex_destroy(slot)
        })
    }

    unsafe fn mutex_lock(slot: *mut libc::pthread_mutex_t) -> Result<()> {
        if slot.is_null() {
            return Err(TabsError::rejected(ErrorKind::Lock));
        }
        // SAFETY: caller guarantees `slot` holds an initialized mutex.
        check(ErrorKind::Lock, unsafe { libc::pthread_mutex_lock(slot) })
    }

    unsafe fn mutex_try_lock(slot: *mut libc::pthread_mutex_t) -> Result<bool> {
        if slot.is_null() {
            return Err(TabsError::rejected(ErrorKind::Lock));
        }
        // SAFETY: caller guarantees `slot` holds an initialized mutex.
        match unsafe { libc::pthread_mutex_trylock(slot) } {
            0 => Ok(true),
            libc::EBUSY => Ok(false),
            rc => Err(TabsError::from_os(ErrorKind::Lock, rc)),
        }
    }

    unsafe fn mutex_unlock(slot: *mut libc::pthread_mutex_t) -> Result<()> {
        if slot.is_null() {
            return Err(TabsError::rejected(ErrorKind::Lock));
        }
        // SAFETY: caller guarantees `slot` is locked by this thread.
        check(ErrorKind::Lock, unsafe { libc::pthread_mutex_unlock(slot) })
    }
}
