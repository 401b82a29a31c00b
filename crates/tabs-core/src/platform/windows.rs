//! Win32-backed variant.
//!
//! Threads come from `CreateThread`. The mutex is a slim reader/writer lock
//! used in exclusive mode: unlike a critical section it is not reentrant, so
//! the owning thread cannot silently reacquire it. SRW locks need no OS
//! teardown; `mutex_init` writes `SRWLOCK_INIT` and `mutex_destroy` only checks
//! that nobody holds the lock.

use std::ffi::c_void;

use super::{Platform, ThreadMain, drop_main, main_into_raw, run_main};
use crate::error::{ErrorKind, Result, TabsError};

type Handle = *mut c_void;
type Bool = i32;
type ThreadStartRoutine = unsafe extern "system" fn(*mut c_void) -> u32;

const INFINITE: u32 = 0xFFFF_FFFF;
const WAIT_OBJECT_0: u32 = 0;
const STACK_SIZE_PARAM_IS_A_RESERVATION: u32 = 0x0001_0000;

/// `SRWLOCK`: a single pointer-sized word.
#[repr(C)]
#[derive(Debug)]
pub struct SrwLock {
    ptr: *mut c_void,
}

#[link(name = "kernel32")]
unsafe extern "system" {
    fn CreateThread(
        attributes: *mut c_void,
        stack_size: usize,
        start: ThreadStartRoutine,
        parameter: *mut c_void,
        creation_flags: u32,
        thread_id: *mut u32,
    ) -> Handle;
    fn WaitForSingleObject(handle: Handle, millis: u32) -> u32;
    fn CloseHandle(handle: Handle) -> Bool;
    fn GetCurrentThreadId() -> u32;
    fn GetLastError() -> u32;
    fn SwitchToThread() -> Bool;
    fn Sleep(millis: u32);
    fn AcquireSRWLockExclusive(lock: *mut SrwLock);
    fn TryAcquireSRWLockExclusive(lock: *mut SrwLock) -> u8;
    fn ReleaseSRWLockExclusive(lock: *mut SrwLock);
}

/// Win32 threads and SRW locks.
#[derive(Debug, Clone, Copy)]
pub struct Win32;

/// Joinable thread handle.
#[derive(Debug)]
pub struct Win32Thread(Handle);

// SAFETY: a thread HANDLE may be waited on and closed from any thread.
unsafe impl Send for Win32Thread {}

fn last_error(kind: ErrorKind) -> TabsError {
    // SAFETY: GetLastError reads thread-local state only.
    TabsError::from_os(kind, unsafe { GetLastError() } as i32)
}

unsafe extern "system" fn thread_start(data: *mut c_void) -> u32 {
    // SAFETY: `data` is the `main_into_raw` pointer handed to CreateThread.
    unsafe { run_main(data) };
    0
}

unsafe impl Platform for Win32 {
    type Native = Win32Thread;
    type MutexSlot = SrwLock;

    fn spawn(main: ThreadMain, stack_size: Option<usize>) -> Result<Win32Thread> {
        let data = main_into_raw(main);
        let (size, flags) = match stack_size {
            Some(size) => (size, STACK_SIZE_PARAM_IS_A_RESERVATION),
            None => (0, 0),
        };
        // SAFETY: `thread_start` matches LPTHREAD_START_ROUTINE and takes
        // ownership of `data`; null attributes and id pointer are permitted.
        let handle = unsafe {
            CreateThread(
                std::ptr::null_mut(),
                size,
                thread_start,
                data,
                flags,
                std::ptr::null_mut(),
            )
        };
        if handle.is_null() {
            let err = last_error(ErrorKind::Creation);
            // SAFETY: no thread was started, so `data` was never consumed.
            unsafe { drop_main(data) };
            return Err(err);
        }
        Ok(Win32Thread(handle))
    }

    fn join(native: Win32Thread) -> Result<()> {
        // SAFETY: `native.0` is a live handle owned by this call.
        let waited = unsafe { WaitForSingleObject(native.0, INFINITE) };
        if waited != WAIT_OBJECT_0 {
            let err = last_error(ErrorKind::Join);
            // Consumed either way; close it before reporting.
            // SAFETY: closed exactly once, here.
            unsafe { CloseHandle(native.0) };
            return Err(err);
        }
        // SAFETY: the handle is closed exactly once, here.
        if unsafe { CloseHandle(native.0) } == 0 {
            return Err(last_error(ErrorKind::Join));
        }
        Ok(())
    }

    fn detach(native: Win32Thread) -> Result<()> {
        // SAFETY: the handle is closed exactly once, here.
        if unsafe { CloseHandle(native.0) } == 0 {
            return Err(last_error(ErrorKind::Detach));
        }
        Ok(())
    }

    fn current_id() -> u64 {
        // SAFETY: no preconditions.
        u64::from(unsafe { GetCurrentThreadId() })
    }

    fn yield_now() {
        // SAFETY: no preconditions; a zero return only means nothing else was ready.
        let _ = unsafe { SwitchToThread() };
    }

    fn sleep_ms(ms: u32) {
        // SAFETY: no preconditions.
        unsafe { Sleep(ms) };
    }

    unsafe fn mutex_init(slot: *mut SrwLock) -> Result<()> {
        if slot.is_null() {
            return Err(TabsError::rejected(ErrorKind::Init));
        }
        // SAFETY: caller guarantees `slot` is writable. SRWLOCK_INIT is all zeroes.
        unsafe {
            slot.write(SrwLock {
                ptr: std::ptr::null_mut(),
            })
        };
        Ok(())
    }

    unsafe fn mutex_destroy(slot: *mut SrwLock) -> Result<()> {
        if slot.is_null() {
            return Err(TabsError::rejected(ErrorKind::Destroy));
        }
        // SAFETY: caller guarantees `slot` holds an initialized lock.
        if unsafe { TryAcquireSRWLockExclusive(slot) } == 0 {
            return Err(TabsError::rejected(ErrorKind::Destroy));
        }
        // SAFETY: acquired just above by this thread.
        unsafe { ReleaseSRWLockExclusive(slot) };
        Ok(())
    }

    unsafe fn mutex_lock(slot: *mut SrwLock) -> Result<()> {
        if slot.is_null() {
            return Err(TabsError::rejected(ErrorKind::Lock));
        }
        // SAFETY: caller guarantees `slot` holds an initialized lock.
        unsafe { AcquireSRWLockExclusive(slot) };
        Ok(())
    }

    unsafe fn mutex_try_lock(slot: *mut SrwLock) -> Result<bool> {
        if slot.is_null() {
            return Err(TabsError::rejected(ErrorKind::Lock));
        }
        // SAFETY: caller guarantees `slot` holds an initialized lock.
        Ok(unsafe { TryAcquireSRWLockExclusive(slot) } != 0)
    }

    unsafe fn mutex_unlock(slot: *mut SrwLock) -> Result<()> {
        if slot.is_null() {
            return Err(TabsError::rejected(ErrorKind::Lock));
        }
        // SAFETY: caller guarantees this thread holds the lock.
        unsafe { ReleaseSRWLockExclusive(slot) };
        Ok(())
    }
}
