//! Mutex manager.
//!
//! [`RawMutex`] is the caller-owned slot with the explicit
//! init / lock / try-lock / unlock / destroy lifecycle. [`Mutex`] wraps it
//! around the data it protects and hands out RAII guards, so unlocking from a
//! thread that does not own the lock cannot be expressed in safe code.
//!
//! The native object sits behind a `Box`: once initialized it never moves,
//! which POSIX requires for `pthread_mutex_t`.
//!
//! Lifecycle misuse that the slot can see for itself (lock before init or after
//! destroy, double init, double destroy) is reported as an error with no OS
//! payload. Relocking from the owning thread is not detected; it deadlocks.

use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{ErrorKind, Result, TabsError};
use crate::platform::{Host, Platform};

type Slot = <Host as Platform>::MutexSlot;

const SLOT_UNINIT: u8 = 0;
const SLOT_READY: u8 = 1;
const SLOT_DESTROYED: u8 = 2;

/// Lifecycle state of a [`RawMutex`] slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Storage exists but holds no mutex yet.
    Uninitialized,
    /// Holds a live mutex (locked or unlocked).
    Ready,
    /// The mutex was destroyed; `init` may be called again.
    Destroyed,
}

/// Caller-owned storage for one native mutex.
pub struct RawMutex {
    slot: Box<UnsafeCell<MaybeUninit<Slot>>>,
    state: AtomicU8,
}

// SAFETY: the native mutex is designed for cross-thread use; all access to the
// slot goes through the OS primitive, and state changes need `&mut self`.
unsafe impl Send for RawMutex {}
// SAFETY: as above.
unsafe impl Sync for RawMutex {}

impl RawMutex {
    /// Allocate uninitialized storage. Call [`RawMutex::init`] before use.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Box::new(UnsafeCell::new(MaybeUninit::uninit())),
            state: AtomicU8::new(SLOT_UNINIT),
        }
    }

    /// Allocate and initialize in one step.
    pub fn new_initialized() -> Result<Self> {
        let mut raw = Self::new();
        raw.init()?;
        Ok(raw)
    }

    fn slot_ptr(&self) -> *mut Slot {
        self.slot.get().cast::<Slot>()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SlotState {
        match self.state.load(Ordering::Acquire) {
            SLOT_READY => SlotState::Ready,
            SLOT_DESTROYED => SlotState::Destroyed,
            _ => SlotState::Uninitialized,
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state() == SlotState::Ready
    }

    /// Construct the native mutex in the unlocked state.
    pub fn init(&mut self) -> Result<()> {
        if self.is_initialized() {
            return Err(TabsError::rejected(ErrorKind::Init));
        }
        // SAFETY: the slot is valid for writes and holds no live mutex.
        unsafe { Host::mutex_init(self.slot_ptr())? };
        self.state.store(SLOT_READY, Ordering::Release);
        Ok(())
    }

    /// Release the native mutex. Fails if it is still locked.
    pub fn destroy(&mut self) -> Result<()> {
        if !self.is_initialized() {
            return Err(TabsError::rejected(ErrorKind::Destroy));
        }
        // SAFETY: the slot holds a live mutex; `&mut self` rules out waiters.
        unsafe { Host::mutex_destroy(self.slot_ptr())? };
        self.state.store(SLOT_DESTROYED, Ordering::Release);
        Ok(())
    }

    fn ensure_ready(&self, kind: ErrorKind) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(TabsError::rejected(kind))
        }
    }

    /// Block until the calling thread owns the mutex.
    ///
    /// The mutex is not reentrant: calling this while already holding it
    /// deadlocks.
    pub fn lock(&self) -> Result<()> {
        self.ensure_ready(ErrorKind::Lock)?;
        // SAFETY: the slot holds a live mutex.
        unsafe { Host::mutex_lock(self.slot_ptr()) }
    }

    /// Acquire without blocking. `Ok(false)` means someone holds it.
    pub fn try_lock(&self) -> Result<bool> {
        self.ensure_ready(ErrorKind::Lock)?;
        // SAFETY: the slot holds a live mutex.
        unsafe { Host::mutex_try_lock(self.slot_ptr()) }
    }

    /// Release the mutex.
    ///
    /// # Safety
    ///
    /// The calling thread must currently hold the lock.
    pub unsafe fn unlock(&self) -> Result<()> {
        self.ensure_ready(ErrorKind::Lock)?;
        // SAFETY: the slot holds a live mutex owned by the caller.
        unsafe { Host::mutex_unlock(self.slot_ptr()) }
    }
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RawMutex {
    fn drop(&mut self) {
        if self.is_initialized() {
            // A leaked guard leaves the mutex locked; the OS object then leaks.
            let _ = self.destroy();
        }
    }
}

impl fmt::Debug for RawMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMutex")
            .field("state", &self.state())
            .finish()
    }
}

/// Mutual-exclusion lock owning the data it protects.
pub struct Mutex<T: ?Sized> {
    raw: RawMutex,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is serialized by `raw`.
unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
// SAFETY: as above; `T: Send` because guards hand `&mut T` to other threads in turn.
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Create an unlocked mutex around `value`.
    pub fn new(value: T) -> Result<Self> {
        Ok(Self {
            raw: RawMutex::new_initialized()?,
            data: UnsafeCell::new(value),
        })
    }

    /// Consume the mutex, returning the data. The native mutex is destroyed.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Block until the lock is held, then return a guard that releases it on drop.
    pub fn lock(&self) -> Result<MutexGuard<'_, T>> {
        self.raw.lock()?;
        Ok(MutexGuard::new(self))
    }

    /// Acquire without blocking. `Ok(None)` when another holder has it.
    pub fn try_lock(&self) -> Result<Option<MutexGuard<'_, T>>> {
        Ok(self.raw.try_lock()?.then(|| MutexGuard::new(self)))
    }

    /// Mutable access without locking; `&mut self` proves exclusivity.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Mutex");
        match self.try_lock() {
            Ok(Some(guard)) => d.field("data", &&*guard),
            _ => d.field("data", &format_args!("<locked>")),
        };
        d.finish_non_exhaustive()
    }
}

/// Proof of ownership of a [`Mutex`]. Unlocks on drop.
///
/// Not `Send`: the unlock must happen on the thread that locked.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct MutexGuard<'a, T: ?Sized> {
    mutex: &'a Mutex<T>,
    _not_send: PhantomData<*const ()>,
}

// SAFETY: sharing `&MutexGuard` only exposes `&T`.
unsafe impl<T: ?Sized + Sync> Sync for MutexGuard<'_, T> {}

impl<'a, T: ?Sized> MutexGuard<'a, T> {
    fn new(mutex: &'a Mutex<T>) -> Self {
        Self {
            mutex,
            _not_send: PhantomData,
        }
    }
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard holds the lock.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard holds the lock exclusively.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        // SAFETY: this guard was created by a successful lock on this thread.
        let _ = unsafe { self.mutex.raw.unlock() };
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
