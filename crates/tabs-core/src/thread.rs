//! Thread lifecycle manager.
//!
//! A [`Thread`] is a move-only handle: [`Thread::join`] and [`Thread::detach`]
//! take it by value, so a second join or detach does not compile. A handle that
//! is dropped without either is detached, which hands reclamation to the OS.
//!
//! The entry function receives one owned argument and produces one owned
//! result. The result travels back to the joiner through a shared slot that the
//! new thread fills before it exits; the native join establishes the
//! happens-before edge.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ThreadConfig;
use crate::error::{ErrorKind, Result, TabsError};
use crate::platform::{Host, Platform, ThreadMain};

/// Result slot shared between the handle and the running thread.
type Packet<R> = Arc<Mutex<Option<std::thread::Result<R>>>>;

/// Handle to a running (or finished but unjoined) thread producing `R`.
#[must_use = "dropping a Thread detaches it; call join() to wait for its result"]
pub struct Thread<R> {
    native: Option<<Host as Platform>::Native>,
    packet: Packet<R>,
}

impl<R> Thread<R> {
    /// Block until the thread's entry function returns, then yield its value.
    ///
    /// A panic inside the entry function is resumed on the calling thread.
    pub fn join(mut self) -> Result<R> {
        let Some(native) = self.native.take() else {
            return Err(TabsError::rejected(ErrorKind::Join));
        };
        Host::join(native)?;
        match self.packet.lock().take() {
            Some(Ok(value)) => Ok(value),
            Some(Err(payload)) => panic::resume_unwind(payload),
            None => Err(TabsError::rejected(ErrorKind::Join)),
        }
    }

    /// Give up the ability to join; the OS reclaims the thread when it ends.
    pub fn detach(mut self) -> Result<()> {
        match self.native.take() {
            Some(native) => Host::detach(native),
            None => Err(TabsError::rejected(ErrorKind::Detach)),
        }
    }

    /// Whether the entry function has already returned (or panicked).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.packet.lock().is_some()
    }
}

impl<R> Drop for Thread<R> {
    fn drop(&mut self) {
        if let Some(native) = self.native.take() {
            let _ = Host::detach(native);
        }
    }
}

impl<R> fmt::Debug for Thread<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

/// Thread factory with per-thread options.
#[derive(Debug, Clone, Copy, Default)]
pub struct Builder {
    config: ThreadConfig,
}

impl Builder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stack of at least `bytes`. Overrides `TABS_MIN_STACK`.
    #[must_use]
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.config.stack_size = Some(bytes);
        self
    }

    /// Start `entry(arg)` on a new thread.
    pub fn create<A, R, F>(self, entry: F, arg: A) -> Result<Thread<R>>
    where
        F: FnOnce(A) -> R + Send + 'static,
        A: Send + 'static,
        R: Send + 'static,
    {
        let packet: Packet<R> = Arc::new(Mutex::new(None));
        let their_packet = Arc::clone(&packet);
        let main: ThreadMain = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(move || entry(arg)));
            *their_packet.lock() = Some(outcome);
        });
        let native = Host::spawn(main, self.config.effective_stack_size())?;
        Ok(Thread {
            native: Some(native),
            packet,
        })
    }

    /// Start a closure on a new thread.
    pub fn spawn<R, F>(self, f: F) -> Result<Thread<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.create(move |()| f(), ())
    }
}

/// Start `entry(arg)` on a new thread with default options.
pub fn create<A, R, F>(entry: F, arg: A) -> Result<Thread<R>>
where
    F: FnOnce(A) -> R + Send + 'static,
    A: Send + 'static,
    R: Send + 'static,
{
    Builder::new().create(entry, arg)
}

/// Start a closure on a new thread with default options.
pub fn spawn<R, F>(f: F) -> Result<Thread<R>>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    Builder::new().spawn(f)
}

/// Opaque identity of a thread. Only meaningful for comparison and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(u64);

impl ThreadId {
    /// Raw numeric form, for FFI and logs.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Identity of the calling thread.
#[must_use]
pub fn current_thread_id() -> ThreadId {
    ThreadId(Host::current_id())
}

/// Hint the scheduler to run another thread. May have no effect.
pub fn yield_now() {
    Host::yield_now();
}

/// Block the calling thread for at least `ms` milliseconds.
pub fn sleep_ms(ms: u32) {
    Host::sleep_ms(ms);
}
