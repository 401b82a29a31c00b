//! # tabs-core
//!
//! Portable thread and mutex primitives.
//!
//! One contract for creating, joining and detaching threads and for
//! initializing, locking and destroying mutexes, dispatched at build time to
//! the host's native facility (pthreads on Unix, Win32 elsewhere).
//!
//! ```text
//! caller -> thread / mutex (lifecycle + typing) -> platform::Host -> OS
//! ```
//!
//! The layer keeps no global state: every handle and mutex is owned by its
//! caller. Failures surface as [`TabsError`], one variant per failing
//! operation kind, carrying the OS error number when the OS reported it.
//! Failed OS calls are never retried.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
#[allow(unsafe_code)]
pub mod mutex;
#[allow(unsafe_code)]
pub mod platform;
pub mod thread;

pub use error::{ErrorKind, OsCode, Result, TabsError};
pub use mutex::{Mutex, MutexGuard, RawMutex, SlotState};
pub use thread::{
    Builder, Thread, ThreadId, create, current_thread_id, sleep_ms, spawn, yield_now,
};
