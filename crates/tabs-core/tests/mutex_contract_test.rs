#![allow(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, mpsc};
use std::time::{Duration, Instant};

use tabs_core::{ErrorKind, Mutex, RawMutex, SlotState, TabsError, spawn};

#[derive(Clone, Copy, Debug)]
enum Op {
    Init,
    Lock,
    TryLock,
    Unlock,
    Destroy,
}

fn apply(raw: &mut RawMutex, op: Op) -> Result<bool, TabsError> {
    match op {
        Op::Init => raw.init().map(|()| true),
        Op::Lock => raw.lock().map(|()| true),
        Op::TryLock => raw.try_lock(),
        Op::Unlock => {
            // SAFETY: sequences below only unlock after their own lock, or on
            // a slot the layer rejects before reaching the OS.
            let rc = unsafe { raw.unlock() };
            rc.map(|()| true)
        }
        Op::Destroy => raw.destroy().map(|()| true),
    }
}

#[test]
fn single_thread_lifecycle_matrix() {
    use Op::*;
    let cases: &[(&[Op], &[Result<bool, ErrorKind>], SlotState)] = &[
        (&[Init, Destroy], &[Ok(true), Ok(true)], SlotState::Destroyed),
        (
            &[Init, Lock, Unlock, Destroy],
            &[Ok(true), Ok(true), Ok(true), Ok(true)],
            SlotState::Destroyed,
        ),
        (
            &[Init, TryLock, TryLock, Unlock, TryLock, Unlock],
            &[Ok(true), Ok(true), Ok(false), Ok(true), Ok(true), Ok(true)],
            SlotState::Ready,
        ),
        (
            &[Lock, TryLock, Unlock, Destroy],
            &[
                Err(ErrorKind::Lock),
                Err(ErrorKind::Lock),
                Err(ErrorKind::Lock),
                Err(ErrorKind::Destroy),
            ],
            SlotState::Uninitialized,
        ),
        (
            &[Init, Init, Destroy, Destroy, Init],
            &[
                Ok(true),
                Err(ErrorKind::Init),
                Ok(true),
                Err(ErrorKind::Destroy),
                Ok(true),
            ],
            SlotState::Ready,
        ),
    ];

    for (ops, expected, final_state) in cases {
        let mut raw = RawMutex::new();
        for (step, (op, want)) in ops.iter().zip(expected.iter()).enumerate() {
            let got = apply(&mut raw, *op).map_err(TabsError::kind);
            assert_eq!(&got, want, "ops={ops:?} step={step} op={op:?}");
        }
        assert_eq!(raw.state(), *final_state, "ops={ops:?}");
    }
}

#[test]
fn try_lock_held_by_other_thread_fails_immediately() {
    let m = Arc::new(Mutex::new(()).unwrap());
    let holder_mutex = Arc::clone(&m);
    let locked = Arc::new(Barrier::new(2));
    let locked_holder = Arc::clone(&locked);
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let holder = spawn(move || {
        let _guard = holder_mutex.lock().unwrap();
        locked_holder.wait();
        release_rx.recv().unwrap();
    })
    .unwrap();

    locked.wait();
    let start = Instant::now();
    assert!(m.try_lock().unwrap().is_none());
    assert!(start.elapsed() < Duration::from_secs(1));

    release_tx.send(()).unwrap();
    holder.join().unwrap();
    assert!(m.try_lock().unwrap().is_some());
}

#[test]
fn lock_blocks_until_holder_releases() {
    let m = Arc::new(Mutex::new(0_u32).unwrap());
    let holder_mutex = Arc::clone(&m);
    let locked = Arc::new(Barrier::new(2));
    let locked_holder = Arc::clone(&locked);
    let acquired = Arc::new(AtomicBool::new(false));
    let acquired_waiter = Arc::clone(&acquired);

    let holder = spawn(move || {
        let mut guard = holder_mutex.lock().unwrap();
        locked_holder.wait();
        tabs_core::sleep_ms(50);
        *guard = 1;
    })
    .unwrap();

    locked.wait();
    let waiter_mutex = Arc::clone(&m);
    let waiter = spawn(move || {
        let guard = waiter_mutex.lock().unwrap();
        acquired_waiter.store(true, Ordering::Release);
        *guard
    })
    .unwrap();

    holder.join().unwrap();
    // Memory written under the lock is visible to the next holder.
    assert_eq!(waiter.join().unwrap(), 1);
    assert!(acquired.load(Ordering::Acquire));
}

#[test]
fn four_workers_protected_increments_lose_nothing() {
    const THREADS: u64 = 4;
    const INCREMENTS: u64 = 100_000;

    for _round in 0..3 {
        let counter = Arc::new(Mutex::new(0_u64).unwrap());
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let counter = Arc::clone(&counter);
                spawn(move || {
                    for _ in 0..INCREMENTS {
                        *counter.lock().unwrap() += 1;
                    }
                })
                .unwrap()
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        let total = *counter.lock().unwrap();
        assert_eq!(THREADS * INCREMENTS - total, 0);
    }
}
