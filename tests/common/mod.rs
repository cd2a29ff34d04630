//! Shared scaffolding for corvus's integration test binaries.
//!
//! Corvus keeps its scheduler state in process-global statics — true to the
//! kernel it models, there is exactly one of each per machine. A test binary
//! is one process, and by default `cargo test` runs its `#[test]` functions
//! on a thread pool, so every test in a binary must serialize around
//! `serial()` before touching the kernel, and start from [`fresh_kernel`].
//!
//! The host port (`corvus::port::stub`) has no real per-task execution —
//! there is no stack to suspend and later resume — so a call that would
//! genuinely block (`Queue::send` on a full queue, `Semaphore::wait` on an
//! empty one, `Mutex::lock` held elsewhere, `os_task_join` on a live task)
//! cannot be driven end-to-end through a timeout from a single synchronous
//! call here. Tests exercise those primitives through their non-blocking
//! (`timeout == 0`) form instead, which is exactly how the crate's own
//! `#[cfg(test)]` unit tests do it.

#![allow(dead_code)]

use std::sync::{Mutex, MutexGuard, OnceLock};

use corvus::task::OsTcb;
use corvus::types::{CoreId, OsPrio, OsStkElement, Tid};

static TEST_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Acquire the process-wide test lock. Hold it for the whole body of a test
/// that touches kernel statics.
pub fn serial() -> MutexGuard<'static, ()> {
    TEST_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(|e| e.into_inner())
}

/// Wipe the kernel back to its just-linked state and bring up one idle task
/// per core, ready for `os_start_for_test` on whichever cores a scenario uses.
pub fn fresh_kernel() {
    corvus::os_reset_globals();
    corvus::os_init().expect("os_init");
}

fn leak_stack(words: usize) -> &'static mut [OsStkElement] {
    Box::leak(vec![0 as OsStkElement; words].into_boxed_slice())
}

fn leak_tcb() -> &'static mut OsTcb {
    Box::leak(Box::new(OsTcb::new()))
}

/// A task entry point that is never actually called: the host stub never
/// transfers control to a task's code, it only tracks which TCB the
/// scheduler has chosen.
pub fn noop_entry(_arg: *mut ()) -> ! {
    loop {
        core::hint::spin_loop();
    }
}

/// Create and register a task with a fresh leaked TCB/stack, using
/// [`noop_entry`] as its body.
pub fn spawn(name: &'static str, prio: OsPrio, affinity: CoreId) -> Tid {
    spawn_with(name, prio, affinity, noop_entry)
}

pub fn spawn_with(name: &'static str, prio: OsPrio, affinity: CoreId, entry: corvus::task::OsTaskFn) -> Tid {
    let tcb = leak_tcb();
    let stack = leak_stack(128);
    corvus::task::os_task_create(tcb, stack, name, entry, core::ptr::null_mut(), prio, affinity, 0)
        .expect("task create")
}
