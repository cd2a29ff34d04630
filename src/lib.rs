//! Corvus — a preemptive, priority-based, SMP-aware real-time microkernel.
//!
//! Provides:
//! - a per-priority ready set with O(1) highest-priority lookup, dispatched
//!   across `CFG_N_CORES` cores with optional task core affinity;
//! - the task lifecycle state machine (create/delete/join/TLS);
//! - message queues, counting semaphores, and priority-inheriting mutexes,
//!   all built on one priority-ordered wait-list utility;
//! - tick-driven delayed wakeup with overflow-safe two-list cycling.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

// ============ Critical Section ============

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct CortexM4CriticalSection;
    set_impl!(CortexM4CriticalSection);

    unsafe impl Impl for CortexM4CriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

/// Host test backend: no real interrupts to mask, so `acquire`/`release`
/// degrade to a plain spin-loop. Registered only off-target so `cargo test`
/// (and any other non-ARM host build) links against a real
/// `critical_section::Impl` instead of failing at link time.
#[cfg(not(target_arch = "arm"))]
mod cs_impl {
    use core::sync::atomic::{AtomicBool, Ordering};
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct HostCriticalSection;
    set_impl!(HostCriticalSection);

    static LOCKED: AtomicBool = AtomicBool::new(false);

    unsafe impl Impl for HostCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            while LOCKED
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                core::hint::spin_loop();
            }
            true
        }

        unsafe fn release(_restore: RawRestoreState) {
            LOCKED.store(false, Ordering::Release);
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod ipc;
pub mod sync;
pub mod port;

// ============ Re-exports ============

pub use core::config;
pub use core::config::*;
pub use core::critical;
pub use core::error;
pub use core::error::OsError;
pub use core::kernel;
pub use core::kernel::{
    os_init, os_sched_get_state, os_sched_resume_this_core, os_sched_suspend_this_core, os_start,
    os_stop, OsSchedState,
};
#[doc(hidden)]
pub use core::kernel::{os_reset_globals, os_start_for_test, os_test_set_tick};
pub use core::prio;
pub use core::types;
pub use core::types::*;
pub use core::task;
pub use core::task::{
    os_task_create, os_task_del, os_task_get_base_priority, os_task_get_core,
    os_task_get_name, os_task_get_priority, os_task_get_state, os_task_join,
    os_task_tls_get, os_task_tls_set,
};
#[cfg(feature = "queue")]
pub use core::task::{os_task_receive_msg, os_task_send_msg};
pub use core::sched;
pub use core::time;
pub use core::wait_list;

#[cfg(feature = "queue")]
pub use ipc::queue;

#[cfg(feature = "sem")]
pub use sync::sem;
#[cfg(feature = "mutex")]
pub use sync::mutex;
