//! Host/test port backend
//!
//! Used whenever the crate is not built for `target_arch = "arm"`. There is
//! no real multi-core hardware to dispatch onto when running under
//! `cargo test`; instead, tests drive each simulated core explicitly by
//! calling scheduler entry points with an explicit [`CoreId`], and use
//! [`set_core_id`] to make [`core_id`] answer as whichever core the test is
//! currently acting as.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::task::OsTaskFn;
use crate::types::{CoreId, OsOpt, OsStkElement};

const MAX_SIMULATED_CORES: usize = 8;

static STUB_CORE_ID: AtomicU8 = AtomicU8::new(0);
static YIELD_REQUESTED: [AtomicBool; MAX_SIMULATED_CORES] =
    [const { AtomicBool::new(false) }; MAX_SIMULATED_CORES];

/// Test-only: make [`core_id`] report `id` for the calling (test) thread.
pub fn set_core_id(id: CoreId) {
    STUB_CORE_ID.store(id, Ordering::SeqCst);
}

pub fn core_id() -> CoreId {
    STUB_CORE_ID.load(Ordering::SeqCst)
}

pub fn yield_other_core(core: CoreId) {
    if (core as usize) < MAX_SIMULATED_CORES {
        YIELD_REQUESTED[core as usize].store(true, Ordering::SeqCst);
    }
}

/// Test-only: did a yield IPI fire for `core` since the last check? Clears
/// the flag.
pub fn take_yield_requested(core: CoreId) -> bool {
    if (core as usize) < MAX_SIMULATED_CORES {
        YIELD_REQUESTED[core as usize].swap(false, Ordering::SeqCst)
    } else {
        false
    }
}

pub unsafe fn os_start_high_rdy() -> ! {
    panic!("os_start_high_rdy is not available on this platform");
}

/// Unwind `start_scheduler` (spec §6 port table `end_scheduler`). Nothing to
/// unwind on the host stub — tests never call `os_start_high_rdy` in the
/// first place — so this only exists to satisfy the port interface.
pub fn end_scheduler() {}

/// No asynchronous PendSV exists on the host, so the logical context switch
/// (which real hardware performs inside the PendSV handler) happens here,
/// synchronously, so host tests observe scheduling decisions immediately.
pub fn os_ctx_sw() {
    unsafe { crate::core::kernel::apply_context_switch(core_id()) };
}

pub fn os_int_ctx_sw() {
    unsafe { crate::core::kernel::apply_context_switch(core_id()) };
}

pub unsafe fn os_task_stk_init(
    _task_fn: OsTaskFn,
    _arg: *mut (),
    stk_base: *mut OsStkElement,
    stk_size: usize,
    _opt: OsOpt,
) -> *mut OsStkElement {
    unsafe { stk_base.add(stk_size - 1) }
}

pub fn os_cpu_systick_init(_reload: u32) {}
