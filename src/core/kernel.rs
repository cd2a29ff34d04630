//! Kernel-global state: per-core run state and the shared scheduler data
//! structures (spec §4.1, §5).
//!
//! Two tiers of shared state exist here, matching spec §5's classification:
//!
//! - [`CoreState`], one per core (`CFG_N_CORES` of them): which task is
//!   running and which is about to be, and the reentrancy/suspension flags
//!   that belong to that one core alone.
//! - [`SchedState`]: the ready-list bitmap and per-priority lists, the
//!   delayed list and its overflow twin, the suspended list, each core's
//!   pending-ready list, and the deletion-pending list — all guarded by the
//!   kernel's single global spin-mutex, here the same critical section the
//!   teacher used for its single-core equivalent, since entering it masks
//!   interrupts on whichever core enters it.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::config::{CFG_IDLE_PRIORITY, CFG_IDLE_STACK_SIZE, CFG_MAX_PRIORITIES, CFG_N_CORES};
use crate::critical::critical_section;
use crate::cs_cell::CsCell;
use crate::error::OsResult;
use crate::prio::PrioTable;
use crate::sched::SchedList;
use crate::task::{os_task_create_idle, OsTcb};
use crate::types::{CoreId, OsPrio, OsTick};

/// Per-core run state.
#[repr(C)]
pub struct CoreState {
    /// Task currently executing on this core.
    pub tcb_cur: Option<NonNull<OsTcb>>,
    /// Task the scheduler has selected to run next on this core.
    pub tcb_high_rdy: Option<NonNull<OsTcb>>,
    pub prio_cur: OsPrio,
    pub prio_high_rdy: OsPrio,
    /// Set while a context switch is in flight on this core, guarding
    /// against re-entering the context-switch path from within itself.
    pub switching_context: bool,
    /// Set when a yield was requested while this core's scheduler lock was
    /// held; consumed the moment the lock releases.
    pub yield_pending: bool,
    /// Ticks folded in locally while this core's scheduler was locked,
    /// applied to the shared delayed list once it unlocks.
    pub pending_ticks: OsTick,
    /// True while this core alone has the scheduler locked.
    pub sched_suspended: bool,
}

impl CoreState {
    pub const fn new() -> Self {
        CoreState {
            tcb_cur: None,
            tcb_high_rdy: None,
            prio_cur: CFG_IDLE_PRIORITY,
            prio_high_rdy: CFG_IDLE_PRIORITY,
            switching_context: false,
            yield_pending: false,
            pending_ticks: 0,
            sched_suspended: false,
        }
    }
}

/// Flat atomic kernel flags, readable without a critical section.
pub struct KernelFlags {
    initialized: AtomicBool,
    running: AtomicBool,
    stopped: AtomicBool,
    int_nesting: AtomicU8,
    sched_lock_nesting: AtomicU8,
    tick_counter: AtomicU32,
}

impl KernelFlags {
    const fn new() -> Self {
        KernelFlags {
            initialized: AtomicBool::new(false),
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            int_nesting: AtomicU8::new(0),
            sched_lock_nesting: AtomicU8::new(0),
            tick_counter: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    #[inline]
    pub fn int_nesting(&self) -> u8 {
        self.int_nesting.load(Ordering::Acquire)
    }

    pub(crate) fn int_enter(&self) {
        self.int_nesting.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn int_exit(&self) -> u8 {
        self.int_nesting.fetch_sub(1, Ordering::AcqRel) - 1
    }

    #[inline]
    pub fn sched_lock_nesting(&self) -> u8 {
        self.sched_lock_nesting.load(Ordering::Acquire)
    }

    pub(crate) fn sched_lock(&self) {
        self.sched_lock_nesting.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn sched_unlock(&self) -> u8 {
        self.sched_lock_nesting.fetch_sub(1, Ordering::AcqRel) - 1
    }

    #[inline]
    pub fn tick_get(&self) -> OsTick {
        self.tick_counter.load(Ordering::Acquire)
    }
}

pub static KERNEL: KernelFlags = KernelFlags::new();

/// Shared scheduler data: the ready-list bitmap plus every intrusive list a
/// task can be threaded onto through its scheduler-list link pair.
pub struct SchedState {
    pub prio_tbl: PrioTable,
    pub rdy_list: [SchedList; CFG_MAX_PRIORITIES],
    pub delayed_list: SchedList,
    pub delayed_list_overflow: SchedList,
    pub suspended_list: SchedList,
    pub pending_ready: [SchedList; CFG_N_CORES],
    pub deletion_pending: SchedList,
    pub num_tasks: usize,
}

impl SchedState {
    const fn new() -> Self {
        SchedState {
            prio_tbl: PrioTable::new(),
            rdy_list: [SchedList::new(); CFG_MAX_PRIORITIES],
            delayed_list: SchedList::new(),
            delayed_list_overflow: SchedList::new(),
            suspended_list: SchedList::new(),
            pending_ready: [SchedList::new(); CFG_N_CORES],
            deletion_pending: SchedList::new(),
            num_tasks: 0,
        }
    }
}

static SCHED: CsCell<SchedState> = CsCell::new(SchedState::new());
static CORE_STATES: CsCell<[CoreState; CFG_N_CORES]> =
    CsCell::new([const { CoreState::new() }; CFG_N_CORES]);

static IDLE_TCB: CsCell<[OsTcb; CFG_N_CORES]> = CsCell::new([const { OsTcb::new() }; CFG_N_CORES]);
static IDLE_STK: CsCell<[[crate::types::OsStkElement; CFG_IDLE_STACK_SIZE]; CFG_N_CORES]> =
    CsCell::new([[0; CFG_IDLE_STACK_SIZE]; CFG_N_CORES]);

/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn sched_state() -> &'static mut SchedState {
    unsafe { SCHED.get_unchecked() }
}

/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn prio_table() -> &'static mut PrioTable {
    unsafe { &mut sched_state().prio_tbl }
}

/// # Safety
/// Caller must hold the kernel's critical section. `prio` must be `< CFG_MAX_PRIORITIES`.
pub(crate) unsafe fn rdy_list(prio: OsPrio) -> &'static mut SchedList {
    unsafe { &mut sched_state().rdy_list[prio as usize] }
}

/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn core_state(core: CoreId) -> &'static mut CoreState {
    unsafe { &mut CORE_STATES.get_unchecked()[core as usize] }
}

/// Task currently running on `core`, or `None` before the scheduler has
/// started dispatching on it.
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn cur_tcb(core: CoreId) -> Option<NonNull<OsTcb>> {
    unsafe { core_state(core) }.tcb_cur
}

/// [`cur_tcb`] for the calling core.
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn cur_tcb_here() -> Option<NonNull<OsTcb>> {
    unsafe { cur_tcb(crate::port::core_id()) }
}

/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn inc_num_tasks() {
    unsafe { sched_state() }.num_tasks += 1;
}

/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn dec_num_tasks() {
    unsafe { sched_state() }.num_tasks -= 1;
}

/// Number of live tasks (created, not yet reclaimed), idle tasks included.
pub fn num_tasks() -> usize {
    critical_section(|_cs| unsafe { sched_state() }.num_tasks)
}

/// Advance the shared tick counter by one and return the new value,
/// swapping the delayed list with its overflow twin on `u32` wraparound:
/// entries already queued on the overflow list (their computed wakeup tick
/// had wrapped past `u32::MAX`) become valid the instant the counter itself
/// wraps, at which point the two lists trade roles.
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn tick_advance() -> OsTick {
    let new_tick = KERNEL.tick_counter.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
    if new_tick == 0 {
        let state = unsafe { sched_state() };
        core::mem::swap(&mut state.delayed_list, &mut state.delayed_list_overflow);
        crate::debug!("tick counter wrapped, delayed-list cycle swapped");
    }
    new_tick
}

/// Reset all kernel-global state. Exposed for host test harnesses that want
/// a fresh kernel per test rather than per process.
#[doc(hidden)]
pub fn os_reset_globals() {
    critical_section(|_cs| unsafe {
        KERNEL.initialized.store(false, Ordering::Release);
        KERNEL.running.store(false, Ordering::Release);
        KERNEL.stopped.store(false, Ordering::Release);
        KERNEL.int_nesting.store(0, Ordering::Release);
        KERNEL.sched_lock_nesting.store(0, Ordering::Release);
        KERNEL.tick_counter.store(0, Ordering::Release);

        *sched_state() = SchedState::new();
        *CORE_STATES.get_unchecked() = [const { CoreState::new() }; CFG_N_CORES];
    });
}

/// Force the shared tick counter to `value`. Exposed for host test harnesses
/// that need to reproduce a near-wraparound scenario without actually
/// driving billions of ticks through [`tick_advance`].
#[doc(hidden)]
pub fn os_test_set_tick(value: OsTick) {
    KERNEL.tick_counter.store(value, Ordering::Release);
}

/// TCB pointer for `core`'s idle task, used by the context-switch algorithm
/// when no other task is ready to run (spec §4.1 step 5).
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn idle_tcb(core: CoreId) -> NonNull<OsTcb> {
    unsafe { NonNull::new_unchecked(&mut IDLE_TCB.get_unchecked()[core as usize] as *mut OsTcb) }
}

fn os_idle_task(_arg: *mut ()) -> ! {
    loop {
        crate::task::idle_reclaim_pass();

        #[cfg(target_arch = "arm")]
        cortex_m::asm::wfi();
        #[cfg(not(target_arch = "arm"))]
        core::hint::spin_loop();
    }
}

/// Initialize the kernel: create one idle task per core, pinned to that
/// core, and mark the kernel ready for [`os_start`]. Must be called exactly
/// once, before any core calls `os_start`.
pub fn os_init() -> OsResult<()> {
    critical_section(|_cs| {
        for core in 0..CFG_N_CORES as CoreId {
            let tcb = unsafe { &mut IDLE_TCB.get_unchecked()[core as usize] as *mut OsTcb };
            let stk = unsafe { &mut IDLE_STK.get_unchecked()[core as usize][..] };
            os_task_create_idle(tcb, stk, "idle", os_idle_task, core)?;
        }
        KERNEL.initialized.store(true, Ordering::Release);
        Ok(())
    })
}

/// Start multitasking on the calling core: select its highest-ready task
/// and hand control to the port layer. Never returns. Each core calls this
/// once, after `os_init` has run on the primary core.
pub fn os_start() -> ! {
    let core = crate::port::core_id();

    critical_section(|_cs| unsafe { crate::sched::initial_dispatch(core) });

    KERNEL.running.store(true, Ordering::Release);
    KERNEL.stopped.store(false, Ordering::Release);
    crate::port::os_cpu_systick_init(crate::config::CFG_TICK_RATE_HZ);

    unsafe { crate::port::os_start_high_rdy() }
}

/// Test-only equivalent of [`os_start`] that skips the hand-off to
/// `port::os_start_high_rdy` (which has no real caller to return to on the
/// host stub backend). Performs the same initial per-core dispatch and
/// flips the same `running`/`stopped` flags, so host tests can exercise
/// `os_sched`/tick processing/blocking APIs exactly as they behave once a
/// real port's `start_scheduler` hands off.
#[doc(hidden)]
pub fn os_start_for_test(core: CoreId) {
    critical_section(|_cs| unsafe {
        crate::sched::initial_dispatch(core);
        apply_context_switch(core);
    });
    KERNEL.running.store(true, Ordering::Release);
    KERNEL.stopped.store(false, Ordering::Release);
}

/// Apply a previously selected context switch on `core`: logical bookkeeping
/// only (`tcb_cur`/`prio_cur` catch up to `tcb_high_rdy`/`prio_high_rdy`).
/// On the real Cortex-M4 backend this happens naturally inside the PendSV
/// handler, which also performs the register-level save/restore; the host
/// stub backend has no asynchronous PendSV to do that, so it calls this
/// directly from `port::os_ctx_sw`/`os_int_ctx_sw` to keep test scheduling
/// synchronous.
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub unsafe fn apply_context_switch(core: CoreId) {
    let state = unsafe { core_state(core) };
    if let Some(new_tcb) = state.tcb_high_rdy {
        state.tcb_cur = Some(new_tcb);
        state.prio_cur = state.prio_high_rdy;
        state.switching_context = false;
    }
}

/// Called at the tail of every interrupt handler (tick, or any ISR that may
/// have made a task ready) to run the scheduler once nesting unwinds to zero.
pub fn os_int_exit() {
    let new_nesting = KERNEL.int_exit();
    if new_nesting == 0 && KERNEL.sched_lock_nesting() == 0 {
        crate::sched::os_sched();
    }
}

/// Enter an ISR, for port layers to call on interrupt entry.
pub fn os_int_enter() {
    KERNEL.int_enter();
}

/// Lock the scheduler: ready-list membership changes are deferred on the
/// calling core until a matching `os_sched_unlock`.
pub fn os_sched_lock() {
    if !KERNEL.is_running() {
        return;
    }
    critical_section(|_cs| {
        KERNEL.sched_lock();
        unsafe { core_state(crate::port::core_id()) }.sched_suspended = true;
    });
}

/// Unlock the scheduler. Once nesting reaches zero, drains whatever readiness
/// and tick bookkeeping piled up while this core's scheduler was locked
/// (spec §5 "resume then drains both atomically") and runs a scheduling pass.
pub fn os_sched_unlock() {
    if !KERNEL.is_running() {
        return;
    }

    let should_sched = critical_section(|_cs| {
        let remaining = KERNEL.sched_unlock();
        if remaining == 0 {
            let core = crate::port::core_id();
            unsafe { core_state(core) }.sched_suspended = false;
            unsafe { crate::sched::drain_pending_ready(core) };
            unsafe { crate::sched::drain_pending_ticks(core) };
        }
        remaining == 0
    });

    if should_sched {
        crate::sched::os_sched();
    }
}

/// Suspend scheduling on the calling core (spec §6 public API surface
/// "suspend-this-core"). Alias of [`os_sched_lock`] under the surface's own
/// naming; ready-list membership changes on this core are deferred until a
/// matching [`os_sched_resume_this_core`].
pub fn os_sched_suspend_this_core() {
    os_sched_lock();
}

/// Resume scheduling on the calling core (spec §6 "resume-this-core").
/// Alias of [`os_sched_unlock`].
pub fn os_sched_resume_this_core() {
    os_sched_unlock();
}

/// Overall kernel lifecycle state (spec §6 public API surface "get-state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsSchedState {
    /// `os_init` has not yet run.
    Uninitialized,
    /// `os_init` has run but no core has called `os_start` yet.
    Initialized,
    /// At least one core is dispatching tasks.
    Running,
    /// `os_stop` has been called; no further scheduling occurs.
    Stopped,
}

/// Current kernel lifecycle state (spec §6 "get-state").
pub fn os_sched_get_state() -> OsSchedState {
    if KERNEL.running.load(Ordering::Acquire) {
        OsSchedState::Running
    } else if KERNEL.stopped.load(Ordering::Acquire) {
        OsSchedState::Stopped
    } else if KERNEL.initialized.load(Ordering::Acquire) {
        OsSchedState::Initialized
    } else {
        OsSchedState::Uninitialized
    }
}

/// Stop the scheduler (spec §6 "stop"; port collaborator `end_scheduler`,
/// spec §6's port table). Marks the kernel not-running so [`crate::sched::os_sched`]
/// and tick processing become no-ops; does not unwind any task already
/// executing on a core, matching `end_scheduler`'s contract of "unwinds
/// `start_scheduler`" being the port layer's responsibility once this flag
/// flips.
pub fn os_stop() -> OsResult<()> {
    use crate::error::OsError;
    if !KERNEL.is_running() {
        return Err(OsError::SchedulerStopped);
    }
    KERNEL.running.store(false, Ordering::Release);
    KERNEL.stopped.store(true, Ordering::Release);
    crate::port::end_scheduler();
    crate::info!("scheduler stopped");
    Ok(())
}
