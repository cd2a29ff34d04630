//! Task Control Block (TCB) definition
//!
//! The TCB carries everything the scheduler, the wait-list utility, and the
//! task manager need: the saved execution context, lifecycle state, and
//! exactly two link-field pairs enforcing spec §2's structural invariants —
//! a task is on at most one scheduler list (`next_ptr`/`prev_ptr`: a ready
//! list, the delayed list or its overflow twin, the suspended list, a
//! pending-ready list, or the deletion-pending list) and at most one
//! wait-list (`wait_next`/`wait_prev`: a queue's, semaphore's, or mutex's
//! waiters, or a task's own join waiters).

use core::ptr::NonNull;

use crate::config::CFG_N_TLS_SLOTS;
use crate::types::{
    CoreId, OsMsgSize, OsNestingCtr, OsOpt, OsPendOn, OsPendStatus, OsPrio, OsSemCtr,
    OsStkElement, OsTaskState, OsTick, Tid,
};
use crate::wait_list::WaitList;

/// One thread-local storage slot: an opaque value pointer plus an optional
/// destructor run when the owning task is reclaimed.
#[derive(Clone, Copy)]
pub struct TlsSlot {
    pub value: *mut (),
    pub destructor: Option<fn(*mut ())>,
}

impl TlsSlot {
    pub const fn empty() -> Self {
        TlsSlot { value: core::ptr::null_mut(), destructor: None }
    }
}

/// Task Control Block
#[repr(C)]
pub struct OsTcb {
    // ============ Stack pointer ============
    pub stk_ptr: *mut OsStkElement,

    // ============ Stack information ============
    pub stk_base: *mut OsStkElement,
    pub stk_limit: *mut OsStkElement,
    pub stk_size: usize,

    // ============ Task identification ============
    pub name: &'static str,
    pub tid: Tid,

    // ============ Core affinity ============
    /// Fixed core, or `NO_AFFINITY` if this task may run on any core.
    pub affinity: CoreId,

    // ============ Scheduler-list links ============
    /// Next TCB in whichever scheduler list this task currently belongs to.
    pub next_ptr: Option<NonNull<OsTcb>>,
    /// Previous TCB in whichever scheduler list this task currently belongs to.
    pub prev_ptr: Option<NonNull<OsTcb>>,

    // ============ Wait-list links ============
    /// Next TCB in whichever wait-list this task currently belongs to.
    pub wait_next: Option<NonNull<OsTcb>>,
    /// Previous TCB in whichever wait-list this task currently belongs to.
    pub wait_prev: Option<NonNull<OsTcb>>,
    /// Object this task is pending on (queue, semaphore, or mutex).
    pub pend_obj_ptr: *const (),
    /// What type of object the task is pending on.
    pub pend_on: OsPendOn,
    /// Result of the most recent pend operation.
    pub pend_status: OsPendStatus,

    // ============ Delayed-list accounting ============
    /// Absolute tick at which a delay or pend timeout expires. Only
    /// meaningful while on the delayed list or its overflow twin.
    pub wakeup_tick: OsTick,
    /// Which of the two delayed lists (spec §4.1's overflow cycle) this task
    /// is currently threaded onto, so deletion/removal can find it in O(1)
    /// without probing both. Meaningful only while `task_state == Delayed`.
    pub in_delay_overflow: bool,
    /// Which core's pending-ready list this task is parked on while that
    /// core's scheduler was suspended. Meaningful only while
    /// `task_state == PendingReady`.
    pub pending_ready_core: CoreId,

    // ============ Priority ============
    /// Effective priority (may be boosted by mutex priority inheritance).
    pub prio: OsPrio,
    /// Priority the task was created or last explicitly set to.
    pub base_prio: OsPrio,

    // ============ State ============
    pub task_state: OsTaskState,
    pub opt: OsOpt,

    // ============ Suspend ============
    pub suspend_ctr: OsNestingCtr,

    // ============ Time slicing ============
    pub time_quanta: OsTick,
    pub time_quanta_ctr: OsTick,

    // ============ Task semaphore ============
    pub sem_ctr: OsSemCtr,

    // ============ Message ============
    pub msg_ptr: *const (),
    pub msg_size: OsMsgSize,

    // ============ Per-task message queue ============
    /// Task manager "wire per-task message queue" (spec §4.2 create):
    /// capacity `0` means the task has none. Addressed by tid via
    /// `os_task_send_msg`/`os_task_receive_msg`, not this task's own handle,
    /// since the sender is always some other task.
    #[cfg(feature = "queue")]
    pub msg_queue: crate::ipc::queue::OsQueue,

    // ============ Mutex priority inheritance ============
    /// Count of mutexes currently owned by this task. Nonzero blocks
    /// deletion from reclaiming resources until every mutex is released.
    pub mutexes_held: u32,

    // ============ Join ============
    /// Tasks blocked in `join` on this task's termination.
    pub join_waiters: WaitList,
    /// Set once this task has run to completion; `join` returns immediately
    /// for a task already in this state.
    pub has_exited: bool,

    // ============ Thread-local storage ============
    pub tls: [TlsSlot; CFG_N_TLS_SLOTS],

    // ============ Task entry point ============
    pub task_entry_addr: u32,
    pub task_entry_arg: *mut (),

    // ============ Extension pointer ============
    pub ext_ptr: *mut (),

    // ============ Opaque collaborator blobs (spec §3 data model) ============
    /// MPU region settings, owned and interpreted entirely by the memory-
    /// protection collaborator (spec §1 "no memory-protection policy beyond
    /// storing opaque MPU settings per task"); the kernel never reads it.
    pub mpu_settings: *mut (),
    /// Reentrancy struct (e.g. libc `errno`/`strtok` state) owned by the
    /// C-runtime collaborator on the task's behalf; opaque to the kernel.
    pub reentrancy: *mut (),
}

impl OsTcb {
    /// Create a new, uninitialized TCB.
    pub const fn new() -> Self {
        OsTcb {
            stk_ptr: core::ptr::null_mut(),
            stk_base: core::ptr::null_mut(),
            stk_limit: core::ptr::null_mut(),
            stk_size: 0,

            name: "",
            tid: 0,
            affinity: crate::types::NO_AFFINITY,

            next_ptr: None,
            prev_ptr: None,

            wait_next: None,
            wait_prev: None,
            pend_obj_ptr: core::ptr::null(),
            pend_on: OsPendOn::Nothing,
            pend_status: OsPendStatus::Ok,

            wakeup_tick: 0,
            in_delay_overflow: false,
            pending_ready_core: 0,

            prio: 0,
            base_prio: 0,

            task_state: OsTaskState::Ready,
            opt: 0,

            suspend_ctr: 0,

            time_quanta: 0,
            time_quanta_ctr: 0,

            sem_ctr: 0,

            msg_ptr: core::ptr::null(),
            msg_size: 0,

            #[cfg(feature = "queue")]
            msg_queue: crate::ipc::queue::OsQueue::new(),

            mutexes_held: 0,

            join_waiters: WaitList::new(),
            has_exited: false,

            tls: [TlsSlot::empty(); CFG_N_TLS_SLOTS],

            task_entry_addr: 0,
            task_entry_arg: core::ptr::null_mut(),

            ext_ptr: core::ptr::null_mut(),

            mpu_settings: core::ptr::null_mut(),
            reentrancy: core::ptr::null_mut(),
        }
    }

    /// Reset to default values, preserving nothing. Used before a TCB slot
    /// is handed to a new task.
    pub fn init(&mut self) {
        *self = Self::new();
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.task_state == OsTaskState::Ready
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self.task_state, OsTaskState::Pend | OsTaskState::PendTimeout)
    }

    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.task_state == OsTaskState::Suspended
    }

    #[inline]
    pub fn is_delayed(&self) -> bool {
        self.task_state == OsTaskState::Delayed
    }
}

impl Default for OsTcb {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for OsTcb {}
unsafe impl Sync for OsTcb {}
