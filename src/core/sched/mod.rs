//! Scheduler module (spec §4.1)
//!
//! Owns the set of runnable tasks, decides which task runs on each core,
//! advances the tick counter, wakes delayed tasks, drives the task lifecycle
//! state machine, and mediates mutex priority inheritance. Everything here
//! runs with [`crate::critical::CriticalSection`] held — the ready-list
//! bitmap, the per-priority ready lists, the delayed list and its overflow
//! twin, the suspended list, each core's pending-ready list, and the
//! deletion-pending list are all guarded by that one spin-mutex (spec §5).

mod list;

pub use list::SchedList;

use core::ptr::NonNull;

use crate::config::{CFG_IDLE_PRIORITY, CFG_MAX_PRIORITIES, CFG_N_CORES, CFG_SCHED_ROUND_ROBIN_EN};
use crate::critical::critical_section;
use crate::kernel;
use crate::task::OsTcb;
use crate::types::{CoreId, OsPendStatus, OsPrio, OsTaskState, OsTick, NO_AFFINITY};
use crate::wait_list::WaitList;

// ============================================================
// Ready-list membership
// ============================================================

/// Insert `tcb` into the ready list at its current `prio` and mark the
/// bitmap bit. Does not itself trigger a reschedule — callers that make a
/// task ready call [`notify_ready`] afterwards.
///
/// # Safety
/// Caller must hold the kernel's critical section. `tcb` must not currently
/// be linked into any scheduler list.
pub(crate) unsafe fn ready_insert(tcb: NonNull<OsTcb>) {
    let prio = unsafe { tcb.as_ref() }.prio;
    unsafe {
        kernel::rdy_list(prio).insert_tail(tcb);
        kernel::prio_table().insert(prio);
    }
}

/// Remove `tcb` from its ready list at `prio`, clearing the bitmap bit if
/// that list is now empty.
///
/// # Safety
/// Caller must hold the kernel's critical section. `tcb` must currently be
/// linked into the ready list at `prio`.
pub(crate) unsafe fn ready_remove(tcb: NonNull<OsTcb>, prio: OsPrio) {
    unsafe {
        let rl = kernel::rdy_list(prio);
        rl.remove(tcb);
        if rl.is_empty() {
            kernel::prio_table().remove(prio);
        }
    }
}

/// Move `task` from its `base_prio`-determined slot to `new_prio`. Used by
/// [`change_priority`] and by mutex priority inheritance
/// ([`inherit_priority`]/[`revert_priority`]). Only valid while `task` is
/// `Ready` or `Running` (physically threaded onto a ready list); blocked
/// tasks (Pend/PendTimeout/Delayed/Suspended) just have their `prio` field
/// updated in place by the caller, per spec §4.1's accepted imprecision for
/// inheritance targets parked on a wait-list.
///
/// # Safety
/// Caller must hold the kernel's critical section.
unsafe fn reposition(tcb: NonNull<OsTcb>, new_prio: OsPrio) {
    let t = unsafe { &mut *tcb.as_ptr() };
    let old_prio = t.prio;
    if old_prio == new_prio {
        return;
    }
    unsafe {
        ready_remove(tcb, old_prio);
        t.prio = new_prio;
        ready_insert(tcb);
    }
}

// ============================================================
// Notifying readiness / preemption
// ============================================================

/// Called whenever a task transitions into `Ready` (creation, delay/timeout
/// wakeup, semaphore/queue/mutex post, resume): if the task's priority would
/// preempt whichever core it could run on, request a reschedule there —
/// locally via [`os_sched`], or on another core via a yield IPI (spec §4.1
/// "multi-core dispatch").
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn notify_ready(prio: OsPrio, affinity: CoreId) {
    let here = crate::port::core_id();

    let targets: &[CoreId] = if affinity == NO_AFFINITY {
        // Any core whose current task has a lower priority is a candidate;
        // conservatively poke every core and let each core's own reschedule
        // decide whether it actually needs to switch.
        return notify_all_cores(prio);
    } else {
        core::slice::from_ref(&affinity)
    };

    for &core in targets {
        let running_prio = unsafe { kernel::core_state(core) }.prio_cur;
        if prio <= running_prio && kernel::KERNEL.is_running() {
            continue;
        }
        if core == here {
            unsafe { reschedule(core) };
        } else {
            crate::port::yield_other_core(core);
        }
    }
}

/// # Safety
/// Caller must hold the kernel's critical section.
unsafe fn notify_all_cores(prio: OsPrio) {
    let here = crate::port::core_id();
    for core in 0..CFG_N_CORES as CoreId {
        let running_prio = unsafe { kernel::core_state(core) }.prio_cur;
        if kernel::KERNEL.is_running() && prio <= running_prio {
            continue;
        }
        if core == here {
            unsafe { reschedule(core) };
        } else {
            crate::port::yield_other_core(core);
        }
    }
}

// ============================================================
// Context-switch selection (spec §4.1)
// ============================================================

/// Steps 2-5 of the context-switch algorithm: walk ready lists from the
/// highest occupied priority down, picking the first task whose state isn't
/// `Running` and whose affinity matches `core`. Falls back to `core`'s idle
/// task.
///
/// # Safety
/// Caller must hold the kernel's critical section.
unsafe fn select_candidate(core: CoreId) -> (OsPrio, NonNull<OsTcb>) {
    let mut prio = unsafe { kernel::prio_table() }.get_highest();
    loop {
        let rl = unsafe { kernel::rdy_list(prio) };
        let mut cursor = rl.head();
        while let Some(candidate) = cursor {
            let c = unsafe { candidate.as_ref() };
            if c.task_state != OsTaskState::Running
                && (c.affinity == NO_AFFINITY || c.affinity == core)
            {
                return (prio, candidate);
            }
            cursor = c.next_ptr;
        }
        if prio == 0 {
            break;
        }
        prio -= 1;
    }
    (CFG_IDLE_PRIORITY, unsafe { kernel::idle_tcb(core) })
}

/// Perform one context-switch pass for `core`: demote/rotate the outgoing
/// task (step 1), pick the new highest-priority eligible task (steps 2-5),
/// and either stage it for a real switch or, if nothing changed, just clear
/// the reentry guard.
///
/// # Safety
/// Caller must hold the kernel's critical section.
unsafe fn reschedule(core: CoreId) {
    let state = unsafe { kernel::core_state(core) };
    if state.switching_context {
        return;
    }
    state.switching_context = true;

    if let Some(out) = state.tcb_cur {
        let out_ref = unsafe { &mut *out.as_ptr() };
        if out_ref.task_state == OsTaskState::Running {
            out_ref.task_state = OsTaskState::Ready;
        }
        if out_ref.task_state == OsTaskState::Ready && out_ref.prio > 0 {
            let prio = out_ref.prio;
            let rl = unsafe { kernel::rdy_list(prio) };
            if rl.head() != rl.tail() {
                rl.remove(out);
                rl.insert_tail(out);
            }
        }
    }

    let (prio, chosen) = unsafe { select_candidate(core) };
    let state = unsafe { kernel::core_state(core) };
    state.prio_high_rdy = prio;
    state.tcb_high_rdy = Some(chosen);

    if state.tcb_cur == Some(chosen) {
        state.switching_context = false;
        return;
    }

    unsafe { &mut *chosen.as_ptr() }.task_state = OsTaskState::Running;

    if core == crate::port::core_id() {
        crate::port::os_ctx_sw();
    } else {
        crate::port::yield_other_core(core);
    }
}

/// Main scheduling point for the calling core. Call after any operation that
/// may change task readiness: releasing a semaphore/mutex, resuming a task,
/// a delay/timeout expiring, task creation/deletion.
pub fn os_sched() {
    if !kernel::KERNEL.is_running() {
        return;
    }
    if crate::critical::is_isr_context() {
        return;
    }

    let core = crate::port::core_id();

    if kernel::KERNEL.sched_lock_nesting() > 0 {
        unsafe { kernel::core_state(core) }.yield_pending = true;
        return;
    }

    critical_section(|_cs| unsafe { reschedule(core) });
}

/// Initial per-core dispatch used once by [`kernel::os_start`]. Each core in
/// turn runs the same selection algorithm as [`os_sched`] (without an
/// outgoing task to demote), so that distinct eligible tasks land on
/// distinct cores exactly as scenario 1 of spec §8 requires.
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn initial_dispatch(core: CoreId) {
    let (prio, chosen) = unsafe { select_candidate(core) };
    unsafe { &mut *chosen.as_ptr() }.task_state = OsTaskState::Running;
    let state = unsafe { kernel::core_state(core) };
    state.prio_cur = prio;
    state.prio_high_rdy = prio;
    state.tcb_high_rdy = Some(chosen);
    state.tcb_cur = None;
}

// ============================================================
// Lifecycle operations (spec §4.1 public operations)
// ============================================================

/// Add a newly created task to the ready set (part of task creation).
///
/// # Safety
/// Caller must hold the kernel's critical section. `tcb` must be freshly
/// initialized and not linked into any list.
pub(crate) unsafe fn add(tcb: NonNull<OsTcb>) {
    unsafe {
        ready_insert(tcb);
        let prio = tcb.as_ref().prio;
        let affinity = tcb.as_ref().affinity;
        notify_ready(prio, affinity);
    }
}

/// Detach `tcb` from whichever scheduler list it currently occupies, without
/// changing its `task_state`. Used by task deletion and by blocking APIs
/// before moving a task onto a wait-list.
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn detach(tcb: NonNull<OsTcb>) {
    let t = unsafe { &mut *tcb.as_ptr() };
    match t.task_state {
        OsTaskState::Ready | OsTaskState::Running => unsafe { ready_remove(tcb, t.prio) },
        OsTaskState::Delayed => unsafe {
            if t.in_delay_overflow {
                kernel::sched_state().delayed_list_overflow.remove(tcb);
            } else {
                kernel::sched_state().delayed_list.remove(tcb);
            }
        },
        OsTaskState::Suspended => unsafe { kernel::sched_state().suspended_list.remove(tcb) },
        OsTaskState::PendingReady => unsafe {
            kernel::sched_state().pending_ready[t.pending_ready_core as usize].remove(tcb)
        },
        OsTaskState::Pend | OsTaskState::PendTimeout => {
            // Blocked on an IPC object's wait-list; caller (the IPC object)
            // is responsible for removing it from that list, since the
            // scheduler has no handle to arbitrary wait-lists.
        }
        OsTaskState::PendingDeletion | OsTaskState::ReadyToDelete => unsafe {
            kernel::sched_state().deletion_pending.remove(tcb)
        },
    }
}

/// Remove a task from scheduling permanently (spec §4.1 `remove`). Returns
/// `true` if the task is immediately safe to reclaim in place
/// (`ReadyToDelete`), `false` if it is still running somewhere and must wait
/// for that core's idle task (`PendingDeletion`).
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn remove(tcb: NonNull<OsTcb>) -> bool {
    unsafe { detach(tcb) };

    let running_elsewhere =
        (0..CFG_N_CORES as CoreId).any(|c| unsafe { kernel::cur_tcb(c) } == Some(tcb));

    let t = unsafe { &mut *tcb.as_ptr() };
    if running_elsewhere {
        t.task_state = OsTaskState::PendingDeletion;
        unsafe { kernel::sched_state().deletion_pending.insert_tail(tcb) };
        false
    } else {
        t.task_state = OsTaskState::ReadyToDelete;
        true
    }
}

/// Move the calling task to the delayed list for `ticks` ticks (spec §4.1
/// `delay`). Ticks of `0` still forces a yield (round-robin at the current
/// priority) without leaving the ready list.
pub(crate) unsafe fn delay_current(ticks: OsTick) {
    let core = crate::port::core_id();
    critical_section(|_cs| unsafe {
        let Some(tcb) = kernel::cur_tcb(core) else { return };
        if ticks == 0 {
            reschedule(core);
            return;
        }

        let t = &mut *tcb.as_ptr();
        ready_remove(tcb, t.prio);

        let now = kernel::KERNEL.tick_get();
        let wakeup = now.wrapping_add(ticks);
        t.wakeup_tick = wakeup;
        t.task_state = OsTaskState::Delayed;

        if wakeup < now {
            t.in_delay_overflow = true;
            kernel::sched_state().delayed_list_overflow.insert_by_wakeup_tick(tcb);
        } else {
            t.in_delay_overflow = false;
            kernel::sched_state().delayed_list.insert_by_wakeup_tick(tcb);
        }

        reschedule(core);
    });
}

/// Suspend `tcb` indefinitely (spec §4.1 `suspend`).
pub fn suspend(tcb: NonNull<OsTcb>) -> crate::error::OsResult<()> {
    use crate::error::OsError;

    critical_section(|_cs| unsafe {
        let t = &mut *tcb.as_ptr();
        if t.prio == CFG_IDLE_PRIORITY {
            return Err(OsError::IdleDelete);
        }
        match t.task_state {
            OsTaskState::Ready | OsTaskState::Running => {
                let was_current =
                    (0..CFG_N_CORES as CoreId).any(|c| kernel::cur_tcb(c) == Some(tcb));
                ready_remove(tcb, t.prio);
                t.task_state = OsTaskState::Suspended;
                kernel::sched_state().suspended_list.insert_tail(tcb);
                if was_current {
                    reschedule(crate::port::core_id());
                }
                Ok(())
            }
            OsTaskState::Delayed | OsTaskState::Suspended => {
                t.task_state = OsTaskState::Suspended;
                Ok(())
            }
            _ => Err(OsError::InvalidTaskState),
        }
    })
}

/// Resume a task suspended by [`suspend`] (spec §4.1 `resume`).
pub fn resume(tcb: NonNull<OsTcb>) -> crate::error::OsResult<()> {
    use crate::error::OsError;

    critical_section(|_cs| unsafe {
        let t = &mut *tcb.as_ptr();
        if t.task_state != OsTaskState::Suspended {
            return Err(OsError::InvalidTaskState);
        }
        kernel::sched_state().suspended_list.remove(tcb);
        t.task_state = OsTaskState::Ready;
        make_ready(tcb);
        Ok(())
    })
}

/// Thread `tcb` back onto the ready set, honoring the pending-ready
/// indirection when the local core's scheduler is currently suspended (spec
/// §4.1 `PendingReady`). Callers must have already set `task_state` to
/// `Ready` (or will be corrected to `PendingReady` here).
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn make_ready(tcb: NonNull<OsTcb>) {
    let here = crate::port::core_id();
    if unsafe { kernel::core_state(here) }.sched_suspended {
        let t = unsafe { &mut *tcb.as_ptr() };
        t.task_state = OsTaskState::PendingReady;
        t.pending_ready_core = here;
        unsafe { kernel::sched_state().pending_ready[here as usize].insert_tail(tcb) };
        return;
    }
    unsafe { add(tcb) };
}

/// Update a task's priority (spec §4.1 `change_priority`). `base_prio` is
/// always updated; the effective `prio` only follows if no inheritance is
/// currently active (i.e. `prio == base_prio` before this call).
pub fn change_priority(tcb: NonNull<OsTcb>, new_prio: OsPrio) -> crate::error::OsResult<()> {
    use crate::error::OsError;

    if new_prio as usize >= CFG_MAX_PRIORITIES {
        return Err(OsError::InvalidPriority);
    }

    critical_section(|_cs| unsafe {
        let t = &mut *tcb.as_ptr();
        if t.prio == CFG_IDLE_PRIORITY {
            return Err(OsError::IdleDelete);
        }
        let inheritance_active = t.prio != t.base_prio;
        t.base_prio = new_prio;

        if !inheritance_active {
            match t.task_state {
                OsTaskState::Ready | OsTaskState::Running => reposition(tcb, new_prio),
                _ => t.prio = new_prio,
            }
            let affinity = t.affinity;
            notify_ready(new_prio, affinity);
        }
        Ok(())
    })
}

/// Bump `holder`'s effective priority to `taker_prio` if higher (spec §4.1
/// priority inheritance, mutex take path). Base priority is untouched.
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn inherit_priority(holder: NonNull<OsTcb>, taker_prio: OsPrio) {
    let h = unsafe { &mut *holder.as_ptr() };
    if taker_prio <= h.prio {
        return;
    }
    match h.task_state {
        OsTaskState::Ready | OsTaskState::Running => unsafe { reposition(holder, taker_prio) },
        _ => h.prio = taker_prio,
    }
}

/// Revert `holder` to its base priority once it holds no more mutexes (spec
/// §4.1 priority inheritance, mutex release path).
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn revert_priority(holder: NonNull<OsTcb>) {
    let h = unsafe { &mut *holder.as_ptr() };
    if h.mutexes_held != 0 || h.prio == h.base_prio {
        return;
    }
    let base = h.base_prio;
    match h.task_state {
        OsTaskState::Ready | OsTaskState::Running => unsafe { reposition(holder, base) },
        _ => h.prio = base,
    }
}

// ============================================================
// Round-robin time-slicing
// ============================================================

/// Decrement the current task's time-slice counter; rotate it to the tail
/// of its ready list and request a reschedule once it hits zero, provided
/// another task shares its priority (spec §4.1 context-switch step 1 /
/// §5 "round robin across equal-priority ready tasks").
pub(crate) fn tick_round_robin(core: CoreId) {
    if !CFG_SCHED_ROUND_ROBIN_EN {
        return;
    }
    critical_section(|_cs| unsafe {
        let Some(cur) = kernel::cur_tcb(core) else { return };
        let t = &mut *cur.as_ptr();
        if t.time_quanta == 0 {
            return;
        }
        if t.time_quanta_ctr > 0 {
            t.time_quanta_ctr -= 1;
        }
        if t.time_quanta_ctr == 0 {
            t.time_quanta_ctr = t.time_quanta;
            let rl = kernel::rdy_list(t.prio);
            if rl.head() != rl.tail() {
                reschedule(core);
            }
        }
    });
}

// ============================================================
// Scheduler-suspend/resume drain (spec §5 "per-core suspension defers
// yields ... and defers tick processing ...; resume then drains both
// atomically")
// ============================================================

/// Thread every entry on `core`'s pending-ready list back onto the real
/// ready set. Called once [`kernel::os_sched_unlock`] nesting reaches zero.
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn drain_pending_ready(core: CoreId) {
    let list = unsafe { &mut kernel::sched_state().pending_ready[core as usize] };
    list.drain(|tcb| unsafe {
        (*tcb.as_ptr()).task_state = OsTaskState::Ready;
        add(tcb);
    });
}

/// Replay every tick that was folded into `core_state(0).pending_ticks`
/// while core 0's scheduler was locked, one [`drain_due_tick`] call per
/// tick so delayed-list wakeups happen in the same order they would have
/// live. A no-op on any core but 0, since only core 0 owns `tick_counter`.
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn drain_pending_ticks(core: CoreId) -> bool {
    if core != 0 {
        return false;
    }
    let state = unsafe { kernel::core_state(0) };
    let pending = state.pending_ticks;
    state.pending_ticks = 0;

    let mut need_switch = false;
    for _ in 0..pending {
        need_switch |= unsafe { drain_due_tick() };
    }
    need_switch
}

// ============================================================
// Tick processing (spec §4.1 "Tick processing")
// ============================================================

/// Drive one system tick. Only core 0 advances the shared counter; every
/// core still drains its own round-robin bookkeeping and (for core 0) wakes
/// due delayed tasks. Returns `true` if the caller (an ISR) should request a
/// context switch on return.
pub fn process_tick() -> bool {
    if !kernel::KERNEL.is_running() {
        return false;
    }

    let core = crate::port::core_id();
    kernel::KERNEL.int_enter();

    let mut need_switch = false;

    if core == 0 {
        if unsafe { kernel::core_state(0) }.sched_suspended {
            unsafe { kernel::core_state(0) }.pending_ticks += 1;
        } else {
            need_switch |= critical_section(|_cs| unsafe { drain_due_tick() });
        }
    }

    tick_round_robin(core);
    kernel::os_int_exit();
    need_switch
}

/// Advance `tick_counter` and wake every delayed task whose `wakeup_tick`
/// has arrived. Invoked with the critical section already held.
///
/// # Safety
/// Caller must hold the kernel's critical section.
unsafe fn drain_due_tick() -> bool {
    let now = unsafe { kernel::tick_advance() };
    let mut need_switch = false;

    unsafe {
        kernel::sched_state().delayed_list.drain_due(now, |tcb| {
            wake_delayed(tcb, now, &mut need_switch);
        });
    }
    need_switch
}

/// # Safety
/// Caller must hold the kernel's critical section.
unsafe fn wake_delayed(tcb: NonNull<OsTcb>, now: OsTick, need_switch: &mut bool) {
    let t = unsafe { &mut *tcb.as_ptr() };
    t.in_delay_overflow = false;
    let was_timeout_pend = t.task_state == OsTaskState::PendTimeout;
    if was_timeout_pend {
        t.pend_status = OsPendStatus::Timeout;
    }
    t.task_state = OsTaskState::Ready;
    t.wakeup_tick = now;
    unsafe { make_ready(tcb) };

    let prio = t.prio;
    let affinity = t.affinity;
    let here = crate::port::core_id();
    let running_prio = unsafe { kernel::core_state(here) }.prio_cur;
    if prio >= running_prio {
        *need_switch = true;
    }
    unsafe { notify_ready(prio, affinity) };
}

/// `next_unblock_tick` (spec invariant §3.7): the head of the delayed list,
/// or `OsTick::MAX` if both delayed lists are empty.
pub fn next_unblock_tick() -> OsTick {
    critical_section(|_cs| unsafe {
        let s = kernel::sched_state();
        if let Some(head) = s.delayed_list.head() {
            head.as_ref().wakeup_tick
        } else if let Some(head) = s.delayed_list_overflow.head() {
            head.as_ref().wakeup_tick
        } else {
            OsTick::MAX
        }
    })
}

// ============================================================
// Blocking on a wait-list (shared by queue/semaphore/mutex)
// ============================================================

/// Remove the calling task from the ready set, thread it onto `wait_list` in
/// priority order, arm a timeout unless `timeout == OsTick::MAX` (spec §5
/// "`MAX` means no timeout — suspend semantics"), and yield. Returns the
/// pend outcome recorded by whoever woke the task
/// ([`wake_one`]/[`wake_all`]/tick timeout).
///
/// Callers are responsible for the `timeout == 0` case themselves (spec §5
/// "`0` means immediate"): that never reaches here, since it means "fail
/// now instead of blocking" rather than "block with a zero-tick timeout".
///
/// # Safety
/// Caller must hold the kernel's critical section; `wait_list` must outlive
/// the block (it belongs to the IPC object the caller is blocking on).
pub(crate) unsafe fn block_current_on(
    wait_list: &mut WaitList,
    pend_obj_ptr: *const (),
    pend_on: crate::types::OsPendOn,
    timeout: OsTick,
) -> OsPendStatus {
    let core = crate::port::core_id();
    let tcb = unsafe { kernel::cur_tcb(core) }.expect("block_current_on: no current task");

    unsafe {
        let t = &mut *tcb.as_ptr();
        ready_remove(tcb, t.prio);
        t.pend_on = pend_on;
        t.pend_status = OsPendStatus::Ok;
        t.pend_obj_ptr = pend_obj_ptr;

        if timeout == OsTick::MAX {
            t.task_state = OsTaskState::Pend;
        } else {
            t.task_state = OsTaskState::PendTimeout;
            let now = kernel::KERNEL.tick_get();
            let wakeup = now.wrapping_add(timeout);
            t.wakeup_tick = wakeup;
            if wakeup < now {
                t.in_delay_overflow = true;
                kernel::sched_state().delayed_list_overflow.insert_by_wakeup_tick(tcb);
            } else {
                t.in_delay_overflow = false;
                kernel::sched_state().delayed_list.insert_by_wakeup_tick(tcb);
            }
        }

        wait_list.insert_by_prio(tcb);
        reschedule(core);
    }

    unsafe { (*tcb.as_ptr()).pend_status }
}

/// Wake the highest-priority waiter on `wait_list` (spec §4.3/§4.4/§4.6
/// "pop the highest-priority waiter"). No-op if the list is empty.
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn wake_one(wait_list: &mut WaitList, status: OsPendStatus) -> bool {
    let Some(tcb) = wait_list.pop_head() else { return false };
    unsafe { wake(tcb, status) };
    true
}

/// Wake every waiter on `wait_list` with `status` (object deletion, spec §7
/// `ResourceDestroyed`; or join-wakeup on task termination).
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) unsafe fn wake_all(wait_list: &mut WaitList, status: OsPendStatus) {
    wait_list.drain(|tcb| unsafe { wake(tcb, status) });
}

/// # Safety
/// Caller must hold the kernel's critical section.
unsafe fn wake(tcb: NonNull<OsTcb>, status: OsPendStatus) {
    let t = unsafe { &mut *tcb.as_ptr() };
    let was_timeout_pend = t.task_state == OsTaskState::PendTimeout;
    if was_timeout_pend {
        unsafe {
            if t.in_delay_overflow {
                kernel::sched_state().delayed_list_overflow.remove(tcb);
            } else {
                kernel::sched_state().delayed_list.remove(tcb);
            }
        }
    }
    t.pend_on = crate::types::OsPendOn::Nothing;
    t.pend_obj_ptr = core::ptr::null();
    t.pend_status = status;
    t.task_state = OsTaskState::Ready;
    unsafe { make_ready(tcb) };

    let prio = t.prio;
    let affinity = t.affinity;
    unsafe { notify_ready(prio, affinity) };
}

/// Given a task's captured `(overflow_count, entry_tick)` style timeout
/// state — here simply the absolute `wakeup_tick` recorded when it started
/// waiting — compute ticks remaining, robust to a single counter
/// wraparound between `entry_tick` and now (spec §5 "check_timeout").
/// Monotone: never increases across repeated calls with an advancing clock.
pub fn check_timeout(wakeup_tick: OsTick) -> (OsTick, bool) {
    let now = kernel::KERNEL.tick_get();
    if now >= wakeup_tick {
        // Wrapped at most once since `wakeup_tick` was computed; either we
        // are genuinely past it, or the counter wrapped and `wakeup_tick`
        // is still ahead once you account for that.
        let elapsed = now.wrapping_sub(wakeup_tick);
        if elapsed <= OsTick::MAX / 2 {
            return (0, true);
        }
    }
    (wakeup_tick.wrapping_sub(now), false)
}
