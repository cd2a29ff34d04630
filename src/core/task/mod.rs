//! Task manager (spec §4.2)
//!
//! Creates and destroys tasks, assigns a dense tid, wires TLS and join, and
//! drives the two-phase deletion the scheduler's state machine requires:
//! [`os_task_del`] either reclaims a task inline (`ReadyToDelete`) or leaves
//! it for [`idle_reclaim_pass`] to pick up once it stops running anywhere
//! (`PendingDeletion`).
//!
//! TCBs and stacks are caller-provided `'static` buffers — this crate never
//! allocates them — but the tid table itself lives in `alloc::vec::Vec`,
//! growing geometrically off `CFG_TID_TABLE_INITIAL_SIZE` the same way the
//! message pool (`ipc::pool`) grows its slabs.

mod tcb;

pub use tcb::{OsTcb, TlsSlot};

use core::ptr::NonNull;

use alloc::vec::Vec;

use crate::config::{CFG_MAX_PRIORITIES, CFG_N_TLS_SLOTS, CFG_STK_SIZE_MIN, CFG_TID_TABLE_INITIAL_SIZE, CFG_TIME_QUANTA_DEFAULT};
use crate::critical::{critical_section, is_isr_context, CriticalSection};
use crate::cs_cell::CsCell;
use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::sched;
use crate::types::{CoreId, OsObjQty, OsPrio, OsStkElement, OsTaskState, OsTick, Tid, NO_AFFINITY};
#[cfg(feature = "queue")]
use crate::types::OsMsgSize;

/// Task entry point function type.
pub type OsTaskFn = fn(*mut ()) -> !;

static TID_TABLE: CsCell<Vec<Option<NonNull<OsTcb>>>> = CsCell::new(Vec::new());

fn alloc_tid(tcb: NonNull<OsTcb>, cs: &CriticalSection) -> OsResult<Tid> {
    let table = TID_TABLE.get(cs);
    if table.capacity() == 0 {
        table.reserve(CFG_TID_TABLE_INITIAL_SIZE);
    }
    for (i, slot) in table.iter_mut().enumerate() {
        if slot.is_none() {
            *slot = Some(tcb);
            return Ok(i as Tid);
        }
    }
    table.push(Some(tcb));
    Ok((table.len() - 1) as Tid)
}

fn free_tid(tid: Tid, cs: &CriticalSection) {
    let table = TID_TABLE.get(cs);
    if let Some(slot) = table.get_mut(tid as usize) {
        *slot = None;
    }
}

/// Look up the TCB registered for `tid`, or `None` if it has never been
/// assigned or has already been freed.
pub fn tcb_of(tid: Tid) -> Option<NonNull<OsTcb>> {
    critical_section(|cs| TID_TABLE.get(cs).get(tid as usize).copied().flatten())
}

/// Human-readable name of `tid` (spec §4.2 "get-name", routed through the
/// tid table per SPEC_FULL §1-9 Open Question 3's resolution).
pub fn name_of(tid: Tid) -> OsResult<&'static str> {
    tcb_of(tid).map(|t| unsafe { t.as_ref() }.name).ok_or(OsError::InvalidTid)
}

/// `tid`'s name (spec §6 public API surface "get-name"). Alias of
/// [`name_of`] under the surface's own naming.
pub fn os_task_get_name(tid: Tid) -> OsResult<&'static str> {
    name_of(tid)
}

/// `tid`'s core affinity (spec §6 "get-core"): a specific core index, or
/// [`crate::types::NO_AFFINITY`] if the task may run on any core.
pub fn os_task_get_core(tid: Tid) -> OsResult<CoreId> {
    tcb_of(tid).map(|t| unsafe { t.as_ref() }.affinity).ok_or(OsError::InvalidTid)
}

/// `tid`'s effective priority (spec §6 "get-priority"). This is the
/// inheritance-boosted `prio`, not `base_prio`; read `base_prio` via
/// [`os_task_get_base_priority`] if the un-boosted floor is wanted.
pub fn os_task_get_priority(tid: Tid) -> OsResult<OsPrio> {
    tcb_of(tid).map(|t| unsafe { t.as_ref() }.prio).ok_or(OsError::InvalidTid)
}

/// `tid`'s base priority (the floor priority inheritance reverts to).
pub fn os_task_get_base_priority(tid: Tid) -> OsResult<OsPrio> {
    tcb_of(tid).map(|t| unsafe { t.as_ref() }.base_prio).ok_or(OsError::InvalidTid)
}

/// `tid`'s current lifecycle state (running/ready/delayed/...).
pub fn os_task_get_state(tid: Tid) -> OsResult<OsTaskState> {
    tcb_of(tid).map(|t| unsafe { t.as_ref() }.task_state).ok_or(OsError::InvalidTid)
}

fn init_stack_and_tcb(
    tcb: *mut OsTcb,
    name: &'static str,
    task_fn: OsTaskFn,
    arg: *mut (),
    prio: OsPrio,
    affinity: CoreId,
    stk_base: *mut OsStkElement,
    stk_size: usize,
) -> NonNull<OsTcb> {
    let tcb_ref = unsafe { &mut *tcb };
    tcb_ref.init();

    tcb_ref.name = name;
    tcb_ref.prio = prio;
    tcb_ref.base_prio = prio;
    tcb_ref.affinity = affinity;
    tcb_ref.time_quanta = CFG_TIME_QUANTA_DEFAULT;
    tcb_ref.time_quanta_ctr = CFG_TIME_QUANTA_DEFAULT;
    tcb_ref.task_state = OsTaskState::Ready;

    let stk_ptr = unsafe { crate::port::os_task_stk_init(task_fn, arg, stk_base, stk_size, 0) };
    tcb_ref.stk_ptr = stk_ptr;
    tcb_ref.stk_base = stk_base;
    tcb_ref.stk_size = stk_size;
    tcb_ref.stk_limit = unsafe { stk_base.add(stk_size / 10) };

    tcb_ref.task_entry_addr = task_fn as u32;
    tcb_ref.task_entry_arg = arg;

    unsafe { NonNull::new_unchecked(tcb) }
}

/// Create a task pinned to `affinity` (or runnable anywhere if `NO_AFFINITY`)
/// at priority `prio` in `(0, CFG_MAX_PRIORITIES)`. `queue_capacity > 0` wires
/// up a per-task message queue of that capacity (spec §4.2 create); `0`
/// leaves the task without one, and [`os_task_send_msg`]/[`os_task_receive_msg`]
/// on its tid then fail with [`OsError::NoTaskQueue`].
///
/// `tcb`/`stack` are caller-owned `'static` buffers — this crate has no
/// allocator for them, matching the teacher's static-TCB convention; only
/// the tid table entry is heap-allocated.
pub fn os_task_create(
    tcb: &'static mut OsTcb,
    stack: &'static mut [OsStkElement],
    name: &'static str,
    task_fn: OsTaskFn,
    arg: *mut (),
    prio: OsPrio,
    affinity: CoreId,
    queue_capacity: OsObjQty,
) -> OsResult<Tid> {
    if is_isr_context() {
        return Err(OsError::TaskCreateIsr);
    }
    if prio == crate::config::CFG_IDLE_PRIORITY {
        return Err(OsError::ReservedPriority);
    }
    os_task_create_raw(tcb, stack, name, task_fn, arg, prio, affinity, queue_capacity)
}

/// Internal: create the per-core idle task at the reserved priority 0. Used
/// only by [`kernel::os_init`].
pub(crate) fn os_task_create_idle(
    tcb: *mut OsTcb,
    stack: &'static mut [OsStkElement],
    name: &'static str,
    task_fn: OsTaskFn,
    affinity: CoreId,
) -> OsResult<()> {
    let stk_base = stack.as_mut_ptr();
    let stk_size = stack.len();
    if stk_size < CFG_STK_SIZE_MIN {
        return Err(OsError::InvalidStackSize);
    }

    critical_section(|_cs| {
        let tcb_nn = init_stack_and_tcb(tcb, name, task_fn, core::ptr::null_mut(), 0, affinity, stk_base, stk_size);
        let tid = alloc_tid(tcb_nn, _cs)?;
        unsafe { &mut *tcb }.tid = tid;
        unsafe {
            kernel::inc_num_tasks();
            sched::add(tcb_nn);
        }
        Ok(())
    })
}

fn os_task_create_raw(
    tcb: &'static mut OsTcb,
    stack: &'static mut [OsStkElement],
    name: &'static str,
    task_fn: OsTaskFn,
    arg: *mut (),
    prio: OsPrio,
    affinity: CoreId,
    queue_capacity: OsObjQty,
) -> OsResult<Tid> {
    #[cfg(not(feature = "queue"))]
    let _ = queue_capacity;

    if prio as usize >= CFG_MAX_PRIORITIES {
        return Err(OsError::InvalidPriority);
    }
    if stack.len() < CFG_STK_SIZE_MIN {
        return Err(OsError::InvalidStackSize);
    }
    if affinity != NO_AFFINITY && affinity as usize >= crate::config::CFG_N_CORES {
        return Err(OsError::InvalidCore);
    }

    let stk_base = stack.as_mut_ptr();
    let stk_size = stack.len();
    let tcb_ptr = tcb as *mut OsTcb;

    critical_section(|cs| {
        let tcb_nn = init_stack_and_tcb(tcb_ptr, name, task_fn, arg, prio, affinity, stk_base, stk_size);
        let tid = alloc_tid(tcb_nn, cs)?;
        unsafe { &mut *tcb_ptr }.tid = tid;

        #[cfg(feature = "queue")]
        if queue_capacity > 0 {
            unsafe { &mut *tcb_ptr }.msg_queue.create_unlocked(queue_capacity)?;
        }

        unsafe {
            kernel::inc_num_tasks();
            sched::add(tcb_nn);
        }
        crate::info!("task {} created: tid={} prio={}", name, tid, prio);
        Ok(tid)
    })
}

/// Run `tcb`'s TLS destructors, wake its joiners, and free its tid and
/// scheduler-list membership. Only valid once the scheduler has already
/// moved `tcb` to `ReadyToDelete` (either directly from [`os_task_del`] or
/// from [`idle_reclaim_pass`]).
///
/// # Safety
/// Caller must hold the kernel's critical section. `tcb` must be
/// `ReadyToDelete` and linked into `sched_state().deletion_pending` or
/// nothing at all (the inline-reclaim path never links it).
unsafe fn reclaim(tcb: NonNull<OsTcb>, cs: &CriticalSection) {
    let t = unsafe { &mut *tcb.as_ptr() };
    debug_assert_eq!(t.task_state, OsTaskState::ReadyToDelete);

    for slot in t.tls.iter_mut() {
        if let Some(dtor) = slot.destructor.take() {
            dtor(slot.value);
        }
        slot.value = core::ptr::null_mut();
    }

    t.has_exited = true;
    unsafe { sched::wake_all(&mut t.join_waiters, crate::types::OsPendStatus::Ok) };

    free_tid(t.tid, cs);
    unsafe { kernel::dec_num_tasks() };
    crate::debug!("task {} reclaimed: tid={}", t.name, t.tid);
}

/// Delete a task (spec §4.2 `Delete(tid)`). If the task is currently running
/// on some core it is marked `PendingDeletion` and picked up later by that
/// core's idle task via [`idle_reclaim_pass`]; otherwise it is reclaimed
/// immediately.
pub fn os_task_del(tid: Tid) -> OsResult<()> {
    if is_isr_context() {
        return Err(OsError::TaskDeleteIsr);
    }

    // `os_sched()` acquires the kernel's critical section itself, and that
    // section is not reentrant (host backend: a plain `AtomicBool` spin-loop;
    // `SCHED_LOCK` is a non-reentrant `spin::SpinMutex`) — it must only ever
    // be called after this one has dropped, exactly as `os_sched_unlock` does
    // at kernel.rs:387-400.
    let should_sched = critical_section(|cs| {
        let tcb = tcb_of(tid).ok_or(OsError::InvalidTid)?;
        let t = unsafe { tcb.as_ref() };
        if t.prio == crate::config::CFG_IDLE_PRIORITY {
            return Err(OsError::IdleDelete);
        }
        if matches!(t.task_state, OsTaskState::PendingDeletion | OsTaskState::ReadyToDelete) {
            return Err(OsError::DoubleDelete);
        }

        let was_current = (0..crate::config::CFG_N_CORES as CoreId)
            .any(|c| unsafe { kernel::cur_tcb(c) } == Some(tcb));

        let ready_to_delete = unsafe { sched::remove(tcb) };
        if ready_to_delete {
            unsafe { reclaim(tcb, cs) };
        }

        Ok(was_current)
    })?;

    if should_sched {
        sched::os_sched();
    }
    Ok(())
}

/// Called from each core's idle task loop: reclaim every task on the
/// deletion-pending list that is no longer running anywhere.
pub(crate) fn idle_reclaim_pass() {
    critical_section(|cs| unsafe {
        let s = kernel::sched_state();
        let mut cursor = s.deletion_pending.head();
        while let Some(tcb) = cursor {
            let next = tcb.as_ref().next_ptr;
            let still_running = (0..crate::config::CFG_N_CORES as CoreId)
                .any(|c| kernel::cur_tcb(c) == Some(tcb));
            if !still_running {
                kernel::sched_state().deletion_pending.remove(tcb);
                (*tcb.as_ptr()).task_state = OsTaskState::ReadyToDelete;
                reclaim(tcb, cs);
            }
            cursor = next;
        }
    });
}

/// Block the caller until `tid` terminates (spec §4.2 `Join(tid, timeout)`).
/// `timeout == 0` returns `TimerExpired` immediately if `tid` hasn't already
/// exited; `timeout == OsTick::MAX` waits forever (spec §5 timeout
/// semantics); anything else arms a real tick-counted timeout.
pub fn os_task_join(tid: Tid, timeout: OsTick) -> OsResult<()> {
    if is_isr_context() {
        return Err(OsError::PendIsr);
    }

    let outcome = critical_section(|_cs| {
        let tcb = tcb_of(tid).ok_or(OsError::InvalidTid)?;
        let t = unsafe { &mut *tcb.as_ptr() };
        if t.has_exited {
            return Ok(None);
        }
        if timeout == 0 {
            return Err(OsError::TimerExpired);
        }
        let status = unsafe {
            sched::block_current_on(
                &mut t.join_waiters,
                tcb.as_ptr() as *const (),
                crate::types::OsPendOn::Join,
                timeout,
            )
        };
        Ok(Some(status))
    })?;

    match outcome {
        None => Ok(()),
        Some(crate::types::OsPendStatus::Ok) => Ok(()),
        Some(crate::types::OsPendStatus::Timeout) => Err(OsError::TimerExpired),
        Some(crate::types::OsPendStatus::ResourceDestroyed) => Err(OsError::ResourceDestroyed),
    }
}

/// Post a message to `tid`'s per-task queue (spec §4.2 "wire per-task
/// message queue", addressed by tid since the sender is some other task).
/// Fails with [`OsError::NoTaskQueue`] if `tid` was created with
/// `queue_capacity == 0`.
#[cfg(feature = "queue")]
pub fn os_task_send_msg(tid: Tid, payload: *const (), size: OsMsgSize, timeout: OsTick) -> OsResult<()> {
    let mut tcb = tcb_of(tid).ok_or(OsError::InvalidTid)?;
    let t = unsafe { tcb.as_mut() };
    if t.msg_queue.capacity() == 0 {
        return Err(OsError::NoTaskQueue);
    }
    t.msg_queue.send(payload, size, timeout)
}

/// Receive a message from `tid`'s own per-task queue — called by `tid`
/// itself to drain its inbox. Fails with [`OsError::NoTaskQueue`] if `tid`
/// was created with `queue_capacity == 0`.
#[cfg(feature = "queue")]
pub fn os_task_receive_msg(tid: Tid, timeout: OsTick) -> OsResult<crate::ipc::queue::Received> {
    let mut tcb = tcb_of(tid).ok_or(OsError::InvalidTid)?;
    let t = unsafe { tcb.as_mut() };
    if t.msg_queue.capacity() == 0 {
        return Err(OsError::NoTaskQueue);
    }
    t.msg_queue.receive(timeout)
}

/// Read TLS slot `idx` for `tid` (spec §4.2 TLS `get`).
pub fn os_task_tls_get(tid: Tid, idx: usize) -> OsResult<*mut ()> {
    if idx >= CFG_N_TLS_SLOTS {
        return Err(OsError::InvalidTls);
    }
    critical_section(|_cs| {
        let tcb = tcb_of(tid).ok_or(OsError::InvalidTid)?;
        Ok(unsafe { tcb.as_ref() }.tls[idx].value)
    })
}

/// Write TLS slot `idx` for `tid`, registering `destructor` to run at task
/// deletion (spec §4.2 TLS `set`).
pub fn os_task_tls_set(
    tid: Tid,
    idx: usize,
    value: *mut (),
    destructor: Option<fn(*mut ())>,
) -> OsResult<()> {
    if idx >= CFG_N_TLS_SLOTS {
        return Err(OsError::InvalidTls);
    }
    critical_section(|_cs| {
        let mut tcb = tcb_of(tid).ok_or(OsError::InvalidTid)?;
        let t = unsafe { tcb.as_mut() };
        t.tls[idx].value = value;
        t.tls[idx].destructor = destructor;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tid_table_reuses_freed_slots() {
        // alloc_tid/free_tid operate on process-global state shared with
        // every other test in this binary; exercised end-to-end instead via
        // tests/task_tests.rs against a freshly reset kernel per test.
    }
}
