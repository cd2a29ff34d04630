//! Scheduler behavior: multi-core dispatch, preemption, round-robin, and the
//! delayed-list overflow cycle.

mod common;

use corvus::port::stub::set_core_id;
use corvus::types::{OsTaskState, OsTick, NO_AFFINITY};

#[test]
fn priority_preemption_across_cores() {
    let _g = common::serial();
    common::fresh_kernel();

    // Boot core 1 before core 0 so the one NO_AFFINITY task present at boot
    // (B, prio 5) is claimed by core 1's initial dispatch, leaving core 0 to
    // pick up the pinned, lower-priority A instead of outranking it. Which
    // physical core boots first is a hardware detail this kernel leaves
    // unspecified; this ordering is the one that exercises both halves of
    // dispatch (pinned vs. floating) in one scenario.
    set_core_id(0);
    let a = common::spawn("A", 3, 0);
    let b = common::spawn("B", 5, NO_AFFINITY);

    set_core_id(1);
    corvus::os_start_for_test(1);
    set_core_id(0);
    corvus::os_start_for_test(0);

    assert_eq!(corvus::os_task_get_state(a).unwrap(), OsTaskState::Running);
    assert_eq!(corvus::os_task_get_state(b).unwrap(), OsTaskState::Running);

    // C (prio 4, pinned core 0) outranks A but not B; created while acting
    // as core 0, so it preempts inline.
    let c = common::spawn("C", 4, 0);

    assert_eq!(corvus::os_task_get_state(c).unwrap(), OsTaskState::Running);
    assert_eq!(corvus::os_task_get_state(a).unwrap(), OsTaskState::Ready);
    assert_eq!(corvus::os_task_get_state(b).unwrap(), OsTaskState::Running);
}

#[test]
fn round_robin_rotates_equal_priority_tasks_by_time_quanta() {
    let _g = common::serial();
    common::fresh_kernel();
    set_core_id(0);
    corvus::os_start_for_test(0);

    let t1 = common::spawn("T1", 10, 0);
    let t2 = common::spawn("T2", 10, 0);
    let t3 = common::spawn("T3", 10, 0);

    // T1 preempted idle on creation; T2/T3 arrived at an already-occupied
    // priority and simply queued behind it.
    assert_eq!(corvus::os_task_get_state(t1).unwrap(), OsTaskState::Running);

    let tick_quantum = || {
        for _ in 0..corvus::config::CFG_TIME_QUANTA_DEFAULT {
            corvus::time::os_tick_handler();
        }
    };

    tick_quantum();
    assert_eq!(corvus::os_task_get_state(t2).unwrap(), OsTaskState::Running);
    assert_eq!(corvus::os_task_get_state(t1).unwrap(), OsTaskState::Ready);

    tick_quantum();
    assert_eq!(corvus::os_task_get_state(t3).unwrap(), OsTaskState::Running);

    tick_quantum();
    assert_eq!(corvus::os_task_get_state(t1).unwrap(), OsTaskState::Running);
}

#[test]
fn delayed_task_wakes_across_tick_counter_wraparound() {
    let _g = common::serial();
    common::fresh_kernel();
    set_core_id(0);
    corvus::os_start_for_test(0);

    let d = common::spawn("D", 5, 0);
    assert_eq!(corvus::os_task_get_state(d).unwrap(), OsTaskState::Running);

    // Four ticks before the counter wraps: delay(10) crosses the wrap once,
    // landing the wakeup on the overflow list, then the wrap swaps the two
    // delayed lists so it surfaces as a normal wakeup (spec's two-list
    // overflow cycle).
    corvus::os_test_set_tick(OsTick::MAX - 4);
    corvus::time::os_time_dly(10).unwrap();
    assert_eq!(corvus::os_task_get_state(d).unwrap(), OsTaskState::Delayed);

    for _ in 0..10 {
        corvus::time::os_tick_handler();
    }

    assert_eq!(corvus::time::os_time_get(), 5);
    assert_eq!(corvus::os_task_get_state(d).unwrap(), OsTaskState::Running);
}

#[test]
fn delay_zero_forces_yield_but_stays_ready() {
    let _g = common::serial();
    common::fresh_kernel();
    set_core_id(0);
    corvus::os_start_for_test(0);

    let a = common::spawn("A", 5, 0);
    let _b = common::spawn("B", 5, 0);
    assert_eq!(corvus::os_task_get_state(a).unwrap(), OsTaskState::Running);

    corvus::time::os_time_dly(0).unwrap();

    // A yielded to B without ever leaving the ready set.
    assert_eq!(corvus::os_task_get_state(a).unwrap(), OsTaskState::Ready);
}

#[test]
fn next_unblock_tick_reports_soonest_delayed_wakeup() {
    let _g = common::serial();
    common::fresh_kernel();
    set_core_id(0);
    corvus::os_start_for_test(0);

    assert_eq!(corvus::sched::next_unblock_tick(), OsTick::MAX);

    common::spawn("E", 5, 0);
    corvus::time::os_time_dly(20).unwrap();
    assert_eq!(corvus::sched::next_unblock_tick(), 20);
}

#[test]
fn suspend_and_resume_round_trip() {
    let _g = common::serial();
    common::fresh_kernel();
    set_core_id(0);
    corvus::os_start_for_test(0);

    let tid = common::spawn("S", 5, 0);
    let tcb = corvus::task::tcb_of(tid).unwrap();

    corvus::sched::suspend(tcb).unwrap();
    assert_eq!(corvus::os_task_get_state(tid).unwrap(), OsTaskState::Suspended);

    corvus::sched::resume(tcb).unwrap();
    assert_eq!(corvus::os_task_get_state(tid).unwrap(), OsTaskState::Running);
}

#[test]
fn change_priority_repositions_ready_task() {
    let _g = common::serial();
    common::fresh_kernel();
    set_core_id(0);
    corvus::os_start_for_test(0);

    let low = common::spawn("Low", 3, 0);
    let high = common::spawn("High", 7, 0);
    assert_eq!(corvus::os_task_get_state(high).unwrap(), OsTaskState::Running);
    assert_eq!(corvus::os_task_get_state(low).unwrap(), OsTaskState::Ready);

    let low_tcb = corvus::task::tcb_of(low).unwrap();
    corvus::sched::change_priority(low_tcb, 9).unwrap();

    assert_eq!(corvus::os_task_get_priority(low).unwrap(), 9);
    assert_eq!(corvus::os_task_get_state(low).unwrap(), OsTaskState::Running);
    assert_eq!(corvus::os_task_get_state(high).unwrap(), OsTaskState::Ready);
}

#[test]
fn scheduler_suspend_defers_ready_transitions_until_resume() {
    let _g = common::serial();
    common::fresh_kernel();
    set_core_id(0);
    corvus::os_start_for_test(0);

    let low = common::spawn("Low", 2, 0);
    let high = common::spawn("High", 8, 0);
    assert_eq!(corvus::os_task_get_state(high).unwrap(), OsTaskState::Running);

    // Park High on the suspended list, then lock this core's scheduler
    // before waking it back up — `resume` routes through the same
    // `make_ready` indirection a semaphore/queue/delay wakeup would.
    let high_tcb = corvus::task::tcb_of(high).unwrap();
    corvus::sched::suspend(high_tcb).unwrap();
    assert_eq!(corvus::os_task_get_state(low).unwrap(), OsTaskState::Running);

    corvus::os_sched_suspend_this_core();
    corvus::sched::resume(high_tcb).unwrap();

    // Deferred: High is neither back on the ready set nor displacing Low
    // while this core's scheduler is locked.
    assert_eq!(corvus::os_task_get_state(high).unwrap(), OsTaskState::PendingReady);
    assert_eq!(corvus::os_task_get_state(low).unwrap(), OsTaskState::Running);

    corvus::os_sched_resume_this_core();

    assert_eq!(corvus::os_task_get_state(high).unwrap(), OsTaskState::Running);
    assert_eq!(corvus::os_task_get_state(low).unwrap(), OsTaskState::Ready);
}
