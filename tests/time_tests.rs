//! Time management: the public delay/tick surface sitting over the
//! scheduler's delayed-list bookkeeping.

mod common;

use corvus::error::OsError;
use corvus::port::stub::set_core_id;
use corvus::types::OsTaskState;

#[test]
fn delay_before_the_scheduler_starts_is_rejected() {
    let _g = common::serial();
    common::fresh_kernel();

    let err = corvus::time::os_time_dly(5).unwrap_err();
    assert_eq!(err, OsError::SchedulerStopped);
}

#[test]
fn hmsm_converts_wall_clock_to_ticks() {
    let _g = common::serial();
    common::fresh_kernel();
    set_core_id(0);
    corvus::os_start_for_test(0);

    // CFG_TICK_RATE_HZ is 1000, so one second is exactly 1000 ticks.
    common::spawn("T", 5, 0);
    corvus::time::os_time_dly_hmsm(0, 0, 1, 0).unwrap();
    assert_eq!(corvus::sched::next_unblock_tick(), 1000);
}

#[test]
fn tick_handler_advances_the_shared_counter() {
    let _g = common::serial();
    common::fresh_kernel();
    set_core_id(0);
    corvus::os_start_for_test(0);

    assert_eq!(corvus::time::os_time_get(), 0);
    for _ in 0..7 {
        corvus::time::os_tick_handler();
    }
    assert_eq!(corvus::time::os_time_get(), 7);
}

#[test]
fn multiple_delayed_tasks_wake_in_wakeup_tick_order() {
    let _g = common::serial();
    common::fresh_kernel();
    set_core_id(0);
    corvus::os_start_for_test(0);

    // Long outranks Short so its later wakeup visibly preempts rather than
    // just joining the ready set behind whatever's already running.
    let short = common::spawn("Short", 6, 0);
    corvus::time::os_time_dly(3).unwrap();

    let long = common::spawn("Long", 8, 0);
    corvus::time::os_time_dly(6).unwrap();

    assert_eq!(corvus::os_task_get_state(short).unwrap(), OsTaskState::Delayed);
    assert_eq!(corvus::os_task_get_state(long).unwrap(), OsTaskState::Delayed);
    assert_eq!(corvus::sched::next_unblock_tick(), 3);

    for _ in 0..3 {
        corvus::time::os_tick_handler();
    }
    assert_eq!(corvus::os_task_get_state(short).unwrap(), OsTaskState::Running);
    assert_eq!(corvus::os_task_get_state(long).unwrap(), OsTaskState::Delayed);

    for _ in 0..3 {
        corvus::time::os_tick_handler();
    }
    assert_eq!(corvus::os_task_get_state(long).unwrap(), OsTaskState::Running);
}

#[test]
fn check_timeout_survives_a_single_wraparound() {
    let _g = common::serial();
    common::fresh_kernel();

    corvus::os_test_set_tick(corvus::types::OsTick::MAX - 2);
    let deadline = corvus::time::os_time_get().wrapping_add(5);

    let (remaining, expired) = corvus::sched::check_timeout(deadline);
    assert!(!expired);
    assert_eq!(remaining, 5);
}
