//! Semaphores, mutexes, and the wait-list they're built on: fairness
//! ordering, priority inheritance, ownership, and teardown.

mod common;

use corvus::error::OsError;
use corvus::port::stub::set_core_id;
use corvus::sync::mutex::Mutex;
use corvus::sync::sem::Semaphore;
use corvus::task::tcb_of;
use corvus::wait_list::WaitList;

#[test]
fn take_decrements_and_give_increments() {
    let _g = common::serial();
    common::fresh_kernel();

    let sem = Semaphore::new(2);
    assert_eq!(sem.wait(0).unwrap(), 1);
    assert_eq!(sem.wait(0).unwrap(), 0);
    assert_eq!(sem.wait(0).unwrap_err(), OsError::TimerExpired);
    assert_eq!(sem.signal().unwrap(), 1);
}

#[test]
fn wait_list_orders_by_descending_priority_fifo_within_a_tier() {
    let _g = common::serial();
    common::fresh_kernel();
    set_core_id(0);
    corvus::os_start_for_test(0);

    // Three tasks at two priority tiers, created out of priority order to
    // rule out the list just reflecting insertion order.
    let low_a = common::spawn("LowA", 3, 0);
    let high = common::spawn("High", 8, 0);
    let low_b = common::spawn("LowB", 3, 0);

    let mut wl = WaitList::new();
    wl.insert_by_prio(tcb_of(low_a).unwrap());
    wl.insert_by_prio(tcb_of(high).unwrap());
    wl.insert_by_prio(tcb_of(low_b).unwrap());

    assert_eq!(wl.pop_head().unwrap(), tcb_of(high).unwrap());
    assert_eq!(wl.pop_head().unwrap(), tcb_of(low_a).unwrap());
    assert_eq!(wl.pop_head().unwrap(), tcb_of(low_b).unwrap());
    assert!(wl.is_empty());
}

#[test]
fn mutex_lock_unlock_roundtrip_tracks_ownership() {
    let _g = common::serial();
    common::fresh_kernel();
    set_core_id(0);
    corvus::os_start_for_test(0);

    let owner = common::spawn("Owner", 5, 0);
    assert_eq!(corvus::os_task_get_state(owner).unwrap(), corvus::types::OsTaskState::Running);

    let mtx = Mutex::new();
    mtx.create().unwrap();
    assert!(!mtx.is_locked());

    mtx.lock(0).unwrap();
    assert!(mtx.is_locked());

    mtx.unlock().unwrap();
    assert!(!mtx.is_locked());
}

#[test]
fn mutex_unlock_by_non_owner_is_rejected() {
    let _g = common::serial();
    common::fresh_kernel();

    set_core_id(1);
    let owner = common::spawn("Owner", 5, 1);
    corvus::os_start_for_test(1);
    assert_eq!(corvus::os_task_get_state(owner).unwrap(), corvus::types::OsTaskState::Running);

    let mtx = Mutex::new();
    mtx.create().unwrap();
    mtx.lock(0).unwrap();

    set_core_id(0);
    corvus::os_start_for_test(0);
    let err = mtx.unlock().unwrap_err();
    assert_eq!(err, OsError::NotOwner);
}

#[test]
fn mutex_lock_attempt_inherits_priority_to_the_holder_and_reverts_on_unlock() {
    let _g = common::serial();
    common::fresh_kernel();

    // Low holds the mutex and is pinned to core 1, where it is the only
    // (and so always-current) task — this keeps it "current" there
    // independent of whatever higher-priority task gets created on core 0,
    // letting the whole inheritance/revert cycle be driven through
    // non-blocking calls while switching which simulated core is "here".
    set_core_id(1);
    let low = common::spawn("Low", 2, 1);
    corvus::os_start_for_test(1);
    assert_eq!(corvus::os_task_get_state(low).unwrap(), corvus::types::OsTaskState::Running);

    set_core_id(0);
    corvus::os_start_for_test(0);

    let mtx = Mutex::new();
    mtx.create().unwrap();

    set_core_id(1);
    mtx.lock(0).unwrap();
    assert!(mtx.is_locked());

    set_core_id(0);
    let high = common::spawn("High", 9, 0);
    assert_eq!(corvus::os_task_get_state(high).unwrap(), corvus::types::OsTaskState::Running);

    // High's non-blocking attempt can't take the mutex, but still boosts
    // Low's effective priority to its own before reporting timeout.
    let err = mtx.lock(0).unwrap_err();
    assert_eq!(err, OsError::TimerExpired);
    assert_eq!(corvus::os_task_get_priority(low).unwrap(), 9);
    assert_eq!(corvus::os_task_get_base_priority(low).unwrap(), 2);

    set_core_id(1);
    mtx.unlock().unwrap();
    assert_eq!(corvus::os_task_get_priority(low).unwrap(), 2);

    set_core_id(0);
    mtx.lock(0).unwrap();
    assert!(mtx.is_locked());
}

#[test]
fn semaphore_delete_wakes_no_one_when_idle_and_resets_on_recreate() {
    let _g = common::serial();
    common::fresh_kernel();

    let sem = Semaphore::new(0);
    sem.delete();
    sem.create(3).unwrap();
    assert_eq!(sem.count(), 3);
}

#[test]
fn mutex_delete_releases_the_current_holder() {
    let _g = common::serial();
    common::fresh_kernel();
    set_core_id(0);
    corvus::os_start_for_test(0);

    let owner = common::spawn("Owner", 5, 0);
    assert_eq!(corvus::os_task_get_state(owner).unwrap(), corvus::types::OsTaskState::Running);

    let mtx = Mutex::new();
    mtx.create().unwrap();
    mtx.lock(0).unwrap();
    assert!(mtx.is_locked());

    mtx.delete();
    assert!(!mtx.is_locked());
}
