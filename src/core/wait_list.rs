//! Wait-list utility (spec §4.6)
//!
//! Intrusive, priority-ordered doubly-linked list of TCBs blocked on a single
//! IPC object (a queue's sender/receiver lists, a semaphore's or mutex's
//! waiter list, a task's join waiters). Ordered by descending priority;
//! equal priorities are FIFO. A TCB can be on at most one wait-list at a
//! time — enforced by the fact that a TCB owns exactly one `wait_next`/
//! `wait_prev` link pair, used here and nowhere else.
//!
//! This collapses the legacy "unordered event list" pattern the VeriOS
//! sources used for an external, separately-sorted semaphore/queue
//! implementation: rather than maintaining two list abstractions, every
//! blocking primitive in this kernel goes through this one.

use core::ptr::NonNull;

use crate::core::task::OsTcb;

/// Priority-ordered intrusive wait-list.
#[derive(Debug)]
pub struct WaitList {
    head: Option<NonNull<OsTcb>>,
    tail: Option<NonNull<OsTcb>>,
}

impl WaitList {
    pub const fn new() -> Self {
        WaitList { head: None, tail: None }
    }

    pub fn init(&mut self) {
        self.head = None;
        self.tail = None;
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    #[inline(always)]
    pub fn head(&self) -> Option<NonNull<OsTcb>> {
        self.head
    }

    /// Insertion-sort by descending priority; O(n) over the wait-list's own
    /// length, as specified. Equal priority falls in behind existing
    /// waiters of that priority (FIFO).
    pub fn insert_by_prio(&mut self, tcb: NonNull<OsTcb>) {
        let prio = unsafe { tcb.as_ref() }.prio;

        let mut cursor = self.head;
        let mut prev: Option<NonNull<OsTcb>> = None;

        while let Some(cur) = cursor {
            let cur_prio = unsafe { cur.as_ref() }.prio;
            if prio > cur_prio {
                break;
            }
            prev = cursor;
            cursor = unsafe { cur.as_ref() }.wait_next;
        }

        let tcb_mut = unsafe { &mut *tcb.as_ptr() };
        tcb_mut.wait_prev = prev;
        tcb_mut.wait_next = cursor;

        match prev {
            Some(p) => unsafe { (*p.as_ptr()).wait_next = Some(tcb) },
            None => self.head = Some(tcb),
        }

        match cursor {
            Some(c) => unsafe { (*c.as_ptr()).wait_prev = Some(tcb) },
            None => self.tail = Some(tcb),
        }
    }

    /// Remove a specific TCB from the list. O(1) given its own link fields.
    pub fn remove(&mut self, tcb: NonNull<OsTcb>) {
        let tcb_ref = unsafe { &mut *tcb.as_ptr() };

        match tcb_ref.wait_prev {
            Some(prev) => unsafe { (*prev.as_ptr()).wait_next = tcb_ref.wait_next },
            None => self.head = tcb_ref.wait_next,
        }

        match tcb_ref.wait_next {
            Some(next) => unsafe { (*next.as_ptr()).wait_prev = tcb_ref.wait_prev },
            None => self.tail = tcb_ref.wait_prev,
        }

        tcb_ref.wait_prev = None;
        tcb_ref.wait_next = None;
    }

    /// Remove and return the highest-priority (head) waiter.
    pub fn pop_head(&mut self) -> Option<NonNull<OsTcb>> {
        let head = self.head?;
        self.remove(head);
        Some(head)
    }

    /// Drain every waiter, invoking `f` for each (used to wake all waiters
    /// with `ResourceDestroyed` on object deletion, or all joiners on task
    /// termination).
    pub fn drain<F: FnMut(NonNull<OsTcb>)>(&mut self, mut f: F) {
        while let Some(tcb) = self.pop_head() {
            f(tcb);
        }
    }
}

impl Default for WaitList {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for WaitList {}
unsafe impl Sync for WaitList {}
