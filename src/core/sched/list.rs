//! Scheduler-list primitive — the doubly-linked list type backing every
//! "at most one scheduler list" membership named in spec §4.1/§4.2: the
//! per-priority ready lists, the delayed list and its overflow twin, the
//! suspended list, each core's pending-ready list, and the deletion-pending
//! list. All of these share one link-field pair on the TCB (`next_ptr` /
//! `prev_ptr`) since a task can only ever be on one of them at a time —
//! generalized from the teacher's single-purpose `ReadyList`.

use core::ptr::NonNull;

use crate::task::OsTcb;
use crate::types::OsTick;

/// Doubly-linked intrusive list of TCBs, threaded through `next_ptr`/`prev_ptr`.
#[derive(Debug)]
pub struct SchedList {
    head: Option<NonNull<OsTcb>>,
    tail: Option<NonNull<OsTcb>>,
    #[cfg(feature = "defmt")]
    count: usize,
}

impl SchedList {
    pub const fn new() -> Self {
        SchedList {
            head: None,
            tail: None,
            #[cfg(feature = "defmt")]
            count: 0,
        }
    }

    pub fn init(&mut self) {
        self.head = None;
        self.tail = None;
        #[cfg(feature = "defmt")]
        {
            self.count = 0;
        }
    }

    #[inline]
    pub fn head(&self) -> Option<NonNull<OsTcb>> {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> Option<NonNull<OsTcb>> {
        self.tail
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    #[cfg(feature = "defmt")]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Insert at the tail (FIFO order, used for ready-list and round-robin
    /// rotation).
    ///
    /// # Safety
    /// `tcb` must be valid and not currently linked into any scheduler list.
    pub fn insert_tail(&mut self, tcb: NonNull<OsTcb>) {
        let tcb_ref = unsafe { &mut *tcb.as_ptr() };

        tcb_ref.next_ptr = None;
        tcb_ref.prev_ptr = self.tail;

        match self.tail {
            Some(tail) => unsafe { (*tail.as_ptr()).next_ptr = Some(tcb) },
            None => self.head = Some(tcb),
        }

        self.tail = Some(tcb);

        #[cfg(feature = "defmt")]
        {
            self.count += 1;
        }
    }

    /// Insert at the head.
    ///
    /// # Safety
    /// `tcb` must be valid and not currently linked into any scheduler list.
    pub fn insert_head(&mut self, tcb: NonNull<OsTcb>) {
        let tcb_ref = unsafe { &mut *tcb.as_ptr() };

        tcb_ref.prev_ptr = None;
        tcb_ref.next_ptr = self.head;

        match self.head {
            Some(head) => unsafe { (*head.as_ptr()).prev_ptr = Some(tcb) },
            None => self.tail = Some(tcb),
        }

        self.head = Some(tcb);

        #[cfg(feature = "defmt")]
        {
            self.count += 1;
        }
    }

    /// Insert keeping the list sorted by ascending `wakeup_tick`. Used for
    /// the delayed list and its overflow twin (spec §4.1's two-list
    /// wraparound design); ties fall in FIFO behind existing equal entries.
    pub fn insert_by_wakeup_tick(&mut self, tcb: NonNull<OsTcb>) {
        let wakeup = unsafe { tcb.as_ref() }.wakeup_tick;

        let mut cursor = self.head;
        let mut prev: Option<NonNull<OsTcb>> = None;

        while let Some(cur) = cursor {
            let cur_wakeup = unsafe { cur.as_ref() }.wakeup_tick;
            if wakeup < cur_wakeup {
                break;
            }
            prev = cursor;
            cursor = unsafe { cur.as_ref() }.next_ptr;
        }

        let tcb_mut = unsafe { &mut *tcb.as_ptr() };
        tcb_mut.prev_ptr = prev;
        tcb_mut.next_ptr = cursor;

        match prev {
            Some(p) => unsafe { (*p.as_ptr()).next_ptr = Some(tcb) },
            None => self.head = Some(tcb),
        }

        match cursor {
            Some(c) => unsafe { (*c.as_ptr()).prev_ptr = Some(tcb) },
            None => self.tail = Some(tcb),
        }

        #[cfg(feature = "defmt")]
        {
            self.count += 1;
        }
    }

    /// Remove a TCB from the list. O(1) given its own link fields.
    ///
    /// # Safety
    /// `tcb` must currently be linked into this list.
    pub fn remove(&mut self, tcb: NonNull<OsTcb>) {
        let tcb_ref = unsafe { &mut *tcb.as_ptr() };

        match tcb_ref.prev_ptr {
            Some(prev) => unsafe { (*prev.as_ptr()).next_ptr = tcb_ref.next_ptr },
            None => self.head = tcb_ref.next_ptr,
        }

        match tcb_ref.next_ptr {
            Some(next) => unsafe { (*next.as_ptr()).prev_ptr = tcb_ref.prev_ptr },
            None => self.tail = tcb_ref.prev_ptr,
        }

        tcb_ref.prev_ptr = None;
        tcb_ref.next_ptr = None;

        #[cfg(feature = "defmt")]
        {
            self.count = self.count.saturating_sub(1);
        }
    }

    pub fn pop_head(&mut self) -> Option<NonNull<OsTcb>> {
        let head = self.head?;
        self.remove(head);
        Some(head)
    }

    /// Drain every entry whose `wakeup_tick` is `<= horizon`, invoking `f`
    /// for each. Used to fire expired delayed-list entries each tick; since
    /// the list is sorted ascending, this stops at the first survivor.
    pub fn drain_due(&mut self, horizon: OsTick, mut f: impl FnMut(NonNull<OsTcb>)) {
        loop {
            let Some(head) = self.head else { break };
            if unsafe { head.as_ref() }.wakeup_tick > horizon {
                break;
            }
            self.remove(head);
            f(head);
        }
    }

    /// Drain the entire list, invoking `f` for each entry (object deletion,
    /// task-delete cleanup).
    pub fn drain<F: FnMut(NonNull<OsTcb>)>(&mut self, mut f: F) {
        while let Some(tcb) = self.pop_head() {
            f(tcb);
        }
    }
}

impl Default for SchedList {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for SchedList {}
unsafe impl Sync for SchedList {}

impl Copy for SchedList {}

impl Clone for SchedList {
    fn clone(&self) -> Self {
        *self
    }
}
