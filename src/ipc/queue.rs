//! Message queue (spec §4.3)
//!
//! A bounded FIFO of pool-backed [`Message`] nodes plus two wait-lists —
//! senders blocked on a full queue, receivers blocked on an empty one.
//! `send`/`receive` share the same retry-on-wakeup shape as [`crate::sync::sem`]:
//! on wakeup (someone else drained/filled the queue), retry from the top
//! rather than assuming success.
//!
//! Grounded in `OS_msg_queue_post`/`_OS_msg_queue_pop`
//! (`examples/original_source/kernel/msg_queue.c`): same "room available or
//! block, then pop highest-priority waiter from the other side" shape,
//! carried over onto this kernel's `WaitList`/critical-section conventions
//! rather than the original's per-queue spinlock.

use core::ptr::NonNull;

use crate::config::CFG_MAX_QUEUE_SIZE;
use crate::critical::{critical_section, is_isr_context};
use crate::error::{OsError, OsResult};
use crate::ipc::pool::{self, Message};
use crate::kernel;
use crate::sched;
use crate::types::{OsMsgSize, OsObjQty, OsPendOn, OsPendStatus, OsTick, Tid};
use crate::wait_list::WaitList;

enum Attempt<T> {
    Satisfied(T),
    Woken(OsPendStatus),
}

/// A received message: sender, opaque payload pointer, and byte size.
#[derive(Debug, Clone, Copy)]
pub struct Received {
    pub sender: Tid,
    pub payload: *const (),
    pub size: OsMsgSize,
}

/// Bounded FIFO message queue core (spec §3 "Message queue").
pub struct OsQueue {
    head: Option<NonNull<Message>>,
    tail: Option<NonNull<Message>>,
    num_messages: OsObjQty,
    max_messages: OsObjQty,
    senders: WaitList,
    receivers: WaitList,
}

impl OsQueue {
    pub const fn new() -> Self {
        OsQueue {
            head: None,
            tail: None,
            num_messages: 0,
            max_messages: 0,
            senders: WaitList::new(),
            receivers: WaitList::new(),
        }
    }

    /// (Re)initialize the queue to empty with the given capacity (spec §4.3
    /// "queue_size in `(0, MAX_QUEUE_SIZE]`").
    pub fn create(&mut self, capacity: OsObjQty) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::CreateIsr);
        }
        if capacity == 0 || capacity as usize > CFG_MAX_QUEUE_SIZE {
            return Err(OsError::InvalidQueueSize);
        }
        critical_section(|_cs| {
            self.init_fields(capacity);
            Ok(())
        })
    }

    fn init_fields(&mut self, capacity: OsObjQty) {
        self.head = None;
        self.tail = None;
        self.num_messages = 0;
        self.max_messages = capacity;
        self.senders.init();
        self.receivers.init();
    }

    /// Same validation and reset as [`Self::create`], but without taking the
    /// critical section itself — for the task manager, which is already
    /// inside one while wiring up a new task's queue (spec §4.2 create:
    /// "initialize per-task queue if capacity > 0").
    pub(crate) fn create_unlocked(&mut self, capacity: OsObjQty) -> OsResult<()> {
        if capacity == 0 || capacity as usize > CFG_MAX_QUEUE_SIZE {
            return Err(OsError::InvalidQueueSize);
        }
        self.init_fields(capacity);
        Ok(())
    }

    fn enqueue(&mut self, msg: NonNull<Message>) {
        unsafe { (*msg.as_ptr()).next = None };
        match self.tail {
            Some(t) => unsafe { (*t.as_ptr()).next = Some(msg) },
            None => self.head = Some(msg),
        }
        self.tail = Some(msg);
        self.num_messages += 1;
    }

    fn dequeue(&mut self) -> Option<NonNull<Message>> {
        let head = self.head?;
        self.head = unsafe { (*head.as_ptr()).next };
        if self.head.is_none() {
            self.tail = None;
        }
        self.num_messages -= 1;
        Some(head)
    }

    /// Send (spec §4.3 `Send`, blocking form). The sender is the calling
    /// task. `timeout == 0` is the non-blocking form; `timeout ==
    /// OsTick::MAX` blocks forever.
    pub fn send(&mut self, payload: *const (), size: OsMsgSize, timeout: OsTick) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::PendIsr);
        }

        let deadline = kernel::KERNEL.tick_get().wrapping_add(timeout);
        let mut remaining = timeout;

        loop {
            let attempt = critical_section(|cs| unsafe {
                if self.num_messages < self.max_messages {
                    let sender_tid = match kernel::cur_tcb_here() {
                        Some(t) => t.as_ref().tid,
                        None => 0,
                    };
                    let msg = pool::acquire(cs)?;
                    let m = &mut *msg.as_ptr();
                    m.sender = sender_tid;
                    m.payload = payload;
                    m.size = size;
                    self.enqueue(msg);
                    sched::wake_one(&mut self.receivers, OsPendStatus::Ok);
                    return Ok(Attempt::Satisfied(()));
                }
                if remaining == 0 {
                    return Err(OsError::QueueFull);
                }
                let status = sched::block_current_on(
                    &mut self.senders,
                    self as *const _ as *const (),
                    OsPendOn::Queue,
                    remaining,
                );
                Ok(Attempt::Woken(status))
            })?;

            match attempt {
                Attempt::Satisfied(()) => return Ok(()),
                Attempt::Woken(OsPendStatus::Timeout) => return Err(OsError::QueueFull),
                Attempt::Woken(OsPendStatus::ResourceDestroyed) => {
                    return Err(OsError::ResourceDestroyed)
                }
                Attempt::Woken(OsPendStatus::Ok) => {}
            }

            if timeout == OsTick::MAX {
                remaining = OsTick::MAX;
                continue;
            }
            let (rem, expired) = sched::check_timeout(deadline);
            if expired {
                return Err(OsError::QueueFull);
            }
            remaining = rem;
        }
    }

    /// Receive (spec §4.3 `Receive`, symmetric to `send`). On success the
    /// popped message is returned to the pool immediately and a waiting
    /// sender, if any, is woken.
    pub fn receive(&mut self, timeout: OsTick) -> OsResult<Received> {
        if is_isr_context() {
            return Err(OsError::PendIsr);
        }

        let deadline = kernel::KERNEL.tick_get().wrapping_add(timeout);
        let mut remaining = timeout;

        loop {
            let attempt = critical_section(|cs| unsafe {
                if let Some(msg) = self.dequeue() {
                    let m = &*msg.as_ptr();
                    let received = Received { sender: m.sender, payload: m.payload, size: m.size };
                    pool::release(msg, cs);
                    sched::wake_one(&mut self.senders, OsPendStatus::Ok);
                    return Ok(Attempt::Satisfied(received));
                }
                if remaining == 0 {
                    return Err(OsError::QueueEmpty);
                }
                let status = sched::block_current_on(
                    &mut self.receivers,
                    self as *const _ as *const (),
                    OsPendOn::Queue,
                    remaining,
                );
                Ok(Attempt::Woken(status))
            })?;

            match attempt {
                Attempt::Satisfied(received) => return Ok(received),
                Attempt::Woken(OsPendStatus::Timeout) => return Err(OsError::QueueEmpty),
                Attempt::Woken(OsPendStatus::ResourceDestroyed) => {
                    return Err(OsError::ResourceDestroyed)
                }
                Attempt::Woken(OsPendStatus::Ok) => {}
            }

            if timeout == OsTick::MAX {
                remaining = OsTick::MAX;
                continue;
            }
            let (rem, expired) = sched::check_timeout(deadline);
            if expired {
                return Err(OsError::QueueEmpty);
            }
            remaining = rem;
        }
    }

    /// Non-blocking send: fails with [`OsError::QueueFull`] instead of
    /// waiting for room.
    pub fn try_send(&mut self, payload: *const (), size: OsMsgSize) -> OsResult<()> {
        self.send(payload, size, 0)
    }

    /// Non-blocking receive: fails with [`OsError::QueueEmpty`] instead of
    /// waiting for a message.
    pub fn try_receive(&mut self) -> OsResult<Received> {
        self.receive(0)
    }

    /// Destroy the queue: return every enqueued message to the pool and wake
    /// every sender/receiver waiter with `ResourceDestroyed`.
    pub fn delete(&mut self) {
        critical_section(|cs| unsafe {
            while let Some(msg) = self.dequeue() {
                pool::release(msg, cs);
            }
            sched::wake_all(&mut self.senders, OsPendStatus::ResourceDestroyed);
            sched::wake_all(&mut self.receivers, OsPendStatus::ResourceDestroyed);
        });
    }

    #[inline]
    pub fn len(&self) -> OsObjQty {
        self.num_messages
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_messages == 0
    }

    #[inline]
    pub fn capacity(&self) -> OsObjQty {
        self.max_messages
    }
}

impl Default for OsQueue {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for OsQueue {}
unsafe impl Sync for OsQueue {}

// ============ Safe wrapper ============

/// `static`-friendly handle around [`OsQueue`].
pub struct Queue {
    inner: core::cell::UnsafeCell<OsQueue>,
}

unsafe impl Sync for Queue {}
unsafe impl Send for Queue {}

impl Queue {
    pub const fn new() -> Self {
        Queue { inner: core::cell::UnsafeCell::new(OsQueue::new()) }
    }

    pub fn create(&self, capacity: OsObjQty) -> OsResult<()> {
        unsafe { (*self.inner.get()).create(capacity) }
    }

    pub fn send(&self, payload: *const (), size: OsMsgSize, timeout: OsTick) -> OsResult<()> {
        unsafe { (*self.inner.get()).send(payload, size, timeout) }
    }

    pub fn receive(&self, timeout: OsTick) -> OsResult<Received> {
        unsafe { (*self.inner.get()).receive(timeout) }
    }

    pub fn try_send(&self, payload: *const (), size: OsMsgSize) -> OsResult<()> {
        unsafe { (*self.inner.get()).try_send(payload, size) }
    }

    pub fn try_receive(&self) -> OsResult<Received> {
        unsafe { (*self.inner.get()).try_receive() }
    }

    pub fn delete(&self) {
        unsafe { (*self.inner.get()).delete() }
    }

    #[inline]
    pub fn len(&self) -> OsObjQty {
        unsafe { (*self.inner.get()).len() }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        unsafe { (*self.inner.get()).is_empty() }
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}
