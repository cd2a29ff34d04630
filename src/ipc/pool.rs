//! Message pool (spec §4.3 "Message pool")
//!
//! One process-wide slab allocator for [`Message`] nodes, shared by every
//! queue. Messages are never individually freed, only recycled onto a
//! free list; the pool grows by leaking a new slab whenever that list runs
//! dry, geometrically from [`CFG_MSG_POOL_INITIAL_SIZE`] (SPEC_FULL §1-9
//! Open Question resolution — the original VeriOS pool fixed every slab at
//! size 8).
//!
//! Grounded in `_OS_msg_pool_retrieve`/`_OS_msg_pool_insert`
//! (`examples/original_source/kernel/msg_queue.c`): head-allocate, tail-
//! recycle, same as there.

use core::ptr::NonNull;

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::config::CFG_MSG_POOL_INITIAL_SIZE;
use crate::critical::CriticalSection;
use crate::cs_cell::CsCell;
use crate::error::{OsError, OsResult};
use crate::types::{OsMsgSize, Tid};

/// A single message node. Doubles as a free-list link (while recycled) and
/// a queue's enqueued-message link (while in transit) — a message is on
/// exactly one of those chains at a time.
pub struct Message {
    pub(crate) sender: Tid,
    pub(crate) payload: *const (),
    pub(crate) size: OsMsgSize,
    pub(crate) next: Option<NonNull<Message>>,
}

impl Message {
    const fn empty() -> Self {
        Message { sender: 0, payload: core::ptr::null(), size: 0, next: None }
    }

    #[inline]
    pub fn sender(&self) -> Tid {
        self.sender
    }

    #[inline]
    pub fn payload(&self) -> *const () {
        self.payload
    }

    #[inline]
    pub fn size(&self) -> OsMsgSize {
        self.size
    }
}

struct MsgPool {
    free_head: Option<NonNull<Message>>,
    free_tail: Option<NonNull<Message>>,
    next_slab_size: usize,
}

impl MsgPool {
    const fn new() -> Self {
        MsgPool { free_head: None, free_tail: None, next_slab_size: CFG_MSG_POOL_INITIAL_SIZE }
    }
}

static POOL: CsCell<MsgPool> = CsCell::new(MsgPool::new());

/// Leak a new slab of `next_slab_size` messages and link it onto the tail
/// of the free list, doubling the size for next time.
fn grow(pool: &mut MsgPool) {
    let size = pool.next_slab_size;

    let mut slab_vec = Vec::with_capacity(size);
    for _ in 0..size {
        slab_vec.push(Message::empty());
    }
    let slab: &'static mut [Message] = Box::leak(slab_vec.into_boxed_slice());

    for i in 0..size - 1 {
        let next = NonNull::from(&slab[i + 1]);
        slab[i].next = Some(next);
    }
    slab[size - 1].next = None;

    let head = NonNull::from(&slab[0]);
    let tail = NonNull::from(&slab[size - 1]);

    match pool.free_tail {
        Some(t) => unsafe { (*t.as_ptr()).next = Some(head) },
        None => pool.free_head = Some(head),
    }
    pool.free_tail = Some(tail);

    pool.next_slab_size = size.saturating_mul(2);
}

/// Pop a message off the free list, growing the pool first if it's empty.
///
/// # Safety
/// Caller must hold the kernel's critical section.
pub(crate) fn acquire(cs: &CriticalSection) -> OsResult<NonNull<Message>> {
    let pool = POOL.get(cs);
    if pool.free_head.is_none() {
        grow(pool);
    }
    let head = pool.free_head.ok_or(OsError::MsgPoolRetrieve)?;
    let next = unsafe { (*head.as_ptr()).next };
    pool.free_head = next;
    if pool.free_head.is_none() {
        pool.free_tail = None;
    }
    unsafe { (*head.as_ptr()).next = None };
    Ok(head)
}

/// Recycle `msg` onto the tail of the free list (spec §3 "returned to the
/// tail").
///
/// # Safety
/// Caller must hold the kernel's critical section. `msg` must not be linked
/// into any other list.
pub(crate) fn release(msg: NonNull<Message>, cs: &CriticalSection) {
    let pool = POOL.get(cs);
    unsafe { (*msg.as_ptr()).next = None };
    match pool.free_tail {
        Some(t) => unsafe { (*t.as_ptr()).next = Some(msg) },
        None => pool.free_head = Some(msg),
    }
    pool.free_tail = Some(msg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critical::critical_section;

    #[test]
    fn acquire_then_release_is_reusable() {
        critical_section(|cs| {
            let msg = acquire(cs).expect("pool grows on first use");
            release(msg, cs);
            let msg2 = acquire(cs).expect("recycled message is reusable");
            assert_eq!(msg, msg2);
        });
    }

    #[test]
    fn pool_grows_past_initial_slab() {
        critical_section(|cs| {
            let mut taken = Vec::new();
            for _ in 0..(CFG_MSG_POOL_INITIAL_SIZE * 2 + 1) {
                taken.push(acquire(cs).expect("pool grows geometrically on demand"));
            }
            for msg in taken {
                release(msg, cs);
            }
        });
    }
}
