//! Inter-process communication (spec §4.3)
//!
//! Message queues and the slab-allocated message pool that backs them.
//! Unlike the semaphore/mutex primitives, this has no direct teacher
//! counterpart in `sync/` — grounded instead in the VeriOS message queue
//! (`msg_queue.c`), carried over onto this kernel's `WaitList`/critical
//! section conventions.

#[cfg(feature = "queue")]
pub mod pool;

#[cfg(feature = "queue")]
pub mod queue;
