//! Mutex implementation with priority inheritance (spec §4.5)
//!
//! "A mutex is a semaphore initialized to 1" (spec §3, §4.5) — built directly
//! on [`OsSem`] for its counter and wait-list, plumbing in the two things a
//! plain semaphore doesn't have: an owner and priority inheritance. `take`
//! boosts the current holder's priority to the taker's if higher (spec §4.1
//! "On mutex take"); `release` reverts once `mutexes_held` returns to zero
//! and (like a semaphore `give`) wakes the highest-priority waiter to retry.

use core::cell::UnsafeCell;
use core::ptr::NonNull;

use crate::critical::{critical_section, is_isr_context};
use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::sched;
use crate::sync::sem::OsSem;
use crate::task::OsTcb;
use crate::types::{OsPendOn, OsPendStatus, OsTick};

enum Attempt {
    Acquired,
    Woken(OsPendStatus),
}

/// Mutex core: a semaphore-of-one plus ownership and inheritance bookkeeping.
pub struct OsMutex {
    sem: OsSem,
    owner: Option<NonNull<OsTcb>>,
}

impl OsMutex {
    pub const fn new() -> Self {
        OsMutex { sem: OsSem::new(1), owner: None }
    }

    /// (Re)initialize the mutex to unlocked, dropping any waiters.
    pub fn create(&mut self) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::CreateIsr);
        }
        critical_section(|_cs| {
            self.sem.create(1)?;
            self.owner = None;
            Ok(())
        })
    }

    /// Acquire the mutex (spec §4.5 `take`). If it is held by a lower
    /// priority task, that holder's effective priority is boosted to the
    /// caller's (spec §4.1 priority inheritance) before the caller blocks.
    pub fn lock(&mut self, timeout: OsTick) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::PendIsr);
        }

        let deadline = kernel::KERNEL.tick_get().wrapping_add(timeout);
        let mut remaining = timeout;

        loop {
            let attempt = critical_section(|_cs| unsafe {
                let cur = kernel::cur_tcb_here().ok_or(OsError::InvalidTaskState)?;

                if self.sem.count > 0 {
                    self.sem.count -= 1;
                    self.owner = Some(cur);
                    (*cur.as_ptr()).mutexes_held += 1;
                    return Ok(Attempt::Acquired);
                }

                if let Some(holder) = self.owner {
                    let taker_prio = (*cur.as_ptr()).prio;
                    sched::inherit_priority(holder, taker_prio);
                }

                if remaining == 0 {
                    return Err(OsError::TimerExpired);
                }
                let status = sched::block_current_on(
                    &mut self.sem.waiters,
                    self as *const _ as *const (),
                    OsPendOn::Mutex,
                    remaining,
                );
                Ok(Attempt::Woken(status))
            })?;

            match attempt {
                Attempt::Acquired => return Ok(()),
                Attempt::Woken(OsPendStatus::Timeout) => return Err(OsError::TimerExpired),
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
                return Err(OsError::TimerExpired);
            }
            remaining = rem;
        }
    }

    /// Release the mutex (spec §4.5 `release`). Only the current holder may
    /// call this — enforced here (spec §4.5 calls it "caller contract" for
    /// the primitive, but this implementation checks it defensively and
    /// returns [`OsError::NotOwner`] rather than silently corrupting state).
    pub fn unlock(&mut self) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::DeleteIsr);
        }

        critical_section(|_cs| unsafe {
            let cur = kernel::cur_tcb_here().ok_or(OsError::InvalidTaskState)?;
            if self.owner != Some(cur) {
                return Err(OsError::NotOwner);
            }

            self.owner = None;
            let t = &mut *cur.as_ptr();
            t.mutexes_held -= 1;
            sched::revert_priority(cur);

            self.sem.count = self.sem.count.saturating_add(1);
            sched::wake_one(&mut self.sem.waiters, OsPendStatus::Ok);
            Ok(())
        })
    }

    /// Destroy the mutex: wake every waiter with `ResourceDestroyed` and
    /// release the current holder's claim on it, if any.
    pub fn delete(&mut self) {
        critical_section(|_cs| unsafe {
            if let Some(owner) = self.owner.take() {
                let t = &mut *owner.as_ptr();
                t.mutexes_held = t.mutexes_held.saturating_sub(1);
                sched::revert_priority(owner);
            }
            sched::wake_all(&mut self.sem.waiters, OsPendStatus::ResourceDestroyed);
        });
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.owner.is_some()
    }
}

impl Default for OsMutex {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for OsMutex {}
unsafe impl Sync for OsMutex {}

// ============ Safe wrapper ============

/// `static`-friendly handle around [`OsMutex`].
pub struct Mutex {
    inner: UnsafeCell<OsMutex>,
}

unsafe impl Sync for Mutex {}
unsafe impl Send for Mutex {}

impl Mutex {
    pub const fn new() -> Self {
        Mutex { inner: UnsafeCell::new(OsMutex::new()) }
    }

    pub fn create(&self) -> OsResult<()> {
        unsafe { (*self.inner.get()).create() }
    }

    pub fn lock(&self, timeout: OsTick) -> OsResult<()> {
        unsafe { (*self.inner.get()).lock(timeout) }
    }

    pub fn unlock(&self) -> OsResult<()> {
        unsafe { (*self.inner.get()).unlock() }
    }

    pub fn delete(&self) {
        unsafe { (*self.inner.get()).delete() }
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        unsafe { (*self.inner.get()).is_locked() }
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_unlock_roundtrip() {
        crate::kernel::os_reset_globals();
        let mut mtx = OsMutex::new();
        assert!(!mtx.is_locked());
    }
}
