//! Semaphore implementation (spec §4.4)
//!
//! Counting semaphore: a non-negative counter plus a priority-ordered
//! wait-list. `take` decrements if positive, else blocks; `give` increments
//! and, if anyone is waiting, wakes the highest-priority waiter to retry
//! rather than handing the unit to it directly — the same retry-on-wakeup
//! shape spec §4.3 spells out for the message queue, reused here since a
//! semaphore is exactly a message queue without a payload.

use core::cell::UnsafeCell;
use core::ptr::NonNull;

use crate::critical::{critical_section, is_isr_context};
use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::sched;
use crate::types::{OsPendOn, OsPendStatus, OsSemCtr, OsTick};
use crate::wait_list::WaitList;

/// One retry-loop iteration's outcome (spec §4.4 `take`/§4.3 "retry from
/// step 1"): either the request was satisfied immediately, or the caller
/// blocked and was later woken with a pend status to interpret.
enum Attempt<T> {
    Satisfied(T),
    Woken(OsPendStatus),
}

/// Counting semaphore core (spec §3 "Semaphore").
pub struct OsSem {
    pub(crate) count: OsSemCtr,
    pub(crate) waiters: WaitList,
}

impl OsSem {
    pub const fn new(count: OsSemCtr) -> Self {
        OsSem { count, waiters: WaitList::new() }
    }

    /// (Re)initialize the semaphore to `count`, dropping any waiters it may
    /// already have (only meaningful for a static semaphore re-created after
    /// `delete`).
    pub fn create(&mut self, count: OsSemCtr) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::CreateIsr);
        }
        critical_section(|_cs| {
            self.count = count;
            self.waiters.init();
            Ok(())
        })
    }

    /// Wait on (take) the semaphore (spec §4.4 `take`). `timeout == 0` is the
    /// non-blocking form (spec §5 "`0` means immediate"); `timeout ==
    /// OsTick::MAX` blocks forever (suspend semantics, not a delayed wakeup).
    pub fn take(&mut self, timeout: OsTick) -> OsResult<OsSemCtr> {
        if is_isr_context() {
            return Err(OsError::PendIsr);
        }

        let deadline = kernel::KERNEL.tick_get().wrapping_add(timeout);
        let mut remaining = timeout;

        loop {
            let attempt = critical_section(|_cs| unsafe {
                if self.count > 0 {
                    self.count -= 1;
                    return Ok(Attempt::Satisfied(self.count));
                }
                if remaining == 0 {
                    return Err(OsError::TimerExpired);
                }
                let status = sched::block_current_on(
                    &mut self.waiters,
                    self as *const _ as *const (),
                    OsPendOn::Semaphore,
                    remaining,
                );
                Ok(Attempt::Woken(status))
            })?;

            match attempt {
                Attempt::Satisfied(count) => return Ok(count),
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

    /// Signal (give) the semaphore (spec §4.4 `release`): increment, then —
    /// if anyone is waiting — wake the highest-priority waiter so it retries
    /// [`take`] rather than receiving the unit directly.
    pub fn give(&mut self) -> OsResult<OsSemCtr> {
        critical_section(|_cs| unsafe {
            self.count = self.count.saturating_add(1);
            sched::wake_one(&mut self.waiters, OsPendStatus::Ok);
            Ok(self.count)
        })
    }

    /// Destroy the semaphore: wake every waiter with `ResourceDestroyed`
    /// (spec §7 "On `ResourceDestroyed`, the task is removed from the
    /// wait-list and woken with the error").
    pub fn delete(&mut self) {
        critical_section(|_cs| unsafe {
            sched::wake_all(&mut self.waiters, OsPendStatus::ResourceDestroyed)
        });
    }

    #[inline]
    pub fn count(&self) -> OsSemCtr {
        self.count
    }
}

impl Default for OsSem {
    fn default() -> Self {
        Self::new(0)
    }
}

unsafe impl Send for OsSem {}
unsafe impl Sync for OsSem {}

// ============ Safe wrapper ============

/// `static`-friendly handle around [`OsSem`], matching the crate's other
/// kernel objects (`static SEM: Semaphore = Semaphore::new(0);`).
pub struct Semaphore {
    inner: UnsafeCell<OsSem>,
}

unsafe impl Sync for Semaphore {}
unsafe impl Send for Semaphore {}

impl Semaphore {
    pub const fn new(count: OsSemCtr) -> Self {
        Semaphore { inner: UnsafeCell::new(OsSem::new(count)) }
    }

    pub fn create(&self, count: OsSemCtr) -> OsResult<()> {
        unsafe { (*self.inner.get()).create(count) }
    }

    pub fn wait(&self, timeout: OsTick) -> OsResult<OsSemCtr> {
        unsafe { (*self.inner.get()).take(timeout) }
    }

    pub fn signal(&self) -> OsResult<OsSemCtr> {
        unsafe { (*self.inner.get()).give() }
    }

    pub fn delete(&self) {
        unsafe { (*self.inner.get()).delete() }
    }

    #[inline]
    pub fn count(&self) -> OsSemCtr {
        unsafe { (*self.inner.get()).count() }
    }

    /// # Safety
    /// Internal hook for [`crate::sync::mutex`]: the mutex is built directly
    /// on a semaphore-of-one, per SPEC_FULL §11.
    pub(crate) fn raw(&self) -> NonNull<OsSem> {
        unsafe { NonNull::new_unchecked(self.inner.get()) }
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_decrements_give_increments() {
        crate::kernel::os_reset_globals();
        let mut sem = OsSem::new(2);
        assert_eq!(sem.take(0).unwrap(), 1);
        assert_eq!(sem.take(0).unwrap(), 0);
        assert_eq!(sem.take(0), Err(OsError::TimerExpired));
        assert_eq!(sem.give().unwrap(), 1);
    }

    #[test]
    fn create_resets_count() {
        let mut sem = OsSem::new(0);
        sem.create(5).unwrap();
        assert_eq!(sem.count(), 5);
    }
}
