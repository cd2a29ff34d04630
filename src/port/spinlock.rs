//! Primitive spin-mutex type (spec §6 port collaborator)
//!
//! Separate lock tier from the scheduler's own global spin-mutex (spec §5):
//! each message queue, the message pool, and each semaphore/mutex owns one
//! of these to guard its own fields, acquired and released disjoint from the
//! scheduler mutex at the moment the scheduler mutex is taken. Built on the
//! `spin` crate (grounded in `examples/valibali-cluu`, which uses `spin` for
//! its kernel-level locks) layered under `critical-section` so the holder
//! also has local interrupts masked while held, matching spec's definition
//! of a spin-mutex ("busy-wait lock that also disables local interrupts for
//! the holder").

use core::ops::{Deref, DerefMut};

use critical_section::RestoreState;
use spin::mutex::{SpinMutex, SpinMutexGuard};

pub struct RawSpinLock<T> {
    inner: SpinMutex<T>,
}

pub struct RawSpinLockGuard<'a, T> {
    guard: Option<SpinMutexGuard<'a, T>>,
    restore: RestoreState,
}

impl<T> RawSpinLock<T> {
    pub const fn new(value: T) -> Self {
        RawSpinLock { inner: SpinMutex::new(value) }
    }

    /// Disable local interrupts, then spin for the lock. Interrupts are
    /// restored when the returned guard drops.
    pub fn lock(&self) -> RawSpinLockGuard<'_, T> {
        let restore = unsafe { critical_section::acquire() };
        RawSpinLockGuard { guard: Some(self.inner.lock()), restore }
    }
}

impl<T> Drop for RawSpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.guard = None;
        unsafe { critical_section::release(self.restore) };
    }
}

impl<T> Deref for RawSpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.guard.as_ref().unwrap()
    }
}

impl<T> DerefMut for RawSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.guard.as_mut().unwrap()
    }
}

unsafe impl<T: Send> Send for RawSpinLock<T> {}
unsafe impl<T: Send> Sync for RawSpinLock<T> {}
