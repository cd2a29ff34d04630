//! Critical section handling (spec §5, §6)
//!
//! Two tiers compose here, matching spec §5's locking discipline:
//!
//! - local interrupt masking, via the `critical-section` crate (an `Impl`
//!   is registered once per backend in `lib.rs` — the real Cortex-M4
//!   PRIMASK-based one for `target_arch = "arm"`, a spin-loop one for host
//!   test builds);
//! - a single global spin-mutex (`SCHED_LOCK`) giving the kernel's shared
//!   scheduler state (spec §5's "one global scheduler spin-mutex") real
//!   cross-core mutual exclusion, not just a per-core reentrancy flag.
//!
//! [`CriticalSection::enter`] acquires both; [`CsCell`](crate::cs_cell::CsCell)
//! is the typed accessor built on top that every piece of kernel-global
//! state in `kernel.rs` goes through.

use spin::mutex::{SpinMutex, SpinMutexGuard};

static SCHED_LOCK: SpinMutex<()> = SpinMutex::new(());

/// RAII guard for the kernel's single global critical section.
///
/// While held: local interrupts are masked (via `critical-section`) and the
/// cross-core scheduler spin-mutex is owned. Nesting is supported transitively
/// through `critical-section`'s own nesting-safe `acquire`/`release` pair;
/// re-entering from the same core while already holding the guard would
/// deadlock on `SCHED_LOCK`, so kernel code threads a `&CriticalSection`
/// through instead of calling `enter()` again (mirrored by
/// [`KernelFlags`](crate::kernel::KernelFlags)'s separate `sched_lock_nesting`
/// counter, which tracks the *scheduler-suspended* concept in spec §5,
/// unrelated to this type).
pub struct CriticalSection {
    guard: Option<SpinMutexGuard<'static, ()>>,
    restore: critical_section::RestoreState,
}

impl CriticalSection {
    /// Mask local interrupts, then spin for the global scheduler lock.
    #[inline]
    pub fn enter() -> Self {
        let restore = unsafe { critical_section::acquire() };
        let guard = SCHED_LOCK.lock();
        CriticalSection { guard: Some(guard), restore }
    }

    /// Whether the calling core currently holds the global critical section.
    #[inline]
    pub fn is_active() -> bool {
        SCHED_LOCK.is_locked()
    }
}

impl Drop for CriticalSection {
    #[inline]
    fn drop(&mut self) {
        self.guard = None;
        unsafe { critical_section::release(self.restore) };
    }
}

/// Execute a closure with the kernel's global critical section held. The
/// closure receives a reference to the guard, usable with
/// [`CsCell::get`](crate::cs_cell::CsCell::get).
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&CriticalSection) -> R,
{
    let cs = CriticalSection::enter();
    f(&cs)
}

/// True if the caller is currently servicing an interrupt (spec §6's
/// `in_isr_context`).
#[inline]
pub fn is_isr_context() -> bool {
    #[cfg(target_arch = "arm")]
    {
        let ipsr: u32;
        unsafe {
            core::arch::asm!(
                "mrs {}, IPSR",
                out(reg) ipsr,
                options(nomem, nostack, preserves_flags)
            );
        }
        ipsr != 0
    }

    #[cfg(not(target_arch = "arm"))]
    {
        false
    }
}

/// Mask priority levels using BASEPRI (Cortex-M3/M4/M7). Unused off-target.
#[inline]
pub fn set_basepri(priority: u8) {
    #[cfg(target_arch = "arm")]
    unsafe {
        core::arch::asm!(
            "msr BASEPRI, {}",
            in(reg) priority as u32,
            options(nomem, nostack, preserves_flags)
        );
    }

    #[cfg(not(target_arch = "arm"))]
    {
        let _ = priority;
    }
}

/// Read back the current BASEPRI value. Unused off-target.
#[inline]
pub fn get_basepri() -> u8 {
    #[cfg(target_arch = "arm")]
    {
        let basepri: u32;
        unsafe {
            core::arch::asm!(
                "mrs {}, BASEPRI",
                out(reg) basepri,
                options(nomem, nostack, preserves_flags)
            );
        }
        basepri as u8
    }

    #[cfg(not(target_arch = "arm"))]
    {
        0
    }
}
