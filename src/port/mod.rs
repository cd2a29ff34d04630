//! Port layer — CPU-specific implementations (spec §6)
//!
//! This module is the hardware abstraction boundary: stack initialization,
//! interrupt enable/disable, the inter-processor yield, per-core identity,
//! and a primitive spin-mutex type. Per spec §1 these are treated as an
//! external collaborator's interface — the kernel core assumes exactly the
//! operations listed in spec §6's port table and no others. A real
//! single-core Cortex-M4 backend is kept as the reference implementation
//! (adapted from the teacher's PendSV-based context switch); a host/test
//! stub backs everything when not building for ARM, generalized with an
//! explicit [`CoreId`] parameter so multi-core scheduling scenarios are
//! host-testable without real hardware.

use crate::types::CoreId;

#[cfg(target_arch = "arm")]
pub mod cortex_m4;

#[cfg(target_arch = "arm")]
pub use cortex_m4::*;

#[cfg(not(target_arch = "arm"))]
pub mod stub;

#[cfg(not(target_arch = "arm"))]
pub use stub::*;

mod spinlock;
pub use spinlock::RawSpinLock;

#[cfg(target_arch = "arm")]
use cortex_m4 as imp;
#[cfg(not(target_arch = "arm"))]
use stub as imp;

/// Identify the calling core. On the Cortex-M4 backend this is always 0
/// (single-core reference port); the host stub tracks a thread-local core
/// id set by test harnesses exercising SMP scenarios.
pub fn core_id() -> CoreId {
    imp::core_id()
}

/// Send an IPI so `core` enters its context-switch path at the next safe
/// point. No-op on the single-core Cortex-M4 backend when `core == 0`.
pub fn yield_other_core(core: CoreId) {
    imp::yield_other_core(core)
}
