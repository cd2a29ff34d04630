//! Time management (spec §4.1 "tick processing", §5 timeout semantics)
//!
//! A thin public wrapper: the actual delayed-list bookkeeping and wakeup
//! ordering lives in [`crate::sched`] alongside the ready-set it shares a
//! critical section with. This module only validates arguments, converts
//! wall-clock units, and exposes the periodic tick entry point a port
//! layer's timer ISR calls into.

use crate::config::CFG_TICK_RATE_HZ;
use crate::critical::is_isr_context;
use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::sched;
use crate::types::OsTick;

/// Delay the calling task for `ticks` system ticks (spec §4.1 `delay`).
/// `ticks == 0` forces a yield without leaving the ready list (spec §8
/// boundary behavior "Delay 0 -> forces a yield; task stays Ready").
pub fn os_time_dly(ticks: OsTick) -> OsResult<()> {
    if !kernel::KERNEL.is_running() {
        return Err(OsError::SchedulerStopped);
    }
    if is_isr_context() {
        return Err(OsError::DelayIsr);
    }

    unsafe { sched::delay_current(ticks) };
    Ok(())
}

/// Delay for a wall-clock duration, converted to ticks via
/// [`CFG_TICK_RATE_HZ`].
pub fn os_time_dly_hmsm(hours: u16, minutes: u8, seconds: u8, milliseconds: u16) -> OsResult<()> {
    if minutes > 59 || seconds > 59 || milliseconds > 999 {
        return Err(OsError::InvalidDelay);
    }

    let total_ms = (hours as u64) * 3_600_000
        + (minutes as u64) * 60_000
        + (seconds as u64) * 1_000
        + (milliseconds as u64);

    let ticks = (total_ms * CFG_TICK_RATE_HZ as u64 / 1000) as OsTick;
    os_time_dly(ticks)
}

/// Current value of the shared tick counter.
#[inline]
pub fn os_time_get() -> OsTick {
    kernel::KERNEL.tick_get()
}

/// Entry point for an external periodic timer (spec §6 "Tick source").
/// Returns `true` if the port layer should request a context switch on
/// return from interrupt — informational only, since [`sched::process_tick`]
/// already triggers the switch itself once interrupt nesting unwinds.
pub fn os_tick_handler() -> bool {
    sched::process_tick()
}

/// SysTick interrupt handler, wired directly to the Cortex-M4 SysTick vector
/// by the linker (`#[no_mangle]`).
#[no_mangle]
pub extern "C" fn SysTick() {
    os_tick_handler();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmsm_rejects_out_of_range_fields() {
        assert_eq!(os_time_dly_hmsm(0, 60, 0, 0), Err(OsError::InvalidDelay));
        assert_eq!(os_time_dly_hmsm(0, 0, 60, 0), Err(OsError::InvalidDelay));
        assert_eq!(os_time_dly_hmsm(0, 0, 0, 1000), Err(OsError::InvalidDelay));
    }

    #[test]
    fn tick_get_reads_through_kernel_counter() {
        let before = os_time_get();
        assert!(before == kernel::KERNEL.tick_get());
    }
}
