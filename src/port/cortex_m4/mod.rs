//! Cortex-M4 port implementation (single-core reference backend)
//!
//! Provides context switching via the PendSV exception handler, adapted from
//! the teacher's port. This crate's scheduler is generalized to `N_CORES`
//! cores, but this concrete backend targets real Cortex-M4 silicon, which
//! has exactly one core — so it always acts as core 0. A true dual-core
//! target (the Xtensa SMP part this kernel was originally designed for)
//! would supply a second backend wiring `yield_other_core` to a real IPI;
//! that backend is outside this crate's scope (spec §1), so here it is a
//! no-op.

#![allow(named_asm_labels)]

use core::arch::{asm, naked_asm};
use core::ptr::NonNull;

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;

use crate::task::OsTaskFn;
use crate::types::{CoreId, OsOpt, OsStkElement};

/// Interrupt stack for MSP.
#[no_mangle]
static mut INTERRUPT_STACK: [u64; 256] = [0xDEADBEEF_DEADBEEF; 256];

/// Raw TCB pointer pair driving the PendSV asm. Synchronized with
/// `kernel::CoreState[0]` by [`os_ctx_sw`]/[`pendsv_switch_context`] — the
/// naked handler below needs plain statics it can name with `sym`, not an
/// indexed array element.
#[repr(C)]
struct Core0Regs {
    tcb_cur: *mut u8,
    tcb_high_rdy: *mut u8,
}

#[no_mangle]
static mut CORE0_REGS: Core0Regs = Core0Regs { tcb_cur: core::ptr::null_mut(), tcb_high_rdy: core::ptr::null_mut() };

pub fn core_id() -> CoreId {
    0
}

/// No-op: a single Cortex-M4 core has no other core to IPI.
pub fn yield_other_core(_core: CoreId) {}

/// Unwind `start_scheduler` (spec §6 port table `end_scheduler`). Disables
/// the tick and PendSV exceptions; does not rewind to whatever non-kernel
/// code called `os_start_high_rdy`, since that call never returns on real
/// hardware either — this only stops further dispatch.
pub fn end_scheduler() {
    unsafe {
        let mut scb = cortex_m::Peripherals::steal().SCB;
        scb.set_priority(SystemHandler::SysTick, 0xF0);
    }
    cortex_m::peripheral::SCB::clear_pendsv();
}

/// Initialize SysTick for the system tick rate.
///
/// `reload` is the timer reload value, e.g. `core_clock_hz / CFG_TICK_RATE_HZ`.
pub fn os_cpu_systick_init(reload: u32) {
    let mut p = unsafe { cortex_m::Peripherals::steal() };
    p.SYST.set_reload(reload - 1);
    p.SYST.clear_current();
    p.SYST.set_clock_source(SystClkSource::Core);
    p.SYST.enable_interrupt();
    p.SYST.enable_counter();
}

/// Start the highest priority ready task on this core. Never returns.
#[no_mangle]
pub unsafe extern "C" fn os_start_high_rdy() -> ! {
    unsafe {
        let mut scb = cortex_m::Peripherals::steal().SCB;
        scb.set_priority(SystemHandler::PendSV, 0xF0);
        scb.set_priority(SystemHandler::SysTick, 0xF0);

        let msp_top = &INTERRUPT_STACK as *const _ as u32
            + core::mem::size_of_val(&INTERRUPT_STACK) as u32;
        asm!("msr msp, {0}", in(reg) msp_top);
        asm!("msr psp, {0}", in(reg) 0);

        CORE0_REGS.tcb_cur = core::ptr::null_mut();

        cortex_m::interrupt::enable();
        cortex_m::peripheral::SCB::set_pendsv();
    }
    loop {
        cortex_m::asm::wfi();
    }
}

/// Synchronize the asm-visible register pair from the generalized per-core
/// state before requesting a PendSV.
fn sync_core0_regs_in() {
    use crate::core::kernel::core_state;
    let state = unsafe { core_state(0) };
    unsafe {
        CORE0_REGS.tcb_cur = state.tcb_cur.map_or(core::ptr::null_mut(), |p| p.as_ptr() as *mut u8);
        CORE0_REGS.tcb_high_rdy = state.tcb_high_rdy.map_or(core::ptr::null_mut(), |p| p.as_ptr() as *mut u8);
    }
}

#[inline(always)]
pub fn os_ctx_sw() {
    sync_core0_regs_in();
    cortex_m::peripheral::SCB::set_pendsv();
}

#[inline(always)]
pub fn os_int_ctx_sw() {
    sync_core0_regs_in();
    cortex_m::peripheral::SCB::set_pendsv();
}

#[repr(C, align(4))]
struct UcStk {
    r4: u32,
    r5: u32,
    r6: u32,
    r7: u32,
    r8: u32,
    r9: u32,
    r10: u32,
    r11: u32,
    exc_return: u32,
    r0: u32,
    r1: u32,
    r2: u32,
    r3: u32,
    r12: u32,
    lr: u32,
    pc: u32,
    xpsr: u32,
}
const CONTEXT_STACK_SIZE: usize = 17;

pub unsafe fn os_task_stk_init(
    task_fn: OsTaskFn,
    arg: *mut (),
    stk_base: *mut OsStkElement,
    stk_size: usize,
    _opt: OsOpt,
) -> *mut OsStkElement {
    unsafe {
        let stk_top = stk_base.add(stk_size);
        let stk_aligned = ((stk_top as usize) & !7) as *mut u32;
        let frame_ptr = stk_aligned.sub(CONTEXT_STACK_SIZE) as *mut UcStk;

        (*frame_ptr) = UcStk {
            r4: 0x04040404,
            r5: 0x05050505,
            r6: 0x06060606,
            r7: 0x07070707,
            r8: 0x08080808,
            r9: 0x09090909,
            r10: 0x10101010,
            r11: 0x11111111,
            exc_return: 0xFFFF_FFFD,
            r0: arg as u32,
            r1: 0,
            r2: 0,
            r3: 0,
            r12: 0,
            lr: os_task_return as *const () as u32,
            pc: (task_fn as usize as u32) | 1,
            xpsr: 0x0100_0000,
        };

        (frame_ptr as *mut u32).sub(1) as *mut OsStkElement
    }
}

/// Called from PendSV to perform the TCB pointer swap and hand back the new
/// task's saved stack pointer.
#[inline(never)]
#[no_mangle]
unsafe extern "C" fn pendsv_switch_context(cur_sp: *mut u32) -> *mut u32 {
    use crate::core::kernel::{core_state, OsTcb};

    unsafe {
        let state = core_state(0);
        if let Some(cur) = state.tcb_cur {
            (*cur.as_ptr()).stk_ptr = cur_sp;
        }
        state.tcb_cur = state.tcb_high_rdy;

        CORE0_REGS.tcb_cur = CORE0_REGS.tcb_high_rdy;

        match state.tcb_cur {
            Some(new_tcb) => {
                let tcb_ref: &OsTcb = new_tcb.as_ref();
                tcb_ref.stk_ptr
            }
            None => core::ptr::null_mut(),
        }
    }
}

#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid i",
        "dsb",
        "isb",

        "mrs r0, psp",

        "ldr r1, ={core0_regs}",
        "ldr r1, [r1]",
        "cbz r1, 1f",

        "stmdb r0!, {{r4-r11, lr}}",
        "sub r0, r0, #4",

        "1:",
        "bl pendsv_switch_context",

        "cbz r0, 2f",
        "add r0, r0, #4",
        "ldmia r0!, {{r4-r11, lr}}",
        "msr psp, r0",

        "2:",
        "cpsie i",
        "dsb",
        "isb",
        "bx lr",

        core0_regs = sym CORE0_REGS,
    );
}

fn os_task_sw_hook() {}

fn os_task_return() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

#[allow(dead_code)]
fn use_hook_to_silence_unused() -> fn() {
    os_task_sw_hook
}

type _AssertNonNullUsed = Option<NonNull<u8>>;
