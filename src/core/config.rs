//! Compile-time configuration for the Corvus microkernel
//!
//! These constants control the behavior and resource limits of the kernel.
//! All are compile-time `const` items, matching an embedded kernel core with
//! no runtime configuration surface.

/// Maximum number of priority levels. Must be a multiple of 32 (bitmap word
/// width). Priority 0 is reserved for the per-core idle task and is the
/// *lowest* priority; `CFG_MAX_PRIORITIES - 1` is the highest.
pub const CFG_MAX_PRIORITIES: usize = 64;

/// Number of CPU cores the scheduler dispatches across.
pub const CFG_N_CORES: usize = 2;

/// Number of thread-local storage slots per task.
pub const CFG_N_TLS_SLOTS: usize = 4;

/// Maximum bytes of a task name, NUL included.
pub const CFG_MAX_TASK_NAME: usize = 16;

/// Upper bound on message queue capacity.
pub const CFG_MAX_QUEUE_SIZE: usize = 64;

/// First slab size for the message pool; grows geometrically from here.
pub const CFG_MSG_POOL_INITIAL_SIZE: usize = 8;

/// Idle task stack size, in machine words.
pub const CFG_IDLE_STACK_SIZE: usize = 128;

/// Priority reserved for the per-core idle tasks.
pub const CFG_IDLE_PRIORITY: u8 = 0;

/// First tid table capacity; doubles on exhaustion.
pub const CFG_TID_TABLE_INITIAL_SIZE: usize = 16;

/// System tick rate in Hz.
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Default time quanta (in ticks) for round-robin scheduling.
pub const CFG_TIME_QUANTA_DEFAULT: u32 = 10;

/// Minimum task stack size, in machine words.
pub const CFG_STK_SIZE_MIN: usize = 64;

/// Enable round-robin scheduling for same-priority tasks.
pub const CFG_SCHED_ROUND_ROBIN_EN: bool = true;

const _: () = assert!(CFG_MAX_PRIORITIES % 32 == 0, "CFG_MAX_PRIORITIES must be a multiple of 32");
const _: () = assert!(CFG_N_CORES > 0, "CFG_N_CORES must be at least 1");
