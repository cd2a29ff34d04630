//! Core type definitions for the Corvus microkernel

/// Task priority. 0 is the lowest priority (reserved for the idle tasks);
/// `CFG_MAX_PRIORITIES - 1` is the highest.
pub type OsPrio = u8;

/// Tick counter type. Wraps at `u32::MAX`; the scheduler's two-list delayed
/// queue cycle is what makes that wraparound safe.
pub type OsTick = u32;

/// Semaphore counter type.
pub type OsSemCtr = u32;

/// Nesting counter (interrupt nesting, scheduler lock nesting, mutex nesting).
pub type OsNestingCtr = u8;

/// Option flags for API calls.
pub type OsOpt = u16;

/// Object quantity type (queue capacities and similar small counts).
pub type OsObjQty = u16;

/// Stack element type (machine word).
pub type OsStkElement = u32;

/// Message size, in bytes, for a single queue message.
pub type OsMsgSize = u16;

/// Dense small-integer task identifier.
pub type Tid = u32;

/// Core index.
pub type CoreId = u8;

/// Sentinel affinity value meaning "runs on any core".
pub const NO_AFFINITY: CoreId = CoreId::MAX;

/// Task lifecycle state, per the scheduler's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OsTaskState {
    /// Currently executing on a core.
    Running = 0,
    /// On the ready list at its priority.
    Ready = 1,
    /// On the delayed list, `wakeup_tick` set.
    Delayed = 2,
    /// On the suspended list, no timeout.
    Suspended = 3,
    /// Made ready while the local core's scheduler was suspended.
    PendingReady = 4,
    /// Removed by the scheduler; idle must still reclaim resources.
    PendingDeletion = 5,
    /// Safe for inline reclamation.
    ReadyToDelete = 6,
    /// Blocked on an IPC object (queue/semaphore/mutex), no timeout.
    Pend = 7,
    /// Blocked on an IPC object with a timeout armed.
    PendTimeout = 8,
}

/// What kind of IPC object a task is blocked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OsPendOn {
    Nothing = 0,
    Mutex = 1,
    Queue = 2,
    Semaphore = 3,
    Join = 4,
}

/// Outcome of a pend (wait) operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OsPendStatus {
    /// Pend succeeded.
    Ok = 0,
    /// Timeout elapsed before the event occurred.
    Timeout = 1,
    /// The awaited object was destroyed while pending.
    ResourceDestroyed = 2,
}

/// Kernel object type marker, used for defensive type checks on raw pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum OsObjType {
    None = 0,
    Mutex = 0x4D555458,  // 'MUTX'
    Queue = 0x51554555,  // 'QUEU'
    Sem = 0x53454D41,    // 'SEMA'
    Task = 0x5441534B,   // 'TASK'
}

/// Option flag constants for API calls.
pub mod opt {
    use super::OsOpt;

    pub const NONE: OsOpt = 0x0000;

    /// Non-blocking pend: return `WouldBlock` instead of suspending.
    pub const PEND_NON_BLOCKING: OsOpt = 0x8000;

    /// Skip the scheduling point after a post (used from within a critical
    /// section that will call into the scheduler explicitly afterwards).
    pub const POST_NO_SCHED: OsOpt = 0x8000;
}
