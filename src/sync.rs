//! Asynchronous mutual exclusion and serialized execution.
//!
//! Nothing here blocks a thread while waiting. [`AsyncGate`] and
//! [`AsyncMutex`] park the waiting task and wake it when the gate is handed
//! over. [`AsyncQueueLock`] and [`FutureQueueLock`] never wait at all: a
//! submitter that finds the queue busy leaves its action behind and returns,
//! and whoever is draining runs it.
//!
//! Reentrancy of [`AsyncMutex`] is tracked per [`CallChain`], a token the
//! caller passes down explicitly, because a logical call chain may hop
//! between threads across `.await` points.

mod gate;
mod mutex;
mod queue_lock;

pub use gate::{AsyncGate, GateAcquire, GatePermit};
pub use mutex::{AsyncMutex, AsyncMutexGuard, CallChain};
pub use queue_lock::{AsyncQueueLock, FutureQueueLock, Submission};
