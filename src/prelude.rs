//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.
//! The two `into_boxed` conversion traits are not included; import the one
//! you need from `disposable` or `observer`.

// Modules, for `observable::create` and `observer::from_fns`
pub use crate::{disposable, observable, observer};
// Disposable algebra
pub use crate::disposable::{
  BinaryDisposable, BooleanDisposable, BoxedDisposable, CancellationDisposable,
  CompositeDisposable, Disposable, DisposableExt, FixedCompositeDisposable, RefCountDisposable,
  ScheduledDisposable, SerialDisposable, SingleAssignmentDisposable,
};
// Errors
pub use crate::error::RxError;
// Core traits
pub use crate::observable::{Emitter, Observable};
pub use crate::observer::{AutoDetachObserver, BoxedObserver, CheckedObserver, Observer};
// Scheduler
pub use crate::scheduler::Scheduler;
// Subject
pub use crate::subject::{Subject, SubjectSubscription};
// Async exclusion
pub use crate::sync::{AsyncGate, AsyncMutex, AsyncQueueLock, CallChain, FutureQueueLock};
