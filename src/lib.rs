//! # rxcore: the concurrency core of push-based reactive streams
//!
//! Producers push values to consumers under a strict grammar (any number of
//! `next`, then at most one `error` or `complete`), and every subscription
//! hands back a handle that cancels it. This crate is the substrate such a
//! library is built on. It knows nothing of operators.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxcore::prelude::*;
//!
//! let log = Arc::new(Mutex::new(vec![]));
//! let source = observable::create(|mut emitter: Emitter<i32, ()>| {
//!   emitter.next(1);
//!   emitter.next(2);
//!   emitter.complete();
//! });
//!
//! let l = log.clone();
//! let subscription = source
//!   .subscribe(observer::from_fns(move |v: i32| l.lock().unwrap().push(v), |_: ()| {}, || {}))
//!   .unwrap();
//! assert!(subscription.is_disposed());
//! assert_eq!(*log.lock().unwrap(), vec![1, 2]);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Disposable`] | Idempotent, thread-safe release handle; the disposable algebra lives beside it |
//! | [`AutoDetachObserver`] | Keeps the notification grammar for a consumer and detaches upstream on termination |
//! | [`AsyncMutex`] / [`AsyncQueueLock`] | Mutual exclusion and serialized execution that never block a thread |
//! | [`Subject`] | Multicast hub with copy-on-write membership |
//!
//! ## Feature Flags
//!
//! - **`tracing`** (default): emit diagnostics through the `tracing` crate
//!
//! [`Disposable`]: disposable::Disposable
//! [`AutoDetachObserver`]: observer::AutoDetachObserver
//! [`AsyncMutex`]: sync::AsyncMutex
//! [`AsyncQueueLock`]: sync::AsyncQueueLock
//! [`Subject`]: subject::Subject

#[macro_use]
mod log;

pub mod disposable;
pub mod error;
pub mod observable;
pub mod observer;
pub mod prelude;
pub mod scheduler;
pub mod subject;
pub mod sync;

pub use prelude::*;

pub use crate::scheduler::{Duration, Instant};

#[cfg(doctest)]
mod __markdown_doctests {
  mod readme {
    #![doc = include_str!("../README.md")]
  }
}
