use std::{
  cell::RefCell,
  panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
};

use parking_lot::ReentrantMutex;

use super::Observer;
use crate::{
  disposable::{Assignment, Disposable, SingleAssignmentDisposable},
  error::RxError,
};

struct GuardInner<O> {
  // Reentrant so that a consumer may dispose its own subscription from inside
  // a callback; the `RefCell` then tells a nested callback apart from a
  // nested dispose.
  observer: ReentrantMutex<RefCell<Option<O>>>,
  upstream: SingleAssignmentDisposable,
  disposing: AtomicBool,
  // Set by a dispose nested inside `next`, which cannot take the borrowed
  // consumer itself. A dispose or terminal from another thread waits on the
  // lock and takes it on its own.
  take_after_callback: AtomicBool,
}

/// Wraps a consumer, owns its upstream subscription, and keeps the
/// notification grammar on its behalf.
///
/// - After `error`/`complete` is forwarded, or after `dispose`, nothing else
///   reaches the consumer and the upstream subscription is released once.
/// - A panic out of the consumer's `next` disposes the guard (releasing
///   upstream) before the panic continues.
/// - `dispose` returns only after any notification in flight on another
///   thread has finished.
/// - Notifications from different threads are delivered one at a time; a
///   nested notification from inside a callback panics with
///   [`RxError::ReentrantNotification`].
///
/// Clones share the guard.
pub struct AutoDetachObserver<O> {
  inner: Arc<GuardInner<O>>,
}

impl<O> Clone for AutoDetachObserver<O> {
  fn clone(&self) -> Self { AutoDetachObserver { inner: self.inner.clone() } }
}

fn reentrant() -> ! {
  rx_log!(error, "nested notification into an observer that is still running");
  panic!("{}", RxError::ReentrantNotification)
}

impl<O> AutoDetachObserver<O> {
  pub fn new(observer: O) -> Self {
    AutoDetachObserver {
      inner: Arc::new(GuardInner {
        observer: ReentrantMutex::new(RefCell::new(Some(observer))),
        upstream: SingleAssignmentDisposable::new(),
        disposing: AtomicBool::new(false),
        take_after_callback: AtomicBool::new(false),
      }),
    }
  }

  /// Hand the guard its upstream subscription once `subscribe` has produced
  /// it. A guard that already terminated releases `upstream` immediately.
  pub fn set_upstream<D>(&self, upstream: D) -> Result<Assignment, RxError>
  where
    D: Disposable + Send + Sync + 'static,
  {
    self.inner.upstream.assign(upstream)
  }

  /// Run a terminal notification: at most once, and never after `dispose`.
  fn terminate(&self, deliver: impl FnOnce(O)) {
    let inner = &*self.inner;
    if inner.disposing.swap(true, Ordering::AcqRel) {
      return;
    }
    let result = {
      let lock = inner.observer.lock();
      let observer = match lock.try_borrow_mut() {
        Ok(mut slot) => slot.take(),
        Err(_) => reentrant(),
      };
      // Delivered under the lock so a concurrent `dispose` waits for it.
      observer.map(|o| catch_unwind(AssertUnwindSafe(move || deliver(o))))
    };
    inner.upstream.dispose();
    if let Some(Err(payload)) = result {
      rx_log!(warn, "observer panicked in a terminal notification");
      resume_unwind(payload);
    }
  }
}

impl<Item, Err, O> Observer<Item, Err> for AutoDetachObserver<O>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) {
    let inner = &*self.inner;
    if inner.disposing.load(Ordering::Acquire) {
      return;
    }
    let lock = inner.observer.lock();
    // Re-checked under the lock: a dispose that won the race has taken, or is
    // about to take, the consumer.
    if inner.disposing.load(Ordering::Acquire) {
      return;
    }
    let Ok(mut slot) = lock.try_borrow_mut() else { reentrant() };
    let Some(observer) = slot.as_mut() else { return };
    let result = catch_unwind(AssertUnwindSafe(|| observer.next(value)));
    if inner.take_after_callback.load(Ordering::Acquire) {
      slot.take();
    }
    drop(slot);
    drop(lock);

    if let Err(payload) = result {
      rx_log!(warn, "observer panicked in next, detaching from upstream");
      self.dispose();
      resume_unwind(payload);
    }
  }

  fn error(self, err: Err) { self.terminate(|o| o.error(err)) }

  fn complete(self) { self.terminate(|o| o.complete()) }

  fn is_closed(&self) -> bool { self.inner.disposing.load(Ordering::Acquire) }
}

impl<O> Disposable for AutoDetachObserver<O> {
  fn dispose(&self) {
    let inner = &*self.inner;
    inner.disposing.store(true, Ordering::Release);
    let observer = {
      // Blocks until a notification running on another thread returns.
      let lock = inner.observer.lock();
      let taken = match lock.try_borrow_mut() {
        Ok(mut slot) => slot.take(),
        Err(_) => {
          inner.take_after_callback.store(true, Ordering::Release);
          None
        }
      };
      taken
    };
    drop(observer);
    inner.upstream.dispose();
  }

  fn is_disposed(&self) -> bool { self.inner.disposing.load(Ordering::Acquire) }
}
