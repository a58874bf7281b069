use std::{
  future::Future,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
};

use futures::future::{AbortHandle, AbortRegistration, Abortable};

use super::Disposable;

struct Inner {
  handle: AbortHandle,
  cancelled: AtomicBool,
}

/// Bridges a `futures` abort signal to [`Disposable`]: disposing aborts the
/// linked future. Signalling is idempotent.
#[derive(Clone)]
pub struct CancellationDisposable {
  inner: Arc<Inner>,
}

impl CancellationDisposable {
  /// A fresh signal source plus the registration a future is made abortable
  /// with.
  pub fn new() -> (Self, AbortRegistration) {
    let (handle, registration) = AbortHandle::new_pair();
    (Self::from_handle(handle), registration)
  }

  pub fn from_handle(handle: AbortHandle) -> Self {
    CancellationDisposable { inner: Arc::new(Inner { handle, cancelled: AtomicBool::new(false) }) }
  }

  /// Wrap `fut` so that disposing the returned handle aborts it.
  pub fn abortable<F: Future>(fut: F) -> (Self, Abortable<F>) {
    let (this, registration) = Self::new();
    (this, Abortable::new(fut, registration))
  }

  pub fn is_cancelled(&self) -> bool { self.inner.cancelled.load(Ordering::Acquire) }
}

impl Disposable for CancellationDisposable {
  fn dispose(&self) {
    if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
      self.inner.handle.abort();
    }
  }

  #[inline]
  fn is_disposed(&self) -> bool { self.is_cancelled() }
}
