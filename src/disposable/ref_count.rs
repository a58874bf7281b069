use std::sync::{
  atomic::{AtomicBool, AtomicUsize, Ordering},
  Arc,
};

use parking_lot::Mutex;

use super::{BoxedDisposable, Disposable};
use crate::error::RxError;

/// Low bit of the packed state: the primary has been disposed. The remaining
/// bits count live dependents.
const PRIMARY_DISPOSED: usize = 1;
const ONE_DEPENDENT: usize = 2;

struct Inner {
  state: AtomicUsize,
  resource: Mutex<Option<BoxedDisposable>>,
  strict: bool,
}

impl Inner {
  fn release_resource(&self) {
    let resource = self.resource.lock().take();
    if let Some(resource) = resource {
      rx_log!(trace, "ref-counted resource released");
      resource.dispose();
    }
  }

  fn try_add_dependent(&self) -> bool {
    let mut current = self.state.load(Ordering::Acquire);
    loop {
      if current & PRIMARY_DISPOSED != 0 {
        return false;
      }
      match self.state.compare_exchange_weak(
        current,
        current + ONE_DEPENDENT,
        Ordering::AcqRel,
        Ordering::Acquire,
      ) {
        Ok(_) => return true,
        Err(actual) => current = actual,
      }
    }
  }

  fn release_dependent(&self) {
    let previous = self.state.fetch_sub(ONE_DEPENDENT, Ordering::AcqRel);
    // The transition to "disposed, zero dependents" happens exactly once: no
    // dependent can be added once the primary bit is set.
    if previous - ONE_DEPENDENT == PRIMARY_DISPOSED {
      self.release_resource();
    }
  }

  fn dispose_primary(&self) {
    let previous = self.state.fetch_or(PRIMARY_DISPOSED, Ordering::AcqRel);
    if previous == 0 {
      self.release_resource();
    }
  }
}

/// A handle whose resource is released only after both the primary handle
/// and every dependent token have been disposed, in either order.
///
/// Dependents share the count and the resource slot, not the handle: the
/// primary may be disposed and dropped while tokens are still out, and the
/// last token to go releases the resource.
#[derive(Clone)]
pub struct RefCountDisposable {
  inner: Arc<Inner>,
}

impl RefCountDisposable {
  pub fn new<D>(resource: D) -> Self
  where
    D: Disposable + Send + Sync + 'static,
  {
    Self::with_mode(Box::new(resource), false)
  }

  /// Like `new`, but `try_acquire` on a disposed primary fails with
  /// [`RxError::ObjectDisposed`] instead of yielding an inert token.
  pub fn new_strict<D>(resource: D) -> Self
  where
    D: Disposable + Send + Sync + 'static,
  {
    Self::with_mode(Box::new(resource), true)
  }

  fn with_mode(resource: BoxedDisposable, strict: bool) -> Self {
    RefCountDisposable {
      inner: Arc::new(Inner {
        state: AtomicUsize::new(0),
        resource: Mutex::new(Some(resource)),
        strict,
      }),
    }
  }

  /// Hand out a dependent token. Once the primary is disposed the token is
  /// inert: it holds nothing back and disposing it does nothing.
  pub fn acquire(&self) -> RefCountToken {
    if self.inner.try_add_dependent() {
      RefCountToken::live(self.inner.clone())
    } else {
      RefCountToken::inert()
    }
  }

  /// `acquire`, reporting a disposed primary as an error when the handle was
  /// built with [`new_strict`](Self::new_strict).
  pub fn try_acquire(&self) -> Result<RefCountToken, RxError> {
    if self.inner.try_add_dependent() {
      Ok(RefCountToken::live(self.inner.clone()))
    } else if self.inner.strict {
      Err(RxError::ObjectDisposed)
    } else {
      Ok(RefCountToken::inert())
    }
  }

  /// Number of dependent tokens not yet disposed.
  pub fn dependents(&self) -> usize { self.inner.state.load(Ordering::Acquire) / ONE_DEPENDENT }

  pub fn is_primary_disposed(&self) -> bool {
    self.inner.state.load(Ordering::Acquire) & PRIMARY_DISPOSED != 0
  }

  /// Whether the wrapped resource itself has been released.
  pub fn is_resource_released(&self) -> bool { self.inner.resource.lock().is_none() }
}

impl Disposable for RefCountDisposable {
  #[inline]
  fn dispose(&self) { self.inner.dispose_primary() }

  /// Reports the primary's state; dependents may still hold the resource.
  #[inline]
  fn is_disposed(&self) -> bool { self.is_primary_disposed() }
}

/// A dependent of a [`RefCountDisposable`].
pub struct RefCountToken {
  owner: Option<Arc<Inner>>,
  disposed: AtomicBool,
}

impl RefCountToken {
  fn live(owner: Arc<Inner>) -> Self { Self { owner: Some(owner), disposed: AtomicBool::new(false) } }

  fn inert() -> Self { Self { owner: None, disposed: AtomicBool::new(true) } }
}

impl Disposable for RefCountToken {
  fn dispose(&self) {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return;
    }
    if let Some(owner) = &self.owner {
      owner.release_dependent();
    }
  }

  fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}
