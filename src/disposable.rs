//! Disposables: handles that release a resource or cancel pending work.
//!
//! Every handle in this module obeys one rule: `dispose` may be called any
//! number of times, from any number of threads, and the underlying resource is
//! released exactly once. Handles that hold other handles resolve races with a
//! single atomic state transition and release whatever that transition made
//! unreachable afterwards, outside of any internal lock.
//!
//! | Type | Role |
//! |------|------|
//! | `()` / [`empty`] | no-op handle |
//! | [`ActionDisposable`] | runs a closure once |
//! | [`BooleanDisposable`] | a shareable "disposed" flag |
//! | [`SingleAssignmentDisposable`] | assigned once, possibly after being disposed |
//! | [`SerialDisposable`] | replaceable slot, releases the previous handle |
//! | [`CompositeDisposable`] | growable group |
//! | [`BinaryDisposable`] / [`FixedCompositeDisposable`] | fixed groups |
//! | [`RefCountDisposable`] | released after the primary and every dependent |
//! | [`CancellationDisposable`] | signals a `futures` abort handle |
//! | [`ScheduledDisposable`] | releases its inner handle on a scheduler |
use std::{
  fmt::{Debug, Formatter},
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
};

use parking_lot::Mutex;

mod cancellation;
mod composite;
mod fixed;
mod ref_count;
mod scheduled;
mod serial;
mod single_assignment;
mod slots;

pub use cancellation::CancellationDisposable;
pub use composite::CompositeDisposable;
pub use fixed::{BinaryDisposable, FixedCompositeDisposable};
pub use ref_count::{RefCountDisposable, RefCountToken};
pub use scheduled::ScheduledDisposable;
pub use serial::SerialDisposable;
pub use single_assignment::SingleAssignmentDisposable;
pub use slots::{DisposableSlots, SlotId};

/// A handle whose `dispose` idempotently releases an associated resource.
pub trait Disposable {
  /// Release the resource. Repeated and concurrent calls are no-ops after the
  /// first one.
  fn dispose(&self);

  fn is_disposed(&self) -> bool;
}

/// Type-erased, thread-safe disposable.
///
/// Handles are control tokens that get stored in groups, slots and
/// subscriptions and released at an arbitrary later time, so they are owned
/// (`'static`) and shareable across threads.
pub type BoxedDisposable = Box<dyn Disposable + Send + Sync>;

/// The empty handle: disposing it does nothing and it always reports itself
/// as disposed.
impl Disposable for () {
  #[inline]
  fn dispose(&self) {}

  #[inline]
  fn is_disposed(&self) -> bool { true }
}

/// A boxed empty handle. `()` is zero-sized, so this does not allocate.
#[inline]
pub fn empty() -> BoxedDisposable { Box::new(()) }

impl<T: Disposable + ?Sized> Disposable for Box<T> {
  #[inline]
  fn dispose(&self) { (**self).dispose() }

  #[inline]
  fn is_disposed(&self) -> bool { (**self).is_disposed() }
}

impl<T: Disposable + ?Sized> Disposable for Arc<T> {
  #[inline]
  fn dispose(&self) { (**self).dispose() }

  #[inline]
  fn is_disposed(&self) -> bool { (**self).is_disposed() }
}

impl Debug for dyn Disposable + Send + Sync {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("dyn Disposable")
      .field("is_disposed", &self.is_disposed())
      .finish()
  }
}

/// Conversion into [`BoxedDisposable`].
pub trait IntoBoxedDisposable {
  fn into_boxed(self) -> BoxedDisposable;
}

impl<T: Disposable + Send + Sync + 'static> IntoBoxedDisposable for T {
  #[inline]
  fn into_boxed(self) -> BoxedDisposable { Box::new(self) }
}

/// Outcome of assigning a handle into a single-assignment or serial slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Assignment {
  /// The slot now holds the handle.
  Stored,
  /// The slot was already disposed, so the handle was released on the spot.
  ReleasedBecauseDisposed,
}

// ==================== ActionDisposable ====================

/// Runs a release action exactly once.
pub struct ActionDisposable<F> {
  action: Mutex<Option<F>>,
}

/// Create a disposable that runs `f` the first time it is disposed.
#[inline]
pub fn from_fn<F: FnOnce()>(f: F) -> ActionDisposable<F> { ActionDisposable::new(f) }

impl<F: FnOnce()> ActionDisposable<F> {
  pub fn new(action: F) -> Self { Self { action: Mutex::new(Some(action)) } }
}

impl<F: FnOnce()> Disposable for ActionDisposable<F> {
  fn dispose(&self) {
    // Take under the lock, run outside it: the action may dispose other
    // handles that lead back here.
    let action = self.action.lock().take();
    if let Some(action) = action {
      action();
    }
  }

  fn is_disposed(&self) -> bool { self.action.lock().is_none() }
}

// ==================== BooleanDisposable ====================

/// A disposable that only records whether it has been disposed. Clones share
/// the flag.
#[derive(Clone, Debug, Default)]
pub struct BooleanDisposable(Arc<AtomicBool>);

impl BooleanDisposable {
  pub fn new() -> Self { Self::default() }
}

impl Disposable for BooleanDisposable {
  #[inline]
  fn dispose(&self) { self.0.store(true, Ordering::Release); }

  #[inline]
  fn is_disposed(&self) -> bool { self.0.load(Ordering::Acquire) }
}

// ==================== DisposeGuard ====================

/// Extension to turn any disposable into an RAII guard.
pub trait DisposableExt: Disposable + Sized {
  /// Dispose automatically when the returned guard goes out of scope.
  ///
  /// **Attention:** if the return value is not bound to a variable, the
  /// handle is disposed immediately.
  fn dispose_on_drop(self) -> DisposeGuard<Self> { DisposeGuard::new(self) }
}

impl<T: Disposable> DisposableExt for T {}

/// An RAII implementation of a scoped disposable. When this structure is
/// dropped (falls out of scope), the handle is disposed.
///
/// If you want to drop it immediately, wrap it in its own scope.
#[derive(Debug)]
#[must_use]
pub struct DisposeGuard<T: Disposable>(T);

impl<T: Disposable> DisposeGuard<T> {
  pub fn new(disposable: T) -> DisposeGuard<T> { DisposeGuard(disposable) }

  pub fn get(&self) -> &T { &self.0 }
}

impl<T: Disposable> Drop for DisposeGuard<T> {
  #[inline]
  fn drop(&mut self) { self.0.dispose() }
}
