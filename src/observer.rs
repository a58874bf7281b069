//! Observer trait and implementations
//!
//! The Observer trait defines the consumer of data in the reactive pattern.
//! It provides three methods: next (for values), error (for errors), and
//! complete (for stream completion). The grammar is zero or more `next`
//! followed by at most one of `error`/`complete`; `error` and `complete` take
//! `self` so a terminated observer cannot be reused by construction.
//!
//! Two wrappers enforce the grammar at runtime, where ownership alone cannot:
//!
//! - [`CheckedObserver`] rejects overlapping and post-terminal notifications
//!   with an explicit error.
//! - [`AutoDetachObserver`] owns the upstream subscription, serializes
//!   delivery, and detaches from upstream on termination, disposal or a
//!   consumer panic.

use std::convert::Infallible;

mod auto_detach;
mod checked;

pub use auto_detach::AutoDetachObserver;
pub use checked::{CheckedObserver, ObserverState};

// ============================================================================
// Observer Trait
// ============================================================================

/// Observer trait: The consumer of data in reactive programming
pub trait Observer<Item, Err> {
  /// Receive the next value from the observable
  fn next(&mut self, value: Item);

  /// Handle an error from the observable
  ///
  /// This consumes the observer, as no more values can be emitted after an
  /// error
  fn error(self, err: Err);

  /// Handle completion of the observable
  ///
  /// This consumes the observer, as no more values can be emitted after
  /// completion
  fn complete(self);

  /// Returns `true` if the observer is closed and will not accept more values.
  ///
  /// Sources use it to stop producing early.
  fn is_closed(&self) -> bool;
}

// ============================================================================
// DynObserver Trait - Object-safe Observer
// ============================================================================

/// Helper trait to enable object-safe Observers (Box<dyn Observer>)
///
/// Standard Observer trait is not object-safe because methods take `self` by
/// value. DynObserver mirrors the interface but adapts it for vtables.
pub trait DynObserver<Item, Err> {
  fn box_next(&mut self, value: Item);
  fn box_error(self: Box<Self>, err: Err);
  fn box_complete(self: Box<Self>);
  fn box_is_closed(&self) -> bool;
}

impl<T, Item, Err> DynObserver<Item, Err> for T
where
  T: Observer<Item, Err>,
{
  fn box_next(&mut self, value: Item) { self.next(value); }
  fn box_error(self: Box<Self>, err: Err) { self.error(err); }
  fn box_complete(self: Box<Self>) { self.complete(); }
  fn box_is_closed(&self) -> bool { self.is_closed() }
}

/// Boxed observer that can be handed across threads.
pub type BoxedObserver<Item, Err> = Box<dyn DynObserver<Item, Err> + Send>;

impl<'a, Item, Err> Observer<Item, Err> for Box<dyn DynObserver<Item, Err> + Send + 'a> {
  #[inline]
  fn next(&mut self, value: Item) { (**self).box_next(value) }

  #[inline]
  fn error(self, err: Err) { self.box_error(err) }

  #[inline]
  fn complete(self) { self.box_complete() }

  #[inline]
  fn is_closed(&self) -> bool { (**self).box_is_closed() }
}

/// Helper trait to convert observers into [`BoxedObserver`].
pub trait IntoBoxedObserver<Item, Err> {
  fn into_boxed(self) -> BoxedObserver<Item, Err>;
}

impl<Item, Err, O> IntoBoxedObserver<Item, Err> for O
where
  O: Observer<Item, Err> + Send + 'static,
{
  fn into_boxed(self) -> BoxedObserver<Item, Err> { Box::new(self) }
}

// ============================================================================
// Closure adapters
// ============================================================================

/// Closure observer for infallible streams
///
/// The closure becomes the `next` handler; completion is ignored.
#[derive(Clone)]
pub struct FnMutObserver<F>(pub F);

impl<F, Item> Observer<Item, Infallible> for FnMutObserver<F>
where
  F: FnMut(Item),
{
  #[inline]
  fn next(&mut self, v: Item) { (self.0)(v); }

  #[inline]
  fn error(self, _err: Infallible) {}

  #[inline]
  fn complete(self) {}

  #[inline]
  fn is_closed(&self) -> bool { false }
}

/// Observer assembled from one closure per notification kind.
pub struct FnObserver<N, E, C> {
  next: N,
  error: E,
  complete: C,
}

/// Build an observer from `next`, `error` and `complete` handlers.
pub fn from_fns<N, E, C>(next: N, error: E, complete: C) -> FnObserver<N, E, C> {
  FnObserver { next, error, complete }
}

impl<Item, Err, N, E, C> Observer<Item, Err> for FnObserver<N, E, C>
where
  N: FnMut(Item),
  E: FnOnce(Err),
  C: FnOnce(),
{
  #[inline]
  fn next(&mut self, value: Item) { (self.next)(value) }

  #[inline]
  fn error(self, err: Err) { (self.error)(err) }

  #[inline]
  fn complete(self) { (self.complete)() }

  #[inline]
  fn is_closed(&self) -> bool { false }
}

/// Option observer - None ignores all events, Some delegates to inner
impl<O, Item, Err> Observer<Item, Err> for Option<O>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) {
    if let Some(inner) = self {
      inner.next(value);
    }
  }

  fn error(self, err: Err) {
    if let Some(inner) = self {
      inner.error(err);
    }
  }

  fn complete(self) {
    if let Some(inner) = self {
      inner.complete();
    }
  }

  fn is_closed(&self) -> bool { self.as_ref().is_none_or(Observer::is_closed) }
}

#[cfg(test)]
pub(crate) mod test_util {
  use std::sync::Arc;

  use parking_lot::Mutex;

  use super::Observer;

  #[derive(Clone, Debug, PartialEq, Eq)]
  pub enum Event<Item, Err> {
    Next(Item),
    Error(Err),
    Complete,
  }

  /// Records every notification it receives. Clones share the log.
  pub struct Recorder<Item, Err> {
    pub events: Arc<Mutex<Vec<Event<Item, Err>>>>,
  }

  impl<Item, Err> Recorder<Item, Err> {
    pub fn new() -> Self { Recorder { events: Arc::new(Mutex::new(vec![])) } }

    pub fn events(&self) -> Vec<Event<Item, Err>>
    where
      Item: Clone,
      Err: Clone,
    {
      self.events.lock().clone()
    }
  }

  impl<Item, Err> Clone for Recorder<Item, Err> {
    fn clone(&self) -> Self { Recorder { events: self.events.clone() } }
  }

  impl<Item, Err> Observer<Item, Err> for Recorder<Item, Err> {
    fn next(&mut self, value: Item) { self.events.lock().push(Event::Next(value)); }

    fn error(self, err: Err) { self.events.lock().push(Event::Error(err)); }

    fn complete(self) { self.events.lock().push(Event::Complete); }

    fn is_closed(&self) -> bool { false }
  }
}
