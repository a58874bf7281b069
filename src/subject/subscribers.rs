use std::{
  cell::RefCell,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
};

use parking_lot::ReentrantMutex;

use crate::{
  disposable::{Disposable, DisposableSlots, SlotId},
  observer::{BoxedObserver, Observer},
};

/// One subscribed observer.
///
/// The observer sits behind a reentrant lock so that a callback may still
/// reach its own entry (to unsubscribe, say) while a second thread that wants
/// to detach it waits for the notification in flight to finish.
pub(crate) struct Entry<Item, Err> {
  observer: ReentrantMutex<RefCell<Option<BoxedObserver<Item, Err>>>>,
  detached: AtomicBool,
}

impl<Item, Err> Entry<Item, Err> {
  pub(crate) fn new(observer: BoxedObserver<Item, Err>) -> Self {
    Entry {
      observer: ReentrantMutex::new(RefCell::new(Some(observer))),
      detached: AtomicBool::new(false),
    }
  }

  fn next(&self, value: Item) {
    if self.detached.load(Ordering::Acquire) {
      return;
    }
    let slot = self.observer.lock();
    let Ok(mut observer) = slot.try_borrow_mut() else { reentrant() };
    if let Some(o) = observer.as_mut() {
      o.next(value);
    }
    // Unsubscribed from inside its own callback.
    let finished = if self.detached.load(Ordering::Acquire) { observer.take() } else { None };
    drop(observer);
    drop(slot);
    drop(finished);
  }

  pub(crate) fn terminate(&self, deliver: impl FnOnce(BoxedObserver<Item, Err>)) {
    let slot = self.observer.lock();
    let Ok(mut observer) = slot.try_borrow_mut() else { reentrant() };
    if let Some(o) = observer.take() {
      self.detached.store(true, Ordering::Release);
      deliver(o);
    }
  }
}

impl<Item, Err> Disposable for Entry<Item, Err> {
  fn dispose(&self) {
    self.detached.store(true, Ordering::Release);
    // Waits for a notification in flight on another thread; on this thread
    // the borrow fails and `next` drops the observer once it returns.
    let slot = self.observer.lock();
    let observer = slot.try_borrow_mut().ok().and_then(|mut o| o.take());
    drop(slot);
    drop(observer);
  }

  #[inline]
  fn is_disposed(&self) -> bool { self.detached.load(Ordering::Acquire) }
}

#[cold]
fn reentrant() -> ! {
  panic!(
    "re-entrant Subject emissions are not supported (next/error/complete). Serialize producers \
     through an AsyncQueueLock if you need feedback loops."
  );
}

/// Immutable membership snapshot of a [`Subject`](super::Subject).
///
/// A subscribe or unsubscribe never edits a published snapshot: it clones it,
/// edits the copy with `with` / `without`, and swaps the copy in. Emission
/// walks whichever snapshot it loaded, unaffected by membership changes that
/// happen meanwhile.
pub(crate) struct Subscribers<Item, Err> {
  inner: DisposableSlots<Arc<Entry<Item, Err>>>,
}

impl<Item, Err> Default for Subscribers<Item, Err> {
  fn default() -> Self { Self { inner: DisposableSlots::default() } }
}

impl<Item, Err> Subscribers<Item, Err> {
  /// A copy with `entry` added, and the id it was added under.
  pub(crate) fn with(&self, entry: Arc<Entry<Item, Err>>) -> (Self, SlotId) {
    let mut inner = self.inner.clone();
    let id = inner.add(entry);
    (Subscribers { inner }, id)
  }

  /// A copy without `id`, or `None` if `id` is not a member.
  pub(crate) fn without(&self, id: SlotId) -> Option<(Self, Arc<Entry<Item, Err>>)> {
    if !self.inner.contains(id) {
      return None;
    }
    let mut inner = self.inner.clone();
    let entry = inner.remove(id)?;
    Some((Subscribers { inner }, entry))
  }

  #[inline]
  pub(crate) fn len(&self) -> usize { self.inner.len() }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool { self.inner.is_empty() }

  /// Detach every member without notifying it.
  pub(crate) fn detach_all(&self) {
    for entry in self.inner.iter() {
      entry.dispose();
    }
  }

  /// Send `value` to every member: n-1 clones and one move.
  pub(crate) fn broadcast_value(&self, value: Item)
  where
    Item: Clone,
  {
    let mut iter = self.inner.iter().peekable();
    while let Some(entry) = iter.next() {
      if iter.peek().is_some() {
        entry.next(value.clone());
      } else {
        entry.next(value);
        break;
      }
    }
  }

  pub(crate) fn broadcast_error(&self, err: Err)
  where
    Err: Clone,
  {
    let mut iter = self.inner.iter().peekable();
    while let Some(entry) = iter.next() {
      if iter.peek().is_some() {
        let err = err.clone();
        entry.terminate(move |o| o.error(err));
      } else {
        entry.terminate(move |o| o.error(err));
        break;
      }
    }
  }

  pub(crate) fn broadcast_complete(&self) {
    for entry in self.inner.iter() {
      entry.terminate(|o| o.complete());
    }
  }
}

impl<Item, Err> Clone for Subscribers<Item, Err> {
  fn clone(&self) -> Self { Subscribers { inner: self.inner.clone() } }
}
