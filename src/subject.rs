//! Multicast hub: an observer and an observable at once.
//!
//! Notifications pushed into a [`Subject`] are fanned out to whoever is
//! subscribed at that moment.
//!
//! ## Membership
//!
//! The hub state is one atomically swapped pointer to an immutable value:
//! `Active(snapshot)`, `Done(error)` or `Disposed`. Subscribe, unsubscribe and
//! the terminal transition all read the current value, build the next one and
//! compare-and-swap it in, retrying on conflict. Emission iterates the
//! snapshot it loaded, so a subscriber added mid-emission only sees the next
//! value and one removed mid-emission may still see the current one.
//!
//! ## Re-Entrancy Policy
//!
//! - **Emissions are not re-entrant.** Calling `next`/`error`/`complete` on a
//!   `Subject` from inside a callback it is currently delivering panics.
//! - **Membership changes are allowed** from inside callbacks. An observer may
//!   unsubscribe itself; it receives nothing after the current callback.
//! - Producers on different threads are not serialized against each other.
//!   Route them through an [`AsyncQueueLock`](crate::sync::AsyncQueueLock)
//!   when ordering across producers matters.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxcore::prelude::*;
//!
//! let subject = Subject::<i32, ()>::new();
//! let seen = Arc::new(Mutex::new(vec![]));
//! let s = seen.clone();
//! let _sub = subject
//!   .subscribe(observer::from_fns(move |v: i32| s.lock().unwrap().push(v), |_: ()| {}, || {}))
//!   .unwrap();
//!
//! subject.clone().next(1);
//! subject.clone().next(2);
//! subject.clone().complete();
//! assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
//! ```

use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};

use crate::{
  disposable::Disposable,
  error::RxError,
  observable::Observable,
  observer::{IntoBoxedObserver, Observer},
};

mod subject_subscription;
mod subscribers;

pub use subject_subscription::SubjectSubscription;
use subscribers::{Entry, Subscribers};

pub(crate) enum HubState<Item, Err> {
  Active(Subscribers<Item, Err>),
  Done(Option<Err>),
  Disposed,
}

pub(crate) struct Hub<Item, Err> {
  state: ArcSwap<HubState<Item, Err>>,
}

impl<Item, Err> Hub<Item, Err> {
  /// Publish `next` if the state is still `current`; otherwise hand back the
  /// state that won.
  fn swap_from(
    &self, current: &Arc<HubState<Item, Err>>, next: HubState<Item, Err>,
  ) -> Result<(), Arc<HubState<Item, Err>>> {
    let previous = self.state.compare_and_swap(current, Arc::new(next));
    if Arc::ptr_eq(&previous, current) {
      Ok(())
    } else {
      Err(Guard::into_inner(previous))
    }
  }

  fn remove(&self, id: usize) -> Option<Arc<Entry<Item, Err>>> {
    let mut current = self.state.load_full();
    loop {
      let HubState::Active(members) = &*current else { return None };
      let (rest, entry) = members.without(id)?;
      match self.swap_from(&current, HubState::Active(rest)) {
        Ok(()) => return Some(entry),
        Err(actual) => current = actual,
      }
    }
  }

  fn stop(&self, err: Option<Err>)
  where
    Err: Clone,
  {
    let mut current = self.state.load_full();
    loop {
      let HubState::Active(members) = &*current else { return };
      match self.swap_from(&current, HubState::Done(err.clone())) {
        Ok(()) => {
          rx_log!(debug, observers = members.len(), failed = err.is_some(), "subject stopped");
          match err {
            Some(err) => members.broadcast_error(err),
            None => members.broadcast_complete(),
          }
          return;
        }
        Err(actual) => current = actual,
      }
    }
  }
}

/// A hot multicast source that is fed by calling its [`Observer`] methods.
///
/// Clones share one hub. Because `error` and `complete` consume the observer,
/// call them on a clone (`subject.clone().complete()`) to keep a handle.
pub struct Subject<Item, Err> {
  hub: Arc<Hub<Item, Err>>,
}

impl<Item, Err> Clone for Subject<Item, Err> {
  fn clone(&self) -> Self { Subject { hub: self.hub.clone() } }
}

impl<Item, Err> Default for Subject<Item, Err> {
  fn default() -> Self {
    let state = ArcSwap::from_pointee(HubState::Active(Subscribers::default()));
    Subject { hub: Arc::new(Hub { state }) }
  }
}

impl<Item, Err> Subject<Item, Err> {
  pub fn new() -> Self { Self::default() }

  /// Number of observers currently subscribed.
  pub fn observer_count(&self) -> usize {
    match &**self.hub.state.load() {
      HubState::Active(members) => members.len(),
      HubState::Done(_) | HubState::Disposed => 0,
    }
  }

  #[inline]
  pub fn has_observers(&self) -> bool { self.observer_count() > 0 }

  /// Whether `error` or `complete` has been received.
  pub fn is_stopped(&self) -> bool { matches!(**self.hub.state.load(), HubState::Done(_)) }
}

impl<Item, Err> Observer<Item, Err> for Subject<Item, Err>
where
  Item: Clone,
  Err: Clone,
{
  fn next(&mut self, value: Item) {
    let state = self.hub.state.load_full();
    if let HubState::Active(members) = &*state {
      members.broadcast_value(value);
    }
  }

  fn error(self, err: Err) { self.hub.stop(Some(err)) }

  fn complete(self) { self.hub.stop(None) }

  fn is_closed(&self) -> bool { !matches!(**self.hub.state.load(), HubState::Active(_)) }
}

impl<Item, Err> Observable<Item, Err> for Subject<Item, Err>
where
  Item: Send + 'static,
  Err: Clone + Send + Sync + 'static,
{
  type Unsub = SubjectSubscription<Item, Err>;

  fn subscribe<O>(&self, observer: O) -> Result<Self::Unsub, RxError>
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let entry = Arc::new(Entry::new(observer.into_boxed()));
    let mut current = self.hub.state.load_full();
    loop {
      let members = match &*current {
        HubState::Active(members) => members,
        HubState::Done(err) => {
          // Replayed, never added.
          match err.clone() {
            Some(err) => entry.terminate(move |o| o.error(err)),
            None => entry.terminate(|o| o.complete()),
          }
          return Ok(SubjectSubscription::inert());
        }
        HubState::Disposed => return Err(RxError::ObjectDisposed),
      };
      let (next, id) = members.with(entry.clone());
      match self.hub.swap_from(&current, HubState::Active(next)) {
        Ok(()) => {
          rx_log!(trace, id, "subject subscribe");
          return Ok(SubjectSubscription::new(Arc::downgrade(&self.hub), id));
        }
        Err(actual) => current = actual,
      }
    }
  }
}

impl<Item, Err> Disposable for Subject<Item, Err> {
  /// Drop every subscriber without notifying it and refuse new ones.
  fn dispose(&self) {
    let previous = self.hub.state.swap(Arc::new(HubState::Disposed));
    if let HubState::Active(members) = &*previous {
      rx_log!(debug, observers = members.len(), "subject disposed");
      members.detach_all();
    }
  }

  #[inline]
  fn is_disposed(&self) -> bool { matches!(**self.hub.state.load(), HubState::Disposed) }
}
