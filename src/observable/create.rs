use std::{
  marker::PhantomData,
  panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
  sync::Arc,
};

use crate::{
  disposable::Disposable,
  error::RxError,
  observable::Observable,
  observer::{AutoDetachObserver, BoxedObserver, IntoBoxedObserver, Observer},
};

/// The observer handed to a [`create`] producer.
pub type Emitter<Item, Err> = AutoDetachObserver<BoxedObserver<Item, Err>>;

/// Observable created from a producer function.
///
/// This struct is created by [`create`].
pub struct Create<F, Item, Err> {
  f: F,
  _marker: PhantomData<fn() -> (Item, Err)>,
}

impl<F: Clone, Item, Err> Clone for Create<F, Item, Err> {
  fn clone(&self) -> Self { Create { f: self.f.clone(), _marker: PhantomData } }
}

/// An observable that runs `f` for every subscriber.
///
/// `f` receives the subscriber wrapped in a grammar guard and returns the
/// disposable that tears its production down. That disposable is attached to
/// the guard, so it is released when the subscriber unsubscribes, when the
/// stream terminates, or right away if `f` already terminated the stream
/// before returning.
///
/// ```
/// use std::sync::{Arc, Mutex};
///
/// use rxcore::prelude::*;
///
/// let numbers = observable::create(|mut emitter: Emitter<i32, ()>| {
///   emitter.next(1);
///   emitter.next(2);
///   emitter.complete();
/// });
///
/// let seen = Arc::new(Mutex::new(vec![]));
/// let sink = seen.clone();
/// numbers
///   .subscribe(observer::from_fns(move |v: i32| sink.lock().unwrap().push(v), |_: ()| {}, || {}))
///   .unwrap();
/// assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
/// ```
pub fn create<F, U, Item, Err>(f: F) -> Create<F, Item, Err>
where
  F: Fn(Emitter<Item, Err>) -> U,
  U: Disposable + Send + Sync + 'static,
{
  Create { f, _marker: PhantomData }
}

impl<F, U, Item, Err> Observable<Item, Err> for Create<F, Item, Err>
where
  F: Fn(Emitter<Item, Err>) -> U,
  U: Disposable + Send + Sync + 'static,
  Item: 'static,
  Err: 'static,
{
  type Unsub = Emitter<Item, Err>;

  fn subscribe<O>(&self, observer: O) -> Result<Self::Unsub, RxError>
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let guard = AutoDetachObserver::new(observer.into_boxed());
    match catch_unwind(AssertUnwindSafe(|| (self.f)(guard.clone()))) {
      Ok(upstream) => {
        let upstream = Arc::new(upstream);
        match guard.set_upstream(upstream.clone()) {
          Ok(_) => Ok(guard),
          Err(err) => {
            // The producer attached an upstream of its own; tear both down.
            upstream.dispose();
            guard.dispose();
            Err(err)
          }
        }
      }
      Err(payload) => {
        guard.dispose();
        resume_unwind(payload)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use parking_lot::Mutex;

  use super::*;
  use crate::{
    disposable::test_util::CountingDisposable,
    observer::test_util::{Event, Recorder},
  };

  #[rxcore_macro::test]
  fn synchronous_producer_releases_its_resource() {
    let resource = CountingDisposable::new();
    let r = resource.clone();
    let source = create(move |mut emitter: Emitter<i32, ()>| {
      emitter.next(1);
      emitter.next(2);
      emitter.clone().complete();
      emitter.next(3);
      r.clone()
    });

    let recorder = Recorder::new();
    let subscription = source.subscribe(recorder.clone()).unwrap();
    assert_eq!(recorder.events(), vec![Event::Next(1), Event::Next(2), Event::Complete]);
    assert_eq!(resource.count(), 1);
    assert!(subscription.is_disposed());
  }

  #[rxcore_macro::test]
  fn unsubscribe_stops_a_pending_producer() {
    let slot: Arc<Mutex<Option<Emitter<i32, ()>>>> = Arc::new(Mutex::new(None));
    let resource = CountingDisposable::new();
    let (s, r) = (slot.clone(), resource.clone());
    let source = create(move |emitter: Emitter<i32, ()>| {
      *s.lock() = Some(emitter);
      r.clone()
    });

    let recorder = Recorder::new();
    let subscription = source.subscribe(recorder.clone()).unwrap();
    let mut emitter = slot.lock().take().unwrap();
    emitter.next(1);
    subscription.dispose();
    emitter.next(2);

    assert_eq!(recorder.events(), vec![Event::Next(1)]);
    assert_eq!(resource.count(), 1);
  }

  #[rxcore_macro::test]
  fn producer_that_attaches_its_own_upstream_is_torn_down() {
    let (attached, returned) = (CountingDisposable::new(), CountingDisposable::new());
    let (a, r) = (attached.clone(), returned.clone());
    let source = create(move |mut emitter: Emitter<i32, ()>| {
      emitter.set_upstream(a.clone()).unwrap();
      emitter.next(1);
      r.clone()
    });

    let recorder = Recorder::new();
    let result = source.subscribe(recorder.clone());
    assert!(matches!(result, Err(RxError::AlreadyAssigned)));
    assert_eq!(recorder.events(), vec![Event::Next(1)]);
    assert_eq!(attached.count(), 1);
    assert_eq!(returned.count(), 1);
  }

  #[rxcore_macro::test]
  fn each_subscriber_runs_the_producer() {
    let source = create(|mut emitter: Emitter<&'static str, ()>| {
      emitter.next("hello");
    });
    let (a, b) = (Recorder::new(), Recorder::new());
    source.subscribe(a.clone()).unwrap();
    source.subscribe(b.clone()).unwrap();
    assert_eq!(a.events(), vec![Event::Next("hello")]);
    assert_eq!(a.events(), b.events());
  }
}
