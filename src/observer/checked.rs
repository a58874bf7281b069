use std::sync::{
  atomic::{AtomicU8, Ordering},
  Arc,
};

use parking_lot::Mutex;

use super::Observer;
use crate::error::RxError;

/// Per-observer notification state.
///
/// `Idle -> Busy -> Idle` around each `next`; `Idle -> Terminated` on
/// `error`/`complete`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ObserverState {
  Idle = 0,
  Busy = 1,
  Terminated = 2,
}

impl ObserverState {
  fn from_u8(raw: u8) -> Self {
    match raw {
      0 => ObserverState::Idle,
      1 => ObserverState::Busy,
      _ => ObserverState::Terminated,
    }
  }

  fn violation(self) -> RxError {
    match self {
      ObserverState::Terminated => RxError::NotificationAfterTerminal,
      ObserverState::Idle | ObserverState::Busy => RxError::ReentrantNotification,
    }
  }
}

struct Inner<O> {
  state: AtomicU8,
  observer: Mutex<Option<O>>,
}

/// Rejects notifications that break the observer grammar instead of
/// forwarding them.
///
/// A call that arrives while another is in flight, from this thread or any
/// other, fails with [`RxError::ReentrantNotification`]; any call after
/// `error`/`complete` fails with [`RxError::NotificationAfterTerminal`]. The
/// `try_*` methods report these; the [`Observer`] impl panics on them.
pub struct CheckedObserver<O> {
  inner: Arc<Inner<O>>,
}

impl<O> Clone for CheckedObserver<O> {
  fn clone(&self) -> Self { CheckedObserver { inner: self.inner.clone() } }
}

/// Puts the state back to `Idle` when a `next` call ends, unwinding included.
struct BusyGuard<'a>(&'a AtomicU8);

impl Drop for BusyGuard<'_> {
  fn drop(&mut self) {
    let _ = self.0.compare_exchange(
      ObserverState::Busy as u8,
      ObserverState::Idle as u8,
      Ordering::AcqRel,
      Ordering::Acquire,
    );
  }
}

impl<O> CheckedObserver<O> {
  pub fn new(observer: O) -> Self {
    CheckedObserver {
      inner: Arc::new(Inner {
        state: AtomicU8::new(ObserverState::Idle as u8),
        observer: Mutex::new(Some(observer)),
      }),
    }
  }

  pub fn state(&self) -> ObserverState {
    ObserverState::from_u8(self.inner.state.load(Ordering::Acquire))
  }

  fn transition(&self, to: ObserverState) -> Result<(), RxError> {
    self
      .inner
      .state
      .compare_exchange(ObserverState::Idle as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
      .map(|_| ())
      .map_err(|actual| ObserverState::from_u8(actual).violation())
  }

  pub fn try_next<Item, Err>(&self, value: Item) -> Result<(), RxError>
  where
    O: Observer<Item, Err>,
  {
    self.transition(ObserverState::Busy)?;
    let _idle = BusyGuard(&self.inner.state);
    if let Some(observer) = self.inner.observer.lock().as_mut() {
      observer.next(value);
    }
    Ok(())
  }

  pub fn try_error<Item, Err>(&self, err: Err) -> Result<(), RxError>
  where
    O: Observer<Item, Err>,
  {
    self.transition(ObserverState::Terminated)?;
    let observer = self.inner.observer.lock().take();
    if let Some(observer) = observer {
      observer.error(err);
    }
    Ok(())
  }

  pub fn try_complete<Item, Err>(&self) -> Result<(), RxError>
  where
    O: Observer<Item, Err>,
  {
    self.transition(ObserverState::Terminated)?;
    let observer = self.inner.observer.lock().take();
    if let Some(observer) = observer {
      observer.complete();
    }
    Ok(())
  }
}

fn reject(err: RxError) -> ! {
  rx_log!(error, error = %err, "observer grammar violation");
  panic!("{err}")
}

/// # Panics
///
/// On any grammar violation, with the [`RxError`] message.
impl<Item, Err, O> Observer<Item, Err> for CheckedObserver<O>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) {
    if let Err(e) = self.try_next::<Item, Err>(value) {
      reject(e)
    }
  }

  fn error(self, err: Err) {
    if let Err(e) = self.try_error::<Item, Err>(err) {
      reject(e)
    }
  }

  fn complete(self) {
    if let Err(e) = self.try_complete::<Item, Err>() {
      reject(e)
    }
  }

  fn is_closed(&self) -> bool { self.state() == ObserverState::Terminated }
}
