use std::sync::Arc;

use parking_lot::Mutex;

use super::{Assignment, BoxedDisposable, Disposable};

#[derive(Default)]
struct SerialState {
  current: Option<BoxedDisposable>,
  disposed: bool,
}

/// A re-assignable slot: each assignment swaps in the new handle and releases
/// the previous one. Once disposed, the current handle and every later
/// assignment are released immediately.
#[derive(Clone, Default)]
pub struct SerialDisposable {
  state: Arc<Mutex<SerialState>>,
}

impl SerialDisposable {
  pub fn new() -> Self { Self::default() }

  pub fn assign<D>(&self, handle: D) -> Assignment
  where
    D: Disposable + Send + Sync + 'static,
  {
    self.assign_boxed(Box::new(handle))
  }

  pub fn assign_boxed(&self, handle: BoxedDisposable) -> Assignment {
    let mut state = self.state.lock();
    if state.disposed {
      drop(state);
      handle.dispose();
      return Assignment::ReleasedBecauseDisposed;
    }
    let previous = state.current.replace(handle);
    drop(state);
    if let Some(previous) = previous {
      previous.dispose();
    }
    Assignment::Stored
  }

  /// Whether a live handle is currently held.
  pub fn has_current(&self) -> bool { self.state.lock().current.is_some() }
}

impl Disposable for SerialDisposable {
  fn dispose(&self) {
    let current = {
      let mut state = self.state.lock();
      if state.disposed {
        return;
      }
      state.disposed = true;
      state.current.take()
    };
    if let Some(current) = current {
      current.dispose();
    }
  }

  fn is_disposed(&self) -> bool { self.state.lock().disposed }
}
