use std::sync::Arc;

use parking_lot::Mutex;

use super::{Assignment, BoxedDisposable, Disposable};
use crate::error::RxError;

enum Slot {
  Vacant,
  Held(BoxedDisposable),
  Disposed { assigned: bool },
}

/// A slot that accepts exactly one handle.
///
/// - Assigning twice is a contract violation ([`RxError::AlreadyAssigned`]).
/// - Disposing before the assignment leaves a disposed sentinel, so the late
///   handle is released inside the `assign` call itself.
///
/// Clones share the slot. This is the usual holder for an upstream
/// subscription that only becomes known after `subscribe` returns.
#[derive(Clone)]
pub struct SingleAssignmentDisposable {
  slot: Arc<Mutex<Slot>>,
}

impl Default for SingleAssignmentDisposable {
  fn default() -> Self { Self { slot: Arc::new(Mutex::new(Slot::Vacant)) } }
}

impl SingleAssignmentDisposable {
  pub fn new() -> Self { Self::default() }

  /// Store `handle`, or release it right away if the slot was already
  /// disposed.
  ///
  /// A second assignment fails with [`RxError::AlreadyAssigned`] and drops
  /// `handle` without disposing it; the caller still owns its release.
  pub fn assign<D>(&self, handle: D) -> Result<Assignment, RxError>
  where
    D: Disposable + Send + Sync + 'static,
  {
    self.assign_boxed(Box::new(handle))
  }

  pub fn assign_boxed(&self, handle: BoxedDisposable) -> Result<Assignment, RxError> {
    let mut slot = self.slot.lock();
    match &mut *slot {
      Slot::Vacant => {
        *slot = Slot::Held(handle);
        Ok(Assignment::Stored)
      }
      Slot::Disposed { assigned } if !*assigned => {
        *assigned = true;
        drop(slot);
        handle.dispose();
        Ok(Assignment::ReleasedBecauseDisposed)
      }
      Slot::Held(_) | Slot::Disposed { .. } => Err(RxError::AlreadyAssigned),
    }
  }

  /// Whether a handle has been assigned, before or after disposal.
  pub fn is_assigned(&self) -> bool {
    match &*self.slot.lock() {
      Slot::Vacant => false,
      Slot::Held(_) => true,
      Slot::Disposed { assigned } => *assigned,
    }
  }
}

impl Disposable for SingleAssignmentDisposable {
  fn dispose(&self) {
    let previous = {
      let mut slot = self.slot.lock();
      let next = match &*slot {
        Slot::Disposed { .. } => return,
        Slot::Vacant => Slot::Disposed { assigned: false },
        Slot::Held(_) => Slot::Disposed { assigned: true },
      };
      std::mem::replace(&mut *slot, next)
    };
    if let Slot::Held(handle) = previous {
      handle.dispose();
    }
  }

  fn is_disposed(&self) -> bool { matches!(&*self.slot.lock(), Slot::Disposed { .. }) }
}
