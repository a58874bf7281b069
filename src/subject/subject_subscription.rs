use std::sync::{
  atomic::{AtomicBool, Ordering},
  Weak,
};

use super::Hub;
use crate::disposable::{Disposable, SlotId};

/// Unsubscribe handle returned by [`Subject::subscribe`](super::Subject).
///
/// Disposing it removes the observer from the hub's membership and drops it.
/// If a notification to that observer is in flight on another thread, the
/// call waits for it to finish, so nothing reaches the observer afterwards.
///
/// The handle only holds a weak reference: it neither keeps the hub alive nor
/// fails once the hub is gone.
pub struct SubjectSubscription<Item, Err> {
  hub: Weak<Hub<Item, Err>>,
  id: SlotId,
  disposed: AtomicBool,
}

impl<Item, Err> SubjectSubscription<Item, Err> {
  pub(crate) fn new(hub: Weak<Hub<Item, Err>>, id: SlotId) -> Self {
    SubjectSubscription { hub, id, disposed: AtomicBool::new(false) }
  }

  /// Handle for a subscription that was answered by replay and never joined.
  pub(crate) fn inert() -> Self {
    SubjectSubscription { hub: Weak::new(), id: 0, disposed: AtomicBool::new(true) }
  }
}

impl<Item, Err> Disposable for SubjectSubscription<Item, Err> {
  fn dispose(&self) {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return;
    }
    let Some(hub) = self.hub.upgrade() else { return };
    if let Some(entry) = hub.remove(self.id) {
      rx_log!(trace, id = self.id, "subject unsubscribe");
      entry.dispose();
    }
  }

  #[inline]
  fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}
