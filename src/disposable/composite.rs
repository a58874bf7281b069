use std::{
  fmt::{Debug, Formatter},
  sync::Arc,
};

use parking_lot::Mutex;

use super::{BoxedDisposable, Disposable, DisposableSlots, SlotId};

#[derive(Default)]
struct Inner {
  disposed: bool,
  members: DisposableSlots<BoxedDisposable>,
}

/// A growable group of disposables released together.
///
/// After the group is disposed it stays disposed: `add` releases its argument
/// on the spot instead of storing it. Clones share the group.
#[derive(Clone, Default)]
pub struct CompositeDisposable(Arc<Mutex<Inner>>);

impl CompositeDisposable {
  pub fn new() -> Self { Self::default() }

  /// Store `handle` and return its slot, or release it right away and return
  /// `None` if the group is already disposed.
  pub fn add<D>(&self, handle: D) -> Option<SlotId>
  where
    D: Disposable + Send + Sync + 'static,
  {
    self.add_boxed(Box::new(handle))
  }

  pub fn add_boxed(&self, handle: BoxedDisposable) -> Option<SlotId> {
    let mut inner = self.0.lock();
    if inner.disposed {
      drop(inner);
      handle.dispose();
      None
    } else {
      Some(inner.members.add(handle))
    }
  }

  /// Remove and release the member in `id`. Returns whether it was a member.
  pub fn remove(&self, id: SlotId) -> bool {
    let removed = self.0.lock().members.remove(id);
    match removed {
      Some(member) => {
        member.dispose();
        true
      }
      None => false,
    }
  }

  /// Release every current member but keep the group usable.
  pub fn clear(&self) {
    let members = self.0.lock().members.take_all();
    for member in members {
      member.dispose();
    }
  }

  pub fn contains(&self, id: SlotId) -> bool { self.0.lock().members.contains(id) }

  pub fn len(&self) -> usize { self.0.lock().members.len() }

  pub fn is_empty(&self) -> bool { self.0.lock().members.is_empty() }
}

impl FromIterator<BoxedDisposable> for CompositeDisposable {
  fn from_iter<I: IntoIterator<Item = BoxedDisposable>>(members: I) -> Self {
    let mut inner = Inner::default();
    for member in members {
      inner.members.add(member);
    }
    CompositeDisposable(Arc::new(Mutex::new(inner)))
  }
}

impl Disposable for CompositeDisposable {
  fn dispose(&self) {
    let members = {
      let mut inner = self.0.lock();
      if inner.disposed {
        return;
      }
      inner.disposed = true;
      inner.members.take_all()
    };
    for member in members {
      member.dispose();
    }
  }

  fn is_disposed(&self) -> bool { self.0.lock().disposed }
}

impl Debug for CompositeDisposable {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let inner = self.0.lock();
    f.debug_struct("CompositeDisposable")
      .field("disposed", &inner.disposed)
      .field("len", &inner.members.len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::disposable::{test_util::CountingDisposable, IntoBoxedDisposable};

  #[rxcore_macro::test]
  fn add_remove() {
    let group = CompositeDisposable::new();
    let a = CountingDisposable::new();
    let b = CountingDisposable::new();
    let id_a = group.add(a.clone()).unwrap();
    let id_b = group.add(b.clone()).unwrap();
    assert_eq!(group.len(), 2);

    assert!(group.remove(id_a));
    assert!(!group.remove(id_a));
    assert_eq!(a.count(), 1);
    assert!(group.contains(id_b));
    assert_eq!(group.len(), 1);
  }

  #[rxcore_macro::test]
  fn clear_keeps_group_alive() {
    let a = CountingDisposable::new();
    let group = CompositeDisposable::from_iter([a.clone().into_boxed()]);
    group.clear();
    assert_eq!(a.count(), 1);
    assert!(!group.is_disposed());

    let b = CountingDisposable::new();
    assert!(group.add(b.clone()).is_some());
    assert_eq!(b.count(), 0);
  }

  #[rxcore_macro::test]
  fn member_added_during_dispose_race_is_released_once() {
    for _ in 0..200 {
      let group = CompositeDisposable::new();
      let members: Vec<_> = (0..4).map(|_| CountingDisposable::new()).collect();
      std::thread::scope(|s| {
        for m in &members {
          let group = &group;
          s.spawn(move || group.add(m.clone()));
        }
        s.spawn(|| group.dispose());
      });
      group.dispose();
      assert!(members.iter().all(|m| m.count() == 1));
      assert!(group.is_empty());
    }
  }
}
