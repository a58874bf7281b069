use smallvec::SmallVec;

use super::Disposable;

/// Identifier of an item stored in [`DisposableSlots`].
pub type SlotId = usize;

/// An id-addressed container of disposables.
///
/// Backing store of [`CompositeDisposable`](super::CompositeDisposable). Items
/// are added to get a stable id and removed by that id later, e.g. when an
/// inner subscription finishes on its own.
///
/// - **SmallVec**: groups of 0-2 members, by far the common case, do not
///   allocate.
/// - **Reserve then insert**: `reserve_id()` + `insert()` hands out the id
///   before the item exists, for handles that need to know their own slot.
///
/// # Examples
///
/// ```rust
/// use rxcore::disposable::DisposableSlots;
///
/// let mut slots: DisposableSlots<()> = DisposableSlots::default();
///
/// let id1 = slots.add(());
/// let id2 = slots.reserve_id();
/// slots.insert(id2, ());
/// assert_eq!(slots.len(), 2);
///
/// assert!(slots.remove(id1).is_some());
/// assert!(slots.remove(id1).is_none());
/// assert_eq!(slots.len(), 1);
/// ```
#[derive(Clone)]
pub struct DisposableSlots<U> {
  next_id: SlotId,
  items: SmallVec<[(SlotId, U); 2]>,
}

impl<U> Default for DisposableSlots<U> {
  fn default() -> Self { Self { next_id: 0, items: SmallVec::new() } }
}

impl<U> DisposableSlots<U> {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Add an item and return its id.
  #[inline]
  pub fn add(&mut self, item: U) -> SlotId {
    let id = self.reserve_id();
    self.items.push((id, item));
    id
  }

  /// Reserve the next id without adding an item.
  #[inline]
  pub fn reserve_id(&mut self) -> SlotId {
    let id = self.next_id;
    self.next_id += 1;
    id
  }

  /// Insert an item under an id obtained from `reserve_id()`.
  #[inline]
  pub fn insert(&mut self, id: SlotId, item: U) { self.items.push((id, item)); }

  pub fn remove(&mut self, id: SlotId) -> Option<U> {
    self
      .items
      .iter()
      .position(|(i, _)| *i == id)
      .map(|pos| self.items.remove(pos).1)
  }

  #[inline]
  pub fn contains(&self, id: SlotId) -> bool { self.items.iter().any(|(i, _)| *i == id) }

  #[inline]
  pub fn len(&self) -> usize { self.items.len() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.items.is_empty() }

  /// Move every item out, leaving the container empty. Ids keep counting up.
  pub fn take_all(&mut self) -> SmallVec<[U; 2]> {
    self.items.drain(..).map(|(_, item)| item).collect()
  }

  #[inline]
  pub fn iter(&self) -> impl Iterator<Item = &U> { self.items.iter().map(|(_, item)| item) }
}

impl<U: Disposable> DisposableSlots<U> {
  /// Dispose every item and clear the container.
  pub fn dispose_all(&mut self) {
    for item in self.take_all() {
      item.dispose();
    }
  }

  pub fn all_disposed(&self) -> bool { self.iter().all(Disposable::is_disposed) }
}
