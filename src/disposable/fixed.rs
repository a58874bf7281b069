use std::sync::atomic::{AtomicBool, Ordering};

use super::{BoxedDisposable, Disposable};

/// Two handles fixed at construction and released together.
///
/// Used where an operator owns exactly two upstream subscriptions (a source
/// plus a timer, or the two sides of a merge) and needs no add/remove.
pub struct BinaryDisposable<A, B> {
  first: A,
  second: B,
  disposed: AtomicBool,
}

impl<A, B> BinaryDisposable<A, B> {
  pub fn new(first: A, second: B) -> Self {
    BinaryDisposable { first, second, disposed: AtomicBool::new(false) }
  }
}

impl<A, B> Disposable for BinaryDisposable<A, B>
where
  A: Disposable,
  B: Disposable,
{
  fn dispose(&self) {
    if !self.disposed.swap(true, Ordering::AcqRel) {
      self.first.dispose();
      self.second.dispose();
    }
  }

  fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}

/// An immutable n-ary group: the member set is fixed at construction and
/// walked exactly once on dispose.
pub struct FixedCompositeDisposable {
  members: Box<[BoxedDisposable]>,
  disposed: AtomicBool,
}

impl FixedCompositeDisposable {
  pub fn len(&self) -> usize { self.members.len() }

  pub fn is_empty(&self) -> bool { self.members.is_empty() }
}

impl FromIterator<BoxedDisposable> for FixedCompositeDisposable {
  fn from_iter<I: IntoIterator<Item = BoxedDisposable>>(members: I) -> Self {
    FixedCompositeDisposable { members: members.into_iter().collect(), disposed: AtomicBool::new(false) }
  }
}

impl Disposable for FixedCompositeDisposable {
  fn dispose(&self) {
    if !self.disposed.swap(true, Ordering::AcqRel) {
      for member in self.members.iter() {
        member.dispose();
      }
    }
  }

  fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::disposable::{test_util::CountingDisposable, IntoBoxedDisposable};

  #[rxcore_macro::test]
  fn binary_releases_both_once() {
    let a = CountingDisposable::new();
    let b = CountingDisposable::new();
    let pair = BinaryDisposable::new(a.clone(), b.clone());
    assert!(!pair.is_disposed());

    std::thread::scope(|s| {
      for _ in 0..8 {
        s.spawn(|| pair.dispose());
      }
    });

    assert!(pair.is_disposed());
    assert_eq!((a.count(), b.count()), (1, 1));
  }

  #[rxcore_macro::test]
  fn fixed_group_walks_members_once() {
    let members: Vec<_> = (0..5).map(|_| CountingDisposable::new()).collect();
    let group: FixedCompositeDisposable = members.iter().map(|m| m.clone().into_boxed()).collect();
    assert_eq!(group.len(), 5);

    group.dispose();
    group.dispose();
    assert!(members.iter().all(|m| m.count() == 1));
  }
}
