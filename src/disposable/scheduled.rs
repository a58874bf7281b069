use parking_lot::Mutex;

use super::{BoxedDisposable, Disposable};
use crate::scheduler::Scheduler;

/// Releases its inner handle on a scheduler rather than on the disposing
/// thread, for resources that must be torn down in a particular context.
pub struct ScheduledDisposable<S> {
  scheduler: S,
  inner: Mutex<Option<BoxedDisposable>>,
}

impl<S: Scheduler> ScheduledDisposable<S> {
  pub fn new<D>(scheduler: S, inner: D) -> Self
  where
    D: Disposable + Send + Sync + 'static,
  {
    ScheduledDisposable { scheduler, inner: Mutex::new(Some(Box::new(inner))) }
  }

  pub fn scheduler(&self) -> &S { &self.scheduler }
}

impl<S: Scheduler> Disposable for ScheduledDisposable<S> {
  fn dispose(&self) {
    let inner = self.inner.lock().take();
    if let Some(inner) = inner {
      // The release itself is the scheduled work; its handle is not kept.
      let _ = self.scheduler.schedule(Box::new(move || inner.dispose()));
    }
  }

  /// True once release has been handed to the scheduler.
  fn is_disposed(&self) -> bool { self.inner.lock().is_none() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{disposable::test_util::CountingDisposable, scheduler::manual::ManualScheduler};

  #[rxcore_macro::test]
  fn release_runs_on_the_scheduler() {
    let scheduler = ManualScheduler::new();
    let inner = CountingDisposable::new();
    let scheduled = ScheduledDisposable::new(scheduler.clone(), inner.clone());

    scheduled.dispose();
    scheduled.dispose();
    assert!(scheduled.is_disposed());
    assert_eq!(inner.count(), 0);
    assert_eq!(scheduler.pending(), 1);

    scheduler.run_tasks();
    assert_eq!(inner.count(), 1);
  }
}
