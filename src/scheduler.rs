//! The scheduler interface the core consumes.
//!
//! Only the shape lives here. Thread pools, dispatchers and virtual-time
//! schedulers implement [`Scheduler`] elsewhere; time-outs and delayed
//! disposal are layered on top of it by disposing the returned handle.
pub use std::time::{Duration, Instant};

use crate::disposable::BoxedDisposable;

/// A unit of work handed to a scheduler.
pub type ScheduledAction = Box<dyn FnOnce() + Send>;

pub trait Scheduler {
  /// The scheduler's notion of the current time.
  fn now(&self) -> Instant;

  /// Run `action` as soon as possible. Disposing the returned handle before
  /// it runs cancels it.
  fn schedule(&self, action: ScheduledAction) -> BoxedDisposable;

  /// Run `action` once `delay` has elapsed.
  fn schedule_after(&self, delay: Duration, action: ScheduledAction) -> BoxedDisposable;

  /// Run `action` at `due`. A due time in the past runs as soon as possible.
  fn schedule_at(&self, due: Instant, action: ScheduledAction) -> BoxedDisposable {
    self.schedule_after(due.saturating_duration_since(self.now()), action)
  }
}

impl<S: Scheduler + ?Sized> Scheduler for std::sync::Arc<S> {
  #[inline]
  fn now(&self) -> Instant { (**self).now() }

  #[inline]
  fn schedule(&self, action: ScheduledAction) -> BoxedDisposable { (**self).schedule(action) }

  #[inline]
  fn schedule_after(&self, delay: Duration, action: ScheduledAction) -> BoxedDisposable {
    (**self).schedule_after(delay, action)
  }

  #[inline]
  fn schedule_at(&self, due: Instant, action: ScheduledAction) -> BoxedDisposable {
    (**self).schedule_at(due, action)
  }
}

#[cfg(test)]
pub(crate) mod manual {
  use std::sync::Arc;

  use parking_lot::Mutex;

  use super::*;
  use crate::disposable::{BooleanDisposable, Disposable};

  struct OneshotTask {
    due: Instant,
    action: ScheduledAction,
    cancel: BooleanDisposable,
  }

  /// A scheduler driven by hand: time only moves on `advance`, and due work
  /// only runs on `run_tasks`.
  #[derive(Clone)]
  pub(crate) struct ManualScheduler {
    clock: Arc<Mutex<Instant>>,
    oneshot_tasks: Arc<Mutex<Vec<OneshotTask>>>,
  }

  impl ManualScheduler {
    pub(crate) fn new() -> Self {
      ManualScheduler {
        clock: Arc::new(Mutex::new(Instant::now())),
        oneshot_tasks: Arc::new(Mutex::new(vec![])),
      }
    }

    pub(crate) fn advance(&self, time: Duration) { *self.clock.lock() += time; }

    pub(crate) fn pending(&self) -> usize { self.oneshot_tasks.lock().len() }

    /// Run every task that is due and not cancelled, in due order. Tasks
    /// scheduled while running wait for the next call.
    pub(crate) fn run_tasks(&self) {
      let now = *self.clock.lock();
      let mut due = {
        let mut tasks = self.oneshot_tasks.lock();
        tasks.retain(|t| !t.cancel.is_disposed());
        let (due, later): (Vec<_>, Vec<_>) = tasks.drain(..).partition(|t| t.due <= now);
        *tasks = later;
        due
      };
      due.sort_by_key(|t| t.due);
      for task in due {
        if !task.cancel.is_disposed() {
          (task.action)();
        }
      }
    }
  }

  impl Scheduler for ManualScheduler {
    fn now(&self) -> Instant { *self.clock.lock() }

    fn schedule(&self, action: ScheduledAction) -> BoxedDisposable {
      self.schedule_after(Duration::ZERO, action)
    }

    fn schedule_after(&self, delay: Duration, action: ScheduledAction) -> BoxedDisposable {
      let cancel = BooleanDisposable::new();
      let due = self.now() + delay;
      self.oneshot_tasks.lock().push(OneshotTask { due, action, cancel: cancel.clone() });
      Box::new(cancel)
    }
  }
}
