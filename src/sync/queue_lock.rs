use std::{
  collections::VecDeque,
  future::Future,
  panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
};

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;

use crate::{
  disposable::Disposable,
  error::{BoxError, RxError},
};

/// What `submit` did with the action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
  /// The caller ran the drain loop: its action and everything queued behind
  /// it have run.
  Drained,
  /// A drain loop was already running elsewhere; it will run the action.
  Queued,
}

struct QueueState<J> {
  pending: VecDeque<J>,
  draining: bool,
  faulted: bool,
}

/// The state shared by both queue locks, generic over the job type.
struct QueueCore<J> {
  state: Mutex<QueueState<J>>,
}

impl<J> QueueCore<J> {
  fn new() -> Self {
    QueueCore {
      state: Mutex::new(QueueState { pending: VecDeque::new(), draining: false, faulted: false }),
    }
  }

  fn enqueue(&self, job: J) -> Result<Submission, RxError> {
    let mut state = self.state.lock();
    if state.faulted {
      drop(state);
      drop(job);
      return Err(RxError::QueueFaulted);
    }
    state.pending.push_back(job);
    if state.draining {
      Ok(Submission::Queued)
    } else {
      state.draining = true;
      Ok(Submission::Drained)
    }
  }

  /// The next job for the drainer, or `None` after handing draining back.
  fn next_job(&self) -> Option<J> {
    let mut state = self.state.lock();
    let job = state.pending.pop_front();
    if job.is_none() {
      state.draining = false;
    }
    job
  }

  /// Fault the queue permanently; returns how many pending jobs were dropped.
  fn fault(&self) -> usize {
    let dropped = {
      let mut state = self.state.lock();
      state.faulted = true;
      state.draining = false;
      std::mem::take(&mut state.pending)
    };
    dropped.len()
  }

  /// A drain turn ended without emptying the queue: let the next submitter
  /// take over.
  fn abandon(&self) { self.state.lock().draining = false; }

  fn is_faulted(&self) -> bool { self.state.lock().faulted }

  fn len(&self) -> usize { self.state.lock().pending.len() }
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn on_failure(dropped: usize, err: &BoxError) {
  rx_log!(warn, dropped, error = %err, "queue lock faulted");
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn on_panic(dropped: usize) {
  rx_log!(warn, dropped, "queue lock faulted by a panicking action");
}

type SyncJob = Box<dyn FnOnce() -> Result<(), BoxError> + Send>;

/// Runs submitted actions one at a time, in submission order, without ever
/// making a submitter wait.
///
/// The first submitter to find the queue idle drains it on its own thread,
/// including actions submitted while it drains. When an action fails, the
/// queue is cleared and stays faulted: the draining submitter gets the
/// failure, and every later `submit` is rejected with
/// [`RxError::QueueFaulted`] without running.
pub struct AsyncQueueLock {
  core: QueueCore<SyncJob>,
}

impl Default for AsyncQueueLock {
  fn default() -> Self { Self::new() }
}

impl AsyncQueueLock {
  pub fn new() -> Self { AsyncQueueLock { core: QueueCore::new() } }

  /// Queue `action` and, if no one else is draining, drain the queue.
  ///
  /// # Errors
  ///
  /// - [`RxError::QueueFaulted`] if the lock faulted earlier or was disposed.
  /// - [`RxError::ActionFailed`] if an action run by this call's drain loop
  ///   failed; this faults the lock.
  ///
  /// # Panics
  ///
  /// A panicking action faults the lock and the panic resumes in the
  /// draining caller.
  pub fn submit<F>(&self, action: F) -> Result<Submission, RxError>
  where
    F: FnOnce() -> Result<(), BoxError> + Send + 'static,
  {
    if self.core.enqueue(Box::new(action))? == Submission::Queued {
      return Ok(Submission::Queued);
    }
    while let Some(job) = self.core.next_job() {
      match catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
          on_failure(self.core.fault(), &err);
          return Err(RxError::ActionFailed(err));
        }
        Err(payload) => {
          on_panic(self.core.fault());
          resume_unwind(payload);
        }
      }
    }
    Ok(Submission::Drained)
  }

  #[inline]
  pub fn is_faulted(&self) -> bool { self.core.is_faulted() }

  /// Number of actions waiting for the drain loop.
  pub fn pending(&self) -> usize { self.core.len() }
}

/// Clears the queue and faults the lock without running what was pending.
impl Disposable for AsyncQueueLock {
  fn dispose(&self) { self.core.fault(); }

  fn is_disposed(&self) -> bool { self.is_faulted() }
}

type AsyncJob = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// Hands draining back if the drain turn's future is dropped mid-way.
struct DrainTurn<'a> {
  core: &'a QueueCore<AsyncJob>,
  armed: bool,
}

impl DrainTurn<'_> {
  fn disarm(&mut self) { self.armed = false; }
}

impl Drop for DrainTurn<'_> {
  fn drop(&mut self) {
    if self.armed {
      self.core.abandon();
    }
  }
}

/// [`AsyncQueueLock`] for actions that return futures.
///
/// The draining submitter awaits each action before starting the next, so
/// actions never overlap even across their `.await` points. If the draining
/// submitter's future is dropped part-way, the remaining actions stay queued
/// and the next submitter drains them first.
pub struct FutureQueueLock {
  core: QueueCore<AsyncJob>,
}

impl Default for FutureQueueLock {
  fn default() -> Self { Self::new() }
}

impl FutureQueueLock {
  pub fn new() -> Self { FutureQueueLock { core: QueueCore::new() } }

  /// Async counterpart of [`AsyncQueueLock::submit`], with the same errors.
  pub async fn submit<F, Fut>(&self, action: F) -> Result<Submission, RxError>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
  {
    let job: AsyncJob = Box::new(move || action().boxed());
    if self.core.enqueue(job)? == Submission::Queued {
      return Ok(Submission::Queued);
    }
    let mut turn = DrainTurn { core: &self.core, armed: true };
    while let Some(job) = self.core.next_job() {
      match AssertUnwindSafe(async move { job().await }).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
          turn.disarm();
          on_failure(self.core.fault(), &err);
          return Err(RxError::ActionFailed(err));
        }
        Err(payload) => {
          turn.disarm();
          on_panic(self.core.fault());
          resume_unwind(payload);
        }
      }
    }
    turn.disarm();
    Ok(Submission::Drained)
  }

  #[inline]
  pub fn is_faulted(&self) -> bool { self.core.is_faulted() }

  pub fn pending(&self) -> usize { self.core.len() }
}

impl Disposable for FutureQueueLock {
  fn dispose(&self) { self.core.fault(); }

  fn is_disposed(&self) -> bool { self.is_faulted() }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{
      atomic::{AtomicBool, AtomicUsize, Ordering},
      mpsc, Arc,
    },
    task::{Context, Poll},
  };

  use futures::task::noop_waker_ref;

  use super::*;

  type Log = Arc<Mutex<Vec<usize>>>;

  fn push(log: &Log, v: usize) -> impl FnOnce() -> Result<(), BoxError> + Send + 'static {
    let log = log.clone();
    move || {
      log.lock().push(v);
      Ok(())
    }
  }

  #[rxcore_macro::test]
  fn idle_submitter_drains() {
    let lock = AsyncQueueLock::new();
    let log = Log::default();
    assert_eq!(lock.submit(push(&log, 1)).unwrap(), Submission::Drained);
    assert_eq!(lock.submit(push(&log, 2)).unwrap(), Submission::Drained);
    assert_eq!(*log.lock(), vec![1, 2]);
  }

  #[rxcore_macro::test]
  fn submissions_during_a_drain_run_in_order() {
    let lock = Arc::new(AsyncQueueLock::new());
    let log = Log::default();
    let (entered_tx, entered_rx) = mpsc::channel();
    let (resume_tx, resume_rx) = mpsc::channel::<()>();

    std::thread::scope(|s| {
      let drainer = {
        let (lock, log) = (lock.clone(), log.clone());
        s.spawn(move || {
          lock.submit(move || {
            entered_tx.send(()).unwrap();
            resume_rx.recv().unwrap();
            log.lock().push(0);
            Ok(())
          })
        })
      };
      entered_rx.recv().unwrap();
      for v in 1..=3 {
        assert_eq!(lock.submit(push(&log, v)).unwrap(), Submission::Queued);
      }
      assert_eq!(lock.pending(), 3);
      resume_tx.send(()).unwrap();
      assert_eq!(drainer.join().unwrap().unwrap(), Submission::Drained);
    });
    assert_eq!(*log.lock(), vec![0, 1, 2, 3]);
  }

  #[rxcore_macro::test]
  fn action_submitted_from_an_action_runs_after_it() {
    let lock = Arc::new(AsyncQueueLock::new());
    let log = Log::default();
    let (inner_lock, inner_log) = (lock.clone(), log.clone());
    lock
      .submit(move || {
        let queued = inner_lock.submit(push(&inner_log, 2))?;
        assert_eq!(queued, Submission::Queued);
        inner_log.lock().push(1);
        Ok(())
      })
      .unwrap();
    assert_eq!(*log.lock(), vec![1, 2]);
  }

  #[rxcore_macro::test]
  fn failure_faults_and_drops_the_rest() {
    let lock = Arc::new(AsyncQueueLock::new());
    let log = Log::default();
    let (l, g) = (lock.clone(), log.clone());
    let result = lock.submit(move || {
      l.submit(|| Err("boom".into())).unwrap();
      l.submit(push(&g, 3)).unwrap();
      Ok(())
    });

    match result {
      Err(RxError::ActionFailed(err)) => assert_eq!(err.to_string(), "boom"),
      other => panic!("unexpected {other:?}"),
    }
    assert!(lock.is_faulted());
    assert!(log.lock().is_empty());
    assert!(matches!(lock.submit(push(&log, 4)), Err(RxError::QueueFaulted)));
    assert!(log.lock().is_empty());
  }

  #[rxcore_macro::test]
  fn panicking_action_faults_and_resumes() {
    let lock = AsyncQueueLock::new();
    let caught = catch_unwind(AssertUnwindSafe(|| lock.submit(|| panic!("action panicked"))));
    assert!(caught.is_err());
    assert!(lock.is_faulted());
    assert!(matches!(lock.submit(|| Ok(())), Err(RxError::QueueFaulted)));
  }

  #[rxcore_macro::test]
  fn dispose_drops_pending_without_running() {
    let lock = Arc::new(AsyncQueueLock::new());
    let ran = Arc::new(AtomicBool::new(false));
    let (l, r) = (lock.clone(), ran.clone());
    lock
      .submit(move || {
        l.submit(move || {
          r.store(true, Ordering::SeqCst);
          Ok(())
        })
        .unwrap();
        l.dispose();
        Ok(())
      })
      .unwrap();
    assert!(!ran.load(Ordering::SeqCst));
    assert!(lock.is_disposed());
  }

  #[rxcore_macro::test]
  fn never_overlaps_under_contention() {
    let lock = AsyncQueueLock::new();
    let inside = Arc::new(AtomicBool::new(false));
    let runs = Arc::new(AtomicUsize::new(0));
    std::thread::scope(|s| {
      for _ in 0..8 {
        s.spawn(|| {
          for _ in 0..100 {
            let (inside, runs) = (inside.clone(), runs.clone());
            lock
              .submit(move || {
                assert!(!inside.swap(true, Ordering::SeqCst));
                runs.fetch_add(1, Ordering::SeqCst);
                inside.store(false, Ordering::SeqCst);
                Ok(())
              })
              .unwrap();
          }
        });
      }
    });
    assert_eq!(runs.load(Ordering::SeqCst), 800);
    assert_eq!(lock.pending(), 0);
  }

  #[cfg(feature = "tracing")]
  #[tracing_test::traced_test]
  #[test]
  fn fault_is_logged() {
    let lock = AsyncQueueLock::new();
    let _ = lock.submit(|| Err("disk full".into()));
    assert!(logs_contain("queue lock faulted"));
    assert!(logs_contain("disk full"));
  }

  #[rxcore_macro::test(shared)]
  async fn future_actions_never_overlap() {
    let lock = Arc::new(FutureQueueLock::new());
    let inside = Arc::new(AtomicBool::new(false));
    let log = Log::default();

    let tasks: Vec<_> = (0..4)
      .map(|t| {
        let (lock, inside, log) = (lock.clone(), inside.clone(), log.clone());
        tokio::spawn(async move {
          for i in 0..10 {
            let (inside, log) = (inside.clone(), log.clone());
            lock
              .submit(move || async move {
                assert!(!inside.swap(true, Ordering::SeqCst));
                tokio::task::yield_now().await;
                log.lock().push(t * 10 + i);
                inside.store(false, Ordering::SeqCst);
                Ok(())
              })
              .await
              .unwrap();
          }
        })
      })
      .collect();
    for task in tasks {
      task.await.unwrap();
    }
    assert_eq!(log.lock().len(), 40);
    assert_eq!(lock.pending(), 0);
  }

  #[rxcore_macro::test]
  fn dropped_drain_turn_hands_draining_back() {
    let lock = FutureQueueLock::new();
    let log = Log::default();
    let (_tx, rx) = futures::channel::oneshot::channel::<()>();

    let mut first = Box::pin(lock.submit(move || async move {
      let _ = rx.await;
      Ok(())
    }));
    let mut cx = Context::from_waker(noop_waker_ref());
    assert!(matches!(first.as_mut().poll(&mut cx), Poll::Pending));

    let queued = {
      let log = log.clone();
      futures::executor::block_on(lock.submit(move || async move {
        log.lock().push(1);
        Ok(())
      }))
    };
    assert_eq!(queued.unwrap(), Submission::Queued);

    drop(first);
    let drained = {
      let log = log.clone();
      futures::executor::block_on(lock.submit(move || async move {
        log.lock().push(2);
        Ok(())
      }))
    };
    assert_eq!(drained.unwrap(), Submission::Drained);
    assert_eq!(*log.lock(), vec![1, 2]);
  }

  #[rxcore_macro::test]
  async fn future_failure_faults() {
    let lock = FutureQueueLock::new();
    let result = lock.submit(|| async { Err::<(), BoxError>("nope".into()) }).await;
    assert!(matches!(result, Err(RxError::ActionFailed(_))));
    assert!(matches!(lock.submit(|| async { Ok(()) }).await, Err(RxError::QueueFaulted)));
  }
}
