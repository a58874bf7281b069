use std::{
  collections::VecDeque,
  future::Future,
  pin::Pin,
  sync::Arc,
  task::{Context, Poll, Waker},
};

use parking_lot::Mutex;

#[derive(Debug)]
struct Waiter {
  id: u64,
  waker: Waker,
}

#[derive(Debug, Default)]
struct GateState {
  locked: bool,
  waiters: VecDeque<Waiter>,
  next_waiter_id: u64,
  /// A waiter the gate was handed to that has not been polled since.
  granted: Option<u64>,
}

/// A FIFO binary async semaphore.
///
/// Releasing the gate hands it straight to the oldest waiter, so it stays
/// locked across the hand-off and no newcomer can barge in between.
#[derive(Clone, Default)]
pub struct AsyncGate {
  state: Arc<Mutex<GateState>>,
}

impl AsyncGate {
  pub fn new() -> Self { Self::default() }

  /// Wait for the gate. The returned future is cancel-safe: dropping it
  /// leaves the queue, and if the gate had already been handed to it, passes
  /// the gate on.
  pub fn acquire(&self) -> GateAcquire {
    GateAcquire { gate: self.clone(), waiter_id: None, acquired: false }
  }

  pub fn try_acquire(&self) -> Option<GatePermit> {
    let mut state = self.state.lock();
    if state.locked {
      return None;
    }
    state.locked = true;
    drop(state);
    Some(GatePermit { gate: self.clone() })
  }

  #[inline]
  pub fn is_locked(&self) -> bool { self.state.lock().locked }

  /// Number of tasks currently queued for the gate.
  pub fn waiters(&self) -> usize { self.state.lock().waiters.len() }

  fn release(&self) {
    let waker = {
      let mut state = self.state.lock();
      match state.waiters.pop_front() {
        Some(next) => {
          state.granted = Some(next.id);
          Some(next.waker)
        }
        None => {
          state.locked = false;
          None
        }
      }
    };
    if let Some(waker) = waker {
      waker.wake();
    }
  }
}

/// Future returned by [`AsyncGate::acquire`].
#[must_use = "futures do nothing unless polled"]
pub struct GateAcquire {
  gate: AsyncGate,
  waiter_id: Option<u64>,
  acquired: bool,
}

impl Future for GateAcquire {
  type Output = GatePermit;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<GatePermit> {
    let this = &mut *self;
    let mut state = this.gate.state.lock();

    if let Some(id) = this.waiter_id {
      if state.granted == Some(id) {
        state.granted = None;
        drop(state);
        this.acquired = true;
        return Poll::Ready(GatePermit { gate: this.gate.clone() });
      }
      if let Some(existing) = state.waiters.iter_mut().find(|w| w.id == id) {
        if !existing.waker.will_wake(cx.waker()) {
          existing.waker.clone_from(cx.waker());
        }
      }
      return Poll::Pending;
    }

    if !state.locked {
      state.locked = true;
      drop(state);
      this.acquired = true;
      return Poll::Ready(GatePermit { gate: this.gate.clone() });
    }

    let id = state.next_waiter_id;
    state.next_waiter_id += 1;
    state.waiters.push_back(Waiter { id, waker: cx.waker().clone() });
    drop(state);
    this.waiter_id = Some(id);
    Poll::Pending
  }
}

impl Drop for GateAcquire {
  fn drop(&mut self) {
    if self.acquired {
      return;
    }
    let Some(id) = self.waiter_id else { return };
    let mut state = self.gate.state.lock();
    if state.granted == Some(id) {
      state.granted = None;
      drop(state);
      self.gate.release();
    } else {
      state.waiters.retain(|w| w.id != id);
    }
  }
}

/// Exclusive hold on an [`AsyncGate`]; dropping it releases the gate.
#[must_use = "the gate is released as soon as the permit is dropped"]
pub struct GatePermit {
  gate: AsyncGate,
}

impl Drop for GatePermit {
  fn drop(&mut self) { self.gate.release() }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

  use futures::{task::noop_waker_ref, FutureExt};

  use super::*;

  fn poll_once(fut: &mut GateAcquire) -> Option<GatePermit> {
    let mut cx = Context::from_waker(noop_waker_ref());
    match fut.poll_unpin(&mut cx) {
      Poll::Ready(permit) => Some(permit),
      Poll::Pending => None,
    }
  }

  #[rxcore_macro::test]
  fn hands_off_in_fifo_order() {
    let gate = AsyncGate::new();
    let first = gate.try_acquire().unwrap();
    assert!(gate.try_acquire().is_none());

    let mut a = gate.acquire();
    let mut b = gate.acquire();
    assert!(poll_once(&mut a).is_none());
    assert!(poll_once(&mut b).is_none());
    assert_eq!(gate.waiters(), 2);

    drop(first);
    assert!(gate.is_locked());
    assert!(poll_once(&mut b).is_none());
    let a_permit = poll_once(&mut a).unwrap();
    drop(a_permit);
    let b_permit = poll_once(&mut b).unwrap();
    drop(b_permit);
    assert!(!gate.is_locked());
  }

  #[rxcore_macro::test]
  fn dropped_waiter_passes_the_gate_on() {
    let gate = AsyncGate::new();
    let held = gate.try_acquire().unwrap();
    let mut a = gate.acquire();
    let mut b = gate.acquire();
    assert!(poll_once(&mut a).is_none());
    assert!(poll_once(&mut b).is_none());

    // `a` is granted but never polled again.
    drop(held);
    drop(a);
    let permit = poll_once(&mut b).unwrap();
    assert_eq!(gate.waiters(), 0);
    drop(permit);
    assert!(!gate.is_locked());
  }

  #[rxcore_macro::test]
  fn queued_waiter_dropped_leaves_the_queue() {
    let gate = AsyncGate::new();
    let held = gate.try_acquire().unwrap();
    let mut a = gate.acquire();
    assert!(poll_once(&mut a).is_none());
    drop(a);
    assert_eq!(gate.waiters(), 0);
    drop(held);
    assert!(!gate.is_locked());
  }

  #[rxcore_macro::test(shared)]
  async fn never_two_holders() {
    let gate = AsyncGate::new();
    let inside = Arc::new(AtomicBool::new(false));
    let entries = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..8)
      .map(|_| {
        let (gate, inside, entries) = (gate.clone(), inside.clone(), entries.clone());
        tokio::spawn(async move {
          for _ in 0..50 {
            let _permit = gate.acquire().await;
            assert!(!inside.swap(true, Ordering::SeqCst));
            tokio::task::yield_now().await;
            entries.fetch_add(1, Ordering::SeqCst);
            inside.store(false, Ordering::SeqCst);
          }
        })
      })
      .collect();
    for task in tasks {
      task.await.unwrap();
    }
    assert_eq!(entries.load(Ordering::SeqCst), 400);
    assert!(!gate.is_locked());
  }
}
