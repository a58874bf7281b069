use std::sync::{
  atomic::{AtomicBool, AtomicU64, Ordering},
  Arc,
};

use parking_lot::Mutex;

use super::gate::{AsyncGate, GatePermit};
use crate::disposable::Disposable;

static NEXT_CHAIN: AtomicU64 = AtomicU64::new(1);

/// Identity of a logical call chain, for [`AsyncMutex`] reentrancy.
///
/// Create one at the root of an operation and pass it (it is `Copy`) to every
/// piece of code that runs as part of that operation, whichever thread or task
/// it ends up on. Two chains created separately never compare equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallChain {
  id: u64,
}

impl CallChain {
  pub fn new() -> Self { CallChain { id: NEXT_CHAIN.fetch_add(1, Ordering::Relaxed) } }

  #[inline]
  pub fn id(&self) -> u64 { self.id }
}

impl Default for CallChain {
  fn default() -> Self { Self::new() }
}

#[derive(Default)]
struct Owner {
  chain: Option<CallChain>,
  depth: usize,
  permit: Option<GatePermit>,
}

#[derive(Default)]
struct MutexInner {
  gate: AsyncGate,
  owner: Mutex<Owner>,
}

/// A reentrant mutex for async code.
///
/// Waiting suspends the task instead of blocking its thread. The chain that
/// holds the mutex may acquire it again without waiting; the mutex is handed
/// to the next waiter only when every guard of the holding chain has been
/// released.
#[derive(Clone, Default)]
pub struct AsyncMutex {
  inner: Arc<MutexInner>,
}

impl AsyncMutex {
  pub fn new() -> Self { Self::default() }

  /// Acquire the mutex on behalf of `chain`.
  pub async fn acquire(&self, chain: CallChain) -> AsyncMutexGuard {
    if let Some(guard) = self.reenter(chain) {
      return guard;
    }
    let permit = self.inner.gate.acquire().await;
    self.install(chain, permit)
  }

  /// Acquire on a fresh chain, which makes this acquisition non-reentrant.
  pub async fn lock(&self) -> AsyncMutexGuard { self.acquire(CallChain::new()).await }

  pub fn try_acquire(&self, chain: CallChain) -> Option<AsyncMutexGuard> {
    if let Some(guard) = self.reenter(chain) {
      return Some(guard);
    }
    let permit = self.inner.gate.try_acquire()?;
    Some(self.install(chain, permit))
  }

  #[inline]
  pub fn is_locked(&self) -> bool { self.inner.gate.is_locked() }

  /// The chain currently holding the mutex, if any.
  pub fn holder(&self) -> Option<CallChain> { self.inner.owner.lock().chain }

  fn reenter(&self, chain: CallChain) -> Option<AsyncMutexGuard> {
    let mut owner = self.inner.owner.lock();
    if owner.chain != Some(chain) {
      return None;
    }
    owner.depth += 1;
    let depth = owner.depth;
    drop(owner);
    Some(AsyncMutexGuard::new(self.clone(), chain, depth))
  }

  fn install(&self, chain: CallChain, permit: GatePermit) -> AsyncMutexGuard {
    let mut owner = self.inner.owner.lock();
    owner.chain = Some(chain);
    owner.depth = 1;
    owner.permit = Some(permit);
    drop(owner);
    AsyncMutexGuard::new(self.clone(), chain, 1)
  }

  fn release(&self) {
    let permit = {
      let mut owner = self.inner.owner.lock();
      owner.depth -= 1;
      if owner.depth == 0 {
        owner.chain = None;
        owner.permit.take()
      } else {
        None
      }
    };
    // Hands the gate to the next waiter, outside the owner lock.
    drop(permit);
  }
}

/// Releaser returned by [`AsyncMutex::acquire`]. Dropping or disposing it
/// unwinds one level of recursion.
#[must_use = "the mutex is released as soon as the guard is dropped"]
pub struct AsyncMutexGuard {
  mutex: AsyncMutex,
  chain: CallChain,
  depth: usize,
  released: AtomicBool,
}

impl AsyncMutexGuard {
  fn new(mutex: AsyncMutex, chain: CallChain, depth: usize) -> Self {
    AsyncMutexGuard { mutex, chain, depth, released: AtomicBool::new(false) }
  }

  /// Recursion depth this guard was granted at; 1 for the outermost acquire.
  #[inline]
  pub fn depth(&self) -> usize { self.depth }

  #[inline]
  pub fn chain(&self) -> CallChain { self.chain }

  pub fn release(self) {}

  fn release_once(&self) {
    if !self.released.swap(true, Ordering::AcqRel) {
      self.mutex.release();
    }
  }
}

impl Disposable for AsyncMutexGuard {
  #[inline]
  fn dispose(&self) { self.release_once() }

  #[inline]
  fn is_disposed(&self) -> bool { self.released.load(Ordering::Acquire) }
}

impl Drop for AsyncMutexGuard {
  fn drop(&mut self) { self.release_once() }
}

#[cfg(test)]
mod tests {
  use std::{sync::atomic::AtomicUsize, time::Duration};

  use futures::{task::noop_waker_ref, FutureExt};

  use super::*;

  #[rxcore_macro::test]
  fn same_chain_reenters() {
    let mutex = AsyncMutex::new();
    let chain = CallChain::new();
    let outer = mutex.try_acquire(chain).unwrap();
    let inner = mutex.try_acquire(chain).unwrap();
    assert_eq!((outer.depth(), inner.depth()), (1, 2));
    assert!(mutex.try_acquire(CallChain::new()).is_none());

    inner.release();
    assert_eq!(mutex.holder(), Some(chain));
    outer.release();
    assert!(!mutex.is_locked());
    assert_eq!(mutex.holder(), None);
  }

  #[rxcore_macro::test]
  fn other_chain_waits_until_full_unwind() {
    let mutex = AsyncMutex::new();
    let chain = CallChain::new();
    let outer = mutex.try_acquire(chain).unwrap();
    let inner = mutex.try_acquire(chain).unwrap();

    let mut other = Box::pin(mutex.lock());
    let mut cx = std::task::Context::from_waker(noop_waker_ref());
    assert!(other.poll_unpin(&mut cx).is_pending());

    outer.dispose();
    outer.dispose();
    assert!(other.poll_unpin(&mut cx).is_pending());
    drop(inner);
    let std::task::Poll::Ready(guard) = other.poll_unpin(&mut cx) else {
      panic!("mutex should have been handed over");
    };
    assert_eq!(guard.depth(), 1);
    assert_ne!(guard.chain(), chain);
  }

  #[rxcore_macro::test(shared)]
  async fn continuation_on_another_task_reenters() {
    let mutex = AsyncMutex::new();
    let chain = CallChain::new();
    let outer = mutex.acquire(chain).await;

    let m = mutex.clone();
    let depth = tokio::spawn(async move {
      let inner = m.acquire(chain).await;
      inner.depth()
    })
    .await
    .unwrap();
    assert_eq!(depth, 2);
    assert_eq!(mutex.holder(), Some(chain));

    drop(outer);
    assert!(!mutex.is_locked());
  }

  #[rxcore_macro::test(shared)]
  async fn serializes_independent_chains() {
    let mutex = AsyncMutex::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let tasks: Vec<_> = (0..4)
      .map(|_| {
        let (mutex, counter) = (mutex.clone(), counter.clone());
        tokio::spawn(async move {
          for _ in 0..25 {
            let _guard = mutex.lock().await;
            let seen = counter.load(Ordering::SeqCst);
            tokio::time::sleep(Duration::from_micros(10)).await;
            counter.store(seen + 1, Ordering::SeqCst);
          }
        })
      })
      .collect();
    for task in tasks {
      task.await.unwrap();
    }
    assert_eq!(counter.load(Ordering::SeqCst), 100);
  }
}
