//! Observable trait and the `create` source.
//!
//! An observable is anything that can be subscribed to; subscribing returns
//! the disposable that cancels the subscription. Producers written against
//! [`create`] never see the raw consumer: they receive an
//! [`AutoDetachObserver`](crate::observer::AutoDetachObserver) that keeps the
//! notification grammar for them and releases whatever `subscribe` set up once
//! the stream ends.

use crate::{disposable::Disposable, error::RxError, observer::Observer};

mod create;

pub use create::{create, Create, Emitter};

/// A producer of a notification sequence.
pub trait Observable<Item, Err> {
  /// The handle returned by `subscribe`.
  type Unsub: Disposable + Send + Sync + 'static;

  /// Attach `observer`. Fails only when the observable can no longer accept
  /// subscribers, such as a disposed [`Subject`](crate::subject::Subject).
  fn subscribe<O>(&self, observer: O) -> Result<Self::Unsub, RxError>
  where
    O: Observer<Item, Err> + Send + 'static;
}
