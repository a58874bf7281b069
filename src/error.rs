//! Crate-wide error type.
//!
//! The first four variants are contract violations: a caller broke a rule of the
//! disposable algebra or of the notification grammar and is told so
//! synchronously. The queue variants report the state of an `AsyncQueueLock`.
//! Double-dispose is never an error.

/// Failure type of a queued action.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum RxError {
  /// A single-assignment disposable was assigned twice.
  #[error("disposable has already been assigned")]
  AlreadyAssigned,

  /// A disposed object was asked to accept new work.
  #[error("cannot access a disposed object")]
  ObjectDisposed,

  /// A notification arrived while the observer was still processing another
  /// one, either re-entrantly or from a second thread.
  #[error("observer received a notification while another one was in flight")]
  ReentrantNotification,

  /// A notification arrived after `error` or `complete`.
  #[error("observer received a notification after a terminal notification")]
  NotificationAfterTerminal,

  /// The queue lock faulted earlier; the submitted action was dropped unrun.
  #[error("queue lock is faulted, the action was dropped")]
  QueueFaulted,

  /// A queued action failed; the queue lock is now faulted.
  #[error("queued action failed")]
  ActionFailed(#[source] BoxError),
}

impl RxError {
  /// Whether this error reports a broken usage contract rather than a runtime
  /// failure.
  pub fn is_contract_violation(&self) -> bool {
    matches!(
      self,
      RxError::AlreadyAssigned
        | RxError::ObjectDisposed
        | RxError::ReentrantNotification
        | RxError::NotificationAfterTerminal
    )
  }
}
