//! Logging shim over `tracing`, compiled out when the `tracing` feature is off.

/// `rx_log!(warn, dropped = n, "queue lock faulted")` forwards to `tracing::warn!`.
macro_rules! rx_log {
  ($level:ident, $($arg:tt)+) => {{
    #[cfg(feature = "tracing")]
    tracing::$level!($($arg)+);
  }};
}
