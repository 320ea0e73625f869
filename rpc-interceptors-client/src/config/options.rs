//! Call options for per-call configuration.
//!
//! This module provides [`CallOptions`] for configuring individual RPC calls
//! with a deadline, a cancellation token and custom headers.

use std::time::Duration;

use rpc_interceptors_core::Metadata;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Options for configuring individual RPC calls.
///
/// A call carries an optional absolute deadline (no deadline means the call
/// may run forever) and an optional cancellation token (no token means the
/// caller cannot cancel the call). Interceptors may replace either before the
/// call reaches the transport.
///
/// # Example
///
/// ```ignore
/// use rpc_interceptors_client::CallOptions;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// let cancel = CancellationToken::new();
/// let options = CallOptions::new()
///     .timeout(Duration::from_secs(5))
///     .cancellation_token(cancel.clone())
///     .header("authorization", "Bearer token123");
///
/// let call = client.unary(&SAY_HELLO, request, options);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Headers sent with this call.
    pub(crate) headers: Metadata,
    /// Absolute deadline for this call.
    pub(crate) deadline: Option<Instant>,
    /// Caller-owned cancellation signal.
    pub(crate) cancellation: Option<CancellationToken>,
}

impl CallOptions {
    /// Create new default call options: no headers, no deadline, not cancellable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the absolute deadline for this call.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the deadline to `now + timeout`.
    ///
    /// A timeout too large to be represented leaves the call without a deadline.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use rpc_interceptors_client::CallOptions;
    /// use std::time::Duration;
    ///
    /// let options = CallOptions::new().timeout(Duration::from_secs(30));
    /// ```
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    /// Remove any deadline from this call.
    pub fn no_deadline(mut self) -> Self {
        self.deadline = None;
        self
    }

    /// Get the configured deadline, if any.
    pub fn get_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, saturating at zero.
    ///
    /// Returns `None` if the call has no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Attach a cancellation token that the caller can use to cancel the call.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Get the cancellation token, if the call is cancellable.
    pub fn get_cancellation_token(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Returns `true` if the caller attached a cancellation token.
    pub fn is_cancellable(&self) -> bool {
        self.cancellation.is_some()
    }

    /// Returns `true` if the call's cancellation token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Add a custom header for this call.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use rpc_interceptors_client::CallOptions;
    ///
    /// let options = CallOptions::new()
    ///     .header("authorization", "Bearer token123")
    ///     .header("x-request-id", "abc-123");
    /// ```
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name, value)
            .expect("invalid header name or value");
        self
    }

    /// Try to add a custom header for this call.
    ///
    /// Returns `None` if the header name or value is invalid.
    pub fn try_header(mut self, name: &str, value: &str) -> Option<Self> {
        self.headers.insert(name, value).ok()?;
        Some(self)
    }

    /// Set all headers for this call, replacing any existing headers.
    pub fn headers(mut self, headers: Metadata) -> Self {
        self.headers = headers;
        self
    }

    /// Get a reference to the headers.
    pub fn get_headers(&self) -> &Metadata {
        &self.headers
    }

    /// Get a mutable reference to the headers.
    pub fn headers_mut(&mut self) -> &mut Metadata {
        &mut self.headers
    }

    /// Take the headers out of these options, leaving an empty collection.
    pub(crate) fn take_headers(&mut self) -> Metadata {
        std::mem::take(&mut self.headers)
    }
}
