//! Global deadline enforcement.
//!
//! [`DeadlineInterceptor`] caps the deadline of every call at `now + timeout`,
//! whatever deadline the caller asked for, and links the caller's
//! cancellation token with a timer of the same length.
//!
//! # Example
//!
//! ```ignore
//! use rpc_interceptors_client::{ClientBuilder, DeadlineOptions};
//!
//! let client = ClientBuilder::new(transport)
//!     .with_global_deadline(DeadlineOptions::from_secs(4))
//!     .build();
//! ```

use std::time::Duration;

use rpc_interceptors_core::Status;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "tracing")]
use tracing::debug;

use super::Intercept;
use crate::call::{
    AsyncCall, AsyncClientStreamingCall, AsyncDuplexStreamingCall, AsyncServerStreamingCall,
    AsyncUnaryCall, CallCompletion, CallState,
};
use crate::cancel::LinkedCancellation;
use crate::context::CallContext;

/// Default global timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration of the global deadline.
///
/// Deserializes from `{"timeout_ms": 4000}`; a missing `timeout_ms` falls
/// back to [`DEFAULT_TIMEOUT`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineOptions {
    #[serde(rename = "timeout_ms", with = "millis", default = "default_timeout")]
    timeout: Duration,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl DeadlineOptions {
    /// Cap every call at `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// The configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for DeadlineOptions {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(timeout: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Interceptor that enforces a global deadline on every call shape.
///
/// For each call it:
///
/// 1. computes `now + timeout` and installs it as the call's deadline when it
///    is earlier than the caller's (or the caller set none);
/// 2. when the caller supplied a cancellation token, replaces it with a
///    [`LinkedCancellation`] token that also fires after `timeout`.
///
/// The linked cancellation is created whenever the caller's token is present,
/// even if the caller's own deadline is already the stricter one.
///
/// Blocking calls release the linked cancellation before returning. Async
/// calls hand it to a [`CallCompletion`] that wraps the call's state, so it is
/// released exactly once when the call is disposed or dropped.
#[derive(Clone, Debug)]
pub struct DeadlineInterceptor {
    options: DeadlineOptions,
}

impl DeadlineInterceptor {
    pub fn new(options: DeadlineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DeadlineOptions {
        &self.options
    }

    /// Apply the global deadline to `ctx`.
    ///
    /// Returns the adjusted context and, when the caller's token was present,
    /// the linked cancellation now installed in it. The caller owns the
    /// returned cancellation and must keep it alive for the duration of the call.
    pub fn configure_context(&self, ctx: CallContext) -> (CallContext, Option<LinkedCancellation>) {
        self.configure(ctx, LinkedCancellation::new)
    }

    fn configure(
        &self,
        mut ctx: CallContext,
        link: fn(&CancellationToken, Duration) -> LinkedCancellation,
    ) -> (CallContext, Option<LinkedCancellation>) {
        let timeout = self.options.timeout;

        // `None` when the clock would overflow: the global deadline never binds.
        if let Some(global) = Instant::now().checked_add(timeout) {
            let caller = ctx.options().get_deadline();
            if caller.is_none_or(|caller| global < caller) {
                #[cfg(feature = "tracing")]
                debug!(
                    rpc.method = %ctx.method(),
                    timeout_ms = timeout.as_millis() as u64,
                    caller_remaining_ms = ?ctx.options().remaining().map(|d| d.as_millis() as u64),
                    "global deadline overrides caller deadline"
                );
                ctx.options_mut().deadline = Some(global);
            }
        }

        let linked = ctx
            .options()
            .get_cancellation_token()
            .map(|caller| link(caller, timeout));
        if let Some(linked) = &linked {
            ctx.options_mut().cancellation = Some(linked.token().clone());
        }

        (ctx, linked)
    }
}

fn complete_with<C: AsyncCall>(call: C, linked: Option<LinkedCancellation>) -> C {
    match linked {
        Some(linked) => call.map_state(|state| -> Box<dyn CallState> {
            Box::new(CallCompletion::new(state, linked))
        }),
        None => call,
    }
}

impl Intercept for DeadlineInterceptor {
    fn blocking_unary<Req, Res, F>(
        &self,
        request: Req,
        ctx: CallContext,
        next: F,
    ) -> Result<Res, Status>
    where
        F: FnOnce(Req, CallContext) -> Result<Res, Status>,
    {
        let (ctx, linked) = self.configure(ctx, LinkedCancellation::for_blocking);
        let result = next(request, ctx);
        if let Some(mut linked) = linked {
            linked.dispose();
        }
        result
    }

    fn unary<Req, Res, F>(&self, request: Req, ctx: CallContext, next: F) -> AsyncUnaryCall<Res>
    where
        Req: Send + 'static,
        Res: Send + 'static,
        F: FnOnce(Req, CallContext) -> AsyncUnaryCall<Res>,
    {
        let (ctx, linked) = self.configure_context(ctx);
        complete_with(next(request, ctx), linked)
    }

    fn server_streaming<Req, Res, F>(
        &self,
        request: Req,
        ctx: CallContext,
        next: F,
    ) -> AsyncServerStreamingCall<Res>
    where
        Req: Send + 'static,
        Res: Send + 'static,
        F: FnOnce(Req, CallContext) -> AsyncServerStreamingCall<Res>,
    {
        let (ctx, linked) = self.configure_context(ctx);
        complete_with(next(request, ctx), linked)
    }

    fn client_streaming<Req, Res, F>(
        &self,
        ctx: CallContext,
        next: F,
    ) -> AsyncClientStreamingCall<Req, Res>
    where
        Req: Send + 'static,
        Res: Send + 'static,
        F: FnOnce(CallContext) -> AsyncClientStreamingCall<Req, Res>,
    {
        let (ctx, linked) = self.configure_context(ctx);
        complete_with(next(ctx), linked)
    }

    fn duplex_streaming<Req, Res, F>(
        &self,
        ctx: CallContext,
        next: F,
    ) -> AsyncDuplexStreamingCall<Req, Res>
    where
        Req: Send + 'static,
        Res: Send + 'static,
        F: FnOnce(CallContext) -> AsyncDuplexStreamingCall<Req, Res>,
    {
        let (ctx, linked) = self.configure_context(ctx);
        complete_with(next(ctx), linked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::CallTracker;
    use crate::config::CallOptions;
    use crate::method::{Method, MethodType};
    use crate::transport::Transport;
    use crate::transport::mock::{MockTransport, STREAM_LEN};
    use futures::StreamExt;
    use rpc_interceptors_core::Code;
    use tokio_util::sync::CancellationToken;

    const SAY_HELLO: Method = Method::new("greet.Greeter", "SayHello", MethodType::Unary);
    const GREET_MANY: Method = Method::new("greet.Greeter", "GreetMany", MethodType::ServerStreaming);
    const GREET_ALL: Method = Method::new("greet.Greeter", "GreetAll", MethodType::ClientStreaming);
    const CHAT: Method = Method::new("greet.Greeter", "Chat", MethodType::DuplexStreaming);

    fn ctx(method: Method, options: CallOptions) -> CallContext {
        CallContext::new(method, Some("localhost".into()), options)
    }

    fn interceptor(secs: u64) -> DeadlineInterceptor {
        DeadlineInterceptor::new(DeadlineOptions::from_secs(secs))
    }

    // Timers have millisecond resolution.
    fn assert_elapsed(started: Instant, expected: Duration) {
        let elapsed = started.elapsed();
        assert!(elapsed >= expected, "elapsed {elapsed:?} < {expected:?}");
        assert!(elapsed < expected + Duration::from_millis(10), "elapsed {elapsed:?}");
    }

    #[test]
    fn test_default_options() {
        assert_eq!(DeadlineOptions::default().timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_options_from_json() {
        let options: DeadlineOptions = serde_json::from_str(r#"{"timeout_ms": 4000}"#).unwrap();
        assert_eq!(options.timeout(), Duration::from_secs(4));

        let options: DeadlineOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, DeadlineOptions::default());

        let json = serde_json::to_string(&DeadlineOptions::from_millis(250)).unwrap();
        assert_eq!(json, r#"{"timeout_ms":250}"#);
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_deadline_installed_when_caller_has_none() {
        let now = Instant::now();
        let (ctx, linked) = interceptor(4).configure_context(ctx(SAY_HELLO, CallOptions::new()));

        assert_eq!(ctx.options().get_deadline(), Some(now + Duration::from_secs(4)));
        assert!(linked.is_none());
        assert!(ctx.options().get_cancellation_token().is_none());
        assert_eq!(ctx.method(), &SAY_HELLO);
        assert_eq!(ctx.host(), Some("localhost"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_deadline_replaces_later_caller_deadline() {
        let now = Instant::now();
        let options = CallOptions::new().deadline(now + Duration::from_secs(10));
        let (ctx, _) = interceptor(4).configure_context(ctx(SAY_HELLO, options));

        assert_eq!(ctx.options().get_deadline(), Some(now + Duration::from_secs(4)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_caller_deadline_is_kept() {
        let now = Instant::now();
        let options = CallOptions::new().deadline(now + Duration::from_secs(2));
        let (ctx, _) = interceptor(4).configure_context(ctx(SAY_HELLO, options));

        assert_eq!(ctx.options().get_deadline(), Some(now + Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_linked_cancellation_created_even_when_caller_deadline_binds() {
        let caller = CancellationToken::new();
        let now = Instant::now();
        let options = CallOptions::new()
            .deadline(now + Duration::from_secs(1))
            .cancellation_token(caller.clone());
        let (ctx, linked) = interceptor(4).configure_context(ctx(SAY_HELLO, options));

        let linked = linked.expect("linked cancellation");
        assert_eq!(linked.timeout(), Duration::from_secs(4));
        assert_eq!(ctx.options().get_deadline(), Some(now + Duration::from_secs(1)));

        // The transport sees the linked token, which follows the caller's.
        let installed = ctx.options().get_cancellation_token().unwrap().clone();
        caller.cancel();
        assert!(installed.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflowing_timeout_never_binds() {
        let deadline = DeadlineInterceptor::new(DeadlineOptions::new(Duration::MAX));
        let (ctx, _) = deadline.configure_context(ctx(SAY_HELLO, CallOptions::new()));

        assert!(ctx.options().get_deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unary_completes_within_timeout() {
        let transport = MockTransport::new(Duration::from_secs(3));
        let call = interceptor(4).unary("WTF".to_string(), ctx(SAY_HELLO, CallOptions::new()), |req, ctx| {
            transport.unary(req, ctx)
        });

        assert_eq!(call.await.unwrap(), "Hello WTF");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unary_caller_deadline_stricter() {
        let transport = MockTransport::new(Duration::from_secs(3));
        let started = Instant::now();
        let options = CallOptions::new().timeout(Duration::from_secs(2));

        let err = interceptor(4)
            .unary("WTF".to_string(), ctx(SAY_HELLO, options), |req, ctx| {
                transport.unary(req, ctx)
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), Code::DeadlineExceeded);
        assert_elapsed(started, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unary_global_deadline_stricter() {
        let transport = MockTransport::new(Duration::from_secs(3));
        let started = Instant::now();
        let caller = CancellationToken::new();
        let options = CallOptions::new().cancellation_token(caller.clone());

        let mut call = interceptor(2).unary("WTF".to_string(), ctx(SAY_HELLO, options), |req, ctx| {
            transport.unary(req, ctx)
        });
        let err = (&mut call).await.unwrap_err();

        assert_eq!(err.code(), Code::DeadlineExceeded);
        assert_elapsed(started, Duration::from_secs(2));
        assert_eq!(call.status().unwrap().code(), Code::DeadlineExceeded);
        assert!(!caller.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_cancel_ends_call_with_cancelled() {
        let transport = MockTransport::new(Duration::from_secs(3));
        let caller = CancellationToken::new();
        let options = CallOptions::new().cancellation_token(caller.clone());

        let call = interceptor(4).unary("WTF".to_string(), ctx(SAY_HELLO, options), |req, ctx| {
            transport.unary(req, ctx)
        });
        let linked = transport
            .last_context()
            .and_then(|ctx| ctx.options().get_cancellation_token().cloned())
            .unwrap();

        let cancel = caller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });

        let err = call.await.unwrap_err();
        assert_eq!(err.code(), Code::Canceled);
        assert!(linked.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_cancel_leaves_timer_unfired() {
        let caller = CancellationToken::new();
        let options = CallOptions::new().cancellation_token(caller.clone());
        let (ctx, linked) = interceptor(4).configure_context(ctx(SAY_HELLO, options));
        let (_tracker, state) = CallTracker::new();
        let mut completion = CallCompletion::new(state, linked.unwrap());

        tokio::time::sleep(Duration::from_secs(1)).await;
        caller.cancel();
        assert!(ctx.options().is_cancelled());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(completion.linked().is_cancelled());
        assert!(!completion.linked().timed_out());

        completion.dispose();
        assert!(completion.linked().is_disposed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_releases_timer_once() {
        let transport = MockTransport::new(Duration::from_secs(3));
        let caller = CancellationToken::new();
        let options = CallOptions::new().cancellation_token(caller.clone());

        let mut call = interceptor(4).unary("WTF".to_string(), ctx(SAY_HELLO, options), |req, ctx| {
            transport.unary(req, ctx)
        });
        let linked = transport
            .last_context()
            .and_then(|ctx| ctx.options().get_cancellation_token().cloned())
            .unwrap();

        call.dispose();
        call.dispose();
        drop(call);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!linked.is_cancelled());
        assert!(!caller.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_without_cancellation_is_not_wrapped() {
        let transport = MockTransport::new(Duration::from_secs(1));
        let call = interceptor(4).unary("WTF".to_string(), ctx(SAY_HELLO, CallOptions::new()), |req, ctx| {
            transport.unary(req, ctx)
        });

        assert!(transport.last_context().unwrap().options().get_cancellation_token().is_none());
        assert_eq!(call.await.unwrap(), "Hello WTF");
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_streaming_cut_by_global_deadline() {
        let transport = MockTransport::new(Duration::from_secs(1));
        let options = CallOptions::new().cancellation_token(CancellationToken::new());

        let mut call = interceptor(2).server_streaming(
            "WTF".to_string(),
            ctx(GREET_MANY, options),
            |req, ctx| transport.server_streaming(req, ctx),
        );

        let mut received = Vec::new();
        while let Some(item) = call.next().await {
            received.push(item);
        }

        assert!(received.len() < STREAM_LEN + 1);
        let last = received.pop().unwrap().unwrap_err();
        assert_eq!(last.code(), Code::DeadlineExceeded);
        assert!(received.iter().all(|item| item.is_ok()));
        assert_eq!(call.status().unwrap().code(), Code::DeadlineExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_streaming_within_timeout() {
        let transport = MockTransport::new(Duration::from_secs(1));
        let options = CallOptions::new().cancellation_token(CancellationToken::new());

        let mut call = interceptor(4).client_streaming(ctx(GREET_ALL, options), |ctx| {
            transport.client_streaming(ctx)
        });
        call.requests().send("a".to_string()).await.unwrap();
        call.requests().send("b".to_string()).await.unwrap();
        call.requests_mut().complete();

        assert_eq!((&mut call).await.unwrap(), "Hello a, b");
        assert!(call.status().unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplex_streaming_cut_by_global_deadline() {
        let transport = MockTransport::new(Duration::from_secs(3));
        let options = CallOptions::new().cancellation_token(CancellationToken::new());

        let mut call = interceptor(2).duplex_streaming(ctx(CHAT, options), |ctx| {
            transport.duplex_streaming(ctx)
        });
        call.requests().send("a".to_string()).await.unwrap();

        let err = call.next().await.unwrap().unwrap_err();
        assert_eq!(err.code(), Code::DeadlineExceeded);
        assert!(call.next().await.is_none());
    }

    #[test]
    fn test_blocking_unary_global_deadline_without_runtime() {
        let transport = MockTransport::new(Duration::from_millis(500));
        let deadline = DeadlineInterceptor::new(DeadlineOptions::from_millis(30));
        let options = CallOptions::new().cancellation_token(CancellationToken::new());

        let err = deadline
            .blocking_unary("WTF".to_string(), ctx(SAY_HELLO, options), |req, ctx| {
                transport.blocking_unary(req, ctx)
            })
            .unwrap_err();

        assert!(err.code().is_timeout_or_cancel());
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn test_blocking_unary_timer_fires_on_blocked_current_thread_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let deadline = DeadlineInterceptor::new(DeadlineOptions::from_millis(30));
        let options = CallOptions::new().cancellation_token(CancellationToken::new());

        // The continuation ignores the deadline and blocks the runtime thread
        // until the linked token fires.
        let err = runtime
            .block_on(async {
                deadline.blocking_unary((), ctx(SAY_HELLO, options), |_, ctx| {
                    let token = ctx.options().get_cancellation_token().cloned().unwrap();
                    let started = std::time::Instant::now();
                    while !token.is_cancelled() && started.elapsed() < Duration::from_secs(5) {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    if token.is_cancelled() {
                        Err(Status::cancelled("linked token fired"))
                    } else {
                        Ok(())
                    }
                })
            })
            .unwrap_err();

        assert_eq!(err.code(), Code::Canceled);
    }

    #[test]
    fn test_blocking_unary_releases_linked_cancellation() {
        let transport = MockTransport::new(Duration::from_millis(5));
        let deadline = DeadlineInterceptor::new(DeadlineOptions::from_millis(50));
        let caller = CancellationToken::new();
        let options = CallOptions::new().cancellation_token(caller.clone());

        let reply = deadline
            .blocking_unary("WTF".to_string(), ctx(SAY_HELLO, options), |req, ctx| {
                transport.blocking_unary(req, ctx)
            })
            .unwrap();
        assert_eq!(reply, "Hello WTF");

        let linked = transport
            .last_context()
            .and_then(|ctx| ctx.options().get_cancellation_token().cloned())
            .unwrap();
        std::thread::sleep(Duration::from_millis(150));
        assert!(!linked.is_cancelled());
    }
}
