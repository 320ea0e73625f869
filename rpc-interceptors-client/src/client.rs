//! Intercepted RPC client.
//!
//! This module provides the main [`Client`] type for making calls through an
//! interceptor chain.

use std::sync::Arc;

use rpc_interceptors_core::Status;
#[cfg(feature = "tracing")]
use tracing::info_span;

use crate::builder::ClientBuilder;
use crate::call::{
    AsyncClientStreamingCall, AsyncDuplexStreamingCall, AsyncServerStreamingCall, AsyncUnaryCall,
};
use crate::config::{CallOptions, Intercept};
use crate::context::CallContext;
use crate::method::Method;
use crate::transport::Transport;

/// RPC client that runs every call through an interceptor chain.
///
/// The client is generic over `T`, the transport, and `I`, the interceptor
/// chain type. `I` defaults to `()` (no interceptors). Cloning is cheap: the
/// transport and the chain are shared behind an `Arc`.
///
/// Use [`ClientBuilder`] or [`Client::builder`] to create an instance.
///
/// # Example
///
/// ```ignore
/// use rpc_interceptors_client::{CallOptions, Client, DeadlineOptions, Method, MethodType};
///
/// const SAY_HELLO: Method = Method::new("greet.Greeter", "SayHello", MethodType::Unary);
///
/// let client = Client::builder(transport)
///     .with_global_deadline(DeadlineOptions::from_secs(4))
///     .build();
///
/// let reply = client
///     .unary(&SAY_HELLO, HelloRequest { name: "WTF".into() }, CallOptions::new())
///     .await?;
/// ```
pub struct Client<T, I = ()> {
    inner: Arc<ClientInner<T, I>>,
}

pub(crate) struct ClientInner<T, I> {
    pub(crate) transport: T,
    pub(crate) host: Option<String>,
    pub(crate) interceptor: I,
}

impl<T, I> Clone for Client<T, I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, I: std::fmt::Debug> std::fmt::Debug for Client<T, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.inner.host)
            .field("interceptor", &self.inner.interceptor)
            .finish_non_exhaustive()
    }
}

impl<T> Client<T, ()> {
    /// Create a new ClientBuilder for `transport`.
    ///
    /// This is a convenience method equivalent to `ClientBuilder::new(transport)`.
    pub fn builder(transport: T) -> ClientBuilder<T, ()> {
        ClientBuilder::new(transport)
    }
}

impl<T, I> Client<T, I> {
    pub(crate) fn from_inner(inner: Arc<ClientInner<T, I>>) -> Self {
        Self { inner }
    }

    /// The host reported in every call's context.
    pub fn host(&self) -> Option<&str> {
        self.inner.host.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    pub fn interceptor(&self) -> &I {
        &self.inner.interceptor
    }

    fn context(&self, method: &Method, options: CallOptions) -> CallContext {
        CallContext::new(*method, self.inner.host.clone(), options)
    }
}

impl<T, I: Intercept> Client<T, I> {
    /// Make a unary call, blocking the current thread until it completes.
    ///
    /// Must not be called from within an async task; use
    /// `tokio::task::spawn_blocking` or [`unary`](Client::unary) there.
    pub fn blocking_unary<Req, Res>(
        &self,
        method: &Method,
        request: Req,
        options: CallOptions,
    ) -> Result<Res, Status>
    where
        T: Transport<Req, Res>,
        Req: Send + 'static,
        Res: Send + 'static,
    {
        #[cfg(feature = "tracing")]
        let _span = info_span!(
            "rpc.call",
            rpc.method = %method,
            rpc.type = "unary",
            otel.kind = "client",
        )
        .entered();

        let ctx = self.context(method, options);
        let inner = &*self.inner;
        inner
            .interceptor
            .blocking_unary(request, ctx, |request, ctx| {
                inner.transport.blocking_unary(request, ctx)
            })
    }

    /// Start an async unary call.
    ///
    /// Interceptors run before this returns; the returned handle resolves
    /// with the response.
    pub fn unary<Req, Res>(
        &self,
        method: &Method,
        request: Req,
        options: CallOptions,
    ) -> AsyncUnaryCall<Res>
    where
        T: Transport<Req, Res>,
        Req: Send + 'static,
        Res: Send + 'static,
    {
        #[cfg(feature = "tracing")]
        let _span = info_span!(
            "rpc.call",
            rpc.method = %method,
            rpc.type = "unary",
            otel.kind = "client",
        )
        .entered();

        let ctx = self.context(method, options);
        let inner = &*self.inner;
        inner
            .interceptor
            .unary(request, ctx, |request, ctx| inner.transport.unary(request, ctx))
    }

    /// Start an async server-streaming call.
    pub fn server_streaming<Req, Res>(
        &self,
        method: &Method,
        request: Req,
        options: CallOptions,
    ) -> AsyncServerStreamingCall<Res>
    where
        T: Transport<Req, Res>,
        Req: Send + 'static,
        Res: Send + 'static,
    {
        #[cfg(feature = "tracing")]
        let _span = info_span!(
            "rpc.call",
            rpc.method = %method,
            rpc.type = "server_stream",
            otel.kind = "client",
        )
        .entered();

        let ctx = self.context(method, options);
        let inner = &*self.inner;
        inner.interceptor.server_streaming(request, ctx, |request, ctx| {
            inner.transport.server_streaming(request, ctx)
        })
    }

    /// Start an async client-streaming call.
    ///
    /// Send requests through the handle's request stream and complete it
    /// before awaiting the response.
    pub fn client_streaming<Req, Res>(
        &self,
        method: &Method,
        options: CallOptions,
    ) -> AsyncClientStreamingCall<Req, Res>
    where
        T: Transport<Req, Res>,
        Req: Send + 'static,
        Res: Send + 'static,
    {
        #[cfg(feature = "tracing")]
        let _span = info_span!(
            "rpc.call",
            rpc.method = %method,
            rpc.type = "client_stream",
            otel.kind = "client",
        )
        .entered();

        let ctx = self.context(method, options);
        let inner = &*self.inner;
        inner
            .interceptor
            .client_streaming(ctx, |ctx| inner.transport.client_streaming(ctx))
    }

    /// Start an async duplex-streaming call.
    pub fn duplex_streaming<Req, Res>(
        &self,
        method: &Method,
        options: CallOptions,
    ) -> AsyncDuplexStreamingCall<Req, Res>
    where
        T: Transport<Req, Res>,
        Req: Send + 'static,
        Res: Send + 'static,
    {
        #[cfg(feature = "tracing")]
        let _span = info_span!(
            "rpc.call",
            rpc.method = %method,
            rpc.type = "bidi_stream",
            otel.kind = "client",
        )
        .entered();

        let ctx = self.context(method, options);
        let inner = &*self.inner;
        inner
            .interceptor
            .duplex_streaming(ctx, |ctx| inner.transport.duplex_streaming(ctx))
    }
}
