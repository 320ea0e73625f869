//! Interceptors for outgoing calls.
//!
//! An interceptor sits between the client and the transport. For each call
//! shape it receives the request (where the shape has a single request), the
//! [`CallContext`] and a continuation standing for the rest of the chain. It
//! may rewrite the context, decorate the returned call handle, or refuse the
//! call without invoking the continuation.
//!
//! # Example
//!
//! ```ignore
//! use rpc_interceptors_client::{ClientBuilder, DeadlineOptions, HeaderInterceptor};
//!
//! let client = ClientBuilder::new(transport)
//!     .with_interceptor(HeaderInterceptor::new("authorization", "Bearer token123"))
//!     .with_global_deadline(DeadlineOptions::from_secs(4))
//!     .build();
//! ```

use http::{HeaderName, HeaderValue};
use rpc_interceptors_core::{MetadataError, Status};

use crate::call::{
    AsyncClientStreamingCall, AsyncDuplexStreamingCall, AsyncServerStreamingCall, AsyncUnaryCall,
};
use crate::context::CallContext;

// ============================================================================
// Intercept Trait
// ============================================================================

/// Trait for intercepting calls of every shape.
///
/// Every method has a pass-through default, so an interceptor only overrides
/// the shapes it cares about. The continuation `next` must be called at most
/// once; not calling it aborts the call.
///
/// # Generic Composition
///
/// Interceptors are composed at compile time with the [`Chain`] combinator,
/// so there is no dynamic dispatch between them. The unit type `()` is the
/// base case (no-op interceptor).
///
/// ```ignore
/// use rpc_interceptors_client::{Chain, HeaderInterceptor};
///
/// let auth = HeaderInterceptor::new("authorization", "Bearer token");
/// let trace = HeaderInterceptor::new("x-trace-id", "123");
/// let chain: Chain<HeaderInterceptor, HeaderInterceptor> = Chain(auth, trace);
/// ```
pub trait Intercept: Send + Sync {
    /// Intercept a blocking unary call.
    fn blocking_unary<Req, Res, F>(
        &self,
        request: Req,
        ctx: CallContext,
        next: F,
    ) -> Result<Res, Status>
    where
        F: FnOnce(Req, CallContext) -> Result<Res, Status>,
    {
        next(request, ctx)
    }

    /// Intercept an async unary call.
    fn unary<Req, Res, F>(&self, request: Req, ctx: CallContext, next: F) -> AsyncUnaryCall<Res>
    where
        Req: Send + 'static,
        Res: Send + 'static,
        F: FnOnce(Req, CallContext) -> AsyncUnaryCall<Res>,
    {
        next(request, ctx)
    }

    /// Intercept an async server-streaming call.
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
        next(request, ctx)
    }

    /// Intercept an async client-streaming call.
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
        next(ctx)
    }

    /// Intercept an async duplex-streaming call.
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
        next(ctx)
    }
}

// ============================================================================
// Base Case: Unit Type
// ============================================================================

/// The unit type passes every call through, serving as the base case for
/// generic interceptor chains.
impl Intercept for () {}

// ============================================================================
// Chain Combinator
// ============================================================================

/// A compile-time chain of two interceptors.
///
/// `Chain<A, B>` runs `A` outside `B`: `A` sees the call first, and its
/// continuation runs `B`, whose continuation runs the rest of the chain.
/// Handles returned by the transport travel back through `B` first, then `A`.
///
/// The builder nests chains as interceptors are added, so the first
/// interceptor registered is the outermost one.
///
/// # Example
///
/// ```ignore
/// use rpc_interceptors_client::{Chain, HeaderInterceptor};
///
/// let interceptors = Chain(
///     Chain((), HeaderInterceptor::new("authorization", "Bearer token")),
///     HeaderInterceptor::new("x-trace-id", "abc123"),
/// );
/// ```
#[derive(Clone, Debug)]
pub struct Chain<A, B>(pub A, pub B);

impl<A, B> Intercept for Chain<A, B>
where
    A: Intercept,
    B: Intercept,
{
    #[inline]
    fn blocking_unary<Req, Res, F>(
        &self,
        request: Req,
        ctx: CallContext,
        next: F,
    ) -> Result<Res, Status>
    where
        F: FnOnce(Req, CallContext) -> Result<Res, Status>,
    {
        self.0
            .blocking_unary(request, ctx, |request, ctx| self.1.blocking_unary(request, ctx, next))
    }

    #[inline]
    fn unary<Req, Res, F>(&self, request: Req, ctx: CallContext, next: F) -> AsyncUnaryCall<Res>
    where
        Req: Send + 'static,
        Res: Send + 'static,
        F: FnOnce(Req, CallContext) -> AsyncUnaryCall<Res>,
    {
        self.0
            .unary(request, ctx, |request, ctx| self.1.unary(request, ctx, next))
    }

    #[inline]
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
        self.0.server_streaming(request, ctx, |request, ctx| {
            self.1.server_streaming(request, ctx, next)
        })
    }

    #[inline]
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
        self.0
            .client_streaming(ctx, |ctx| self.1.client_streaming(ctx, next))
    }

    #[inline]
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
        self.0
            .duplex_streaming(ctx, |ctx| self.1.duplex_streaming(ctx, next))
    }
}

// ============================================================================
// Header Interceptor
// ============================================================================

/// A simple interceptor that sets one header on every call.
///
/// An existing header with the same name is replaced.
///
/// # Example
///
/// ```ignore
/// use rpc_interceptors_client::{ClientBuilder, HeaderInterceptor};
///
/// let auth = HeaderInterceptor::new("authorization", "Bearer token123");
/// let client = ClientBuilder::new(transport)
///     .with_interceptor(auth)
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct HeaderInterceptor {
    name: HeaderName,
    value: HeaderValue,
}

impl HeaderInterceptor {
    /// Create a new header interceptor.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    pub fn new(name: &str, value: &str) -> Self {
        Self::try_new(name, value).expect("invalid header")
    }

    /// Try to create a new header interceptor, returning an error if invalid.
    pub fn try_new(name: &str, value: &str) -> Result<Self, MetadataError> {
        let name = name
            .parse()
            .map_err(|_| MetadataError::InvalidKey(name.to_string()))?;
        let value = value
            .parse()
            .map_err(|_| MetadataError::InvalidValue(value.to_string()))?;
        Ok(Self { name, value })
    }

    /// Create a new header interceptor from pre-parsed values.
    pub fn from_parts(name: HeaderName, value: HeaderValue) -> Self {
        Self { name, value }
    }

    fn apply(&self, mut ctx: CallContext) -> CallContext {
        ctx.options_mut()
            .headers_mut()
            .headers_mut()
            .insert(self.name.clone(), self.value.clone());
        ctx
    }
}

impl Intercept for HeaderInterceptor {
    fn blocking_unary<Req, Res, F>(
        &self,
        request: Req,
        ctx: CallContext,
        next: F,
    ) -> Result<Res, Status>
    where
        F: FnOnce(Req, CallContext) -> Result<Res, Status>,
    {
        next(request, self.apply(ctx))
    }

    fn unary<Req, Res, F>(&self, request: Req, ctx: CallContext, next: F) -> AsyncUnaryCall<Res>
    where
        Req: Send + 'static,
        Res: Send + 'static,
        F: FnOnce(Req, CallContext) -> AsyncUnaryCall<Res>,
    {
        next(request, self.apply(ctx))
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
        next(request, self.apply(ctx))
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
        next(self.apply(ctx))
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
        next(self.apply(ctx))
    }
}
