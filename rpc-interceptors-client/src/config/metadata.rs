//! Metadata rewriting.

use rpc_interceptors_core::{Metadata, Status};

use super::Intercept;
use crate::call::{
    AsyncClientStreamingCall, AsyncDuplexStreamingCall, AsyncServerStreamingCall, AsyncUnaryCall,
};
use crate::context::CallContext;

/// A transformation of outgoing call metadata.
///
/// Implemented for every `Fn(Metadata) -> Result<Metadata, Status>`.
pub trait MetadataTransform: Send + Sync {
    fn transform(&self, metadata: Metadata) -> Result<Metadata, Status>;
}

impl<F> MetadataTransform for F
where
    F: Fn(Metadata) -> Result<Metadata, Status> + Send + Sync,
{
    fn transform(&self, metadata: Metadata) -> Result<Metadata, Status> {
        self(metadata)
    }
}

/// Adapts an infallible transformation. Built by [`MetadataInterceptor::map`].
#[derive(Clone)]
pub struct MapMetadata<G>(G);

impl<G> MetadataTransform for MapMetadata<G>
where
    G: Fn(Metadata) -> Metadata + Send + Sync,
{
    fn transform(&self, metadata: Metadata) -> Result<Metadata, Status> {
        Ok((self.0)(metadata))
    }
}

/// Interceptor that rewrites the outgoing headers of every call.
///
/// The transform receives the call's current headers (empty if none were
/// set) and returns the headers to send. If it fails, the call is never
/// started: blocking calls return the error and async calls resolve to it.
///
/// # Example
///
/// ```ignore
/// use rpc_interceptors_client::{ClientBuilder, MetadataInterceptor};
///
/// let trace = MetadataInterceptor::new(|mut metadata| {
///     metadata.insert("x-trace", "abc")?;
///     Ok(metadata)
/// });
///
/// let client = ClientBuilder::new(transport).with_interceptor(trace).build();
/// ```
#[derive(Clone)]
pub struct MetadataInterceptor<F> {
    transform: F,
}

impl<F> MetadataInterceptor<F>
where
    F: Fn(Metadata) -> Result<Metadata, Status> + Send + Sync,
{
    pub fn new(transform: F) -> Self {
        Self { transform }
    }
}

impl<G> MetadataInterceptor<MapMetadata<G>>
where
    G: Fn(Metadata) -> Metadata + Send + Sync,
{
    /// Create an interceptor from a transform that cannot fail.
    pub fn map(transform: G) -> Self {
        Self {
            transform: MapMetadata(transform),
        }
    }
}

impl<F: MetadataTransform> MetadataInterceptor<F> {
    fn apply(&self, mut ctx: CallContext) -> Result<CallContext, Status> {
        let headers = ctx.options_mut().take_headers();
        *ctx.options_mut().headers_mut() = self.transform.transform(headers)?;
        Ok(ctx)
    }
}

impl<F> std::fmt::Debug for MetadataInterceptor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataInterceptor").finish()
    }
}

impl<F: MetadataTransform> Intercept for MetadataInterceptor<F> {
    fn blocking_unary<Req, Res, N>(
        &self,
        request: Req,
        ctx: CallContext,
        next: N,
    ) -> Result<Res, Status>
    where
        N: FnOnce(Req, CallContext) -> Result<Res, Status>,
    {
        next(request, self.apply(ctx)?)
    }

    fn unary<Req, Res, N>(&self, request: Req, ctx: CallContext, next: N) -> AsyncUnaryCall<Res>
    where
        Req: Send + 'static,
        Res: Send + 'static,
        N: FnOnce(Req, CallContext) -> AsyncUnaryCall<Res>,
    {
        match self.apply(ctx) {
            Ok(ctx) => next(request, ctx),
            Err(status) => AsyncUnaryCall::failed(status),
        }
    }

    fn server_streaming<Req, Res, N>(
        &self,
        request: Req,
        ctx: CallContext,
        next: N,
    ) -> AsyncServerStreamingCall<Res>
    where
        Req: Send + 'static,
        Res: Send + 'static,
        N: FnOnce(Req, CallContext) -> AsyncServerStreamingCall<Res>,
    {
        match self.apply(ctx) {
            Ok(ctx) => next(request, ctx),
            Err(status) => AsyncServerStreamingCall::failed(status),
        }
    }

    fn client_streaming<Req, Res, N>(
        &self,
        ctx: CallContext,
        next: N,
    ) -> AsyncClientStreamingCall<Req, Res>
    where
        Req: Send + 'static,
        Res: Send + 'static,
        N: FnOnce(CallContext) -> AsyncClientStreamingCall<Req, Res>,
    {
        match self.apply(ctx) {
            Ok(ctx) => next(ctx),
            Err(status) => AsyncClientStreamingCall::failed(status),
        }
    }

    fn duplex_streaming<Req, Res, N>(
        &self,
        ctx: CallContext,
        next: N,
    ) -> AsyncDuplexStreamingCall<Req, Res>
    where
        Req: Send + 'static,
        Res: Send + 'static,
        N: FnOnce(CallContext) -> AsyncDuplexStreamingCall<Req, Res>,
    {
        match self.apply(ctx) {
            Ok(ctx) => next(ctx),
            Err(status) => AsyncDuplexStreamingCall::failed(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CallOptions;
    use crate::method::{Method, MethodType};
    use crate::transport::Transport;
    use crate::transport::mock::MockTransport;
    use rpc_interceptors_core::Code;
    use std::time::Duration;

    const SAY_HELLO: Method = Method::new("greet.Greeter", "SayHello", MethodType::Unary);
    const GREET_ALL: Method = Method::new("greet.Greeter", "GreetAll", MethodType::ClientStreaming);

    fn add_trace(mut metadata: Metadata) -> Result<Metadata, Status> {
        metadata.insert("x-trace", "abc")?;
        Ok(metadata)
    }

    #[test]
    fn test_transform_sees_empty_headers_and_adds_one() {
        let transport = MockTransport::new(Duration::ZERO);
        let interceptor = MetadataInterceptor::new(add_trace);
        let ctx = CallContext::new(SAY_HELLO, None, CallOptions::new());

        interceptor
            .blocking_unary("WTF".to_string(), ctx, |req, ctx| transport.blocking_unary(req, ctx))
            .unwrap();

        let sent = transport.last_context().unwrap().options().get_headers().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent.get("x-trace"), Some("abc"));
    }

    #[test]
    fn test_transform_receives_existing_headers() {
        let interceptor = MetadataInterceptor::map(|mut metadata: Metadata| {
            let user = metadata.get("x-user").unwrap_or("nobody").to_uppercase();
            metadata.insert("x-user", &user).unwrap();
            metadata
        });
        let options = CallOptions::new().header("x-user", "ada");
        let ctx = CallContext::new(SAY_HELLO, None, options);

        let seen = interceptor
            .blocking_unary((), ctx, |_, ctx| Ok(ctx.options().get_headers().clone()))
            .unwrap();

        assert_eq!(seen.get("x-user"), Some("ADA"));
    }

    #[test]
    fn test_failed_transform_skips_continuation() {
        let interceptor = MetadataInterceptor::new(|_| Err(Status::invalid_argument("rejected")));
        let ctx = CallContext::new(SAY_HELLO, None, CallOptions::new());
        let mut invoked = false;

        let err = interceptor
            .blocking_unary((), ctx, |_, _| {
                invoked = true;
                Ok(())
            })
            .unwrap_err();

        assert_eq!(err.code(), Code::InvalidArgument);
        assert!(!invoked);
    }

    #[tokio::test]
    async fn test_failed_transform_returns_failed_async_call() {
        let transport = MockTransport::new(Duration::ZERO);
        let interceptor =
            MetadataInterceptor::new(|_| Err(Status::failed_precondition("no credentials")));
        let ctx = CallContext::new(GREET_ALL, None, CallOptions::new());

        let call = interceptor.client_streaming(ctx, |ctx| transport.client_streaming(ctx));

        assert_eq!(transport.calls(), 0);
        assert_eq!(call.status().unwrap().code(), Code::FailedPrecondition);
        assert!(call.requests().is_completed());
        assert_eq!(call.await.unwrap_err().code(), Code::FailedPrecondition);
    }

    #[tokio::test]
    async fn test_invalid_header_surfaces_as_invalid_argument() {
        let transport = MockTransport::new(Duration::ZERO);
        let interceptor = MetadataInterceptor::new(|mut metadata: Metadata| {
            metadata.insert("bad header", "v")?;
            Ok(metadata)
        });
        let ctx = CallContext::new(SAY_HELLO, None, CallOptions::new());

        let call = interceptor.unary("WTF".to_string(), ctx, |req, ctx| transport.unary(req, ctx));

        assert_eq!(call.await.unwrap_err().code(), Code::InvalidArgument);
        assert_eq!(transport.calls(), 0);
    }
}
