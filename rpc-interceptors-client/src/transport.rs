//! Transport seam for outgoing calls.
//!
//! The interceptor layer does not talk to the network. Whatever carries the
//! call (an HTTP/2 channel, an in-process service, a test double) implements
//! [`Transport`] and receives the [`CallContext`] produced by the innermost
//! interceptor.
//!
//! A transport is expected to honour the context it is given:
//!
//! - end the call with `DeadlineExceeded` once `options().get_deadline()` passes;
//! - end the call with `Cancelled` once `options().get_cancellation_token()` fires;
//! - send `options().get_headers()` as request metadata.
//!
//! [`CallTracker`](crate::CallTracker) is a ready-made [`CallState`](crate::CallState)
//! implementation for transports that have no call object of their own.

#[cfg(test)]
pub(crate) mod mock;

use rpc_interceptors_core::Status;

use crate::call::{
    AsyncClientStreamingCall, AsyncDuplexStreamingCall, AsyncServerStreamingCall, AsyncUnaryCall,
};
use crate::context::CallContext;

/// Carries calls of every shape for one request/response message pair.
///
/// Only [`blocking_unary`](Transport::blocking_unary) is required. The async
/// shapes default to a call failed with `Unimplemented`, so a transport only
/// implements the shapes it supports.
pub trait Transport<Req, Res>: Send + Sync
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    /// Perform a unary call, blocking the current thread until it completes.
    fn blocking_unary(&self, request: Req, ctx: CallContext) -> Result<Res, Status>;

    /// Start an async unary call.
    fn unary(&self, request: Req, ctx: CallContext) -> AsyncUnaryCall<Res> {
        let _ = request;
        AsyncUnaryCall::failed(unimplemented(&ctx))
    }

    /// Start an async server-streaming call.
    fn server_streaming(&self, request: Req, ctx: CallContext) -> AsyncServerStreamingCall<Res> {
        let _ = request;
        AsyncServerStreamingCall::failed(unimplemented(&ctx))
    }

    /// Start an async client-streaming call.
    fn client_streaming(&self, ctx: CallContext) -> AsyncClientStreamingCall<Req, Res> {
        AsyncClientStreamingCall::failed(unimplemented(&ctx))
    }

    /// Start an async duplex-streaming call.
    fn duplex_streaming(&self, ctx: CallContext) -> AsyncDuplexStreamingCall<Req, Res> {
        AsyncDuplexStreamingCall::failed(unimplemented(&ctx))
    }
}

fn unimplemented(ctx: &CallContext) -> Status {
    Status::unimplemented(format!(
        "{} calls are not supported by this transport: {}",
        ctx.method().kind().as_str(),
        ctx.method()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CallOptions;
    use crate::method::{Method, MethodType};
    use rpc_interceptors_core::Code;

    struct BlockingOnly;

    impl Transport<String, String> for BlockingOnly {
        fn blocking_unary(&self, request: String, _ctx: CallContext) -> Result<String, Status> {
            Ok(request)
        }
    }

    #[tokio::test]
    async fn test_unsupported_shapes_fail_with_unimplemented() {
        const LIST: Method = Method::new("test.Greeter", "List", MethodType::ServerStreaming);
        let ctx = CallContext::new(LIST, None, CallOptions::new());

        let call = BlockingOnly.server_streaming("a".to_string(), ctx.clone());
        assert_eq!(call.status().unwrap().code(), Code::Unimplemented);

        let call = BlockingOnly.duplex_streaming(ctx);
        let status = call.status().unwrap();
        assert_eq!(status.code(), Code::Unimplemented);
        assert!(status.message().unwrap().contains("test.Greeter/List"));
    }
}
