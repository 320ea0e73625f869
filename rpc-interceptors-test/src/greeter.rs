//! In-process greeter service and the transport that reaches it.
//!
//! Requests and replies cross the transport as JSON, the way they would on
//! the wire. The service answers `"Hello {name}"` after a fixed delay.

use std::future::{Future, pending};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream;
use rpc_interceptors_client::{
    AsyncServerStreamingCall, AsyncUnaryCall, CallContext, CallTracker, Metadata, Method,
    MethodType, Status, StreamItem, Transport,
};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

pub const SAY_HELLO: Method = Method::new("hello.HelloWorldService", "SayHello", MethodType::Unary);
pub const SAY_HELLO_STREAM: Method = Method::new(
    "hello.HelloWorldService",
    "SayHelloStream",
    MethodType::ServerStreaming,
);

/// Number of replies a streaming greeting sends.
pub const STREAM_REPLIES: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloRequest {
    pub name: String,
}

impl HelloRequest {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloReply {
    pub message: String,
    /// Position in a streaming greeting; zero for unary replies.
    #[serde(default)]
    pub sequence: u64,
}

impl StreamItem for HelloReply {
    type Id = u64;

    fn stream_item_id(&self) -> u64 {
        self.sequence
    }
}

/// The simulated remote service.
async fn say_hello(body: Vec<u8>, delay: Duration) -> Result<Vec<u8>, Status> {
    let request: HelloRequest = serde_json::from_slice(&body)
        .map_err(|e| Status::invalid_argument(format!("bad request: {e}")))?;
    sleep(delay).await;
    let reply = HelloReply {
        message: format!("Hello {}", request.name),
        sequence: 0,
    };
    serde_json::to_vec(&reply).map_err(|e| Status::internal(e.to_string()))
}

/// Transport to the in-process greeter.
///
/// Honours the call's deadline and cancellation token and remembers the
/// headers of the last call it carried.
#[derive(Clone)]
pub struct GreeterTransport {
    delay: Duration,
    runtime: Handle,
    last_headers: Arc<Mutex<Option<Metadata>>>,
}

impl GreeterTransport {
    /// Must be created inside a Tokio runtime.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            runtime: Handle::current(),
            last_headers: Arc::new(Mutex::new(None)),
        }
    }

    /// Headers received by the most recent call.
    pub fn last_headers(&self) -> Option<Metadata> {
        self.last_headers.lock().ok()?.clone()
    }

    fn receive(&self, ctx: &CallContext) -> Limits {
        if let Ok(mut last) = self.last_headers.lock() {
            *last = Some(ctx.options().get_headers().clone());
        }
        tracing::debug!(
            rpc.method = %ctx.method(),
            remaining_ms = ?ctx.options().remaining().map(|d| d.as_millis()),
            "greeter received call"
        );
        Limits {
            deadline: ctx.options().get_deadline(),
            cancellation: ctx.options().get_cancellation_token().cloned(),
        }
    }

    fn call(
        &self,
        request: HelloRequest,
        ctx: &CallContext,
    ) -> impl Future<Output = Result<HelloReply, Status>> + Send + use<> {
        let limits = self.receive(ctx);
        let delay = self.delay;
        async move {
            let body = serde_json::to_vec(&request).map_err(|e| Status::internal(e.to_string()))?;
            let reply = limits.run(say_hello(body, delay)).await??;
            serde_json::from_slice(&reply).map_err(|e| Status::internal(format!("bad reply: {e}")))
        }
    }
}

#[derive(Clone)]
struct Limits {
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl Limits {
    async fn expired(&self) -> Status {
        let deadline = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => pending().await,
            }
        };
        let cancelled = async {
            match &self.cancellation {
                Some(token) => token.cancelled().await,
                None => pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = deadline => Status::deadline_exceeded("deadline exceeded"),
            _ = cancelled => Status::cancelled("call cancelled"),
        }
    }

    async fn run<T>(&self, work: impl Future<Output = T>) -> Result<T, Status> {
        tokio::select! {
            biased;
            status = self.expired() => Err(status),
            value = work => Ok(value),
        }
    }
}

impl Transport<HelloRequest, HelloReply> for GreeterTransport {
    fn blocking_unary(&self, request: HelloRequest, ctx: CallContext) -> Result<HelloReply, Status> {
        self.runtime.block_on(self.call(request, &ctx))
    }

    fn unary(&self, request: HelloRequest, ctx: CallContext) -> AsyncUnaryCall<HelloReply> {
        let (tracker, state) = CallTracker::new();
        let call = self.call(request, &ctx);
        AsyncUnaryCall::new(
            async move {
                tracker.send_headers(Metadata::empty());
                let result = tokio::select! {
                    result = call => result,
                    _ = tracker.abandoned() => Err(Status::cancelled("call abandoned")),
                };
                match &result {
                    Ok(_) => tracker.finish(Status::ok(), Metadata::empty()),
                    Err(status) => tracker.finish(status.clone(), Metadata::empty()),
                }
                result
            },
            state,
        )
    }

    fn server_streaming(
        &self,
        request: HelloRequest,
        ctx: CallContext,
    ) -> AsyncServerStreamingCall<HelloReply> {
        let (tracker, state) = CallTracker::new();
        tracker.send_headers(Metadata::empty());
        let this = self.clone();

        let replies = stream::unfold((0, Some(tracker)), move |(sent, tracker)| {
            let call = (tracker.is_some() && sent < STREAM_REPLIES).then(|| {
                let request = HelloRequest {
                    name: format!("{} #{sent}", request.name),
                };
                this.call(request, &ctx)
            });
            async move {
                let tracker = tracker?;
                let Some(call) = call else {
                    tracker.finish(Status::ok(), Metadata::empty());
                    return None;
                };
                match call.await {
                    Ok(reply) => {
                        let reply = HelloReply {
                            sequence: sent as u64,
                            ..reply
                        };
                        Some((Ok(reply), (sent + 1, Some(tracker))))
                    }
                    Err(status) => {
                        tracker.finish(status.clone(), Metadata::empty());
                        Some((Err(status), (sent, None)))
                    }
                }
            }
        });
        AsyncServerStreamingCall::new(replies, state)
    }
}
