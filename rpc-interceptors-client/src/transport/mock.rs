//! In-memory greeter transport used by unit tests.
//!
//! Every call records the context it receives and then waits `delay` before
//! answering `"Hello {name}"`, ending early with `DeadlineExceeded` or
//! `Cancelled` when the context says so. A deadline that passes at the same
//! instant as the cancellation token fires reports `DeadlineExceeded`.

use std::future::{Future, pending};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream;
use rpc_interceptors_core::{Metadata, Status};
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

use super::Transport;
use crate::call::{
    AsyncClientStreamingCall, AsyncDuplexStreamingCall, AsyncServerStreamingCall, AsyncUnaryCall,
    CallTracker, RequestStream,
};
use crate::context::CallContext;

/// Number of messages a server-streaming call yields.
pub(crate) const STREAM_LEN: usize = 3;

#[derive(Clone)]
pub(crate) struct MockTransport {
    delay: Duration,
    seen: Arc<Mutex<Vec<CallContext>>>,
}

impl MockTransport {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The context of the most recent call.
    pub(crate) fn last_context(&self) -> Option<CallContext> {
        self.seen.lock().ok()?.last().cloned()
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or_default()
    }

    fn record(&self, ctx: &CallContext) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(ctx.clone());
        }
    }
}

#[derive(Clone)]
struct Limits {
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl Limits {
    fn of(ctx: &CallContext) -> Self {
        Self {
            deadline: ctx.options().get_deadline(),
            cancellation: ctx.options().get_cancellation_token().cloned(),
        }
    }

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

    async fn wait(&self, delay: Duration) -> Result<(), Status> {
        tokio::select! {
            biased;
            status = self.expired() => Err(status),
            _ = sleep(delay) => Ok(()),
        }
    }
}

/// Run `work` under `limits`, reporting the outcome through `tracker`.
async fn tracked<T>(
    tracker: CallTracker,
    limits: Limits,
    work: impl Future<Output = T>,
) -> Result<T, Status> {
    tracker.send_headers(Metadata::empty());
    let outcome = tokio::select! {
        biased;
        status = limits.expired() => Err(status),
        _ = tracker.abandoned() => Err(Status::cancelled("call abandoned")),
        value = work => Ok(value),
    };
    match &outcome {
        Ok(_) => tracker.finish(Status::ok(), Metadata::empty()),
        Err(status) => tracker.finish(status.clone(), Metadata::empty()),
    }
    outcome
}

impl Transport<String, String> for MockTransport {
    fn blocking_unary(&self, request: String, ctx: CallContext) -> Result<String, Status> {
        self.record(&ctx);
        let limits = Limits::of(&ctx);
        let until = Instant::now() + self.delay;
        loop {
            let now = Instant::now();
            if limits.deadline.is_some_and(|deadline| now >= deadline) {
                return Err(Status::deadline_exceeded("deadline exceeded"));
            }
            if limits.cancellation.as_ref().is_some_and(|t| t.is_cancelled()) {
                return Err(Status::cancelled("call cancelled"));
            }
            if now >= until {
                return Ok(format!("Hello {request}"));
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn unary(&self, request: String, ctx: CallContext) -> AsyncUnaryCall<String> {
        self.record(&ctx);
        let (tracker, state) = CallTracker::new();
        let limits = Limits::of(&ctx);
        let delay = self.delay;
        AsyncUnaryCall::new(
            tracked(tracker, limits, async move {
                sleep(delay).await;
                format!("Hello {request}")
            }),
            state,
        )
    }

    fn server_streaming(&self, request: String, ctx: CallContext) -> AsyncServerStreamingCall<String> {
        self.record(&ctx);
        let (tracker, state) = CallTracker::new();
        let limits = Limits::of(&ctx);
        let delay = self.delay;
        tracker.send_headers(Metadata::empty());

        let responses = stream::unfold(
            (0, Some(tracker)),
            move |(sent, tracker)| {
                let limits = limits.clone();
                let request = request.clone();
                async move {
                    let tracker = tracker?;
                    if sent == STREAM_LEN {
                        tracker.finish(Status::ok(), Metadata::empty());
                        return None;
                    }
                    match limits.wait(delay).await {
                        Ok(()) => Some((Ok(format!("Hello {request} #{sent}")), (sent + 1, Some(tracker)))),
                        Err(status) => {
                            tracker.finish(status.clone(), Metadata::empty());
                            Some((Err(status), (sent, None)))
                        }
                    }
                }
            },
        );
        AsyncServerStreamingCall::new(responses, state)
    }

    fn client_streaming(&self, ctx: CallContext) -> AsyncClientStreamingCall<String, String> {
        self.record(&ctx);
        let (requests, mut rx) = RequestStream::channel(16);
        let (tracker, state) = CallTracker::new();
        let limits = Limits::of(&ctx);
        let delay = self.delay;
        let response = tracked(tracker, limits, async move {
            let mut names = Vec::new();
            while let Some(name) = rx.recv().await {
                names.push(name);
            }
            sleep(delay).await;
            format!("Hello {}", names.join(", "))
        });
        AsyncClientStreamingCall::new(requests, response, state)
    }

    fn duplex_streaming(&self, ctx: CallContext) -> AsyncDuplexStreamingCall<String, String> {
        self.record(&ctx);
        let (requests, rx) = RequestStream::channel(16);
        let (tracker, state) = CallTracker::new();
        let limits = Limits::of(&ctx);
        let delay = self.delay;
        tracker.send_headers(Metadata::empty());

        let responses = stream::unfold(Some((rx, tracker)), move |open| {
            let limits = limits.clone();
            async move {
                let (mut rx, tracker) = open?;
                let next = tokio::select! {
                    biased;
                    status = limits.expired() => Err(status),
                    name = rx.recv() => Ok(name),
                };
                match next {
                    Ok(Some(name)) => match limits.wait(delay).await {
                        Ok(()) => Some((Ok(format!("Hello {name}")), Some((rx, tracker)))),
                        Err(status) => {
                            tracker.finish(status.clone(), Metadata::empty());
                            Some((Err(status), None))
                        }
                    },
                    Ok(None) => {
                        tracker.finish(Status::ok(), Metadata::empty());
                        None
                    }
                    Err(status) => {
                        tracker.finish(status.clone(), Metadata::empty());
                        Some((Err(status), None))
                    }
                }
            }
        });
        AsyncDuplexStreamingCall::new(requests, responses, state)
    }
}
