//! Client-side RPC interceptors.
//!
//! This crate sits between RPC call sites and whatever transport carries the
//! calls. It provides:
//!
//! - A global deadline interceptor that caps the effective deadline of every
//!   call at `now + timeout`, whatever deadline the caller asked for
//! - A metadata interceptor that rewrites outgoing headers before transmission
//! - Call handles for every call shape: blocking unary, async unary,
//!   server-streaming, client-streaming and duplex-streaming
//! - Compile-time interceptor composition with no dynamic dispatch
//!
//! ## Example
//!
//! ```ignore
//! use rpc_interceptors_client::{CallOptions, Client, DeadlineOptions, Method, MethodType};
//!
//! const SAY_HELLO: Method = Method::new("greet.Greeter", "SayHello", MethodType::Unary);
//!
//! let client = Client::builder(transport)
//!     .with_metadata(|mut metadata| {
//!         metadata.insert("x-trace", "abc")?;
//!         Ok(metadata)
//!     })
//!     .with_global_deadline(DeadlineOptions::from_secs(4))
//!     .build();
//!
//! // Capped at 4 seconds even though the caller asked for 10.
//! let options = CallOptions::new().timeout(Duration::from_secs(10));
//! let reply = client.unary(&SAY_HELLO, HelloRequest { name: "WTF".into() }, options).await?;
//! ```
//!
//! ## Deadlines and Cancellation
//!
//! The effective deadline of a call is `min(caller deadline, now + timeout)`,
//! computed once when the call starts. A call with no caller deadline gets
//! `now + timeout`.
//!
//! When the caller passes a cancellation token in [`CallOptions`], the
//! transport receives a [`LinkedCancellation`] token instead. It fires when
//! the caller cancels or when the timeout elapses, whichever happens first;
//! the timer never cancels the caller's own token.
//!
//! ```ignore
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let call = client.unary(&SAY_HELLO, request, CallOptions::new().cancellation_token(cancel.clone()));
//!
//! // Ends the call with `Cancelled`
//! cancel.cancel();
//! ```
//!
//! ## Call Handles and Disposal
//!
//! Async calls return handles that expose the response (a future or a stream)
//! together with the call's response headers, status and trailers. Every
//! handle can be disposed explicitly; dropping it has the same effect.
//! Disposal is idempotent and releases the call's timer exactly once.
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let mut call = client.server_streaming(&GREET_MANY, request, CallOptions::new());
//! while let Some(reply) = call.next().await {
//!     println!("{:?}", reply?);
//! }
//! println!("trailers: {:?}", call.trailers());
//! call.dispose();
//! ```
//!
//! ## Transports
//!
//! Implement [`Transport`] to carry calls. A transport receives the final
//! [`CallContext`] and is expected to honour its deadline
//! (`DeadlineExceeded`), its cancellation token (`Cancelled`) and its headers.
//! [`CallTracker`] implements the call-state side for transports that have no
//! call object of their own.
//!
//! ## Feature Flags
//!
//! ### Observability
//!
//! | Feature | Description | Dependencies |
//! |---------|-------------|--------------|
//! | `tracing` (default) | Tracing spans and events for intercepted calls | `tracing` |
//!
//! When enabled, each call creates a span with:
//! - `rpc.method`: Procedure name (e.g., "greet.Greeter/SayHello")
//! - `rpc.type`: Call type ("unary", "server_stream", "client_stream", "bidi_stream")
//! - `otel.kind`: "client"
//!
//! The deadline interceptor logs at `debug` when it overrides a caller's
//! deadline and when a call's timer fires.

mod builder;
mod call;
mod cancel;
mod client;
mod config;
mod context;
mod method;
mod transport;

// Re-export core types
pub use rpc_interceptors_core::{
    Code, Metadata, MetadataError, ParseCodeError, Status, StreamItem, StreamItemCollection,
};

pub use builder::ClientBuilder;
pub use call::{
    AsyncCall, AsyncClientStreamingCall, AsyncDuplexStreamingCall, AsyncServerStreamingCall,
    AsyncUnaryCall, CallCompletion, CallState, CallTracker, CompletionState, RequestStream,
    TrackedState,
};
pub use cancel::LinkedCancellation;
pub use client::Client;
pub use config::{
    CallOptions, Chain, DEFAULT_TIMEOUT, DeadlineInterceptor, DeadlineOptions, HeaderInterceptor,
    Intercept, MapMetadata, MetadataInterceptor, MetadataTransform,
};
pub use context::CallContext;
pub use method::{Method, MethodType};
pub use transport::Transport;
