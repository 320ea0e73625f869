//! Metadata rewriting scenarios against the greeter.

use std::time::Duration;

use anyhow::{bail, ensure};
use rpc_interceptors_client::{CallOptions, Client, Code, DeadlineOptions, Status};
use tokio::task::spawn_blocking;

use crate::greeter::{GreeterTransport, HelloReply, HelloRequest, SAY_HELLO};
use crate::report::{Case, CaseResult, run_cases};

const REMOTE_DELAY: Duration = Duration::from_millis(100);

/// The transform adds a header to a call that carried none.
async fn header_reaches_transport() -> anyhow::Result<()> {
    let client = Client::builder(GreeterTransport::new(REMOTE_DELAY))
        .with_metadata(|mut metadata| {
            metadata.insert("x-trace", "abc")?;
            Ok(metadata)
        })
        .build();

    let reply: HelloReply = client
        .unary(&SAY_HELLO, HelloRequest::new("WTF"), CallOptions::new())
        .await?;
    ensure!(reply.message == "Hello WTF", "unexpected reply {:?}", reply.message);

    let Some(headers) = client.transport().last_headers() else {
        bail!("transport saw no call");
    };
    ensure!(headers.len() == 1, "expected one header, got {}", headers.len());
    ensure!(
        headers.get("x-trace") == Some("abc"),
        "x-trace is {:?}",
        headers.get("x-trace")
    );
    Ok(())
}

/// Caller headers survive unless the transform replaces them.
async fn transform_sees_caller_headers() -> anyhow::Result<()> {
    let client = Client::builder(GreeterTransport::new(REMOTE_DELAY))
        .with_metadata(|mut metadata| {
            let user = metadata.get("x-user").unwrap_or("anonymous").to_string();
            metadata.insert("x-trace", &format!("trace-{user}"))?;
            Ok(metadata)
        })
        .build();

    let options = CallOptions::new().header("x-user", "wtf");
    let _: HelloReply = client
        .unary(&SAY_HELLO, HelloRequest::new("WTF"), options)
        .await?;

    let Some(headers) = client.transport().last_headers() else {
        bail!("transport saw no call");
    };
    ensure!(headers.get("x-user") == Some("wtf"), "x-user was dropped");
    ensure!(
        headers.get("x-trace") == Some("trace-wtf"),
        "x-trace is {:?}",
        headers.get("x-trace")
    );
    Ok(())
}

/// A failing transform stops the call before it reaches the transport.
async fn failing_transform_aborts_call() -> anyhow::Result<()> {
    let client = Client::builder(GreeterTransport::new(REMOTE_DELAY))
        .with_metadata(|_| Err(Status::new(Code::PermissionDenied, "no credentials")))
        .build();

    let result: Result<HelloReply, Status> = client
        .unary(&SAY_HELLO, HelloRequest::new("WTF"), CallOptions::new())
        .await;
    match result {
        Err(status) if status.code() == Code::PermissionDenied => {}
        Err(status) => bail!("expected permission_denied, got {status}"),
        Ok(reply) => bail!("expected permission_denied, got reply {reply:?}"),
    }
    ensure!(
        client.transport().last_headers().is_none(),
        "transport was reached"
    );
    Ok(())
}

/// Metadata and deadline interceptors together on the blocking path.
async fn blocking_call_with_both_interceptors() -> anyhow::Result<()> {
    let client = Client::builder(GreeterTransport::new(REMOTE_DELAY))
        .with_metadata(|mut metadata| {
            metadata.insert("x-trace", "abc")?;
            Ok(metadata)
        })
        .with_global_deadline(DeadlineOptions::from_secs(4))
        .build();

    let transport = client.transport().clone();
    let reply: HelloReply = spawn_blocking(move || {
        client.blocking_unary(&SAY_HELLO, HelloRequest::new("WTF"), CallOptions::new())
    })
    .await??;
    ensure!(reply.message == "Hello WTF", "unexpected reply {:?}", reply.message);
    ensure!(
        transport
            .last_headers()
            .is_some_and(|h| h.get("x-trace") == Some("abc")),
        "x-trace missing on blocking call"
    );
    Ok(())
}

pub async fn run() -> Vec<CaseResult> {
    run_cases(vec![
        Case::new("header reaches transport", header_reaches_transport()),
        Case::new("transform sees caller headers", transform_sees_caller_headers()),
        Case::new("failing transform aborts call", failing_transform_aborts_call()),
        Case::new(
            "blocking call with both interceptors",
            blocking_call_with_both_interceptors(),
        ),
    ])
    .await
}
