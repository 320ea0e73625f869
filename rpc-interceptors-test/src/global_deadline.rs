//! Global deadline scenarios against the greeter.
//!
//! The greeter takes three seconds to answer.

use std::time::Duration;

use anyhow::{bail, ensure};
use futures::StreamExt;
use rpc_interceptors_client::{
    CallOptions, Chain, Client, Code, DeadlineInterceptor, DeadlineOptions, Status,
    StreamItemCollection,
};
use tokio::task::spawn_blocking;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use crate::greeter::{GreeterTransport, HelloReply, HelloRequest, SAY_HELLO, SAY_HELLO_STREAM};
use crate::report::{Case, CaseResult, run_cases};

const REMOTE_DELAY: Duration = Duration::from_secs(3);
const SLACK: Duration = Duration::from_millis(500);

type GreeterClient = Client<GreeterTransport, Chain<(), DeadlineInterceptor>>;

fn client(delay: Duration, global_secs: u64) -> GreeterClient {
    Client::builder(GreeterTransport::new(delay))
        .with_global_deadline(DeadlineOptions::from_secs(global_secs))
        .build()
}

fn ensure_status<T: std::fmt::Debug>(
    result: Result<T, Status>,
    code: Code,
    started: Instant,
    after: Duration,
) -> anyhow::Result<()> {
    let elapsed = started.elapsed();
    match result {
        Ok(reply) => bail!("expected {code}, got reply {reply:?}"),
        Err(status) if status.code() == code => {}
        Err(status) => bail!("expected {code}, got {status}"),
    }
    ensure!(
        elapsed >= after && elapsed < after + SLACK,
        "call ended after {elapsed:?}, expected about {after:?}"
    );
    Ok(())
}

/// Caller has no deadline; the global one is longer than the service.
async fn completes_within_global_deadline() -> anyhow::Result<()> {
    let client = client(REMOTE_DELAY, 4);
    let reply: HelloReply = client
        .unary(&SAY_HELLO, HelloRequest::new("WTF"), CallOptions::new())
        .await?;
    ensure!(reply.message == "Hello WTF", "unexpected reply {:?}", reply.message);
    Ok(())
}

async fn blocking_completes_within_global_deadline() -> anyhow::Result<()> {
    let client = client(REMOTE_DELAY, 4);
    let reply: HelloReply = spawn_blocking(move || {
        client.blocking_unary(&SAY_HELLO, HelloRequest::new("WTF"), CallOptions::new())
    })
    .await??;
    ensure!(reply.message == "Hello WTF", "unexpected reply {:?}", reply.message);
    Ok(())
}

/// Caller asks for two seconds; the global four does not extend it.
async fn caller_deadline_wins() -> anyhow::Result<()> {
    let client = client(REMOTE_DELAY, 4);
    let started = Instant::now();
    let options = CallOptions::new().deadline(started + Duration::from_secs(2));
    let result: Result<HelloReply, Status> = client
        .unary(&SAY_HELLO, HelloRequest::new("WTF"), options)
        .await;
    ensure_status(result, Code::DeadlineExceeded, started, Duration::from_secs(2))
}

async fn blocking_caller_deadline_wins() -> anyhow::Result<()> {
    let client = client(REMOTE_DELAY, 4);
    let started = Instant::now();
    let options = CallOptions::new()
        .deadline(started + Duration::from_secs(2))
        .cancellation_token(CancellationToken::new());
    let result: Result<HelloReply, Status> = spawn_blocking(move || {
        client.blocking_unary(&SAY_HELLO, HelloRequest::new("WTF"), options)
    })
    .await?;
    ensure_status(result, Code::DeadlineExceeded, started, Duration::from_secs(2))
}

/// No caller deadline; the global two seconds applies.
async fn global_deadline_applies() -> anyhow::Result<()> {
    let client = client(REMOTE_DELAY, 2);
    let started = Instant::now();
    let result: Result<HelloReply, Status> = client
        .unary(&SAY_HELLO, HelloRequest::new("WTF"), CallOptions::new())
        .await;
    ensure_status(result, Code::DeadlineExceeded, started, Duration::from_secs(2))
}

async fn blocking_global_deadline_applies() -> anyhow::Result<()> {
    let client = client(REMOTE_DELAY, 2);
    let started = Instant::now();
    let result: Result<HelloReply, Status> = spawn_blocking(move || {
        client.blocking_unary(&SAY_HELLO, HelloRequest::new("WTF"), CallOptions::new())
    })
    .await?;
    ensure_status(result, Code::DeadlineExceeded, started, Duration::from_secs(2))
}

/// A reply every 1.5 seconds against a two second global deadline.
async fn stream_cut_off_by_global_deadline() -> anyhow::Result<()> {
    let client = client(Duration::from_millis(1500), 2);
    let started = Instant::now();
    let mut call = client.server_streaming(
        &SAY_HELLO_STREAM,
        HelloRequest::new("WTF"),
        CallOptions::new(),
    );

    let mut replies: Vec<HelloReply> = Vec::new();
    let mut failure = None;
    while let Some(item) = call.next().await {
        match item {
            Ok(reply) => replies.push(reply),
            Err(status) => {
                failure = Some(status);
                break;
            }
        }
    }
    ensure!(
        replies.len() == 1,
        "expected one reply before the deadline, got {}",
        replies.len()
    );
    ensure!(
        replies[0].message == "Hello WTF #0",
        "unexpected reply {:?}",
        replies[0].message
    );
    ensure!(
        replies.last_stream_item_id() == Some(0),
        "resume position is {:?}",
        replies.last_stream_item_id()
    );

    let result: Result<(), Status> = failure.map_or(Ok(()), Err);
    ensure_status(result, Code::DeadlineExceeded, started, Duration::from_secs(2))?;

    let status = call.status().map(|s| s.code());
    ensure!(status == Some(Code::DeadlineExceeded), "call status is {status:?}");
    call.dispose();
    Ok(())
}

/// The caller cancels before either deadline.
async fn caller_cancellation_propagates() -> anyhow::Result<()> {
    let client = client(REMOTE_DELAY, 4);
    let cancel = CancellationToken::new();
    let started = Instant::now();
    let options = CallOptions::new().cancellation_token(cancel.clone());
    let call = client.unary(&SAY_HELLO, HelloRequest::new("WTF"), options);

    tokio::spawn(async move {
        sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });
    let result: Result<HelloReply, Status> = call.await;
    ensure_status(result, Code::Canceled, started, Duration::from_secs(1))
}

pub async fn run() -> Vec<CaseResult> {
    run_cases(vec![
        Case::new("completes within global deadline", completes_within_global_deadline()),
        Case::new(
            "blocking call completes within global deadline",
            blocking_completes_within_global_deadline(),
        ),
        Case::new("caller deadline wins", caller_deadline_wins()),
        Case::new("blocking caller deadline wins", blocking_caller_deadline_wins()),
        Case::new("global deadline applies", global_deadline_applies()),
        Case::new("blocking global deadline applies", blocking_global_deadline_applies()),
        Case::new("stream cut off by global deadline", stream_cut_off_by_global_deadline()),
        Case::new("caller cancellation propagates", caller_cancellation_propagates()),
    ])
    .await
}
