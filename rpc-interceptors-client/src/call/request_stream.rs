//! Client-side request stream.

use rpc_interceptors_core::Status;
use tokio::sync::mpsc;

/// The sending half of a client-streaming or duplex call.
///
/// Messages are handed to the transport through a bounded channel. Call
/// [`complete`](RequestStream::complete) to signal the end of the request
/// stream; dropping the handle has the same effect.
#[derive(Debug)]
pub struct RequestStream<Req> {
    sender: Option<mpsc::Sender<Req>>,
}

impl<Req> RequestStream<Req> {
    /// Create a request stream and the receiver the transport reads from.
    ///
    /// A `buffer` of zero is treated as one.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Req>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { sender: Some(tx) }, rx)
    }

    /// A request stream that is already completed.
    pub fn closed() -> Self {
        Self { sender: None }
    }

    /// Send one request message.
    ///
    /// Fails with `FailedPrecondition` after [`complete`](RequestStream::complete)
    /// and with `Cancelled` once the transport stops reading.
    pub async fn send(&self, message: Req) -> Result<(), Status> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| Status::failed_precondition("request stream already completed"))?;

        sender
            .send(message)
            .await
            .map_err(|_| Status::cancelled("call is no longer accepting requests"))
    }

    /// Signal that no more requests will be sent. Idempotent.
    pub fn complete(&mut self) {
        self.sender = None;
    }

    /// Returns `true` once the stream has been completed.
    pub fn is_completed(&self) -> bool {
        self.sender.is_none()
    }
}
