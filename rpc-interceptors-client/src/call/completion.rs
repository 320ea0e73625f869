//! Call state decorated with a linked cancellation.

use futures::future::BoxFuture;
use rpc_interceptors_core::{Metadata, Status};

use super::CallState;
use crate::cancel::LinkedCancellation;

/// Whether a [`CallCompletion`] has released its resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionState {
    Active,
    Disposed,
}

/// Wraps an inner [`CallState`] so that disposing the call also releases
/// the [`LinkedCancellation`] created for it.
///
/// Accessors delegate to the inner state. Disposal releases the inner state
/// first, then the linked cancellation, and happens exactly once whether it
/// is triggered by [`dispose`](CallState::dispose) or by `Drop`.
#[derive(Debug)]
pub struct CallCompletion<S: CallState> {
    inner: S,
    linked: LinkedCancellation,
    state: CompletionState,
}

impl<S: CallState> CallCompletion<S> {
    pub fn new(inner: S, linked: LinkedCancellation) -> Self {
        Self {
            inner,
            linked,
            state: CompletionState::Active,
        }
    }

    pub fn completion_state(&self) -> CompletionState {
        self.state
    }

    pub fn is_disposed(&self) -> bool {
        self.state == CompletionState::Disposed
    }

    /// The linked cancellation owned by this call.
    pub fn linked(&self) -> &LinkedCancellation {
        &self.linked
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: CallState> CallState for CallCompletion<S> {
    fn response_headers(&self) -> BoxFuture<'static, Result<Metadata, Status>> {
        self.inner.response_headers()
    }

    fn status(&self) -> Option<Status> {
        self.inner.status()
    }

    fn trailers(&self) -> Option<Metadata> {
        self.inner.trailers()
    }

    fn dispose(&mut self) {
        if self.state == CompletionState::Disposed {
            return;
        }
        self.state = CompletionState::Disposed;
        self.inner.dispose();
        self.linked.dispose();
    }
}

impl<S: CallState> Drop for CallCompletion<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}
