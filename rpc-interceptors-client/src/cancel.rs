//! Linked cancellation with a timeout.
//!
//! A [`LinkedCancellation`] combines the caller's cancellation token with a
//! timer: the combined token fires when the caller cancels or when the timer
//! elapses, whichever happens first. It is created for a single call and must
//! not outlive it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "tracing")]
use tracing::{debug, trace, warn};

/// A cancellation token linked to the caller's token and to a timeout.
///
/// Cancelling the caller's token cancels the linked token. The timer cancels
/// only the linked token, never the caller's.
///
/// The timer runs as a Tokio task when a runtime is available and on a
/// dedicated thread otherwise, so blocking calls made outside a runtime are
/// covered as well. Blocking calls use [`for_blocking`], which also takes
/// the thread timer on a current-thread runtime.
///
/// [`for_blocking`]: LinkedCancellation::for_blocking
///
/// Disposal stops the timer. It happens exactly once: [`dispose`] is
/// idempotent and `Drop` disposes if nothing did before.
///
/// [`dispose`]: LinkedCancellation::dispose
pub struct LinkedCancellation {
    token: CancellationToken,
    timer: Option<Timer>,
    timed_out: Arc<AtomicBool>,
    timeout: Duration,
    disposed: bool,
}

enum Timer {
    Task(AbortHandle),
    // Dropping the sender wakes the timer thread, which then exits without firing.
    Thread(mpsc::Sender<()>),
}

impl Timer {
    fn stop(self) {
        match self {
            Timer::Task(handle) => handle.abort(),
            Timer::Thread(stop) => drop(stop),
        }
    }
}

impl LinkedCancellation {
    /// Link `caller` with a timer that fires after `timeout`.
    pub fn new(caller: &CancellationToken, timeout: Duration) -> Self {
        Self::start(caller, timeout, false)
    }

    /// Like [`new`](LinkedCancellation::new), for a call that blocks the
    /// current thread until it completes.
    ///
    /// A current-thread runtime cannot poll a timer task while its only
    /// thread is blocked, so there the timer runs on its own thread.
    pub fn for_blocking(caller: &CancellationToken, timeout: Duration) -> Self {
        Self::start(caller, timeout, true)
    }

    fn start(caller: &CancellationToken, timeout: Duration, blocking: bool) -> Self {
        let token = caller.child_token();
        let timed_out = Arc::new(AtomicBool::new(false));
        let timer = start_timer(token.clone(), timeout, Arc::clone(&timed_out), blocking);

        #[cfg(feature = "tracing")]
        trace!(
            timeout_ms = timeout.as_millis() as u64,
            has_timer = timer.is_some(),
            "linked cancellation created"
        );

        Self {
            token,
            timer,
            timed_out,
            timeout,
            disposed: false,
        }
    }

    /// The combined token to hand to the transport.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The timeout this cancellation was created with.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns `true` if the combined token has fired, from either source.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns `true` if the timer, rather than the caller, fired the token.
    pub fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::Acquire)
    }

    /// Returns `true` once the timer has been released.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Stop the timer and release it.
    ///
    /// Disposing does not cancel the token. Calling this more than once is a no-op.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }

        #[cfg(feature = "tracing")]
        trace!(timed_out = self.timed_out(), "linked cancellation disposed");
    }
}

impl Drop for LinkedCancellation {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for LinkedCancellation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedCancellation")
            .field("timeout", &self.timeout)
            .field("cancelled", &self.is_cancelled())
            .field("timed_out", &self.timed_out())
            .field("disposed", &self.disposed)
            .finish()
    }
}

fn start_timer(
    token: CancellationToken,
    timeout: Duration,
    timed_out: Arc<AtomicBool>,
    blocking: bool,
) -> Option<Timer> {
    let runtime = Handle::try_current()
        .ok()
        .filter(|handle| !(blocking && handle.runtime_flavor() == RuntimeFlavor::CurrentThread));
    if let Some(handle) = runtime {
        let task = handle.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => fire(&token, &timed_out, timeout),
                _ = token.cancelled() => {}
            }
        });
        return Some(Timer::Task(task.abort_handle()));
    }

    let (stop, stopped) = mpsc::channel::<()>();
    let spawned = std::thread::Builder::new()
        .name("rpc-deadline-timer".into())
        .spawn(move || {
            if let Err(mpsc::RecvTimeoutError::Timeout) = stopped.recv_timeout(timeout) {
                fire(&token, &timed_out, timeout);
            }
        });

    match spawned {
        Ok(_) => Some(Timer::Thread(stop)),
        Err(_err) => {
            #[cfg(feature = "tracing")]
            warn!(error = %_err, "failed to spawn deadline timer thread; relying on the deadline alone");
            None
        }
    }
}

fn fire(token: &CancellationToken, timed_out: &AtomicBool, _timeout: Duration) {
    if token.is_cancelled() {
        return;
    }
    timed_out.store(true, Ordering::Release);
    token.cancel();

    #[cfg(feature = "tracing")]
    debug!(
        timeout_ms = _timeout.as_millis() as u64,
        "call timeout elapsed, cancelling"
    );
}
