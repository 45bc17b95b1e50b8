//! Thread-driven position source.
//!
//! Wraps any pull-style [`PositionProvider`] into a push-style
//! [`PositionSource`]: each subscription gets its own named worker thread
//! that polls the provider at the requested interval and feeds the
//! [`PositionReceiver`].
//!
//! ```text
//!  subscribe() ──spawn──▶ ┌ watch-N thread ─────────────────────────┐
//!                         │ loop {                                  │
//!                         │   provider.next_fix() ──▶ receiver      │
//!                         │   stop_rx.recv_timeout(interval)        │
//!                         │ }                                       │
//!                         └─────────────────────────────────────────┘
//!  unsubscribe() ── drop stop_tx (wakes the wait) ── join
//! ```
//!
//! The wait between polls is a channel receive with a timeout, so stop
//! takes effect immediately instead of after a full interval.  Stop cannot
//! interrupt a blocking `next_fix`: unsubscribe waits for that call to
//! return, and the fix it produces is discarded.

use std::sync::mpsc::{self, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::app::ports::{PositionProvider, PositionSource, Subscription, WatchRequest};
use crate::app::watch::PositionReceiver;
use crate::error::PositionError;

/// Worker stack size; the loop itself needs very little.
const WORKER_STACK_BYTES: usize = 64 * 1024;

/// Spawns one polling worker per subscription, each with a fresh clone
/// of the template provider.
pub struct PolledPositionSource<P> {
    template: P,
}

impl<P> PolledPositionSource<P>
where
    P: PositionProvider + Clone + Sync + 'static,
{
    pub fn new(template: P) -> Self {
        Self { template }
    }
}

impl<P> PositionSource for PolledPositionSource<P>
where
    P: PositionProvider + Clone + Sync + 'static,
{
    fn subscribe(
        &self,
        request: WatchRequest,
        receiver: PositionReceiver,
    ) -> Result<Box<dyn Subscription>, PositionError> {
        let provider = self.template.clone();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let name = format!("watch-{}", receiver.episode_id());
        let interval = request.interval.max(request.fastest_interval);

        let handle = thread::Builder::new()
            .name(name.clone())
            .stack_size(WORKER_STACK_BYTES)
            .spawn(move || run_worker(provider, receiver, &stop_rx, interval))
            .map_err(|e| {
                warn!("{}: worker spawn failed: {}", name, e);
                PositionError::SourceFailed
            })?;

        info!("{}: polling every {:?}", name, interval);
        Ok(Box::new(PolledSubscription {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }))
    }
}

fn run_worker<P: PositionProvider>(
    mut provider: P,
    mut receiver: PositionReceiver,
    stop_rx: &mpsc::Receiver<()>,
    interval: core::time::Duration,
) {
    loop {
        let next = provider.next_fix();
        if !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty)) {
            debug!("watch-{}: stopped during fix", receiver.episode_id());
            return;
        }
        match next {
            Ok(Some(fix)) => receiver.on_sample(fix),
            Ok(None) => {
                debug!("watch-{}: provider exhausted", receiver.episode_id());
                return;
            }
            Err(e) => receiver.on_error(e),
        }

        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            // Stop requested or the subscription handle is gone.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!("watch-{}: stopped", receiver.episode_id());
                return;
            }
        }
    }
}

/// Handle for one polling worker.
struct PolledSubscription {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PolledSubscription {
    fn stop_and_join(&mut self) {
        // Dropping the sender wakes the worker's wait with `Disconnected`.
        self.stop_tx.take();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            // Unsubscribed from inside a delivery: the worker exits as soon
            // as the current callback returns.
            return;
        }
        if handle.join().is_err() {
            warn!("watch worker panicked");
        }
    }
}

impl Subscription for PolledSubscription {
    fn unsubscribe(mut self: Box<Self>) {
        self.stop_and_join();
    }
}

impl Drop for PolledSubscription {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
