//! The isolated worker context: a dedicated thread running a current-thread
//! tokio runtime around a [`DataStore`].
//!
//! The UI side talks to it only through two bounded channels of serialized
//! envelopes. Nothing else crosses the thread boundary.

use std::io;
use std::thread::JoinHandle;

use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::kernel::message::Envelope;
use crate::kernel::services::bus::{ChannelError, InboundReceiver, MessageChannel};
use crate::kernel::store::DataStore;

pub const WORKER_THREAD_NAME: &str = "dtool-worker";

/// Outbound channel to the worker. Posting never blocks: a full queue is an error.
#[derive(Clone)]
pub struct WorkerChannel {
    tx: Sender<String>,
}

impl WorkerChannel {
    pub fn new(tx: Sender<String>) -> Self {
        Self { tx }
    }
}

impl MessageChannel for WorkerChannel {
    fn post(&self, payload: String) -> Result<(), ChannelError> {
        self.tx.try_send(payload).map_err(ChannelError::from)
    }
}

pub struct WorkerThread {
    handle: JoinHandle<()>,
}

impl WorkerThread {
    /// Waits for the worker to drain and exit. The worker stops once every
    /// `WorkerChannel` clone has been dropped.
    pub fn join(self) {
        if self.handle.join().is_err() {
            tracing::error!("worker thread panicked");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

pub struct Worker {
    channel: WorkerChannel,
    inbound: InboundReceiver,
    thread: WorkerThread,
}

impl Worker {
    /// Spawns the worker with `capacity` slots in each direction (at least one).
    pub fn spawn(capacity: usize) -> io::Result<Self> {
        let capacity = capacity.max(1);
        let (request_tx, request_rx) = mpsc::channel::<String>(capacity);
        let (response_tx, response_rx) = mpsc::channel::<String>(capacity);

        let handle = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to create worker runtime");
                        return;
                    }
                };
                runtime.block_on(run_worker(DataStore::new(), request_rx, response_tx));
            })?;

        tracing::debug!(capacity, "worker spawned");
        Ok(Self {
            channel: WorkerChannel::new(request_tx),
            inbound: response_rx,
            thread: WorkerThread { handle },
        })
    }

    pub fn channel(&self) -> WorkerChannel {
        self.channel.clone()
    }

    pub fn into_parts(self) -> (WorkerChannel, InboundReceiver, WorkerThread) {
        (self.channel, self.inbound, self.thread)
    }
}

/// Processes requests in arrival order until the request side closes or the
/// response side is dropped.
pub async fn run_worker(
    mut store: DataStore,
    mut requests: Receiver<String>,
    responses: Sender<String>,
) {
    while let Some(payload) = requests.recv().await {
        let envelope = match Envelope::decode(&payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "worker dropped malformed message");
                continue;
            }
        };

        let kind = envelope.kind;
        let result = store.dispatch(envelope);
        tracing::debug!(
            kind = kind.as_str(),
            responses = result.responses.len(),
            state_changed = result.state_changed,
            "worker handled message"
        );

        for response in result.responses {
            let encoded = match response.encode() {
                Ok(encoded) => encoded,
                Err(e) => {
                    tracing::error!(error = %e, "worker failed to encode response");
                    continue;
                }
            };
            if responses.send(encoded).await.is_err() {
                tracing::debug!("response channel closed, worker exiting");
                return;
            }
        }
    }
    tracing::debug!("request channel closed, worker exiting");
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/adapters/worker.rs"]
mod tests;
