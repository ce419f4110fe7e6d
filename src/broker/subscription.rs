//! Subscription runner
//!
//! A [`SubscriptionRunner`] owns one pull loop for one
//! [`SubscriptionBinding`]. The loop runs on its own tokio task, decodes each
//! record and awaits the [`EnvelopeHandler`] before pulling the next one, so a
//! slow handler slows consumption.
//!
//! ```text
//!  stopped ──start──► starting ──subscribed──► running ──stop──► stopped
//!                        │                        │
//!                        └──── fatal error ───────┴──────► failed ──stop──► stopped
//! ```
//!
//! Handler errors and panics are logged and the loop moves on to the next
//! record. [`SubscriptionRegistry`] keeps at most one active runner per binding.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::backend::{BrokerRecord, ConsumerConnector, RecordStream, SubscriptionBinding};
use super::gate::BrokerGate;
use crate::message::{Envelope, decode};
use crate::utils::RelayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Stopped,
    Starting,
    Running,
    Failed,
}

impl RunnerState {
    pub fn is_active(self) -> bool {
        matches!(self, RunnerState::Starting | RunnerState::Running)
    }
}

/// Receives every envelope pulled by a runner.
#[async_trait]
pub trait EnvelopeHandler: Send + Sync {
    async fn handle(&self, envelope: Envelope<Value>) -> Result<(), RelayError>;
}

struct Worker {
    binding: SubscriptionBinding,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct SubscriptionRunner {
    connector: Arc<dyn ConsumerConnector>,
    gate: BrokerGate,
    state: Arc<watch::Sender<RunnerState>>,
    worker: Mutex<Option<Worker>>,
}

impl fmt::Debug for SubscriptionRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRunner")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SubscriptionRunner {
    pub fn new(connector: Arc<dyn ConsumerConnector>, gate: BrokerGate) -> Self {
        let (state, _) = watch::channel(RunnerState::Stopped);
        Self {
            connector,
            gate,
            state: Arc::new(state),
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RunnerState {
        *self.state.borrow()
    }

    /// Watch channel that follows every state transition.
    pub fn watch_state(&self) -> watch::Receiver<RunnerState> {
        self.state.subscribe()
    }

    /// Subscribes to the broker and starts the pull loop.
    ///
    /// Rejected while this runner is starting or running. With the gate
    /// closed this is a no-op and the runner stays stopped.
    pub async fn start(
        &self,
        binding: SubscriptionBinding,
        handler: Arc<dyn EnvelopeHandler>,
    ) -> Result<(), RelayError> {
        if !self.gate.is_enabled() {
            info!(%binding, "Messaging disabled, subscription not started");
            return Ok(());
        }

        let mut worker = self.worker.lock().await;
        if self.state().is_active() {
            return Err(RelayError::AlreadyRunning(binding));
        }
        // a previous loop that ended on its own leaves a finished task behind
        worker.take();

        self.state.send_replace(RunnerState::Starting);
        let stream = match self.connector.subscribe(&binding).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(%binding, error = %e, "Subscription failed to start");
                self.state.send_replace(RunnerState::Failed);
                return Err(e.into());
            }
        };

        let (stop, stop_rx) = watch::channel(false);
        self.state.send_replace(RunnerState::Running);
        let task = tokio::spawn(pull_loop(
            binding.clone(),
            stream,
            handler,
            stop_rx,
            Arc::clone(&self.state),
        ));
        info!(%binding, "Subscription started");

        *worker = Some(Worker {
            binding,
            stop,
            task,
        });
        Ok(())
    }

    /// Stops the pull loop after the in-flight delivery and releases the
    /// broker stream. Safe to call in any state.
    pub async fn stop(&self) {
        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            let _ = worker.stop.send(true);
            if let Err(e) = worker.task.await {
                error!(binding = %worker.binding, error = %e, "Pull loop aborted");
            }
            info!(binding = %worker.binding, "Subscription stopped");
        }
        self.state.send_replace(RunnerState::Stopped);
    }
}

async fn pull_loop(
    binding: SubscriptionBinding,
    mut stream: Box<dyn RecordStream>,
    handler: Arc<dyn EnvelopeHandler>,
    mut stop: watch::Receiver<bool>,
    state: Arc<watch::Sender<RunnerState>>,
) {
    let final_state = loop {
        let next = tokio::select! {
            biased;
            _ = stop.changed() => break RunnerState::Stopped,
            next = stream.next_record() => next,
        };

        match next {
            None => {
                info!(%binding, "Record stream ended");
                break RunnerState::Stopped;
            }
            Some(Err(e)) if e.is_fatal() => {
                error!(%binding, error = %e, "Unrecoverable broker error");
                break RunnerState::Failed;
            }
            Some(Err(e)) => warn!(%binding, error = %e, "Broker error while polling"),
            Some(Ok(record)) => deliver(&binding, handler.as_ref(), record).await,
        }
    };

    stream.close().await;
    state.send_replace(final_state);
}

async fn deliver(binding: &SubscriptionBinding, handler: &dyn EnvelopeHandler, record: BrokerRecord) {
    let envelope: Envelope<Value> = decode(&record.payload);
    if envelope.is_blank() {
        warn!(
            %binding,
            partition = record.partition,
            offset = record.offset,
            "Skipping record that could not be decoded"
        );
        return;
    }
    debug!(%binding, partition = record.partition, offset = record.offset, "Delivering record");

    match AssertUnwindSafe(handler.handle(envelope)).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(
            %binding,
            offset = record.offset,
            error = %e,
            "Error consuming message"
        ),
        Err(panic) => error!(
            %binding,
            offset = record.offset,
            panic = panic_message(panic.as_ref()),
            "Handler panicked while consuming message"
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Runners keyed by binding.
pub struct SubscriptionRegistry {
    connector: Arc<dyn ConsumerConnector>,
    gate: BrokerGate,
    runners: Mutex<HashMap<SubscriptionBinding, Arc<SubscriptionRunner>>>,
}

impl SubscriptionRegistry {
    pub fn new(connector: Arc<dyn ConsumerConnector>, gate: BrokerGate) -> Self {
        Self {
            connector,
            gate,
            runners: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a fresh runner for `binding`. Fails if one is already active.
    pub async fn start(
        &self,
        binding: SubscriptionBinding,
        handler: Arc<dyn EnvelopeHandler>,
    ) -> Result<Arc<SubscriptionRunner>, RelayError> {
        let mut runners = self.runners.lock().await;
        if runners
            .get(&binding)
            .is_some_and(|runner| runner.state().is_active())
        {
            return Err(RelayError::AlreadyRunning(binding));
        }

        let runner = Arc::new(SubscriptionRunner::new(
            Arc::clone(&self.connector),
            self.gate.clone(),
        ));
        runner.start(binding.clone(), handler).await?;
        runners.insert(binding, Arc::clone(&runner));
        Ok(runner)
    }

    pub async fn get(&self, binding: &SubscriptionBinding) -> Option<Arc<SubscriptionRunner>> {
        self.runners.lock().await.get(binding).cloned()
    }

    /// Returns `false` if no runner was registered for `binding`.
    ///
    /// The binding stays claimed until its runner has fully stopped, so a
    /// concurrent [`SubscriptionRegistry::start`] waits for the drain.
    pub async fn stop(&self, binding: &SubscriptionBinding) -> bool {
        let mut runners = self.runners.lock().await;
        let Some(runner) = runners.get(binding).cloned() else {
            return false;
        };
        runner.stop().await;
        runners.remove(binding);
        true
    }

    pub async fn stop_all(&self) {
        let mut runners = self.runners.lock().await;
        for runner in runners.values() {
            runner.stop().await;
        }
        runners.clear();
    }
}
