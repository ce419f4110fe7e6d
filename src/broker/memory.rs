//! In-memory broker
//!
//! A small partitioned log that implements the broker-client traits. It
//! backs the test-suite, and the binary only when `broker.backend` is set to
//! `memory`. Semantics kept from a real broker:
//! - records with the same key land on the same partition,
//! - each consumer group keeps its own per-partition offsets,
//! - a new group starts at the end of the log ("latest"),
//! - replication factor may not exceed the configured node count,
//! - internal topics (`__` prefix) are hidden from metadata listings on request.
//!
//! There is no rebalancing: streams sharing a group share its offsets.
//! A topic recreated under a live stream is read from its beginning.
//!
//! Test builds can queue faults per operation (`inject_fault`), slow down
//! admin calls (`with_admin_delay`) and inspect call counts and stored records.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future;
use tokio::sync::Notify;

use super::backend::{
    AdminClient, BrokerBackend, BrokerError, BrokerRecord, ConsumerConnector, DeliveryFuture,
    DeliveryReport, OutboundRecord, ProducerClient, RecordStream, SubscriptionBinding, TopicSpec,
};

const INTERNAL_PREFIX: &str = "__";

/// Broker operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Operation {
    CreateTopic,
    DeleteTopic,
    ListTopics,
    Send,
    Subscribe,
    Poll,
}

#[derive(Debug)]
struct StoredRecord {
    key: Option<String>,
    payload: Vec<u8>,
}

#[derive(Debug)]
struct MemoryTopic {
    partitions: Vec<Vec<StoredRecord>>,
    replication_factor: i32,
    group_offsets: HashMap<String, Vec<usize>>,
}

impl MemoryTopic {
    fn new(partitions: usize, replication_factor: i32) -> Self {
        Self {
            partitions: (0..partitions).map(|_| Vec::new()).collect(),
            replication_factor,
            group_offsets: HashMap::new(),
        }
    }

    fn ends(&self) -> Vec<usize> {
        self.partitions.iter().map(Vec::len).collect()
    }
}

#[derive(Debug, Default)]
struct State {
    topics: HashMap<String, MemoryTopic>,
    faults: HashMap<Operation, VecDeque<BrokerError>>,
    closed: bool,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    changed: Notify,
    node_count: i32,
    admin_delay: Option<Duration>,
    operations: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub const DEFAULT_NODE_COUNT: i32 = 1;

    pub fn new() -> Self {
        Self::with_nodes(Self::DEFAULT_NODE_COUNT)
    }

    /// A broker cluster of `node_count` nodes; bounds the replication factor.
    pub fn with_nodes(node_count: i32) -> Self {
        Self::build(node_count, None)
    }

    /// Builder step: every admin call of the returned broker waits `delay`
    /// before acting. State of `self` is not carried over.
    #[cfg(test)]
    pub(crate) fn with_admin_delay(self, delay: Duration) -> Self {
        Self::build(self.inner.node_count, Some(delay))
    }

    fn build(node_count: i32, admin_delay: Option<Duration>) -> Self {
        let mut state = State::default();
        state.topics.insert(
            format!("{INTERNAL_PREFIX}consumer_offsets"),
            MemoryTopic::new(1, 1),
        );
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                changed: Notify::new(),
                node_count,
                admin_delay,
                operations: AtomicUsize::new(0),
            }),
        }
    }

    /// Bundles this broker as admin, producer and consumer backend.
    pub fn backend(&self) -> BrokerBackend {
        BrokerBackend {
            admin: Arc::new(self.clone()),
            producer: Arc::new(self.clone()),
            consumer: Arc::new(self.clone()),
        }
    }

    /// Makes the next call of `operation` fail with `error`. Faults queue up.
    #[cfg(test)]
    pub(crate) fn inject_fault(&self, operation: Operation, error: BrokerError) {
        self.lock()
            .faults
            .entry(operation)
            .or_default()
            .push_back(error);
        self.inner.changed.notify_waiters();
    }

    /// Ends every open stream and rejects further calls with [`BrokerError::Closed`].
    pub fn shutdown(&self) {
        self.lock().closed = true;
        self.inner.changed.notify_waiters();
    }

    /// Number of trait calls that reached this broker.
    #[cfg(test)]
    pub(crate) fn operations(&self) -> usize {
        self.inner.operations.load(Ordering::SeqCst)
    }

    pub fn partition_count(&self, topic: &str) -> Option<usize> {
        self.lock().topics.get(topic).map(|t| t.partitions.len())
    }

    pub fn replication_factor(&self, topic: &str) -> Option<i32> {
        self.lock().topics.get(topic).map(|t| t.replication_factor)
    }

    /// Every record currently held by `topic`, partition by partition.
    #[cfg(test)]
    pub(crate) fn records(&self, topic: &str) -> Vec<BrokerRecord> {
        let state = self.lock();
        let Some(t) = state.topics.get(topic) else {
            return Vec::new();
        };
        t.partitions
            .iter()
            .enumerate()
            .flat_map(|(partition, log)| {
                log.iter().enumerate().map(move |(offset, r)| BrokerRecord {
                    topic: topic.to_string(),
                    partition: partition as i32,
                    offset: offset as i64,
                    key: r.key.clone(),
                    payload: r.payload.clone(),
                })
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Counts the call and pops a queued fault for `operation`, if any.
    fn enter(&self, operation: Operation) -> Result<MutexGuard<'_, State>, BrokerError> {
        self.inner.operations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if state.closed {
            return Err(BrokerError::Closed);
        }
        if let Some(fault) = state.faults.get_mut(&operation).and_then(VecDeque::pop_front) {
            return Err(fault);
        }
        Ok(state)
    }

    async fn admin_delay(&self) {
        if let Some(delay) = self.inner.admin_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

/// FNV-1a; stable across runs so tests can rely on key placement.
fn partition_for(key: &str, partitions: usize) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % partitions as u64) as usize
}

#[async_trait]
impl AdminClient for MemoryBroker {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), BrokerError> {
        self.admin_delay().await;
        let mut state = self.enter(Operation::CreateTopic)?;

        if spec.partitions < 1 {
            return Err(BrokerError::InvalidTopic {
                topic: spec.name.clone(),
                reason: format!("partition count must be positive, got {}", spec.partitions),
            });
        }
        if spec.replication_factor < 1 || spec.replication_factor > self.inner.node_count {
            return Err(BrokerError::InvalidTopic {
                topic: spec.name.clone(),
                reason: format!(
                    "replication factor {} outside 1..={}",
                    spec.replication_factor, self.inner.node_count
                ),
            });
        }
        if state.topics.contains_key(&spec.name) {
            return Err(BrokerError::TopicAlreadyExists(spec.name.clone()));
        }

        state.topics.insert(
            spec.name.clone(),
            MemoryTopic::new(spec.partitions as usize, spec.replication_factor),
        );
        drop(state);
        self.inner.changed.notify_waiters();
        Ok(())
    }

    async fn delete_topic(&self, name: &str) -> Result<(), BrokerError> {
        self.admin_delay().await;
        let mut state = self.enter(Operation::DeleteTopic)?;
        if state.topics.remove(name).is_none() {
            return Err(BrokerError::UnknownTopic(name.to_string()));
        }
        drop(state);
        self.inner.changed.notify_waiters();
        Ok(())
    }

    async fn list_topics(&self, include_internal: bool) -> Result<HashSet<String>, BrokerError> {
        self.admin_delay().await;
        let state = self.enter(Operation::ListTopics)?;
        Ok(state
            .topics
            .keys()
            .filter(|name| include_internal || !name.starts_with(INTERNAL_PREFIX))
            .cloned()
            .collect())
    }
}

impl ProducerClient for MemoryBroker {
    fn send(&self, record: OutboundRecord) -> DeliveryFuture {
        future::ready(self.append(record)).boxed()
    }
}

impl MemoryBroker {
    fn append(&self, record: OutboundRecord) -> Result<DeliveryReport, BrokerError> {
        let mut state = self.enter(Operation::Send)?;
        let topic = state
            .topics
            .get_mut(&record.topic)
            .ok_or_else(|| BrokerError::UnknownTopic(record.topic.clone()))?;

        let partition = partition_for(&record.key, topic.partitions.len());
        let log = &mut topic.partitions[partition];
        log.push(StoredRecord {
            key: Some(record.key),
            payload: record.payload,
        });
        let offset = (log.len() - 1) as i64;
        drop(state);

        self.inner.changed.notify_waiters();
        Ok(DeliveryReport {
            topic: record.topic,
            partition: partition as i32,
            offset,
        })
    }
}

#[async_trait]
impl ConsumerConnector for MemoryBroker {
    async fn subscribe(
        &self,
        binding: &SubscriptionBinding,
    ) -> Result<Box<dyn RecordStream>, BrokerError> {
        let mut state = self.enter(Operation::Subscribe)?;
        if let Some(topic) = state.topics.get_mut(&binding.topic) {
            let ends = topic.ends();
            topic
                .group_offsets
                .entry(binding.group_id.clone())
                .or_insert(ends);
        }
        Ok(Box::new(MemoryStream {
            broker: self.clone(),
            binding: binding.clone(),
            cursor: 0,
            closed: false,
        }))
    }
}

struct MemoryStream {
    broker: MemoryBroker,
    binding: SubscriptionBinding,
    cursor: usize,
    closed: bool,
}

impl MemoryStream {
    /// Takes the next unread record for the group, round-robin over partitions.
    fn poll_once(&mut self) -> Option<Result<BrokerRecord, BrokerError>> {
        let mut state = self.broker.lock();
        if state.closed {
            return Some(Err(BrokerError::Closed));
        }
        if let Some(fault) = state
            .faults
            .get_mut(&Operation::Poll)
            .and_then(VecDeque::pop_front)
        {
            return Some(Err(fault));
        }

        let topic = state.topics.get_mut(&self.binding.topic)?;
        let count = topic.partitions.len();
        let offsets = topic
            .group_offsets
            .entry(self.binding.group_id.clone())
            .or_insert_with(|| vec![0; count]);

        for step in 0..count {
            let partition = (self.cursor + step) % count;
            let offset = offsets[partition];
            if let Some(stored) = topic.partitions[partition].get(offset) {
                offsets[partition] += 1;
                self.cursor = partition + 1;
                return Some(Ok(BrokerRecord {
                    topic: self.binding.topic.clone(),
                    partition: partition as i32,
                    offset: offset as i64,
                    key: stored.key.clone(),
                    payload: stored.payload.clone(),
                }));
            }
        }
        None
    }
}

#[async_trait]
impl RecordStream for MemoryStream {
    async fn next_record(&mut self) -> Option<Result<BrokerRecord, BrokerError>> {
        if self.closed {
            return None;
        }
        let broker = self.broker.clone();
        loop {
            let changed = broker.inner.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            if let Some(next) = self.poll_once() {
                return Some(next);
            }
            changed.await;
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
