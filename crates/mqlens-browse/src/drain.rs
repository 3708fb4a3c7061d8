// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drain-and-replay for brokers without a non-destructive read.
//!
//! The queue is emptied in small batches. Each message is either forwarded to
//! a uniquely named holding queue (kept) or dropped (discarded), then the
//! holding queue is moved back onto the original queue in order. Browse keeps
//! everything, delete discards the requested ids and clear discards all.
//!
//! A message is only ever in memory between one receive and one send. When a
//! send fails the message goes back where it came from, so a failure relocates
//! messages into the holding queue rather than losing them. A holding queue
//! that still holds messages after a failed replay is left in place and named
//! in the error.

use async_trait::async_trait;
use mqlens_core::{AdapterSettings, BrowseOptions, Message, MqError};
use tracing::{debug, error, warn};

use crate::outcome::{DeleteOutcome, PendingIds};
use crate::window::{apply_filter, in_window};

/// Destructive queue primitives an adapter exposes for drain-and-replay.
#[async_trait]
pub trait DrainableQueue: Send + Sync {
    /// The broker's own representation of a received message, resent verbatim.
    type Envelope: Send + Sync;

    /// Consumes up to `max` messages from `queue`. Empty once the queue is
    /// drained.
    async fn receive_batch(&self, queue: &str, max: usize) -> Result<Vec<Self::Envelope>, MqError>;

    /// Sends a previously received message to `queue`, preserving its
    /// properties.
    async fn send(&self, queue: &str, envelope: &Self::Envelope) -> Result<(), MqError>;

    fn to_message(&self, envelope: &Self::Envelope) -> Message;

    async fn create_holding_queue(&self, name: &str) -> Result<(), MqError>;

    async fn delete_holding_queue(&self, name: &str) -> Result<(), MqError>;
}

/// What the partition phase does with one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Keep,
    Discard,
}

/// Result of the partition phase.
#[derive(Debug, Default)]
pub struct Partition {
    /// Messages forwarded to the holding queue.
    pub kept: usize,
    /// Messages consumed and not forwarded.
    pub discarded: Vec<Message>,
}

/// A holding queue that is created on first use.
#[derive(Debug)]
pub struct HoldingQueue {
    name: String,
    created: bool,
}

impl HoldingQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    async fn ensure<Q: DrainableQueue>(&mut self, q: &Q) -> Result<(), MqError> {
        if !self.created {
            q.create_holding_queue(&self.name).await?;
            self.created = true;
            debug!(holding_queue = %self.name, "holding queue created");
        }
        Ok(())
    }
}

/// Phase one: empties `queue`, forwarding kept messages to `holding`.
///
/// `classify` sees each message with its zero-based position in the
/// original queue.
pub async fn drain_and_partition<Q, F>(
    q: &Q,
    queue: &str,
    holding: &mut HoldingQueue,
    batch_size: usize,
    mut classify: F,
) -> Result<Partition, MqError>
where
    Q: DrainableQueue,
    F: FnMut(usize, &Message) -> Disposition + Send,
{
    let batch_size = batch_size.max(1);
    let mut partition = Partition::default();
    let mut position = 0usize;
    loop {
        let batch = q.receive_batch(queue, batch_size).await?;
        if batch.is_empty() {
            break;
        }
        let mut batch = batch.into_iter();
        while let Some(envelope) = batch.next() {
            let message = q.to_message(&envelope);
            let disposition = classify(position, &message);
            position += 1;
            if disposition == Disposition::Discard {
                partition.discarded.push(message);
                continue;
            }
            let forwarded = match holding.ensure(q).await {
                Ok(()) => q.send(&holding.name, &envelope).await,
                Err(err) => Err(err),
            };
            if let Err(err) = forwarded {
                warn!(queue, holding_queue = %holding.name, error = %err, "forward to holding queue failed");
                return_to(q, queue, std::iter::once(envelope).chain(batch)).await;
                return Err(err);
            }
            partition.kept += 1;
        }
    }
    debug!(
        queue,
        kept = partition.kept,
        discarded = partition.discarded.len(),
        "queue drained"
    );
    Ok(partition)
}

/// Phase two: moves every message in `holding` back onto `queue`, in order.
/// Returns the number moved.
pub async fn replay<Q>(q: &Q, holding: &str, queue: &str, batch_size: usize) -> Result<usize, MqError>
where
    Q: DrainableQueue,
{
    let batch_size = batch_size.max(1);
    let mut moved = 0usize;
    loop {
        let batch = q.receive_batch(holding, batch_size).await?;
        if batch.is_empty() {
            break;
        }
        let mut batch = batch.into_iter();
        while let Some(envelope) = batch.next() {
            if let Err(err) = q.send(queue, &envelope).await {
                warn!(queue, holding_queue = holding, error = %err, "replay send failed");
                return_to(q, holding, std::iter::once(envelope).chain(batch)).await;
                return Err(err);
            }
            moved += 1;
        }
    }
    Ok(moved)
}

/// Puts in-memory messages back on `queue` after a failed send elsewhere.
async fn return_to<Q, I>(q: &Q, queue: &str, envelopes: I)
where
    Q: DrainableQueue,
    I: Iterator<Item = Q::Envelope> + Send,
{
    for envelope in envelopes {
        if let Err(err) = q.send(queue, &envelope).await {
            let id = q.to_message(&envelope).id;
            error!(queue, message_id = %id, error = %err, "message could not be returned and is lost");
        }
    }
}

/// Runs both phases with a fresh holding queue and removes it afterwards.
///
/// A partition error is returned after the replay has put back whatever was
/// already moved. A replay error leaves the holding queue in place and the
/// returned error names it.
pub async fn drain_and_replay<Q, F>(
    q: &Q,
    queue: &str,
    settings: &AdapterSettings,
    classify: F,
) -> Result<Partition, MqError>
where
    Q: DrainableQueue,
    F: FnMut(usize, &Message) -> Disposition + Send,
{
    let mut holding = HoldingQueue::new(settings.holding_queue_name());
    let partitioned =
        drain_and_partition(q, queue, &mut holding, settings.batch_size, classify).await;
    if !holding.is_created() {
        return partitioned;
    }

    match replay(q, holding.name(), queue, settings.batch_size).await {
        Ok(moved) => {
            if let Ok(partition) = &partitioned
                && partition.kept != moved
            {
                warn!(queue, kept = partition.kept, moved, "replayed count differs from kept count");
            }
            if let Err(err) = q.delete_holding_queue(holding.name()).await {
                warn!(holding_queue = holding.name(), error = %err, "failed to delete empty holding queue");
            }
            partitioned
        }
        Err(err) => {
            error!(queue, holding_queue = holding.name(), "messages stranded in holding queue");
            Err(MqError::transport(
                format!(
                    "replay to `{queue}` failed; remaining messages are in holding queue `{}`",
                    holding.name()
                ),
                err,
            ))
        }
    }
}

/// Browse by draining: every message is kept, the window is snapshotted on
/// the way through.
pub async fn browse_by_drain<Q>(
    q: &Q,
    queue: &str,
    options: &BrowseOptions,
    settings: &AdapterSettings,
) -> Result<Vec<Message>, MqError>
where
    Q: DrainableQueue,
{
    if options.limit == 0 {
        return Ok(Vec::new());
    }
    let mut snapshot = Vec::new();
    drain_and_replay(q, queue, settings, |position, message| {
        if in_window(position, options) {
            snapshot.push(message.clone());
        }
        Disposition::Keep
    })
    .await?;
    Ok(apply_filter(snapshot, options.filter.as_ref()))
}

/// Delete by draining: each requested id discards at most one message.
pub async fn delete_by_drain<Q>(
    q: &Q,
    queue: &str,
    message_ids: &[String],
    settings: &AdapterSettings,
) -> Result<DeleteOutcome, MqError>
where
    Q: DrainableQueue,
{
    let mut pending = PendingIds::new(message_ids);
    if pending.is_done() {
        return Ok(DeleteOutcome::default());
    }
    let partition = drain_and_replay(q, queue, settings, |_, message| {
        if pending.take(&message.id) {
            Disposition::Discard
        } else {
            Disposition::Keep
        }
    })
    .await?;
    Ok(DeleteOutcome::from_pending(
        message_ids,
        partition.discarded.len(),
        &pending,
    ))
}

/// Clear by draining with an empty keep set. Returns the number removed.
pub async fn clear_by_drain<Q>(q: &Q, queue: &str, settings: &AdapterSettings) -> Result<usize, MqError>
where
    Q: DrainableQueue,
{
    let partition = drain_and_replay(q, queue, settings, |_, _| Disposition::Discard).await?;
    Ok(partition.discarded.len())
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use super::*;

    /// In-memory broker with switchable faults.
    #[derive(Default)]
    struct FakeBroker {
        queues: Mutex<HashMap<String, VecDeque<Message>>>,
        /// Sends to queues starting with this prefix fail once `sends_ok`
        /// sends have gone through.
        fail_sends_to: Mutex<Option<(String, usize)>>,
        fail_create: bool,
        created: Mutex<Vec<String>>,
        deleted: Mutex<Vec<String>>,
    }

    impl FakeBroker {
        fn with_queue(name: &str, ids: &[&str]) -> Self {
            let broker = Self::default();
            broker.queues.lock().unwrap().insert(
                name.to_string(),
                ids.iter().map(|id| Message::new(*id, id.as_bytes())).collect(),
            );
            broker
        }

        fn ids(&self, name: &str) -> Vec<String> {
            self.queues
                .lock()
                .unwrap()
                .get(name)
                .map(|q| q.iter().map(|m| m.id.clone()).collect())
                .unwrap_or_default()
        }

        fn fail_sends(&self, prefix: &str, after: usize) {
            *self.fail_sends_to.lock().unwrap() = Some((prefix.to_string(), after));
        }

        fn heal(&self) {
            *self.fail_sends_to.lock().unwrap() = None;
        }
    }

    #[async_trait]
    impl DrainableQueue for FakeBroker {
        type Envelope = Message;

        async fn receive_batch(&self, queue: &str, max: usize) -> Result<Vec<Message>, MqError> {
            let mut queues = self.queues.lock().unwrap();
            let q = queues.entry(queue.to_string()).or_default();
            let n = max.min(q.len());
            Ok(q.drain(..n).collect())
        }

        async fn send(&self, queue: &str, envelope: &Message) -> Result<(), MqError> {
            if let Some((prefix, remaining)) = self.fail_sends_to.lock().unwrap().as_mut()
                && queue.starts_with(prefix.as_str())
            {
                if *remaining == 0 {
                    return Err(MqError::transport_msg("send refused"));
                }
                *remaining -= 1;
            }
            self.queues
                .lock()
                .unwrap()
                .entry(queue.to_string())
                .or_default()
                .push_back(envelope.clone());
            Ok(())
        }

        fn to_message(&self, envelope: &Message) -> Message {
            envelope.clone()
        }

        async fn create_holding_queue(&self, name: &str) -> Result<(), MqError> {
            if self.fail_create {
                return Err(MqError::AuthorizationDenied("cannot declare queue".into()));
            }
            self.created.lock().unwrap().push(name.to_string());
            self.queues
                .lock()
                .unwrap()
                .insert(name.to_string(), VecDeque::new());
            Ok(())
        }

        async fn delete_holding_queue(&self, name: &str) -> Result<(), MqError> {
            self.deleted.lock().unwrap().push(name.to_string());
            self.queues.lock().unwrap().remove(name);
            Ok(())
        }
    }

    fn settings(batch_size: usize) -> AdapterSettings {
        AdapterSettings {
            batch_size,
            holding_queue_prefix: "hold".into(),
            ..AdapterSettings::default()
        }
    }

    fn strings(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn browse_restores_order_and_removes_holding_queue() {
        let broker = FakeBroker::with_queue("q", &["A", "B", "C", "D", "E"]);
        let out = browse_by_drain(&broker, "q", &BrowseOptions::new(2, 1), &settings(2))
            .await
            .unwrap();
        let ids: Vec<_> = out.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["B", "C"]);
        assert_eq!(broker.ids("q"), ["A", "B", "C", "D", "E"]);

        let created = broker.created.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        assert!(created[0].starts_with("hold."));
        assert_eq!(*broker.deleted.lock().unwrap(), created);
    }

    #[tokio::test]
    async fn browse_is_repeatable() {
        let broker = FakeBroker::with_queue("q", &["A", "B", "C"]);
        let options = BrowseOptions::new(2, 0);
        let first = browse_by_drain(&broker, "q", &options, &settings(1)).await.unwrap();
        let second = browse_by_drain(&broker, "q", &options, &settings(1)).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_queue_never_creates_holding_queue() {
        let broker = FakeBroker::with_queue("q", &[]);
        let out = browse_by_drain(&broker, "q", &BrowseOptions::new(5, 0), &settings(5))
            .await
            .unwrap();
        assert!(out.is_empty());
        assert!(broker.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_limit_touches_nothing() {
        let broker = FakeBroker::with_queue("q", &["A"]);
        let out = browse_by_drain(&broker, "q", &BrowseOptions::new(0, 0), &settings(5))
            .await
            .unwrap();
        assert!(out.is_empty());
        assert!(broker.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_one_match_per_id() {
        let broker = FakeBroker::with_queue("q", &["A", "B", "B", "C"]);
        let outcome = delete_by_drain(&broker, "q", &strings(&["B"]), &settings(3))
            .await
            .unwrap();
        assert_eq!(outcome.removed, 1);
        assert!(outcome.missing.is_empty());
        assert_eq!(broker.ids("q"), ["A", "B", "C"]);
    }

    #[tokio::test]
    async fn delete_reports_exactly_the_missing_id() {
        let broker = FakeBroker::with_queue("q", &["A", "B", "C"]);
        let err = delete_by_drain(&broker, "q", &strings(&["A", "nope"]), &settings(2))
            .await
            .unwrap()
            .into_result()
            .unwrap_err();
        match err {
            MqError::PartialFailure {
                requested,
                removed,
                missing,
            } => {
                assert_eq!((requested, removed), (2, 1));
                assert_eq!(missing, ["nope"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(broker.ids("q"), ["B", "C"]);
    }

    #[tokio::test]
    async fn clear_discards_without_holding_queue() {
        let broker = FakeBroker::with_queue("q", &["A", "B", "C"]);
        assert_eq!(clear_by_drain(&broker, "q", &settings(2)).await.unwrap(), 3);
        assert!(broker.ids("q").is_empty());
        assert!(broker.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_forward_returns_messages_and_replays_the_rest() {
        let broker = FakeBroker::with_queue("q", &["A", "B", "C", "D"]);
        broker.fail_sends("hold.", 1);
        let err = browse_by_drain(&broker, "q", &BrowseOptions::new(4, 0), &settings(4))
            .await
            .unwrap_err();
        assert!(matches!(err, MqError::Transport { .. }));

        let mut remaining = broker.ids("q");
        remaining.sort();
        assert_eq!(remaining, ["A", "B", "C", "D"]);
        assert_eq!(broker.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn holding_queue_creation_failure_loses_nothing() {
        let broker = FakeBroker {
            fail_create: true,
            ..FakeBroker::with_queue("q", &["A", "B"])
        };
        let err = browse_by_drain(&broker, "q", &BrowseOptions::new(2, 0), &settings(2))
            .await
            .unwrap_err();
        assert!(err.is_authorization_denied());
        assert_eq!(broker.ids("q"), ["A", "B"]);
    }

    #[tokio::test]
    async fn failed_replay_strands_messages_in_named_holding_queue() {
        let broker = FakeBroker::with_queue("q", &["A", "B", "C"]);
        let mut holding = HoldingQueue::new("hold.test");
        let partition = drain_and_partition(&broker, "q", &mut holding, 2, |_, _| Disposition::Keep)
            .await
            .unwrap();
        assert_eq!(partition.kept, 3);
        assert_eq!(broker.ids("hold.test"), ["A", "B", "C"]);

        broker.fail_sends("q", 1);
        let err = replay(&broker, "hold.test", "q", 2).await.unwrap_err();
        assert!(matches!(err, MqError::Transport { .. }));
        assert_eq!(broker.ids("q"), ["A"]);
        let mut stranded = broker.ids("hold.test");
        stranded.sort();
        assert_eq!(stranded, ["B", "C"]);

        broker.heal();
        assert_eq!(replay(&broker, "hold.test", "q", 2).await.unwrap(), 2);
        assert_eq!(broker.ids("q").len(), 3);
    }

    #[tokio::test]
    async fn stranded_error_names_holding_queue() {
        let broker = FakeBroker::with_queue("q", &["A", "B"]);
        broker.fail_sends("q", 0);
        let err = browse_by_drain(&broker, "q", &BrowseOptions::new(1, 0), &settings(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("hold."), "got: {err}");
        assert!(broker.deleted.lock().unwrap().is_empty());
    }
}
