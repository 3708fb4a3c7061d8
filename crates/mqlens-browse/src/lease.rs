// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lease cursors for brokers whose look-without-consuming primitive is a
//! renewable lock (SQS visibility timeout, Service Bus peek-lock).
//!
//! A leased message is invisible to other consumers until it is released or
//! removed. Every lease taken here is released or removed before returning,
//! whatever the outcome. Leasing increments the broker's delivery counter.

use async_trait::async_trait;
use mqlens_core::{BrowseOptions, Message, MqError};
use tracing::{debug, warn};

use crate::outcome::{DeleteOutcome, PendingIds};
use crate::window::apply_filter;

/// One queue's lease primitives.
#[async_trait]
pub trait LeaseSource: Send + Sync {
    /// A held lease: the message plus whatever the broker needs to release or
    /// remove it (receipt handle, lock URL).
    type Lease: Send + Sync;

    /// Leases up to `max` messages not already held. Empty when nothing more
    /// is visible.
    async fn lease_batch(&self, max: usize) -> Result<Vec<Self::Lease>, MqError>;

    fn message<'a>(&self, lease: &'a Self::Lease) -> &'a Message;

    /// Makes the message visible again, unchanged.
    async fn release(&self, lease: Self::Lease) -> Result<(), MqError>;

    /// Deletes the leased message.
    async fn remove(&self, lease: Self::Lease) -> Result<(), MqError>;
}

/// Leases until `want` messages are held or the source runs dry. On error
/// the leases already taken are released.
async fn lease_up_to<S>(source: &S, want: usize, batch_size: usize) -> Result<Vec<S::Lease>, MqError>
where
    S: LeaseSource,
{
    let mut held: Vec<S::Lease> = Vec::new();
    while held.len() < want {
        let max = batch_size.max(1).min(want - held.len());
        match source.lease_batch(max).await {
            Ok(batch) if batch.is_empty() => break,
            Ok(batch) => held.extend(batch),
            Err(err) => {
                release_all(source, held).await;
                return Err(err);
            }
        }
    }
    Ok(held)
}

/// Releases every lease, logging failures. The broker reclaims an
/// unreleased lease when it expires.
async fn release_all<S, I>(source: &S, leases: I)
where
    S: LeaseSource,
    I: IntoIterator<Item = S::Lease>,
    I::IntoIter: Send,
{
    let mut failed = 0usize;
    for lease in leases {
        if let Err(err) = source.release(lease).await {
            failed += 1;
            warn!(error = %err, "failed to release lease");
        }
    }
    if failed > 0 {
        warn!(failed, "leases left to expire");
    }
}

/// Snapshots the requested window by leasing `start + limit` messages.
pub async fn browse_with_lease<S>(
    source: &S,
    options: &BrowseOptions,
    batch_size: usize,
) -> Result<Vec<Message>, MqError>
where
    S: LeaseSource,
{
    if options.limit == 0 {
        return Ok(Vec::new());
    }
    let held = lease_up_to(source, options.end_position(), batch_size).await?;
    let snapshot: Vec<Message> = held
        .iter()
        .skip(options.start_position)
        .map(|lease| source.message(lease).clone())
        .collect();
    debug!(held = held.len(), returned = snapshot.len(), "lease browse complete");
    release_all(source, held).await;
    Ok(apply_filter(snapshot, options.filter.as_ref()))
}

/// Leases until every requested id is matched or the queue runs dry, removes
/// the matches and releases the rest.
///
/// A failed remove stops further removals; earlier removals stay committed
/// and every remaining lease is still released.
pub async fn delete_with_lease<S>(
    source: &S,
    message_ids: &[String],
    batch_size: usize,
) -> Result<DeleteOutcome, MqError>
where
    S: LeaseSource,
{
    let mut pending = PendingIds::new(message_ids);
    let mut keep: Vec<S::Lease> = Vec::new();
    let mut removed = 0usize;
    let mut failure = None;

    while !pending.is_done() && failure.is_none() {
        let batch = match source.lease_batch(batch_size.max(1)).await {
            Ok(batch) if batch.is_empty() => break,
            Ok(batch) => batch,
            Err(err) => {
                failure = Some(err);
                break;
            }
        };
        let mut batch = batch.into_iter();
        while let Some(lease) = batch.next() {
            if failure.is_some() || !pending.take(&source.message(&lease).id) {
                keep.push(lease);
                continue;
            }
            match source.remove(lease).await {
                Ok(()) => removed += 1,
                Err(err) => {
                    warn!(error = %err, "failed to remove leased message");
                    failure = Some(err);
                }
            }
        }
    }

    release_all(source, keep).await;
    match failure {
        Some(err) => Err(err),
        None => Ok(DeleteOutcome::from_pending(message_ids, removed, &pending)),
    }
}

/// Removes every message the source yields. Returns the number removed.
pub async fn clear_with_lease<S>(source: &S, batch_size: usize) -> Result<usize, MqError>
where
    S: LeaseSource,
{
    let mut removed = 0usize;
    loop {
        let batch = source.lease_batch(batch_size.max(1)).await?;
        if batch.is_empty() {
            return Ok(removed);
        }
        let mut batch = batch.into_iter();
        while let Some(lease) = batch.next() {
            if let Err(err) = source.remove(lease).await {
                release_all(source, batch).await;
                return Err(err);
            }
            removed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use mqlens_core::MessageFilter;

    use super::*;

    /// Visibility-timeout queue: leased messages are hidden until released.
    #[derive(Default)]
    struct FakeLeaseQueue {
        visible: Mutex<VecDeque<Message>>,
        leased: Mutex<Vec<String>>,
        removed: Mutex<Vec<String>>,
        fail_remove_of: Option<String>,
        fail_lease_after: Option<usize>,
        batches: Mutex<usize>,
    }

    impl FakeLeaseQueue {
        fn of(ids: &[&str]) -> Self {
            Self {
                visible: Mutex::new(ids.iter().map(|id| Message::new(*id, Vec::new())).collect()),
                ..Self::default()
            }
        }

        fn visible_ids(&self) -> Vec<String> {
            self.visible.lock().unwrap().iter().map(|m| m.id.clone()).collect()
        }

        fn outstanding(&self) -> usize {
            self.leased.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LeaseSource for FakeLeaseQueue {
        type Lease = Message;

        async fn lease_batch(&self, max: usize) -> Result<Vec<Message>, MqError> {
            let mut batches = self.batches.lock().unwrap();
            if self.fail_lease_after == Some(*batches) {
                return Err(MqError::Timeout {
                    duration: std::time::Duration::from_secs(1),
                });
            }
            *batches += 1;
            let mut visible = self.visible.lock().unwrap();
            let n = max.min(visible.len());
            let batch: Vec<Message> = visible.drain(..n).collect();
            self.leased
                .lock()
                .unwrap()
                .extend(batch.iter().map(|m| m.id.clone()));
            Ok(batch)
        }

        fn message<'a>(&self, lease: &'a Message) -> &'a Message {
            lease
        }

        async fn release(&self, lease: Message) -> Result<(), MqError> {
            self.leased.lock().unwrap().retain(|id| *id != lease.id);
            self.visible.lock().unwrap().push_back(lease);
            Ok(())
        }

        async fn remove(&self, lease: Message) -> Result<(), MqError> {
            if self.fail_remove_of.as_deref() == Some(lease.id.as_str()) {
                // The lease stays held until it expires.
                return Err(MqError::transport_msg("lock lost"));
            }
            self.leased.lock().unwrap().retain(|id| *id != lease.id);
            self.removed.lock().unwrap().push(lease.id);
            Ok(())
        }
    }

    fn strings(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn browse_releases_every_lease() {
        let q = FakeLeaseQueue::of(&["A", "B", "C", "D"]);
        let out = browse_with_lease(&q, &BrowseOptions::new(2, 1), 2).await.unwrap();
        let ids: Vec<_> = out.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["B", "C"]);
        assert_eq!(q.outstanding(), 0);
        assert_eq!(q.visible_ids().len(), 4);
    }

    #[tokio::test]
    async fn browse_stops_leasing_at_window_end() {
        let q = FakeLeaseQueue::of(&["A", "B", "C", "D", "E", "F"]);
        browse_with_lease(&q, &BrowseOptions::new(1, 1), 10).await.unwrap();
        assert_eq!(*q.batches.lock().unwrap(), 1);
        assert_eq!(q.visible_ids().len(), 6);
    }

    #[tokio::test]
    async fn browse_lease_error_releases_held() {
        let q = FakeLeaseQueue {
            fail_lease_after: Some(1),
            ..FakeLeaseQueue::of(&["A", "B", "C"])
        };
        let err = browse_with_lease(&q, &BrowseOptions::new(3, 0), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, MqError::Timeout { .. }));
        assert_eq!(q.outstanding(), 0);
    }

    #[tokio::test]
    async fn browse_applies_filter_in_window() {
        let q = FakeLeaseQueue::of(&["A", "B"]);
        let options = BrowseOptions::new(2, 0).with_filter(MessageFilter {
            message_id: Some("B".into()),
            correlation_id: None,
        });
        let out = browse_with_lease(&q, &options, 5).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "B");
    }

    #[tokio::test]
    async fn delete_removes_matches_and_releases_the_rest() {
        let q = FakeLeaseQueue::of(&["A", "B", "C"]);
        let outcome = delete_with_lease(&q, &strings(&["B"]), 2).await.unwrap();
        assert_eq!(outcome.removed, 1);
        assert!(outcome.missing.is_empty());
        assert_eq!(*q.removed.lock().unwrap(), ["B"]);
        assert_eq!(q.outstanding(), 0);
        let mut left = q.visible_ids();
        left.sort();
        assert_eq!(left, ["A", "C"]);
    }

    #[tokio::test]
    async fn delete_missing_id_is_reported() {
        let q = FakeLeaseQueue::of(&["A", "B"]);
        let outcome = delete_with_lease(&q, &strings(&["A", "zz"]), 5).await.unwrap();
        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.missing, ["zz"]);
        assert_eq!(q.outstanding(), 0);
    }

    #[tokio::test]
    async fn delete_remove_failure_keeps_committed_and_releases() {
        let q = FakeLeaseQueue {
            fail_remove_of: Some("B".into()),
            ..FakeLeaseQueue::of(&["A", "B", "C"])
        };
        let err = delete_with_lease(&q, &strings(&["A", "B", "C"]), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, MqError::Transport { .. }));
        assert_eq!(*q.removed.lock().unwrap(), ["A"]);
        assert_eq!(q.visible_ids(), ["C"]);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let q = FakeLeaseQueue::of(&["A", "B", "C"]);
        assert_eq!(clear_with_lease(&q, 2).await.unwrap(), 3);
        assert!(q.visible_ids().is_empty());
        assert_eq!(q.outstanding(), 0);
    }
}
