// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delete results and their mapping onto the error taxonomy.

use std::collections::HashMap;
use std::future::Future;

use mqlens_core::{MqError, ObjectKind};

/// What a multi-message delete achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub requested: usize,
    pub removed: usize,
    /// Requested ids that matched nothing, in request order.
    pub missing: Vec<String>,
}

impl DeleteOutcome {
    /// Builds an outcome from the requested ids and a count of unmatched
    /// requests per id.
    pub(crate) fn from_pending(requested: &[String], removed: usize, pending: &PendingIds) -> Self {
        let mut remaining = pending.counts.clone();
        let missing = requested
            .iter()
            .filter(|id| match remaining.get_mut(id.as_str()) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            })
            .cloned()
            .collect();
        Self {
            requested: requested.len(),
            removed,
            missing,
        }
    }

    /// `Ok(removed)` when every id was found, `PartialFailure` otherwise.
    pub fn into_result(self) -> Result<usize, MqError> {
        if self.missing.is_empty() {
            Ok(self.removed)
        } else {
            Err(MqError::PartialFailure {
                requested: self.requested,
                removed: self.removed,
                missing: self.missing,
            })
        }
    }

    /// Result for a single-id delete: a miss is `ObjectNotFound`.
    pub fn into_single(self, message_id: &str) -> Result<(), MqError> {
        if self.removed == 0 {
            Err(MqError::not_found(ObjectKind::Message, message_id))
        } else {
            Ok(())
        }
    }
}

/// Multiset of ids still waiting for a matching message. Each request
/// consumes at most one match.
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingIds {
    counts: HashMap<String, usize>,
    outstanding: usize,
}

impl PendingIds {
    pub(crate) fn new(ids: &[String]) -> Self {
        let mut counts = HashMap::new();
        for id in ids {
            *counts.entry(id.clone()).or_insert(0) += 1;
        }
        Self {
            counts,
            outstanding: ids.len(),
        }
    }

    /// Consumes one pending request for `id`, returning whether there was one.
    pub(crate) fn take(&mut self, id: &str) -> bool {
        match self.counts.get_mut(id) {
            Some(n) if *n > 0 => {
                *n -= 1;
                self.outstanding -= 1;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.outstanding == 0
    }
}

/// Deletes ids one at a time through a native delete-by-id primitive.
///
/// `ObjectNotFound` from the primitive marks the id missing; any other error
/// aborts, leaving earlier removals committed.
pub async fn delete_each_native<F, Fut>(
    message_ids: &[String],
    mut delete_one: F,
) -> Result<DeleteOutcome, MqError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<(), MqError>>,
{
    let mut outcome = DeleteOutcome {
        requested: message_ids.len(),
        ..DeleteOutcome::default()
    };
    for id in message_ids {
        match delete_one(id.clone()).await {
            Ok(()) => outcome.removed += 1,
            Err(err) if err.is_not_found() => outcome.missing.push(id.clone()),
            Err(err) => return Err(err),
        }
    }
    Ok(outcome)
}
