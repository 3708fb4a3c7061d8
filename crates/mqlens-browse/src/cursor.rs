// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Native browse cursors.
//!
//! An adapter opens its broker's browse handle, wraps it in a
//! [`MessageCursor`], and hands it to [`browse_with_cursor`], which walks to
//! the window and closes the handle on every path.

use async_trait::async_trait;
use mqlens_core::{BrowseOptions, Message, MqError};
use tracing::warn;

use crate::window::apply_filter;

/// A forward-only, non-destructive view over a queue.
#[async_trait]
pub trait MessageCursor: Send {
    /// The next message, or `None` once the queue is exhausted.
    async fn next_message(&mut self) -> Result<Option<Message>, MqError>;

    /// Advances past `n` messages and returns how many were actually skipped.
    ///
    /// Cursors that can jump without fetching payloads override this.
    async fn skip(&mut self, n: usize) -> Result<usize, MqError> {
        let mut skipped = 0;
        while skipped < n {
            if self.next_message().await?.is_none() {
                break;
            }
            skipped += 1;
        }
        Ok(skipped)
    }

    /// Releases the broker-side handle.
    async fn close(&mut self) -> Result<(), MqError>;
}

/// Collects the requested window from `cursor` and closes it.
///
/// A close failure after a successful walk is logged and the snapshot is
/// still returned; after a failed walk the walk's error wins.
pub async fn browse_with_cursor<C>(
    cursor: &mut C,
    options: &BrowseOptions,
) -> Result<Vec<Message>, MqError>
where
    C: MessageCursor + ?Sized,
{
    let collected = collect_window(cursor, options).await;
    let closed = cursor.close().await;
    match (collected, closed) {
        (Ok(messages), Ok(())) => Ok(messages),
        (Ok(messages), Err(err)) => {
            warn!(error = %err, "failed to close browse cursor");
            Ok(messages)
        }
        (Err(err), close_result) => {
            if let Err(close_err) = close_result {
                warn!(error = %close_err, "failed to close browse cursor after error");
            }
            Err(err)
        }
    }
}

async fn collect_window<C>(cursor: &mut C, options: &BrowseOptions) -> Result<Vec<Message>, MqError>
where
    C: MessageCursor + ?Sized,
{
    if options.limit == 0 {
        return Ok(Vec::new());
    }
    if cursor.skip(options.start_position).await? < options.start_position {
        return Ok(Vec::new());
    }
    let mut window = Vec::with_capacity(options.limit.min(256));
    while window.len() < options.limit {
        match cursor.next_message().await? {
            Some(message) => window.push(message),
            None => break,
        }
    }
    Ok(apply_filter(window, options.filter.as_ref()))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use mqlens_core::MessageFilter;

    use super::*;

    #[derive(Default)]
    struct VecCursor {
        messages: VecDeque<Message>,
        fetched: usize,
        closed: bool,
        fail_after: Option<usize>,
        fail_close: bool,
    }

    impl VecCursor {
        fn of(ids: &[&str]) -> Self {
            Self {
                messages: ids.iter().map(|id| Message::new(*id, Vec::new())).collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl MessageCursor for VecCursor {
        async fn next_message(&mut self) -> Result<Option<Message>, MqError> {
            if self.fail_after == Some(self.fetched) {
                return Err(MqError::transport_msg("connection reset"));
            }
            self.fetched += 1;
            Ok(self.messages.pop_front())
        }

        async fn close(&mut self) -> Result<(), MqError> {
            self.closed = true;
            if self.fail_close {
                return Err(MqError::transport_msg("close failed"));
            }
            Ok(())
        }
    }

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[tokio::test]
    async fn returns_window_and_closes() {
        let mut cursor = VecCursor::of(&["A", "B", "C"]);
        let out = browse_with_cursor(&mut cursor, &BrowseOptions::new(2, 1))
            .await
            .unwrap();
        assert_eq!(ids(&out), ["B", "C"]);
        assert!(cursor.closed);
    }

    #[tokio::test]
    async fn exhaustion_ends_early() {
        let mut cursor = VecCursor::of(&["A", "B"]);
        let out = browse_with_cursor(&mut cursor, &BrowseOptions::new(10, 1))
            .await
            .unwrap();
        assert_eq!(ids(&out), ["B"]);

        let mut cursor = VecCursor::of(&["A"]);
        let out = browse_with_cursor(&mut cursor, &BrowseOptions::new(10, 4))
            .await
            .unwrap();
        assert!(out.is_empty());
        assert!(cursor.closed);
    }

    #[tokio::test]
    async fn zero_limit_fetches_nothing() {
        let mut cursor = VecCursor::of(&["A"]);
        let out = browse_with_cursor(&mut cursor, &BrowseOptions::new(0, 0))
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(cursor.fetched, 0);
        assert!(cursor.closed);
    }

    #[tokio::test]
    async fn error_mid_walk_still_closes() {
        let mut cursor = VecCursor {
            fail_after: Some(1),
            ..VecCursor::of(&["A", "B", "C"])
        };
        let err = browse_with_cursor(&mut cursor, &BrowseOptions::new(3, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, MqError::Transport { .. }));
        assert!(cursor.closed);
    }

    #[tokio::test]
    async fn close_failure_after_success_keeps_snapshot() {
        let mut cursor = VecCursor {
            fail_close: true,
            ..VecCursor::of(&["A", "B"])
        };
        let out = browse_with_cursor(&mut cursor, &BrowseOptions::new(5, 0))
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn filter_narrows_window() {
        let mut cursor = VecCursor::of(&["A", "B", "C"]);
        let options = BrowseOptions::new(3, 0).with_filter(MessageFilter {
            message_id: Some("C".into()),
            correlation_id: None,
        });
        let out = browse_with_cursor(&mut cursor, &options).await.unwrap();
        assert_eq!(ids(&out), ["C"]);
    }
}
