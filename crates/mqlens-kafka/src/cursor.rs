// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offset-walking browse cursor.
//!
//! A topic is browsed partition by partition in ascending order, each from
//! its earliest retained offset up to the high watermark captured when the
//! cursor opened. Skipping is offset arithmetic, so no record before the
//! window is fetched. On compacted topics offsets have gaps and a skip can
//! land past the records it meant to pass over.

use std::collections::VecDeque;

use async_trait::async_trait;
use mqlens_browse::MessageCursor;
use mqlens_core::{Message, MqError};
use rskafka::record::RecordAndOffset;

use crate::record::to_message;

/// Reads records from one partition starting at an offset.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, partition: i32, offset: i64) -> Result<Vec<RecordAndOffset>, MqError>;
}

/// Offsets `[start, end)` of one partition still to be browsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionRange {
    pub partition: i32,
    pub start: i64,
    pub end: i64,
}

impl PartitionRange {
    fn remaining(&self) -> u64 {
        u64::try_from(self.end - self.start).unwrap_or(0)
    }
}

pub struct OffsetCursor<'a, S: ?Sized> {
    source: &'a S,
    ranges: VecDeque<PartitionRange>,
    buffer: VecDeque<RecordAndOffset>,
}

impl<'a, S: RecordSource + ?Sized> OffsetCursor<'a, S> {
    pub fn new(source: &'a S, mut ranges: Vec<PartitionRange>) -> Self {
        ranges.sort_by_key(|r| r.partition);
        Self {
            source,
            ranges: ranges.into(),
            buffer: VecDeque::new(),
        }
    }

    fn finish_partition(&mut self) {
        self.ranges.pop_front();
        self.buffer.clear();
    }
}

#[async_trait]
impl<S: RecordSource + ?Sized> MessageCursor for OffsetCursor<'_, S> {
    async fn next_message(&mut self) -> Result<Option<Message>, MqError> {
        loop {
            let Some(range) = self.ranges.front_mut() else {
                return Ok(None);
            };
            if range.start >= range.end {
                self.finish_partition();
                continue;
            }
            if let Some(record) = self.buffer.pop_front() {
                // A fetch returns whole batches, which may begin before the
                // requested offset.
                if record.offset < range.start {
                    continue;
                }
                if record.offset >= range.end {
                    self.finish_partition();
                    continue;
                }
                range.start = record.offset + 1;
                let partition = range.partition;
                return Ok(Some(to_message(partition, record)));
            }
            let (partition, start) = (range.partition, range.start);
            let fetched = self.source.fetch(partition, start).await?;
            if fetched.is_empty() {
                // Nothing below the watermark is retrievable any more.
                self.finish_partition();
                continue;
            }
            self.buffer.extend(fetched);
        }
    }

    async fn skip(&mut self, n: usize) -> Result<usize, MqError> {
        let mut remaining = n as u64;
        while remaining > 0 {
            let Some(range) = self.ranges.front_mut() else {
                break;
            };
            let available = range.remaining();
            if available > remaining {
                range.start += remaining as i64;
                remaining = 0;
                self.buffer.clear();
            } else {
                remaining -= available;
                self.finish_partition();
            }
        }
        Ok(n - remaining as usize)
    }

    async fn close(&mut self) -> Result<(), MqError> {
        self.ranges.clear();
        self.buffer.clear();
        Ok(())
    }
}
