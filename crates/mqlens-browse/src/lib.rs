// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Browse and delete algorithms shared by the broker adapters.
//!
//! Brokers differ in how they let a client look at a queue without consuming
//! it. This crate holds the three strategies, each written against a small
//! trait the adapter implements over its live session:
//!
//! - [`cursor`]: a native browse cursor, advanced and always closed.
//! - [`drain`]: drain-and-replay through a temporary holding queue, for brokers
//!   whose only read primitive is destructive.
//! - [`lease`]: renewable leases (visibility timeout, peek-lock), released on
//!   every exit path.
//!
//! [`outcome`] turns per-id results into the `deleteMessages` contract.

pub mod cursor;
pub mod drain;
pub mod lease;
pub mod outcome;
pub mod window;

pub use cursor::{MessageCursor, browse_with_cursor};
pub use drain::{
    Disposition, DrainableQueue, HoldingQueue, Partition, browse_by_drain, clear_by_drain,
    delete_by_drain, drain_and_partition, drain_and_replay, replay,
};
pub use lease::{LeaseSource, browse_with_lease, clear_with_lease, delete_with_lease};
pub use outcome::{DeleteOutcome, delete_each_native};
pub use window::{apply_filter, in_window, window, window_len};
