// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Window arithmetic for `browse_messages`.

use mqlens_core::{BrowseOptions, Message, MessageFilter};

/// True when the zero-based queue `position` falls inside the browse window.
pub fn in_window(position: usize, options: &BrowseOptions) -> bool {
    position >= options.start_position && position < options.end_position()
}

/// Number of messages a browse of a queue holding `depth` messages returns
/// before filtering: `max(0, min(limit, depth - start))`.
pub fn window_len(depth: usize, options: &BrowseOptions) -> usize {
    options
        .limit
        .min(depth.saturating_sub(options.start_position))
}

/// Cuts the window out of an ordered sequence.
pub fn window<T>(items: impl IntoIterator<Item = T>, options: &BrowseOptions) -> Vec<T> {
    items
        .into_iter()
        .skip(options.start_position)
        .take(options.limit)
        .collect()
}

/// Narrows an in-window set by exact message id and/or correlation id.
pub fn apply_filter(mut messages: Vec<Message>, filter: Option<&MessageFilter>) -> Vec<Message> {
    if let Some(filter) = filter.filter(|f| !f.is_empty()) {
        messages.retain(|m| filter.matches(m));
    }
    messages
}
