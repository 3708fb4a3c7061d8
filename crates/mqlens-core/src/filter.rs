// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Name filters for queue, topic and channel listings.
//!
//! Matching is case-insensitive. A filter containing `*` is a glob where `*`
//! matches any run of characters; any other filter is a substring match. An
//! empty or absent filter matches everything.

/// Returns true when `name` passes `filter`.
pub fn matches_name(name: &str, filter: Option<&str>) -> bool {
    let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) else {
        return true;
    };
    let name = name.to_lowercase();
    let filter = filter.to_lowercase();
    if filter.contains('*') {
        glob_match(&name, &filter)
    } else {
        name.contains(&filter)
    }
}

/// Retains only the items whose name passes `filter`.
pub fn retain_matching<T>(items: &mut Vec<T>, filter: Option<&str>, name: impl Fn(&T) -> &str) {
    items.retain(|item| matches_name(name(item), filter));
}

fn glob_match(text: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut rest = text;

    // First segment is anchored at the start.
    let first = parts[0];
    let Some(after_first) = rest.strip_prefix(first) else {
        return false;
    };
    rest = after_first;

    let last_index = parts.len() - 1;
    for (i, part) in parts.iter().enumerate().skip(1) {
        if i == last_index {
            return rest.ends_with(part);
        }
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    // Only reached when the pattern has no '*'.
    rest.is_empty()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn empty_filter_matches_all() {
        assert!(matches_name("DEV.QUEUE.1", None));
        assert!(matches_name("DEV.QUEUE.1", Some("")));
        assert!(matches_name("DEV.QUEUE.1", Some("  ")));
    }

    #[test]
    fn substring_is_case_insensitive() {
        assert!(matches_name("DEV.QUEUE.1", Some("queue")));
        assert!(!matches_name("DEV.QUEUE.1", Some("topic")));
    }

    #[test]
    fn glob_anchors_both_ends() {
        assert!(matches_name("DEV.QUEUE.1", Some("dev.*")));
        assert!(matches_name("DEV.QUEUE.1", Some("*.1")));
        assert!(matches_name("DEV.QUEUE.1", Some("DEV*1")));
        assert!(!matches_name("DEV.QUEUE.1", Some("QUEUE*")));
        assert!(!matches_name("DEV.QUEUE.12", Some("*.1")));
        assert!(matches_name("anything", Some("*")));
    }

    #[test]
    fn retain_keeps_order() {
        let mut names = vec!["orders", "ORDERS.DLQ", "payments"];
        retain_matching(&mut names, Some("order*"), |n| n);
        assert_eq!(names, ["orders", "ORDERS.DLQ"]);
    }

    proptest! {
        #[test]
        fn star_matches_everything(name in "[a-zA-Z0-9._-]{0,24}") {
            prop_assert!(matches_name(&name, Some("*")));
        }

        #[test]
        fn name_matches_itself(name in "[a-zA-Z0-9._-]{1,24}") {
            prop_assert!(matches_name(&name, Some(&name)));
            let prefix_glob = format!("{}*", &name[..1]);
            prop_assert!(matches_name(&name, Some(&prefix_glob)));
        }
    }
}
