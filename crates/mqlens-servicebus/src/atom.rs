// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reads the Atom feeds returned by the Service Bus management endpoint.
//!
//! Only leaf elements are of interest, so entries are flattened into a map of
//! local element name to text. Nested containers such as `CountDetails`
//! contribute their children.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<entry\b[^>]*>(.*?)</entry>").unwrap()
});

static LEAF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:[\w-]+:)?([\w-]+)(?:\s[^<>]*)?>([^<]*)</(?:[\w-]+:)?[\w-]+>").unwrap()
});

static DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:[\w-]+:)?(QueueDescription|TopicDescription|SubscriptionDescription)\b")
        .unwrap()
});

/// One `<entry>` of a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    /// `QueueDescription`, `TopicDescription` or `SubscriptionDescription`.
    pub description: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl Entry {
    pub fn name(&self) -> Option<&str> {
        self.field("title")
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn number(&self, name: &str) -> Option<u64> {
        self.field(name).and_then(|v| v.trim().parse().ok())
    }

    pub fn is_queue(&self) -> bool {
        self.description.as_deref() == Some("QueueDescription")
    }

    pub fn is_topic(&self) -> bool {
        self.description.as_deref() == Some("TopicDescription")
    }
}

/// Every entry in `xml`. A lone `<entry>` document yields one entry; an
/// empty feed yields none.
pub fn parse_entries(xml: &str) -> Vec<Entry> {
    ENTRY
        .captures_iter(xml)
        .filter_map(|c| c.get(1))
        .map(|body| parse_entry(body.as_str()))
        .collect()
}

fn parse_entry(body: &str) -> Entry {
    let fields = LEAF
        .captures_iter(body)
        .map(|c| (c[1].to_string(), unescape(&c[2])))
        .collect();
    Entry {
        description: DESCRIPTION.captures(body).map(|c| c[1].to_string()),
        fields,
    }
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="text">Queues</title>
  <entry xml:base="https://contoso.servicebus.windows.net/$Resources/Queues">
    <id>https://contoso.servicebus.windows.net/orders</id>
    <title type="text">orders</title>
    <content type="application/xml">
      <QueueDescription xmlns="http://schemas.microsoft.com/netservices/2010/10/servicebus/connect" xmlns:i="http://www.w3.org/2001/XMLSchema-instance">
        <LockDuration>PT1M</LockDuration>
        <MaxSizeInMegabytes>1024</MaxSizeInMegabytes>
        <MessageCount>5</MessageCount>
        <CountDetails xmlns:d2p1="http://schemas.microsoft.com/netservices/2011/06/servicebus">
          <d2p1:ActiveMessageCount>3</d2p1:ActiveMessageCount>
          <d2p1:DeadLetterMessageCount>2</d2p1:DeadLetterMessageCount>
        </CountDetails>
        <UserMetadata>R&amp;D orders</UserMetadata>
      </QueueDescription>
    </content>
  </entry>
  <entry>
    <title type="text">audit</title>
    <content type="application/xml"><QueueDescription><MessageCount>0</MessageCount></QueueDescription></content>
  </entry>
</feed>"#;

    #[test]
    fn entries_flatten_leaf_elements() {
        let entries = parse_entries(FEED);
        assert_eq!(entries.len(), 2);
        let orders = &entries[0];
        assert_eq!(orders.name(), Some("orders"));
        assert!(orders.is_queue());
        assert_eq!(orders.number("ActiveMessageCount"), Some(3));
        assert_eq!(orders.number("MessageCount"), Some(5));
        assert_eq!(orders.field("LockDuration"), Some("PT1M"));
        assert_eq!(orders.field("UserMetadata"), Some("R&D orders"));
        assert_eq!(entries[1].number("MessageCount"), Some(0));
    }

    #[test]
    fn empty_feed_has_no_entries() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title type="text">Publicly Listed Services</title></feed>"#;
        assert!(parse_entries(xml).is_empty());
    }

    #[test]
    fn topic_entries_are_recognized() {
        let xml = r#"<entry><title type="text">prices</title><content><TopicDescription><SubscriptionCount>4</SubscriptionCount></TopicDescription></content></entry>"#;
        let entry = &parse_entries(xml)[0];
        assert!(entry.is_topic());
        assert_eq!(entry.number("SubscriptionCount"), Some(4));
    }
}
