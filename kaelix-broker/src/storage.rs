//! In-memory topic logs with per-group read positions.

use chrono::Utc;
use dashmap::DashMap;
use kaelix_core::client::DeliveryReceipt;
use kaelix_core::{Message, Offset, Record, Topic};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Append-only log for one topic.
#[derive(Debug, Default)]
struct TopicLog {
    messages: Vec<Message>,
    group_positions: HashMap<String, usize>,
}

/// Topic logs keyed by topic name.
///
/// Consumer groups start reading at the beginning of the log, so a group
/// that subscribes late still sees everything published before it.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    topics: DashMap<Topic, Mutex<TopicLog>>,
}

impl MemoryStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return its receipt.
    pub fn append(&self, record: Record) -> DeliveryReceipt {
        let log = self.topics.entry(record.topic.clone()).or_default();
        let mut log = log.lock();

        let offset = Offset::new(log.messages.len() as u64);
        let timestamp = Utc::now();
        let mut message = Message::new(record.topic.clone(), record.payload);
        message.key = record.key;
        message.offset = Some(offset);
        message.timestamp = timestamp;
        log.messages.push(message);

        DeliveryReceipt { topic: record.topic, offset, timestamp }
    }

    /// Take up to `max` unread messages for `group`, advancing its position.
    pub fn fetch(&self, topic: &Topic, group: &str, max: usize) -> Vec<Message> {
        let Some(log) = self.topics.get(topic) else {
            return Vec::new();
        };
        let mut log = log.lock();
        let log = &mut *log;

        let position = log.group_positions.entry(group.to_string()).or_insert(0);
        let end = log.messages.len().min(position.saturating_add(max));
        if *position >= end {
            return Vec::new();
        }
        let batch = log.messages[*position..end].to_vec();
        *position = end;
        batch
    }

    /// Number of messages stored for `topic`.
    #[must_use]
    pub fn len(&self, topic: &Topic) -> usize {
        self.topics.get(topic).map_or(0, |log| log.lock().messages.len())
    }

    /// Number of topics that have received at least one message.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn record(topic: &Topic, n: u8) -> Record {
        Record::new(topic.clone(), Bytes::from(vec![n]))
    }

    #[test]
    fn append_assigns_sequential_offsets() {
        let storage = MemoryStorage::new();
        let topic = Topic::new("foo").unwrap();
        assert_eq!(storage.append(record(&topic, 1)).offset, Offset::new(0));
        assert_eq!(storage.append(record(&topic, 2)).offset, Offset::new(1));
        assert_eq!(storage.len(&topic), 2);
        assert_eq!(storage.topic_count(), 1);
    }

    #[test]
    fn groups_track_positions_independently() {
        let storage = MemoryStorage::new();
        let topic = Topic::new("foo").unwrap();
        for n in 0..5 {
            storage.append(record(&topic, n));
        }

        let first = storage.fetch(&topic, "a", 3);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].offset, Some(Offset::new(0)));
        assert_eq!(storage.fetch(&topic, "a", 3).len(), 2);
        assert!(storage.fetch(&topic, "a", 3).is_empty());

        assert_eq!(storage.fetch(&topic, "b", 10).len(), 5);
    }

    #[test]
    fn fetch_from_unknown_topic_is_empty() {
        let storage = MemoryStorage::new();
        let topic = Topic::new("nothing-here").unwrap();
        assert!(storage.fetch(&topic, "g", 10).is_empty());
    }
}
