use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::transport::{ChannelRecord, MessageRecord, MessagingTransport, SendReceipt, TopicRecord};

/// Sender name recorded for messages posted through [`MemoryTransport`].
const LOCAL_SENDER: &str = "zulipfs";

#[derive(Debug, Clone)]
struct StoredMessage {
    channel: String,
    topic: String,
    record: MessageRecord,
}

/// A message posted through the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: String,
    pub topic: String,
    pub body: String,
}

/// Number of calls made per transport operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list_channels: usize,
    pub list_topics: usize,
    pub fetch_latest: usize,
    pub fetch_by_id: usize,
    pub send: usize,
}

#[derive(Default)]
struct Counters {
    list_channels: AtomicUsize,
    list_topics: AtomicUsize,
    fetch_latest: AtomicUsize,
    fetch_by_id: AtomicUsize,
    send: AtomicUsize,
}

#[derive(Default)]
struct Store {
    channels: Vec<ChannelRecord>,
    /// Topics created without messages, as (channel id, name).
    empty_topics: Vec<(u64, String)>,
    messages: Vec<StoredMessage>,
    sent: Vec<SentMessage>,
    next_id: u64,
}

/// In-memory messaging service for testing.
pub struct MemoryTransport {
    store: RwLock<Store>,
    calls: Counters,
    offline: AtomicBool,
}

impl MemoryTransport {
    /// Create a new empty transport.
    pub fn new() -> Self {
        MemoryTransport {
            store: RwLock::new(Store {
                next_id: 1,
                ..Default::default()
            }),
            calls: Counters::default(),
            offline: AtomicBool::new(false),
        }
    }

    pub fn add_channel(&self, id: u64, name: &str) {
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        store.channels.push(ChannelRecord {
            id,
            name: name.to_string(),
        });
    }

    /// Add a topic that has no messages yet.
    pub fn add_topic(&self, channel_id: u64, name: &str) {
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        store.empty_topics.push((channel_id, name.to_string()));
    }

    /// Store a message and return its id. Ids increase with every call.
    pub fn push_message(
        &self,
        channel: &str,
        topic: &str,
        sender: &str,
        content: &str,
        timestamp: i64,
    ) -> u64 {
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        store.insert(channel, topic, sender, content, timestamp)
    }

    /// Look up a stored message by id.
    pub fn message(&self, id: u64) -> Option<MessageRecord> {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store.find(id).map(|m| m.record.clone())
    }

    /// Change the content of a stored message, as an edit on the server would.
    pub fn edit_message(&self, id: u64, content: &str) -> bool {
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        match store.messages.iter_mut().find(|m| m.record.id == id) {
            Some(message) => {
                message.record.content = content.to_string();
                true
            }
            None => false,
        }
    }

    /// Drop all stored messages, keeping channels.
    pub fn clear_messages(&self) {
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        store.messages.clear();
    }

    /// Messages posted through [`MessagingTransport::send_message`].
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store.sent.clone()
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            list_channels: self.calls.list_channels.load(Ordering::SeqCst),
            list_topics: self.calls.list_topics.load(Ordering::SeqCst),
            fetch_latest: self.calls.fetch_latest.load(Ordering::SeqCst),
            fetch_by_id: self.calls.fetch_by_id.load(Ordering::SeqCst),
            send: self.calls.send.load(Ordering::SeqCst),
        }
    }

    /// When offline, every call fails with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(TransportError::Connection("memory transport is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    fn insert(&mut self, channel: &str, topic: &str, sender: &str, content: &str, timestamp: i64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(StoredMessage {
            channel: channel.to_string(),
            topic: topic.to_string(),
            record: MessageRecord {
                id,
                timestamp,
                sender_full_name: sender.to_string(),
                content: content.to_string(),
            },
        });
        id
    }

    fn find(&self, id: u64) -> Option<&StoredMessage> {
        self.messages.iter().find(|m| m.record.id == id)
    }

    fn channel_name(&self, id: u64) -> Option<&str> {
        self.channels
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }
}

#[async_trait]
impl MessagingTransport for MemoryTransport {
    async fn list_channels(&self) -> Result<Vec<ChannelRecord>, TransportError> {
        self.calls.list_channels.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        Ok(store.channels.clone())
    }

    async fn list_topics(
        &self,
        channel_id: u64,
        limit: usize,
    ) -> Result<Vec<TopicRecord>, TransportError> {
        self.calls.list_topics.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        let channel = store.channel_name(channel_id).ok_or_else(|| TransportError::Api {
            code: "BAD_REQUEST".to_string(),
            message: format!("Invalid channel ID {}", channel_id),
        })?;

        let mut topics: Vec<TopicRecord> = Vec::new();
        for message in store.messages.iter().filter(|m| m.channel == channel) {
            match topics.iter_mut().find(|t| t.name == message.topic) {
                Some(topic) => {
                    topic.max_message_id = topic.max_message_id.max(Some(message.record.id));
                }
                None => topics.push(TopicRecord {
                    name: message.topic.clone(),
                    max_message_id: Some(message.record.id),
                }),
            }
        }
        for (_, name) in store.empty_topics.iter().filter(|(id, _)| *id == channel_id) {
            if !topics.iter().any(|t| &t.name == name) {
                topics.push(TopicRecord {
                    name: name.clone(),
                    max_message_id: None,
                });
            }
        }

        // Most recently active first; topics without messages last.
        topics.sort_by(|a, b| b.max_message_id.cmp(&a.max_message_id));
        topics.truncate(limit);
        Ok(topics)
    }

    async fn fetch_latest_message(
        &self,
        channel: &str,
        topic: &str,
    ) -> Result<Option<MessageRecord>, TransportError> {
        self.calls.fetch_latest.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        Ok(store
            .messages
            .iter()
            .filter(|m| m.channel == channel && m.topic == topic)
            .max_by_key(|m| m.record.id)
            .map(|m| m.record.clone()))
    }

    async fn fetch_message_by_id(&self, id: u64) -> Result<MessageRecord, TransportError> {
        self.calls.fetch_by_id.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store
            .find(id)
            .map(|m| m.record.clone())
            .ok_or_else(|| TransportError::Api {
                code: "BAD_REQUEST".to_string(),
                message: format!("Invalid message(s): {}", id),
            })
    }

    async fn send_message(
        &self,
        channel: &str,
        topic: &str,
        body: &str,
    ) -> Result<SendReceipt, TransportError> {
        self.calls.send.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        if !store.channels.iter().any(|c| c.name == channel) {
            return Err(TransportError::Api {
                code: "STREAM_DOES_NOT_EXIST".to_string(),
                message: format!("Channel '{}' does not exist", channel),
            });
        }

        let timestamp = store
            .messages
            .iter()
            .map(|m| m.record.timestamp)
            .max()
            .map_or(0, |t| t + 1)
            .max(chrono::Utc::now().timestamp());
        let id = store.insert(channel, topic, LOCAL_SENDER, body, timestamp);
        store.sent.push(SentMessage {
            channel: channel.to_string(),
            topic: topic.to_string(),
            body: body.to_string(),
        });
        Ok(SendReceipt { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_topics_most_recent_first() {
        let transport = MemoryTransport::new();
        transport.add_channel(7, "general");
        transport.add_topic(7, "quiet");
        transport.push_message("general", "a", "Alice", "1", 100);
        transport.push_message("general", "b", "Alice", "2", 200);
        transport.push_message("general", "a", "Bob", "3", 300);

        let topics = transport.list_topics(7, 10).await.unwrap();
        let names: Vec<_> = topics.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "quiet"]);
        assert_eq!(topics[0].max_message_id, Some(3));
        assert_eq!(topics[2].max_message_id, None);

        assert_eq!(transport.list_topics(7, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_latest_and_by_id() {
        let transport = MemoryTransport::new();
        transport.add_channel(1, "general");
        transport.push_message("general", "t", "Alice", "old", 100);
        let newest = transport.push_message("general", "t", "Bob", "new", 200);

        let latest = transport.fetch_latest_message("general", "t").await.unwrap().unwrap();
        assert_eq!(latest.id, newest);
        assert_eq!(latest.content, "new");
        assert!(transport.fetch_latest_message("general", "other").await.unwrap().is_none());

        let by_id = transport.fetch_message_by_id(newest).await.unwrap();
        assert_eq!(by_id, latest);
        assert!(matches!(
            transport.fetch_message_by_id(999).await,
            Err(TransportError::Api { .. })
        ));
    }

    #[tokio::test]
    async fn test_send_records_and_stores_message() {
        let transport = MemoryTransport::new();
        transport.add_channel(1, "general");
        transport.push_message("general", "t", "Alice", "first", 4_000_000_000);

        let receipt = transport.send_message("general", "t", "hello").await.unwrap();
        let stored = transport.message(receipt.id).unwrap();
        assert_eq!(stored.sender_full_name, "zulipfs");
        assert!(stored.timestamp > 4_000_000_000);
        assert_eq!(
            transport.sent_messages(),
            vec![SentMessage {
                channel: "general".to_string(),
                topic: "t".to_string(),
                body: "hello".to_string(),
            }]
        );

        assert!(transport.send_message("nope", "t", "x").await.is_err());
        assert_eq!(transport.calls().send, 2);
    }

    #[tokio::test]
    async fn test_offline_fails_every_call() {
        let transport = MemoryTransport::new();
        transport.add_channel(1, "general");
        transport.set_offline(true);

        let err = transport.list_channels().await.unwrap_err();
        assert!(err.is_transient());
        assert!(transport.send_message("general", "t", "x").await.is_err());
        assert!(transport.sent_messages().is_empty());

        transport.set_offline(false);
        assert_eq!(transport.list_channels().await.unwrap().len(), 1);
    }
}
