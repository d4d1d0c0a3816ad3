use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// A channel as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: u64,
    pub name: String,
}

/// A topic as reported by a channel's topic listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRecord {
    pub name: String,
    /// Id of the newest message in the topic.
    pub max_message_id: Option<u64>,
}

/// One message fetched from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: u64,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    pub sender_full_name: String,
    /// Raw (unrendered) message body.
    pub content: String,
}

/// Acknowledgement for a sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReceipt {
    pub id: u64,
}

/// Typed remote calls against the messaging service.
///
/// Implementations own their own timeout and authentication policy; callers
/// never retry.
#[async_trait]
pub trait MessagingTransport: Send + Sync + 'static {
    /// List every channel visible to the account.
    async fn list_channels(&self) -> Result<Vec<ChannelRecord>, TransportError>;

    /// List up to `limit` topics of a channel in the server's native order.
    async fn list_topics(
        &self,
        channel_id: u64,
        limit: usize,
    ) -> Result<Vec<TopicRecord>, TransportError>;

    /// Fetch the newest message in `channel`/`topic`, or `None` when the
    /// topic has no messages.
    async fn fetch_latest_message(
        &self,
        channel: &str,
        topic: &str,
    ) -> Result<Option<MessageRecord>, TransportError>;

    /// Fetch a single message by id with its raw body.
    async fn fetch_message_by_id(&self, id: u64) -> Result<MessageRecord, TransportError>;

    /// Post a message to `channel`/`topic`.
    async fn send_message(
        &self,
        channel: &str,
        topic: &str,
        body: &str,
    ) -> Result<SendReceipt, TransportError>;
}
