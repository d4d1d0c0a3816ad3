//! Wire types of the REST API and response classification.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use zulipfs_core::{ChannelRecord, MessageRecord, TopicRecord, TransportError};

/// Longest response excerpt kept in an error message.
const ERROR_BODY_LIMIT: usize = 512;

/// Fields common to every response.
#[derive(Deserialize)]
struct Envelope {
    result: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct StreamsResponse {
    pub streams: Vec<StreamEntry>,
}

#[derive(Deserialize)]
pub(crate) struct StreamEntry {
    pub stream_id: u64,
    pub name: String,
}

impl From<StreamEntry> for ChannelRecord {
    fn from(entry: StreamEntry) -> Self {
        ChannelRecord {
            id: entry.stream_id,
            name: entry.name,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct TopicsResponse {
    pub topics: Vec<TopicEntry>,
}

#[derive(Deserialize)]
pub(crate) struct TopicEntry {
    pub name: String,
    #[serde(default)]
    pub max_id: Option<u64>,
}

impl From<TopicEntry> for TopicRecord {
    fn from(entry: TopicEntry) -> Self {
        TopicRecord {
            name: entry.name,
            max_message_id: entry.max_id,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct MessagesResponse {
    pub messages: Vec<MessageRecord>,
}

#[derive(Deserialize)]
pub(crate) struct SingleMessageResponse {
    pub message: MessageRecord,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendResponse {
    pub id: u64,
}

#[derive(Serialize)]
struct NarrowTerm<'a> {
    operator: &'a str,
    operand: &'a str,
}

/// JSON narrow selecting one topic of one channel.
pub(crate) fn topic_narrow(channel: &str, topic: &str) -> Result<String, TransportError> {
    let terms = [
        NarrowTerm {
            operator: "channel",
            operand: channel,
        },
        NarrowTerm {
            operator: "topic",
            operand: topic,
        },
    ];
    serde_json::to_string(&terms).map_err(|e| TransportError::Other(format!("Failed to encode narrow: {}", e)))
}

/// Classify a response body. An `"error"` result wins over the HTTP status
/// since the server reports most rejections with both.
pub(crate) fn parse_response<T: DeserializeOwned>(
    endpoint: &str,
    status: u16,
    body: &str,
) -> Result<T, TransportError> {
    if let Ok(envelope) = serde_json::from_str::<Envelope>(body) {
        if envelope.result == "error" {
            return Err(TransportError::Api {
                code: envelope.code.unwrap_or_else(|| "BAD_REQUEST".to_string()),
                message: envelope.msg,
            });
        }
    }

    if !(200..300).contains(&status) {
        return Err(TransportError::Http {
            endpoint: endpoint.to_string(),
            status,
            message: excerpt(body),
        });
    }

    serde_json::from_str(body).map_err(|e| TransportError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
