use chrono::{DateTime, Local, TimeZone, Utc};
use zulipfs_config::RenderTimezone;

use crate::transport::MessageRecord;

/// Inserted between messages when content accumulates.
pub const ACCUMULATE_SEPARATOR: &[u8] = b"\n";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Turns message records into file content:
/// `"[<timestamp>] <sender>\n<body>\n"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageRenderer {
    timezone: RenderTimezone,
}

impl MessageRenderer {
    pub fn new(timezone: RenderTimezone) -> Self {
        MessageRenderer { timezone }
    }

    pub fn render(&self, message: &MessageRecord) -> Vec<u8> {
        format!(
            "[{}] {}\n{}\n",
            self.format_timestamp(message.timestamp),
            message.sender_full_name,
            message.content
        )
        .into_bytes()
    }

    /// Human-readable timestamp in the configured zone. Out-of-range values
    /// fall back to the raw number of seconds.
    pub fn format_timestamp(&self, timestamp: i64) -> String {
        let utc = match DateTime::<Utc>::from_timestamp(timestamp, 0) {
            Some(dt) => dt,
            None => return timestamp.to_string(),
        };
        match self.timezone {
            RenderTimezone::Utc => utc.format(TIMESTAMP_FORMAT).to_string(),
            RenderTimezone::Local => Local
                .from_utc_datetime(&utc.naive_utc())
                .format(TIMESTAMP_FORMAT)
                .to_string(),
        }
    }
}
