use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use zulipfs_config::TransportConfig;
use zulipfs_core::{
    ChannelRecord, MessageRecord, MessagingTransport, SendReceipt, TopicRecord, TransportError,
};

use crate::api::{
    parse_response, topic_narrow, MessagesResponse, SendResponse, SingleMessageResponse,
    StreamsResponse, TopicsResponse,
};

const USER_AGENT: &str = concat!("zulipfs/", env!("CARGO_PKG_VERSION"));

/// Messaging transport speaking the Zulip REST API over HTTPS.
pub struct ZulipHttpTransport {
    client: Client,
    site: String,
    email: String,
    api_key: String,
}

impl ZulipHttpTransport {
    /// Create a transport for `site` authenticating as `email`.
    pub fn new(
        site: &str,
        email: &str,
        api_key: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(ZulipHttpTransport {
            client,
            site: site.trim_end_matches('/').to_string(),
            email: email.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Create a transport from an effective (defaults applied) configuration.
    pub fn from_config(config: &TransportConfig) -> Result<Self, TransportError> {
        let missing = |field: &str| TransportError::Other(format!("transport.{} is not set", field));
        let site = config.site.as_deref().ok_or_else(|| missing("site"))?;
        let email = config.email.as_deref().ok_or_else(|| missing("email"))?;
        let api_key = config.api_key.as_deref().ok_or_else(|| missing("api_key"))?;

        Self::new(
            site,
            email,
            api_key,
            config.timeout.as_duration(),
            config.connect_timeout.as_duration(),
        )
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v1/{}", self.site, endpoint)
    }

    fn get(&self, endpoint: &str) -> RequestBuilder {
        self.client
            .get(self.url(endpoint))
            .basic_auth(&self.email, Some(&self.api_key))
    }

    fn post(&self, endpoint: &str) -> RequestBuilder {
        self.client
            .post(self.url(endpoint))
            .basic_auth(&self.email, Some(&self.api_key))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = request.send().await.map_err(|e| {
            warn!("Request to {} failed: {}", endpoint, e);
            TransportError::Connection(e.to_string())
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError::Decode {
            endpoint: endpoint.to_string(),
            message: format!("Failed to read response body: {}", e),
        })?;
        debug!(endpoint, status, bytes = body.len(), "response received");

        let parsed = parse_response(endpoint, status, &body);
        if let Err(err) = &parsed {
            if err.is_transient() {
                warn!("Transient failure from {}: {}", endpoint, err);
            }
        }
        parsed
    }
}

#[async_trait]
impl MessagingTransport for ZulipHttpTransport {
    async fn list_channels(&self) -> Result<Vec<ChannelRecord>, TransportError> {
        debug!("Listing channels");
        let response: StreamsResponse = self.execute("streams", self.get("streams")).await?;
        Ok(response.streams.into_iter().map(Into::into).collect())
    }

    async fn list_topics(
        &self,
        channel_id: u64,
        limit: usize,
    ) -> Result<Vec<TopicRecord>, TransportError> {
        debug!(channel_id, limit, "Listing topics");
        let endpoint = format!("users/me/{}/topics", channel_id);
        let response: TopicsResponse = self.execute(&endpoint, self.get(&endpoint)).await?;
        Ok(response
            .topics
            .into_iter()
            .take(limit)
            .map(Into::into)
            .collect())
    }

    async fn fetch_latest_message(
        &self,
        channel: &str,
        topic: &str,
    ) -> Result<Option<MessageRecord>, TransportError> {
        debug!(channel, topic, "Fetching newest message");
        let narrow = topic_narrow(channel, topic)?;
        let request = self.get("messages").query(&[
            ("anchor", "newest"),
            ("num_before", "1"),
            ("num_after", "0"),
            ("apply_markdown", "false"),
            ("narrow", narrow.as_str()),
        ]);
        let response: MessagesResponse = self.execute("messages", request).await?;
        Ok(response.messages.into_iter().max_by_key(|m| m.id))
    }

    async fn fetch_message_by_id(&self, id: u64) -> Result<MessageRecord, TransportError> {
        debug!(id, "Fetching message");
        let endpoint = format!("messages/{}", id);
        let request = self.get(&endpoint).query(&[("apply_markdown", "false")]);
        let response: SingleMessageResponse = self.execute(&endpoint, request).await?;
        Ok(response.message)
    }

    async fn send_message(
        &self,
        channel: &str,
        topic: &str,
        body: &str,
    ) -> Result<SendReceipt, TransportError> {
        debug!(channel, topic, bytes = body.len(), "Sending message");
        let request = self.post("messages").form(&[
            ("type", "stream"),
            ("to", channel),
            ("topic", topic),
            ("content", body),
        ]);
        let response: SendResponse = self.execute("messages", request).await?;
        Ok(SendReceipt { id: response.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zulipfs_config::HumanDuration;

    #[test]
    fn test_new_trims_site() {
        let transport = ZulipHttpTransport::new(
            "https://chat.example.com/",
            "bot@example.com",
            "secret",
            Duration::from_secs(30),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(transport.site(), "https://chat.example.com");
        assert_eq!(
            transport.url("messages/5"),
            "https://chat.example.com/api/v1/messages/5"
        );
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let mut config = TransportConfig {
            site: Some("https://chat.example.com".to_string()),
            email: Some("bot@example.com".to_string()),
            api_key: None,
            timeout: HumanDuration::from_secs(10),
            ..Default::default()
        };
        let err = ZulipHttpTransport::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("api_key"));

        config.api_key = Some("secret".to_string());
        assert!(ZulipHttpTransport::from_config(&config).is_ok());
    }

    #[test]
    fn test_user_agent_carries_version() {
        assert!(USER_AGENT.starts_with("zulipfs/"));
        assert_eq!(&USER_AGENT["zulipfs/".len()..], env!("CARGO_PKG_VERSION"));
    }
}
