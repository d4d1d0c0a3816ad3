//! Channel/topic hierarchy discovered from the messaging service.
//!
//! Channels are loaded once when the cache is built and never refreshed;
//! channels created on the server afterwards stay invisible until remount.
//! Each channel's topic listing is fetched lazily on first directory access
//! and memoized. Topics can also become known as a side effect of a read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::error::{FsError, TransportError};
use crate::names::NameCodec;
use crate::transport::MessagingTransport;

/// A top-level grouping presented as a directory. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub service_id: u64,
    pub service_name: String,
    /// Unique directory entry name.
    pub normalized_name: String,
}

/// Cached content of a topic file, guarded by the topic's lock.
#[derive(Debug, Default)]
pub(crate) struct TopicState {
    pub(crate) content: Option<Vec<u8>>,
    pub(crate) last_timestamp: Option<i64>,
    pub(crate) max_message_id: Option<u64>,
}

/// A conversation thread presented as a file.
#[derive(Debug)]
pub struct Topic {
    channel: Arc<Channel>,
    service_name: String,
    normalized_name: String,
    /// Set once the topic appeared in a listing or returned a message.
    visible: AtomicBool,
    pub(crate) state: Mutex<TopicState>,
}

impl Topic {
    fn new(channel: Arc<Channel>, service_name: String, normalized_name: String) -> Self {
        Topic {
            channel,
            service_name,
            normalized_name,
            visible: AtomicBool::new(false),
            state: Mutex::new(TopicState::default()),
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn normalized_name(&self) -> &str {
        &self.normalized_name
    }

    /// Filesystem path of this topic, e.g. `/general/design-review`.
    pub fn path(&self) -> String {
        format!("/{}/{}", self.channel.normalized_name, self.normalized_name)
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    pub(crate) fn mark_visible(&self) {
        self.visible.store(true, Ordering::Release);
    }

    /// Newest message id known for this topic.
    pub async fn max_message_id(&self) -> Option<u64> {
        self.state.lock().await.max_message_id
    }
}

/// Settings for hierarchy discovery.
#[derive(Debug, Clone)]
pub struct HierarchySettings {
    /// Maximum topics requested per channel listing.
    pub topic_page_size: usize,
    /// Keep only the first N channels by creation order.
    pub channel_limit: Option<usize>,
}

impl Default for HierarchySettings {
    fn default() -> Self {
        HierarchySettings {
            topic_page_size: zulipfs_config::DEFAULT_TOPIC_PAGE_SIZE,
            channel_limit: None,
        }
    }
}

struct ChannelNode {
    channel: Arc<Channel>,
    topics: RwLock<IndexMap<String, Arc<Topic>>>,
    listed: OnceCell<()>,
}

/// Known channels and, per channel, known topics.
pub struct HierarchyCache {
    transport: Arc<dyn MessagingTransport>,
    codec: NameCodec,
    settings: HierarchySettings,
    channels: IndexMap<String, ChannelNode>,
}

impl HierarchyCache {
    /// Fetch the channel listing and build the cache.
    pub async fn load(
        transport: Arc<dyn MessagingTransport>,
        codec: NameCodec,
        settings: HierarchySettings,
    ) -> Result<Self, TransportError> {
        let mut records = transport.list_channels().await?;

        if let Some(limit) = settings.channel_limit {
            records.sort_by_key(|r| r.id);
            records.truncate(limit);
        }

        let mut channels: IndexMap<String, ChannelNode> = IndexMap::with_capacity(records.len());
        for record in records {
            let encoded = codec.encode(&record.name);
            let normalized = if channels.contains_key(&encoded) {
                let unique = unique_channel_key(&channels, &encoded, record.id);
                warn!(
                    "Channel name collision: '{}' encodes to '{}', exposing it as '{}'",
                    record.name, encoded, unique
                );
                unique
            } else {
                encoded
            };

            let channel = Arc::new(Channel {
                service_id: record.id,
                service_name: record.name,
                normalized_name: normalized.clone(),
            });
            channels.insert(
                normalized,
                ChannelNode {
                    channel,
                    topics: RwLock::new(IndexMap::new()),
                    listed: OnceCell::new(),
                },
            );
        }

        info!("Loaded {} channels", channels.len());

        Ok(HierarchyCache {
            transport,
            codec,
            settings,
            channels,
        })
    }

    pub fn codec(&self) -> &NameCodec {
        &self.codec
    }

    /// All known channels in load order.
    pub fn list_channels(&self) -> Vec<Arc<Channel>> {
        self.channels.values().map(|n| n.channel.clone()).collect()
    }

    pub fn channel(&self, normalized_name: &str) -> Option<Arc<Channel>> {
        self.channels.get(normalized_name).map(|n| n.channel.clone())
    }

    pub fn channel_exists(&self, normalized_name: &str) -> bool {
        self.channels.contains_key(normalized_name)
    }

    /// Known topics of a channel, fetching the listing on first access.
    pub async fn list_topics(&self, channel: &str) -> Result<Vec<Arc<Topic>>, FsError> {
        let node = self.node(channel)?;

        node.listed
            .get_or_try_init(|| self.fetch_listing(node))
            .await?;

        let topics = node.topics.read().unwrap_or_else(|e| e.into_inner());
        Ok(topics.values().filter(|t| t.is_visible()).cloned().collect())
    }

    /// True if the topic was listed or the service has returned a message for it.
    pub fn topic_exists(&self, channel: &str, topic: &str) -> bool {
        self.channels
            .get(channel)
            .and_then(|node| {
                let topics = node.topics.read().unwrap_or_else(|e| e.into_inner());
                topics.get(topic).map(|t| t.is_visible())
            })
            .unwrap_or(false)
    }

    /// Look up an already registered topic without registering it.
    pub fn find_topic(&self, channel: &str, topic: &str) -> Option<Arc<Topic>> {
        let node = self.channels.get(channel)?;
        let topics = node.topics.read().unwrap_or_else(|e| e.into_inner());
        topics.get(topic).cloned()
    }

    /// Resolve a topic segment. A topic not seen before is returned detached:
    /// it is not registered until [`HierarchyCache::adopt`] is called, so
    /// probing names that do not exist leaves nothing behind.
    pub fn topic(&self, channel: &str, topic: &str) -> Result<Arc<Topic>, FsError> {
        let node = self.node(channel)?;

        if let Some(existing) = node
            .topics
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(topic)
        {
            return Ok(existing.clone());
        }

        Ok(Arc::new(Topic::new(
            node.channel.clone(),
            self.codec.decode(topic),
            topic.to_string(),
        )))
    }

    /// Register a topic that returned content. If another caller registered
    /// the same name first, that entry wins and is returned.
    pub fn adopt(&self, topic: &Arc<Topic>) -> Arc<Topic> {
        let Some(node) = self.channels.get(&topic.channel.normalized_name) else {
            return topic.clone();
        };

        let mut topics = node.topics.write().unwrap_or_else(|e| e.into_inner());
        topics
            .entry(topic.normalized_name.clone())
            .or_insert_with(|| {
                debug!("Registering topic '{}'", topic.path());
                topic.clone()
            })
            .clone()
    }

    fn node(&self, channel: &str) -> Result<&ChannelNode, FsError> {
        self.channels
            .get(channel)
            .ok_or_else(|| FsError::NotFound(format!("/{}", channel)))
    }

    async fn fetch_listing(&self, node: &ChannelNode) -> Result<(), FsError> {
        let channel = &node.channel;
        debug!(
            "Listing topics for '{}' (limit {})",
            channel.service_name, self.settings.topic_page_size
        );
        let records = self
            .transport
            .list_topics(channel.service_id, self.settings.topic_page_size)
            .await?;

        let mut topics = node.topics.write().unwrap_or_else(|e| e.into_inner());
        for record in records.into_iter().take(self.settings.topic_page_size) {
            let encoded = self.codec.encode(&record.name);
            let key = unique_topic_key(&topics, &encoded, &record.name);
            if key != encoded {
                warn!(
                    "Topic name collision in '{}': '{}' encodes to '{}', exposing it as '{}'",
                    channel.normalized_name, record.name, encoded, key
                );
            }

            let topic = topics
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Topic::new(channel.clone(), record.name, key)))
                .clone();
            topic.mark_visible();

            if let Some(max_id) = record.max_message_id {
                // Only uncontended topics are updated; a concurrent read already holds fresher data.
                if let Ok(mut state) = topic.state.try_lock() {
                    if state.max_message_id.map_or(true, |cur| max_id > cur) {
                        state.max_message_id = Some(max_id);
                    }
                }
            }
        }

        info!(
            "Listed {} topics for '{}'",
            topics.len(),
            channel.normalized_name
        );
        Ok(())
    }
}

/// First free key of the form `<segment>~<id>`, then `<segment>~<id>~<n>`.
fn unique_channel_key(channels: &IndexMap<String, ChannelNode>, encoded: &str, id: u64) -> String {
    let base = format!("{}~{}", encoded, id);
    let mut candidate = base.clone();
    let mut n = 2;
    while channels.contains_key(&candidate) {
        candidate = format!("{}~{}", base, n);
        n += 1;
    }
    candidate
}

/// Key under which a listed topic is stored: its encoded name, unless an
/// entry with that key belongs to a different service name.
fn unique_topic_key(
    topics: &IndexMap<String, Arc<Topic>>,
    encoded: &str,
    service_name: &str,
) -> String {
    let mut candidate = encoded.to_string();
    let mut n = 2;
    while let Some(existing) = topics.get(&candidate) {
        if existing.service_name == service_name {
            break;
        }
        candidate = format!("{}~{}", encoded, n);
        n += 1;
    }
    candidate
}
