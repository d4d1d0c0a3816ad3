use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, instrument};
use zulipfs_config::{CachePolicy, NameStrategy, RenderTimezone, ZulipFsConfig};

use crate::error::{FsError, TransportError};
use crate::hierarchy::{HierarchyCache, HierarchySettings, Topic};
use crate::messages::{ContentSnapshot, MessageCache};
use crate::names::NameCodec;
use crate::path::FsPath;
use crate::render::MessageRenderer;
use crate::transport::MessagingTransport;

/// Nominal size reported for directories.
pub const DIRECTORY_SIZE: u64 = 4096;

const DIRECTORY_PERM: u16 = 0o755;
const FILE_PERM: u16 = 0o644;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

/// Attributes of a directory or topic file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    pub kind: NodeKind,
    pub size: u64,
    pub perm: u16,
    /// Used for modification, access and change time alike.
    pub modified: SystemTime,
}

impl Attributes {
    fn directory() -> Self {
        Attributes {
            kind: NodeKind::Directory,
            size: DIRECTORY_SIZE,
            perm: DIRECTORY_PERM,
            modified: SystemTime::now(),
        }
    }

    fn file(size: u64, modified: SystemTime) -> Self {
        Attributes {
            kind: NodeKind::File,
            size,
            perm: FILE_PERM,
            modified,
        }
    }

    fn from_snapshot(snapshot: &ContentSnapshot) -> Self {
        Attributes::file(snapshot.len() as u64, timestamp_to_system_time(snapshot.timestamp))
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// Settings controlling naming, caching and rendering.
#[derive(Debug, Clone, Default)]
pub struct AdapterSettings {
    pub names: NameStrategy,
    pub policy: CachePolicy,
    pub timezone: RenderTimezone,
    pub hierarchy: HierarchySettings,
}

impl AdapterSettings {
    pub fn from_config(config: &ZulipFsConfig) -> Self {
        AdapterSettings {
            names: config.names.strategy,
            policy: config.cache.policy,
            timezone: config.render.timezone,
            hierarchy: HierarchySettings {
                topic_page_size: config.cache.topic_page_size,
                channel_limit: config.cache.channel_limit,
            },
        }
    }
}

/// Maps list/stat/read/write onto the caches and the messaging transport.
pub struct FilesystemAdapter {
    transport: Arc<dyn MessagingTransport>,
    hierarchy: HierarchyCache,
    messages: MessageCache,
}

impl FilesystemAdapter {
    /// Build the adapter, fetching the channel listing once.
    pub async fn new(
        transport: Arc<dyn MessagingTransport>,
        settings: AdapterSettings,
    ) -> Result<Self, TransportError> {
        let hierarchy = HierarchyCache::load(
            transport.clone(),
            NameCodec::new(settings.names),
            settings.hierarchy,
        )
        .await?;
        let messages = MessageCache::new(
            transport.clone(),
            settings.policy,
            MessageRenderer::new(settings.timezone),
        );

        Ok(FilesystemAdapter {
            transport,
            hierarchy,
            messages,
        })
    }

    pub async fn from_config(
        transport: Arc<dyn MessagingTransport>,
        config: &ZulipFsConfig,
    ) -> Result<Self, TransportError> {
        Self::new(transport, AdapterSettings::from_config(config)).await
    }

    pub fn hierarchy(&self) -> &HierarchyCache {
        &self.hierarchy
    }

    /// Entry names of a directory, starting with `.` and `..`.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn list(&self, path: &str) -> Result<Vec<String>, FsError> {
        let mut entries = vec![".".to_string(), "..".to_string()];
        match FsPath::parse(path) {
            FsPath::Root => {
                entries.extend(
                    self.hierarchy
                        .list_channels()
                        .iter()
                        .map(|c| c.normalized_name.clone()),
                );
            }
            FsPath::Channel(channel) => {
                let topics = self.hierarchy.list_topics(channel).await?;
                entries.extend(topics.iter().map(|t| t.normalized_name().to_string()));
            }
            FsPath::Topic(..) | FsPath::Malformed => {
                return Err(FsError::NotADirectory(path.to_string()))
            }
        }
        debug!(count = entries.len() - 2, "listed directory");
        Ok(entries)
    }

    /// Attributes of a path. For topic files this may contact the service,
    /// depending on the cache policy.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn attributes(&self, path: &str) -> Result<Attributes, FsError> {
        match FsPath::parse(path) {
            FsPath::Root => Ok(Attributes::directory()),
            FsPath::Channel(channel) if self.hierarchy.channel_exists(channel) => {
                Ok(Attributes::directory())
            }
            FsPath::Channel(_) | FsPath::Malformed => Err(FsError::NotFound(path.to_string())),
            FsPath::Topic(channel, topic) => {
                let topic = self.hierarchy.topic(channel, topic)?;
                match self.messages.policy() {
                    CachePolicy::AccumulateLatest => {
                        let snapshot = self.content(topic).await?;
                        Ok(Attributes::from_snapshot(&snapshot))
                    }
                    CachePolicy::RefetchReplace => Ok(self.placeholder_attributes(&topic).await),
                }
            }
        }
    }

    /// Read up to `size` bytes of a topic file starting at `offset`.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn read(&self, path: &str, size: usize, offset: u64) -> Result<Vec<u8>, FsError> {
        let topic = self.file_topic(path)?;
        let snapshot = self.content(topic).await?;
        let data = slice(&snapshot.content, size, offset);
        debug!(total = snapshot.len(), returned = data.len(), "read topic");
        Ok(data.to_vec())
    }

    /// Post `data` as one new message to the topic. Returns the number of
    /// bytes accepted. The cached content is not updated; the message shows
    /// up on the next read.
    #[instrument(skip(self, data), fields(path = %path, size = data.len()))]
    pub async fn write(&self, path: &str, data: &[u8], offset: u64) -> Result<usize, FsError> {
        let (channel, topic) = match FsPath::parse(path) {
            FsPath::Topic(channel, topic) => (channel, topic),
            FsPath::Malformed => return Err(FsError::NotFound(path.to_string())),
            FsPath::Root | FsPath::Channel(_) => return Err(FsError::NotAFile(path.to_string())),
        };
        if offset != 0 {
            return Err(FsError::UnsupportedOffset {
                path: path.to_string(),
                offset,
            });
        }

        let channel = self
            .hierarchy
            .channel(channel)
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        let topic_name = match self.hierarchy.find_topic(&channel.normalized_name, topic) {
            Some(known) => known.service_name().to_string(),
            None => self.hierarchy.codec().decode(topic),
        };
        let body = std::str::from_utf8(data)
            .map_err(|e| FsError::InvalidInput(format!("message body is not UTF-8: {}", e)))?;

        let receipt = self
            .transport
            .send_message(&channel.service_name, &topic_name, body)
            .await?;
        debug!(id = receipt.id, "posted message");
        Ok(data.len())
    }

    fn file_topic(&self, path: &str) -> Result<Arc<Topic>, FsError> {
        match FsPath::parse(path) {
            FsPath::Topic(channel, topic) => self.hierarchy.topic(channel, topic),
            FsPath::Malformed => Err(FsError::NotFound(path.to_string())),
            FsPath::Root => Err(FsError::NotAFile(path.to_string())),
            FsPath::Channel(channel) => {
                if self.hierarchy.channel_exists(channel) {
                    Err(FsError::NotAFile(path.to_string()))
                } else {
                    Err(FsError::NotFound(path.to_string()))
                }
            }
        }
    }

    /// Refresh a topic's content and keep the topic once it has some.
    async fn content(&self, topic: Arc<Topic>) -> Result<ContentSnapshot, FsError> {
        let snapshot = self.messages.current_content(&topic).await?;
        self.hierarchy.adopt(&topic);
        Ok(snapshot)
    }

    async fn placeholder_attributes(&self, topic: &Topic) -> Attributes {
        match self.messages.cached_content(topic).await {
            Some(snapshot) => Attributes::from_snapshot(&snapshot),
            None => Attributes::file(0, SystemTime::now()),
        }
    }
}

fn slice(content: &[u8], size: usize, offset: u64) -> &[u8] {
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(content.len());
    let end = start.saturating_add(size).min(content.len());
    &content[start..end]
}

fn timestamp_to_system_time(timestamp: i64) -> SystemTime {
    if timestamp >= 0 {
        UNIX_EPOCH + Duration::from_secs(timestamp as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(timestamp.unsigned_abs())
    }
}
