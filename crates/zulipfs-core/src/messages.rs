//! Per-topic file content and the policy deciding when it is refreshed.
//!
//! Every update runs under the topic's lock, so the fetch/compare/update
//! sequence for one topic is never interleaved with another.

use std::sync::Arc;

use tracing::debug;
use zulipfs_config::CachePolicy;

use crate::error::FsError;
use crate::hierarchy::{Topic, TopicState};
use crate::render::{MessageRenderer, ACCUMULATE_SEPARATOR};
use crate::transport::{MessageRecord, MessagingTransport};

/// Content of a topic file at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSnapshot {
    pub content: Vec<u8>,
    /// Timestamp of the newest message included.
    pub timestamp: i64,
}

impl ContentSnapshot {
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl TopicState {
    fn snapshot(&self) -> Option<ContentSnapshot> {
        match (&self.content, self.last_timestamp) {
            (Some(content), Some(timestamp)) => Some(ContentSnapshot {
                content: content.clone(),
                timestamp,
            }),
            _ => None,
        }
    }

    fn record_id(&mut self, id: u64) {
        if self.max_message_id.map_or(true, |cur| id > cur) {
            self.max_message_id = Some(id);
        }
    }

    /// Store the first message, or append a strictly newer one.
    fn accumulate(&mut self, rendered: Vec<u8>, message: &MessageRecord) -> bool {
        let updated = match (self.content.is_some(), self.last_timestamp) {
            (true, Some(last)) if message.timestamp > last => {
                if let Some(content) = self.content.as_mut() {
                    content.extend_from_slice(ACCUMULATE_SEPARATOR);
                    content.extend_from_slice(&rendered);
                }
                true
            }
            (true, Some(_)) => false,
            _ => {
                self.content = Some(rendered);
                true
            }
        };
        if updated {
            self.last_timestamp = Some(message.timestamp);
        }
        self.record_id(message.id);
        updated
    }

    fn replace(&mut self, rendered: Vec<u8>, message: &MessageRecord) {
        self.content = Some(rendered);
        self.last_timestamp = Some(message.timestamp);
        self.max_message_id = Some(message.id);
    }
}

/// Resolves topic content through the transport under one cache policy.
pub struct MessageCache {
    transport: Arc<dyn MessagingTransport>,
    policy: CachePolicy,
    renderer: MessageRenderer,
}

impl MessageCache {
    pub fn new(
        transport: Arc<dyn MessagingTransport>,
        policy: CachePolicy,
        renderer: MessageRenderer,
    ) -> Self {
        MessageCache {
            transport,
            policy,
            renderer,
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Current file content, refreshed from the service according to the
    /// policy. `NotFound` when the service has no messages for the topic and
    /// nothing was cached before.
    pub async fn current_content(&self, topic: &Topic) -> Result<ContentSnapshot, FsError> {
        let mut state = topic.state.lock().await;

        match self.policy {
            CachePolicy::AccumulateLatest => self.refresh_accumulate(topic, &mut state).await?,
            CachePolicy::RefetchReplace => self.refresh_replace(topic, &mut state).await?,
        }

        let snapshot = state
            .snapshot()
            .ok_or_else(|| FsError::NotFound(topic.path()))?;
        topic.mark_visible();
        Ok(snapshot)
    }

    /// Cached content without contacting the service.
    pub async fn cached_content(&self, topic: &Topic) -> Option<ContentSnapshot> {
        topic.state.lock().await.snapshot()
    }

    async fn refresh_accumulate(&self, topic: &Topic, state: &mut TopicState) -> Result<(), FsError> {
        let latest = self.fetch_latest(topic).await?;
        if let Some(message) = latest {
            let rendered = self.renderer.render(&message);
            if state.accumulate(rendered, &message) {
                debug!("Topic {} advanced to {}", topic.path(), message.timestamp);
            }
        }
        Ok(())
    }

    async fn refresh_replace(&self, topic: &Topic, state: &mut TopicState) -> Result<(), FsError> {
        // The newest message is fetched with its raw body, so it is rendered
        // as is and replaces whatever was cached, edits included.
        if let Some(message) = self.fetch_latest(topic).await? {
            debug!("Replacing {} with message {}", topic.path(), message.id);
            let rendered = self.renderer.render(&message);
            state.replace(rendered, &message);
        }
        Ok(())
    }

    async fn fetch_latest(&self, topic: &Topic) -> Result<Option<MessageRecord>, FsError> {
        let channel = &topic.channel().service_name;
        debug!("Fetching newest message in '{}' / '{}'", channel, topic.service_name());
        Ok(self
            .transport
            .fetch_latest_message(channel, topic.service_name())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{HierarchyCache, HierarchySettings};
    use crate::memory::MemoryTransport;
    use crate::names::NameCodec;
    use zulipfs_config::{NameStrategy, RenderTimezone};

    const T1: i64 = 1_704_103_200; // 2024-01-01 10:00:00 UTC

    async fn setup(policy: CachePolicy) -> (Arc<MemoryTransport>, HierarchyCache, MessageCache) {
        let transport = Arc::new(MemoryTransport::new());
        transport.add_channel(1, "general");
        let hierarchy = HierarchyCache::load(
            transport.clone(),
            NameCodec::new(NameStrategy::EscapeOnly),
            HierarchySettings::default(),
        )
        .await
        .unwrap();
        let cache = MessageCache::new(
            transport.clone(),
            policy,
            MessageRenderer::new(RenderTimezone::Utc),
        );
        (transport, hierarchy, cache)
    }

    fn text(snapshot: &ContentSnapshot) -> &str {
        std::str::from_utf8(&snapshot.content).unwrap()
    }

    #[tokio::test]
    async fn test_accumulate_first_message() {
        let (transport, hierarchy, cache) = setup(CachePolicy::AccumulateLatest).await;
        transport.push_message("general", "design-review", "Alice", "hello", T1);

        let topic = hierarchy.topic("general", "design-review").unwrap();
        let snapshot = cache.current_content(&topic).await.unwrap();
        assert_eq!(text(&snapshot), "[2024-01-01 10:00:00] Alice\nhello\n");
        assert_eq!(snapshot.timestamp, T1);
        assert!(topic.is_visible());
    }

    #[tokio::test]
    async fn test_accumulate_appends_newer_messages() {
        let (transport, hierarchy, cache) = setup(CachePolicy::AccumulateLatest).await;
        let topic = hierarchy.topic("general", "design-review").unwrap();

        transport.push_message("general", "design-review", "Alice", "hello", T1);
        cache.current_content(&topic).await.unwrap();

        transport.push_message("general", "design-review", "Bob", "follow-up", T1 + 3600);
        let snapshot = cache.current_content(&topic).await.unwrap();
        assert_eq!(
            text(&snapshot),
            "[2024-01-01 10:00:00] Alice\nhello\n\n[2024-01-01 11:00:00] Bob\nfollow-up\n"
        );
        assert_eq!(snapshot.timestamp, T1 + 3600);
    }

    #[tokio::test]
    async fn test_accumulate_three_in_order_then_older_ignored() {
        let (transport, hierarchy, cache) = setup(CachePolicy::AccumulateLatest).await;
        let topic = hierarchy.topic("general", "t").unwrap();
        let renderer = MessageRenderer::new(RenderTimezone::Utc);

        let mut expected = Vec::new();
        for (i, ts) in [T1, T1 + 10, T1 + 20].into_iter().enumerate() {
            let id = transport.push_message("general", "t", "Alice", &format!("m{}", i), ts);
            if !expected.is_empty() {
                expected.extend_from_slice(ACCUMULATE_SEPARATOR);
            }
            expected.extend_from_slice(&renderer.render(&transport.message(id).unwrap()));
            cache.current_content(&topic).await.unwrap();
        }
        assert_eq!(cache.cached_content(&topic).await.unwrap().content, expected);

        // A message that sorts newest but carries an older timestamp changes nothing.
        transport.push_message("general", "t", "Mallory", "late", T1 + 15);
        let snapshot = cache.current_content(&topic).await.unwrap();
        assert_eq!(snapshot.content, expected);
        assert_eq!(snapshot.timestamp, T1 + 20);
    }

    #[tokio::test]
    async fn test_accumulate_same_message_not_duplicated() {
        let (transport, hierarchy, cache) = setup(CachePolicy::AccumulateLatest).await;
        let topic = hierarchy.topic("general", "t").unwrap();
        transport.push_message("general", "t", "Alice", "once", T1);

        let first = cache.current_content(&topic).await.unwrap();
        let second = cache.current_content(&topic).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(transport.calls().fetch_latest, 2);
    }

    #[tokio::test]
    async fn test_no_messages_and_no_cache_is_not_found() {
        for policy in [CachePolicy::AccumulateLatest, CachePolicy::RefetchReplace] {
            let (_transport, hierarchy, cache) = setup(policy).await;
            let topic = hierarchy.topic("general", "empty").unwrap();

            let err = cache.current_content(&topic).await.unwrap_err();
            assert!(matches!(err, FsError::NotFound(ref p) if p == "/general/empty"));
            assert!(!topic.is_visible());
        }
    }

    #[tokio::test]
    async fn test_no_messages_keeps_existing_content() {
        for policy in [CachePolicy::AccumulateLatest, CachePolicy::RefetchReplace] {
            let (transport, hierarchy, cache) = setup(policy).await;
            let topic = hierarchy.topic("general", "t").unwrap();
            transport.push_message("general", "t", "Alice", "keep me", T1);
            let before = cache.current_content(&topic).await.unwrap();

            transport.clear_messages();
            let after = cache.current_content(&topic).await.unwrap();
            assert_eq!(before, after);
        }
    }

    #[tokio::test]
    async fn test_replace_uses_newest_only() {
        let (transport, hierarchy, cache) = setup(CachePolicy::RefetchReplace).await;
        let topic = hierarchy.topic("general", "t").unwrap();

        transport.push_message("general", "t", "Alice", "first", T1);
        cache.current_content(&topic).await.unwrap();
        transport.push_message("general", "t", "Bob", "second", T1 + 60);

        let snapshot = cache.current_content(&topic).await.unwrap();
        assert_eq!(text(&snapshot), "[2024-01-01 10:01:00] Bob\nsecond\n");
        assert_eq!(transport.calls().fetch_latest, 2);
        assert_eq!(transport.calls().fetch_by_id, 0);
    }

    #[tokio::test]
    async fn test_replace_is_idempotent_without_new_messages() {
        let (transport, hierarchy, cache) = setup(CachePolicy::RefetchReplace).await;
        let topic = hierarchy.topic("general", "t").unwrap();
        transport.push_message("general", "t", "Alice", "only", T1);

        let first = cache.current_content(&topic).await.unwrap();
        let second = cache.current_content(&topic).await.unwrap();
        assert_eq!(first, second);
        // one remote call per read
        assert_eq!(transport.calls().fetch_latest, 2);
        assert_eq!(transport.calls().fetch_by_id, 0);
    }

    #[tokio::test]
    async fn test_replace_picks_up_edited_message() {
        let (transport, hierarchy, cache) = setup(CachePolicy::RefetchReplace).await;
        let topic = hierarchy.topic("general", "t").unwrap();
        let id = transport.push_message("general", "t", "Alice", "v1", T1);
        cache.current_content(&topic).await.unwrap();

        assert!(transport.edit_message(id, "v2 edited"));
        let snapshot = cache.current_content(&topic).await.unwrap();
        assert_eq!(text(&snapshot), "[2024-01-01 10:00:00] Alice\nv2 edited\n");
        assert_eq!(snapshot.timestamp, T1);
    }

    #[tokio::test]
    async fn test_replace_fills_listed_topic() {
        let (transport, hierarchy, cache) = setup(CachePolicy::RefetchReplace).await;
        transport.push_message("general", "t", "Alice", "listed", T1);
        let topic = hierarchy.list_topics("general").await.unwrap().remove(0);

        // listed id is known but content is not; one fetch fills it
        let snapshot = cache.current_content(&topic).await.unwrap();
        assert_eq!(text(&snapshot), "[2024-01-01 10:00:00] Alice\nlisted\n");
        assert_eq!(topic.max_message_id().await, Some(1));
        assert_eq!(transport.calls().fetch_latest, 1);
    }

    #[tokio::test]
    async fn test_cached_content_does_not_fetch() {
        let (transport, hierarchy, cache) = setup(CachePolicy::RefetchReplace).await;
        let topic = hierarchy.topic("general", "t").unwrap();
        transport.push_message("general", "t", "Alice", "x", T1);

        assert!(cache.cached_content(&topic).await.is_none());
        assert_eq!(transport.calls().fetch_latest, 0);

        cache.current_content(&topic).await.unwrap();
        assert!(cache.cached_content(&topic).await.is_some());
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let (transport, hierarchy, cache) = setup(CachePolicy::AccumulateLatest).await;
        let topic = hierarchy.topic("general", "t").unwrap();
        transport.set_offline(true);

        let err = cache.current_content(&topic).await.unwrap_err();
        assert!(matches!(err, FsError::Transport(_)));
    }

    #[tokio::test]
    async fn test_concurrent_reads_do_not_duplicate_content() {
        let (transport, hierarchy, cache) = setup(CachePolicy::AccumulateLatest).await;
        let cache = Arc::new(cache);
        let topic = hierarchy.topic("general", "t").unwrap();
        transport.push_message("general", "t", "Alice", "hello", T1);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let topic = topic.clone();
            handles.push(tokio::spawn(async move {
                cache.current_content(&topic).await.unwrap()
            }));
        }
        for handle in handles {
            let snapshot = handle.await.unwrap();
            assert_eq!(text(&snapshot), "[2024-01-01 10:00:00] Alice\nhello\n");
        }
    }
}
