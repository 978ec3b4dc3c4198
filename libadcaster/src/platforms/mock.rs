//! Mock platform adapter for testing

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::types::{AdContent, Engagement, PublishResult};

use super::PlatformAdapter;

/// Configurable adapter that records everything handed to it
pub struct MockAdapter {
    name: String,
    should_succeed: bool,
    failure_message: String,
    post_id: String,
    character_limit: Option<usize>,
    requires_image: bool,
    engagement: Engagement,
    publish_calls: AtomicU32,
    metrics_calls: AtomicU32,
    published_content: Arc<Mutex<Vec<String>>>,
}

impl MockAdapter {
    /// Adapter that accepts every publish
    pub fn success(name: &str) -> Self {
        Self {
            name: name.to_string(),
            should_succeed: true,
            failure_message: String::new(),
            post_id: format!("{}_post_1", name),
            character_limit: None,
            requires_image: false,
            engagement: Engagement::default(),
            publish_calls: AtomicU32::new(0),
            metrics_calls: AtomicU32::new(0),
            published_content: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adapter that rejects every publish with the given message
    pub fn failure(name: &str, message: &str) -> Self {
        let mut adapter = Self::success(name);
        adapter.should_succeed = false;
        adapter.failure_message = message.to_string();
        adapter
    }

    pub fn with_post_id(mut self, post_id: &str) -> Self {
        self.post_id = post_id.to_string();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.character_limit = Some(limit);
        self
    }

    pub fn requiring_image(mut self) -> Self {
        self.requires_image = true;
        self
    }

    pub fn with_engagement(mut self, engagement: Engagement) -> Self {
        self.engagement = engagement;
        self
    }

    pub fn publish_calls(&self) -> u32 {
        self.publish_calls.load(Ordering::SeqCst)
    }

    pub fn metrics_calls(&self) -> u32 {
        self.metrics_calls.load(Ordering::SeqCst)
    }

    /// Captions handed to successful publishes, in order
    pub fn published_content(&self) -> Vec<String> {
        self.published_content
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn character_limit(&self) -> Option<usize> {
        self.character_limit
    }

    fn requires_image(&self) -> bool {
        self.requires_image
    }

    async fn publish(&self, content: &AdContent) -> PublishResult {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(failure) = super::validate_locally(self, content) {
            return failure;
        }
        if !self.should_succeed {
            return PublishResult::failed(&self.name, self.failure_message.clone());
        }

        let caption =
            crate::content::finalize_for_platform(&content.copy, &content.hashtags, &self.name);
        if let Ok(mut published) = self.published_content.lock() {
            published.push(caption);
        }

        PublishResult::published(&self.name, self.post_id.clone())
    }

    async fn fetch_metrics(&self, _platform_post_id: &str) -> Engagement {
        self.metrics_calls.fetch_add(1, Ordering::SeqCst);
        self.engagement
    }
}
