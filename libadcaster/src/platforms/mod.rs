//! Platform adapters
//!
//! One adapter per social platform, behind a common trait. Adapters never
//! return errors past [`PlatformAdapter::publish`]: vendor failures, network
//! errors, and local validation failures all become a `PublishResult` with
//! `success = false`, so one bad platform can never abort a scheduler tick.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::types::{AdContent, Engagement, PublishResult};

pub mod facebook;
pub mod instagram;
pub mod linkedin;
pub mod twitter;

// Mock adapter is available for all builds (not just tests) to support
// integration tests
pub mod mock;

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Lowercase platform identifier (e.g. "twitter")
    fn name(&self) -> &str;

    /// Hard caption length limit, if the platform has one
    fn character_limit(&self) -> Option<usize> {
        None
    }

    /// Whether a publish without an image is rejected locally
    fn requires_image(&self) -> bool {
        false
    }

    /// Publish the ad. Infallible by contract; inspect the result.
    async fn publish(&self, content: &AdContent) -> PublishResult;

    /// Engagement counters for a published post. Platforms without a
    /// metrics API report zeros.
    async fn fetch_metrics(&self, _platform_post_id: &str) -> Engagement {
        Engagement::default()
    }
}

/// Build the adapter registry from configuration. Platforms with missing or
/// disabled credential sections are simply absent from the map.
pub fn build_adapters(config: &Config) -> HashMap<String, Arc<dyn PlatformAdapter>> {
    let mut adapters: HashMap<String, Arc<dyn PlatformAdapter>> = HashMap::new();

    if let Some(fb) = config.facebook.as_ref().filter(|c| c.enabled) {
        adapters.insert(
            "facebook".to_string(),
            Arc::new(facebook::FacebookAdapter::new(fb.clone())),
        );
    }
    if let Some(tw) = config.twitter.as_ref().filter(|c| c.enabled) {
        adapters.insert(
            "twitter".to_string(),
            Arc::new(twitter::TwitterAdapter::new(tw.clone())),
        );
    }
    if let Some(ig) = config.instagram.as_ref().filter(|c| c.enabled) {
        adapters.insert(
            "instagram".to_string(),
            Arc::new(instagram::InstagramAdapter::new(ig.clone())),
        );
    }
    if let Some(li) = config.linkedin.as_ref().filter(|c| c.enabled) {
        adapters.insert(
            "linkedin".to_string(),
            Arc::new(linkedin::LinkedinAdapter::new(li.clone())),
        );
    }

    adapters
}

/// Local pre-publish validation shared by the concrete adapters. Returns the
/// failure result to hand back, or None when the content is publishable.
pub(crate) fn validate_locally(
    adapter: &dyn PlatformAdapter,
    content: &AdContent,
) -> Option<PublishResult> {
    if adapter.requires_image() && content.image.is_none() {
        return Some(PublishResult::failed(
            adapter.name(),
            format!("{} posts require an image", adapter.name()),
        ));
    }

    if let Some(limit) = adapter.character_limit() {
        let caption =
            crate::content::finalize_for_platform(&content.copy, &content.hashtags, adapter.name());
        if caption.chars().count() > limit {
            return Some(PublishResult::failed(
                adapter.name(),
                format!(
                    "caption exceeds the {} character limit ({} characters)",
                    limit,
                    caption.chars().count()
                ),
            ));
        }
    }

    None
}
