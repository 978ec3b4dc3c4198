//! Instagram business-account adapter (Graph API container flow)
//!
//! Instagram publishing is a two-step flow: create a media container, then
//! publish it. Image-less posts are rejected locally before any API call.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::InstagramConfig;
use crate::content::finalize_for_platform;
use crate::types::{AdContent, PublishResult};

use super::PlatformAdapter;

const GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";

pub struct InstagramAdapter {
    client: reqwest::Client,
    config: InstagramConfig,
}

impl InstagramAdapter {
    pub fn new(config: InstagramConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn create_container(&self, caption: &str, image: Vec<u8>) -> Result<String, String> {
        let url = format!("{}/{}/media", GRAPH_BASE, self.config.business_account_id);
        let part = reqwest::multipart::Part::bytes(image)
            .file_name("ad.png")
            .mime_str("image/png")
            .map_err(|e| format!("invalid image payload: {}", e))?;
        let form = reqwest::multipart::Form::new()
            .text("caption", caption.to_string())
            .text("access_token", self.config.access_token.clone())
            .part("image", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("instagram request failed: {}", e))?;

        extract_id(response, "container").await
    }

    async fn publish_container(&self, container_id: &str) -> Result<String, String> {
        let url = format!(
            "{}/{}/media_publish",
            GRAPH_BASE, self.config.business_account_id
        );
        let response = self
            .client
            .post(&url)
            .form(&[
                ("creation_id", container_id),
                ("access_token", &self.config.access_token),
            ])
            .send()
            .await
            .map_err(|e| format!("instagram request failed: {}", e))?;

        extract_id(response, "media").await
    }
}

async fn extract_id(response: reqwest::Response, what: &str) -> Result<String, String> {
    let status = response.status();
    let payload: serde_json::Value = response
        .json()
        .await
        .map_err(|e| format!("malformed instagram response: {}", e))?;

    if !status.is_success() {
        let message = payload["error"]["message"]
            .as_str()
            .unwrap_or("unknown error");
        return Err(format!("instagram returned {}: {}", status, message));
    }

    payload["id"]
        .as_str()
        .map(|id| id.to_string())
        .ok_or_else(|| format!("instagram response missing {} id", what))
}

#[async_trait]
impl PlatformAdapter for InstagramAdapter {
    fn name(&self) -> &str {
        "instagram"
    }

    fn requires_image(&self) -> bool {
        true
    }

    async fn publish(&self, content: &AdContent) -> PublishResult {
        if let Some(failure) = super::validate_locally(self, content) {
            return failure;
        }

        let caption = finalize_for_platform(&content.copy, &content.hashtags, self.name());
        // validate_locally guarantees the image is present
        let Some(image) = content.image.clone() else {
            return PublishResult::failed(self.name(), "instagram posts require an image".to_string());
        };

        let container_id = match self.create_container(&caption, image).await {
            Ok(id) => id,
            Err(error) => {
                warn!(error = %error, "instagram container creation failed");
                return PublishResult::failed(self.name(), error);
            }
        };

        match self.publish_container(&container_id).await {
            Ok(post_id) => {
                debug!(post_id = %post_id, "published to instagram");
                PublishResult::published(self.name(), post_id)
            }
            Err(error) => {
                warn!(error = %error, "instagram publish failed");
                PublishResult::failed(self.name(), error)
            }
        }
    }
}
