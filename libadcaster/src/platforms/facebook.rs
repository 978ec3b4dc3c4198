//! Facebook page adapter (Graph API)

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::FacebookConfig;
use crate::content::finalize_for_platform;
use crate::types::{AdContent, PublishResult};

use super::PlatformAdapter;

const GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";

pub struct FacebookAdapter {
    client: reqwest::Client,
    config: FacebookConfig,
}

impl FacebookAdapter {
    pub fn new(config: FacebookConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn post_text(&self, message: &str) -> Result<String, String> {
        let url = format!("{}/{}/feed", GRAPH_BASE, self.config.page_id);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("message", message),
                ("access_token", &self.config.access_token),
            ])
            .send()
            .await
            .map_err(|e| format!("facebook request failed: {}", e))?;

        extract_post_id(response).await
    }

    async fn post_photo(&self, caption: &str, image: Vec<u8>) -> Result<String, String> {
        let url = format!("{}/{}/photos", GRAPH_BASE, self.config.page_id);
        let part = reqwest::multipart::Part::bytes(image)
            .file_name("ad.png")
            .mime_str("image/png")
            .map_err(|e| format!("invalid image payload: {}", e))?;
        let form = reqwest::multipart::Form::new()
            .text("caption", caption.to_string())
            .text("access_token", self.config.access_token.clone())
            .part("source", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("facebook request failed: {}", e))?;

        extract_post_id(response).await
    }
}

async fn extract_post_id(response: reqwest::Response) -> Result<String, String> {
    let status = response.status();
    let payload: serde_json::Value = response
        .json()
        .await
        .map_err(|e| format!("malformed facebook response: {}", e))?;

    if !status.is_success() {
        let message = payload["error"]["message"]
            .as_str()
            .unwrap_or("unknown error");
        return Err(format!("facebook returned {}: {}", status, message));
    }

    payload["id"]
        .as_str()
        .or_else(|| payload["post_id"].as_str())
        .map(|id| id.to_string())
        .ok_or_else(|| "facebook response missing post id".to_string())
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn name(&self) -> &str {
        "facebook"
    }

    async fn publish(&self, content: &AdContent) -> PublishResult {
        if let Some(failure) = super::validate_locally(self, content) {
            return failure;
        }

        let caption = finalize_for_platform(&content.copy, &content.hashtags, self.name());
        let outcome = match content.image.clone() {
            Some(image) => self.post_photo(&caption, image).await,
            None => self.post_text(&caption).await,
        };

        match outcome {
            Ok(post_id) => {
                debug!(post_id = %post_id, "published to facebook");
                PublishResult::published(self.name(), post_id)
            }
            Err(error) => {
                warn!(error = %error, "facebook publish failed");
                PublishResult::failed(self.name(), error)
            }
        }
    }
}
