//! Twitter/X adapter (v2 API with a bearer token)

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::TwitterConfig;
use crate::content::finalize_for_platform;
use crate::types::{AdContent, PublishResult};

use super::PlatformAdapter;

const TWEET_URL: &str = "https://api.twitter.com/2/tweets";
const MEDIA_UPLOAD_URL: &str = "https://upload.twitter.com/1.1/media/upload.json";

pub struct TwitterAdapter {
    client: reqwest::Client,
    config: TwitterConfig,
}

impl TwitterAdapter {
    pub fn new(config: TwitterConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn upload_media(&self, image: Vec<u8>) -> Result<String, String> {
        let part = reqwest::multipart::Part::bytes(image)
            .file_name("ad.png")
            .mime_str("image/png")
            .map_err(|e| format!("invalid image payload: {}", e))?;
        let form = reqwest::multipart::Form::new().part("media", part);

        let response = self
            .client
            .post(MEDIA_UPLOAD_URL)
            .bearer_auth(&self.config.bearer_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("twitter media upload failed: {}", e))?;

        let status = response.status();
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("malformed twitter response: {}", e))?;

        if !status.is_success() {
            return Err(format!("twitter media upload returned {}", status));
        }

        payload["media_id_string"]
            .as_str()
            .map(|id| id.to_string())
            .ok_or_else(|| "twitter response missing media id".to_string())
    }

    async fn post_tweet(&self, text: &str, media_id: Option<String>) -> Result<String, String> {
        let mut body = json!({ "text": text });
        if let Some(media_id) = media_id {
            body["media"] = json!({ "media_ids": [media_id] });
        }

        let response = self
            .client
            .post(TWEET_URL)
            .bearer_auth(&self.config.bearer_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("twitter request failed: {}", e))?;

        let status = response.status();
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("malformed twitter response: {}", e))?;

        if !status.is_success() {
            let detail = payload["detail"].as_str().unwrap_or("unknown error");
            return Err(format!("twitter returned {}: {}", status, detail));
        }

        payload["data"]["id"]
            .as_str()
            .map(|id| id.to_string())
            .ok_or_else(|| "twitter response missing tweet id".to_string())
    }
}

#[async_trait]
impl PlatformAdapter for TwitterAdapter {
    fn name(&self) -> &str {
        "twitter"
    }

    fn character_limit(&self) -> Option<usize> {
        Some(280)
    }

    async fn publish(&self, content: &AdContent) -> PublishResult {
        if let Some(failure) = super::validate_locally(self, content) {
            return failure;
        }

        let text = finalize_for_platform(&content.copy, &content.hashtags, self.name());

        let media_id = match content.image.clone() {
            Some(image) => match self.upload_media(image).await {
                Ok(id) => Some(id),
                Err(error) => {
                    warn!(error = %error, "twitter media upload failed");
                    return PublishResult::failed(self.name(), error);
                }
            },
            None => None,
        };

        match self.post_tweet(&text, media_id).await {
            Ok(post_id) => {
                debug!(post_id = %post_id, "published to twitter");
                PublishResult::published(self.name(), post_id)
            }
            Err(error) => {
                warn!(error = %error, "twitter publish failed");
                PublishResult::failed(self.name(), error)
            }
        }
    }
}
