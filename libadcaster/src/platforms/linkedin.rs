//! LinkedIn organization-page adapter (UGC posts API)

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::LinkedinConfig;
use crate::content::finalize_for_platform;
use crate::types::{AdContent, PublishResult};

use super::PlatformAdapter;

const UGC_POSTS_URL: &str = "https://api.linkedin.com/v2/ugcPosts";

pub struct LinkedinAdapter {
    client: reqwest::Client,
    config: LinkedinConfig,
}

impl LinkedinAdapter {
    pub fn new(config: LinkedinConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn post_ugc(&self, text: &str) -> Result<String, String> {
        let author = format!("urn:li:organization:{}", self.config.organization_id);
        let body = json!({
            "author": author,
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": { "text": text },
                    "shareMediaCategory": "NONE",
                }
            },
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC",
            }
        });

        let response = self
            .client
            .post(UGC_POSTS_URL)
            .bearer_auth(&self.config.access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("linkedin request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("linkedin returned {}: {}", status, detail));
        }

        // The post urn comes back in the X-RestLi-Id header; fall back to the
        // body id for older API versions
        if let Some(id) = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
        {
            return Ok(id.to_string());
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("malformed linkedin response: {}", e))?;

        payload["id"]
            .as_str()
            .map(|id| id.to_string())
            .ok_or_else(|| "linkedin response missing post id".to_string())
    }
}

#[async_trait]
impl PlatformAdapter for LinkedinAdapter {
    fn name(&self) -> &str {
        "linkedin"
    }

    async fn publish(&self, content: &AdContent) -> PublishResult {
        if let Some(failure) = super::validate_locally(self, content) {
            return failure;
        }

        let text = finalize_for_platform(&content.copy, &content.hashtags, self.name());

        match self.post_ugc(&text).await {
            Ok(post_id) => {
                debug!(post_id = %post_id, "published to linkedin");
                PublishResult::published(self.name(), post_id)
            }
            Err(error) => {
                warn!(error = %error, "linkedin publish failed");
                PublishResult::failed(self.name(), error)
            }
        }
    }
}
