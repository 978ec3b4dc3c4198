//! Generative API clients for ad copy and images
//!
//! The assembler only sees the [`ContentGenerator`] trait; the OpenAI-style
//! client and the test mock are interchangeable behind it.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::config::GeneratorConfig;
use crate::error::{PlatformError, Result};

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// One chat-style completion; returns the trimmed message text
    async fn generate_text(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String>;

    /// One image; returns the raw image bytes
    async fn generate_image(&self, prompt: &str, size: &str) -> Result<Vec<u8>>;
}

/// Client for an OpenAI-compatible API (chat completions + image generation)
pub struct OpenAiGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
}

impl OpenAiGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn map_status(status: reqwest::StatusCode, body: String) -> PlatformError {
        match status.as_u16() {
            401 | 403 => PlatformError::Authentication(format!(
                "generator rejected credentials ({}): {}",
                status, body
            )),
            429 => PlatformError::RateLimit(format!("generator rate limited: {}", body)),
            _ => PlatformError::Posting(format!("generator returned {}: {}", status, body)),
        }
    }
}

#[async_trait]
impl ContentGenerator for OpenAiGenerator {
    async fn generate_text(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.api_base);
        let body = json!({
            "model": self.config.text_model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("generator request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, body).into());
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PlatformError::Posting(format!("malformed generator response: {}", e)))?;

        let text = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                PlatformError::Posting("generator response missing message content".to_string())
            })?;

        debug!(model = %self.config.text_model, chars = text.len(), "generated text");
        Ok(text.trim().to_string())
    }

    async fn generate_image(&self, prompt: &str, size: &str) -> Result<Vec<u8>> {
        let url = format!("{}/images/generations", self.config.api_base);
        let body = json!({
            "model": self.config.image_model,
            "prompt": prompt,
            "n": 1,
            "size": size,
            "response_format": "b64_json",
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("generator request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, body).into());
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PlatformError::Posting(format!("malformed generator response: {}", e)))?;

        let encoded = payload["data"][0]["b64_json"].as_str().ok_or_else(|| {
            PlatformError::Posting("generator response missing image data".to_string())
        })?;

        let bytes = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| PlatformError::Posting(format!("invalid image payload: {}", e)))?;

        debug!(model = %self.config.image_model, bytes = bytes.len(), "generated image");
        Ok(bytes)
    }
}

// ============================================================================
// Mock generator (available for all builds to support integration tests)
// ============================================================================

#[derive(Debug, Default)]
struct MockCalls {
    text: u32,
    image: u32,
}

/// Scripted generator for tests
pub struct MockGenerator {
    text_response: std::result::Result<String, String>,
    image_response: std::result::Result<Vec<u8>, String>,
    calls: Arc<Mutex<MockCalls>>,
}

impl MockGenerator {
    /// Succeeds with canned text and a tiny byte payload
    pub fn succeeding() -> Self {
        Self {
            text_response: Ok("Generated ad copy with a call to action.".to_string()),
            image_response: Ok(vec![0xFF, 0xD8, 0xFF]),
            calls: Arc::new(Mutex::new(MockCalls::default())),
        }
    }

    /// Fails both text and image generation
    pub fn failing() -> Self {
        Self {
            text_response: Err("mock generator offline".to_string()),
            image_response: Err("mock generator offline".to_string()),
            calls: Arc::new(Mutex::new(MockCalls::default())),
        }
    }

    pub fn with_text(text: &str) -> Self {
        let mut generator = Self::succeeding();
        generator.text_response = Ok(text.to_string());
        generator
    }

    pub fn with_image(bytes: Vec<u8>) -> Self {
        let mut generator = Self::succeeding();
        generator.image_response = Ok(bytes);
        generator
    }

    pub fn text_calls(&self) -> u32 {
        self.calls.lock().map(|c| c.text).unwrap_or(0)
    }

    pub fn image_calls(&self) -> u32 {
        self.calls.lock().map(|c| c.image).unwrap_or(0)
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    async fn generate_text(
        &self,
        _system: &str,
        _user: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.text += 1;
        }
        self.text_response
            .clone()
            .map_err(|e| PlatformError::Network(e).into())
    }

    async fn generate_image(&self, _prompt: &str, _size: &str) -> Result<Vec<u8>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.image += 1;
        }
        self.image_response
            .clone()
            .map_err(|e| PlatformError::Network(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_generator_succeeding() {
        let generator = MockGenerator::succeeding();
        let text = generator.generate_text("s", "u", 100, 0.7).await.unwrap();
        assert!(!text.is_empty());
        assert_eq!(generator.text_calls(), 1);

        let image = generator.generate_image("p", "1024x1024").await.unwrap();
        assert!(!image.is_empty());
        assert_eq!(generator.image_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_generator_failing() {
        let generator = MockGenerator::failing();
        assert!(generator.generate_text("s", "u", 100, 0.7).await.is_err());
        assert!(generator.generate_image("p", "512x512").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_generator_with_text() {
        let generator = MockGenerator::with_text("Buy the lantern.");
        let text = generator.generate_text("s", "u", 100, 0.7).await.unwrap();
        assert_eq!(text, "Buy the lantern.");
    }
}
