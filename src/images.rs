//! Image synthesis service client
//!
//! The leaflet image is produced by a single black-box RPC. The trait keeps
//! the synthesis tool testable without network access.

use crate::assistant::error::{classify_http_error, classify_transport_error};
use crate::assistant::AssistantError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const IMAGE_MODEL: &str = "dall-e-3";

/// Contract for the image synthesis RPC
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    /// Generate one image for the prompt; returns the hosted image URL
    async fn generate(&self, prompt: &str, size: &str) -> Result<String, AssistantError>;
}

/// DALL·E 3 image generation client
pub struct DallEClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl DallEClient {
    pub fn new(api_key: String, base_url: Option<&str>) -> Self {
        // Image synthesis regularly takes tens of seconds
        let client = Client::builder()
            .timeout(Duration::from_secs(180))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            base_url: base_url
                .map_or(DEFAULT_BASE_URL, |u| u.trim_end_matches('/'))
                .to_string(),
        }
    }
}

#[async_trait]
impl ImageSynthesizer for DallEClient {
    async fn generate(&self, prompt: &str, size: &str) -> Result<String, AssistantError> {
        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": IMAGE_MODEL,
                "prompt": prompt,
                "n": 1,
                "size": size,
                "quality": "hd",
                "style": "vivid",
            }))
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AssistantError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_http_error(status, &body));
        }

        let parsed: ImageResponse = serde_json::from_str(&body).map_err(|e| {
            AssistantError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        parsed
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .ok_or_else(|| {
                AssistantError::server_error("Image service did not return an image URL")
            })
    }
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let parsed: ImageResponse = serde_json::from_str(
            r#"{"created": 1700000000, "data": [{"url": "https://img.example/a.png"}]}"#,
        )
        .unwrap();
        assert_eq!(
            parsed.data[0].url.as_deref(),
            Some("https://img.example/a.png")
        );
    }

    #[test]
    fn test_empty_data_is_missing_url() {
        let parsed: ImageResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(parsed.data.into_iter().next().and_then(|d| d.url).is_none());
    }
}
