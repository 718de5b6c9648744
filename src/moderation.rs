//! Content moderation gate
//!
//! Every inbound user message is screened before any state is mutated.
//! There are no retries: what a moderation-service outage means is a
//! deployment decision, so it is configuration rather than a hard-coded
//! guess.

use crate::assistant::error::{classify_http_error, classify_transport_error};
use crate::assistant::AssistantError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Outcome of a moderation check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationVerdict {
    Allowed,
    Flagged,
}

/// How a moderation-service failure is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModerationFailurePolicy {
    /// Surface an infrastructure error (the request fails with 500)
    #[default]
    TreatAsError,
    /// Reject the input as if it had been flagged (conservative)
    TreatAsFlagged,
}

impl ModerationFailurePolicy {
    pub fn from_env() -> Self {
        match std::env::var("MODERATION_FAILURE_POLICY").as_deref() {
            Ok("treat_as_flagged") => Self::TreatAsFlagged,
            _ => Self::TreatAsError,
        }
    }
}

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Message rejected by content moderation")]
    Flagged,
    #[error("Moderation service unavailable: {0}")]
    Service(AssistantError),
}

/// Client contract for the external moderation check
#[async_trait]
pub trait ModerationClient: Send + Sync {
    async fn check(&self, input: &str) -> Result<ModerationVerdict, AssistantError>;
}

/// Pre-flight gate applied to raw user text
pub struct ModerationGate {
    client: Arc<dyn ModerationClient>,
    policy: ModerationFailurePolicy,
}

impl ModerationGate {
    pub fn new(client: Arc<dyn ModerationClient>, policy: ModerationFailurePolicy) -> Self {
        Self { client, policy }
    }

    /// Screen user input. `Ok(())` means the message may proceed; any error
    /// aborts the request before a single store write.
    pub async fn screen(&self, input: &str) -> Result<(), ModerationError> {
        match self.client.check(input).await {
            Ok(ModerationVerdict::Allowed) => Ok(()),
            Ok(ModerationVerdict::Flagged) => Err(ModerationError::Flagged),
            Err(e) => match self.policy {
                ModerationFailurePolicy::TreatAsFlagged => {
                    tracing::warn!(error = %e, "Moderation check failed, rejecting input per policy");
                    Err(ModerationError::Flagged)
                }
                ModerationFailurePolicy::TreatAsError => Err(ModerationError::Service(e)),
            },
        }
    }
}

/// OpenAI moderations endpoint client
pub struct OpenAiModeration {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiModeration {
    pub fn new(api_key: String, base_url: Option<&str>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
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
impl ModerationClient for OpenAiModeration {
    async fn check(&self, input: &str) -> Result<ModerationVerdict, AssistantError> {
        let response = self
            .client
            .post(format!("{}/moderations", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({ "input": input }))
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

        let parsed: ModerationResponse = serde_json::from_str(&body).map_err(|e| {
            AssistantError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        let flagged = parsed.results.iter().any(|r| r.flagged);
        Ok(if flagged {
            ModerationVerdict::Flagged
        } else {
            ModerationVerdict::Allowed
        })
    }
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    flagged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticClient(Result<ModerationVerdict, ()>);

    #[async_trait]
    impl ModerationClient for StaticClient {
        async fn check(&self, _input: &str) -> Result<ModerationVerdict, AssistantError> {
            self.0
                .map_err(|()| AssistantError::network("moderation unreachable"))
        }
    }

    #[tokio::test]
    async fn test_allowed_passes() {
        let gate = ModerationGate::new(
            Arc::new(StaticClient(Ok(ModerationVerdict::Allowed))),
            ModerationFailurePolicy::TreatAsError,
        );
        assert!(gate.screen("hello").await.is_ok());
    }

    #[tokio::test]
    async fn test_flagged_rejected() {
        let gate = ModerationGate::new(
            Arc::new(StaticClient(Ok(ModerationVerdict::Flagged))),
            ModerationFailurePolicy::TreatAsError,
        );
        assert!(matches!(
            gate.screen("bad").await,
            Err(ModerationError::Flagged)
        ));
    }

    #[tokio::test]
    async fn test_outage_is_infra_error_by_default() {
        let gate = ModerationGate::new(
            Arc::new(StaticClient(Err(()))),
            ModerationFailurePolicy::TreatAsError,
        );
        assert!(matches!(
            gate.screen("hello").await,
            Err(ModerationError::Service(_))
        ));
    }

    #[tokio::test]
    async fn test_outage_can_be_treated_as_flagged() {
        let gate = ModerationGate::new(
            Arc::new(StaticClient(Err(()))),
            ModerationFailurePolicy::TreatAsFlagged,
        );
        assert!(matches!(
            gate.screen("hello").await,
            Err(ModerationError::Flagged)
        ));
    }

    #[test]
    fn test_policy_from_env_default() {
        assert_eq!(
            ModerationFailurePolicy::default(),
            ModerationFailurePolicy::TreatAsError
        );
    }

    #[test]
    fn test_response_parsing() {
        let parsed: ModerationResponse = serde_json::from_str(
            r#"{"id": "modr-1", "results": [{"flagged": true, "categories": {}}]}"#,
        )
        .unwrap();
        assert!(parsed.results[0].flagged);
    }
}
