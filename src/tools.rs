//! Leaflet synthesis tool
//!
//! The one local capability the agent can request. Turns structured design
//! data into a generation prompt, invokes the image-synthesis service once,
//! and commits the result to the conversation record.

use crate::assistant::{AssistantError, ToolDefinition};
use crate::db::ConversationStore;
use crate::images::ImageSynthesizer;
use crate::state_machine::{transition, Status, StatusEvent};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Wire name the agent calls the tool by
pub const LEAFLET_TOOL_NAME: &str = "generateLeafletImageTool";

/// Requested leaflet dimensions, constrained to what the image service
/// can render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeafletSize {
    #[serde(rename = "1024x1792")]
    Portrait,
    #[serde(rename = "1792x1024")]
    Landscape,
}

impl LeafletSize {
    /// Dimension string as the image service expects it
    pub fn api_value(self) -> &'static str {
        match self {
            LeafletSize::Portrait => "1024x1792",
            LeafletSize::Landscape => "1792x1024",
        }
    }
}

impl fmt::Display for LeafletSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeafletSize::Portrait => write!(f, "1024 by 1792"),
            LeafletSize::Landscape => write!(f, "1792 by 1024"),
        }
    }
}

/// Structured design parameters the agent gathers over the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignData {
    pub leaflet_size: LeafletSize,
    pub purpose: String,
    pub target_audience: String,
    pub key_message1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_message2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    pub style: String,
    pub imagery_prompt: String,
}

impl DesignData {
    /// Required free-text fields must be non-empty; the agent occasionally
    /// sends placeholders.
    pub fn validate(&self) -> Result<(), SynthesisError> {
        for (field, value) in [
            ("purpose", &self.purpose),
            ("targetAudience", &self.target_audience),
            ("keyMessage1", &self.key_message1),
            ("style", &self.style),
            ("imageryPrompt", &self.imagery_prompt),
        ] {
            if value.trim().is_empty() {
                return Err(SynthesisError::MissingField(field));
            }
        }
        Ok(())
    }
}

/// Compose the generation prompt. Deterministic: each design field maps to
/// exactly one clause, no free-form reinterpretation.
pub fn compose_prompt(design: &DesignData) -> String {
    let mut prompt = format!(
        "Create a visually appealing, professional leaflet design. \
         The leaflet's dimensions are {} pixels. \
         The leaflet is for: \"{}\". \
         It is targeted at: \"{}\". \
         The overall style should be: \"{}\". \
         The leaflet MUST include the following text, rendered clearly and legibly: \
         - Headline/Main Message: \"{}\".",
        design.leaflet_size, design.purpose, design.target_audience, design.style,
        design.key_message1,
    );

    if let Some(secondary) = &design.key_message2 {
        prompt.push_str(&format!(" - Secondary Message: \"{secondary}\"."));
    }
    if let Some(contact) = &design.contact_email {
        prompt.push_str(&format!(" - Contact Information: \"{contact}\"."));
    }

    prompt.push_str(&format!(
        " The imagery should be based on this description: \"{}\". \
         The layout should be well-organized, with text and images balanced. \
         All text must be readable. \
         Do not include any placeholder text like \"Lorem Ipsum\".",
        design.imagery_prompt,
    ));

    prompt
}

/// JSON schema advertised to the agent
pub fn leaflet_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: LEAFLET_TOOL_NAME.to_string(),
        description: "Generates a leaflet image based on a comprehensive set of design \
                      parameters. This is the final step in the design process and should \
                      only be called when all necessary information has been gathered from \
                      the user."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "designData": {
                    "type": "object",
                    "properties": {
                        "leafletSize": {
                            "type": "string",
                            "enum": ["1024x1792", "1792x1024"],
                            "description": "Leaflet dimensions. 1024x1792 for portrait, 1792x1024 for landscape."
                        },
                        "purpose": {
                            "type": "string",
                            "description": "The main goal of the leaflet (e.g., \"Event Promotion\")."
                        },
                        "targetAudience": {
                            "type": "string",
                            "description": "The intended audience (e.g., \"Students\", \"Local Residents\")."
                        },
                        "keyMessage1": {
                            "type": "string",
                            "description": "The primary headline, displayed prominently."
                        },
                        "keyMessage2": {
                            "type": "string",
                            "description": "A secondary message, if applicable."
                        },
                        "contactEmail": {
                            "type": "string",
                            "description": "Contact email to include, if provided by the user."
                        },
                        "style": {
                            "type": "string",
                            "description": "Desired visual style (e.g., \"Modern and minimalist\")."
                        },
                        "imageryPrompt": {
                            "type": "string",
                            "description": "Detailed description of the desired background imagery."
                        }
                    },
                    "required": ["leafletSize", "purpose", "targetAudience", "keyMessage1", "style", "imageryPrompt"]
                },
                "conversationId": {
                    "type": "string",
                    "description": "The ID of the current conversation."
                }
            },
            "required": ["designData"]
        }),
    }
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Missing required design data field: {0}")]
    MissingField(&'static str),
    #[error("Image synthesis failed: {0}")]
    Image(#[from] AssistantError),
    #[error("Failed to persist leaflet result: {0}")]
    Store(#[from] crate::db::DbError),
}

/// The registered synthesis tool
pub struct LeafletSynthesisTool {
    store: ConversationStore,
    images: Arc<dyn ImageSynthesizer>,
}

impl LeafletSynthesisTool {
    pub fn new(store: ConversationStore, images: Arc<dyn ImageSynthesizer>) -> Self {
        Self { store, images }
    }

    /// Run the tool for one conversation.
    ///
    /// The conversation is marked `designing` before the slow image call so
    /// concurrent readers observe progress. Success commits the URL, design
    /// data and `completed` together; any failure leaves the conversation
    /// `failed` and propagates the error to the dispatcher.
    pub async fn generate(
        &self,
        conversation_id: &str,
        owner_id: &str,
        design: &DesignData,
    ) -> Result<String, SynthesisError> {
        design.validate()?;

        let current = self.store.find_owned(conversation_id, owner_id)?.status;
        self.store.set_status(
            conversation_id,
            owner_id,
            transition(current, StatusEvent::SynthesisStarted),
        )?;

        let prompt = compose_prompt(design);
        tracing::info!(
            conversation_id = %conversation_id,
            size = %design.leaflet_size.api_value(),
            "Invoking image synthesis"
        );

        match self
            .images
            .generate(&prompt, design.leaflet_size.api_value())
            .await
        {
            Ok(url) => {
                let design_json =
                    serde_json::to_value(design).unwrap_or(serde_json::Value::Null);
                self.store
                    .set_leaflet_result(conversation_id, owner_id, &url, &design_json)?;
                tracing::info!(conversation_id = %conversation_id, url = %url, "Leaflet generated");
                Ok(url)
            }
            Err(e) => {
                tracing::error!(conversation_id = %conversation_id, error = %e, "Image synthesis failed");
                self.store.set_status(
                    conversation_id,
                    owner_id,
                    transition(Status::Designing, StatusEvent::SynthesisFailed),
                )?;
                Err(SynthesisError::Image(e))
            }
        }
    }
}
