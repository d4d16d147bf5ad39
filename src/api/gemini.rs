use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::{Result, VideoError};
use crate::scene::materialize::ImageSource;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const CHAT_MODEL: &str = "gemini-2.5-flash-preview-04-17";
const IMAGE_MODEL: &str = "imagen-3.0-generate-002";

const SYSTEM_INSTRUCTION: &str = r#"You are a helpful assistant and a creative video director.
If the user asks for a regular chat response, provide a clear, concise, and helpful answer in markdown.
If the user explicitly asks for a "video explanation", "show me a video", "make a video", or a similar request, you MUST respond with ONLY a valid JSON object. Do not include any other text or markdown fences.
The JSON object must represent a video script and follow this structure:
{
  "scenes": [
    {
      "narration": "Text to be spoken for this scene. Keep it brief, one clear sentence.",
      "image_prompt": "A detailed, descriptive prompt for an image generation model to create a visual for this scene."
    }
  ]
}
For all other requests, just chat normally."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One prior turn of the conversation, text only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .expect("Failed to create HTTP client");

        Self { api_key, client }
    }

    /// Send the conversation so far plus a new user message, returning the
    /// model's raw reply text. The reply may be prose or a video script;
    /// classification happens at the caller.
    pub async fn chat(&self, history: &[ChatTurn], message: &str) -> Result<String> {
        let mut contents: Vec<serde_json::Value> = history
            .iter()
            .map(|turn| {
                json!({
                    "role": turn.role.as_str(),
                    "parts": [{ "text": turn.text }]
                })
            })
            .collect();
        contents.push(json!({
            "role": "user",
            "parts": [{ "text": message }]
        }));

        let request_body = json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "contents": contents
        });

        let url = format!("{}/{}:generateContent", API_BASE, CHAT_MODEL);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VideoError::Api(service_error(response).await));
        }

        let response_json: serde_json::Value = response.json().await?;
        let text = response_json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| VideoError::Api("Failed to extract reply text".to_string()))?;

        Ok(text.to_string())
    }
}

#[async_trait]
impl ImageSource for GeminiClient {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        info!("Generating image for prompt: {}", prompt);

        let request_body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": 1,
                "outputMimeType": "image/jpeg"
            }
        });

        let url = format!("{}/{}:predict", API_BASE, IMAGE_MODEL);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VideoError::Api(service_error(response).await));
        }

        let response_json: serde_json::Value = response.json().await?;
        let encoded = response_json["predictions"][0]["bytesBase64Encoded"]
            .as_str()
            .ok_or_else(|| VideoError::Api("No image data in response".to_string()))?;

        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| VideoError::Api(format!("Failed to decode image data: {}", e)))?;

        Ok(bytes)
    }
}

/// Pull the service's own message out of an error response body, falling
/// back to a generic line when the body has no usable message.
async fn service_error(response: reqwest::Response) -> String {
    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    body["error"]["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| format!("The request failed (HTTP {})", status))
}
