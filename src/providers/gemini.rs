use async_trait::async_trait;
use log::{debug, error, trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::client::{ModelCaller, ModelResponse, ModelUsage};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::request::ModelInvocation;

pub const GEMINI_API_BASE: &str
  = "https://generativelanguage.googleapis.com/v1beta";

const DEFAULT_TIMEOUT_SECS: u64 = 300;

// ===== Request Types =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part
{   #[serde(default)]
    pub text: String
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content
{   #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>
  , pub parts: Vec<Part>
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig
{   pub temperature: f32
  , pub top_p: f32
  , pub top_k: u32
  , pub max_output_tokens: u32
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub response_json_schema: Option<Value>
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest
{   pub system_instruction: Content
  , pub contents: Vec<Content>
  , pub generation_config: GeminiGenerationConfig
}

// ===== Response Types =====

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse
{   #[serde(default)]
    pub candidates: Vec<Candidate>
  , #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>
  , #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate
{   #[serde(default)]
    pub content: Option<Content>
  , #[serde(default)]
    pub finish_reason: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata
{   #[serde(default)]
    pub prompt_token_count: Option<u64>
  , #[serde(default)]
    pub candidates_token_count: Option<u64>
  , #[serde(default)]
    pub total_token_count: Option<u64>
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback
{   #[serde(default)]
    pub block_reason: Option<String>
}

// ===== Gemini Client =====

/// Gemini `generateContent` collaborator
pub struct GeminiClient
{   api_key: Option<String>
  , api_base: String
  , http_client: reqwest::Client
}

impl GeminiClient
{   pub fn new(api_key: Option<String>, config: &ClientConfig)
      -> Result<Self, Error>
    {   debug!("Creating GeminiClient");
        let timeout = Duration::from_secs(
          config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
        );
        let http_client = reqwest::Client::builder()
          .timeout(timeout)
          .build()
          .map_err(|e| {
            error!("Cannot build HTTP client: {}", e);
            Error::ModelCallFailed(e.to_string())
          })?;
        let api_base = config.api_base
          .clone()
          .unwrap_or_else(|| GEMINI_API_BASE.to_string())
          .trim_end_matches('/')
          .to_string();
        Ok(GeminiClient::with_http_client(api_key, api_base, http_client))
    }

    pub fn with_http_client(
      api_key: Option<String>
    , api_base: String
    , http_client: reqwest::Client
    ) -> Self
    {   GeminiClient
        {   api_key
          , api_base
          , http_client
        }
    }

    pub fn has_api_key(&self) -> bool
    {   self.api_key.is_some()
    }

    pub fn set_api_key(&mut self, key: String)
    {   debug!("Setting Gemini API key");
        self.api_key = Some(key);
    }

    pub fn endpoint(&self, model_id: &str) -> String
    {   format!("{}/models/{}:generateContent", self.api_base, model_id)
    }

    fn get_api_key(&self) -> Result<&str, Error>
    {   self.api_key.as_deref().ok_or_else(|| {
          error!("No Gemini API key configured");
          Error::ModelCallFailed(
            "Missing API key for: Gemini".to_string()
          )
        })
    }
}

/// Request body for one invocation
pub fn request_body(invocation: &ModelInvocation) -> GenerateContentRequest
{   let config = &invocation.generation_config;
    let format = &invocation.response_format;
    GenerateContentRequest
    {   system_instruction: Content
        {   role: None
          , parts: vec![Part
            {   text: invocation.system_instruction.clone()
            }]
        }
      , contents: vec![Content
        {   role: Some("user".to_string())
          , parts: vec![Part
            {   text: invocation.contents.clone()
            }]
        }]
      , generation_config: GeminiGenerationConfig
        {   temperature: config.temperature
          , top_p: config.top_p
          , top_k: config.top_k
          , max_output_tokens: config.max_output_tokens
          , response_mime_type: format.mime_type().map(str::to_string)
          , response_json_schema: format.schema().cloned()
        }
    }
}

/// Pull text and usage out of a decoded response
pub fn extract_response(response: GenerateContentResponse)
  -> Result<ModelResponse, Error>
{   if let Some(reason) = response.prompt_feedback
      .as_ref()
      .and_then(|f| f.block_reason.as_ref())
    {   error!("Prompt blocked: {}", reason);
        return Err(Error::ModelCallFailed(
          format!("Prompt blocked by the model: {}", reason)
        ));
    }

    let candidate = response.candidates.first().ok_or_else(|| {
      error!("No candidates in response");
      Error::ModelCallFailed(
        "API response contained no candidates".to_string()
      )
    })?;

    if let Some(reason) = &candidate.finish_reason
    {   if reason != "STOP"
        {   warn!("Generation finished with reason: {}", reason);
        }
    }

    let text: String = candidate.content
      .iter()
      .flat_map(|c| c.parts.iter())
      .map(|p| p.text.as_str())
      .collect();

    let usage = response.usage_metadata.map(|u| ModelUsage
      {   prompt_tokens: u.prompt_token_count
        , completion_tokens: u.candidates_token_count
        , total_tokens: u.total_token_count
      });

    Ok(ModelResponse { text, usage })
}

#[async_trait]
impl ModelCaller for GeminiClient
{   async fn invoke(&self, invocation: &ModelInvocation)
      -> Result<ModelResponse, Error>
    {   debug!("Handling invoke for: {}", invocation.model_id);

        let api_key = self.get_api_key()?;
        let body = request_body(invocation);
        trace!("Gemini request: {:?}", body);

        let response = self.http_client
          .post(self.endpoint(&invocation.model_id))
          .header("x-goog-api-key", api_key)
          .json(&body)
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error: {}", e);
            Error::ModelCallFailed(format!("HTTP error: {}", e))
          })?;

        let status = response.status();
        trace!("Gemini response status: {}", status);

        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_|
                "Unknown error".to_string()
              );
            error!("Gemini API error: {}", error_text);
            return Err(Error::ModelCallFailed(
              format!("Gemini error ({}): {}", status, error_text)
            ));
        }

        let decoded: GenerateContentResponse
          = response.json().await.map_err(|e| {
            error!("Parse error: {}", e);
            Error::ModelCallFailed(format!("Parse error: {}", e))
          })?;

        extract_response(decoded)
    }
}
