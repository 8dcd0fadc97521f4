//! Analysis result record and its JSON export

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::GenerationConfig;
use crate::{ResponseMode, ResultVariant};

/// Timestamp layout used in results and export file names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Characters kept in prompt and text previews
pub const PREVIEW_CHARS: usize = 200;

/// Result content. Structured data exists only in the structured
/// variant, so the payload always agrees with its [`ResponseMode`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload
{   Structured(Value)
  , Freeform(String)
}

impl Payload
{   pub fn mode(&self) -> ResponseMode
    {   match self
        {   Payload::Structured(_) => ResponseMode::Structured
          , Payload::Freeform(_) => ResponseMode::Freeform
        }
    }

    pub fn as_structured(&self) -> Option<&Value>
    {   match self
        {   Payload::Structured(v) => Some(v)
          , Payload::Freeform(_) => None
        }
    }

    pub fn as_text(&self) -> Option<&str>
    {   match self
        {   Payload::Structured(_) => None
          , Payload::Freeform(s) => Some(s)
        }
    }

    fn to_value(&self) -> Value
    {   match self
        {   Payload::Structured(v) => v.clone()
          , Payload::Freeform(s) => Value::String(s.clone())
        }
    }
}

/// Token counters reported by the model, when available
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage
{   pub prompt_tokens: Option<u64>
  , pub response_tokens: Option<u64>
  , pub total_tokens: Option<u64>
}

/// One completed analysis. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ResultRecord", try_from = "ResultRecord")]
pub struct AnalysisResult
{   pub timestamp: String
  , pub model_id: String
  , pub config: GenerationConfig
  , pub instruction_prompt_preview: String
  , pub text_preview: String
  , /// Length of the analyzed text in characters
    pub text_length: usize
  , pub variant: ResultVariant
  , pub payload: Payload
  , pub raw_response: String
  , pub token_usage: Option<TokenUsage>
}

impl AnalysisResult
{   /// Build a result stamped with the current local time
    pub fn new(
      request: &crate::request::AnalysisRequest
    , payload: Payload
    , raw_response: String
    , token_usage: Option<TokenUsage>
    ) -> Self
    {   AnalysisResult
        {   timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string()
          , model_id: request.model_id.clone()
          , config: request.config
          , instruction_prompt_preview: preview(&request.instruction_prompt)
          , text_preview: preview(&request.text)
          , text_length: request.text.chars().count()
          , variant: request.variant
          , payload
          , raw_response
          , token_usage
        }
    }

    pub fn response_mode(&self) -> ResponseMode
    {   self.payload.mode()
    }

    pub fn to_json_pretty(&self) -> Result<String, crate::error::Error>
    {   Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, crate::error::Error>
    {   Ok(serde_json::from_str(text)?)
    }

    /// File name stem for exports, e.g. `analysis_20250101_120000`
    pub fn export_file_stem(&self) -> String
    {   format!("analysis_{}", self.timestamp)
    }
}

/// First [`PREVIEW_CHARS`] characters, with `...` when cut
pub fn preview(text: &str) -> String
{   if text.chars().count() > PREVIEW_CHARS
    {   let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else
    {   text.to_string()
    }
}

// ===== Export wire format =====

/// Field layout of the JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord
{   timestamp: String
  , model: String
  , generation_config: GenerationConfig
  , framework_preview: String
  , text_preview: String
  , text_length: usize
  , response_mode: ResponseMode
  , #[serde(default)]
    variant: ResultVariant
  , analysis: Value
  , raw_response: String
  , #[serde(default)]
    metadata: Option<TokenUsage>
}

impl From<AnalysisResult> for ResultRecord
{   fn from(r: AnalysisResult) -> Self
    {   ResultRecord
        {   timestamp: r.timestamp
          , model: r.model_id
          , generation_config: r.config
          , framework_preview: r.instruction_prompt_preview
          , text_preview: r.text_preview
          , text_length: r.text_length
          , response_mode: r.payload.mode()
          , variant: r.variant
          , analysis: r.payload.to_value()
          , raw_response: r.raw_response
          , metadata: r.token_usage
        }
    }
}

impl TryFrom<ResultRecord> for AnalysisResult
{   type Error = String;

    fn try_from(r: ResultRecord) -> Result<Self, Self::Error>
    {   let payload = match (r.response_mode, r.analysis)
        {   (ResponseMode::Structured, value) => Payload::Structured(value)
          , (ResponseMode::Freeform, Value::String(s)) => Payload::Freeform(s)
          , (ResponseMode::Freeform, other) => {
              return Err(format!(
                "freeform analysis must be a string, found {}"
              , other
              ));
            }
        };
        Ok(AnalysisResult
        {   timestamp: r.timestamp
          , model_id: r.model
          , config: r.generation_config
          , instruction_prompt_preview: r.framework_preview
          , text_preview: r.text_preview
          , text_length: r.text_length
          , variant: r.variant
          , payload
          , raw_response: r.raw_response
          , token_usage: r.metadata
        })
    }
}
