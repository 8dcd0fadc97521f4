//! Analysis requests and the model invocation built from them

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::GenerationConfig;
use crate::ResultVariant;

pub const STRUCTURED_MIME_TYPE: &str = "application/json";

/// One text to analyze under one framework
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest
{   /// The text to analyze
    pub text: String
  , /// Framework prompt, sent as the system instruction
    pub instruction_prompt: String
  , /// Optional JSON Schema for structured output
    pub schema: Option<Value>
  , /// Model identifier
    pub model_id: String
  , /// Sampling parameters
    pub config: GenerationConfig
  , /// Result shape expected from the schema
    #[serde(default)]
    pub variant: ResultVariant
}

impl AnalysisRequest
{   pub fn new(
      text: impl Into<String>
    , instruction_prompt: impl Into<String>
    , schema: Option<Value>
    , model_id: impl Into<String>
    , config: GenerationConfig
    ) -> Self
    {   AnalysisRequest
        {   text: text.into()
          , instruction_prompt: instruction_prompt.into()
          , schema
          , model_id: model_id.into()
          , config
          , variant: ResultVariant::Generic
        }
    }

    pub fn with_variant(mut self, variant: ResultVariant) -> Self
    {   self.variant = variant;
        self
    }

    /// Check everything the caller is responsible for
    pub fn validate(&self) -> Result<(), crate::error::Error>
    {   check_non_empty("text", &self.text)?;
        check_non_empty("instruction prompt", &self.instruction_prompt)?;
        check_non_empty("model id", &self.model_id)?;
        self.config.validate()
    }
}

/// How the model is asked to respond
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResponseFormat
{   /// Unconstrained natural language
    FreeText
  , /// Data conforming to `schema` as the sole response content
    Structured
    {   schema: Value
    }
}

impl ResponseFormat
{   pub fn is_structured(&self) -> bool
    {   matches!(self, ResponseFormat::Structured { .. })
    }

    pub fn mime_type(&self) -> Option<&'static str>
    {   match self
        {   ResponseFormat::FreeText => None
          , ResponseFormat::Structured { .. } => Some(STRUCTURED_MIME_TYPE)
        }
    }

    pub fn schema(&self) -> Option<&Value>
    {   match self
        {   ResponseFormat::FreeText => None
          , ResponseFormat::Structured { schema } => Some(schema)
        }
    }
}

/// Everything a model collaborator needs for one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInvocation
{   pub model_id: String
  , /// Persistent directive, kept apart from the per-call text
    pub system_instruction: String
  , pub generation_config: GenerationConfig
  , pub response_format: ResponseFormat
  , /// Per-call user content
    pub contents: String
  , pub variant: ResultVariant
}

/// Assemble a model invocation. Pure: no I/O, no clamping.
///
/// A present schema selects schema-constrained output; `None` selects
/// free text. Config ranges are the caller's responsibility, see
/// [`AnalysisRequest::validate`].
pub fn build_request(
  text: &str
, instruction_prompt: &str
, schema: Option<&Value>
, model_id: &str
, config: &GenerationConfig
) -> Result<ModelInvocation, crate::error::Error>
{   check_non_empty("text", text)?;
    check_non_empty("instruction prompt", instruction_prompt)?;

    let response_format = match schema
    {   Some(Value::Null) | None => ResponseFormat::FreeText
      , Some(schema) => ResponseFormat::Structured
        {   schema: schema.clone()
        }
    };
    debug!(
      "Built invocation for {} (structured: {})"
    , model_id
    , response_format.is_structured()
    );
    trace!("Invocation text length: {}", text.chars().count());

    Ok(ModelInvocation
    {   model_id: model_id.to_string()
      , system_instruction: instruction_prompt.to_string()
      , generation_config: *config
      , response_format
      , contents: text.to_string()
      , variant: ResultVariant::Generic
    })
}

impl ModelInvocation
{   /// Build from a request, carrying its variant tag
    pub fn from_request(request: &AnalysisRequest)
      -> Result<Self, crate::error::Error>
    {   let mut invocation = build_request(
          &request.text
        , &request.instruction_prompt
        , request.schema.as_ref()
        , &request.model_id
        , &request.config
        )?;
        invocation.variant = request.variant;
        Ok(invocation)
    }
}

fn check_non_empty(field: &str, value: &str)
  -> Result<(), crate::error::Error>
{   if value.trim().is_empty()
    {   return Err(crate::error::Error::InvalidRequest(format!(
          "{} must not be empty", field
        )));
    }
    Ok(())
}
