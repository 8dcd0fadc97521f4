//! Step-by-step session state
//!
//! A session walks Setup -> Framework -> Schema -> Text -> Analyze ->
//! Results -> Reflection. Every transition is a pure function from the current state
//! and one input to the next state. The step counter never moves
//! backwards, and an input is refused while an earlier step is missing
//! its data. Completed results accumulate in an append-only history.

use log::{debug, warn};
use serde_json::Value;
use std::fmt;

use crate::config::{GenerationConfig, DEFAULT_MODEL};
use crate::error::Error;
use crate::frameworks::{check_schema_shape, light_schema
  , schema_from_categories, CategorySpec, FrameworkRegistry};
use crate::request::AnalysisRequest;
use crate::result::AnalysisResult;
use crate::ResultVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step
{   Setup
  , Framework
  , Schema
  , Text
  , Analyze
  , Results
  , Reflection
}

/// Reflections shorter than this many characters count as too short
pub const MIN_REFLECTION_CHARS: usize = 500;

/// Length check on the written reflection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectionStatus
{   Good
  , TooShort
}

impl ReflectionStatus
{   pub fn of(reflection: &str) -> Self
    {   if reflection.chars().count() >= MIN_REFLECTION_CHARS
        {   ReflectionStatus::Good
        } else
        {   ReflectionStatus::TooShort
        }
    }

    pub fn label(&self) -> &'static str
    {   match self
        {   ReflectionStatus::Good => "Good"
          , ReflectionStatus::TooShort => "Too Short"
        }
    }
}

impl Step
{   pub const ALL: [Step; 7] = [
      Step::Setup
    , Step::Framework
    , Step::Schema
    , Step::Text
    , Step::Analyze
    , Step::Results
    , Step::Reflection
    ];

    /// 1-based position
    pub fn number(&self) -> usize
    {   *self as usize + 1
    }

    pub fn label(&self) -> &'static str
    {   match self
        {   Step::Setup => "Setup"
          , Step::Framework => "Framework"
          , Step::Schema => "Schema"
          , Step::Text => "Text Input"
          , Step::Analyze => "Analysis"
          , Step::Results => "Results"
          , Step::Reflection => "Reflection"
        }
    }
}

impl fmt::Display for Step
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   f.write_str(self.label())
    }
}

/// User input driving one transition
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput
{   /// Model selected and connection configured
    ConfigureModel
    {   model_id: String
      , generation: GenerationConfig
    }
  , /// A custom framework prompt. Clears any schema chosen before.
    SetFramework
    {   prompt: String
    }
  , /// A built-in framework: prompt, schema and variant together
    UseFramework
    {   name: String
    }
  , SetSchema
    {   schema: Value
      , variant: ResultVariant
    }
  , /// Schema typed in by the user, as JSON text
    SetSchemaJson
    {   json: String
      , variant: ResultVariant
    }
  , /// Overview, findings and synthesis
    UseLightSchema
  , /// Schema built from analysis categories
    BuildSchema
    {   categories: Vec<CategorySpec>
    }
  , /// Continue without a schema, free text output
    SkipSchema
  , SetText
    {   text: String
    }
  , RecordResult(Box<AnalysisResult>)
  , /// The user's critical reflection on the latest result
    SetReflection
    {   text: String
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState
{   current_step: Step
  , api_configured: bool
  , model_id: String
  , generation: GenerationConfig
  , framework_prompt: String
  , schema: Option<Value>
  , variant: ResultVariant
  , schema_confirmed: bool
  , text: String
  , history: Vec<AnalysisResult>
  , reflection: String
}

impl Default for SessionState
{   fn default() -> Self
    {   SessionState
        {   current_step: Step::Setup
          , api_configured: false
          , model_id: DEFAULT_MODEL.to_string()
          , generation: GenerationConfig::default()
          , framework_prompt: String::new()
          , schema: None
          , variant: ResultVariant::Generic
          , schema_confirmed: false
          , text: String::new()
          , history: vec![]
          , reflection: String::new()
        }
    }
}

impl SessionState
{   pub fn new() -> Self
    {   SessionState::default()
    }

    pub fn current_step(&self) -> Step { self.current_step }
    pub fn model_id(&self) -> &str { &self.model_id }
    pub fn generation(&self) -> &GenerationConfig { &self.generation }
    pub fn framework_prompt(&self) -> &str { &self.framework_prompt }
    pub fn schema(&self) -> Option<&Value> { self.schema.as_ref() }
    pub fn variant(&self) -> ResultVariant { self.variant }
    pub fn text(&self) -> &str { &self.text }
    pub fn reflection(&self) -> &str { &self.reflection }

    /// Length check, once a reflection has been written
    pub fn reflection_status(&self) -> Option<ReflectionStatus>
    {   if self.reflection.is_empty()
        {   None
        } else
        {   Some(ReflectionStatus::of(&self.reflection))
        }
    }

    /// Completed results, oldest first
    pub fn history(&self) -> &[AnalysisResult]
    {   &self.history
    }

    pub fn latest_result(&self) -> Option<&AnalysisResult>
    {   self.history.last()
    }

    /// Apply one input, producing the next state
    pub fn apply(&self, input: SessionInput) -> Result<SessionState, Error>
    {   let mut next = self.clone();
        let reached = match input
        {   SessionInput::ConfigureModel { model_id, generation } => {
              if model_id.trim().is_empty()
              {   return Err(Error::InvalidRequest(
                    "model id must not be empty".to_string()
                  ));
              }
              generation.validate()?;
              next.model_id = model_id;
              next.generation = generation;
              next.api_configured = true;
              Step::Framework
            }
          , SessionInput::SetFramework { prompt } => {
              self.require_setup(Step::Framework)?;
              if prompt.trim().is_empty()
              {   return Err(Error::InvalidRequest(
                    "framework prompt must not be empty".to_string()
                  ));
              }
              next.framework_prompt = prompt;
              next.schema = None;
              next.variant = ResultVariant::Generic;
              next.schema_confirmed = false;
              Step::Schema
            }
          , SessionInput::UseFramework { name } => {
              self.require_setup(Step::Framework)?;
              let registry = FrameworkRegistry::builtin();
              let framework = registry.get(&name).ok_or_else(|| {
                warn!("Unknown framework: {}", name);
                Error::InvalidRequest(format!("unknown framework: {}", name))
              })?;
              next.framework_prompt = framework.prompt.to_string();
              next.schema = Some(framework.schema()?);
              next.variant = framework.variant;
              next.schema_confirmed = true;
              Step::Text
            }
          , SessionInput::SetSchema { schema, variant } => {
              self.require_framework(Step::Schema)?;
              next.schema = match schema
              {   Value::Null => None
                , schema => Some(schema)
              };
              next.variant = variant;
              next.schema_confirmed = true;
              Step::Text
            }
          , SessionInput::SetSchemaJson { json, variant } => {
              self.require_framework(Step::Schema)?;
              let schema: Value = serde_json::from_str(&json)
                .map_err(|e| {
                  Error::InvalidRequest(format!("invalid schema JSON: {}", e))
                })?;
              check_schema_shape(&schema)?;
              next.schema = Some(schema);
              next.variant = variant;
              next.schema_confirmed = true;
              Step::Text
            }
          , SessionInput::UseLightSchema => {
              self.require_framework(Step::Schema)?;
              next.schema = Some(light_schema());
              next.variant = ResultVariant::Generic;
              next.schema_confirmed = true;
              Step::Text
            }
          , SessionInput::BuildSchema { categories } => {
              self.require_framework(Step::Schema)?;
              next.schema = Some(schema_from_categories(&categories)?);
              next.variant = ResultVariant::Generic;
              next.schema_confirmed = true;
              Step::Text
            }
          , SessionInput::SkipSchema => {
              self.require_framework(Step::Schema)?;
              next.schema = None;
              next.variant = ResultVariant::Generic;
              next.schema_confirmed = true;
              Step::Text
            }
          , SessionInput::SetText { text } => {
              self.require_schema(Step::Text)?;
              if text.trim().is_empty()
              {   return Err(Error::InvalidRequest(
                    "text must not be empty".to_string()
                  ));
              }
              next.text = text;
              Step::Analyze
            }
          , SessionInput::RecordResult(result) => {
              self.require_text(Step::Results)?;
              next.history.push(*result);
              Step::Results
            }
          , SessionInput::SetReflection { text } => {
              self.require_result(Step::Reflection)?;
              if text.trim().is_empty()
              {   return Err(Error::InvalidRequest(
                    "reflection must not be empty".to_string()
                  ));
              }
              next.reflection = text;
              Step::Reflection
            }
        };
        next.current_step = next.current_step.max(reached);
        debug!(
          "Session moved from {} to {}"
        , self.current_step
        , next.current_step
        );
        Ok(next)
    }

    /// Request for the current framework, schema and text
    pub fn analysis_request(&self) -> Result<AnalysisRequest, Error>
    {   self.require_text(Step::Analyze)?;
        Ok(AnalysisRequest::new(
          self.text.clone()
        , self.framework_prompt.clone()
        , self.schema.clone()
        , self.model_id.clone()
        , self.generation
        ).with_variant(self.variant))
    }

    /// Checklist of what each step has collected
    pub fn status(&self) -> Vec<(&'static str, bool)>
    {   vec![
          ("API Configured", self.api_configured)
        , ("Framework Set", !self.framework_prompt.is_empty())
        , ("Schema Ready", self.schema_confirmed)
        , ("Text Input", !self.text.is_empty())
        , ("Analysis Complete", !self.history.is_empty())
        ]
    }

    fn require_setup(&self, step: Step) -> Result<(), Error>
    {   if !self.api_configured
        {   return Err(not_ready(step, "model is not configured"));
        }
        Ok(())
    }

    fn require_framework(&self, step: Step) -> Result<(), Error>
    {   self.require_setup(step)?;
        if self.framework_prompt.is_empty()
        {   return Err(not_ready(step, "no framework prompt"));
        }
        Ok(())
    }

    fn require_schema(&self, step: Step) -> Result<(), Error>
    {   self.require_framework(step)?;
        if !self.schema_confirmed
        {   return Err(not_ready(step, "schema has not been chosen"));
        }
        Ok(())
    }

    fn require_text(&self, step: Step) -> Result<(), Error>
    {   self.require_schema(step)?;
        if self.text.is_empty()
        {   return Err(not_ready(step, "no text to analyze"));
        }
        Ok(())
    }

    fn require_result(&self, step: Step) -> Result<(), Error>
    {   if self.history.is_empty()
        {   return Err(not_ready(step, "no analysis result yet"));
        }
        Ok(())
    }
}

fn not_ready(step: Step, missing: &str) -> Error
{   Error::StepNotReady
    {   step: step.to_string()
      , missing: missing.to_string()
    }
}
