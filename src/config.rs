//! Configuration for the model collaborator and generation parameters

use log::{debug, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Models offered by the analysis tool
pub const SUPPORTED_MODELS: [&str; 4] = [
  "gemini-2.5-pro"
, "gemini-2.5-flash"
, "gemini-2.5-flash-lite"
, "learnlm-2.0-flash-experimental"
];

/// Sampling parameters sent with every request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig
{   /// Sampling temperature, 0.0 to 1.0
    pub temperature: f32
  , /// Nucleus sampling mass, 0.0 to 1.0
    pub top_p: f32
  , /// Vocabulary cut-off, at least 1
    pub top_k: u32
  , /// Response length limit, positive
    pub max_output_tokens: u32
}

impl Default for GenerationConfig
{   fn default() -> Self
    {   GenerationConfig
        {   temperature: 0.8
          , top_p: 0.8
          , top_k: 10
          , max_output_tokens: 8192
        }
    }
}

impl GenerationConfig
{   /// Reject out-of-range values. Nothing is clamped.
    pub fn validate(&self) -> Result<(), crate::error::Error>
    {   if !unit_interval(self.temperature)
        {   return Err(crate::error::Error::InvalidRequest(format!(
              "temperature must be within [0, 1], got {}"
            , self.temperature
            )));
        }
        if !unit_interval(self.top_p)
        {   return Err(crate::error::Error::InvalidRequest(format!(
              "top_p must be within [0, 1], got {}"
            , self.top_p
            )));
        }
        if self.top_k < 1
        {   return Err(crate::error::Error::InvalidRequest(
              "top_k must be at least 1".to_string()
            ));
        }
        if self.max_output_tokens == 0
        {   return Err(crate::error::Error::InvalidRequest(
              "max_output_tokens must be positive".to_string()
            ));
        }
        Ok(())
    }
}

fn unit_interval(v: f32) -> bool
{   v.is_finite() && (0.0..=1.0).contains(&v)
}

/// HTTP client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig
{   /// API base URL (if custom)
    pub api_base: Option<String>
  , /// Request timeout in seconds
    pub timeout_secs: Option<u64>
  , /// Enable detailed logging
    pub verbose: Option<bool>
}

/// Values given on the command line, applied over a loaded config
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides
{   pub model_id: Option<String>
  , pub temperature: Option<f32>
  , pub top_p: Option<f32>
  , pub top_k: Option<u32>
  , pub max_output_tokens: Option<u32>
  , pub verbose: bool
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig
{   /// API key for the model provider
    #[serde(default)]
    pub api_key: Option<String>
  , /// Model identifier
    #[serde(default = "default_model")]
    pub model_id: String
  , #[serde(default)]
    pub generation: GenerationConfig
  , #[serde(default)]
    pub client: ClientConfig
}

fn default_model() -> String
{   DEFAULT_MODEL.to_string()
}

impl Default for AppConfig
{   fn default() -> Self
    {   AppConfig
        {   api_key: None
          , model_id: default_model()
          , generation: GenerationConfig::default()
          , client: ClientConfig::default()
        }
    }
}

impl AppConfig
{   /// Build from `GEMINI_API_KEY` (or `GOOGLE_API_KEY`),
    /// `ANALYSIS_MODEL`, `GEMINI_API_BASE` and `ANALYSIS_VERBOSE`
    pub fn from_env() -> Self
    {   let mut config = AppConfig::default();
        config.api_key = std::env::var("GEMINI_API_KEY")
          .or_else(|_| std::env::var("GOOGLE_API_KEY"))
          .ok()
          .filter(|k| !k.trim().is_empty());
        if let Ok(model) = std::env::var("ANALYSIS_MODEL")
        {   config.model_id = model;
        }
        if let Ok(base) = std::env::var("GEMINI_API_BASE")
        {   config.client.api_base = Some(base);
        }
        if let Ok(verbose) = std::env::var("ANALYSIS_VERBOSE")
        {   config.client.verbose = Some(matches!(
              verbose.trim().to_ascii_lowercase().as_str()
            , "1" | "true" | "yes"
            ));
        }
        debug!(
          "Loaded config from env: model={}, key set={}"
        , config.model_id
        , config.api_key.is_some()
        );
        config.warn_unknown_model();
        config
    }

    /// Load a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>)
      -> Result<Self, crate::error::Error>
    {   let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
          crate::error::Error::InvalidRequest(format!(
            "cannot read config {}: {}", path.display(), e
          ))
        })?;
        let config: AppConfig = serde_json::from_str(&text)
          .map_err(|e| {
            crate::error::Error::InvalidRequest(format!(
              "malformed config {}: {}", path.display(), e
            ))
          })?;
        config.generation.validate()?;
        config.warn_unknown_model();
        Ok(config)
    }

    /// Config file when given, environment otherwise, then overrides.
    /// The result is the configuration a run actually uses.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides)
      -> Result<Self, crate::error::Error>
    {   let mut config = match path
        {   Some(path) => AppConfig::from_json_file(path)?
          , None => AppConfig::from_env()
        };
        config.apply_overrides(overrides);
        config.generation.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides)
    {   if let Some(model) = &overrides.model_id
        {   self.model_id = model.clone();
        }
        let generation = &mut self.generation;
        if let Some(v) = overrides.temperature { generation.temperature = v; }
        if let Some(v) = overrides.top_p { generation.top_p = v; }
        if let Some(v) = overrides.top_k { generation.top_k = v; }
        if let Some(v) = overrides.max_output_tokens
        {   generation.max_output_tokens = v;
        }
        if overrides.verbose
        {   self.client.verbose = Some(true);
        }
    }

    /// Log level to force when verbose logging is on
    pub fn log_filter(&self) -> Option<LevelFilter>
    {   match self.client.verbose
        {   Some(true) => Some(LevelFilter::Debug)
          , _ => None
        }
    }

    pub fn warn_unknown_model(&self)
    {   if !SUPPORTED_MODELS.contains(&self.model_id.as_str())
        {   warn!("Model {} is not in the supported list", self.model_id);
        }
    }
}
