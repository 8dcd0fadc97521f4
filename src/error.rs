use thiserror::Error as ThisError;

/// Error type for analysis operations
/// Implements Clone so results can be compared and moved across tasks
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error
{   /// Empty text or prompt, or generation config out of range
    #[error("Invalid request: {0}")]
    InvalidRequest(String)
  , /// The model collaborator could not complete the call
    #[error("Model call failed: {0}")]
    ModelCallFailed(String)
  , /// A session transition was attempted before its data exists
    #[error("Step {step} is not ready: {missing}")]
    StepNotReady
    {   step: String
      , missing: String
    }
  , /// Result could not be exported or imported
    #[error("Export error: {0}")]
    Export(String)
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind
{   InvalidRequest
  , ModelCallFailed
  , Session
  , Export
}

impl Error
{   pub fn kind(&self) -> ErrorKind
    {   match self
        {   Error::InvalidRequest(_) => ErrorKind::InvalidRequest
          , Error::ModelCallFailed(_) => ErrorKind::ModelCallFailed
          , Error::StepNotReady { .. } => ErrorKind::Session
          , Error::Export(_) => ErrorKind::Export
        }
    }

    /// Generic guidance to show next to a failed call
    pub fn troubleshooting(&self, model_id: &str) -> Vec<String>
    {   match self
        {   Error::ModelCallFailed(_) => vec![
              "Check your API key configuration".to_string()
            , format!("Verify model '{}' is available", model_id)
            , "Try with shorter text (under 25,000 characters)"
                .to_string()
            , "Verify your framework prompt is properly formatted"
                .to_string()
            ]
          , Error::InvalidRequest(_) => vec![
              "Provide both a framework prompt and a text to analyze"
                .to_string()
            , "Keep temperature and top_p within 0.0 to 1.0, top_k of at \
               least 1 and a positive output token limit"
                .to_string()
            ]
          , Error::StepNotReady { .. } => vec![
              "Complete the earlier steps first".to_string()
            ]
          , Error::Export(_) => vec![]
        }
    }
}

impl From<serde_json::Error> for Error
{   fn from(e: serde_json::Error) -> Self
    {   Error::Export(e.to_string())
    }
}
