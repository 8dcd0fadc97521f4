use async_trait::async_trait;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::recovery::{recover, RecoveryPath};
use crate::request::{AnalysisRequest, ModelInvocation};
use crate::result::{AnalysisResult, TokenUsage};

/// Token counters as reported by a model collaborator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage
{   pub prompt_tokens: Option<u64>
  , pub completion_tokens: Option<u64>
  , pub total_tokens: Option<u64>
}

impl From<ModelUsage> for TokenUsage
{   fn from(u: ModelUsage) -> Self
    {   TokenUsage
        {   prompt_tokens: u.prompt_tokens
          , response_tokens: u.completion_tokens
          , total_tokens: u.total_tokens
        }
    }
}

/// Raw response from a model collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse
{   pub text: String
  , pub usage: Option<ModelUsage>
}

/// Anything that can run one model invocation
#[async_trait]
pub trait ModelCaller: Send + Sync
{   async fn invoke(&self, invocation: &ModelInvocation)
      -> Result<ModelResponse, Error>;
}

#[async_trait]
impl<T: ModelCaller + ?Sized> ModelCaller for std::sync::Arc<T>
{   async fn invoke(&self, invocation: &ModelInvocation)
      -> Result<ModelResponse, Error>
    {   (**self).invoke(invocation).await
    }
}

/// Runs the full pipeline: validate, build, call, recover
pub struct Analyzer<C>
{   caller: C
}

impl<C: ModelCaller> Analyzer<C>
{   pub fn new(caller: C) -> Self
    {   debug!("Creating Analyzer");
        Analyzer { caller }
    }

    pub fn caller(&self) -> &C
    {   &self.caller
    }

    /// Analyze one text.
    ///
    /// Fails with `InvalidRequest` before any call is made, or with
    /// `ModelCallFailed` when the collaborator fails. A response that
    /// does not match the schema is not an error; it comes back with
    /// a freeform payload.
    pub async fn analyze(&self, request: &AnalysisRequest)
      -> Result<AnalysisResult, Error>
    {   request.validate().map_err(|e| {
          error!("Rejected analysis request: {}", e);
          e
        })?;
        let invocation = ModelInvocation::from_request(request)?;
        let structured = invocation.response_format.is_structured();

        info!(
          "Sending analysis request to {} ({} chars)"
        , invocation.model_id
        , request.text.chars().count()
        );
        let response = self.caller
          .invoke(&invocation)
          .await
          .map_err(|e| {
            error!("Model call failed: {}", e);
            match e
            {   Error::ModelCallFailed(_) => e
              , other => Error::ModelCallFailed(other.to_string())
            }
          })?;

        let recovered = recover(&response.text, structured);
        if structured && recovered.path == RecoveryPath::Fallback
        {   info!("Structured output could not be parsed, using text");
        }
        debug!("Recovery path: {:?}", recovered.path);

        Ok(AnalysisResult::new(
          request
        , recovered.payload
        , response.text
        , response.usage.map(TokenUsage::from)
        ))
    }
}
