pub mod error;
pub mod config;
pub mod providers;
pub mod request;
pub mod recovery;
pub mod result;
pub mod report;
pub mod frameworks;
pub mod session;
pub mod client;
use serde::{Deserialize, Serialize};

/*

framework_analysis: apply a theoretical framework (an instruction
prompt, optionally paired with a JSON Schema) to a text through a
generative model, and recover a usable result even when the model
does not honor the schema.

framework_analysis/
├── Cargo.toml
├── src/
│   ├── lib.rs          # Re-exports and shared enums
│   ├── error.rs        # Error taxonomy
│   ├── config.rs       # Generation and client configuration
│   ├── request.rs      # Request builder
│   ├── recovery.rs     # Strict parse, repair, freeform fallback
│   ├── result.rs       # Result record and JSON export
│   ├── report.rs       # Markdown analysis and reflection reports
│   ├── frameworks.rs   # Built-in framework registry
│   ├── frameworks/     # Framework data and custom schemas
│   ├── session.rs      # Step-by-step session state
│   ├── client.rs       # Model caller seam and analysis pipeline
│   ├── providers/      # Model collaborators
│   │   ├── mod.rs
│   │   └── gemini.rs
│   └── bin/analyze.rs  # Command line front end
└── tests/

Request Builder -> model call -> Response Recovery -> AnalysisResult

*/

pub use client::{Analyzer, ModelCaller, ModelResponse};
pub use config::{AppConfig, ClientConfig, GenerationConfig};
pub use error::{Error, ErrorKind};
pub use frameworks::{CategorySpec, Framework, FrameworkRegistry};
pub use recovery::{recover, Recovered, RecoveryPath, Repair};
pub use request::{build_request, AnalysisRequest, ModelInvocation
  , ResponseFormat};
pub use result::{AnalysisResult, Payload, TokenUsage};
pub use session::{ReflectionStatus, SessionInput, SessionState, Step};

/// Whether a result payload ended up structured or as raw text.
/// Records the actual outcome, not what was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseMode
{   Structured
  , Freeform
}

impl ResponseMode
{   /// Human label used in reports
    pub fn label(&self) -> &'static str
    {   match self
        {   ResponseMode::Structured => "Structured"
          , ResponseMode::Freeform => "Text"
        }
    }
}

/// Which shape of structured result the chosen schema produces.
/// Selected together with the schema and carried through to rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default
  , Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultVariant
{   /// Metaphor and anthropomorphism audit
    Metaphor
  , /// Political framing analysis
    Framing
  , /// Aristotelian rhetorical analysis
    Rhetorical
  , /// Any other schema, or none
    #[default]
    Generic
}

impl ResultVariant
{   pub fn heading(&self) -> &'static str
    {   match self
        {   ResultVariant::Metaphor => "Metaphor Analysis Results"
          , ResultVariant::Framing => "Framing Analysis Results"
          , ResultVariant::Rhetorical => "Rhetorical Analysis Results"
          , ResultVariant::Generic => "Analysis Results"
        }
    }
}
