//! Built-in theoretical frameworks
//!
//! Each framework bundles a prompt, a JSON Schema, an example text and
//! the result variant its schema produces. Records are immutable and
//! keyed by name. Custom frameworks build their schemas with [`light_schema`]
//! and [`schema_from_categories`].

use log::error;
use serde_json::Value;

use crate::ResultVariant;

mod schemas;
pub use schemas::{check_schema_shape, light_schema, schema_from_categories
  , snake_case_field, CategorySpec, CONCLUSION_FIELD};

pub const METAPHOR: &str = "Metaphor & Anthropomorphism Analysis";
pub const FRAMING: &str = "Political Framing Analysis";
pub const RHETORICAL: &str = "Aristotelian Rhetorical Analysis";

/// One framework: everything needed to run and render an analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framework
{   pub name: &'static str
  , pub description: &'static str
  , pub discipline: &'static str
  , pub prompt: &'static str
  , /// Schema source as embedded JSON
    pub schema_json: &'static str
  , pub example_text: &'static str
  , pub variant: ResultVariant
}

impl Framework
{   /// Parsed JSON Schema
    pub fn schema(&self) -> Result<Value, crate::error::Error>
    {   serde_json::from_str(self.schema_json).map_err(|e| {
          error!("Embedded schema for {} is invalid: {}", self.name, e);
          crate::error::Error::InvalidRequest(format!(
            "schema for {} is invalid: {}", self.name, e
          ))
        })
    }
}

const BUILTIN: [Framework; 3] = [
  Framework
  {   name: METAPHOR
    , description: "Analyzes metaphorical language in AI discourse using \
                    cognitive linguistics"
    , discipline: "Digital Humanities / AI Literacy"
    , prompt: include_str!("frameworks/metaphor_prompt.md")
    , schema_json: include_str!("frameworks/metaphor_schema.json")
    , example_text: include_str!("frameworks/metaphor_example.txt")
    , variant: ResultVariant::Metaphor
  }
, Framework
  {   name: FRAMING
    , description: "Examines political discourse using Entman's framing \
                    functions and Lakoff's frame semantics"
    , discipline: "Political Science / Communication Studies"
    , prompt: include_str!("frameworks/framing_prompt.md")
    , schema_json: include_str!("frameworks/framing_schema.json")
    , example_text: include_str!("frameworks/framing_example.txt")
    , variant: ResultVariant::Framing
  }
, Framework
  {   name: RHETORICAL
    , description: "Comprehensive analysis of ethos, pathos, and logos \
                    appeals in persuasive discourse"
    , discipline: "Rhetoric / Communication Studies"
    , prompt: include_str!("frameworks/rhetorical_prompt.md")
    , schema_json: include_str!("frameworks/rhetorical_schema.json")
    , example_text: include_str!("frameworks/rhetorical_example.txt")
    , variant: ResultVariant::Rhetorical
  }
];

/// Ordered, name-keyed collection of frameworks
#[derive(Debug, Clone)]
pub struct FrameworkRegistry
{   frameworks: Vec<Framework>
}

impl FrameworkRegistry
{   pub fn builtin() -> Self
    {   FrameworkRegistry
        {   frameworks: BUILTIN.to_vec()
        }
    }

    pub fn get(&self, name: &str) -> Option<&Framework>
    {   self.frameworks.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_
    {   self.frameworks.iter().map(|f| f.name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Framework>
    {   self.frameworks.iter()
    }

    pub fn len(&self) -> usize
    {   self.frameworks.len()
    }

    pub fn is_empty(&self) -> bool
    {   self.frameworks.is_empty()
    }
}

impl Default for FrameworkRegistry
{   fn default() -> Self
    {   FrameworkRegistry::builtin()
    }
}
