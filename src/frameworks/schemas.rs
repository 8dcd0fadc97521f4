//! Schemas for custom frameworks
//!
//! Three ways to structure a custom framework's output besides free text:
//! the fixed light structure, a schema built from analysis categories,
//! and a pasted schema that must at least look like an object schema.

use log::{debug, warn};
use serde_json::{json, Map, Value};

use crate::error::Error;

/// Required closing property of every built schema
pub const CONCLUSION_FIELD: &str = "conclusion";

/// One analysis category. No fields means a single text answer; fields
/// mean a list of items, each carrying those text fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySpec
{   pub name: String
  , pub fields: Vec<String>
}

impl CategorySpec
{   pub fn text(name: impl Into<String>) -> Self
    {   CategorySpec
        {   name: name.into()
          , fields: vec![]
        }
    }

    pub fn list<S: Into<String>>(
      name: impl Into<String>
    , fields: impl IntoIterator<Item = S>
    ) -> Self
    {   CategorySpec
        {   name: name.into()
          , fields: fields.into_iter().map(Into::into).collect()
        }
    }
}

/// Overview, findings with evidence, and a synthesis
pub fn light_schema() -> Value
{   json!({
      "type": "object"
    , "properties": {
        "analysis_overview": {"type": "string"}
      , "main_findings": {
          "type": "array"
        , "items": {
            "type": "object"
          , "properties": {
              "category": {"type": "string"}
            , "evidence": {"type": "string"}
            , "interpretation": {"type": "string"}
            }
          , "required": ["category", "evidence", "interpretation"]
          }
        }
      , "synthesis": {"type": "string"}
      }
    , "required": ["analysis_overview", "main_findings", "synthesis"]
    })
}

/// `Character development` becomes `character_development`
pub fn snake_case_field(name: &str) -> String
{   name.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Build an object schema with one required property per category plus a
/// required `conclusion`. Blank category names and blank fields are
/// skipped.
pub fn schema_from_categories(categories: &[CategorySpec])
  -> Result<Value, Error>
{   let mut properties = Map::new();
    let mut required: Vec<Value> = vec![];

    for category in categories
    {   let key = snake_case_field(&category.name);
        if key.is_empty()
        {   continue;
        }
        let fields: Vec<&str> = category.fields
          .iter()
          .map(|f| f.trim())
          .filter(|f| !f.is_empty())
          .collect();
        let property = if fields.is_empty()
        {   json!({"type": "string"})
        } else
        {   let item_properties: Map<String, Value> = fields
              .iter()
              .map(|f| (f.to_string(), json!({"type": "string"})))
              .collect();
            json!({
              "type": "array"
            , "items": {
                "type": "object"
              , "properties": item_properties
              , "required": fields
              }
            })
        };
        if properties.insert(key.clone(), property).is_some()
        {   warn!("Category {} listed twice, keeping the last", key);
        } else
        {   required.push(Value::String(key));
        }
    }

    if properties.is_empty()
    {   return Err(Error::InvalidRequest(
          "list at least one analysis category".to_string()
        ));
    }
    if properties
      .insert(CONCLUSION_FIELD.to_string(), json!({"type": "string"}))
      .is_none()
    {   required.push(Value::String(CONCLUSION_FIELD.to_string()));
    }
    debug!("Built schema with {} required properties", required.len());

    Ok(json!({
      "type": "object"
    , "properties": properties
    , "required": required
    }))
}

/// A pasted schema must be an object with `type` and `properties`
pub fn check_schema_shape(schema: &Value) -> Result<(), Error>
{   let object = schema.as_object().ok_or_else(|| {
      Error::InvalidRequest("schema must be a JSON object".to_string())
    })?;
    for key in ["type", "properties"]
    {   if !object.contains_key(key)
        {   return Err(Error::InvalidRequest(format!(
              "schema should have a '{}' field", key
            )));
        }
    }
    Ok(())
}
