//! Markdown reports for an analysis result and the reflection on it
//!
//! Rendering never fails: absent keys print as `N/A` and unexpected
//! shapes fall back to the generic section walk.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use std::fmt::Write;

use crate::result::{AnalysisResult, Payload, TIMESTAMP_FORMAT};
use crate::ResultVariant;

const MISSING: &str = "N/A";
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn markdown_report(result: &AnalysisResult) -> String
{   let generated = display_timestamp(&result.timestamp);
    let total_tokens = result.token_usage.and_then(|u| u.total_tokens);

    let mut md = String::new();
    md.push_str("# AI Framework Analysis Report\n\n");
    let _ = writeln!(md, "**Generated:** {}  ", generated);
    let _ = writeln!(md, "**Model:** {}  ", result.model_id);
    let _ = writeln!(
      md, "**Text Length:** {} characters  "
    , thousands(result.text_length as u64)
    );
    let _ = writeln!(
      md, "**Output Format:** {}  "
    , result.response_mode().label()
    );
    if let Some(total) = total_tokens
    {   let _ = writeln!(md, "**Tokens Used:** {}  ", thousands(total));
    }
    md.push_str("\n---\n\n");

    match &result.payload
    {   Payload::Structured(Value::Object(analysis)) => {
          let _ = write!(md, "## {}\n\n", result.variant.heading());
          match result.variant
          {   ResultVariant::Metaphor => metaphor_body(&mut md, analysis)
            , ResultVariant::Framing => framing_body(&mut md, analysis)
            , ResultVariant::Rhetorical | ResultVariant::Generic => {
                generic_body(&mut md, analysis)
              }
          }
        }
      , Payload::Structured(other) => {
          md.push_str("## Analysis Results\n\n");
          let _ = write!(md, "{}\n\n", inline(other));
        }
      , Payload::Freeform(text) => {
          md.push_str("## Analysis Results\n\n");
          let _ = write!(md, "{}\n\n", text);
        }
    }

    md.push_str("---\n\n## Analysis Metadata\n\n");
    let _ = writeln!(md, "- **Model Used:** {}", result.model_id);
    let _ = writeln!(md, "- **Generated:** {}", generated);
    let _ = writeln!(
      md, "- **Text Length:** {} characters"
    , thousands(result.text_length as u64)
    );
    if let Some(total) = total_tokens
    {   let _ = writeln!(md, "- **Total Tokens:** {}", thousands(total));
    }
    md
}

/// Characters of the framework prompt shown in the reflection summary
pub const FRAMEWORK_SUMMARY_CHARS: usize = 100;

/// Reflection export: a summary of the analysis, then the reflection
pub fn reflection_report(
  framework_prompt: &str
, result: &AnalysisResult
, reflection: &str
, generated: NaiveDateTime
) -> String
{   let mut md = String::new();
    md.push_str("# AI Framework Analysis Reflection\n");
    let _ = write!(md, "Generated: {}\n\n", generated.format(DISPLAY_FORMAT));
    md.push_str("## Analysis Summary\n");
    let _ = writeln!(
      md, "- **Framework Used:** {}"
    , framework_summary(framework_prompt)
    );
    let _ = writeln!(md, "- **Model Used:** {}", result.model_id);
    let _ = writeln!(
      md, "- **Text Analyzed:** {} characters"
    , thousands(result.text_length as u64)
    );
    let _ = writeln!(
      md, "- **Analysis Format:** {}"
    , result.response_mode().label()
    );
    let _ = writeln!(md, "- **Generated:** {}", result.timestamp);
    let _ = write!(md, "\n## Critical Reflection\n\n{}\n", reflection);
    md
}

/// File name stem for reflection exports, e.g. `reflection_20250101_120000`
pub fn reflection_file_stem(generated: NaiveDateTime) -> String
{   format!("reflection_{}", generated.format(TIMESTAMP_FORMAT))
}

fn framework_summary(prompt: &str) -> String
{   let head: String = prompt.chars().take(FRAMEWORK_SUMMARY_CHARS).collect();
    if head.len() < prompt.len()
    {   format!("{}...", head)
    } else
    {   head
    }
}

// ===== Variant bodies =====

fn metaphor_body(md: &mut String, analysis: &Map<String, Value>)
{   md.push_str("### Task 1: Metaphor & Anthropomorphism Audit\n\n");
    let audit = list(analysis.get("metaphorAudit"));
    if audit.is_empty()
    {   md.push_str("*No metaphorical patterns identified.*\n\n");
    }
    for (i, item) in audit.iter().enumerate()
    {   let title = text_or(item, "title", "Untitled");
        let _ = write!(md, "#### {}. {}\n\n", i + 1, title);
        quote_line(md, item);
        labeled(md, "Frame", item, "frame");
        labeled(md, "Projection", item, "projection");
        labeled(md, "Acknowledgment", item, "acknowledgment");
        labeled(md, "Implications", item, "implications");
        md.push_str("---\n\n");
    }

    md.push_str("### Task 2: Source-Target Mapping Analysis\n\n");
    let mappings = list(analysis.get("sourceTargetMapping"));
    if mappings.is_empty()
    {   md.push_str("*No source-target mappings identified.*\n\n");
    }
    for (i, item) in mappings.iter().enumerate()
    {   let _ = write!(md, "#### Mapping {}\n\n", i + 1);
        quote_line(md, item);
        labeled(md, "Source Domain", item, "sourceDomain");
        labeled(md, "Target Domain", item, "targetDomain");
        labeled(md, "Mapping", item, "mapping");
        labeled(md, "Conceals", item, "conceals");
        md.push_str("---\n\n");
    }

    md.push_str("### Task 3: Explanation Audit (Brown's Typology)\n\n");
    let explanations = list(analysis.get("explanationAudit"));
    if explanations.is_empty()
    {   md.push_str("*No explanatory passages analyzed.*\n\n");
    }
    for (i, item) in explanations.iter().enumerate()
    {   let _ = write!(md, "#### Explanation {}\n\n", i + 1);
        quote_line(md, item);
        labeled(md, "Brown's Type", item, "brownType");
        labeled(md, "Justification", item, "justification");
        labeled(md, "Implications", item, "implications");
        if let Some(chained) = present(item, "chainedFrom")
        {   let _ = write!(md, "**Chained From:** {}\n\n", inline(chained));
        }
        md.push_str("---\n\n");
    }

    md.push_str("### Critical Observations\n\n");
    match analysis.get("criticalObservations")
    {   Some(obs) if has_content(obs) => {
          for (label, key) in [
            ("Agency Slippage", "agencySlippage")
          , ("Metaphor-Driven Trust", "metaphorDrivenTrust")
          , ("Obscured Mechanics", "obscuredMechanics")
          , ("Context Sensitivity", "contextSensitivity")
          ]
          {   let _ = write!(
                md, "**{}:** {}\n\n"
              , label
              , text_or(obs, key, "Not analyzed")
              );
          }
        }
      , _ => md.push_str("*No critical observations provided.*\n\n")
    }

    md.push_str("### Conclusion\n\n");
    let conclusion = analysis.get("conclusion")
      .and_then(present_value)
      .map(inline)
      .unwrap_or_else(|| "No conclusion provided.".to_string());
    let _ = write!(md, "{}\n\n", conclusion);
}

fn framing_body(md: &mut String, analysis: &Map<String, Value>)
{   md.push_str("### Frames\n\n");
    let frames = list(analysis.get("frames"));
    if frames.is_empty()
    {   md.push_str("*No frames identified.*\n\n");
    }
    for (i, frame) in frames.iter().enumerate()
    {   let label = text_or(frame, "frame_label", "Unlabeled Frame");
        let _ = write!(md, "#### {}. {}\n\n", i + 1, label);

        let quotes = list(frame.get("exemplar_quotes"));
        if !quotes.is_empty()
        {   md.push_str("**Exemplar Quotes:**\n\n");
            for q in quotes
            {   let _ = writeln!(md, "- \"{}\"", inline(q));
            }
            md.push('\n');
        }

        if let Some(functions) = frame.get("functions")
        {   labeled(md, "Problem Definition", functions, "problem_definition");
            labeled(md, "Causal Diagnosis", functions, "causal_diagnosis");
            labeled(md, "Moral Evaluation", functions, "moral_evaluation");
            labeled(
              md, "Treatment Recommendation"
            , functions, "treatment_recommendation"
            );
        }
        if let Some(cues) = frame.get("lexical_cues")
        {   labeled(md, "Keywords", cues, "keywords");
            optional(md, "Metaphors", cues, "metaphors");
            optional(md, "Bridging Language", cues, "bridging_language");
        }
        if let Some(roles) = frame.get("role_assignment")
        {   optional(md, "Beneficiaries", roles, "beneficiaries");
            optional(md, "Cost Bearers", roles, "cost_bearers");
            optional(md, "Attributed Agency", roles, "attributed_agency");
        }
        if let Some(effects) = frame.get("reasoning_effects")
        {   labeled(md, "Invited Inferences", effects, "invited_inferences");
            optional(md, "Conceals or Downplays", effects, "conceals_or_downplays");
        }
        if let Some(counter) = frame.get("counterframe_linkage")
        {   optional(md, "Contests", counter, "contests");
            optional(md, "Mechanism", counter, "mechanism");
        }
        md.push_str("---\n\n");
    }

    md.push_str("### Synthesis\n\n");
    match analysis.get("synthesis")
    {   Some(synthesis) if has_content(synthesis) => {
          optional(md, "Dominant Frames", synthesis, "dominant_frames");
          labeled(md, "Comparative Insight", synthesis, "comparative_insight");
          optional(
            md, "Agenda-Setting Effects"
          , synthesis, "agenda_setting_effects"
          );
          optional(
            md, "Implications for Public Understanding"
          , synthesis, "implications_for_public_understanding"
          );
        }
      , _ => md.push_str("*No synthesis provided.*\n\n")
    }
}

fn generic_body(md: &mut String, analysis: &Map<String, Value>)
{   for (name, content) in analysis
    {   let _ = write!(md, "### {}\n\n", title_case(name));
        match content
        {   Value::Array(list) if list.is_empty() => {
              md.push_str("*No items found*\n\n");
            }
          , Value::Array(list) => {
              for (i, item) in list.iter().enumerate()
              {   match item
                  {   Value::Object(fields) => {
                        let _ = write!(md, "#### Item {}\n\n", i + 1);
                        fields_block(md, fields);
                      }
                    , other => {
                        let _ = writeln!(md, "- {}", inline(other));
                      }
                  }
              }
              md.push('\n');
            }
          , Value::Object(fields) => fields_block(md, fields)
          , other => {
              let _ = write!(md, "{}\n\n", inline(other));
            }
        }
    }
}

fn fields_block(md: &mut String, fields: &Map<String, Value>)
{   for (name, value) in fields
    {   match value
        {   Value::Array(list) if list.iter().any(Value::is_object) => {
              let _ = write!(md, "**{}:**\n\n", title_case(name));
              for entry in list
              {   let _ = writeln!(md, "- {}", inline(entry));
              }
              md.push('\n');
            }
          , Value::Object(nested) => {
              let _ = write!(md, "**{}:**\n\n", title_case(name));
              for (sub, sub_value) in nested
              {   let _ = writeln!(
                    md, "- **{}:** {}"
                  , title_case(sub)
                  , inline(sub_value)
                  );
              }
              md.push('\n');
            }
          , other => {
              let _ = write!(md, "**{}:** {}\n\n", title_case(name), inline(other));
            }
        }
    }
}

// ===== Helpers =====

fn list(value: Option<&Value>) -> &[Value]
{   value
      .and_then(Value::as_array)
      .map(Vec::as_slice)
      .unwrap_or(&[])
}

fn present<'a>(item: &'a Value, key: &str) -> Option<&'a Value>
{   item.get(key).and_then(present_value)
}

fn present_value(value: &Value) -> Option<&Value>
{   match value
    {   Value::Null => None
      , Value::String(s) if s.trim().is_empty() => None
      , other => Some(other)
    }
}

fn has_content(value: &Value) -> bool
{   match value
    {   Value::Object(map) => map.values().any(|v| present_value(v).is_some())
      , other => present_value(other).is_some()
    }
}

fn text_or(item: &Value, key: &str, fallback: &str) -> String
{   present(item, key)
      .map(inline)
      .unwrap_or_else(|| fallback.to_string())
}

fn labeled(md: &mut String, label: &str, item: &Value, key: &str)
{   let _ = write!(md, "**{}:** {}\n\n", label, text_or(item, key, MISSING));
}

fn optional(md: &mut String, label: &str, item: &Value, key: &str)
{   if let Some(value) = present(item, key)
    {   let _ = write!(md, "**{}:** {}\n\n", label, inline(value));
    }
}

fn quote_line(md: &mut String, item: &Value)
{   let _ = write!(md, "**Quote:** \"{}\"\n\n", text_or(item, "quote", MISSING));
}

/// Single-line rendering of any value
pub fn inline(value: &Value) -> String
{   match value
    {   Value::Null => MISSING.to_string()
      , Value::String(s) => s.clone()
      , Value::Array(list) => list.iter()
          .map(inline)
          .collect::<Vec<_>>()
          .join(", ")
      , Value::Object(map) => map.iter()
          .map(|(k, v)| format!("{}: {}", title_case(k), inline(v)))
          .collect::<Vec<_>>()
          .join("; ")
      , other => other.to_string()
    }
}

/// `source_domain` and `sourceDomain` both become `Source Domain`
pub fn title_case(key: &str) -> String
{   let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in key.chars()
    {   if c == '_' || c == '-' || c == ' '
        {   if !current.is_empty()
            {   words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty()
        {   words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty()
    {   words.push(current);
    }
    words.iter()
      .map(|w| {
        let mut chars = w.chars();
        match chars.next()
        {   Some(first) => first.to_uppercase()
              .chain(chars.flat_map(char::to_lowercase))
              .collect()
          , None => String::new()
        }
      })
      .collect::<Vec<String>>()
      .join(" ")
}

/// `1234567` becomes `1,234,567`
pub fn thousands(n: u64) -> String
{   let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate()
    {   if i > 0 && (digits.len() - i) % 3 == 0
        {   out.push(',');
        }
        out.push(c);
    }
    out
}

/// `20250101_093000` becomes `2025-01-01 09:30:00`; anything else is
/// shown as stored
pub fn display_timestamp(timestamp: &str) -> String
{   NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
      .map(|t| t.format(DISPLAY_FORMAT).to_string())
      .unwrap_or_else(|_| timestamp.to_string())
}
