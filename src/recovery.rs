//! Recovery of structured data from model responses
//!
//! Schema-constrained generation is a request, not a guarantee. A
//! response goes through strict parsing, then one bounded repair pass
//! over the punctuation and truncation defects models actually emit,
//! and finally falls back to the untouched raw text. Nothing here
//! returns an error: the outcome is reported through [`RecoveryPath`]
//! and the payload's [`ResponseMode`].

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::Payload;
use crate::ResponseMode;

/// Which step of the pipeline produced the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPath
{   /// No schema was requested, text passed through
    NotRequested
  , /// Trimmed response parsed as is
    Strict
  , /// Parsed after the repair pass
    Repaired
  , /// Nothing parsed, raw response kept as text
    Fallback
}

/// A repair that changed the response text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Repair
{   /// Removed non-printable control characters
    ControlChars
  , /// Typographic quotes replaced by ASCII quotes
    SmartQuotes
  , /// Removed a stray quote wrapping the whole document
    WrappingQuote
  , /// Escaped raw newlines and tabs inside string literals
    StringNewlines
  , /// Dropped commas before a closing brace or bracket
    TrailingCommas
  , /// Closed strings, brackets and braces left open by truncation
    UnclosedDelimiters
}

/// Outcome of [`recover`]
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered
{   pub payload: Payload
  , pub path: RecoveryPath
  , /// Repairs applied, in order. Empty unless a repair pass ran.
    pub repairs: Vec<Repair>
}

impl Recovered
{   pub fn mode(&self) -> ResponseMode
    {   self.payload.mode()
    }

    pub fn into_parts(self) -> (ResponseMode, Payload)
    {   (self.payload.mode(), self.payload)
    }
}

/// Turn a raw model response into a payload.
///
/// Without a schema the response is returned unchanged as freeform
/// text. With one: strict parse of the trimmed text, else repair and
/// reparse once, else the original `raw_response` as freeform text.
/// Any syntactically valid JSON value is accepted, objects or not.
pub fn recover(raw_response: &str, schema_requested: bool) -> Recovered
{   if !schema_requested
    {   trace!("No schema requested, keeping response as text");
        return Recovered
        {   payload: Payload::Freeform(raw_response.to_string())
          , path: RecoveryPath::NotRequested
          , repairs: vec![]
        };
    }

    let trimmed = raw_response.trim();
    match serde_json::from_str::<Value>(trimmed)
    {   Ok(value) => {
          debug!("Strict JSON parse succeeded");
          return Recovered
          {   payload: Payload::Structured(value)
            , path: RecoveryPath::Strict
            , repairs: vec![]
          };
        }
      , Err(e) => {
          debug!("Strict JSON parse failed: {}", e);
        }
    }

    let (repaired, repairs) = repair(trimmed);
    trace!("Repaired response: {}", repaired);
    match serde_json::from_str::<Value>(repaired.trim())
    {   Ok(value) => {
          debug!("JSON parse succeeded after repairs {:?}", repairs);
          Recovered
          {   payload: Payload::Structured(value)
            , path: RecoveryPath::Repaired
            , repairs
          }
        }
      , Err(e) => {
          debug!(
            "JSON parse failed after repairs {:?}: {}; using text"
          , repairs
          , e
          );
          Recovered
          {   payload: Payload::Freeform(raw_response.to_string())
            , path: RecoveryPath::Fallback
            , repairs
          }
        }
    }
}

/// Run every repair over `text`, returning the result and the repairs
/// that changed something
pub fn repair(text: &str) -> (String, Vec<Repair>)
{   let steps: [(Repair, fn(&str) -> String); 6] = [
      (Repair::ControlChars, strip_control_chars)
    , (Repair::SmartQuotes, normalize_quotes)
    , (Repair::WrappingQuote, strip_wrapping_quote)
    , (Repair::StringNewlines, escape_string_newlines)
    , (Repair::TrailingCommas, remove_trailing_commas)
    , (Repair::UnclosedDelimiters, close_unbalanced)
    ];

    let mut current = text.to_string();
    let mut applied = Vec::new();
    for (kind, step) in steps
    {   let next = step(&current);
        if next != current
        {   applied.push(kind);
            current = next;
        }
    }
    (current, applied)
}

/// Drop control characters other than newline, carriage return and tab,
/// plus byte order marks
pub fn strip_control_chars(text: &str) -> String
{   text.chars()
      .filter(|c| {
        matches!(c, '\n' | '\r' | '\t')
          || !(c.is_control() || *c == '\u{feff}')
      })
      .collect()
}

pub fn normalize_quotes(text: &str) -> String
{   text.chars()
      .map(|c| match c
      {   '\u{201c}' | '\u{201d}' => '"'
        , '\u{2018}' | '\u{2019}' => '\''
        , other => other
      })
      .collect()
}

/// `"{...}"` becomes `{...}`. Only a quote directly against the opening
/// or closing delimiter of the document is removed; leading prose is
/// left alone.
pub fn strip_wrapping_quote(text: &str) -> String
{   let mut body = text.trim();
    if let Some(rest) = body.strip_prefix('"')
    {   if rest.trim_start().starts_with(['{', '['])
        {   body = rest.trim_start();
        }
    }
    if let Some(rest) = body.strip_suffix('"')
    {   if rest.trim_end().ends_with(['}', ']'])
        {   body = rest.trim_end();
        }
    }
    if body.len() == text.trim().len()
    {   return text.to_string();
    }
    body.to_string()
}

/// Escape literal newlines, carriage returns and tabs that sit inside
/// string literals. Whitespace between tokens is left as is.
pub fn escape_string_newlines(text: &str) -> String
{   let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars()
    {   if !in_string
        {   if c == '"'
            {   in_string = true;
            }
            out.push(c);
            continue;
        }
        if escaped
        {   escaped = false;
            match c
            {   '\n' => out.push('n')
              , '\r' => out.push('r')
              , '\t' => out.push('t')
              , _ => out.push(c)
            }
            continue;
        }
        match c
        {   '\\' => {
              escaped = true;
              out.push(c);
            }
          , '"' => {
              in_string = false;
              out.push(c);
            }
          , '\n' => out.push_str("\\n")
          , '\r' => out.push_str("\\r")
          , '\t' => out.push_str("\\t")
          , _ => out.push(c)
        }
    }
    out
}

/// Remove commas, outside strings, followed only by whitespace and then
/// `}`, `]` or the end of the text
pub fn remove_trailing_commas(text: &str) -> String
{   let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for (i, &c) in chars.iter().enumerate()
    {   if in_string
        {   if escaped
            {   escaped = false;
            } else if c == '\\'
            {   escaped = true;
            } else if c == '"'
            {   in_string = false;
            }
            out.push(c);
            continue;
        }
        match c
        {   '"' => {
              in_string = true;
              out.push(c);
            }
          , ',' => {
              let next = chars[i + 1..]
                .iter()
                .find(|n| !n.is_whitespace());
              match next
              {   None | Some('}') | Some(']') => {}
                , Some(_) => out.push(c)
              }
            }
          , _ => out.push(c)
        }
    }
    out
}

/// Close whatever truncation left open: first an unterminated string,
/// then brackets and braces in reverse nesting order. Stray closers are
/// left for the parser to reject.
pub fn close_unbalanced(text: &str) -> String
{   let mut open: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars()
    {   if in_string
        {   if escaped
            {   escaped = false;
            } else if c == '\\'
            {   escaped = true;
            } else if c == '"'
            {   in_string = false;
            }
            continue;
        }
        match c
        {   '"' => in_string = true
          , '{' => open.push('}')
          , '[' => open.push(']')
          , '}' | ']' => {
              if open.last() == Some(&c)
              {   open.pop();
              }
            }
          , _ => {}
        }
    }

    if !in_string && open.is_empty()
    {   return text.to_string();
    }

    let mut out = text.to_string();
    if in_string
    {   if escaped
        {   out.pop();
        }
        out.push('"');
    }
    out.extend(open.iter().rev());
    out
}
