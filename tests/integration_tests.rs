use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use framework_analysis::client::ModelUsage;
use framework_analysis::config::{ClientConfig, GenerationConfig};
use framework_analysis::providers::gemini::{extract_response, request_body
  , GenerateContentResponse, GeminiClient};
use framework_analysis::request::STRUCTURED_MIME_TYPE;
use framework_analysis::result::preview;
use framework_analysis::{build_request, AnalysisRequest, AnalysisResult
  , Analyzer, Error, ErrorKind, ModelCaller, ModelInvocation, ModelResponse
  , Payload, ResponseFormat, ResponseMode, ResultVariant, TokenUsage};

fn init_logging()
{   let _ = env_logger::builder().is_test(true).try_init();
}

/// Caller that replays one canned reply and records what it was sent
struct ScriptedCaller
{   reply: Result<ModelResponse, Error>
  , seen: Mutex<Vec<ModelInvocation>>
}

impl ScriptedCaller
{   fn replying(text: &str, usage: Option<ModelUsage>) -> Arc<Self>
    {   Arc::new(ScriptedCaller
        {   reply: Ok(ModelResponse
            {   text: text.to_string()
              , usage
            })
          , seen: Mutex::new(vec![])
        })
    }

    fn failing(error: Error) -> Arc<Self>
    {   Arc::new(ScriptedCaller
        {   reply: Err(error)
          , seen: Mutex::new(vec![])
        })
    }

    fn calls(&self) -> Vec<ModelInvocation>
    {   self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelCaller for ScriptedCaller
{   async fn invoke(&self, invocation: &ModelInvocation)
      -> Result<ModelResponse, Error>
    {   self.seen.lock().unwrap().push(invocation.clone());
        self.reply.clone()
    }
}

fn schema() -> Value
{   json!({
      "type": "object"
    , "properties": { "x": { "type": "integer" } }
    , "required": ["x"]
    })
}

fn request(schema: Option<Value>) -> AnalysisRequest
{   AnalysisRequest::new(
      "The text under analysis."
    , "Apply the framework."
    , schema
    , "gemini-2.5-flash"
    , GenerationConfig::default()
    )
}

// ===== Request builder =====

#[test]
fn test_build_request_with_schema_is_structured()
{   let schema = schema();
    let invocation = build_request(
      "text"
    , "directive"
    , Some(&schema)
    , "gemini-2.5-pro"
    , &GenerationConfig::default()
    ).expect("valid request");

    assert_eq!(invocation.system_instruction, "directive");
    assert_eq!(invocation.contents, "text");
    assert_eq!(invocation.model_id, "gemini-2.5-pro");
    assert_eq!(
      invocation.response_format
    , ResponseFormat::Structured { schema: schema.clone() }
    );
    assert_eq!(
      invocation.response_format.mime_type()
    , Some(STRUCTURED_MIME_TYPE)
    );
}

#[test]
fn test_build_request_without_schema_is_free_text()
{   let config = GenerationConfig::default();
    let none = build_request("t", "p", None, "m", &config)
      .expect("valid request");
    assert_eq!(none.response_format, ResponseFormat::FreeText);

    let null = build_request("t", "p", Some(&Value::Null), "m", &config)
      .expect("valid request");
    assert_eq!(null.response_format, ResponseFormat::FreeText);
    assert_eq!(null.response_format.schema(), None);
}

#[test]
fn test_build_request_rejects_empty_inputs()
{   let config = GenerationConfig::default();
    let err = build_request("  ", "p", None, "m", &config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    let err = build_request("t", "", None, "m", &config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[test]
fn test_build_request_does_not_clamp_config()
{   let config = GenerationConfig
    {   temperature: 3.0
      , top_p: 0.5
      , top_k: 5
      , max_output_tokens: 100
    };
    let invocation = build_request("t", "p", None, "m", &config)
      .expect("builder leaves ranges to the caller");
    assert_eq!(invocation.generation_config.temperature, 3.0);
}

#[test]
fn test_generation_config_validation()
{   assert!(GenerationConfig::default().validate().is_ok());

    let bad = [
      GenerationConfig { temperature: 1.5, ..GenerationConfig::default() }
    , GenerationConfig { temperature: f32::NAN, ..GenerationConfig::default() }
    , GenerationConfig { top_p: -0.1, ..GenerationConfig::default() }
    , GenerationConfig { top_k: 0, ..GenerationConfig::default() }
    , GenerationConfig { max_output_tokens: 0, ..GenerationConfig::default() }
    ];
    for config in bad
    {   let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest, "{:?}", config);
    }

    let edges = GenerationConfig
    {   temperature: 0.0
      , top_p: 1.0
      , top_k: 1
      , max_output_tokens: 1
    };
    assert!(edges.validate().is_ok());
}

// ===== Analyzer pipeline =====

#[tokio::test]
async fn test_analyze_structured_response()
{   init_logging();
    let caller = ScriptedCaller::replying(
      "{\"x\": 1,}"
    , Some(ModelUsage
      {   prompt_tokens: Some(10)
        , completion_tokens: Some(5)
        , total_tokens: Some(15)
      })
    );
    let analyzer = Analyzer::new(caller.clone());
    let req = request(Some(schema())).with_variant(ResultVariant::Framing);

    let result = analyzer.analyze(&req).await.expect("analysis succeeds");

    assert_eq!(result.response_mode(), ResponseMode::Structured);
    assert_eq!(result.payload, Payload::Structured(json!({"x": 1})));
    assert_eq!(result.raw_response, "{\"x\": 1,}");
    assert_eq!(result.variant, ResultVariant::Framing);
    assert_eq!(result.model_id, "gemini-2.5-flash");
    assert_eq!(result.text_length, req.text.chars().count());
    assert_eq!(result.text_preview, req.text);
    assert_eq!(
      result.token_usage
    , Some(TokenUsage
      {   prompt_tokens: Some(10)
        , response_tokens: Some(5)
        , total_tokens: Some(15)
      })
    );

    let calls = caller.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].response_format.is_structured());
    assert_eq!(calls[0].system_instruction, "Apply the framework.");
    assert_eq!(calls[0].variant, ResultVariant::Framing);
}

#[tokio::test]
async fn test_analyze_unparseable_response_falls_back_to_text()
{   let raw = "Sure! Here is the analysis: the text uses a burden frame.";
    let caller = ScriptedCaller::replying(raw, None);
    let analyzer = Analyzer::new(caller);

    let result = analyzer.analyze(&request(Some(schema()))).await
      .expect("degraded result is still a result");

    assert_eq!(result.response_mode(), ResponseMode::Freeform);
    assert_eq!(result.payload, Payload::Freeform(raw.to_string()));
    assert_eq!(result.raw_response, raw);
    assert_eq!(result.token_usage, None);
}

#[tokio::test]
async fn test_analyze_without_schema_never_parses()
{   let caller = ScriptedCaller::replying("{\"x\": 1}", None);
    let analyzer = Analyzer::new(caller.clone());

    let result = analyzer.analyze(&request(None)).await
      .expect("analysis succeeds");

    assert_eq!(result.payload, Payload::Freeform("{\"x\": 1}".to_string()));
    assert_eq!(caller.calls()[0].response_format, ResponseFormat::FreeText);
}

#[tokio::test]
async fn test_invalid_request_fails_before_calling_model()
{   let caller = ScriptedCaller::replying("{}", None);
    let analyzer = Analyzer::new(caller.clone());

    let mut empty_text = request(None);
    empty_text.text = String::new();
    let err = analyzer.analyze(&empty_text).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    let mut hot = request(None);
    hot.config.temperature = 1.2;
    let err = analyzer.analyze(&hot).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    let mut no_model = request(None);
    no_model.model_id = " ".to_string();
    assert!(analyzer.analyze(&no_model).await.is_err());

    assert!(caller.calls().is_empty());
}

#[tokio::test]
async fn test_model_failure_is_surfaced_once()
{   let caller = ScriptedCaller::failing(
      Error::ModelCallFailed("quota exceeded".to_string())
    );
    let analyzer = Analyzer::new(caller.clone());

    let err = analyzer.analyze(&request(None)).await.unwrap_err();
    assert_eq!(err, Error::ModelCallFailed("quota exceeded".to_string()));
    assert_eq!(caller.calls().len(), 1);
    assert!(!err.troubleshooting("gemini-2.5-flash").is_empty());
}

#[tokio::test]
async fn test_other_caller_errors_become_model_call_failed()
{   let caller = ScriptedCaller::failing(
      Error::Export("transport gave up".to_string())
    );
    let analyzer = Analyzer::new(caller);

    let err = analyzer.analyze(&request(None)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelCallFailed);
    assert!(err.to_string().contains("transport gave up"));
}

#[test]
fn test_analyze_with_block_on()
{   let caller = ScriptedCaller::replying("{\"x\": 2}", None);
    let analyzer = Analyzer::new(caller);
    let result = tokio_test::block_on(
      analyzer.analyze(&request(Some(schema())))
    );
    let result = tokio_test::assert_ok!(result);
    assert_eq!(result.payload.as_structured(), Some(&json!({"x": 2})));
}

// ===== Result export =====

#[test]
fn test_result_json_round_trip()
{   let req = request(Some(schema())).with_variant(ResultVariant::Metaphor);
    let mut result = AnalysisResult::new(
      &req
    , Payload::Structured(json!({"metaphorAudit": [], "conclusion": "c"}))
    , "{\"metaphorAudit\": [], \"conclusion\": \"c\"}".to_string()
    , Some(TokenUsage
      {   prompt_tokens: Some(1)
        , response_tokens: None
        , total_tokens: Some(3)
      })
    );
    result.timestamp = "20250102_030405".to_string();

    let exported = result.to_json_pretty().expect("export");
    let reparsed = AnalysisResult::from_json(&exported).expect("import");
    assert_eq!(reparsed, result);

    let wire: Value = serde_json::from_str(&exported).expect("json");
    assert_eq!(wire["response_mode"], json!("STRUCTURED"));
    assert_eq!(wire["timestamp"], json!("20250102_030405"));
    assert_eq!(wire["model"], json!("gemini-2.5-flash"));
    assert_eq!(wire["generation_config"]["top_k"], json!(10));
    assert_eq!(wire["variant"], json!("metaphor"));
    assert_eq!(wire["metadata"]["total_tokens"], json!(3));
}

#[test]
fn test_string_payloads_keep_their_mode_through_export()
{   let req = request(Some(schema()));
    let structured = AnalysisResult::new(
      &req
    , Payload::Structured(json!("a bare string"))
    , "\"a bare string\"".to_string()
    , None
    );
    let freeform = AnalysisResult::new(
      &req
    , Payload::Freeform("a bare string".to_string())
    , "a bare string".to_string()
    , None
    );

    for result in [structured, freeform]
    {   let text = result.to_json_pretty().expect("export");
        let back = AnalysisResult::from_json(&text).expect("import");
        assert_eq!(back.response_mode(), result.response_mode());
        assert_eq!(back, result);
    }
}

#[test]
fn test_timestamp_is_kept_literally()
{   let mut result = AnalysisResult::new(
      &request(None)
    , Payload::Freeform("x".to_string())
    , "x".to_string()
    , None
    );
    result.timestamp = "not a date at all".to_string();
    let back = AnalysisResult::from_json(
      &result.to_json_pretty().expect("export")
    ).expect("import");
    assert_eq!(back.timestamp, "not a date at all");
    assert_eq!(back.export_file_stem(), "analysis_not a date at all");
}

#[test]
fn test_import_rejects_freeform_mode_with_object()
{   let text = json!({
      "timestamp": "20250101_000000"
    , "model": "m"
    , "generation_config": GenerationConfig::default()
    , "framework_preview": "p"
    , "text_preview": "t"
    , "text_length": 1
    , "response_mode": "FREEFORM"
    , "analysis": {"x": 1}
    , "raw_response": "{\"x\": 1}"
    }).to_string();
    let err = AnalysisResult::from_json(&text).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Export);
}

#[test]
fn test_previews_are_cut_at_200_chars()
{   let long: String = "\u{e9}".repeat(250);
    let cut = preview(&long);
    assert_eq!(cut.chars().count(), 203);
    assert!(cut.ends_with("..."));
    assert_eq!(preview("short"), "short");

    let mut req = request(None);
    req.text = long.clone();
    let result = AnalysisResult::new(
      &req
    , Payload::Freeform(String::new())
    , String::new()
    , None
    );
    assert_eq!(result.text_length, 250);
    assert_eq!(result.text_preview, cut);
}

// ===== Gemini collaborator =====

#[test]
fn test_gemini_structured_body()
{   let invocation = ModelInvocation::from_request(&request(Some(schema())))
      .expect("valid request");
    let body = serde_json::to_value(request_body(&invocation))
      .expect("serializable");

    assert_eq!(
      body["systemInstruction"]["parts"][0]["text"]
    , json!("Apply the framework.")
    );
    assert_eq!(body["contents"][0]["role"], json!("user"));
    assert_eq!(
      body["contents"][0]["parts"][0]["text"]
    , json!("The text under analysis.")
    );
    let config = &body["generationConfig"];
    assert_eq!(config["topK"], json!(10));
    assert_eq!(config["maxOutputTokens"], json!(8192));
    assert_eq!(config["responseMimeType"], json!("application/json"));
    assert_eq!(config["responseJsonSchema"], schema());
}

#[test]
fn test_gemini_free_text_body_has_no_schema()
{   let invocation = ModelInvocation::from_request(&request(None))
      .expect("valid request");
    let body = serde_json::to_value(request_body(&invocation))
      .expect("serializable");
    let config = body["generationConfig"].as_object().expect("object");
    assert!(!config.contains_key("responseMimeType"));
    assert!(!config.contains_key("responseJsonSchema"));
}

#[test]
fn test_gemini_response_extraction()
{   let decoded: GenerateContentResponse = serde_json::from_value(json!({
      "candidates": [{
        "content": {
          "role": "model"
        , "parts": [{"text": "{\"a\": "}, {"text": "1}"}]
        }
      , "finishReason": "STOP"
      }]
    , "usageMetadata": {
        "promptTokenCount": 12
      , "candidatesTokenCount": 4
      , "totalTokenCount": 16
      }
    })).expect("decodes");

    let response = extract_response(decoded).expect("has text");
    assert_eq!(response.text, "{\"a\": 1}");
    assert_eq!(
      response.usage
    , Some(ModelUsage
      {   prompt_tokens: Some(12)
        , completion_tokens: Some(4)
        , total_tokens: Some(16)
      })
    );
}

#[test]
fn test_gemini_blocked_or_empty_responses_fail()
{   let blocked: GenerateContentResponse = serde_json::from_value(json!({
      "promptFeedback": {"blockReason": "SAFETY"}
    })).expect("decodes");
    let err = extract_response(blocked).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelCallFailed);
    assert!(err.to_string().contains("SAFETY"));

    let empty: GenerateContentResponse = serde_json::from_value(json!({}))
      .expect("decodes");
    assert_eq!(
      extract_response(empty).unwrap_err().kind()
    , ErrorKind::ModelCallFailed
    );
}

#[tokio::test]
async fn test_gemini_client_without_key_fails()
{   let client = GeminiClient::new(None, &ClientConfig::default())
      .expect("client builds");
    assert!(!client.has_api_key());
    assert_eq!(
      client.endpoint("gemini-2.5-flash")
    , "https://generativelanguage.googleapis.com/v1beta/models/\
       gemini-2.5-flash:generateContent"
    );

    let invocation = ModelInvocation::from_request(&request(None))
      .expect("valid request");
    let err = client.invoke(&invocation).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelCallFailed);
}

#[test]
fn test_gemini_custom_api_base()
{   let config = ClientConfig
    {   api_base: Some("http://localhost:8080/v1/".to_string())
      , timeout_secs: Some(5)
      , verbose: None
    };
    let mut client = GeminiClient::new(None, &config).expect("client builds");
    client.set_api_key("k".to_string());
    assert!(client.has_api_key());
    assert_eq!(
      client.endpoint("m")
    , "http://localhost:8080/v1/models/m:generateContent"
    );
}

#[tokio::test]
#[ignore]
async fn test_gemini_live_structured_analysis()
{   let key = match std::env::var("GEMINI_API_KEY")
    {   Ok(k) => k
      , Err(_) => {
          println!("Skipping: GEMINI_API_KEY not set");
          return;
        }
    };
    init_logging();
    let client = GeminiClient::new(Some(key), &ClientConfig::default())
      .expect("client builds");
    let analyzer = Analyzer::new(client);

    let req = AnalysisRequest::new(
      "Taxes are a burden on hard-working families."
    , "Identify the frame used in the text."
    , Some(json!({
        "type": "object"
      , "properties": { "frame": { "type": "string" } }
      , "required": ["frame"]
      }))
    , "gemini-2.5-flash"
    , GenerationConfig { max_output_tokens: 512, ..GenerationConfig::default() }
    );

    match tokio::time::timeout(
      std::time::Duration::from_secs(60)
    , analyzer.analyze(&req)
    ).await
    {   Ok(Ok(result)) => {
          println!("Response ({:?}): {}", result.response_mode(), result.raw_response);
          assert!(!result.raw_response.is_empty());
        }
      , Ok(Err(e)) => println!("API Error: {}", e)
      , Err(_) => println!("Timeout waiting for response")
    }
}
