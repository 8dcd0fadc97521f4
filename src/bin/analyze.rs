use chrono::Local;
use clap::Parser;
use log::{debug, error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use framework_analysis::config::{AppConfig, ConfigOverrides, DEFAULT_MODEL};
use framework_analysis::frameworks::{CategorySpec, FrameworkRegistry};
use framework_analysis::providers::GeminiClient;
use framework_analysis::report::{markdown_report, reflection_file_stem
  , reflection_report};
use framework_analysis::{Analyzer, Error, ResultVariant, SessionInput
  , SessionState};

/// Apply a theoretical framework to a text with a Gemini model
#[derive(Debug, Parser)]
#[command(name = "analyze", version)]
struct Args
{   /// Built-in framework name (see --list-frameworks)
    #[arg(long, conflicts_with = "prompt_file")]
    framework: Option<String>
  , /// Custom framework prompt file
    #[arg(long)]
    prompt_file: Option<PathBuf>
  , /// JSON Schema file for structured output
    #[arg(long, conflicts_with = "no_schema")]
    schema_file: Option<PathBuf>
  , /// Ask for free text even when the framework has a schema
    #[arg(long)]
    no_schema: bool
  , /// Use the light structure: overview, findings, synthesis
    #[arg(long, conflicts_with_all = ["schema_file", "no_schema"])]
    light_schema: bool
  , /// Build a schema from a category; `name` or `name:field,field`
    #[arg(
      long = "category"
    , conflicts_with_all = ["schema_file", "no_schema", "light_schema"]
    )]
    categories: Vec<String>
  , /// Text to analyze
    #[arg(long, conflicts_with = "example")]
    text_file: Option<PathBuf>
  , /// Analyze the framework's bundled example text
    #[arg(long)]
    example: bool
  , /// JSON config file; environment is used otherwise
    #[arg(long)]
    config: Option<PathBuf>
  , #[arg(long)]
    model: Option<String>
  , #[arg(long)]
    temperature: Option<f32>
  , #[arg(long)]
    top_p: Option<f32>
  , #[arg(long)]
    top_k: Option<u32>
  , #[arg(long)]
    max_output_tokens: Option<u32>
  , /// Write the JSON export here
    #[arg(long)]
    json_out: Option<PathBuf>
  , /// Write the Markdown report here
    #[arg(long)]
    md_out: Option<PathBuf>
  , /// Your critical reflection on the result
    #[arg(long)]
    reflection_file: Option<PathBuf>
  , /// Directory for the reflection export
    #[arg(long, requires = "reflection_file")]
    reflection_dir: Option<PathBuf>
  , /// Debug logging for this crate
    #[arg(long, short)]
    verbose: bool
  , /// Print built-in framework names and exit
    #[arg(long)]
    list_frameworks: bool
}

#[tokio::main]
async fn main() -> ExitCode
{   let args = Args::parse();

    if args.list_frameworks
    {   for framework in FrameworkRegistry::builtin().iter()
        {   println!(
              "{}\n    {} ({})"
            , framework.name
            , framework.description
            , framework.discipline
            );
        }
        return ExitCode::SUCCESS;
    }

    let overrides = ConfigOverrides
    {   model_id: args.model.clone()
      , temperature: args.temperature
      , top_p: args.top_p
      , top_k: args.top_k
      , max_output_tokens: args.max_output_tokens
      , verbose: args.verbose
    };
    let config = match AppConfig::load(args.config.as_deref(), &overrides)
    {   Ok(config) => config
      , Err(e) => {
          init_logging(None);
          return failed(&e, args.model.as_deref().unwrap_or(DEFAULT_MODEL));
        }
    };
    init_logging(config.log_filter());
    config.warn_unknown_model();
    debug!("Effective config: {:?}", config.generation);

    let model_id = config.model_id.clone();
    match run(args, config).await
    {   Ok(()) => ExitCode::SUCCESS
      , Err(e) => failed(&e, &model_id)
    }
}

fn init_logging(filter: Option<log::LevelFilter>)
{   let mut builder = env_logger::Builder::from_default_env();
    if let Some(level) = filter
    {   builder.filter_module("framework_analysis", level);
        builder.filter_module("analyze", level);
    }
    builder.init();
}

fn failed(e: &Error, model_id: &str) -> ExitCode
{   eprintln!("Analysis failed: {}", e);
    for tip in e.troubleshooting(model_id)
    {   eprintln!("  - {}", tip);
    }
    ExitCode::FAILURE
}

fn category_spec(arg: &str) -> CategorySpec
{   match arg.split_once(':')
    {   Some((name, fields)) => CategorySpec::list(name, fields.split(','))
      , None => CategorySpec::text(arg)
    }
}

async fn run(args: Args, config: AppConfig) -> Result<(), Error>
{   let mut session = SessionState::new().apply(
      SessionInput::ConfigureModel
      {   model_id: config.model_id.clone()
        , generation: config.generation
      }
    )?;

    let registry = FrameworkRegistry::builtin();
    let framework = match &args.framework
    {   Some(name) => Some(registry.get(name).ok_or_else(|| {
          Error::InvalidRequest(format!("unknown framework: {}", name))
        })?)
      , None => None
    };

    session = match (&args.framework, &args.prompt_file)
    {   (Some(name), _) => session.apply(SessionInput::UseFramework
        {   name: name.clone()
        })?
      , (None, Some(path)) => session.apply(SessionInput::SetFramework
        {   prompt: read_file(path)?
        })?
      , (None, None) => {
          return Err(Error::InvalidRequest(
            "pass --framework or --prompt-file".to_string()
          ));
        }
    };

    if args.no_schema
    {   session = session.apply(SessionInput::SkipSchema)?;
    } else if args.light_schema
    {   session = session.apply(SessionInput::UseLightSchema)?;
    } else if !args.categories.is_empty()
    {   session = session.apply(SessionInput::BuildSchema
        {   categories: args.categories
              .iter()
              .map(String::as_str)
              .map(category_spec)
              .collect()
        })?;
    } else if let Some(path) = &args.schema_file
    {   session = session.apply(SessionInput::SetSchemaJson
        {   json: read_file(path)?
          , variant: framework.map(|f| f.variant)
              .unwrap_or(ResultVariant::Generic)
        })?;
    } else if framework.is_none()
    {   session = session.apply(SessionInput::SkipSchema)?;
    }

    let text = match (&args.text_file, framework)
    {   (Some(path), _) => read_file(path)?
      , (None, Some(f)) if args.example => f.example_text.to_string()
      , _ => {
          return Err(Error::InvalidRequest(
            "pass --text-file, or --example with --framework".to_string()
          ));
        }
    };
    session = session.apply(SessionInput::SetText { text })?;

    let client = GeminiClient::new(config.api_key.clone(), &config.client)?;
    let analyzer = Analyzer::new(client);
    let request = session.analysis_request()?;
    let result = analyzer.analyze(&request).await?;
    info!(
      "Analysis finished as {}"
    , result.response_mode().label()
    );
    session = session.apply(SessionInput::RecordResult(Box::new(result)))?;

    let result = session.latest_result().ok_or_else(|| {
      Error::Export("no result recorded".to_string())
    })?;
    let report = markdown_report(result);

    if let Some(path) = &args.json_out
    {   write_file(path, &result.to_json_pretty()?)?;
    }
    match &args.md_out
    {   Some(path) => write_file(path, &report)?
      , None => println!("{}", report)
    }

    if let Some(path) = &args.reflection_file
    {   session = session.apply(SessionInput::SetReflection
        {   text: read_file(path)?
        })?;
        if let Some(status) = session.reflection_status()
        {   info!("Reflection status: {}", status.label());
        }
        let result = session.latest_result().ok_or_else(|| {
          Error::Export("no result recorded".to_string())
        })?;
        let generated = Local::now().naive_local();
        let reflection = reflection_report(
          session.framework_prompt()
        , result
        , session.reflection()
        , generated
        );
        let dir = args.reflection_dir.clone().unwrap_or_default();
        let out = dir.join(format!("{}.md", reflection_file_stem(generated)));
        write_file(&out, &reflection)?;
    }
    Ok(())
}

fn read_file(path: &PathBuf) -> Result<String, Error>
{   std::fs::read_to_string(path).map_err(|e| {
      error!("Cannot read {}: {}", path.display(), e);
      Error::InvalidRequest(format!("cannot read {}: {}", path.display(), e))
    })
}

fn write_file(path: &PathBuf, contents: &str) -> Result<(), Error>
{   std::fs::write(path, contents).map_err(|e| {
      error!("Cannot write {}: {}", path.display(), e);
      Error::Export(format!("cannot write {}: {}", path.display(), e))
    })?;
    info!("Wrote {}", path.display());
    Ok(())
}
