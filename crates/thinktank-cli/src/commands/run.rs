//! `thinktank run` -- send one prompt to many models at once.
//!
//! Targets come from `--model` references, else from the enabled models of
//! `--group`, else from every enabled top-level model in the config. All
//! calls run concurrently and results print in target order.
//!
//! # Examples
//!
//! ```text
//! thinktank run "Explain lifetimes" --model openai:gpt-4o --model google:gemini-2.0-flash
//! thinktank run @question.md --group review --temperature 0.2
//! ```

use std::path::Path;

use clap::Args;
use futures_util::future::join_all;
use tracing::{debug, info};

use thinktank_llm::{CallContext, ProviderRegistry, resolve_system_prompt};
use thinktank_types::{
    AppConfig, GroupInfo, LlmResponse, ModelConfig, ModelGroup, ModelOptions, Result, SystemPrompt,
    ThinktankError, parse_model_ref,
};

/// Arguments for `thinktank run`.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Prompt text, or `@path` to read the prompt from a file.
    pub prompt: String,

    /// Model to query as `provider:modelId`. Repeatable.
    #[arg(short, long = "model", value_name = "PROVIDER:MODEL")]
    pub models: Vec<String>,

    /// Model group to use (its models, system prompt and options).
    #[arg(short, long)]
    pub group: Option<String>,

    /// System prompt overriding model and group prompts.
    #[arg(short, long)]
    pub system: Option<String>,

    /// Sampling temperature for every model.
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Maximum output tokens for every model.
    #[arg(long)]
    pub max_tokens: Option<u64>,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,
}

/// One model to call, with the group it is invoked through.
#[derive(Debug, Clone)]
pub struct Target {
    pub model: ModelConfig,
    pub group: Option<ModelGroup>,
}

/// The result of one model call.
#[derive(Debug)]
pub struct Outcome {
    pub model_ref: String,
    pub result: Result<LlmResponse>,
}

/// Run the `run` command.
pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    let registry = super::build_registry(&config);

    let prompt = read_prompt(&args.prompt)?;
    let targets = resolve_targets(&args, &config)?;
    let options = cli_options(&args)?;
    let system = args.system.as_deref().map(SystemPrompt::new);

    info!(models = targets.len(), "dispatching prompt");
    let outcomes = dispatch(&registry, &prompt, &targets, &options, system.as_ref()).await;

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    for outcome in &outcomes {
        match &outcome.result {
            Ok(_) => println!("{}", render(outcome)),
            Err(_) => eprintln!("{}", render(outcome)),
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} model calls failed", outcomes.len());
    }
    Ok(())
}

/// The prompt text; `@path` reads it from a file.
pub fn read_prompt(raw: &str) -> Result<String> {
    let text = match raw.strip_prefix('@') {
        Some(file) => {
            let path = Path::new(file);
            std::fs::read_to_string(path).map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => ThinktankError::permission(format!(
                    "permission denied reading prompt file {}",
                    path.display()
                ))
                .with_cause(e),
                _ => ThinktankError::file_system(format!(
                    "could not read prompt file {}: {e}",
                    path.display()
                ))
                .with_file_path(path)
                .with_cause(e)
                .with_suggestion("Check the path after '@'"),
            })?
        }
        None => raw.to_string(),
    };

    if text.trim().is_empty() {
        return Err(ThinktankError::input("the prompt is empty")
            .with_suggestion("Pass the prompt as an argument or as @file")
            .with_examples(["thinktank run \"Summarize this design\" --model openai:gpt-4o"]));
    }
    Ok(text)
}

/// Work out which models to call.
pub fn resolve_targets(args: &RunArgs, config: &AppConfig) -> Result<Vec<Target>> {
    let targets: Vec<Target> = if !args.models.is_empty() {
        args.models
            .iter()
            .map(|reference| -> Result<Target> {
                let (provider, model_id) = parse_model_ref(reference)?;
                let model = config
                    .find_model(&provider, &model_id)
                    .cloned()
                    .unwrap_or_else(|| ModelConfig::new(provider, model_id));
                let group = config
                    .find_model_group(&model, args.group.as_deref())?
                    .cloned();
                Ok(Target { model, group })
            })
            .collect::<Result<_>>()?
    } else if let Some(name) = args.group.as_deref() {
        let group = config.group(name).ok_or_else(|| {
            ThinktankError::config(format!("group '{name}' is not defined"))
                .with_suggestion("Check the name against the `groups` section of your config")
                .with_examples(config.groups.keys().cloned())
        })?;
        group
            .enabled_models()
            .map(|model| Target {
                model: model.clone(),
                group: Some(group.clone()),
            })
            .collect()
    } else {
        config
            .enabled_models()
            .map(|model| -> Result<Target> {
                let group = config.find_model_group(model, None)?.cloned();
                Ok(Target {
                    model: model.clone(),
                    group,
                })
            })
            .collect::<Result<_>>()?
    };

    if targets.is_empty() {
        return Err(ThinktankError::input("no models to query")
            .with_suggestion("Name models with --model provider:modelId")
            .with_suggestion("Or enable models in your config file, or pick a --group")
            .with_examples([
                "thinktank run \"hello\" --model openai:gpt-4o",
                "thinktank run \"hello\" --group review",
            ]));
    }
    Ok(targets)
}

/// Options given on the command line.
pub fn cli_options(args: &RunArgs) -> Result<ModelOptions> {
    let mut options = ModelOptions::new();
    if let Some(t) = args.temperature {
        if !t.is_finite() || t < 0.0 {
            return Err(ThinktankError::validation(format!(
                "temperature must be a non-negative number, got {t}"
            ))
            .with_suggestion("Most providers accept values between 0 and 2"));
        }
        options.insert("temperature", t);
    }
    if let Some(max) = args.max_tokens {
        options.insert("maxTokens", max);
    }
    Ok(options)
}

/// Call every target concurrently. Results keep target order.
pub async fn dispatch(
    registry: &ProviderRegistry,
    prompt: &str,
    targets: &[Target],
    cli_options: &ModelOptions,
    system_override: Option<&SystemPrompt>,
) -> Vec<Outcome> {
    let calls = targets.iter().map(|target| async move {
        let model = &target.model;
        let group = target.group.as_ref();
        let system = resolve_system_prompt(
            system_override,
            model.system_prompt.as_ref(),
            group.map(|g| &g.system_prompt),
        );
        debug!(model = %model.model_ref(), group = group.map(|g| g.name.as_str()), "calling model");

        let result = registry
            .call_provider(
                &model.provider,
                &model.model_id,
                prompt,
                CallContext {
                    model_config: Some(model),
                    group_options: group.and_then(|g| g.options.as_ref()),
                    cli_options: Some(cli_options),
                    system_prompt: system,
                },
            )
            .await
            .map(|mut response| {
                response.group_info = group.map(|g| GroupInfo {
                    name: g.name.clone(),
                    system_prompt: g.system_prompt.clone(),
                });
                response
            });

        Outcome {
            model_ref: model.model_ref(),
            result,
        }
    });
    join_all(calls).await
}

/// Header plus either the text or the formatted error.
pub fn render(outcome: &Outcome) -> String {
    match &outcome.result {
        Ok(response) => {
            let header = match &response.group_info {
                Some(group) => format!("=== {} (group: {}) ===", outcome.model_ref, group.name),
                None => format!("=== {} ===", outcome.model_ref),
            };
            format!("{header}\n{}\n", response.text)
        }
        Err(err) => format!("=== {} (failed) ===\n{}\n", outcome.model_ref, err.format()),
    }
}
