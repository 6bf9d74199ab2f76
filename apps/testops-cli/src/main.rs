#![allow(clippy::print_stdout, clippy::print_stderr)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::panic))]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgGroup, Args, Parser, Subcommand};
use testops_client::{CopilotHttpClient, CopilotHttpClientConfig};
use testops_core::config::normalize_base_url;
use testops_core::{
    BuiltinEditOutcome, BuiltinScenario, CopilotApi, CopilotConfig, CustomSaveOutcome,
    DefectState, OperationState, PromptLibrary, PromptResolver, PromptSource, PromptStore,
    ScenarioSelection, SubmissionOrchestrator,
};

#[derive(Parser, Debug)]
#[command(name = "testops")]
#[command(about = "Manage TestOps Copilot prompts and submit generation requests")]
struct Cli {
    /// Backend base URL. Overrides TESTOPS_API_BASE_URL.
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Prompt store directory. Overrides TESTOPS_STORE_DIR.
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List built-in scenarios and saved custom scenarios.
    Scenarios,
    /// Print the prompt currently in effect for a scenario.
    Show(ScenarioArgs),
    #[command(subcommand)]
    Custom(CustomCommand),
    #[command(subcommand)]
    Builtin(BuiltinCommand),
    Generate(GenerateArgs),
    Commit(CommitArgs),
    Defects(DefectsArgs),
}

#[derive(Args, Debug)]
struct ScenarioArgs {
    /// Built-in scenario id, or a custom scenario name with --custom.
    id: String,
    #[arg(long)]
    custom: bool,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("text").required(true).args(["prompt", "prompt_file"])))]
struct PromptText {
    #[arg(long)]
    prompt: Option<String>,
    #[arg(long)]
    prompt_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum CustomCommand {
    Save {
        name: String,
        #[command(flatten)]
        text: PromptText,
    },
    Delete {
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum BuiltinCommand {
    /// Save an edited prompt. A blank prompt drops the edit.
    Edit {
        #[arg(value_parser = parse_builtin)]
        id: BuiltinScenario,
        #[command(flatten)]
        text: PromptText,
    },
    /// Drop the edit and print the factory default.
    Reset {
        #[arg(value_parser = parse_builtin)]
        id: BuiltinScenario,
    },
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,
    /// Code to analyze; takes priority over --previous-code-file.
    #[arg(long)]
    pasted_code_file: Option<PathBuf>,
    /// Output of an earlier generation.
    #[arg(long)]
    previous_code_file: Option<PathBuf>,
    /// Repository id or group/project path for optimization.
    #[arg(long)]
    repo_id: Option<String>,
}

#[derive(Args, Debug)]
struct CommitArgs {
    #[arg(long)]
    code_file: PathBuf,
    #[arg(long)]
    repo_id: String,
    #[arg(long)]
    branch: Option<String>,
    #[arg(long)]
    file_path: Option<String>,
    #[arg(long)]
    message: Option<String>,
}

#[derive(Args, Debug)]
struct DefectsArgs {
    #[arg(long)]
    repo_id: String,
    /// Comma-separated issue labels.
    #[arg(long)]
    labels: Option<String>,
    #[arg(long, value_parser = parse_state, default_value = "all")]
    state: DefectState,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    tracing::debug!(
        base_url = %config.api_base_url,
        store_dir = %config.store_dir.display(),
        "configuration resolved"
    );
    let library = PromptLibrary::load(PromptStore::file(config.store_dir.clone()));
    let client = CopilotHttpClient::new(CopilotHttpClientConfig::from(&config))?;
    let api = CopilotApi::new(Arc::new(client));

    match cli.command {
        Commands::Scenarios => {
            list_scenarios(&library);
            Ok(())
        }
        Commands::Show(args) => show_prompt(&library, api, &args).await,
        Commands::Custom(command) => run_custom(library, command),
        Commands::Builtin(command) => run_builtin(library, api, command).await,
        Commands::Generate(args) => run_generate(library, api, args).await,
        Commands::Commit(args) => run_commit(library, api, args).await,
        Commands::Defects(args) => run_defects(library, api, args).await,
    }
}

fn resolve_config(cli: &Cli) -> Result<CopilotConfig> {
    let mut config = CopilotConfig::from_env()?;
    if let Some(base_url) = cli.base_url.as_deref() {
        config.api_base_url = normalize_base_url(base_url)?;
    }
    if let Some(store_dir) = cli.store_dir.clone() {
        config.store_dir = store_dir;
    }
    Ok(config)
}

fn list_scenarios(library: &PromptLibrary) {
    println!("Built-in scenarios:");
    for scenario in BuiltinScenario::ALL {
        let edited = if library.override_for(scenario).is_some() {
            " [edited]"
        } else {
            ""
        };
        println!("  {:<11} {}{edited}", scenario.as_str(), scenario.label());
    }
    println!("Custom scenarios:");
    if library.custom_scenarios().is_empty() {
        println!("  (none)");
    }
    for entry in library.custom_scenarios() {
        println!("  {}", entry.name);
    }
}

async fn show_prompt(library: &PromptLibrary, api: CopilotApi, args: &ScenarioArgs) -> Result<()> {
    let selection = selection_from(&args.id, args.custom)?;
    let resolved = PromptResolver::new(api)
        .resolve_effective_prompt(library, &selection)
        .await;
    let source = match resolved.source {
        PromptSource::Custom => "custom",
        PromptSource::Override => "edited",
        PromptSource::FactoryDefault => "factory default",
        PromptSource::Unresolved => bail!("custom scenario '{}' does not exist", args.id),
    };
    println!("# {} ({source})", resolved.label);
    println!("{}", resolved.text);
    Ok(())
}

fn run_custom(mut library: PromptLibrary, command: CustomCommand) -> Result<()> {
    match command {
        CustomCommand::Save { name, text } => {
            let prompt = text.load()?;
            let verb = match library.save_custom(&name, &prompt)? {
                CustomSaveOutcome::Created => "Created",
                CustomSaveOutcome::Replaced => "Replaced",
            };
            println!("{verb} custom scenario '{}'", name.trim());
        }
        CustomCommand::Delete { name } => {
            if !library.delete_custom(&name)? {
                bail!("custom scenario '{name}' does not exist");
            }
            println!("Deleted custom scenario '{name}'");
        }
    }
    Ok(())
}

async fn run_builtin(
    mut library: PromptLibrary,
    api: CopilotApi,
    command: BuiltinCommand,
) -> Result<()> {
    match command {
        BuiltinCommand::Edit { id, text } => {
            let prompt = text.load()?;
            match library.save_builtin_edit(id, &prompt)? {
                BuiltinEditOutcome::Saved => println!("Saved edited prompt for {id}"),
                BuiltinEditOutcome::Reset => {
                    println!("Prompt was blank; {id} uses the factory default");
                }
            }
        }
        BuiltinCommand::Reset { id } => {
            let text = PromptResolver::new(api)
                .reset_to_factory_default(&mut library, &ScenarioSelection::Builtin(id))
                .await?;
            println!("{text}");
        }
    }
    Ok(())
}

async fn run_generate(library: PromptLibrary, api: CopilotApi, args: GenerateArgs) -> Result<()> {
    let mut orchestrator = SubmissionOrchestrator::new(library, api);
    orchestrator.select(selection_from(&args.scenario.id, args.scenario.custom)?);
    if let Some(path) = args.previous_code_file.as_deref() {
        orchestrator.remember_generated_code(read_text(path)?);
    }
    if let Some(path) = args.pasted_code_file.as_deref() {
        orchestrator.set_pasted_code(Some(read_text(path)?))?;
    }
    if let Some(repo_id) = args.repo_id {
        orchestrator.set_analysis_repo(repo_id);
    }

    orchestrator.generate().await?;
    let outcome = settled(orchestrator.generation())?;
    println!("{}", outcome.code);
    if let Some(metrics) = &outcome.metrics {
        eprintln!(
            "duration_s={} memory_mb={} per_case_s={}",
            format_metric(metrics.duration_s),
            format_metric(metrics.memory_mb),
            format_metric(metrics.per_case_s)
        );
    }
    if let Some(validation) = outcome
        .validation
        .as_ref()
        .filter(|validation| !validation.valid)
    {
        for issue in &validation.issues {
            eprintln!("validation: {issue}");
        }
    }
    Ok(())
}

async fn run_commit(library: PromptLibrary, api: CopilotApi, args: CommitArgs) -> Result<()> {
    let mut orchestrator = SubmissionOrchestrator::new(library, api);
    orchestrator.remember_generated_code(read_text(&args.code_file)?);
    orchestrator.open_commit_dialog();
    let draft = orchestrator.commit_draft_mut();
    draft.repo_id = args.repo_id;
    if let Some(branch) = args.branch {
        draft.branch = branch;
    }
    if let Some(file_path) = args.file_path {
        draft.file_path = file_path;
    }
    if let Some(message) = args.message {
        draft.commit_message = message;
    }

    orchestrator.commit().await?;
    let outcome = settled(orchestrator.commit_state())?;
    println!(
        "Committed {}",
        outcome.commit_sha.as_deref().unwrap_or("(no sha returned)")
    );
    if let Some(message) = &outcome.message {
        println!("{message}");
    }
    Ok(())
}

async fn run_defects(library: PromptLibrary, api: CopilotApi, args: DefectsArgs) -> Result<()> {
    let mut orchestrator = SubmissionOrchestrator::new(library, api);
    orchestrator.set_analysis_repo(args.repo_id);
    let draft = orchestrator.defects_draft_mut();
    if let Some(labels) = args.labels {
        draft.labels = labels;
    }
    draft.state = args.state;

    orchestrator.analyze_defects().await?;
    let outcome = settled(orchestrator.defects())?;
    println!("{}", outcome.summary);
    if let Some(count) = outcome.count {
        println!("Defects found: {count}");
    }
    if let Some(recommendations) = &outcome.recommendations {
        println!();
        println!("{recommendations}");
    }
    Ok(())
}

impl PromptText {
    fn load(&self) -> Result<String> {
        match (&self.prompt, &self.prompt_file) {
            (Some(prompt), _) => Ok(prompt.clone()),
            (None, Some(path)) => read_text(path),
            (None, None) => Err(anyhow!("either --prompt or --prompt-file is required")),
        }
    }
}

fn selection_from(id: &str, custom: bool) -> Result<ScenarioSelection> {
    if custom {
        let name = id.trim();
        if name.is_empty() {
            bail!("custom scenario name must not be empty");
        }
        return Ok(ScenarioSelection::Custom(name.to_string()));
    }
    Ok(ScenarioSelection::Builtin(id.parse()?))
}

fn settled<T>(state: &OperationState<T>) -> Result<&T> {
    if let Some(error) = state.error() {
        bail!("{error}");
    }
    state
        .result()
        .ok_or_else(|| anyhow!("backend returned no result"))
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn format_metric(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |value| format!("{value:.2}"))
}

fn parse_builtin(raw: &str) -> Result<BuiltinScenario, String> {
    raw.parse()
        .map_err(|error: testops_core::scenario::ScenarioParseError| error.to_string())
}

fn parse_state(raw: &str) -> Result<DefectState, String> {
    DefectState::parse(raw)
        .ok_or_else(|| format!("unknown state '{raw}' (all, opened, closed)"))
}
