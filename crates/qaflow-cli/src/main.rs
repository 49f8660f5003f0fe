//! CLI binary for selecting, validating and running QA workflow steps.

mod args;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_stream::StreamExt;

use qaflow_client::{HttpProcessService, ServiceConfig};
use qaflow_pipeline::{
    reduce, validate, validate_or_raise, Action, Catalog, ExecutorConfig, FileStore, FileUpload,
    PipelineEvent, PipelineExecutor, RunReport, SessionState,
};
use qaflow_types::{RunStatus, StepId};

use crate::args::{FileSpec, PromptSpec};

#[derive(Parser)]
#[command(name = "qaflow", version, about = "QA workflow pipeline runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Step catalog JSON file (default: built-in QA workflow)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the steps of the catalog
    Steps,

    /// Toggle steps in order and print the resulting selection
    Select {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Print the selection as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report selected steps that lack a required input file
    Validate {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        inputs: InputArgs,

        /// Exit with an error when any input is missing
        #[arg(long)]
        strict: bool,
    },

    /// Run the selected steps in order, stopping at the first failure
    Run {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        inputs: InputArgs,

        #[command(flatten)]
        service: ServiceArgs,

        /// Refuse to run when any input is missing
        #[arg(long)]
        strict: bool,
    },

    /// Run a single step
    RunStep {
        /// Step id
        step: StepId,

        #[command(flatten)]
        inputs: InputArgs,

        #[command(flatten)]
        service: ServiceArgs,
    },
}

#[derive(Args)]
struct SelectionArgs {
    /// Step ids, toggled in the order given
    #[arg(required = true)]
    steps: Vec<StepId>,

    /// Do not add or remove pivot steps automatically
    #[arg(long)]
    no_automation: bool,
}

#[derive(Args)]
struct InputArgs {
    /// Input file as <kind>=<path>[@step,step]
    #[arg(long = "file", value_name = "SPEC")]
    files: Vec<FileSpec>,

    /// Custom instructions as <step>=<text>
    #[arg(long = "prompt", value_name = "SPEC")]
    prompts: Vec<PromptSpec>,
}

#[derive(Args)]
struct ServiceArgs {
    /// Process service base URL (overrides QAFLOW_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Request timeout in seconds (overrides QAFLOW_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Pause between successful steps, in milliseconds
    #[arg(long, default_value = "500")]
    pacing_ms: u64,

    /// Send requirement analysis to the process service
    #[arg(long)]
    remote_analysis: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let catalog = Arc::new(load_catalog(cli.catalog.as_deref())?);

    match cli.command {
        Commands::Steps => cmd_steps(&catalog),
        Commands::Select { selection, json } => cmd_select(&catalog, &selection, json)?,
        Commands::Validate {
            selection,
            inputs,
            strict,
        } => cmd_validate(&catalog, &selection, &inputs, strict)?,
        Commands::Run {
            selection,
            inputs,
            service,
            strict,
        } => {
            let report = cmd_run(catalog, &selection, &inputs, &service, strict).await?;
            if !report.succeeded() {
                std::process::exit(1);
            }
        }
        Commands::RunStep {
            step,
            inputs,
            service,
        } => {
            let report = cmd_run_step(catalog, &step, &inputs, &service).await?;
            if !report.succeeded() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn load_catalog(path: Option<&Path>) -> anyhow::Result<Catalog> {
    match path {
        Some(path) => Ok(Catalog::load(path)?),
        None => Ok(Catalog::builtin()),
    }
}

/// Build the session the way an interactive front end would: automation
/// flag first, then one toggle per id, then prompts.
fn build_session(
    catalog: &Catalog,
    selection: &SelectionArgs,
    prompts: &[PromptSpec],
) -> anyhow::Result<SessionState> {
    let mut session = reduce(
        &SessionState::default(),
        Action::SetAutomation(!selection.no_automation),
        catalog,
    )?;
    for step in &selection.steps {
        session = reduce(&session, Action::Toggle(step.clone()), catalog)?;
    }
    for prompt in prompts {
        session = reduce(
            &session,
            Action::SetPrompt {
                step_id: prompt.step_id.clone(),
                prompt: prompt.text.clone(),
            },
            catalog,
        )?;
    }
    Ok(session)
}

/// Load every `--file` into a centralized store bound to its target steps.
fn load_files(
    files: &[FileSpec],
    selected: &[StepId],
    catalog: &Catalog,
) -> anyhow::Result<FileStore> {
    let mut store = FileStore::new();
    for spec in files {
        let targets = spec.targets(selected, catalog)?;
        let file = spec
            .load()
            .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", spec.path.display()))?;
        let ids = store.upload(FileUpload::Centralized { files: vec![file] });
        for id in ids {
            store.bind(&id, targets.clone())?;
        }
    }
    Ok(store)
}

fn build_executor(catalog: Arc<Catalog>, args: &ServiceArgs) -> anyhow::Result<PipelineExecutor> {
    let mut config = ServiceConfig::from_env();
    if let Some(url) = &args.api_url {
        config = config.with_base_url(url.clone());
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    tracing::debug!(base_url = %config.base_url, timeout = ?config.timeout, "Process service configured");

    let service = Arc::new(HttpProcessService::new(config)?);
    let executor_config = ExecutorConfig {
        pacing: Duration::from_millis(args.pacing_ms),
        remote_requirement_analysis: args.remote_analysis,
    };
    Ok(PipelineExecutor::with_service(catalog, service, executor_config))
}

fn cmd_steps(catalog: &Catalog) {
    println!("Steps:");
    for step in catalog.steps() {
        let inputs: Vec<&str> = step.required_inputs.iter().map(|k| k.as_str()).collect();
        let pivot = if qaflow_pipeline::is_pivot(&step.id) {
            " *"
        } else {
            ""
        };
        println!(
            "  {:>2}. {} [{}]{} inputs: {}",
            step.ordinal,
            step.id,
            step.name,
            pivot,
            if inputs.is_empty() {
                "(none)".to_string()
            } else {
                inputs.join(", ")
            }
        );
    }
    println!("\n* may be added or removed automatically");
}

fn cmd_select(catalog: &Catalog, selection: &SelectionArgs, json: bool) -> anyhow::Result<()> {
    let session = build_session(catalog, selection, &[])?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session.selection)?);
        return Ok(());
    }

    println!("Selection:");
    for (id, origin) in session.selection.iter() {
        println!("  {} ({})", id, origin);
    }
    Ok(())
}

fn cmd_validate(
    catalog: &Catalog,
    selection: &SelectionArgs,
    inputs: &InputArgs,
    strict: bool,
) -> anyhow::Result<()> {
    let session = build_session(catalog, selection, &inputs.prompts)?;
    let order = session.selection.order();
    let store = load_files(&inputs.files, &order, catalog)?;

    if strict {
        validate_or_raise(&order, catalog, &store)?;
    }
    let missing = validate(&order, catalog, &store)?;
    if missing.is_empty() {
        println!("All required inputs are present");
        return Ok(());
    }
    for entry in &missing {
        let kinds: Vec<&str> = entry.missing_inputs.iter().map(|k| k.as_str()).collect();
        println!("[WARN] {}: missing {}", entry.step_name, kinds.join(", "));
    }
    Ok(())
}

async fn cmd_run(
    catalog: Arc<Catalog>,
    selection: &SelectionArgs,
    inputs: &InputArgs,
    service: &ServiceArgs,
    strict: bool,
) -> anyhow::Result<RunReport> {
    let session = build_session(&catalog, selection, &inputs.prompts)?;
    let order = session.selection.order();
    let store = load_files(&inputs.files, &order, &catalog)?;

    if strict {
        validate_or_raise(&order, &catalog, &store)?;
    } else {
        for entry in validate(&order, &catalog, &store)? {
            let kinds: Vec<&str> = entry.missing_inputs.iter().map(|k| k.as_str()).collect();
            tracing::warn!(step = %entry.step_id, missing = %kinds.join(", "), "Running without required inputs");
        }
    }

    println!("Running steps: {}", order.join(" -> "));
    let executor = build_executor(catalog.clone(), service)?;
    let prompts = session.prompt_map();
    let observer = spawn_observer(&executor, session, catalog);

    let report = executor.run_with_prompts(&order, &store, &prompts).await?;
    drop(executor);
    let session = observer.await?;
    print_summary(&report, &session);
    Ok(report)
}

async fn cmd_run_step(
    catalog: Arc<Catalog>,
    step: &str,
    inputs: &InputArgs,
    service: &ServiceArgs,
) -> anyhow::Result<RunReport> {
    catalog.require(step)?;
    let targets = vec![step.to_string()];
    let store = load_files(&inputs.files, &targets, &catalog)?;
    let prompt = inputs
        .prompts
        .iter()
        .rev()
        .find(|p| p.step_id == step)
        .map(|p| p.text.as_str());

    let executor = build_executor(catalog.clone(), service)?;
    let observer = spawn_observer(&executor, SessionState::default(), catalog);

    let report = executor.run_step(step, &store, prompt).await?;
    drop(executor);
    let session = observer.await?;
    print_summary(&report, &session);
    Ok(report)
}

/// Follow run events, print progress and fold them into the session.
///
/// The task ends once the executor, and with it the event sender, is dropped.
fn spawn_observer(
    executor: &PipelineExecutor,
    session: SessionState,
    catalog: Arc<Catalog>,
) -> tokio::task::JoinHandle<SessionState> {
    let mut events = Box::pin(executor.events().stream());
    tokio::spawn(async move {
        let mut session = session;
        while let Some(event) = events.next().await {
            match &event {
                PipelineEvent::StepStarted { step_id } => println!("  ... {step_id}"),
                PipelineEvent::StepCompleted {
                    step_id,
                    duration_ms,
                    ..
                } => println!("  ok  {step_id} ({duration_ms}ms)"),
                PipelineEvent::StepFailed { step_id, error, .. } => {
                    println!("  ERR {step_id}: {error}")
                }
                PipelineEvent::RunAborted { not_attempted, .. } if !not_attempted.is_empty() => {
                    println!("  skipped: {}", not_attempted.join(", "))
                }
                _ => {}
            }
            if let Some(action) = Action::from_event(&event) {
                match reduce(&session, action, &catalog) {
                    Ok(next) => session = next,
                    Err(e) => tracing::warn!(error = %e, "Ignoring run event"),
                }
            }
        }
        session
    })
}

fn print_summary(report: &RunReport, session: &SessionState) {
    println!("\nStatus:");
    for (id, status) in session.run_status.iter() {
        let marker = match status {
            RunStatus::Completed => "ok",
            RunStatus::Error => "ERR",
            RunStatus::Running => "...",
            RunStatus::Pending => "-",
        };
        println!("  [{marker:>3}] {id}");
    }

    if let Some(output) = &session.output {
        println!("\nOutput of {} ({}):\n", output.process_type, output.status);
        println!("{}", output.content);
    }

    if report.succeeded() {
        println!("\nPipeline completed in {}ms", report.duration_ms);
    } else if let Some(step) = &report.failed_step {
        println!("\nPipeline stopped at {step}");
    }
}
