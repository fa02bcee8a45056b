//! dayflow command-line entry point.
//!
//! Usage:
//!   dayflow context [mode] [message]   print the reasoning context as JSON
//!   dayflow apply [file|-]             execute a JSON array of actions
//!   dayflow plan [--mood <mood>] [message]
//!   dayflow check-in [--skip | message]
//!
//! Reads ~/.dayflow/config.json and persists to `<workspace>/state.json`.

use std::io::Read;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use serde_json::Value;

use dayflow_lib::checkin::CheckInSession;
use dayflow_lib::context::build_context;
use dayflow_lib::executor::{ExecutionSummary, Executor};
use dayflow_lib::gateway::{HttpGateway, ReasoningGateway, ReasoningMode};
use dayflow_lib::helpers::WallClock;
use dayflow_lib::state::{initialize_workspace, load_config, workspace_dir};
use dayflow_lib::store::{AppStore, PlannerStore};
use dayflow_lib::types::Config;
use dayflow_lib::workflow::today::{DayPlanner, GenerationOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        bail!("Usage: dayflow <context|apply|plan|check-in> [args]");
    };

    let config = load_config().map_err(|e| anyhow!("Failed to load dayflow config: {e}"))?;
    let workspace = workspace_dir(&config).map_err(|e| anyhow!("{e}"))?;
    initialize_workspace(&workspace).map_err(|e| anyhow!("{e}"))?;
    let store: Arc<dyn PlannerStore> = Arc::new(
        AppStore::open(&workspace)
            .with_context(|| format!("Failed to open state in {}", workspace.display()))?,
    );
    log::info!("dayflow using workspace {}", workspace.display());

    match command.as_str() {
        "context" => print_context(store.as_ref(), &config, rest),
        "apply" => apply_actions(store.as_ref(), &config, rest),
        "plan" => generate_plan(store, config, rest).await,
        "check-in" => run_check_in(store, config, rest).await,
        other => bail!("Unknown command: {other}"),
    }
}

fn print_context(store: &dyn PlannerStore, config: &Config, args: &[String]) -> anyhow::Result<()> {
    let mode = match args.first() {
        Some(raw) => serde_json::from_value::<ReasoningMode>(Value::String(raw.clone()))
            .map_err(|_| anyhow!("Unknown reasoning mode: {raw}"))?,
        None => ReasoningMode::Chat,
    };
    let message = args.get(1).map(String::as_str);
    let payload = build_context(&store.snapshot(), mode, message, WallClock::now(), config);
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn apply_actions(store: &dyn PlannerStore, config: &Config, args: &[String]) -> anyhow::Result<()> {
    let raw = match args.first().map(String::as_str) {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?,
    };
    let actions: Vec<Value> = serde_json::from_str(&raw).context("Actions must be a JSON array")?;
    let summary = Executor::new(store, config).execute_raw(&actions, WallClock::now());
    print_summary(&summary);
    Ok(())
}

fn gateway(config: &Config) -> anyhow::Result<Arc<dyn ReasoningGateway>> {
    Ok(Arc::new(HttpGateway::from_config(&config.gateway)?))
}

async fn generate_plan(store: Arc<dyn PlannerStore>, config: Config, args: &[String]) -> anyhow::Result<()> {
    let mut mood = None;
    let mut message = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--mood" {
            mood = Some(iter.next().cloned().ok_or_else(|| anyhow!("--mood needs a value"))?);
        } else {
            message.push(arg.as_str());
        }
    }
    let message = (!message.is_empty()).then(|| message.join(" "));

    let planner = DayPlanner::new(store, gateway(&config)?, config);
    match planner.generate_plan(mood, message).await? {
        GenerationOutcome::Generated { date, items, actions } => {
            println!("Saved plan for {date} with {items} items");
            print_summary(&actions);
        }
        GenerationOutcome::Empty { actions } => {
            println!("Nothing to plan; kept the existing plan");
            print_summary(&actions);
        }
        GenerationOutcome::Coalesced => println!("A plan generation is already running"),
    }
    Ok(())
}

async fn run_check_in(store: Arc<dyn PlannerStore>, config: Config, args: &[String]) -> anyhow::Result<()> {
    let gateway = gateway(&config)?;
    let planner = Arc::new(DayPlanner::new(Arc::clone(&store), Arc::clone(&gateway), config.clone()));
    let mut session = CheckInSession::new(store, gateway, Some(planner), config);

    let clock = WallClock::now();
    let Some(check_in_type) = session.poll_due(clock)? else {
        println!("No check-in due right now");
        return Ok(());
    };
    let greeting = session.activate(clock)?.greeting.clone();
    println!("[{}] {greeting}", check_in_type.as_str());

    if args.first().map(String::as_str) == Some("--skip") {
        session.skip(clock)?;
        println!("Skipped");
        return session.dismiss().map_err(Into::into);
    }
    if args.is_empty() {
        bail!("Pass a reply, or --skip");
    }

    let outcome = session.submit(&args.join(" "), clock).await?;
    println!("{}", outcome.reply);
    print_summary(&outcome.actions);
    if let Some(GenerationOutcome::Generated { items, .. }) = outcome.plan {
        println!("Plan regenerated with {items} items");
    }
    session.dismiss()?;
    Ok(())
}

fn print_summary(summary: &ExecutionSummary) {
    if summary.applied + summary.no_ops + summary.malformed == 0 {
        return;
    }
    println!(
        "Actions: {} applied, {} no-op, {} malformed (wrote {})",
        summary.applied,
        summary.no_ops,
        summary.malformed,
        if summary.slices_written.is_empty() {
            "nothing".to_string()
        } else {
            summary.slices_written.join(", ")
        }
    );
}
