use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use artifact_collector::cli::{Args, Commands, PlanOpts};
use artifact_collector::collectors::flow::{RandomFlowIds, SystemClock};
use artifact_collector::collectors::planner::CollectionPlanner;
use artifact_collector::config::{load_or_default, ArtifactDefinition, CollectorConfig};
use artifact_collector::models::CollectionRequest;
use artifact_collector::registry::Repository;

fn main() -> Result<()> {
    let args = Args::parse();
    initialize_logging(args.verbose)?;

    match args.command {
        Commands::Validate { files } => validate(&files),
        Commands::Plan(opts) => plan(&opts),
        Commands::InitConfig { path } => {
            info!("Creating default collector configuration at {}", path.display());
            CollectorConfig::default().save_to_yaml_file(&path)?;
            Ok(())
        }
    }
}

/// Initialize logging with the appropriate level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;
    Ok(())
}

/// Parses every definition file and reports each failure.
fn validate(files: &[PathBuf]) -> Result<()> {
    let mut failures = 0;
    let mut definitions = 0;
    for path in files {
        if path.is_dir() {
            let mut repository = Repository::new();
            match repository.load_directory(path) {
                Ok(count) => definitions += count,
                Err(e) => {
                    error!("{}: {:#}", path.display(), e);
                    failures += 1;
                }
            }
            continue;
        }

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                error!("{}: {}", path.display(), e);
                failures += 1;
                continue;
            }
        };
        match ArtifactDefinition::parse_many(&text) {
            Ok(parsed) => {
                for definition in &parsed {
                    info!("{}: {} ok", path.display(), definition.name);
                }
                definitions += parsed.len();
            }
            Err(e) => {
                error!("{}: {}", path.display(), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} inputs failed validation", failures, files.len());
    }
    info!("{} definitions valid", definitions);
    Ok(())
}

/// Resolves a collection and prints the plan as JSON.
fn plan(opts: &PlanOpts) -> Result<()> {
    let config = load_or_default(opts.config.as_deref())?;

    let mut repository = Repository::new();
    if let Some(path) = &opts.definitions {
        let count = repository.load_path(path)?;
        info!("Loaded {} definitions from {}", count, path.display());
    } else {
        warn!("No definitions given; only inline artifacts can be planned");
    }

    let mut request = CollectionRequest::new(&opts.output);
    for path in &opts.inline {
        let text = fs::read_to_string(path)
            .context(format!("Failed to read inline definition: {}", path.display()))?;
        request = request.inline_definition(text);
    }
    for artifact in &opts.artifacts {
        request = request.artifact(artifact.as_str());
    }
    for arg in &opts.args {
        request = request.arg(&arg.artifact, &arg.parameter, arg.value.as_str());
    }

    let plan = CollectionPlanner::new(&repository, &SystemClock, &RandomFlowIds, config.choice_policy)
        .plan(&request)
        .context("Failed to plan collection")?;

    let description = serde_json::to_string_pretty(&plan.describe())
        .context("Failed to serialize plan")?;
    println!("{}", description);
    Ok(())
}
