use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the artifact-collector tool.
///
/// The binary works on artifact definitions only: it validates them,
/// resolves collection plans and writes configuration files. Running the
/// queries needs a query engine supplied by the embedding application.
#[derive(Parser, Debug)]
#[clap(
    name = "artifact-collector",
    about = "Validate artifact definitions and plan collections"
)]
pub struct Args {
    /// Verbose logging
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse artifact definition files and report errors
    Validate {
        /// Definition files or directories of *.yaml files
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },

    /// Resolve artifacts and arguments without executing anything
    Plan(PlanOpts),

    /// Write a default collector configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = "collector.yaml")]
        path: PathBuf,
    },
}

/// Options for the plan subcommand.
#[derive(ClapArgs, Debug)]
pub struct PlanOpts {
    /// Definition file or directory holding the base artifacts
    #[clap(short, long)]
    pub definitions: Option<PathBuf>,

    /// Artifact to collect; repeat for several, order is kept
    #[clap(short, long = "artifact", required = true)]
    pub artifacts: Vec<String>,

    /// Argument in the form ARTIFACT:PARAM=VALUE
    #[clap(long = "arg", value_parser = parse_artifact_arg)]
    pub args: Vec<ArtifactArg>,

    /// Definition file registered for this plan only
    #[clap(long)]
    pub inline: Vec<PathBuf>,

    /// Path to collector configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Archive path the plan is made for
    #[clap(short, long, default_value = "collection.zip")]
    pub output: PathBuf,
}

/// One `--arg` value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactArg {
    pub artifact: String,
    pub parameter: String,
    pub value: String,
}

/// Parses `ARTIFACT:PARAM=VALUE`. The artifact name may itself contain
/// colons, so the split happens on the last colon before the `=`.
pub fn parse_artifact_arg(text: &str) -> Result<ArtifactArg, String> {
    let (target, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected ARTIFACT:PARAM=VALUE, got {:?}", text))?;
    let (artifact, parameter) = target
        .rsplit_once(':')
        .ok_or_else(|| format!("missing artifact name in {:?}", text))?;
    if artifact.is_empty() || parameter.is_empty() {
        return Err(format!("empty artifact or parameter name in {:?}", text));
    }
    Ok(ArtifactArg {
        artifact: artifact.to_string(),
        parameter: parameter.to_string(),
        value: value.to_string(),
    })
}
