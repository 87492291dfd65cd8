// Re-export all items from the submodules
mod artifact_definition;
mod collector_config;

// Re-export artifact definitions
pub use artifact_definition::{ArtifactDefinition, ParameterSpec, ParameterType, Report, Source};

// Re-export collector config
pub use collector_config::{load_or_default, ChoicePolicy, CollectorConfig, RowFormat};
