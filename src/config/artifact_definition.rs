use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::RESULT_ENTRY_EXTENSION;
use crate::errors::ParseError;
use crate::security::is_safe_entry_path;

/// Declared type of an artifact parameter.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    Bool,
    Choices,
    Timestamp,
    Int,
    Float,
    Csv,
    JsonArray,
    #[default]
    String,
}

impl FromStr for ParameterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bool" => Ok(ParameterType::Bool),
            "choices" => Ok(ParameterType::Choices),
            "timestamp" => Ok(ParameterType::Timestamp),
            "int" => Ok(ParameterType::Int),
            "float" => Ok(ParameterType::Float),
            "csv" => Ok(ParameterType::Csv),
            "json_array" => Ok(ParameterType::JsonArray),
            "string" | "" => Ok(ParameterType::String),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterType::Bool => write!(f, "bool"),
            ParameterType::Choices => write!(f, "choices"),
            ParameterType::Timestamp => write!(f, "timestamp"),
            ParameterType::Int => write!(f, "int"),
            ParameterType::Float => write!(f, "float"),
            ParameterType::Csv => write!(f, "csv"),
            ParameterType::JsonArray => write!(f, "json_array"),
            ParameterType::String => write!(f, "string"),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Source {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precondition: Option<String>,
}

impl Source {
    /// Fully qualified source name: `Artifact/Source`, or just the artifact
    /// name for an unnamed source.
    pub fn full_name(&self, artifact: &str) -> String {
        match &self.name {
            Some(name) => format!("{}/{}", artifact, name),
            None => artifact.to_string(),
        }
    }

    /// Archive entry the rows of this source are written to.
    pub fn entry_name(&self, artifact: &str) -> String {
        format!("{}.{}", self.full_name(artifact), RESULT_ENTRY_EXTENSION)
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Report {
    #[serde(rename = "type")]
    pub report_type: String,
    pub template: String,
}

/// A validated artifact definition. Immutable once registered.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ArtifactDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    pub parameters: Vec<ParameterSpec>,
    pub sources: Vec<Source>,
    pub reports: Vec<Report>,
}

// Wire shape of the YAML text. Kept separate so validation can report
// unknown type keywords by name instead of a generic serde error.
#[derive(Debug, Deserialize)]
struct RawArtifact {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "type")]
    artifact_type: Option<String>,
    #[serde(default)]
    parameters: Vec<RawParameter>,
    #[serde(default)]
    sources: Vec<RawSource>,
    #[serde(default)]
    reports: Vec<RawReport>,
}

#[derive(Debug, Deserialize)]
struct RawParameter {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    param_type: Option<String>,
    #[serde(default)]
    default: Option<serde_yaml::Value>,
    #[serde(default)]
    choices: Vec<serde_yaml::Value>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    query: String,
    #[serde(default)]
    precondition: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReport {
    #[serde(default, rename = "type")]
    report_type: String,
    #[serde(default)]
    template: String,
}

/// YAML scalars (`Y`, `3`, `true`) are kept as their literal text.
fn yaml_literal(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

impl ArtifactDefinition {
    /// Parse and validate a single YAML artifact definition.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let raw: RawArtifact =
            serde_yaml::from_str(text).map_err(|e| ParseError::Yaml(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Parse a YAML stream holding one definition per document.
    pub fn parse_many(text: &str) -> Result<Vec<Self>, ParseError> {
        let mut definitions = Vec::new();
        for document in serde_yaml::Deserializer::from_str(text) {
            let value = serde_yaml::Value::deserialize(document)
                .map_err(|e| ParseError::Yaml(e.to_string()))?;
            if value.is_null() {
                continue;
            }
            let raw: RawArtifact =
                serde_yaml::from_value(value).map_err(|e| ParseError::Yaml(e.to_string()))?;
            definitions.push(Self::from_raw(raw)?);
        }
        Ok(definitions)
    }

    fn from_raw(raw: RawArtifact) -> Result<Self, ParseError> {
        let name = raw.name.trim().to_string();
        if name.is_empty() {
            return Err(ParseError::EmptyName);
        }
        if !is_safe_entry_path(&name) {
            return Err(ParseError::UnsafeName {
                artifact: name.clone(),
                name,
            });
        }

        let mut seen = HashSet::new();
        let mut parameters = Vec::with_capacity(raw.parameters.len());
        for param in raw.parameters {
            let param_name = param.name.trim().to_string();
            if param_name.is_empty() {
                return Err(ParseError::EmptyParameterName { artifact: name });
            }
            if !seen.insert(param_name.clone()) {
                return Err(ParseError::DuplicateParameter {
                    artifact: name,
                    parameter: param_name,
                });
            }

            let param_type = match param.param_type.as_deref() {
                None => ParameterType::String,
                Some(keyword) => keyword.parse().map_err(|keyword| ParseError::UnknownType {
                    artifact: name.clone(),
                    parameter: param_name.clone(),
                    keyword,
                })?,
            };

            let choices: Vec<String> = param.choices.iter().map(yaml_literal).collect();
            if param_type == ParameterType::Choices && choices.is_empty() {
                return Err(ParseError::MissingChoices {
                    artifact: name,
                    parameter: param_name,
                });
            }

            parameters.push(ParameterSpec {
                name: param_name,
                param_type,
                default: param.default.as_ref().map(yaml_literal),
                choices,
                description: param.description,
            });
        }

        let mut source_names = HashSet::new();
        let mut sources = Vec::with_capacity(raw.sources.len());
        for (index, source) in raw.sources.into_iter().enumerate() {
            if source.query.trim().is_empty() {
                return Err(ParseError::EmptyQuery {
                    artifact: name,
                    index,
                });
            }
            let source = Source {
                name: source
                    .name
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
                query: source.query,
                precondition: source.precondition.filter(|p| !p.trim().is_empty()),
            };
            if let Some(source_name) = &source.name {
                if !is_safe_entry_path(source_name) {
                    return Err(ParseError::UnsafeName {
                        artifact: name,
                        name: source_name.clone(),
                    });
                }
            }
            let full_name = source.full_name(&name);
            if !source_names.insert(full_name.clone()) {
                return Err(ParseError::DuplicateSource {
                    artifact: name,
                    source_name: full_name,
                });
            }
            sources.push(source);
        }

        let reports = raw
            .reports
            .into_iter()
            .map(|r| Report {
                report_type: r.report_type.trim().to_ascii_uppercase(),
                template: r.template,
            })
            .collect();

        Ok(Self {
            name,
            description: raw.description,
            artifact_type: raw.artifact_type,
            parameters,
            sources,
            reports,
        })
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn has_report(&self, report_type: &str) -> bool {
        self.reports
            .iter()
            .any(|r| r.report_type.eq_ignore_ascii_case(report_type))
    }
}
