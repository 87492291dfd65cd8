//! Shared fixtures for the integration tests.
//!
//! [`ScriptedEngine`] understands just enough query text to drive the
//! collector: `SELECT a, b FROM scope()` projects the bound arguments into
//! one row, anything else has to be registered as a script.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;

use artifact_collector::collectors::collector::Collector;
use artifact_collector::collectors::flow::{FixedClock, FixedFlowId};
use artifact_collector::config::{ArtifactDefinition, CollectorConfig, Report};
use artifact_collector::engine::{
    AccessorUploader, ExecutionContext, QueryEngine, ReportContext, ReportRenderer, RowStream,
};
use artifact_collector::errors::EngineError;
use artifact_collector::models::{Record, Value};
use artifact_collector::registry::Repository;

pub const REQUEST_TIME: i64 = 1602103388;
pub const FLOW_ID: &str = "F.C2HQ3T4ML2M9N";

pub const COLLECTION_WITH_TYPES: &str = r#"
name: CollectionWithTypes
parameters:
- name: OffFlag
  type: bool
- name: ChoiceSelector
  type: choices
  default: First Choice
  choices:
      - First Choice
      - Second Choice
      - Third Choice
- name: Flag
  type: bool
  default: Y
- name: Flag2
  type: bool
  default: Y
- name: StartDate
  type: timestamp
- name: CSVData
  type: csv
- name: JSONData
  type: json_array
  default: "[]"

sources:
- query: |
      SELECT ChoiceSelector, Flag, Flag2,
             OffFlag, StartDate, CSVData, JSONData
      FROM scope()
"#;

pub const CUSTOM_TEST_ARTIFACT_DEPENDENT: &str = r#"
name: Custom.TestArtifactDependent
parameters:
- name: FooVar
sources:
- query: SELECT FooVar FROM scope()

reports:
- type: CLIENT
  template: |
     This is a template.
"#;

/// Three named sources: rows, an upload and a failing query.
pub const MIXED_SOURCES: &str = r#"
name: Test.Mixed
sources:
- name: Counts
  query: COUNT 5
- name: Capture
  query: UPLOAD hello.txt
- name: Broken
  query: FAIL
- name: After
  query: COUNT 2
"#;

pub fn csv_rows() -> Vec<Record> {
    vec![
        Record::new().set("Foo", "Bar").set("Baz", "Baz"),
        Record::new().set("Foo", "Bar2").set("Baz", "Baz2"),
    ]
}

pub fn type_test_args() -> Record {
    Record::new()
        .set("OffFlag", true)
        .set("ChoiceSelector", "InvalidChoice")
        .set("Flag", "N")
        .set("Flag2", false)
        .set("StartDate", 1608015035i64)
        .set("CSVData", csv_rows())
}

/// What a registered query does.
#[derive(Clone)]
pub enum Script {
    Rows(Vec<Record>),
    Fail(String),
    /// Uploads `content` through the `data` accessor under the given name
    Upload { content: String, name: String },
    /// Emits the rows, then cancels the collection and never finishes
    CancelAfter(usize),
}

#[derive(Clone, Default)]
pub struct ScriptedEngine {
    scripts: HashMap<String, Script>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        let engine = Self::default()
            .with("FAIL", Script::Fail("syntax error at FAIL".to_string()))
            .with(
                "UPLOAD hello.txt",
                Script::Upload {
                    content: "hello world".to_string(),
                    name: "hello.txt".to_string(),
                },
            );
        (1..=100).fold(engine, |engine, n| engine.with(&format!("COUNT {}", n), Script::Rows(numbered(n))))
    }

    pub fn with(mut self, query: &str, script: Script) -> Self {
        self.scripts.insert(query.to_string(), script);
        self
    }
}

pub fn numbered(count: usize) -> Vec<Record> {
    (0..count).map(|i| Record::new().set("Row", i as i64)).collect()
}

/// Column list of `SELECT a, b FROM scope()`.
fn scope_columns(query: &str) -> Option<Vec<String>> {
    let body = query.trim().strip_prefix("SELECT")?;
    let (columns, from) = body.split_once("FROM")?;
    if from.trim() != "scope()" {
        return None;
    }
    Some(columns.split(',').map(|c| c.trim().to_string()).collect())
}

#[async_trait]
impl QueryEngine for ScriptedEngine {
    async fn execute(&self, query: &str, context: ExecutionContext) -> Result<RowStream, EngineError> {
        let query = query.trim();
        if let Some(script) = self.scripts.get(query) {
            return match script.clone() {
                Script::Rows(rows) => Ok(Box::pin(stream::iter(rows.into_iter().map(Ok::<Record, EngineError>)))),
                Script::Fail(message) => Err(EngineError::Query(message)),
                Script::Upload { content, name } => {
                    let descriptor = context.uploads.upload("data", &content, Some(&name)).await?;
                    Ok(Box::pin(stream::iter(vec![Ok::<Record, EngineError>(descriptor.to_record())])))
                }
                Script::CancelAfter(count) => {
                    let cancel = context.cancel.clone();
                    let rows = stream::iter(numbered(count).into_iter().map(Ok::<Record, EngineError>));
                    let stop = stream::once(async move {
                        cancel.cancel();
                        std::future::pending::<Result<Record, EngineError>>().await
                    });
                    Ok(Box::pin(futures::StreamExt::chain(rows, stop)))
                }
            };
        }

        let columns = scope_columns(query)
            .ok_or_else(|| EngineError::Query(format!("unsupported query: {}", query)))?;
        let row: Record = columns
            .into_iter()
            .map(|column| {
                let value = context.scope.get(&column).cloned().unwrap_or(Value::Null);
                (column, value)
            })
            .collect();
        Ok(Box::pin(stream::iter(vec![Ok::<Record, EngineError>(row)])))
    }
}

/// Renders the template text with the artifact name as a heading.
pub struct TemplateRenderer;

#[async_trait]
impl ReportRenderer for TemplateRenderer {
    async fn render(
        &self,
        artifact: &ArtifactDefinition,
        report: &Report,
        context: &ReportContext,
    ) -> Result<Vec<u8>, EngineError> {
        let rows: u64 = context.sources.iter().map(|s| s.rows).sum();
        Ok(format!(
            "<h2>{}</h2>\n<p>{}</p>\n<p>{} rows</p>",
            artifact.name,
            report.template.trim(),
            rows
        )
        .into_bytes())
    }
}

pub fn repository(definitions: &[&str]) -> Arc<Repository> {
    let mut repository = Repository::new();
    for text in definitions {
        repository.load_definitions(text).unwrap();
    }
    Arc::new(repository)
}

pub fn collector(repository: Arc<Repository>, engine: ScriptedEngine, config: CollectorConfig) -> Collector {
    Collector::new(
        repository,
        Arc::new(engine),
        Arc::new(AccessorUploader),
        Arc::new(FixedClock::from_timestamp(REQUEST_TIME).unwrap()),
        Arc::new(FixedFlowId(FLOW_ID.to_string())),
        config,
    )
}

/// Every entry of the archive at `path` as (name, content), in archive order.
pub fn read_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
    let file = std::fs::File::open(path).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    (0..zip.len())
        .map(|i| {
            let mut entry = zip.by_index(i).unwrap();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            (entry.name().to_string(), content)
        })
        .collect()
}

pub fn entry_names(path: &Path) -> Vec<String> {
    read_entries(path).into_iter().map(|(name, _)| name).collect()
}

pub fn entry_json_lines(path: &Path, name: &str) -> Vec<serde_json::Value> {
    let (_, content) = read_entries(path)
        .into_iter()
        .find(|(entry, _)| entry == name)
        .unwrap_or_else(|| panic!("missing entry {}", name));
    String::from_utf8(content)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

pub fn manifest_json(path: &Path) -> serde_json::Value {
    let (_, content) = read_entries(path)
        .into_iter()
        .find(|(entry, _)| entry == "collection_context.json")
        .expect("manifest entry");
    serde_json::from_slice(&content).unwrap()
}
