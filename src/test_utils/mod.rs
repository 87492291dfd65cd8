//! Test utilities for the artifact collector
//!
//! Artifact fixtures and argument builders shared by the unit tests.

#![cfg(test)]

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::io::Write;
use tempfile::NamedTempFile;

use futures::stream;

use crate::config::ArtifactDefinition;
use crate::engine::{ExecutionContext, QueryEngine, RowStream};
use crate::errors::EngineError;
use crate::models::{Record, Value};

/// Artifact exercising every parameter type.
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
- name: StartDate2
  type: timestamp
- name: StartDate3
  type: timestamp
- name: CSVData
  type: csv
- name: JSONData
  type: json_array
  default: "[]"

sources:
- query: |
      SELECT ChoiceSelector, Flag, Flag2,
             OffFlag, StartDate, StartDate2, StartDate3,
             CSVData, JSONData
      FROM scope()
"#;

/// Inline artifact with one string parameter and a client report.
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

pub fn collection_with_types() -> ArtifactDefinition {
    ArtifactDefinition::parse(COLLECTION_WITH_TYPES).unwrap()
}

pub fn csv_rows() -> Vec<Record> {
    vec![
        Record::new().set("Foo", "Bar").set("Baz", "Baz"),
        Record::new().set("Foo", "Bar2").set("Baz", "Baz2"),
    ]
}

/// Arguments for `CollectionWithTypes`, including one the artifact does not declare.
pub fn type_test_args() -> Record {
    let start: DateTime<Utc> = DateTime::from_timestamp(1608015035, 0).unwrap();
    Record::new()
        .set("OffFlag", true)
        .set("ChoiceSelector", "InvalidChoice")
        .set("Flag", "N")
        .set("Flag2", false)
        .set("StartDate", start)
        .set("StartDate2", 1608015035i64)
        .set("StartDate3", 1608015035.0)
        .set("CSVData", csv_rows())
        .set("JSONData", Value::from(csv_rows()))
        .set("InvalidArg", "InvalidArgValue")
}

/// Creates a temporary file with the given content
pub fn create_temp_file(content: &[u8]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content)?;
    file.flush()?;
    Ok(file)
}

/// Query engine that answers every query with one row holding the scope.
pub struct ScopeEngine;

#[async_trait::async_trait]
impl QueryEngine for ScopeEngine {
    async fn execute(&self, _query: &str, context: ExecutionContext) -> Result<RowStream, EngineError> {
        Ok(Box::pin(stream::iter(vec![Ok::<Record, EngineError>(context.scope)])))
    }
}
