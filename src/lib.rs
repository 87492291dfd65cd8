//! # artifact-collector
//!
//! Runs declarative forensic artifacts and packages their results into a
//! single zip container.
//!
//! ## Overview
//!
//! An artifact is a YAML definition with typed parameters, one or more
//! query sources and optional report templates. Given a set of artifact
//! names and user-supplied arguments, the collector resolves the
//! definitions (including ad hoc definitions supplied with the request),
//! coerces every argument to its declared type, runs each source through an
//! injected query engine and streams the rows into the archive in a
//! deterministic order. Files captured by queries are stored next to the
//! results, and a `collection_context.json` manifest describes the run.
//!
//! ## Features
//!
//! - **Typed parameters**: bool, choices, timestamp, int, float, csv,
//!   json_array and string, with lenient coercion and recorded warnings
//! - **Deterministic output**: same inputs and clock give a byte-identical archive
//! - **Streaming archive**: rows go straight into the zip entry, nothing is
//!   staged on disk
//! - **Bounded concurrency**: sources may run ahead of the writer without
//!   changing entry order
//! - **Cancellation**: a partial collection still gets its manifest
//!
//! ## Usage
//!
//! ```no_run
//! use artifact_collector::config::ArtifactDefinition;
//! use artifact_collector::params::ParameterCoercer;
//! use artifact_collector::config::ChoicePolicy;
//! use artifact_collector::models::Record;
//!
//! # fn main() -> anyhow::Result<()> {
//! let definition = ArtifactDefinition::parse(
//!     "name: Test\nparameters:\n- name: Flag\n  type: bool\nsources:\n- query: SELECT Flag FROM scope()\n",
//! )?;
//! let args = Record::new().set("Flag", "Y");
//! let binding = ParameterCoercer::new(ChoicePolicy::PassThrough).bind(&definition, Some(&args));
//! println!("{:?}", binding.scope);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`collectors`]: Planning and executing collections
//! - [`config`]: Artifact definitions and collector configuration
//! - [`engine`]: Traits for the injected query engine, uploader and renderer
//! - [`models`]: Rows, requests and the collection manifest
//! - [`params`]: Parameter type coercion
//! - [`registry`]: Base artifact repository and per-request overlays
//! - [`security`]: Upload name sanitizing
//! - [`utils`]: Streaming zip, archive writer, hashing and row encoding
//! - [`constants`]: Application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Collection planning and execution
pub mod collectors;

/// Artifact definitions and collector configuration
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Collaborator traits implemented outside the crate
pub mod engine;

/// Error types
pub mod errors;

/// Core data models and structures used throughout the application
pub mod models;

/// Parameter coercion
pub mod params;

/// Artifact repositories
pub mod registry;

/// Upload name sanitizing
pub mod security;

/// Utility functions for archives, hashing and row encoding
pub mod utils;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
