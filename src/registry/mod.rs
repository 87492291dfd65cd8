//! Artifact definition registries.
//!
//! [`Repository`] holds the definitions loaded at start-up. A
//! [`RequestOverlay`] layers a single collection's inline definitions on
//! top of it without touching the base.

mod overlay;
mod repository;

pub use overlay::RequestOverlay;
pub use repository::Repository;

