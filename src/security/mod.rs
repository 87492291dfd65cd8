//! Security utilities and validation functions.
//!
//! Names taken from collected data are never trusted as archive paths:
//! upload names are sanitized against traversal and platform-specific
//! prefixes before they are written.

pub mod upload_names;

pub use upload_names::{is_safe_entry_path, sanitize_component, sanitize_upload_name, UploadNamer};
