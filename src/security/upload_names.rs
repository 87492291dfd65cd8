//! Archive names for captured uploads.
//!
//! Upload names come from whatever the query engine handed the uploader:
//! absolute paths, Windows paths, or literal content for the `data`
//! accessor. They are reduced to safe relative names under
//! `uploads/<accessor>/` and made unique within one collection.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::constants::UPLOADS_PREFIX;

/// Longest single path component kept, in characters
const MAX_COMPONENT_LEN: usize = 200;

lazy_static! {
    static ref DRIVE_PREFIX: Regex = Regex::new(r"^[A-Za-z]:").unwrap();
    static ref UNSAFE_CHARS: Regex = Regex::new(r#"[<>:"|?*\x00-\x1f\x7f]"#).unwrap();
}

/// Sanitizes one path component. Returns an empty string for components
/// that reduce to nothing (`.`, `..`, blanks).
pub fn sanitize_component(component: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(component, "_");
    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    trimmed.chars().take(MAX_COMPONENT_LEN).collect()
}

/// Reduces an upload path to a relative, forward-slash name.
///
/// Backslashes become separators, drive letters and leading slashes are
/// dropped, and `.`/`..` components are removed.
pub fn sanitize_upload_name(name: &str) -> String {
    let normalized = name.replace('\\', "/");
    let without_drive = DRIVE_PREFIX.replace(&normalized, "");

    let parts: Vec<String> = without_drive
        .split('/')
        .map(sanitize_component)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        "unnamed".to_string()
    } else {
        parts.join("/")
    }
}

/// True when `name` can be used verbatim as a relative archive path.
///
/// Rejects backslashes, absolute paths, drive prefixes and empty, `.` or
/// `..` components.
pub fn is_safe_entry_path(name: &str) -> bool {
    if name.contains('\\') || DRIVE_PREFIX.is_match(name) {
        return false;
    }
    name.split('/')
        .all(|part| !part.is_empty() && part != "." && part != "..")
}

/// Splits `dir/name.ext` into (`dir/name`, `.ext`). Dotfiles have no extension.
fn split_extension(name: &str) -> (&str, &str) {
    let file_start = name.rfind('/').map(|i| i + 1).unwrap_or(0);
    match name[file_start..].rfind('.') {
        Some(dot) if dot > 0 => name.split_at(file_start + dot),
        _ => (name, ""),
    }
}

/// Allocates unique archive names for uploads.
///
/// A name already taken gets a numeric suffix before its extension:
/// `a.txt`, `a_1.txt`, `a_2.txt`.
#[derive(Debug, Default)]
pub struct UploadNamer {
    used: HashSet<String>,
}

impl UploadNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Namer that never hands out any of `reserved`
    pub fn with_reserved<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            used: reserved.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allocate(&mut self, accessor: &str, requested: &str) -> String {
        let accessor = match sanitize_component(accessor) {
            a if a.is_empty() => "unknown".to_string(),
            a => a,
        };
        let base = format!(
            "{}/{}/{}",
            UPLOADS_PREFIX,
            accessor,
            sanitize_upload_name(requested)
        );
        if self.used.insert(base.clone()) {
            return base;
        }

        let (stem, extension) = split_extension(&base);
        let mut counter = 1;
        loop {
            let candidate = format!("{}_{}{}", stem, counter, extension);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_upload_name() {
        assert_eq!(sanitize_upload_name("notes.txt"), "notes.txt");
        assert_eq!(sanitize_upload_name("/etc/passwd"), "etc/passwd");
        assert_eq!(
            sanitize_upload_name("C:\\Windows\\System32\\config\\SAM"),
            "Windows/System32/config/SAM"
        );
        assert_eq!(sanitize_upload_name("../../etc/shadow"), "etc/shadow");
        assert_eq!(sanitize_upload_name("a/./b//c"), "a/b/c");
        assert_eq!(sanitize_upload_name("file<>:\"|?*.txt"), "file_______.txt");
        assert_eq!(sanitize_upload_name(".."), "unnamed");
        assert_eq!(sanitize_upload_name(""), "unnamed");
        assert_eq!(sanitize_upload_name("hello world"), "hello world");
    }

    #[test]
    fn test_safe_entry_paths() {
        assert!(is_safe_entry_path("Custom.TestArtifactDependent"));
        assert!(is_safe_entry_path("Windows.Forensics/Prefetch"));
        assert!(!is_safe_entry_path("../../../tmp/evil"));
        assert!(!is_safe_entry_path("Custom/../escape"));
        assert!(!is_safe_entry_path("/etc/cron.d/job"));
        assert!(!is_safe_entry_path("C:evil"));
        assert!(!is_safe_entry_path("a\\b"));
        assert!(!is_safe_entry_path("a//b"));
        assert!(!is_safe_entry_path("./a"));
    }

    #[test]
    fn test_long_components_are_truncated() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_upload_name(&long).len(), MAX_COMPONENT_LEN);
    }

    #[test]
    fn test_duplicates_get_numeric_suffix() {
        let mut namer = UploadNamer::new();
        assert_eq!(namer.allocate("file", "/tmp/a.txt"), "uploads/file/tmp/a.txt");
        assert_eq!(namer.allocate("file", "/tmp/a.txt"), "uploads/file/tmp/a_1.txt");
        assert_eq!(namer.allocate("file", "tmp\\a.txt"), "uploads/file/tmp/a_2.txt");
        assert_eq!(namer.allocate("data", "tmp/a.txt"), "uploads/data/tmp/a.txt");
    }

    #[test]
    fn test_suffix_without_extension() {
        let mut namer = UploadNamer::new();
        namer.allocate("data", "dir.d/blob");
        assert_eq!(namer.allocate("data", "dir.d/blob"), "uploads/data/dir.d/blob_1");
        namer.allocate("data", ".hidden");
        assert_eq!(namer.allocate("data", ".hidden"), "uploads/data/hidden_1");
    }

    #[test]
    fn test_reserved_names_are_skipped() {
        let mut namer = UploadNamer::with_reserved(["uploads/data/a.json"]);
        assert_eq!(namer.allocate("data", "a.json"), "uploads/data/a_1.json");
    }
}
