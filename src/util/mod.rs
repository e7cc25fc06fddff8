//! Utility functions for common operations.
//!
//! This module provides shared utilities used across the crate:
//! - Atomic file writes, so readers never observe a half-written log
//! - File-name-safe conversation identifiers
//! - Case-insensitive path comparison

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{ChatlogError, Result};

/// Characters that may not appear in a file name on common platforms.
const RESERVED_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Atomically write content to a file.
///
/// The content goes to a temporary file in the same directory, is flushed,
/// and is then renamed over the target. A concurrent reader sees either the
/// old or the new full contents.
///
/// # Errors
///
/// Returns an error if:
/// - The parent directory cannot be determined or created
/// - The temporary file cannot be created or written
/// - The atomic rename (persist) operation fails
///
/// # Example
///
/// ```rust,no_run
/// use chatlog_watch::util::atomic_write;
///
/// atomic_write("config.toml", b"key = \"value\"").unwrap();
/// ```
pub fn atomic_write(path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    atomic_write_raw(path, content).map_err(|e| {
        ChatlogError::io(format!("Failed to atomically write file: {}", path.display()), e)
    })
}

/// [`atomic_write`] returning the bare `io::Error`, for callers that retry on
/// specific error kinds.
pub fn atomic_write_raw(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    if !parent.exists() {
        std::fs::create_dir_all(parent)?;
    }

    // Same directory keeps the rename on one filesystem.
    let mut temp_file = NamedTempFile::new_in(parent)?;
    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.persist(path).map_err(|e| e.error)?;

    Ok(())
}

/// Turn an external conversation identifier into a file-name-safe string.
///
/// Control characters, space (codes 0 to 32) and `<>:"/\|?*` are replaced by
/// their two-digit lowercase hexadecimal code; everything else is kept as-is.
///
/// ```
/// use chatlog_watch::util::generate_conversation_id;
///
/// assert_eq!(generate_conversation_id("Room/Name:1"), "Room2fName3a1");
/// ```
#[must_use]
pub fn generate_conversation_id(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if (c as u32) <= 32 || RESERVED_FILE_NAME_CHARS.contains(&c) {
            out.push_str(&format!("{:02x}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Case-insensitive comparison key for a path.
#[must_use]
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

/// Case-insensitive path equality.
#[must_use]
pub fn paths_equal(a: &Path, b: &Path) -> bool {
    path_key(a) == path_key(b)
}

/// Whether `path` has the given extension, compared case-insensitively.
#[must_use]
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// List the files directly inside `dir` that carry `extension`, sorted by path.
pub fn list_log_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ChatlogError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| has_extension(p, extension))
        .collect();
    files.sort();
    Ok(files)
}

/// Truncate a string for single-line display.
#[must_use]
pub fn truncate(s: &str, max_chars: usize) -> String {
    let flat = s.replace(['\r', '\n'], " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let kept: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Room/Name:1", "Room2fName3a1")]
    #[case("plain", "plain")]
    #[case("a b", "a20b")]
    #[case("<>\"\\|?*", "3c3e225c7c3f2a")]
    #[case("tab\there", "tab09here")]
    #[case("\u{1}0", "010")]
    #[case("\u{10}", "10")]
    #[case("sip:ada@example.com", "sip3aada@example.com")]
    fn test_generate_conversation_id(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(generate_conversation_id(input), expected);
    }

    #[test]
    fn test_generate_conversation_id_keeps_unicode() {
        assert_eq!(generate_conversation_id("Zoë/Ω"), "Zoë2fΩ");
    }

    #[test]
    fn test_paths_equal_ignores_case() {
        assert!(paths_equal(Path::new("/Logs/A.xml"), Path::new("/logs/a.XML")));
        assert!(!paths_equal(Path::new("/logs/a.xml"), Path::new("/logs/b.xml")));
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension(Path::new("a.XML"), "xml"));
        assert!(!has_extension(Path::new("a.xml.tmp"), "xml"));
        assert!(!has_extension(Path::new("noext"), "xml"));
    }

    #[test]
    fn test_atomic_write_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conv.xml");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_list_log_files_is_flat_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.xml"), "x").unwrap();
        std::fs::write(dir.path().join("a.xml"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.xml"), "x").unwrap();

        let files = list_log_files(dir.path(), "xml").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.xml", "b.xml"]);
    }

    #[test]
    fn test_list_log_files_missing_dir() {
        let err = list_log_files(Path::new("/definitely/not/here"), "xml").unwrap_err();
        assert!(matches!(err, ChatlogError::DirectoryNotFound { .. }));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a\nb", 10), "a b");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }
}
