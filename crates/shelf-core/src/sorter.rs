//! Folder placement policies.
//!
//! An [`EntrySorter`] suggests where an entry's folder should live, relative
//! to the store root. The file manager treats the suggestion as a preference
//! only: "no preference", an unsafe path, or a path already taken by
//! something else all fall back to a folder named after the entry id.

use std::path::{Path, PathBuf};

use crate::entry::Entry;

/// Characters that are unsafe in folder names on at least one platform.
const UNSAFE_CHARS: [char; 10] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];

/// Reserved device names on Windows.
const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const MAX_FOLDER_NAME_CHARS: usize = 200;

/// Placement policy for entry folders.
#[cfg_attr(test, mockall::automock)]
pub trait EntrySorter: Send + Sync {
    /// Preferred folder for `entry`, relative to `root`, or `None` for no preference.
    fn relative_path(&self, entry: &Entry, root: &Path) -> Option<PathBuf>;
}

/// Places entries in folders named after their display name.
///
/// If a folder with that name already exists and isn't this entry's own
/// folder, returns `None` so the entry lands in its id folder instead of a
/// disambiguated name.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameSorter;

impl EntrySorter for NameSorter {
    fn relative_path(&self, entry: &Entry, root: &Path) -> Option<PathBuf> {
        let folder = sanitize_folder_name(entry.name()?);
        if folder.is_empty() {
            return None;
        }

        let candidate = root.join(&folder);
        if candidate.exists() && entry.path() != Some(candidate.as_path()) {
            return None;
        }
        Some(PathBuf::from(folder))
    }
}

/// Always places entries in their id folder.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdSorter;

impl EntrySorter for IdSorter {
    fn relative_path(&self, _entry: &Entry, _root: &Path) -> Option<PathBuf> {
        None
    }
}

/// Strip filesystem-unsafe characters from a display name.
///
/// Control characters are dropped, surrounding whitespace and dots are
/// trimmed, and the result is capped in length. Reserved device names come
/// back empty.
#[must_use]
pub fn sanitize_folder_name(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| !UNSAFE_CHARS.contains(c) && !c.is_control())
        .collect();
    let trimmed: String = stripped
        .trim()
        .trim_matches('.')
        .trim()
        .chars()
        .take(MAX_FOLDER_NAME_CHARS)
        .collect();

    if RESERVED_NAMES.contains(&trimmed.to_uppercase().as_str()) {
        return String::new();
    }
    trimmed
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::entry::Document;
    use tempfile::TempDir;

    fn named(name: &str) -> Entry {
        let mut entry = Entry::new_generated(Document::new());
        entry.set_name(name);
        entry
    }

    #[test]
    fn test_sanitize_strips_unsafe_chars() {
        assert_eq!(sanitize_folder_name("AC/DC: Live?"), "ACDC Live");
        assert_eq!(sanitize_folder_name("a\\b|c*d"), "abcd");
    }

    #[test]
    fn test_sanitize_trims_dots_and_spaces() {
        assert_eq!(sanitize_folder_name("  ..hidden.. "), "hidden");
    }

    #[test]
    fn test_sanitize_reserved_names() {
        assert_eq!(sanitize_folder_name("con"), "");
        assert_eq!(sanitize_folder_name("LPT1"), "");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "é".repeat(500);
        assert_eq!(sanitize_folder_name(&long).chars().count(), MAX_FOLDER_NAME_CHARS);
    }

    #[test]
    fn test_name_sorter_uses_name() {
        let temp = TempDir::new().unwrap();
        let entry = named("Foo");
        assert_eq!(
            NameSorter.relative_path(&entry, temp.path()),
            Some(PathBuf::from("Foo"))
        );
    }

    #[test]
    fn test_name_sorter_no_name() {
        let temp = TempDir::new().unwrap();
        let entry = Entry::new_generated(Document::new());
        assert_eq!(NameSorter.relative_path(&entry, temp.path()), None);
    }

    #[test]
    fn test_name_sorter_only_unsafe_chars() {
        let temp = TempDir::new().unwrap();
        let entry = named("///");
        assert_eq!(NameSorter.relative_path(&entry, temp.path()), None);
    }

    #[test]
    fn test_name_sorter_existing_folder_forces_fallback() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("Foo")).unwrap();
        let entry = named("Foo");
        assert_eq!(NameSorter.relative_path(&entry, temp.path()), None);
    }

    #[test]
    fn test_name_sorter_keeps_own_folder() {
        let temp = TempDir::new().unwrap();
        let folder = temp.path().join("Foo");
        std::fs::create_dir(&folder).unwrap();
        let mut entry = named("Foo");
        entry.set_path(folder);
        assert_eq!(
            NameSorter.relative_path(&entry, temp.path()),
            Some(PathBuf::from("Foo"))
        );
    }

    #[test]
    fn test_id_sorter_has_no_preference() {
        let temp = TempDir::new().unwrap();
        assert_eq!(IdSorter.relative_path(&named("Foo"), temp.path()), None);
    }

    #[test]
    fn test_mock_sorter() {
        let mut mock = MockEntrySorter::new();
        mock.expect_relative_path()
            .returning(|_, _| Some(PathBuf::from("Shelved")));

        let entry = Entry::new_generated(Document::new());
        assert_eq!(
            mock.relative_path(&entry, Path::new("/tmp")),
            Some(PathBuf::from("Shelved"))
        );
    }
}
