//! The entry record model.
//!
//! An [`Entry`] is one record in the store: an id, an opaque JSON document,
//! a map of named side files, and the folder it lives in. Entries come in two
//! flavours, told apart on disk by the `type` discriminator:
//!
//! - **basic** entries get a random uppercase id; the store regenerates it if
//!   it ever collides with an indexed id.
//! - **named** entries use a caller-chosen id. The store does not check these
//!   for uniqueness: adding a second named entry with the same id replaces
//!   the first.
//!
//! The document is deliberately schema-less. Layers above the store own its
//! shape; the store only reads the optional `name` key (through the sorter)
//! and otherwise passes the document through untouched.
//!
//! On disk an entry is serialised as:
//!
//! ```json
//! {
//!   "UUID": "0F8E...",
//!   "Information": { "name": "Foo" },
//!   "Files": { "cover": "cover.png" },
//!   "type": "BASIC_ENTRY"
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::EntryError;

/// Opaque, ordered, string-keyed entry payload.
pub type Document = serde_json::Map<String, Value>;

/// Document key read by the name sorter and [`Entry::name`].
pub const NAME_KEY: &str = "name";

/// Discriminator persisted as `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Entry with a generated id.
    #[serde(rename = "BASIC_ENTRY")]
    Basic,
    /// Entry with a caller-chosen id.
    #[serde(rename = "NAMED_ENTRY")]
    Named,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic => write!(f, "BASIC_ENTRY"),
            Self::Named => write!(f, "NAMED_ENTRY"),
        }
    }
}

/// On-disk shape of `entry.json`.
#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    #[serde(rename = "UUID")]
    id: String,
    #[serde(rename = "Information", default)]
    information: Document,
    #[serde(rename = "Files", default)]
    files: BTreeMap<String, PathBuf>,
    #[serde(rename = "type")]
    kind: EntryKind,
}

/// A single record in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    id: String,
    kind: EntryKind,
    document: Document,
    files: BTreeMap<String, PathBuf>,
    path: Option<PathBuf>,
    owner: Option<PathBuf>,
}

fn generate_id() -> String {
    Uuid::new_v4().to_string().to_uppercase()
}

impl Entry {
    /// Create a basic entry with a fresh random id.
    #[must_use]
    pub fn new_generated(document: Document) -> Self {
        Self {
            id: generate_id(),
            kind: EntryKind::Basic,
            document,
            files: BTreeMap::new(),
            path: None,
            owner: None,
        }
    }

    /// Create a named entry. Uniqueness of `id` is the caller's concern.
    #[must_use]
    pub fn new_named(id: impl Into<String>, document: Document) -> Self {
        Self {
            id: id.into(),
            kind: EntryKind::Named,
            document,
            files: BTreeMap::new(),
            path: None,
            owner: None,
        }
    }

    /// Decode a metadata document, dispatching on its `type` discriminator.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::Decode`] if the document is not an object, has no
    /// `type`, has an unknown `type`, or is otherwise malformed.
    pub fn from_document(document: Value) -> Result<Self, EntryError> {
        let Some(object) = document.as_object() else {
            return Err(EntryError::Decode {
                reason: "metadata is not a JSON object".to_string(),
            });
        };
        if !object.contains_key("type") {
            return Err(EntryError::Decode {
                reason: "metadata has no type discriminator".to_string(),
            });
        }

        let record: EntryRecord =
            serde_json::from_value(document).map_err(|e| EntryError::Decode {
                reason: e.to_string(),
            })?;

        if record.id.is_empty() {
            return Err(EntryError::Decode {
                reason: "metadata has an empty UUID".to_string(),
            });
        }

        Ok(Self {
            id: record.id,
            kind: record.kind,
            document: record.information,
            files: record.files,
            path: None,
            owner: None,
        })
    }

    /// Encode this entry as its metadata document.
    #[must_use]
    pub fn to_document(&self) -> Value {
        let mut object = serde_json::Map::new();
        object.insert("UUID".to_string(), Value::String(self.id.clone()));
        object.insert(
            "Information".to_string(),
            Value::Object(self.document.clone()),
        );
        let files = self
            .files
            .iter()
            .map(|(key, path)| (key.clone(), Value::String(path_to_string(path))))
            .collect();
        object.insert("Files".to_string(), Value::Object(files));
        object.insert("type".to_string(), Value::String(self.kind.to_string()));
        Value::Object(object)
    }

    /// Entry id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Basic or named.
    #[must_use]
    pub const fn kind(&self) -> EntryKind {
        self.kind
    }

    /// The opaque payload.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access to the payload. Call the store's update afterwards to persist.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Display name from the document, if present and a string.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.document.get(NAME_KEY).and_then(Value::as_str)
    }

    /// Set the display name in the document.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.document
            .insert(NAME_KEY.to_string(), Value::String(name.into()));
    }

    /// Registered side files: key to path relative to the entry folder.
    #[must_use]
    pub const fn files(&self) -> &BTreeMap<String, PathBuf> {
        &self.files
    }

    /// Whether a file is registered under `key`.
    #[must_use]
    pub fn has_file(&self, key: &str) -> bool {
        self.files.contains_key(key)
    }

    /// Absolute path of the file registered under `key`.
    ///
    /// `None` if the key is unknown or the entry has no folder yet.
    #[must_use]
    pub fn get_file(&self, key: &str) -> Option<PathBuf> {
        let relative = self.files.get(key)?;
        self.path.as_ref().map(|folder| folder.join(relative))
    }

    /// Absolute folder, once the entry has been placed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Root of the store currently indexing this entry.
    #[must_use]
    pub fn owner(&self) -> Option<&Path> {
        self.owner.as_deref()
    }

    /// Whether a store currently indexes this entry.
    #[must_use]
    pub const fn is_indexed(&self) -> bool {
        self.owner.is_some()
    }

    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = Some(path);
    }

    pub(crate) fn set_owner(&mut self, owner: Option<PathBuf>) {
        self.owner = owner;
    }

    pub(crate) fn regenerate_id(&mut self) {
        self.id = generate_id();
    }

    pub(crate) fn files_mut(&mut self) -> &mut BTreeMap<String, PathBuf> {
        &mut self.files
    }

    pub(crate) fn replace_files(&mut self, files: BTreeMap<String, PathBuf>) {
        self.files = files;
    }
}

/// Render a relative path with forward slashes for the JSON files.
pub(crate) fn path_to_string(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether `path` is a plain relative path that stays inside its base folder.
pub(crate) fn is_contained_relative(path: &Path) -> bool {
    let mut has_name = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => has_name = true,
            Component::CurDir => {}
            _ => return false,
        }
    }
    has_name
}

/// Anything a [`crate::playlist::Playlist`] or a search layer can use to
/// decide membership.
pub trait EntryFilter {
    /// Whether `entry` belongs to this filter.
    fn contains(&self, entry: &Entry) -> bool;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_generated_id_is_uppercase() {
        let entry = Entry::new_generated(Document::new());
        assert_eq!(entry.id(), entry.id().to_uppercase());
        assert_eq!(entry.kind(), EntryKind::Basic);
        assert!(entry.path().is_none());
        assert!(!entry.is_indexed());
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = Entry::new_generated(Document::new());
        let b = Entry::new_generated(Document::new());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_document_round_trip() {
        let mut entry = Entry::new_named("Playlists", doc(json!({"name": "x", "n": [1, 2]})));
        entry
            .files_mut()
            .insert("cover".to_string(), PathBuf::from("art/cover.png"));

        let decoded = Entry::from_document(entry.to_document()).unwrap();
        assert_eq!(decoded.id(), "Playlists");
        assert_eq!(decoded.kind(), EntryKind::Named);
        assert_eq!(decoded.document(), entry.document());
        assert_eq!(decoded.files(), entry.files());
    }

    #[test]
    fn test_to_document_layout() {
        let entry = Entry::new_generated(doc(json!({"name": "Foo"})));
        let value = entry.to_document();
        assert_eq!(value["type"], "BASIC_ENTRY");
        assert_eq!(value["UUID"], entry.id());
        assert_eq!(value["Information"]["name"], "Foo");
        assert!(value["Files"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_from_document_requires_type() {
        let result = Entry::from_document(json!({"UUID": "A", "Information": {}, "Files": {}}));
        assert!(matches!(result, Err(EntryError::Decode { .. })));
    }

    #[test]
    fn test_from_document_rejects_unknown_type() {
        let result = Entry::from_document(json!({"UUID": "A", "type": "MYSTERY"}));
        assert!(matches!(result, Err(EntryError::Decode { .. })));
    }

    #[test]
    fn test_from_document_rejects_non_object() {
        assert!(Entry::from_document(json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_from_document_defaults_missing_sections() {
        let entry = Entry::from_document(json!({"UUID": "A", "type": "BASIC_ENTRY"})).unwrap();
        assert!(entry.document().is_empty());
        assert!(entry.files().is_empty());
    }

    #[test]
    fn test_document_preserves_key_order() {
        let entry = Entry::new_generated(doc(json!({"zeta": 1, "alpha": 2, "mid": 3})));
        let keys: Vec<_> = entry.document().keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_name_accessors() {
        let mut entry = Entry::new_generated(Document::new());
        assert_eq!(entry.name(), None);
        entry.set_name("Foo");
        assert_eq!(entry.name(), Some("Foo"));
    }

    #[test]
    fn test_get_file_needs_folder() {
        let mut entry = Entry::new_generated(Document::new());
        entry
            .files_mut()
            .insert("a".to_string(), PathBuf::from("a.txt"));
        assert_eq!(entry.get_file("a"), None);

        entry.set_path(PathBuf::from("/root/ID"));
        assert_eq!(entry.get_file("a"), Some(PathBuf::from("/root/ID/a.txt")));
        assert_eq!(entry.get_file("b"), None);
    }

    #[test]
    fn test_path_to_string_uses_forward_slashes() {
        assert_eq!(path_to_string(&Path::new("a").join("b").join("c.txt")), "a/b/c.txt");
    }

    #[test]
    fn test_is_contained_relative() {
        assert!(is_contained_relative(Path::new("a.txt")));
        assert!(is_contained_relative(Path::new("sub/a.txt")));
        assert!(!is_contained_relative(Path::new("../a.txt")));
        assert!(!is_contained_relative(Path::new("/etc/passwd")));
        assert!(!is_contained_relative(Path::new("")));
    }
}
