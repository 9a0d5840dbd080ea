//! The store facade.
//!
//! [`Store`] keeps an in-memory `id -> Entry` cache on top of a
//! [`FileManager`], which does all the durable work. The store owns every
//! indexed entry. Callers read through [`Store::get`] and change things either
//! through the by-id methods on the store or through an [`EntryMut`] handle
//! obtained from [`Store::entry_mut`].
//!
//! Nothing works before [`Store::load`]: every operation on an unloaded store
//! returns [`StoreError::NotLoaded`].
//!
//! ```rust,ignore
//! use shelf_core::{Entry, NameSorter, Store};
//!
//! let mut store = Store::open("/data/library", NameSorter)?;
//! let mut entry = Entry::new_generated(Default::default());
//! entry.set_name("Foo");
//! let id = store.add(entry)?.id().to_string();
//!
//! let mut handle = store.entry_mut(&id)?;
//! handle.set_name("Bar");
//! handle.update()?; // moves <root>/Foo to <root>/Bar
//! ```

use std::collections::HashMap;
use std::collections::hash_map::{self, OccupiedEntry};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{Span, debug, info, info_span, warn};

use crate::config::ShelfConfig;
use crate::entry::{Document, Entry, EntryKind};
use crate::error::{Error, Result, StoreError};
use crate::file_manager::{CorruptedEntry, FileManager, MissingEntry};
use crate::progress::{ProgressTracker, UnboundTracker};
use crate::sorter::EntrySorter;

/// File-backed entry store.
pub struct Store {
    root: PathBuf,
    sorter: Arc<dyn EntrySorter>,
    files: Option<FileManager>,
    entries: HashMap<String, Entry>,
    missing: Vec<MissingEntry>,
    corrupted: Vec<CorruptedEntry>,
    span: Span,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("root", &self.root)
            .field("loaded", &self.files.is_some())
            .field("entries", &self.entries.len())
            .field("missing", &self.missing.len())
            .field("corrupted", &self.corrupted.len())
            .finish_non_exhaustive()
    }
}

fn not_loaded() -> Error {
    Error::Store(StoreError::NotLoaded)
}

fn not_indexed(id: &str) -> Error {
    Error::Store(StoreError::NotIndexed { id: id.to_string() })
}

impl Store {
    /// Create an unloaded store rooted at `root`.
    pub fn new<S: EntrySorter + 'static>(root: impl Into<PathBuf>, sorter: S) -> Self {
        Self::with_shared_sorter(root, Arc::new(sorter))
    }

    /// Create an unloaded store with an already shared sorter.
    pub fn with_shared_sorter(root: impl Into<PathBuf>, sorter: Arc<dyn EntrySorter>) -> Self {
        let root = root.into();
        let span = info_span!("store", root = %root.display());
        Self {
            root,
            sorter,
            files: None,
            entries: HashMap::new(),
            missing: Vec::new(),
            corrupted: Vec::new(),
            span,
        }
    }

    /// Replace the tracing span entered by every operation.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Create and load a store in one step.
    pub fn open<S: EntrySorter + 'static>(root: impl Into<PathBuf>, sorter: S) -> Result<Self> {
        let mut store = Self::new(root, sorter);
        store.load()?;
        Ok(store)
    }

    /// Validate the configured library directory, then create and load a store there.
    pub fn from_config(config: &ShelfConfig) -> Result<Self> {
        config.validate()?;
        let mut store =
            Self::with_shared_sorter(config.library_directory.clone(), config.sorter.build());
        store.load()?;
        Ok(store)
    }

    /// Store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether [`Store::load`] has succeeded.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.files.is_some()
    }

    /// Load (or reload) the index and every entry it names.
    ///
    /// Missing and corrupted entries are quarantined, not returned as errors;
    /// see [`Store::missing_entries`] and [`Store::corrupted_entries`].
    pub fn load(&mut self) -> Result<()> {
        self.load_with_progress(&mut UnboundTracker)
    }

    /// [`Store::load`], reporting one step per indexed id.
    pub fn load_with_progress(&mut self, tracker: &mut dyn ProgressTracker) -> Result<()> {
        let _span = self.span.clone().entered();

        let (files, report) = FileManager::load(&self.root, Arc::clone(&self.sorter), tracker)?;
        self.entries = report
            .entries
            .into_iter()
            .map(|mut entry| {
                entry.set_owner(Some(self.root.clone()));
                (entry.id().to_string(), entry)
            })
            .collect();
        self.missing = report.missing;
        self.corrupted = report.corrupted;
        self.files = Some(files);

        if !self.missing.is_empty() || !self.corrupted.is_empty() {
            warn!(
                "Quarantined {} missing and {} corrupted entries",
                self.missing.len(),
                self.corrupted.len()
            );
        }
        Ok(())
    }

    /// Persist `entry` and start tracking it.
    ///
    /// An unowned basic entry whose id is already indexed gets a fresh id
    /// first. A named entry with an indexed id replaces the existing entry and
    /// takes over its folder.
    pub fn add(&mut self, entry: Entry) -> Result<&Entry> {
        self.add_with_progress(entry, &mut UnboundTracker)
    }

    /// [`Store::add`], reporting progress if the entry's folder has to move.
    pub fn add_with_progress(
        &mut self,
        mut entry: Entry,
        tracker: &mut dyn ProgressTracker,
    ) -> Result<&Entry> {
        let _span = self.span.clone().entered();
        let files = self.files.as_mut().ok_or_else(not_loaded)?;

        if let Some(owner) = entry.owner()
            && owner != self.root
        {
            return Err(Error::Store(StoreError::ModificationFailed {
                id: entry.id().to_string(),
                reason: format!("entry is indexed by the store at {}", owner.display()),
            }));
        }

        if entry.kind() == EntryKind::Basic && entry.owner().is_none() {
            while files.contains(entry.id()) || self.entries.contains_key(entry.id()) {
                let old = entry.id().to_string();
                entry.regenerate_id();
                debug!("Id {} already indexed, regenerated as {}", old, entry.id());
            }
        }

        if entry.path().is_none()
            && let Some(existing) = files.folder_of(entry.id())
        {
            info!("Replacing indexed entry {}", entry.id());
            entry.set_path(existing.to_path_buf());
        }

        files.add(&mut entry, tracker)?;
        entry.set_owner(Some(self.root.clone()));
        let id = entry.id().to_string();
        info!("Added entry {}", id);
        Ok(self.entries.entry(id).insert_entry(entry).into_mut())
    }

    /// Re-persist the cached entry `id`, relocating its folder if its name changed.
    pub fn update(&mut self, id: &str) -> Result<&Entry> {
        self.update_with_progress(id, &mut UnboundTracker)
    }

    /// [`Store::update`], reporting progress if the folder has to move.
    pub fn update_with_progress(
        &mut self,
        id: &str,
        tracker: &mut dyn ProgressTracker,
    ) -> Result<&Entry> {
        let _span = self.span.clone().entered();
        let files = self.files.as_mut().ok_or_else(not_loaded)?;
        let entry = self.entries.get_mut(id).ok_or_else(|| not_indexed(id))?;
        files.add(entry, tracker)?;
        Ok(entry)
    }

    /// Cached entry by id.
    pub fn get(&self, id: &str) -> Result<Option<&Entry>> {
        self.ensure_loaded()?;
        Ok(self.entries.get(id))
    }

    /// Mutable cached entry by id. Call [`Store::update`] to persist changes.
    pub fn get_mut(&mut self, id: &str) -> Result<Option<&mut Entry>> {
        self.ensure_loaded()?;
        Ok(self.entries.get_mut(id))
    }

    /// Handle for editing and persisting one indexed entry.
    pub fn entry_mut(&mut self, id: &str) -> Result<EntryMut<'_>> {
        let files = self.files.as_mut().ok_or_else(not_loaded)?;
        match self.entries.entry(id.to_string()) {
            hash_map::Entry::Occupied(slot) => Ok(EntryMut {
                slot,
                files,
                span: self.span.clone(),
            }),
            hash_map::Entry::Vacant(_) => Err(not_indexed(id)),
        }
    }

    /// Re-read `id`'s metadata from disk, replacing the cached copy.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotIndexed`] if `id` isn't indexed,
    /// [`StoreError::FetchFailed`] if its metadata can't be read.
    pub fn reload(&mut self, id: &str) -> Result<&Entry> {
        let _span = self.span.clone().entered();
        let files = self.files.as_ref().ok_or_else(not_loaded)?;
        let mut entry = files.get(id)?.ok_or_else(|| not_indexed(id))?;
        entry.set_owner(Some(self.root.clone()));
        debug!("Reloaded entry {}", id);
        Ok(self
            .entries
            .entry(id.to_string())
            .insert_entry(entry)
            .into_mut())
    }

    /// Every cached entry, ordered by id.
    pub fn get_all(&self) -> Result<Vec<&Entry>> {
        self.ensure_loaded()?;
        let mut all: Vec<&Entry> = self.entries.values().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(all)
    }

    /// Stop tracking `id` without touching its folder. Returns the detached entry.
    pub fn unindex(&mut self, id: &str) -> Result<Entry> {
        self.entry_mut(id)?.unindex()
    }

    /// Delete `id`'s folder and stop tracking it. Returns the detached entry.
    pub fn delete(&mut self, id: &str) -> Result<Entry> {
        self.delete_with_progress(id, &mut UnboundTracker)
    }

    /// [`Store::delete`], reporting one step per deleted file.
    pub fn delete_with_progress(
        &mut self,
        id: &str,
        tracker: &mut dyn ProgressTracker,
    ) -> Result<Entry> {
        self.entry_mut(id)?.delete_with_progress(tracker)
    }

    /// Register a side file on `id`. See [`FileManager::add_file`].
    pub fn add_file(
        &mut self,
        id: &str,
        key: &str,
        source: Option<&Path>,
        relative_name: impl AsRef<Path>,
    ) -> Result<&Entry> {
        let mut handle = self.entry_mut(id)?;
        handle.add_file(key, source, relative_name)?;
        Ok(handle.into_ref())
    }

    /// Rename `id`'s side file under `key`.
    pub fn rename_file(
        &mut self,
        id: &str,
        key: &str,
        new_relative_name: impl AsRef<Path>,
    ) -> Result<&Entry> {
        let mut handle = self.entry_mut(id)?;
        handle.rename_file(key, new_relative_name)?;
        Ok(handle.into_ref())
    }

    /// Delete and unregister `id`'s side file under `key`.
    pub fn remove_file(&mut self, id: &str, key: &str) -> Result<&Entry> {
        let mut handle = self.entry_mut(id)?;
        handle.remove_file(key)?;
        Ok(handle.into_ref())
    }

    /// Unregister `id`'s side file under `key`, keeping the bytes.
    pub fn unindex_file(&mut self, id: &str, key: &str) -> Result<&Entry> {
        let mut handle = self.entry_mut(id)?;
        handle.unindex_file(key)?;
        Ok(handle.into_ref())
    }

    /// Move `id`'s side file registration from `key` to `new_key`.
    pub fn rekey_file(&mut self, id: &str, key: &str, new_key: &str) -> Result<&Entry> {
        let mut handle = self.entry_mut(id)?;
        handle.rekey_file(key, new_key)?;
        Ok(handle.into_ref())
    }

    /// Whether the last load quarantined missing entries.
    pub fn has_missing_entries(&self) -> Result<bool> {
        Ok(!self.missing_entries()?.is_empty())
    }

    /// Entries whose folder was gone at load time.
    pub fn missing_entries(&self) -> Result<&[MissingEntry]> {
        self.ensure_loaded()?;
        Ok(&self.missing)
    }

    /// Whether the last load quarantined corrupted entries.
    pub fn has_corrupted_entries(&self) -> Result<bool> {
        Ok(!self.corrupted_entries()?.is_empty())
    }

    /// Entries whose metadata was unusable at load time.
    pub fn corrupted_entries(&self) -> Result<&[CorruptedEntry]> {
        self.ensure_loaded()?;
        Ok(&self.corrupted)
    }

    /// Number of live entries.
    pub fn entry_count(&self) -> Result<usize> {
        self.ensure_loaded()?;
        Ok(self.entries.len())
    }

    /// Best-effort size of everything under the root, in bytes.
    pub fn store_size_bytes(&self) -> Result<u64> {
        let _span = self.span.clone().entered();
        Ok(self.files.as_ref().ok_or_else(not_loaded)?.size())
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.files.is_none() {
            return Err(not_loaded());
        }
        Ok(())
    }
}

/// Exclusive handle on one indexed entry.
///
/// Borrows the store, so the entry can be edited and persisted without
/// passing the store around. Consuming operations ([`EntryMut::delete`],
/// [`EntryMut::unindex`]) detach the entry and hand it back.
pub struct EntryMut<'a> {
    slot: OccupiedEntry<'a, String, Entry>,
    files: &'a mut FileManager,
    span: Span,
}

impl std::fmt::Debug for EntryMut<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryMut")
            .field("entry", self.slot.get())
            .finish_non_exhaustive()
    }
}

impl Deref for EntryMut<'_> {
    type Target = Entry;

    fn deref(&self) -> &Entry {
        self.slot.get()
    }
}

impl<'a> EntryMut<'a> {
    /// Mutable payload. Call [`EntryMut::update`] to persist.
    pub fn document_mut(&mut self) -> &mut Document {
        self.slot.get_mut().document_mut()
    }

    /// Set the display name. Call [`EntryMut::update`] to persist and relocate.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.slot.get_mut().set_name(name);
    }

    /// Persist the entry, relocating its folder if needed.
    pub fn update(&mut self) -> Result<()> {
        self.update_with_progress(&mut UnboundTracker)
    }

    /// [`EntryMut::update`], reporting progress if the folder has to move.
    pub fn update_with_progress(&mut self, tracker: &mut dyn ProgressTracker) -> Result<()> {
        let _span = self.span.clone().entered();
        self.files.add(self.slot.get_mut(), tracker)
    }

    /// Delete the folder tree and detach the entry.
    pub fn delete(self) -> Result<Entry> {
        self.delete_with_progress(&mut UnboundTracker)
    }

    /// [`EntryMut::delete`], reporting one step per deleted file.
    pub fn delete_with_progress(self, tracker: &mut dyn ProgressTracker) -> Result<Entry> {
        let _span = self.span.clone().entered();
        self.files.delete(self.slot.get(), tracker)?;
        let (_, mut entry) = self.slot.remove_entry();
        entry.set_owner(None);
        Ok(entry)
    }

    /// Drop the entry from the index, keep its folder, and detach it.
    pub fn unindex(self) -> Result<Entry> {
        let _span = self.span.clone().entered();
        self.files.unindex(self.slot.get())?;
        let (_, mut entry) = self.slot.remove_entry();
        entry.set_owner(None);
        Ok(entry)
    }

    /// Register a side file under `key`, copying `source` in if given.
    pub fn add_file(
        &mut self,
        key: &str,
        source: Option<&Path>,
        relative_name: impl AsRef<Path>,
    ) -> Result<()> {
        let _span = self.span.clone().entered();
        self.files
            .add_file(self.slot.get_mut(), key, source, relative_name.as_ref())
    }

    /// Rename the side file under `key`.
    pub fn rename_file(&mut self, key: &str, new_relative_name: impl AsRef<Path>) -> Result<()> {
        let _span = self.span.clone().entered();
        self.files
            .rename_file(self.slot.get_mut(), key, new_relative_name.as_ref())
    }

    /// Delete and unregister the side file under `key`.
    pub fn remove_file(&mut self, key: &str) -> Result<()> {
        let _span = self.span.clone().entered();
        self.files.remove_file(self.slot.get_mut(), key)
    }

    /// Unregister the side file under `key`, keeping the bytes.
    pub fn unindex_file(&mut self, key: &str) -> Result<()> {
        let _span = self.span.clone().entered();
        self.files.unindex_file(self.slot.get_mut(), key)
    }

    /// Move the registration under `key` to `new_key`.
    pub fn rekey_file(&mut self, key: &str, new_key: &str) -> Result<()> {
        let _span = self.span.clone().entered();
        self.files.rekey_file(self.slot.get_mut(), key, new_key)
    }

    /// Give up the handle, keeping a shared borrow of the entry.
    #[must_use]
    pub fn into_ref(self) -> &'a Entry {
        self.slot.into_mut()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::entry::Document;
    use crate::error::EntryError;
    use crate::sorter::{IdSorter, NameSorter};
    use serde_json::json;
    use tempfile::TempDir;

    fn named(name: &str) -> Entry {
        let mut entry = Entry::new_generated(Document::new());
        entry.set_name(name);
        entry
    }

    fn open(temp: &TempDir) -> Store {
        Store::open(temp.path(), NameSorter).unwrap()
    }

    #[test]
    fn test_operations_before_load_fail() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::new(temp.path(), NameSorter);

        assert!(!store.is_loaded());
        assert!(store.get("X").unwrap_err().is_invalid_state());
        assert!(store.get_all().unwrap_err().is_invalid_state());
        assert!(store.entry_count().unwrap_err().is_invalid_state());
        assert!(store.has_missing_entries().unwrap_err().is_invalid_state());
        assert!(store.store_size_bytes().unwrap_err().is_invalid_state());
        assert!(matches!(
            store.add(named("Foo")),
            Err(Error::Store(StoreError::NotLoaded))
        ));
        assert!(matches!(
            store.delete("X"),
            Err(Error::Store(StoreError::NotLoaded))
        ));
    }

    #[test]
    fn test_add_sets_owner_and_path() {
        let temp = TempDir::new().unwrap();
        let mut store = open(&temp);

        let entry = store.add(named("Foo")).unwrap();
        assert_eq!(entry.owner(), Some(temp.path()));
        assert!(entry.is_indexed());
        assert_eq!(entry.path(), Some(temp.path().join("Foo").as_path()));
        assert_eq!(store.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_add_regenerates_colliding_basic_id() {
        let temp = TempDir::new().unwrap();
        let mut store = open(&temp);
        let first = store.add(named("A")).unwrap().clone();

        // Same id, never added: must not clobber the first entry.
        let mut twin = Entry::from_document(first.to_document()).unwrap();
        twin.set_name("B");
        let second_id = store.add(twin).unwrap().id().to_string();

        assert_ne!(second_id, first.id());
        assert_eq!(store.entry_count().unwrap(), 2);
        assert_eq!(store.get(first.id()).unwrap().unwrap().name(), Some("A"));
    }

    #[test]
    fn test_named_duplicate_overwrites() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path(), IdSorter).unwrap();

        let mut first = Entry::new_named("Settings", Document::new());
        first.document_mut().insert("v".to_string(), json!(1));
        store.add(first).unwrap();

        let mut second = Entry::new_named("Settings", Document::new());
        second.document_mut().insert("v".to_string(), json!(2));
        store.add(second).unwrap();

        assert_eq!(store.entry_count().unwrap(), 1);
        let entry = store.get("Settings").unwrap().unwrap();
        assert_eq!(entry.document()["v"], 2);
        assert_eq!(entry.path(), Some(temp.path().join("Settings").as_path()));

        let reopened = Store::open(temp.path(), IdSorter).unwrap();
        assert_eq!(reopened.get("Settings").unwrap().unwrap().document()["v"], 2);
    }

    #[test]
    fn test_update_relocates() {
        let temp = TempDir::new().unwrap();
        let mut store = open(&temp);
        let id = store.add(named("Foo")).unwrap().id().to_string();

        store.get_mut(&id).unwrap().unwrap().set_name("Bar");
        let entry = store.update(&id).unwrap();

        assert_eq!(entry.path(), Some(temp.path().join("Bar").as_path()));
        assert!(!temp.path().join("Foo").exists());
    }

    #[test]
    fn test_update_unknown_id() {
        let temp = TempDir::new().unwrap();
        let mut store = open(&temp);
        assert!(matches!(
            store.update("NOPE"),
            Err(Error::Store(StoreError::NotIndexed { .. }))
        ));
    }

    #[test]
    fn test_entry_mut_update_and_delete() {
        let temp = TempDir::new().unwrap();
        let mut store = open(&temp);
        let id = store.add(named("Foo")).unwrap().id().to_string();

        let mut handle = store.entry_mut(&id).unwrap();
        handle.set_name("Baz");
        handle
            .document_mut()
            .insert("rating".to_string(), json!(5));
        handle.update().unwrap();
        assert_eq!(handle.path(), Some(temp.path().join("Baz").as_path()));

        let detached = handle.delete().unwrap();
        assert!(!detached.is_indexed());
        assert!(!temp.path().join("Baz").exists());
        assert!(store.get(&id).unwrap().is_none());
    }

    #[test]
    fn test_unindex_detaches_but_keeps_folder() {
        let temp = TempDir::new().unwrap();
        let mut store = open(&temp);
        let id = store.add(named("Foo")).unwrap().id().to_string();

        let detached = store.unindex(&id).unwrap();
        assert_eq!(detached.owner(), None);
        assert!(temp.path().join("Foo/entry.json").exists());
        assert!(store.get(&id).unwrap().is_none());
        assert!(matches!(
            store.unindex(&id),
            Err(Error::Store(StoreError::NotIndexed { .. }))
        ));
    }

    #[test]
    fn test_unindexed_entry_can_be_added_back() {
        let temp = TempDir::new().unwrap();
        let mut store = open(&temp);
        let id = store.add(named("Foo")).unwrap().id().to_string();

        let detached = store.unindex(&id).unwrap();
        let entry = store.add(detached).unwrap();
        assert_eq!(entry.id(), id);
        assert_eq!(entry.path(), Some(temp.path().join("Foo").as_path()));
    }

    #[test]
    fn test_reload_picks_up_external_edit() {
        let temp = TempDir::new().unwrap();
        let mut store = open(&temp);
        let id = store.add(named("Foo")).unwrap().id().to_string();

        let metadata = temp.path().join("Foo/entry.json");
        let mut value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&metadata).unwrap()).unwrap();
        value["Information"]["edited"] = json!(true);
        std::fs::write(&metadata, value.to_string()).unwrap();

        let entry = store.reload(&id).unwrap();
        assert_eq!(entry.document()["edited"], true);
        assert!(entry.is_indexed());
    }

    #[test]
    fn test_reload_failures() {
        let temp = TempDir::new().unwrap();
        let mut store = open(&temp);
        let id = store.add(named("Foo")).unwrap().id().to_string();
        std::fs::write(temp.path().join("Foo/entry.json"), "garbage").unwrap();

        assert!(matches!(
            store.reload(&id),
            Err(Error::Store(StoreError::FetchFailed { .. }))
        ));
        assert!(matches!(
            store.reload("UNKNOWN"),
            Err(Error::Store(StoreError::NotIndexed { .. }))
        ));
    }

    #[test]
    fn test_get_all_is_sorted() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path(), IdSorter).unwrap();
        for id in ["c", "a", "b"] {
            store.add(Entry::new_named(id, Document::new())).unwrap();
        }
        let ids: Vec<_> = store.get_all().unwrap().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_file_ops_by_id() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path().join("store"), NameSorter).unwrap();
        let id = store.add(named("Foo")).unwrap().id().to_string();
        let source = temp.path().join("cover.png");
        std::fs::write(&source, "png").unwrap();

        let entry = store.add_file(&id, "cover", Some(&source), "cover.png").unwrap();
        assert!(entry.get_file("cover").unwrap().exists());

        store.rename_file(&id, "cover", "front.png").unwrap();
        store.rekey_file(&id, "cover", "front").unwrap();
        let entry = store.get(&id).unwrap().unwrap();
        assert_eq!(
            entry.get_file("front"),
            Some(temp.path().join("store/Foo/front.png"))
        );

        store.unindex_file(&id, "front").unwrap();
        assert!(temp.path().join("store/Foo/front.png").exists());
        assert!(matches!(
            store.remove_file(&id, "front"),
            Err(Error::Entry(EntryError::FileKeyNotFound { .. }))
        ));
    }

    #[test]
    fn test_add_refuses_entry_from_other_store() {
        let temp = TempDir::new().unwrap();
        let mut first = Store::open(temp.path().join("one"), NameSorter).unwrap();
        let mut second = Store::open(temp.path().join("two"), NameSorter).unwrap();

        let entry = first.add(named("Foo")).unwrap().clone();
        assert!(matches!(
            second.add(entry),
            Err(Error::Store(StoreError::ModificationFailed { .. }))
        ));
    }

    #[test]
    fn test_store_size_bytes() {
        let temp = TempDir::new().unwrap();
        let mut store = open(&temp);
        store.add(named("Foo")).unwrap();
        assert!(store.store_size_bytes().unwrap() > 0);
    }
}
