//! On-disk persistence for the entry store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/index.json            id -> folder, relative to <root>
//! <root>/<folder>/entry.json   one metadata file per entry
//! <root>/<folder>/...          the entry's side files
//! ```
//!
//! The index is canonical: an entry exists if and only if its id is in the
//! index. Loading quarantines ids whose folder is gone (*missing*) or whose
//! metadata can't be decoded (*corrupted*) and prunes them from the index.
//!
//! Relocation is copy-then-delete. The old folder is only removed once the
//! copy finished and the index points at the new one; a failed copy leaves
//! the entry fully at its old path. A crash mid-move can still leave both
//! folders on disk, and nothing reconciles them automatically.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::entry::{Entry, is_contained_relative, path_to_string};
use crate::error::{EntryError, Error, Result, StoreError, modification_failed};
use crate::fs;
use crate::progress::{ProgressTracker, UnboundTracker, advance};
use crate::sorter::EntrySorter;

/// Name of the root index document.
pub const INDEX_FILE_NAME: &str = "index.json";

/// Name of the per-entry metadata document.
pub const ENTRY_FILE_NAME: &str = "entry.json";

/// An indexed id whose folder no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingEntry {
    /// Entry id.
    pub id: String,
    /// Folder the index pointed at.
    pub path: PathBuf,
}

/// An indexed id whose metadata could not be read or decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorruptedEntry {
    /// Entry id.
    pub id: String,
    /// Folder the index pointed at.
    pub path: PathBuf,
    /// What was wrong with the metadata.
    pub reason: String,
}

/// Outcome of the load pass.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Entries that decoded cleanly, with their folder set.
    pub entries: Vec<Entry>,
    /// Ids quarantined because their folder is gone.
    pub missing: Vec<MissingEntry>,
    /// Ids quarantined because their metadata is unusable.
    pub corrupted: Vec<CorruptedEntry>,
}

/// Owns every read and write under the store root.
pub struct FileManager {
    root: PathBuf,
    index_path: PathBuf,
    /// id -> absolute folder.
    index: BTreeMap<String, PathBuf>,
    sorter: Arc<dyn EntrySorter>,
}

impl std::fmt::Debug for FileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileManager")
            .field("root", &self.root)
            .field("entries", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl FileManager {
    /// Open the store at `root`, creating it if needed, and run the load pass.
    ///
    /// Missing and corrupted entries are quarantined into the report, never
    /// returned as errors. The pruned index is written back before returning.
    ///
    /// # Errors
    ///
    /// [`StoreError::CreationFailed`] if the root or an empty index can't be
    /// created, [`StoreError::LoadFailed`] if the index can't be read, parsed
    /// or rewritten.
    pub fn load(
        root: impl Into<PathBuf>,
        sorter: Arc<dyn EntrySorter>,
        tracker: &mut dyn ProgressTracker,
    ) -> Result<(Self, LoadReport)> {
        let root = root.into();
        let index_path = root.join(INDEX_FILE_NAME);

        if !root.exists() {
            fs::create_dir_all(&root).map_err(|e| creation_failed(&root, e))?;
            info!("Created store root at {}", root.display());
        }
        if !index_path.exists() {
            fs::write_json(&index_path, &BTreeMap::<String, String>::new())
                .map_err(|e| creation_failed(&root, e))?;
            debug!("Created empty index at {}", index_path.display());
        }

        let raw: BTreeMap<String, String> =
            fs::read_json(&index_path).map_err(|e| load_failed(&index_path, e))?;

        let mut manager = Self {
            root,
            index_path,
            index: BTreeMap::new(),
            sorter,
        };
        let mut report = LoadReport::default();

        tracker.set_max(raw.len() as u64);
        tracker.set_position(0);
        let total = raw.len();
        for (done, (id, relative)) in raw.into_iter().enumerate() {
            let folder = manager.resolve(&relative);
            if !is_contained_relative(Path::new(relative.trim_start_matches(['/', '\\']))) {
                let reason = format!("indexed folder {relative:?} is not inside the store root");
                warn!("Entry {} is corrupted: {}", id, reason);
                report.corrupted.push(CorruptedEntry {
                    id,
                    path: folder,
                    reason,
                });
            } else if !folder.is_dir() {
                warn!("Entry {} is missing: {} does not exist", id, folder.display());
                report.missing.push(MissingEntry { id, path: folder });
            } else {
                match read_entry(&folder) {
                    Ok(mut entry) if entry.id() == id => {
                        entry.set_path(folder.clone());
                        manager.index.insert(id, folder);
                        report.entries.push(entry);
                    }
                    Ok(entry) => {
                        let reason = format!(
                            "metadata id {} does not match indexed id {}",
                            entry.id(),
                            id
                        );
                        warn!("Entry {} is corrupted: {}", id, reason);
                        report.corrupted.push(CorruptedEntry {
                            id,
                            path: folder,
                            reason,
                        });
                    }
                    Err(reason) => {
                        warn!("Entry {} is corrupted: {}", id, reason);
                        report.corrupted.push(CorruptedEntry {
                            id,
                            path: folder,
                            reason,
                        });
                    }
                }
            }
            advance(tracker, done, total);
        }

        manager
            .save_index()
            .map_err(|e| load_failed(&manager.index_path, e))?;
        tracker.complete();

        info!(
            "Loaded {} entries from {} ({} missing, {} corrupted)",
            report.entries.len(),
            manager.root.display(),
            report.missing.len(),
            report.corrupted.len()
        );
        Ok((manager, report))
    }

    /// Store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the index document.
    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Whether `id` is indexed.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Indexed folder for `id`.
    #[must_use]
    pub fn folder_of(&self, id: &str) -> Option<&Path> {
        self.index.get(id).map(PathBuf::as_path)
    }

    /// Number of indexed ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Persist `entry`, placing or relocating its folder as the sorter asks.
    ///
    /// First-time adds create the chosen folder. If the entry already has a
    /// folder and the sorter now wants a different one, the metadata is
    /// written to the current folder, the tree is copied to the new folder
    /// (one progress step per file), the index is switched over and only then
    /// is the old folder deleted.
    ///
    /// # Errors
    ///
    /// [`StoreError::ModificationFailed`] on any write, copy or index failure.
    /// The entry's path is left unchanged when an error is returned.
    pub fn add(&mut self, entry: &mut Entry, tracker: &mut dyn ProgressTracker) -> Result<()> {
        let id = entry.id().to_string();
        let target = self.target_folder(entry)?;

        match entry.path().map(Path::to_path_buf) {
            Some(current) if current != target && current.is_dir() => {
                self.relocate(entry, &current, &target, tracker)
                    .map_err(|e| modification_failed(&id, e))?;
            }
            _ => {
                write_metadata(&target, entry).map_err(|e| modification_failed(&id, e))?;
                let previous = self.index.insert(id.clone(), target.clone());
                if let Err(e) = self.save_index() {
                    self.restore_index(&id, previous);
                    return Err(modification_failed(&id, e));
                }
                entry.set_path(target);
                tracker.set_max(0);
                tracker.complete();
            }
        }

        debug!("Persisted entry {}", id);
        Ok(())
    }

    fn relocate(
        &mut self,
        entry: &mut Entry,
        current: &Path,
        target: &Path,
        tracker: &mut dyn ProgressTracker,
    ) -> Result<()> {
        let id = entry.id().to_string();
        info!(
            "Moving entry {} from {} to {}",
            id,
            current.display(),
            target.display()
        );

        write_metadata(current, entry)?;

        let target_existed = target.exists();
        if let Err(e) = fs::copy_tree(current, target, tracker) {
            if !target_existed
                && let Err(cleanup) = fs::remove_tree(target, &mut UnboundTracker)
            {
                warn!(
                    "Failed to clean up partial copy at {}: {}",
                    target.display(),
                    cleanup
                );
            }
            return Err(e);
        }

        let previous = self.index.insert(id.clone(), target.to_path_buf());
        if let Err(e) = self.save_index() {
            self.restore_index(&id, previous);
            if !target_existed
                && let Err(cleanup) = fs::remove_tree(target, &mut UnboundTracker)
            {
                warn!(
                    "Failed to clean up copied folder {} after index rollback: {}",
                    target.display(),
                    cleanup
                );
            }
            return Err(e);
        }
        entry.set_path(target.to_path_buf());

        // The entry now lives at `target`; a leftover old folder is only an orphan.
        if let Err(e) = fs::remove_tree(current, &mut UnboundTracker) {
            warn!(
                "Entry {} moved but old folder {} could not be removed: {}",
                id,
                current.display(),
                e
            );
        }
        Ok(())
    }

    /// Read `id`'s metadata fresh from disk.
    ///
    /// Returns `Ok(None)` if `id` isn't indexed.
    ///
    /// # Errors
    ///
    /// [`StoreError::FetchFailed`] if the id is indexed but its folder or
    /// metadata is missing or undecodable.
    pub fn get(&self, id: &str) -> Result<Option<Entry>> {
        let Some(folder) = self.index.get(id) else {
            return Ok(None);
        };
        if !folder.is_dir() {
            return Err(Error::Store(StoreError::FetchFailed {
                id: id.to_string(),
                reason: format!("folder {} does not exist", folder.display()),
            }));
        }

        let mut entry = read_entry(folder).map_err(|reason| {
            Error::Store(StoreError::FetchFailed {
                id: id.to_string(),
                reason,
            })
        })?;
        if entry.id() != id {
            return Err(Error::Store(StoreError::FetchFailed {
                id: id.to_string(),
                reason: format!("metadata belongs to {}", entry.id()),
            }));
        }
        entry.set_path(folder.clone());
        Ok(Some(entry))
    }

    /// Drop `entry` from the index, leaving its folder intact.
    ///
    /// # Errors
    ///
    /// [`StoreError::ModificationFailed`] if the index can't be written.
    pub fn unindex(&mut self, entry: &Entry) -> Result<()> {
        let id = entry.id();
        let previous = self.index.remove(id);
        if let Err(e) = self.save_index() {
            self.restore_index(id, previous);
            return Err(modification_failed(id, e));
        }
        info!("Unindexed entry {}", id);
        Ok(())
    }

    /// Delete `entry`'s folder tree and drop it from the index.
    ///
    /// # Errors
    ///
    /// [`StoreError::ModificationFailed`] if the folder or index can't be
    /// removed or written.
    pub fn delete(&mut self, entry: &Entry, tracker: &mut dyn ProgressTracker) -> Result<()> {
        let id = entry.id();
        let folder = self
            .index
            .get(id)
            .cloned()
            .or_else(|| entry.path().map(Path::to_path_buf));

        if let Some(folder) = folder {
            fs::remove_tree(&folder, tracker).map_err(|e| modification_failed(id, e))?;
        } else {
            tracker.set_max(0);
            tracker.complete();
        }

        let previous = self.index.remove(id);
        if let Err(e) = self.save_index() {
            self.restore_index(id, previous);
            return Err(modification_failed(id, e));
        }
        info!("Deleted entry {}", id);
        Ok(())
    }

    /// Register a side file under `key`, optionally copying `source` in.
    ///
    /// With `source = None` only the name is reserved. With a source, the
    /// bytes are copied to `<folder>/<relative_name>`; a file previously
    /// registered under `key` at a different name is deleted after the copy
    /// succeeds. Metadata is persisted last; if that fails the copied file
    /// stays on disk but the registration is rolled back in memory.
    ///
    /// # Errors
    ///
    /// [`EntryError::NoFolder`] if the entry isn't placed yet,
    /// [`EntryError::FileCopyFailed`] if the copy fails,
    /// [`StoreError::ModificationFailed`] for bad names or persist failures.
    pub fn add_file(
        &mut self,
        entry: &mut Entry,
        key: &str,
        source: Option<&Path>,
        relative_name: &Path,
    ) -> Result<()> {
        let folder = placed_folder(entry)?;
        check_relative(entry, relative_name)?;
        let destination = folder.join(relative_name);

        if let Some(source) = source {
            if !is_same_file(source, &destination) {
                fs::copy_file(source, &destination).map_err(|e| {
                    Error::Entry(EntryError::FileCopyFailed {
                        source_path: source.to_path_buf(),
                        destination: destination.clone(),
                        reason: e.to_string(),
                    })
                })?;
            }
            if let Some(old) = entry.files().get(key)
                && old != relative_name
            {
                let old_path = folder.join(old);
                if let Err(e) = fs::remove_file(&old_path) {
                    warn!("Failed to remove replaced file {}: {}", old_path.display(), e);
                }
            }
        }

        let previous = entry.files().clone();
        entry
            .files_mut()
            .insert(key.to_string(), relative_name.to_path_buf());
        self.persist_files(entry, previous)
    }

    /// Rename the file registered under `key` within the entry folder.
    ///
    /// # Errors
    ///
    /// [`EntryError::FileKeyNotFound`] for unknown keys,
    /// [`StoreError::ModificationFailed`] if the rename or persist fails.
    pub fn rename_file(
        &mut self,
        entry: &mut Entry,
        key: &str,
        new_relative_name: &Path,
    ) -> Result<()> {
        let folder = placed_folder(entry)?;
        check_relative(entry, new_relative_name)?;
        let old = registered_file(entry, key)?;
        if old == new_relative_name {
            return Ok(());
        }

        let from = folder.join(&old);
        let to = folder.join(new_relative_name);
        if from.exists() {
            fs::rename(&from, &to).map_err(|e| modification_failed(entry.id(), e))?;
        }

        let previous = entry.files().clone();
        entry
            .files_mut()
            .insert(key.to_string(), new_relative_name.to_path_buf());
        if let Err(e) = self.persist_files(entry, previous) {
            if to.exists()
                && let Err(undo) = fs::rename(&to, &from)
            {
                warn!("Failed to undo rename of {}: {}", to.display(), undo);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Move the registration under `key` to `new_key`; bytes are untouched.
    ///
    /// # Errors
    ///
    /// [`EntryError::FileKeyNotFound`] for unknown keys,
    /// [`StoreError::ModificationFailed`] if `new_key` is taken or the persist fails.
    pub fn rekey_file(&mut self, entry: &mut Entry, key: &str, new_key: &str) -> Result<()> {
        let relative = registered_file(entry, key)?;
        if key == new_key {
            return Ok(());
        }
        if entry.has_file(new_key) {
            return Err(modification_failed(
                entry.id(),
                format!("file key '{new_key}' is already in use"),
            ));
        }

        let previous = entry.files().clone();
        entry.files_mut().remove(key);
        entry.files_mut().insert(new_key.to_string(), relative);
        self.persist_files(entry, previous)
    }

    /// Delete the file registered under `key` and drop the registration.
    ///
    /// # Errors
    ///
    /// [`EntryError::FileKeyNotFound`] for unknown keys,
    /// [`StoreError::ModificationFailed`] if the delete or persist fails.
    pub fn remove_file(&mut self, entry: &mut Entry, key: &str) -> Result<()> {
        let relative = registered_file(entry, key)?;
        if let Some(folder) = entry.path() {
            fs::remove_file(&folder.join(&relative)).map_err(|e| modification_failed(entry.id(), e))?;
        }

        let previous = entry.files().clone();
        entry.files_mut().remove(key);
        self.persist_files(entry, previous)
    }

    /// Drop the registration under `key`, leaving the file on disk.
    ///
    /// # Errors
    ///
    /// [`EntryError::FileKeyNotFound`] for unknown keys,
    /// [`StoreError::ModificationFailed`] if the persist fails.
    pub fn unindex_file(&mut self, entry: &mut Entry, key: &str) -> Result<()> {
        registered_file(entry, key)?;
        let previous = entry.files().clone();
        entry.files_mut().remove(key);
        self.persist_files(entry, previous)
    }

    /// Best-effort total size of everything under the root, in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        fs::dir_size(&self.root)
    }

    fn persist_files(
        &mut self,
        entry: &mut Entry,
        previous: BTreeMap<String, PathBuf>,
    ) -> Result<()> {
        if let Err(e) = self.add(entry, &mut UnboundTracker) {
            entry.replace_files(previous);
            return Err(e);
        }
        Ok(())
    }

    fn target_folder(&self, entry: &Entry) -> Result<PathBuf> {
        let Some(relative) = self.sorter.relative_path(entry, &self.root) else {
            return self.id_folder(entry);
        };
        if !is_contained_relative(&relative) {
            warn!(
                "Ignoring unsafe folder suggestion {} for entry {}",
                relative.display(),
                entry.id()
            );
            return self.id_folder(entry);
        }

        let candidate = self.root.join(&relative);
        if self.owns(entry, &candidate) || !candidate.exists() {
            Ok(candidate)
        } else {
            debug!(
                "Folder {} is taken, placing entry {} in its id folder",
                candidate.display(),
                entry.id()
            );
            self.id_folder(entry)
        }
    }

    /// `<root>/<id>`, or `<root>/<id>-<n>` when that folder belongs to
    /// something else.
    fn id_folder(&self, entry: &Entry) -> Result<PathBuf> {
        let id = entry.id();
        if !is_folder_name(id) {
            return Err(modification_failed(
                id,
                "id can't be used as a folder name inside the store root",
            ));
        }

        let folder = self.root.join(id);
        if self.owns(entry, &folder) || !folder.exists() {
            return Ok(folder);
        }
        let mut suffix = 1u32;
        loop {
            let folder = self.root.join(format!("{id}-{suffix}"));
            if self.owns(entry, &folder) || !folder.exists() {
                warn!(
                    "Id folder for entry {} is taken, using {}",
                    id,
                    folder.display()
                );
                return Ok(folder);
            }
            suffix = suffix.saturating_add(1);
        }
    }

    /// Whether `folder` is where `entry` already lives.
    fn owns(&self, entry: &Entry, folder: &Path) -> bool {
        entry.path() == Some(folder)
            || self.index.get(entry.id()).map(PathBuf::as_path) == Some(folder)
    }

    fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative.trim_start_matches(['/', '\\']))
    }

    fn relativize(&self, folder: &Path) -> String {
        folder
            .strip_prefix(&self.root)
            .map_or_else(|_| folder.to_string_lossy().into_owned(), path_to_string)
    }

    fn save_index(&self) -> Result<()> {
        let raw: BTreeMap<&str, String> = self
            .index
            .iter()
            .map(|(id, folder)| (id.as_str(), self.relativize(folder)))
            .collect();
        fs::write_json(&self.index_path, &raw)
    }

    fn restore_index(&mut self, id: &str, previous: Option<PathBuf>) {
        match previous {
            Some(folder) => {
                self.index.insert(id.to_string(), folder);
            }
            None => {
                self.index.remove(id);
            }
        }
    }
}

/// Read and decode `<folder>/entry.json`, describing any failure as text.
fn read_entry(folder: &Path) -> std::result::Result<Entry, String> {
    let metadata_path = folder.join(ENTRY_FILE_NAME);
    let content = fs::read_to_string(&metadata_path).map_err(|e| e.to_string())?;
    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| format!("invalid JSON: {e}"))?;
    Entry::from_document(value).map_err(|e| e.to_string())
}

fn write_metadata(folder: &Path, entry: &Entry) -> Result<()> {
    fs::create_dir_all(folder)?;
    fs::write_json(&folder.join(ENTRY_FILE_NAME), &entry.to_document())
}

fn placed_folder(entry: &Entry) -> Result<PathBuf> {
    entry.path().map(Path::to_path_buf).ok_or_else(|| {
        Error::Entry(EntryError::NoFolder {
            id: entry.id().to_string(),
        })
    })
}

fn registered_file(entry: &Entry, key: &str) -> Result<PathBuf> {
    entry.files().get(key).cloned().ok_or_else(|| {
        Error::Entry(EntryError::FileKeyNotFound {
            id: entry.id().to_string(),
            key: key.to_string(),
        })
    })
}

fn check_relative(entry: &Entry, relative: &Path) -> Result<()> {
    if is_contained_relative(relative) && relative != Path::new(ENTRY_FILE_NAME) {
        return Ok(());
    }
    Err(modification_failed(
        entry.id(),
        format!(
            "{} is not a valid file name inside the entry folder",
            relative.display()
        ),
    ))
}

/// A single plain path component, so `<root>/<name>` stays a direct child.
fn is_folder_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(first)), None) if first == OsStr::new(name)
    )
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn creation_failed(root: &Path, e: Error) -> Error {
    Error::Store(StoreError::CreationFailed {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })
}

fn load_failed(path: &Path, e: Error) -> Error {
    Error::Store(StoreError::LoadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
