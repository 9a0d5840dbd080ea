//! Playlists stored on top of the entry store.
//!
//! All playlists live on one named entry, [`PLAYLISTS_ENTRY_ID`]. Its document
//! holds the ordered list of playlist names under `playlists`, and each
//! playlist's members are a JSON side file registered on that entry under the
//! playlist's name:
//!
//! ```json
//! { "name": "Favorites", "entries": ["0F8E...", "A1B2..."] }
//! ```
//!
//! Names are unique ignoring case. [`PlaylistSet`] caches playlists as they
//! are read; edits go through a [`PlaylistMut`] handle, which writes the
//! backing file first and only then updates the cache and notifies listeners.

use std::collections::HashMap;
use std::collections::hash_map;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entry::{Document, Entry, EntryFilter};
use crate::error::{EntryError, Error, PlaylistError, Result};
use crate::file_manager::ENTRY_FILE_NAME;
use crate::fs;
use crate::listener::{ListenerId, Listeners};
use crate::sorter::sanitize_folder_name;
use crate::store::Store;

/// Id of the named entry that backs every playlist.
pub const PLAYLISTS_ENTRY_ID: &str = "Playlists";

/// Document key holding the ordered playlist names.
const NAMES_KEY: &str = "playlists";

/// On-disk shape of one playlist file.
#[derive(Debug, Serialize, Deserialize)]
struct PlaylistRecord {
    name: String,
    #[serde(default)]
    entries: Vec<String>,
}

/// Change to the set of playlist names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistSetEvent {
    /// A playlist was created.
    Created {
        /// New playlist name.
        name: String,
    },
    /// A playlist was deleted.
    Deleted {
        /// Deleted playlist name.
        name: String,
    },
    /// A playlist was renamed.
    Renamed {
        /// Name before the rename.
        old_name: String,
        /// Name after the rename.
        new_name: String,
    },
}

/// Change to one playlist's membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistEvent {
    /// Ids appended, in order.
    Added {
        /// Newly added ids.
        ids: Vec<String>,
    },
    /// Ids removed.
    Removed {
        /// Removed ids.
        ids: Vec<String>,
    },
    /// Every id removed.
    Cleared,
}

/// A named, ordered set of entry ids.
#[derive(Debug, Default)]
pub struct Playlist {
    name: String,
    entries: Vec<String>,
    listeners: Listeners<PlaylistEvent>,
}

impl Playlist {
    fn new(name: String, entries: Vec<String>) -> Self {
        Self {
            name,
            entries,
            listeners: Listeners::new(),
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member ids in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Whether `id` is a member.
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.entries.iter().any(|existing| existing == id)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the playlist has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl EntryFilter for Playlist {
    fn contains(&self, entry: &Entry) -> bool {
        self.has(entry.id())
    }
}

/// Every playlist in one store.
#[derive(Debug)]
pub struct PlaylistSet {
    names: Vec<String>,
    cache: HashMap<String, Playlist>,
    listeners: Listeners<PlaylistSetEvent>,
}

impl PlaylistSet {
    /// Read the playlist names from `store`, creating the backing entry if needed.
    pub fn open(store: &mut Store) -> Result<Self> {
        if store.get(PLAYLISTS_ENTRY_ID)?.is_none() {
            let mut document = Document::new();
            document.insert(NAMES_KEY.to_string(), Value::Array(Vec::new()));
            store.add(Entry::new_named(PLAYLISTS_ENTRY_ID, document))?;
            info!("Created playlist entry {}", PLAYLISTS_ENTRY_ID);
        }

        let names = read_names(playlists_entry(store)?)?;
        debug!("Opened {} playlists", names.len());
        Ok(Self {
            names,
            cache: HashMap::new(),
            listeners: Listeners::new(),
        })
    }

    /// Playlist names in creation order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether a playlist with this name exists, ignoring case.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Number of playlists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether there are no playlists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Look up a playlist by name, ignoring case, reading it from disk on first use.
    ///
    /// # Errors
    ///
    /// [`PlaylistError::ReadFailed`] if the name is listed but its file
    /// can't be read.
    pub fn get(&mut self, store: &Store, name: &str) -> Result<Option<&Playlist>> {
        let Some(position) = self.find(name) else {
            return Ok(None);
        };
        let canonical = &self.names[position];

        match self.cache.entry(cache_key(canonical)) {
            hash_map::Entry::Occupied(slot) => Ok(Some(slot.into_mut())),
            hash_map::Entry::Vacant(slot) => {
                let playlist = read_playlist(store, canonical)?;
                debug!("Cached playlist {}", canonical);
                Ok(Some(slot.insert(playlist)))
            }
        }
    }

    /// Create an empty playlist.
    ///
    /// # Errors
    ///
    /// [`PlaylistError::InvalidName`] for blank names,
    /// [`PlaylistError::AlreadyExists`] if the name is taken ignoring case,
    /// [`PlaylistError::WriteFailed`] if anything can't be persisted.
    pub fn create(&mut self, store: &mut Store, name: &str) -> Result<&Playlist> {
        let name = validate_name(name)?;
        if self.contains(&name) {
            return Err(Error::Playlist(PlaylistError::AlreadyExists { name }));
        }

        let file_name = file_name_for(playlists_entry(store)?, &name, &name);
        store
            .add_file(PLAYLISTS_ENTRY_ID, &name, None, &file_name)
            .map_err(|e| write_failed(&name, e))?;
        if let Err(e) = write_record(store, &name, &[]) {
            discard_file(store, &name);
            return Err(e);
        }

        self.names.push(name.clone());
        if let Err(e) = persist_names(store, &self.names, &name) {
            self.names.pop();
            discard_file(store, &name);
            return Err(e);
        }

        info!("Created playlist {}", name);
        self.listeners
            .notify(&PlaylistSetEvent::Created { name: name.clone() });
        let playlist = Playlist::new(name.clone(), Vec::new());
        Ok(self
            .cache
            .entry(cache_key(&name))
            .insert_entry(playlist)
            .into_mut())
    }

    /// Delete a playlist and its file.
    ///
    /// # Errors
    ///
    /// [`PlaylistError::NotFound`] for unknown names,
    /// [`PlaylistError::WriteFailed`] if the name list can't be persisted.
    pub fn delete(&mut self, store: &mut Store, name: &str) -> Result<()> {
        let position = self.find(name).ok_or_else(|| not_found(name))?;
        let canonical = self.names.remove(position);
        if let Err(e) = persist_names(store, &self.names, &canonical) {
            self.names.insert(position, canonical);
            return Err(e);
        }

        self.cache.remove(&cache_key(&canonical));
        discard_file(store, &canonical);
        info!("Deleted playlist {}", canonical);
        self.listeners
            .notify(&PlaylistSetEvent::Deleted { name: canonical });
        Ok(())
    }

    /// Handle for editing one playlist.
    ///
    /// # Errors
    ///
    /// [`PlaylistError::NotFound`] for unknown names,
    /// [`PlaylistError::ReadFailed`] if its file can't be read.
    pub fn playlist_mut<'a>(
        &'a mut self,
        store: &'a mut Store,
        name: &str,
    ) -> Result<PlaylistMut<'a>> {
        if self.get(store, name)?.is_none() {
            return Err(not_found(name));
        }
        let position = self.find(name).ok_or_else(|| not_found(name))?;
        let playlist = self
            .cache
            .remove(&cache_key(&self.names[position]))
            .ok_or_else(|| not_found(name))?;

        Ok(PlaylistMut {
            set: self,
            store,
            playlist,
            deleted: false,
        })
    }

    /// Subscribe to creations, deletions and renames.
    pub fn add_change_listener(
        &mut self,
        listener: impl FnMut(&PlaylistSetEvent) + 'static,
    ) -> ListenerId {
        self.listeners.add(listener)
    }

    /// Unsubscribe. Returns `false` if `id` wasn't subscribed.
    pub fn remove_change_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn find(&self, name: &str) -> Option<usize> {
        let key = cache_key(name.trim());
        self.names.iter().position(|existing| cache_key(existing) == key)
    }
}

/// Exclusive handle on one playlist.
///
/// Every edit writes the playlist file before touching memory, so a failed
/// write leaves the playlist as it was. Listeners only hear about edits that
/// changed something.
pub struct PlaylistMut<'a> {
    set: &'a mut PlaylistSet,
    store: &'a mut Store,
    playlist: Playlist,
    deleted: bool,
}

impl std::fmt::Debug for PlaylistMut<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistMut")
            .field("playlist", &self.playlist)
            .finish_non_exhaustive()
    }
}

impl Deref for PlaylistMut<'_> {
    type Target = Playlist;

    fn deref(&self) -> &Playlist {
        &self.playlist
    }
}

impl Drop for PlaylistMut<'_> {
    fn drop(&mut self) {
        if !self.deleted {
            let playlist = std::mem::take(&mut self.playlist);
            self.set.cache.insert(cache_key(&playlist.name), playlist);
        }
    }
}

impl PlaylistMut<'_> {
    /// Append `id` unless already present. Returns whether it was added.
    pub fn add(&mut self, id: &str) -> Result<bool> {
        Ok(self.add_all([id])? > 0)
    }

    /// Append every id not already present, in order. Returns how many were added.
    pub fn add_all<I, S>(&mut self, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = self.playlist.entries.clone();
        let mut added = Vec::new();
        for id in ids {
            let id = id.as_ref();
            if !entries.iter().any(|existing| existing == id) {
                entries.push(id.to_string());
                added.push(id.to_string());
            }
        }
        if added.is_empty() {
            return Ok(0);
        }

        write_record(self.store, &self.playlist.name, &entries)?;
        self.playlist.entries = entries;
        let count = added.len();
        debug!("Added {} entries to playlist {}", count, self.playlist.name);
        self.playlist
            .listeners
            .notify(&PlaylistEvent::Added { ids: added });
        Ok(count)
    }

    /// Remove `id`. Returns whether it was a member.
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        Ok(self.remove_all([id])? > 0)
    }

    /// Remove every listed id. Returns how many were members.
    pub fn remove_all<I, S>(&mut self, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = self.playlist.entries.clone();
        let mut removed = Vec::new();
        for id in ids {
            let id = id.as_ref();
            if let Some(position) = entries.iter().position(|existing| existing == id) {
                removed.push(entries.remove(position));
            }
        }
        if removed.is_empty() {
            return Ok(0);
        }

        write_record(self.store, &self.playlist.name, &entries)?;
        self.playlist.entries = entries;
        let count = removed.len();
        debug!("Removed {} entries from playlist {}", count, self.playlist.name);
        self.playlist
            .listeners
            .notify(&PlaylistEvent::Removed { ids: removed });
        Ok(count)
    }

    /// Remove every member.
    pub fn clear(&mut self) -> Result<()> {
        if self.playlist.entries.is_empty() {
            return Ok(());
        }
        write_record(self.store, &self.playlist.name, &[])?;
        self.playlist.entries.clear();
        self.playlist.listeners.notify(&PlaylistEvent::Cleared);
        Ok(())
    }

    /// Rename the playlist, keeping its members and its place in the name list.
    ///
    /// Changing only the case of the name is allowed.
    ///
    /// # Errors
    ///
    /// [`PlaylistError::AlreadyExists`] if another playlist has the name,
    /// [`PlaylistError::WriteFailed`] if the rename can't be persisted; the
    /// playlist keeps its old name in that case.
    pub fn rename(&mut self, new_name: &str) -> Result<()> {
        let new_name = validate_name(new_name)?;
        let old_name = self.playlist.name.clone();
        if new_name == old_name {
            return Ok(());
        }
        if let Some(position) = self.set.find(&new_name)
            && cache_key(&self.set.names[position]) != cache_key(&old_name)
        {
            return Err(Error::Playlist(PlaylistError::AlreadyExists {
                name: new_name,
            }));
        }
        let position = self
            .set
            .find(&old_name)
            .ok_or_else(|| not_found(&old_name))?;

        let entry = playlists_entry(self.store)?;
        let old_file = entry
            .files()
            .get(&old_name)
            .cloned()
            .ok_or_else(|| write_failed(&old_name, "playlist has no backing file"))?;
        let new_file = file_name_for(entry, &old_name, &new_name);

        self.store
            .rename_file(PLAYLISTS_ENTRY_ID, &old_name, &new_file)
            .map_err(|e| write_failed(&old_name, e))?;
        if let Err(e) = self
            .store
            .rekey_file(PLAYLISTS_ENTRY_ID, &old_name, &new_name)
        {
            restore_file_name(self.store, &old_name, &old_file);
            return Err(write_failed(&old_name, e));
        }

        let renamed = write_record(self.store, &new_name, &self.playlist.entries).and_then(|()| {
            self.set.names[position].clone_from(&new_name);
            persist_names(self.store, &self.set.names, &new_name)
        });
        if let Err(e) = renamed {
            self.set.names[position].clone_from(&old_name);
            if let Err(undo) = self
                .store
                .rekey_file(PLAYLISTS_ENTRY_ID, &new_name, &old_name)
            {
                warn!("Failed to restore playlist key {}: {}", old_name, undo);
            }
            restore_file_name(self.store, &old_name, &old_file);
            return Err(e);
        }

        self.playlist.name.clone_from(&new_name);
        info!("Renamed playlist {} to {}", old_name, new_name);
        self.set
            .listeners
            .notify(&PlaylistSetEvent::Renamed { old_name, new_name });
        Ok(())
    }

    /// Delete this playlist and its file.
    pub fn delete(mut self) -> Result<()> {
        let name = self.playlist.name.clone();
        self.set.delete(self.store, &name)?;
        self.deleted = true;
        Ok(())
    }

    /// Subscribe to membership changes.
    pub fn add_listener(&mut self, listener: impl FnMut(&PlaylistEvent) + 'static) -> ListenerId {
        self.playlist.listeners.add(listener)
    }

    /// Unsubscribe. Returns `false` if `id` wasn't subscribed.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.playlist.listeners.remove(id)
    }
}

fn cache_key(name: &str) -> String {
    name.to_lowercase()
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Playlist(PlaylistError::InvalidName {
            name: name.to_string(),
            reason: "name is empty".to_string(),
        }));
    }
    Ok(trimmed.to_string())
}

fn not_found(name: &str) -> Error {
    Error::Playlist(PlaylistError::NotFound {
        name: name.to_string(),
    })
}

fn read_failed(name: &str, e: impl std::fmt::Display) -> Error {
    Error::Playlist(PlaylistError::ReadFailed {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn write_failed(name: &str, e: impl std::fmt::Display) -> Error {
    Error::Playlist(PlaylistError::WriteFailed {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn playlists_entry(store: &Store) -> Result<&Entry> {
    store
        .get(PLAYLISTS_ENTRY_ID)?
        .ok_or_else(|| read_failed(PLAYLISTS_ENTRY_ID, "playlist entry is not in the store"))
}

fn read_names(entry: &Entry) -> Result<Vec<String>> {
    match entry.document().get(NAMES_KEY) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| read_failed(PLAYLISTS_ENTRY_ID, "playlist name is not a string"))
            })
            .collect(),
        Some(_) => Err(read_failed(
            PLAYLISTS_ENTRY_ID,
            "playlist names are not a list",
        )),
    }
}

fn backing_file(store: &Store, name: &str) -> Result<PathBuf> {
    let entry = playlists_entry(store)?;
    entry.get_file(name).ok_or_else(|| {
        Error::Entry(EntryError::FileKeyNotFound {
            id: PLAYLISTS_ENTRY_ID.to_string(),
            key: name.to_string(),
        })
    })
}

fn read_playlist(store: &Store, name: &str) -> Result<Playlist> {
    let path = backing_file(store, name).map_err(|e| read_failed(name, e))?;
    let record: PlaylistRecord = fs::read_json(&path).map_err(|e| read_failed(name, e))?;

    let mut entries: Vec<String> = Vec::with_capacity(record.entries.len());
    for id in record.entries {
        if !entries.contains(&id) {
            entries.push(id);
        }
    }
    Ok(Playlist::new(name.to_string(), entries))
}

fn write_record(store: &Store, name: &str, entries: &[String]) -> Result<()> {
    let path = backing_file(store, name).map_err(|e| write_failed(name, e))?;
    let record = PlaylistRecord {
        name: name.to_string(),
        entries: entries.to_vec(),
    };
    fs::write_json(&path, &record).map_err(|e| write_failed(name, e))
}

fn persist_names(store: &mut Store, names: &[String], context: &str) -> Result<()> {
    let mut handle = store
        .entry_mut(PLAYLISTS_ENTRY_ID)
        .map_err(|e| write_failed(context, e))?;
    let value = Value::Array(names.iter().cloned().map(Value::String).collect());
    let previous = handle.document_mut().insert(NAMES_KEY.to_string(), value);

    if let Err(e) = handle.update() {
        match previous {
            Some(previous) => {
                handle.document_mut().insert(NAMES_KEY.to_string(), previous);
            }
            None => {
                handle.document_mut().remove(NAMES_KEY);
            }
        }
        return Err(write_failed(context, e));
    }
    Ok(())
}

/// Playlist file name for `name`: the sanitised name, or a random one if that
/// is unusable or already taken by a key other than `own_key`.
fn file_name_for(entry: &Entry, own_key: &str, name: &str) -> PathBuf {
    let base = sanitize_folder_name(name);
    if !base.is_empty() {
        let candidate = format!("{base}.json");
        let lowered = candidate.to_lowercase();
        let taken = lowered == ENTRY_FILE_NAME
            || entry.files().iter().any(|(key, path)| {
                key != own_key && path.to_string_lossy().to_lowercase() == lowered
            });
        if !taken {
            return PathBuf::from(candidate);
        }
    }
    PathBuf::from(format!("playlist-{}.json", Uuid::new_v4().simple()))
}

fn discard_file(store: &mut Store, name: &str) {
    if let Err(e) = store.remove_file(PLAYLISTS_ENTRY_ID, name) {
        warn!("Failed to remove playlist file for {}: {}", name, e);
    }
}

fn restore_file_name(store: &mut Store, key: &str, file: &Path) {
    if let Err(e) = store.rename_file(PLAYLISTS_ENTRY_ID, key, file) {
        warn!("Failed to restore playlist file {}: {}", file.display(), e);
    }
}
