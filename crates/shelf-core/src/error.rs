//! Error types for Shelf core operations.
//!
//! Errors are grouped by domain. [`Error`] wraps each domain enum so callers
//! can match broadly (`Error::Store(_)`) or precisely
//! (`Error::Store(StoreError::NotLoaded)`). [`Error::kind`] flattens the tree
//! into a copyable [`ErrorKind`] for presentation layers.
//!
//! Per-entry missing/corrupted conditions found while loading a store are not
//! errors: they are recorded as diagnostics on the store instead.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Shelf core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Store lifecycle or CRUD failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Entry decoding or per-entry file failure.
    #[error(transparent)]
    Entry(#[from] EntryError),

    /// Playlist failure.
    #[error(transparent)]
    Playlist(#[from] PlaylistError),

    /// Low-level file system failure.
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by the store and its file manager.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store root or its index could not be created.
    #[error("Failed to create store at {path}: {reason}")]
    CreationFailed {
        /// Store root.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// The index could not be read, or the load pass hit an unrecoverable I/O error.
    #[error("Failed to load store at {path}: {reason}")]
    LoadFailed {
        /// Path that could not be loaded.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// An add/update/delete/unindex could not complete.
    #[error("Failed to modify entry {id}: {reason}")]
    ModificationFailed {
        /// Entry id.
        id: String,
        /// Underlying cause.
        reason: String,
    },

    /// An indexed entry's metadata could not be re-read.
    #[error("Failed to fetch entry {id}: {reason}")]
    FetchFailed {
        /// Entry id.
        id: String,
        /// Underlying cause.
        reason: String,
    },

    /// An operation was called before the store was loaded.
    #[error("Store has not been loaded")]
    NotLoaded,

    /// The entry is not indexed by this store.
    #[error("Entry is not indexed: {id}")]
    NotIndexed {
        /// Entry id.
        id: String,
    },
}

/// Errors raised by entry decoding and per-entry file operations.
#[derive(Debug, Error)]
pub enum EntryError {
    /// The entry has no file registered under the given key.
    #[error("Entry {id} has no file with key '{key}'")]
    FileKeyNotFound {
        /// Entry id.
        id: String,
        /// Missing file key.
        key: String,
    },

    /// Copying a source file into the entry folder failed.
    #[error("Failed to copy {source_path} to {destination}: {reason}")]
    FileCopyFailed {
        /// Source file.
        source_path: PathBuf,
        /// Destination inside the entry folder.
        destination: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// The entry has not been placed in a folder yet.
    #[error("Entry {id} has no folder yet")]
    NoFolder {
        /// Entry id.
        id: String,
    },

    /// A metadata document could not be decoded into an entry.
    #[error("Failed to decode entry: {reason}")]
    Decode {
        /// Why decoding failed.
        reason: String,
    },
}

/// Errors raised by playlist operations.
#[derive(Debug, Error)]
pub enum PlaylistError {
    /// Playlist not found.
    #[error("Playlist not found: {name}")]
    NotFound {
        /// Playlist name.
        name: String,
    },

    /// Playlist file could not be read or parsed.
    #[error("Failed to read playlist '{name}': {reason}")]
    ReadFailed {
        /// Playlist name.
        name: String,
        /// Underlying cause.
        reason: String,
    },

    /// Playlist file or name list could not be written.
    #[error("Failed to write playlist '{name}': {reason}")]
    WriteFailed {
        /// Playlist name.
        name: String,
        /// Underlying cause.
        reason: String,
    },

    /// A playlist with this name (case-insensitively) already exists.
    #[error("Playlist already exists: {name}")]
    AlreadyExists {
        /// Playlist name.
        name: String,
    },

    /// Playlist name is not acceptable.
    #[error("Invalid playlist name '{name}': {reason}")]
    InvalidName {
        /// Rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Low-level file system errors, always carrying the offending path.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// Path does not exist.
    #[error("Path not found: {path}")]
    NotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// Read failed.
    #[error("Failed to read {path}: {reason}")]
    ReadFailed {
        /// Path being read.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// Write failed.
    #[error("Failed to write {path}: {reason}")]
    WriteFailed {
        /// Path being written.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// Directory creation failed.
    #[error("Failed to create directory {path}: {reason}")]
    CreateDirFailed {
        /// Directory being created.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// Delete failed.
    #[error("Failed to delete {path}: {reason}")]
    DeleteFailed {
        /// Path being deleted.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// Copy or rename failed.
    #[error("Failed to copy {source_path} to {destination}: {reason}")]
    CopyFailed {
        /// Source path.
        source_path: PathBuf,
        /// Destination path.
        destination: PathBuf,
        /// Underlying cause.
        reason: String,
    },
}

/// Flat error category, for callers that present errors rather than handle them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Store root or index could not be created.
    Creation,
    /// Store could not be loaded.
    Load,
    /// A mutation could not complete.
    Modification,
    /// An entry could not be re-read.
    Fetch,
    /// Operation called in the wrong lifecycle state.
    InvalidState,
    /// Unknown per-entry file key.
    FileKeyNotFound,
    /// Copying into an entry folder failed.
    FileCopy,
    /// Metadata could not be decoded.
    Decode,
    /// Playlist does not exist.
    PlaylistNotFound,
    /// Playlist could not be read.
    PlaylistRead,
    /// Playlist could not be written.
    PlaylistWrite,
    /// Playlist name already taken.
    PlaylistAlreadyExists,
    /// Playlist name rejected.
    InvalidPlaylistName,
    /// Raw file system failure.
    FileSystem,
    /// Configuration problem.
    Configuration,
    /// JSON (de)serialization failure.
    Serialization,
}

impl Error {
    /// Categorize this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(e) => match e {
                StoreError::CreationFailed { .. } => ErrorKind::Creation,
                StoreError::LoadFailed { .. } => ErrorKind::Load,
                StoreError::ModificationFailed { .. } => ErrorKind::Modification,
                StoreError::FetchFailed { .. } => ErrorKind::Fetch,
                StoreError::NotLoaded | StoreError::NotIndexed { .. } => ErrorKind::InvalidState,
            },
            Self::Entry(e) => match e {
                EntryError::FileKeyNotFound { .. } => ErrorKind::FileKeyNotFound,
                EntryError::FileCopyFailed { .. } => ErrorKind::FileCopy,
                EntryError::NoFolder { .. } => ErrorKind::InvalidState,
                EntryError::Decode { .. } => ErrorKind::Decode,
            },
            Self::Playlist(e) => match e {
                PlaylistError::NotFound { .. } => ErrorKind::PlaylistNotFound,
                PlaylistError::ReadFailed { .. } => ErrorKind::PlaylistRead,
                PlaylistError::WriteFailed { .. } => ErrorKind::PlaylistWrite,
                PlaylistError::AlreadyExists { .. } => ErrorKind::PlaylistAlreadyExists,
                PlaylistError::InvalidName { .. } => ErrorKind::InvalidPlaylistName,
            },
            Self::FileSystem(_) => ErrorKind::FileSystem,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether this error means the caller used an object in the wrong state.
    #[must_use]
    pub const fn is_invalid_state(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidState)
    }
}

/// Wrap any error as a modification failure for `id`.
pub(crate) fn modification_failed(id: &str, e: impl std::fmt::Display) -> Error {
    Error::Store(StoreError::ModificationFailed {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = Error::Store(StoreError::ModificationFailed {
            id: "ABC".to_string(),
            reason: "disk full".to_string(),
        });
        assert_eq!(err.to_string(), "Failed to modify entry ABC: disk full");
    }

    #[test]
    fn test_playlist_already_exists_display() {
        let err = Error::Playlist(PlaylistError::AlreadyExists {
            name: "Favorites".to_string(),
        });
        assert_eq!(err.to_string(), "Playlist already exists: Favorites");
    }

    #[test]
    fn test_file_system_error_display() {
        let err = Error::FileSystem(FileSystemError::ReadFailed {
            path: PathBuf::from("/test/path"),
            reason: "permission denied".to_string(),
        });
        assert!(err.to_string().contains("/test/path"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::Store(StoreError::NotLoaded).kind(), ErrorKind::InvalidState);
        assert_eq!(
            Error::Entry(EntryError::FileKeyNotFound {
                id: "X".to_string(),
                key: "cover".to_string(),
            })
            .kind(),
            ErrorKind::FileKeyNotFound
        );
        assert_eq!(
            Error::Playlist(PlaylistError::NotFound {
                name: "p".to_string()
            })
            .kind(),
            ErrorKind::PlaylistNotFound
        );
    }

    #[test]
    fn test_no_folder_is_invalid_state() {
        let err = Error::Entry(EntryError::NoFolder {
            id: "X".to_string(),
        });
        assert!(err.is_invalid_state());
    }

    #[test]
    fn test_serde_error_conversion() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = serde_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_modification_failed_helper() {
        let err = modification_failed("ID1", "boom");
        assert!(matches!(
            err,
            Error::Store(StoreError::ModificationFailed { ref id, .. }) if id == "ID1"
        ));
    }
}
