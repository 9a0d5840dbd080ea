//! Shelf Core Library
//!
//! An embedded, file-backed entry store and the playlists built on it:
//! - Entries: an id, a schema-less JSON document and named side files
//! - One folder per entry, named by a pluggable [`EntrySorter`]
//! - A root index that defines what is in the store, with quarantine of
//!   missing and corrupted entries at load time
//! - Copy-then-delete relocation with per-file progress reporting
//! - Playlists persisted as side files of a dedicated named entry
//!
//! Everything is synchronous and single-writer: one [`Store`] per root, used
//! from one thread at a time.
//!
//! ```rust,ignore
//! use shelf_core::{Entry, NameSorter, PlaylistSet, Result, Store};
//!
//! fn demo() -> Result<()> {
//!     let mut store = Store::open("/data/library", NameSorter)?;
//!     let mut entry = Entry::new_generated(Default::default());
//!     entry.set_name("Foo");
//!     let id = store.add(entry)?.id().to_string();
//!
//!     let mut playlists = PlaylistSet::open(&mut store)?;
//!     playlists.create(&mut store, "Favorites")?;
//!     playlists.playlist_mut(&mut store, "Favorites")?.add(&id)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod file_manager;
pub mod fs;
pub mod listener;
pub mod logging;
pub mod playlist;
pub mod progress;
pub mod sorter;
pub mod store;

pub use config::{ShelfConfig, SorterKind, default_library_directory, validate_library_directory};
pub use entry::{Document, Entry, EntryFilter, EntryKind, NAME_KEY};
pub use error::{
    EntryError, Error, ErrorKind, FileSystemError, PlaylistError, Result, StoreError,
};
pub use file_manager::{
    CorruptedEntry, ENTRY_FILE_NAME, FileManager, INDEX_FILE_NAME, LoadReport, MissingEntry,
};
pub use listener::{ListenerId, Listeners};
pub use logging::{LogRotation, LoggingConfig, LoggingError, LoggingGuard};
pub use playlist::{
    PLAYLISTS_ENTRY_ID, Playlist, PlaylistEvent, PlaylistMut, PlaylistSet, PlaylistSetEvent,
};
pub use progress::{CallbackTracker, ProgressTracker, ProgressUpdate, UnboundTracker};
pub use sorter::{EntrySorter, IdSorter, NameSorter, sanitize_folder_name};
pub use store::{EntryMut, Store};
