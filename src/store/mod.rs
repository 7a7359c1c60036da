mod memory;
mod sqlite;

use std::{
    io,
    ops::{ControlFlow, RangeInclusive},
    sync::Arc,
};

use thiserror::Error;

pub use memory::MemoryFolder;
pub use sqlite::SqliteFolder;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no message with id {0}")]
    NotFound(u64),
    #[error("id {0} is already taken")]
    Occupied(u64),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("could not migrate database: {0}")]
    Migration(#[from] rusqlite_migration::Error),
    #[error("IO issue with store: {0}")]
    Io(#[from] io::Error),
}

/// Keyed byte storage backing one folder.
///
/// Every entry carries a suffix telling which kind of payload it holds. Ids
/// are handed out in ascending order and are not reused while the folder
/// exists.
pub trait Folder: Send + Sync {
    fn name(&self) -> &str;

    /// The id the next call to [`Folder::insert_new_message`] will most likely use.
    fn next_id(&self) -> Result<u64, StoreError>;

    /// Calls `visit` with every entry of kind `suffix` whose id lies in `ids`,
    /// in ascending id order, until it returns [`ControlFlow::Break`].
    ///
    /// `visit` must not call back into the store.
    fn for_each_message(
        &self,
        ids: RangeInclusive<u64>,
        suffix: u64,
        visit: &mut dyn FnMut(u64, u64, &[u8]) -> ControlFlow<()>,
    ) -> Result<(), StoreError>;

    /// Returns suffix and content of the entry with `id`.
    fn get_message(&self, id: u64) -> Result<(u64, Vec<u8>), StoreError>;

    fn insert_new_message(&self, content: &[u8], suffix: u64) -> Result<u64, StoreError>;

    /// Inserts at a given id, failing with [`StoreError::Occupied`] if it is taken.
    fn insert_message(&self, id: u64, content: &[u8], suffix: u64) -> Result<(), StoreError>;

    fn delete_message(&self, id: u64) -> Result<(), StoreError>;
}

impl<T: Folder + ?Sized> Folder for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_id(&self) -> Result<u64, StoreError> {
        (**self).next_id()
    }

    fn for_each_message(
        &self,
        ids: RangeInclusive<u64>,
        suffix: u64,
        visit: &mut dyn FnMut(u64, u64, &[u8]) -> ControlFlow<()>,
    ) -> Result<(), StoreError> {
        (**self).for_each_message(ids, suffix, visit)
    }

    fn get_message(&self, id: u64) -> Result<(u64, Vec<u8>), StoreError> {
        (**self).get_message(id)
    }

    fn insert_new_message(&self, content: &[u8], suffix: u64) -> Result<u64, StoreError> {
        (**self).insert_new_message(content, suffix)
    }

    fn insert_message(&self, id: u64, content: &[u8], suffix: u64) -> Result<(), StoreError> {
        (**self).insert_message(id, content, suffix)
    }

    fn delete_message(&self, id: u64) -> Result<(), StoreError> {
        (**self).delete_message(id)
    }
}
