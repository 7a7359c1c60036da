use std::{
    collections::BTreeMap,
    ops::{ControlFlow, RangeInclusive},
    sync::Mutex,
};

use log::trace;

use crate::store::{Folder, StoreError};

#[derive(Debug)]
struct Entries {
    messages: BTreeMap<u64, (u64, Vec<u8>)>,
    next_id: u64,
}

/// Folder kept entirely in memory. Nothing survives the process.
#[derive(Debug)]
pub struct MemoryFolder {
    name: String,
    entries: Mutex<Entries>,
}

impl MemoryFolder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(Entries {
                messages: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries
            .lock()
            .expect("memory folder lock should be acquirable")
    }
}

impl Folder for MemoryFolder {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_id(&self) -> Result<u64, StoreError> {
        Ok(self.entries().next_id)
    }

    fn for_each_message(
        &self,
        ids: RangeInclusive<u64>,
        suffix: u64,
        visit: &mut dyn FnMut(u64, u64, &[u8]) -> ControlFlow<()>,
    ) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let selected: Vec<(u64, Vec<u8>)> = self
            .entries()
            .messages
            .range(ids)
            .filter(|(_, (entry_suffix, _))| *entry_suffix == suffix)
            .map(|(id, (_, content))| (*id, content.clone()))
            .collect();

        for (id, content) in selected {
            if visit(id, suffix, &content).is_break() {
                trace!("stopped iterating {} at {id}", self.name);
                break;
            }
        }
        Ok(())
    }

    fn get_message(&self, id: u64) -> Result<(u64, Vec<u8>), StoreError> {
        self.entries()
            .messages
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn insert_new_message(&self, content: &[u8], suffix: u64) -> Result<u64, StoreError> {
        let mut entries = self.entries();
        let id = entries.next_id;
        entries.next_id += 1;
        entries.messages.insert(id, (suffix, content.to_vec()));
        Ok(id)
    }

    fn insert_message(&self, id: u64, content: &[u8], suffix: u64) -> Result<(), StoreError> {
        let mut entries = self.entries();
        if entries.messages.contains_key(&id) {
            return Err(StoreError::Occupied(id));
        }
        entries.messages.insert(id, (suffix, content.to_vec()));
        entries.next_id = entries.next_id.max(id.saturating_add(1));
        Ok(())
    }

    fn delete_message(&self, id: u64) -> Result<(), StoreError> {
        self.entries()
            .messages
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use rstest::*;

    use super::*;

    #[fixture]
    fn folder() -> MemoryFolder {
        let folder = MemoryFolder::new("Inbox");
        for content in [b"one", b"two", b"six"] {
            assert_ok!(folder.insert_new_message(content, 2));
        }
        assert_ok!(folder.insert_message(10, b"other kind", 1));
        folder
    }

    #[rstest]
    fn test_for_each_visits_matching_suffix_in_order(folder: MemoryFolder) {
        let mut seen = Vec::new();
        assert_ok!(folder.for_each_message(0..=u64::MAX, 2, &mut |id, _, content| {
            seen.push((id, content.to_vec()));
            ControlFlow::Continue(())
        }));
        assert_eq!(
            vec![(1, b"one".to_vec()), (2, b"two".to_vec()), (3, b"six".to_vec())],
            seen
        );
    }

    #[rstest]
    fn test_for_each_stops_on_break(folder: MemoryFolder) {
        let mut visited = 0;
        assert_ok!(folder.for_each_message(2..=3, 2, &mut |_, _, _| {
            visited += 1;
            ControlFlow::Break(())
        }));
        assert_eq!(1, visited);
    }

    #[rstest]
    fn test_ids_are_not_reused(folder: MemoryFolder) {
        assert_ok!(folder.delete_message(3));
        assert_eq!(11, assert_ok!(folder.next_id()));
        assert_eq!(11, assert_ok!(folder.insert_new_message(b"new", 2)));
    }

    #[rstest]
    fn test_insert_message_refuses_taken_id(folder: MemoryFolder) {
        assert_matches!(
            folder.insert_message(2, b"clash", 2),
            Err(StoreError::Occupied(2))
        );
    }

    #[rstest]
    fn test_missing_ids_are_not_found(folder: MemoryFolder) {
        assert_matches!(folder.get_message(4), Err(StoreError::NotFound(4)));
        assert_matches!(folder.delete_message(4), Err(StoreError::NotFound(4)));
    }
}
