//! Part records and the edit operations performed on them between load and save.

use serde::{Deserialize, Serialize};

use crate::error::EditError;

/// Placeholder used when a part lacks an id or a track name.
pub const UNKNOWN: &str = "Unknown";

/// One named part of a score.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRecord {
    pub id: String,
    /// Name persisted in the container.
    pub current_name: String,
    /// Name that the next save will write.
    pub proposed_name: String,
}

impl PartRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            proposed_name: name.clone(),
            current_name: name,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.proposed_name != self.current_name
    }
}

/// The ordered records of one loaded container.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartSet {
    records: Vec<PartRecord>,
}

impl PartSet {
    pub fn new(records: Vec<PartRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[PartRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [PartRecord] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PartRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Set the proposed name of every record carrying `id`.
    ///
    /// The name is trimmed first and must not end up empty.
    pub fn rename(&mut self, id: &str, name: &str) -> Result<(), EditError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EditError::EmptyName);
        }

        let mut found = false;
        for record in self.records.iter_mut().filter(|r| r.id == id) {
            record.proposed_name = name.to_string();
            found = true;
        }

        if found {
            Ok(())
        } else {
            Err(EditError::UnknownPart(id.to_string()))
        }
    }

    /// Drop all pending edits.
    pub fn reset_all(&mut self) {
        for record in &mut self.records {
            record.proposed_name.clone_from(&record.current_name);
        }
    }

    pub fn pending_changes(&self) -> impl Iterator<Item = &PartRecord> {
        self.records.iter().filter(|r| r.is_changed())
    }

    pub fn changed_count(&self) -> usize {
        self.pending_changes().count()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.records.iter().any(PartRecord::is_changed)
    }
}

/// Promote the proposed names of the records at `positions`. Returns how many changed.
pub(crate) fn commit(records: &mut [PartRecord], positions: &[usize]) -> usize {
    let mut changed = 0;
    for &position in positions {
        if let Some(record) = records.get_mut(position).filter(|r| r.is_changed()) {
            record.current_name.clone_from(&record.proposed_name);
            changed += 1;
        }
    }
    changed
}
