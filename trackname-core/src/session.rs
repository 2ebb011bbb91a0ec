//! Load/edit/save cycle for one container at a time.

use std::path::{Path, PathBuf};

use log::info;

use crate::config::EditorSettings;
use crate::error::EditError;
use crate::numbering::apply_bulk_numbering;
use crate::reader::load_with;
use crate::record::PartSet;
use crate::rewriter::{save, SaveReport};

/// What to do with unsaved edits before opening another file or exiting.
///
/// Produced by the presentation layer; the session never asks by itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingDecision {
    SaveThenProceed,
    DiscardAndProceed,
    Cancel,
}

/// Result of [`EditorSession::resolve_pending`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing was pending, or the edits were discarded.
    Proceed,
    /// Edits were written first.
    Saved(SaveReport),
    Cancelled,
}

impl Resolution {
    pub fn may_proceed(&self) -> bool {
        !matches!(self, Resolution::Cancelled)
    }
}

#[derive(Debug, Default)]
pub struct EditorSession {
    settings: EditorSettings,
    current_file: Option<PathBuf>,
    parts: PartSet,
}

impl EditorSession {
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            settings,
            current_file: None,
            parts: PartSet::default(),
        }
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    pub fn parts(&self) -> &PartSet {
        &self.parts
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.parts.has_unsaved_changes()
    }

    /// Load `path`, replacing the current record set. Returns the part count.
    ///
    /// Unsaved edits are dropped; call [`Self::resolve_pending`] first to keep them.
    /// If loading fails the previous file and records stay in place.
    pub fn open(&mut self, path: impl Into<PathBuf>) -> Result<usize, EditError> {
        let path = path.into();
        let records = load_with(&path, &self.settings)?;
        self.parts = PartSet::new(records);
        self.current_file = Some(path);
        Ok(self.parts.len())
    }

    /// Load the current file again, dropping unsaved edits.
    pub fn reload(&mut self) -> Result<usize, EditError> {
        let path = self.current_file.clone().ok_or(EditError::NoFileOpen)?;
        self.open(path)
    }

    pub fn rename(&mut self, id: &str, name: &str) -> Result<(), EditError> {
        self.parts.rename(id, name)
    }

    /// Number duplicate names. Returns how many parts were numbered.
    pub fn number_duplicates(&mut self) -> usize {
        apply_bulk_numbering(self.parts.records_mut())
    }

    pub fn reset_all(&mut self) {
        self.parts.reset_all();
    }

    pub fn save(&mut self) -> Result<SaveReport, EditError> {
        let path = self.current_file.as_deref().ok_or(EditError::NoFileOpen)?;
        save(path, self.parts.records_mut(), &self.settings)
    }

    /// Act on the user's answer to "save before continuing?".
    ///
    /// A failed save is returned as an error and the edits are kept.
    pub fn resolve_pending(&mut self, decision: PendingDecision) -> Result<Resolution, EditError> {
        if !self.has_unsaved_changes() {
            return Ok(Resolution::Proceed);
        }

        match decision {
            PendingDecision::SaveThenProceed => self.save().map(Resolution::Saved),
            PendingDecision::DiscardAndProceed => {
                info!("Discarding {} unsaved change(s)", self.parts.changed_count());
                self.reset_all();
                Ok(Resolution::Proceed)
            }
            PendingDecision::Cancel => Ok(Resolution::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PartRecord;

    fn session_with(records: Vec<PartRecord>) -> EditorSession {
        let mut session = EditorSession::default();
        session.parts = PartSet::new(records);
        session
    }

    #[test]
    fn save_without_file_is_rejected() {
        let mut session = session_with(vec![PartRecord::new("1", "Horn")]);
        session.rename("1", "Horn in F").unwrap();
        assert!(matches!(session.save(), Err(EditError::NoFileOpen)));
        assert!(matches!(session.reload(), Err(EditError::NoFileOpen)));
    }

    #[test]
    fn nothing_pending_always_proceeds() {
        let mut session = session_with(vec![PartRecord::new("1", "Horn")]);
        for decision in [
            PendingDecision::SaveThenProceed,
            PendingDecision::DiscardAndProceed,
            PendingDecision::Cancel,
        ] {
            assert_eq!(session.resolve_pending(decision).unwrap(), Resolution::Proceed);
        }
    }

    #[test]
    fn discard_resets_and_cancel_keeps_edits() {
        let mut session = session_with(vec![PartRecord::new("1", "Horn")]);
        session.rename("1", "Horn in F").unwrap();

        let cancelled = session.resolve_pending(PendingDecision::Cancel).unwrap();
        assert!(!cancelled.may_proceed());
        assert!(session.has_unsaved_changes());

        let discarded = session.resolve_pending(PendingDecision::DiscardAndProceed).unwrap();
        assert!(discarded.may_proceed());
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn numbering_goes_through_the_session() {
        let mut session = session_with(vec![
            PartRecord::new("1", "Trumpet"),
            PartRecord::new("2", "Trumpet"),
        ]);
        assert_eq!(session.number_duplicates(), 2);
        assert_eq!(session.parts().get("2").unwrap().proposed_name, "Trumpet 2");
    }
}
