use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EditError, IoContext};

/// Settings for reading and rewriting containers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Suffix identifying the score document inside the container.
    pub document_extension: String,
    /// Inserted between the file stem and extension of the backup copy.
    pub backup_suffix: String,
    /// Deflate level applied to every member of a rewritten container (0-9).
    pub compression_level: i64,
    /// Insert a `trackName` into parts that have none instead of skipping them.
    pub create_missing_track_name: bool,
    /// Hash the backup against the original before touching the original.
    pub verify_backup: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            document_extension: ".mscx".to_string(),
            backup_suffix: "_backup".to_string(),
            compression_level: 6,
            create_missing_track_name: false,
            verify_backup: true,
        }
    }
}

impl EditorSettings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EditError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .io_context(|| format!("Failed to read settings from {}", path.display()))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, EditError> {
        let mut settings: Self = serde_json::from_str(text)?;
        settings.compression_level = settings.compression_level.clamp(0, 9);
        Ok(settings)
    }

    pub(crate) fn is_document(&self, member_name: &str) -> bool {
        member_name.ends_with(&self.document_extension)
    }
}
