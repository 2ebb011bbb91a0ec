//! Reading part names out of a container.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use log::{info, warn};
use zip::ZipArchive;

use crate::config::EditorSettings;
use crate::document::{self, PartNode};
use crate::error::{DocumentError, EditError, IoContext};
use crate::record::{PartRecord, UNKNOWN};

/// Load the part records of the container at `path` with default settings.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<PartRecord>, EditError> {
    load_with(path, &EditorSettings::default())
}

/// Load the part records of the container at `path`, in document order.
pub fn load_with(path: impl AsRef<Path>, settings: &EditorSettings) -> Result<Vec<PartRecord>, EditError> {
    let path = path.as_ref();
    let (member, text) = read_document(path, settings)?;

    let parts = document::scan_parts(document::without_bom(&text)).map_err(|source| EditError::Parse {
        member: member.clone(),
        source,
    })?;
    let records = to_records(parts);

    warn_on_duplicate_ids(&records);
    info!(
        "Loaded {} parts from {} ({})",
        records.len(),
        path.display(),
        member
    );
    Ok(records)
}

/// Name and text of the first score document inside the container.
pub fn read_document(path: &Path, settings: &EditorSettings) -> Result<(String, String), EditError> {
    let file = File::open(path).io_context(|| format!("Failed to open {}", path.display()))?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let member = find_document(&archive, settings).ok_or_else(|| EditError::NotFound {
        archive: path.to_path_buf(),
        extension: settings.document_extension.clone(),
    })?;

    let mut bytes = Vec::new();
    archive
        .by_name(&member)?
        .read_to_end(&mut bytes)
        .io_context(|| format!("Failed to read {} from {}", member, path.display()))?;

    let text = decode_document(&member, bytes)?;
    Ok((member, text))
}

/// First member, in archive order, whose name ends with the document extension.
pub fn find_document<R: Read + Seek>(archive: &ZipArchive<R>, settings: &EditorSettings) -> Option<String> {
    archive
        .file_names()
        .find(|name| settings.is_document(name))
        .map(str::to_string)
}

pub(crate) fn decode_document(member: &str, bytes: Vec<u8>) -> Result<String, EditError> {
    String::from_utf8(bytes).map_err(|e| EditError::Parse {
        member: member.to_string(),
        source: DocumentError::Encoding(e.utf8_error()),
    })
}

fn to_records(parts: Vec<PartNode>) -> Vec<PartRecord> {
    parts
        .into_iter()
        .map(|part| {
            let id = part.id.unwrap_or_else(|| UNKNOWN.to_string());
            let name = part
                .track_name
                .map(|slot| slot.text)
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string());
            PartRecord::new(id, name)
        })
        .collect()
}

fn warn_on_duplicate_ids(records: &[PartRecord]) {
    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.id.as_str()) {
            warn!("Part id {} appears more than once; renaming by id applies to all of them", record.id);
        }
    }
}
