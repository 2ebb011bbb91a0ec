//! Writing edited part names back into a container.
//!
//! Order of operations:
//! 1. verified backup next to the original
//! 2. complete replacement container built in a scoped staging directory
//!    on the same filesystem as the original
//! 3. a single rename of the replacement over the original
//!
//! Anything failing before step 3 leaves the original untouched.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tempfile::TempDir;
use zip::read::ZipFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::backup;
use crate::config::EditorSettings;
use crate::document::{self, Renames, Rewrite};
use crate::error::{EditError, IoContext};
use crate::reader::{decode_document, read_document};
use crate::record::{self, PartRecord, UNKNOWN};

const STAGED_NAME: &str = "modified.mscz";

/// Outcome of a successful [`save`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveReport {
    /// Parts whose new name was written.
    pub changed_count: usize,
    pub backup_path: PathBuf,
    /// Ids of renamed parts left unchanged because they have no `trackName`.
    /// They stay pending.
    pub skipped: Vec<String>,
}

/// Write every pending rename in `records` into the container at `path`.
///
/// `records` must be the set loaded from `path`, in document order: each
/// record edits the part at its own position. Records whose new name was
/// written are committed (`current_name` takes the proposed value); on error
/// `records` is left as it was.
pub fn save(
    path: impl AsRef<Path>,
    records: &mut [PartRecord],
    settings: &EditorSettings,
) -> Result<SaveReport, EditError> {
    let path = path.as_ref();

    let plan = plan_save(path, records, settings)?;

    let backup_path = backup::create_backup(path, settings)?;

    let staging = staging_dir(path)?;
    let staged = staging.path().join(STAGED_NAME);
    write_container(path, &staged, &plan, settings)?;
    copy_permissions(path, &staged)?;

    fs::rename(&staged, path).io_context(|| {
        format!(
            "Failed to replace {} with {}",
            path.display(),
            staged.display()
        )
    })?;

    if let Err(err) = staging.close() {
        warn!("Failed to remove staging directory: {}", err);
    }

    let changed_count = record::commit(records, &plan.written);
    let skipped = ids_at(records, &plan.skipped);
    info!(
        "Saved {} part name change(s) to {} (backup: {})",
        changed_count,
        path.display(),
        backup_path.display()
    );
    if !skipped.is_empty() {
        warn!("Parts without trackName left pending: {}", skipped.join(", "));
    }

    Ok(SaveReport {
        changed_count,
        backup_path,
        skipped,
    })
}

/// Edits of one save, worked out in memory before the container is touched.
#[derive(Debug)]
struct SavePlan {
    /// Member the records were loaded from.
    member: String,
    /// Its rewritten text.
    document: String,
    written: Vec<usize>,
    skipped: Vec<usize>,
    /// Names applied by id to any further score documents in the container.
    shared: Renames,
}

fn plan_save(path: &Path, records: &[PartRecord], settings: &EditorSettings) -> Result<SavePlan, EditError> {
    let edits: BTreeMap<usize, String> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_changed())
        .map(|(position, r)| (position, r.proposed_name.clone()))
        .collect();
    if edits.is_empty() {
        return Err(EditError::NoChanges);
    }

    let (member, text) = read_document(path, settings)?;
    let rewrite = document::rewrite_track_names(
        &text,
        &Renames::ByPosition(edits),
        settings.create_missing_track_name,
    )
    .map_err(|source| EditError::Parse {
        member: member.clone(),
        source,
    })?;

    let loaded = records.iter().map(|r| r.id.as_str());
    let on_disk = rewrite.ids.iter().map(|id| id.as_deref().unwrap_or(UNKNOWN));
    if records.len() != rewrite.ids.len() || !loaded.eq(on_disk) {
        return Err(EditError::OutOfDate(path.to_path_buf()));
    }
    if rewrite.written.is_empty() {
        return Err(EditError::NothingWritable(ids_at(records, &rewrite.skipped)));
    }

    for &position in &rewrite.written {
        debug!(
            "{}: part {} -> {:?}",
            member, records[position].id, records[position].proposed_name
        );
    }

    Ok(SavePlan {
        shared: shared_renames(records, &rewrite),
        member,
        document: rewrite.text,
        written: rewrite.written,
        skipped: rewrite.skipped,
    })
}

/// Renames that other documents can apply by id: those where every part
/// carrying the id was written with the same name.
fn shared_renames(records: &[PartRecord], rewrite: &Rewrite) -> Renames {
    let written: HashSet<usize> = rewrite.written.iter().copied().collect();
    let mut names: HashMap<&str, Option<&str>> = HashMap::new();
    for (position, id) in rewrite.ids.iter().enumerate() {
        let Some(id) = id else { continue };
        let name = written
            .contains(&position)
            .then(|| records[position].proposed_name.as_str());
        names
            .entry(id.as_str())
            .and_modify(|seen| {
                if *seen != name {
                    *seen = None;
                }
            })
            .or_insert(name);
    }

    Renames::ById(
        names
            .into_iter()
            .filter_map(|(id, name)| Some((id.to_string(), name?.to_string())))
            .collect(),
    )
}

fn ids_at(records: &[PartRecord], positions: &[usize]) -> Vec<String> {
    positions
        .iter()
        .filter_map(|&position| records.get(position))
        .map(|r| r.id.clone())
        .collect()
}

/// Staging directory beside `path` so the final rename stays on one filesystem.
fn staging_dir(path: &Path) -> Result<TempDir, EditError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    tempfile::Builder::new()
        .prefix(".mscz-trackname-")
        .tempdir_in(parent)
        .io_context(|| format!("Failed to create staging directory in {}", parent.display()))
}

/// Rebuild `source` into `dest` with the planned document text.
///
/// Every member is recompressed with Deflate at the configured level; member
/// names, timestamps, permissions and (apart from documents) contents are kept.
fn write_container(
    source: &Path,
    dest: &Path,
    plan: &SavePlan,
    settings: &EditorSettings,
) -> Result<(), EditError> {
    let input = File::open(source).io_context(|| format!("Failed to open {}", source.display()))?;
    let mut archive = ZipArchive::new(BufReader::new(input))?;

    let output = File::create(dest).io_context(|| format!("Failed to create {}", dest.display()))?;
    let mut writer = ZipWriter::new(BufWriter::new(output));

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        let options = member_options(&entry, settings.compression_level);

        if entry.is_dir() {
            writer.add_directory(name, options)?;
            continue;
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .io_context(|| format!("Failed to read {} from {}", name, source.display()))?;

        if name == plan.member {
            data = plan.document.clone().into_bytes();
        } else if settings.is_document(&name) && !plan.shared.is_empty() {
            data = rewrite_document(&name, data, &plan.shared, settings)?;
        }

        writer.start_file(name.as_str(), options)?;
        writer
            .write_all(&data)
            .io_context(|| format!("Failed to write {} to {}", name, dest.display()))?;
    }

    let mut buffered = writer.finish()?;
    buffered
        .flush()
        .io_context(|| format!("Failed to flush {}", dest.display()))?;
    let file = buffered
        .into_inner()
        .map_err(|e| e.into_error())
        .io_context(|| format!("Failed to flush {}", dest.display()))?;
    file.sync_all()
        .io_context(|| format!("Failed to sync {}", dest.display()))?;

    Ok(())
}

fn member_options<R: std::io::Read>(entry: &ZipFile<'_, R>, level: i64) -> SimpleFileOptions {
    let mut options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level));
    if let Some(modified) = entry.last_modified() {
        options = options.last_modified_time(modified);
    }
    if let Some(mode) = entry.unix_mode() {
        options = options.unix_permissions(mode);
    }
    options
}

fn rewrite_document(
    member: &str,
    data: Vec<u8>,
    renames: &Renames,
    settings: &EditorSettings,
) -> Result<Vec<u8>, EditError> {
    let text = decode_document(member, data)?;
    let rewrite = document::rewrite_track_names(&text, renames, settings.create_missing_track_name)
        .map_err(|source| EditError::Parse {
            member: member.to_string(),
            source,
        })?;

    debug!("{}: {} part name(s) written by id", member, rewrite.written.len());
    Ok(rewrite.text.into_bytes())
}

fn copy_permissions(from: &Path, to: &Path) -> Result<(), EditError> {
    let permissions = fs::metadata(from)
        .io_context(|| format!("Failed to read metadata of {}", from.display()))?
        .permissions();
    fs::set_permissions(to, permissions)
        .io_context(|| format!("Failed to set permissions on {}", to.display()))
}
