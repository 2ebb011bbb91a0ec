//! Verbatim pre-edit copies of a container.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::EditorSettings;
use crate::error::{EditError, IoContext};
use crate::hash;

/// The `attempt`-th backup name for `original`.
///
/// `score.mscz` gives `score_backup.mscz`, then `score_backup_1.mscz`,
/// `score_backup_2.mscz`, ...
pub fn backup_candidate(original: &Path, suffix: &str, attempt: usize) -> PathBuf {
    let mut name: OsString = original.file_stem().unwrap_or_default().to_os_string();
    name.push(suffix);
    if attempt > 0 {
        name.push(format!("_{attempt}"));
    }
    if let Some(ext) = original.extension() {
        name.push(".");
        name.push(ext);
    }
    original.with_file_name(name)
}

/// Copy `original` to the first free backup name and return that path.
///
/// The backup file is claimed with `create_new`, so an existing backup is
/// never overwritten. Permissions and modification time are carried over.
pub fn create_backup(original: &Path, settings: &EditorSettings) -> Result<PathBuf, EditError> {
    let source = File::open(original)
        .io_context(|| format!("Failed to open {}", original.display()))?;
    let metadata = source
        .metadata()
        .io_context(|| format!("Failed to read metadata of {}", original.display()))?;

    let (backup_path, target) = claim_backup_file(original, &settings.backup_suffix)?;
    debug!("Claimed backup path {}", backup_path.display());

    if let Err(err) = copy_into(source, target, &metadata) {
        let _ = fs::remove_file(&backup_path);
        return Err(err).io_context(|| {
            format!(
                "Failed to copy {} -> {}",
                original.display(),
                backup_path.display()
            )
        });
    }

    if settings.verify_backup {
        verify_copy(original, &backup_path)?;
    }

    info!("Backed up {} to {}", original.display(), backup_path.display());
    Ok(backup_path)
}

/// Compare the hashes of `original` and `backup`; a backup that does not
/// match is removed.
fn verify_copy(original: &Path, backup: &Path) -> Result<(), EditError> {
    let result = match (hash::sha256_file_hex(original), hash::sha256_file_hex(backup)) {
        (Ok(expected), Ok(actual)) if expected == actual => return Ok(()),
        (Ok(_), Ok(_)) => Err(EditError::BackupMismatch {
            original: original.to_path_buf(),
            backup: backup.to_path_buf(),
        }),
        (Err(err), _) | (_, Err(err)) => Err(err),
    };

    if let Err(err) = fs::remove_file(backup) {
        warn!("Failed to remove unverified backup {}: {}", backup.display(), err);
    }
    result
}

fn claim_backup_file(original: &Path, suffix: &str) -> Result<(PathBuf, File), EditError> {
    let mut attempt = 0;
    loop {
        let candidate = backup_candidate(original, suffix, attempt);
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(err) => {
                return Err(err)
                    .io_context(|| format!("Failed to create backup {}", candidate.display()))
            }
        }
    }
}

fn copy_into(source: File, target: File, metadata: &fs::Metadata) -> io::Result<()> {
    let mut reader = BufReader::new(source);
    let mut writer = BufWriter::new(target);
    io::copy(&mut reader, &mut writer)?;
    writer.flush()?;

    let target = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
    target.set_permissions(metadata.permissions())?;
    target.set_modified(metadata.modified()?)?;
    target.sync_all()
}
