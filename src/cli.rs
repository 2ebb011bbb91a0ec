//! Command-line interface for mscz-trackname

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use trackname_core::EditorSettings;

use crate::display::Theme;

#[derive(Parser)]
#[command(name = "mscz-trackname")]
#[command(about = "MuseScore track name editor - rename parts inside .mscz files", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

#[derive(Args)]
pub struct SettingsArgs {
    /// JSON settings file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Deflate level for the rewritten archive (0-9)
    #[arg(long, global = true, value_parser = clap::value_parser!(i64).range(0..=9))]
    pub compression_level: Option<i64>,

    /// Suffix for backup copies (default: _backup)
    #[arg(long, global = true)]
    pub backup_suffix: Option<String>,

    /// Insert a trackName into parts that have none
    #[arg(long, global = true)]
    pub create_missing: bool,

    /// Skip hashing the backup against the original
    #[arg(long, global = true)]
    pub no_verify_backup: bool,

    /// Colour scheme for part tables
    #[arg(long, global = true, value_enum, default_value_t = Theme::Plain)]
    pub theme: Theme,
}

impl SettingsArgs {
    /// Settings file first, then command-line overrides.
    pub fn resolve(&self) -> Result<EditorSettings> {
        let mut settings = match &self.config {
            Some(path) => EditorSettings::from_json_file(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => EditorSettings::default(),
        };

        if let Some(level) = self.compression_level {
            settings.compression_level = level;
        }
        if let Some(suffix) = &self.backup_suffix {
            settings.backup_suffix.clone_from(suffix);
        }
        if self.create_missing {
            settings.create_missing_track_name = true;
        }
        if self.no_verify_backup {
            settings.verify_backup = false;
        }

        Ok(settings)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the parts of a score
    List {
        /// Score file (.mscz)
        file: PathBuf,

        /// Print the parts as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rename parts by id
    Rename {
        /// Score file (.mscz)
        file: PathBuf,

        /// New name for a part, as ID=NAME (can be specified multiple times)
        #[arg(short, long = "set", value_name = "ID=NAME", required = true, value_parser = parse_assignment)]
        set: Vec<(String, String)>,

        /// Number duplicate names before applying --set
        #[arg(long)]
        number_duplicates: bool,

        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Number parts that share a name ("Violin" -> "Violin 1", "Violin 2")
    Number {
        /// Score files or directories (can be specified multiple times)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Interactive editor
    Edit {
        /// Score file to open on start
        file: Option<PathBuf>,
    },
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (id, name) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=NAME, got {raw:?}"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing part id in {raw:?}"));
    }
    Ok((id.to_string(), name.to_string()))
}
