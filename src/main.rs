//! mscz-trackname - rename the parts of MuseScore .mscz files

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::io;
use std::path::{Path, PathBuf};
use trackname_core::{load_with, EditError, EditorSession, EditorSettings};

mod cli;
mod display;
mod interactive;

use cli::{Cli, Commands};
use display::DisplayConfig;
use interactive::Editor;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let settings = cli.settings.resolve()?;
    let display = DisplayConfig {
        theme: cli.settings.theme,
    };

    match cli.command.unwrap_or(Commands::Edit { file: None }) {
        Commands::List { file, json } => {
            let parts = load_with(&file, &settings)
                .with_context(|| format!("Failed to load {}", file.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&parts)?);
            } else {
                println!("{}: {} parts", file.display(), parts.len());
                display::write_parts(&mut io::stdout().lock(), &parts, &display)?;
            }
            Ok(())
        }

        Commands::Rename {
            file,
            set,
            number_duplicates,
            dry_run,
        } => {
            let mut session = EditorSession::new(settings);
            session
                .open(&file)
                .with_context(|| format!("Failed to load {}", file.display()))?;

            if number_duplicates {
                session.number_duplicates();
            }
            for (id, name) in &set {
                session
                    .rename(id, name)
                    .with_context(|| format!("Cannot rename part {id}"))?;
            }

            display::write_parts(&mut io::stdout().lock(), session.parts().records(), &display)?;
            if dry_run {
                println!();
                println!("Dry run: {} change(s) not written", session.parts().changed_count());
                return Ok(());
            }

            println!();
            save_session(&mut session, &file)
        }

        Commands::Number { inputs, dry_run } => number_files(&inputs, settings, &display, dry_run),

        Commands::Edit { file } => {
            let mut session = EditorSession::new(settings);
            let stdin = io::stdin();
            Editor::new(&mut session, display, stdin.lock(), io::stdout()).run(file)
        }
    }
}

fn save_session(session: &mut EditorSession, file: &Path) -> Result<()> {
    match session.save() {
        Ok(report) => {
            display::write_report(&mut io::stdout().lock(), &report)?;
            Ok(())
        }
        Err(EditError::NoChanges) => {
            println!("No changes to save");
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("Failed to save {}", file.display())),
    }
}

fn number_files(inputs: &[PathBuf], settings: EditorSettings, display: &DisplayConfig, dry_run: bool) -> Result<()> {
    let files = collect_files(inputs, &settings);
    if files.is_empty() {
        return Err(anyhow!("No .mscz files found"));
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut session = EditorSession::new(settings);
    let mut saved = 0;
    let mut failed = 0;

    for file in &files {
        pb.set_message(file.display().to_string());

        let outcome = session.open(file).and_then(|_| {
            if session.number_duplicates() == 0 {
                return Ok(None);
            }
            if dry_run {
                return Ok(Some(None));
            }
            session.save().map(|report| Some(Some(report)))
        });

        match outcome {
            Ok(None) => pb.println(format!("{}: no duplicate part names", file.display())),
            Ok(Some(None)) => {
                let mut table = Vec::new();
                display::write_parts(&mut table, session.parts().records(), display)?;
                pb.println(format!("{}:\n{}", file.display(), String::from_utf8_lossy(&table)));
            }
            Ok(Some(Some(report))) => {
                saved += 1;
                pb.println(format!(
                    "{}: {} parts renamed (backup: {})",
                    file.display(),
                    report.changed_count,
                    report.backup_path.display()
                ));
            }
            Err(err) => {
                failed += 1;
                warn!("{}: {}", file.display(), err);
                pb.println(format!("{}: error: {}", file.display(), err));
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message("Complete");
    println!();
    println!("Processed: {} files", files.len());
    println!("  Saved: {}", saved);
    if failed > 0 {
        return Err(anyhow!("{} file(s) could not be processed", failed));
    }
    Ok(())
}

/// Expand directories into the score files they contain.
fn collect_files(inputs: &[PathBuf], settings: &EditorSettings) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in inputs {
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter(|e| is_score(e.path(), settings))
            {
                files.push(entry.path().to_path_buf());
            }
        } else {
            files.push(path.clone());
        }
    }
    files
}

/// `.mscz` files, excluding backups written by earlier runs.
fn is_score(path: &Path, settings: &EditorSettings) -> bool {
    let is_mscz = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mscz"));
    let is_backup = path
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| {
            stem.ends_with(&settings.backup_suffix)
                || stem
                    .rsplit_once('_')
                    .is_some_and(|(head, n)| head.ends_with(&settings.backup_suffix) && n.parse::<u32>().is_ok())
        });
    is_mscz && !is_backup
}
