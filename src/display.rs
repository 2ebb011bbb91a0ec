//! Terminal rendering of part tables and save reports.

use clap::ValueEnum;
use std::io::{self, Write};
use trackname_core::{PartRecord, SaveReport};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Theme {
    /// No colours
    #[default]
    Plain,
    Light,
    Dark,
}

/// Presentation settings. Never passed into the editing core.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisplayConfig {
    pub theme: Theme,
}

impl DisplayConfig {
    fn highlight(&self, text: &str) -> String {
        let code = match self.theme {
            Theme::Plain => return text.to_string(),
            Theme::Light => "34",
            Theme::Dark => "96",
        };
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Table of parts; rows with a pending rename are marked with `*`.
pub fn write_parts<W: Write>(out: &mut W, parts: &[PartRecord], display: &DisplayConfig) -> io::Result<()> {
    if parts.is_empty() {
        return writeln!(out, "No parts found");
    }

    let id_width = column_width("ID", parts.iter().map(|p| p.id.as_str()));
    let name_width = column_width("Current Name", parts.iter().map(|p| p.current_name.as_str()));

    writeln!(out, "  {:<id_width$}  {:<name_width$}  New Name", "ID", "Current Name")?;
    for part in parts {
        let (marker, new_name) = if part.is_changed() {
            ('*', display.highlight(&part.proposed_name))
        } else {
            (' ', part.proposed_name.clone())
        };
        writeln!(
            out,
            "{marker} {:<id_width$}  {:<name_width$}  {new_name}",
            part.id, part.current_name
        )?;
    }
    Ok(())
}

fn column_width<'a>(header: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(|v| v.chars().count())
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0)
}

pub fn write_report<W: Write>(out: &mut W, report: &SaveReport) -> io::Result<()> {
    writeln!(out, "File saved successfully!")?;
    writeln!(out, "  Backup created as: {}", report.backup_path.display())?;
    writeln!(out, "  Changes made: {} parts modified", report.changed_count)?;
    if !report.skipped.is_empty() {
        writeln!(
            out,
            "  Not written (no trackName element): {}",
            report.skipped.join(", ")
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_marks_pending_renames() {
        let mut parts = vec![PartRecord::new("1", "Violin"), PartRecord::new("12", "Viola")];
        parts[1].proposed_name = "Viola 2".to_string();

        let mut out = Vec::new();
        write_parts(&mut out, &parts, &DisplayConfig::default()).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "  ID  Current Name  New Name");
        assert_eq!(lines[1], "  1   Violin        Violin");
        assert_eq!(lines[2], "* 12  Viola         Viola 2");
    }

    #[test]
    fn report_lists_skipped_parts() {
        let report = SaveReport {
            changed_count: 1,
            backup_path: "piece_backup.mscz".into(),
            skipped: vec!["3".to_string()],
        };

        let mut out = Vec::new();
        write_report(&mut out, &report).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Changes made: 1 parts modified"));
        assert!(text.ends_with("Not written (no trackName element): 3\n"));
    }

    #[test]
    fn coloured_themes_wrap_changed_names() {
        let display = DisplayConfig { theme: Theme::Dark };
        assert_eq!(display.highlight("Harp"), "\x1b[96mHarp\x1b[0m");
        assert_eq!(DisplayConfig::default().highlight("Harp"), "Harp");
    }
}
