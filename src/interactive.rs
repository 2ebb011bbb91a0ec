//! Line-oriented editor: open a score, rename parts, save.

use anyhow::Result;
use log::debug;
use std::io::{BufRead, Lines, Write};
use std::path::PathBuf;
use trackname_core::{EditError, EditorSession, PendingDecision, Resolution};

use crate::display::{self, DisplayConfig};

const HELP: &str = "\
Commands:
  list                 show parts (* = pending rename)
  set <id> <name>      propose a new name for a part
  number               number duplicate names (Violin -> Violin 1, Violin 2)
  reset                drop all pending renames
  save                 write pending renames (a backup is created first)
  open <file>          open another .mscz file
  reload               reload the current file from disk
  help                 show this text
  quit                 leave the editor";

pub struct Editor<'a, R, W> {
    session: &'a mut EditorSession,
    display: DisplayConfig,
    lines: Lines<R>,
    out: W,
}

impl<'a, R: BufRead, W: Write> Editor<'a, R, W> {
    pub fn new(session: &'a mut EditorSession, display: DisplayConfig, input: R, out: W) -> Self {
        Self {
            session,
            display,
            lines: input.lines(),
            out,
        }
    }

    pub fn run(mut self, initial: Option<PathBuf>) -> Result<()> {
        writeln!(self.out, "MuseScore Track Name Editor {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(
            self.out,
            "A backup (*{}.mscz) will be created automatically when saving. Type 'help' for commands.",
            self.session.settings().backup_suffix
        )?;

        if let Some(path) = initial {
            self.open(path)?;
        }

        loop {
            write!(self.out, "> ")?;
            self.out.flush()?;

            let Some(line) = self.lines.next().transpose()? else {
                let pending = self.session.parts().changed_count();
                if pending > 0 {
                    writeln!(self.out, "Input closed; {pending} unsaved change(s) were not written")?;
                }
                return Ok(());
            };

            let line = line.trim();
            let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let rest = rest.trim();
            debug!("editor command {command:?} {rest:?}");

            match command {
                "" => {}
                "help" | "?" => writeln!(self.out, "{HELP}")?,
                "list" | "ls" => self.list()?,
                "set" => self.set(rest)?,
                "number" => {
                    let numbered = self.session.number_duplicates();
                    if numbered == 0 {
                        writeln!(self.out, "No duplicate part names found")?;
                    } else {
                        writeln!(self.out, "Added numbers to {numbered} duplicate part names")?;
                        self.list()?;
                    }
                }
                "reset" => {
                    self.session.reset_all();
                    writeln!(self.out, "All part names reset to their original values")?;
                }
                "save" => self.save()?,
                "open" if rest.is_empty() => writeln!(self.out, "Usage: open <file>")?,
                "open" => {
                    if self.confirm_pending()? {
                        self.open(PathBuf::from(rest))?;
                    }
                }
                "reload" => {
                    if self.confirm_pending()? {
                        match self.session.reload() {
                            Ok(count) => writeln!(self.out, "Loaded {count} parts from file")?,
                            Err(err) => self.report_error(&err)?,
                        }
                    }
                }
                "quit" | "exit" | "q" => {
                    if self.confirm_pending()? {
                        return Ok(());
                    }
                }
                other => writeln!(self.out, "Unknown command {other:?}; type 'help' for a list")?,
            }
        }
    }

    fn open(&mut self, path: PathBuf) -> Result<()> {
        let shown = path.display().to_string();
        match self.session.open(path) {
            Ok(count) => {
                writeln!(self.out, "Loaded {count} parts from {shown}")?;
                self.list()
            }
            Err(err) => self.report_error(&err),
        }
    }

    fn list(&mut self) -> Result<()> {
        if self.session.current_file().is_none() {
            writeln!(self.out, "No file selected")?;
            return Ok(());
        }
        display::write_parts(&mut self.out, self.session.parts().records(), &self.display)?;
        Ok(())
    }

    fn set(&mut self, args: &str) -> Result<()> {
        let Some((id, name)) = args.split_once(char::is_whitespace) else {
            writeln!(self.out, "Usage: set <id> <name>")?;
            return Ok(());
        };
        if let Err(err) = self.session.rename(id, name) {
            return self.report_error(&err);
        }
        if let Some(part) = self.session.parts().get(id) {
            writeln!(self.out, "{}: {} -> {}", part.id, part.current_name, part.proposed_name)?;
        }
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        match self.session.save() {
            Ok(report) => display::write_report(&mut self.out, &report)?,
            Err(EditError::NoChanges) => writeln!(self.out, "No changes to save")?,
            Err(err) => self.report_error(&err)?,
        }
        Ok(())
    }

    /// Ask what to do with unsaved renames. Returns whether to go on.
    fn confirm_pending(&mut self) -> Result<bool> {
        if !self.session.has_unsaved_changes() {
            return Ok(true);
        }

        let decision = loop {
            write!(
                self.out,
                "You have unsaved changes. Save them first? [y]es / [n]o / [c]ancel: "
            )?;
            self.out.flush()?;

            let Some(answer) = self.lines.next().transpose()? else {
                break PendingDecision::Cancel;
            };
            match answer.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => break PendingDecision::SaveThenProceed,
                "n" | "no" => break PendingDecision::DiscardAndProceed,
                "c" | "cancel" | "" => break PendingDecision::Cancel,
                _ => continue,
            }
        };

        match self.session.resolve_pending(decision) {
            Ok(Resolution::Saved(report)) => {
                display::write_report(&mut self.out, &report)?;
                Ok(true)
            }
            Ok(resolution) => Ok(resolution.may_proceed()),
            Err(err) => {
                self.report_error(&err)?;
                Ok(false)
            }
        }
    }

    fn report_error(&mut self, err: &EditError) -> Result<()> {
        writeln!(self.out, "Error: {err}")?;
        Ok(())
    }
}
