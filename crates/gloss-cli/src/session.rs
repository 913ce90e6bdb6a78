//! Line-oriented editing session.
//!
//! The session thread is the interaction thread: it owns the [`Editor`] and
//! the [`UiTaskQueue`], and drains the queue on every tick while an analysis
//! pass runs in the background.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use gloss_editor_core::{Editor, EditorError, Position, Range, TagId, UiTaskQueue};
use miette::{Diagnostic, IntoDiagnostic, Result};
use thiserror::Error;

const TICK: Duration = Duration::from_millis(10);

const HELP: &str = "\
commands:
  detect                 analyse the text and tag translatable tokens
  tags                   list tagged tokens
  show                   print the text and the current selection
  click <offset>         select the tag under a character offset
  select <tag>           select a tag by id
  candidates             list candidates for the selection
  pick <n>               substitute candidate n
  insert <offset> <text> insert text
  delete <start> <end>   delete a character range
  save [path]            write the text out
  help                   show this help
  quit                   leave the session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Detect,
    Tags,
    Show,
    Click(usize),
    Select(TagId),
    Candidates,
    Pick(usize),
    Insert { at: usize, text: String },
    Delete { start: usize, end: usize },
    Save(Option<PathBuf>),
    Help,
    Quit,
}

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    #[diagnostic(code(gloss::cli::unknown_command), help("type `help` for a list"))]
    Unknown(String),

    #[error("`{command}` needs {argument}")]
    #[diagnostic(code(gloss::cli::missing_argument))]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("`{0}` is not a number")]
    #[diagnostic(code(gloss::cli::not_a_number))]
    NotANumber(String),
}

fn number(
    arg: Option<&str>,
    command: &'static str,
    argument: &'static str,
) -> Result<usize, CommandError> {
    let arg = arg.ok_or(CommandError::MissingArgument { command, argument })?;
    arg.trim_start_matches('#')
        .parse()
        .map_err(|_| CommandError::NotANumber(arg.to_owned()))
}

impl SessionCommand {
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim_start();
        let mut args = rest.split_whitespace();

        let command = match name {
            "" => return Ok(None),
            "detect" => Self::Detect,
            "tags" => Self::Tags,
            "show" => Self::Show,
            "click" => Self::Click(number(args.next(), "click", "a character offset")?),
            "select" => Self::Select(TagId(number(args.next(), "select", "a tag id")? as u64)),
            "candidates" => Self::Candidates,
            "pick" => Self::Pick(number(args.next(), "pick", "a candidate number")?),
            "insert" => {
                let (at, text) = rest.split_once(' ').unwrap_or((rest, ""));
                let at = number(Some(at).filter(|s| !s.is_empty()), "insert", "an offset")?;
                if text.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "insert",
                        argument: "text",
                    });
                }
                Self::Insert {
                    at,
                    text: text.to_owned(),
                }
            }
            "delete" => Self::Delete {
                start: number(args.next(), "delete", "a start offset")?,
                end: number(args.next(), "delete", "an end offset")?,
            },
            "save" => Self::Save(args.next().map(PathBuf::from)),
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(CommandError::Unknown(other.to_owned())),
        };
        Ok(Some(command))
    }
}

pub struct Session {
    editor: Editor,
    queue: UiTaskQueue<Editor>,
    path: PathBuf,
}

impl Session {
    pub fn new(editor: Editor, path: PathBuf) -> Self {
        Self {
            editor,
            queue: UiTaskQueue::new(),
            path,
        }
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    /// One event-loop tick: run queued calls, then reap a finished worker.
    fn tick(&mut self) {
        self.queue.drain(&mut self.editor);
        self.editor.reap();
    }

    /// Tick until the running pass finishes, then print its status.
    fn wait_for_analysis<W: Write>(&mut self, out: &mut W) -> Result<()> {
        loop {
            self.tick();
            if !self.editor.is_locked() {
                break;
            }
            thread::sleep(TICK);
        }
        writeln!(out, "{}", self.editor.status()).into_diagnostic()
    }

    fn print_candidates<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "{}", self.editor.prompt()).into_diagnostic()?;
        if let Some(candidates) = self.editor.candidates() {
            for (i, candidate) in candidates.iter().enumerate() {
                writeln!(out, "  {i}) {candidate}").into_diagnostic()?;
            }
        }
        Ok(())
    }

    fn activate<W: Write>(&mut self, tag: TagId, out: &mut W) -> Result<()> {
        match self.editor.activate(tag) {
            Ok(_) => self.print_candidates(out),
            Err(e) => report(out, &e),
        }
    }

    /// Run one command. Returns `false` when the session should end.
    pub fn execute<W: Write>(&mut self, command: SessionCommand, out: &mut W) -> Result<bool> {
        match command {
            SessionCommand::Detect => match self.editor.detect_tokens(&self.queue.handle()) {
                Ok(()) => self.wait_for_analysis(out)?,
                Err(e) => report(out, &e)?,
            },
            SessionCommand::Tags => {
                for (id, range, anchor) in self.editor.anchors() {
                    let text = self
                        .editor
                        .store()
                        .buffer()
                        .slice(range)
                        .unwrap_or_default();
                    writeln!(
                        out,
                        "{id:>5}  {range:<8}  {text}  ({}, {})",
                        anchor.token.part_of_speech, anchor.token.lemma
                    )
                    .into_diagnostic()?;
                }
            }
            SessionCommand::Show => {
                writeln!(out, "{}", self.editor.text()).into_diagnostic()?;
                if let Some((id, range)) = self.editor.current_selection() {
                    writeln!(out, "selected: {id} at {range}").into_diagnostic()?;
                }
            }
            SessionCommand::Click(offset) => match self.editor.anchor_at(Position::new(offset)) {
                Some((tag, _)) => self.activate(tag, out)?,
                None => writeln!(out, "no tag at {offset}").into_diagnostic()?,
            },
            SessionCommand::Select(tag) => self.activate(tag, out)?,
            SessionCommand::Candidates => self.print_candidates(out)?,
            SessionCommand::Pick(index) => match self.editor.pick(index) {
                Ok(Some(_)) => writeln!(out, "{}", self.editor.text()).into_diagnostic()?,
                Ok(None) => writeln!(out, "nothing to substitute").into_diagnostic()?,
                Err(e) => report(out, &e)?,
            },
            SessionCommand::Insert { at, text } => {
                if let Err(e) = self.editor.insert(Position::new(at), &text) {
                    report(out, &e)?;
                }
            }
            SessionCommand::Delete { start, end } => {
                if let Err(e) = self.editor.delete(Range::from(start..end)) {
                    report(out, &e)?;
                }
            }
            SessionCommand::Save(path) => {
                let path = path.unwrap_or_else(|| self.path.clone());
                std::fs::write(&path, self.editor.text()).into_diagnostic()?;
                writeln!(out, "saved {}", path.display()).into_diagnostic()?;
            }
            SessionCommand::Help => writeln!(out, "{HELP}").into_diagnostic()?,
            SessionCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Read commands from `input` until it ends or `quit`.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> Result<()> {
        for line in input.lines() {
            let line = line.into_diagnostic()?;
            let command = match SessionCommand::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    writeln!(out, "error: {e}").into_diagnostic()?;
                    continue;
                }
            };
            if !self.execute(command, &mut out)? {
                break;
            }
            out.flush().into_diagnostic()?;
        }
        // A pass may still be in flight if input ended right after `detect`.
        if self.editor.is_locked() {
            self.wait_for_analysis(&mut out)?;
        }
        Ok(())
    }
}

fn report<W: Write>(out: &mut W, error: &EditorError) -> Result<()> {
    tracing::debug!(%error, "command failed");
    writeln!(out, "error: {error}").into_diagnostic()
}
