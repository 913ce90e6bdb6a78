//! External tokenizer process.
//!
//! The configured program reads the text on stdin and prints a JSON array of
//! tokens on stdout:
//!
//! ```json
//! [{"text": "魔王", "start": 0, "length": 2, "pos": "NOUN", "lemma": "魔王", "index": 0}]
//! ```

use std::io::{self, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use gloss_editor_core::{BoxError, Token, Tokenizer};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum TokenizerError {
    #[error("failed to start tokenizer `{program}`")]
    #[diagnostic(
        code(gloss::cli::tokenizer_spawn),
        help("check the `tokenizer` node in your settings file")
    )]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("tokenizer i/o failed")]
    #[diagnostic(code(gloss::cli::tokenizer_io))]
    Io(#[from] io::Error),

    #[error("tokenizer exited with {status}: {stderr}")]
    #[diagnostic(code(gloss::cli::tokenizer_exit))]
    Exit { status: ExitStatus, stderr: String },

    #[error("tokenizer output is not a token list")]
    #[diagnostic(code(gloss::cli::tokenizer_output))]
    Output(#[from] serde_json::Error),
}

/// Runs a program once per analysis pass.
#[derive(Debug, Clone)]
pub struct CommandTokenizer {
    program: String,
    args: Vec<String>,
}

impl CommandTokenizer {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = String>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().collect(),
        }
    }

    /// Build from `[program, args...]`.
    pub fn from_command_line(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.iter().cloned()))
    }

    pub fn run(&self, text: &str) -> Result<Vec<Token>, TokenizerError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| TokenizerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Feed stdin from another thread so a chatty child cannot fill its
        // stdout pipe while we are still writing.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("tokenizer stdin unavailable"))?;
        let input = text.to_owned();
        let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child.wait_with_output()?;
        let written = writer
            .join()
            .map_err(|_| io::Error::other("tokenizer stdin writer panicked"))?;
        if !output.status.success() {
            return Err(TokenizerError::Exit {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        match written {
            // The program may answer without reading all of its input.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                tracing::debug!(program = %self.program, "tokenizer closed stdin early");
            }
            Err(e) => return Err(e.into()),
            Ok(()) => {}
        }

        let tokens: Vec<Token> = serde_json::from_slice(&output.stdout)?;
        tracing::debug!(program = %self.program, tokens = tokens.len(), "tokenizer finished");
        Ok(tokens)
    }
}

impl Tokenizer for CommandTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>, BoxError> {
        Ok(self.run(text)?)
    }
}
