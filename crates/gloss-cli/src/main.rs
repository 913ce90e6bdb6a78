mod config;
mod session;
mod tokenizer;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use gloss_editor_core::{Editor, MapDictionary, translate_text};
use miette::{IntoDiagnostic, Result, WrapErr, miette};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, default_config_path};
use crate::session::Session;
use crate::tokenizer::CommandTokenizer;

#[derive(Parser)]
#[command(version, about = "Gloss - selective dictionary substitution for Japanese text", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to settings file
    #[arg(long, env = "GLOSS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace every translatable token with its first dictionary gloss
    Translate {
        /// Text file to translate
        file: PathBuf,

        /// Write the result here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Tag, select and substitute tokens interactively
    Edit {
        /// Text file to edit
        file: PathBuf,

        /// Where `save` writes by default (the input file if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_miette();
    init_tracing();

    let cli = Cli::parse();

    let config_path = cli.config.or_else(default_config_path);
    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Translate { file, output } => translate(&config, &file, output.as_deref())?,
        Commands::Edit { file, output } => edit(config, &file, output)?,
    }

    Ok(())
}

fn load_tokenizer(config: &Config) -> Result<CommandTokenizer> {
    config
        .tokenizer
        .as_deref()
        .and_then(CommandTokenizer::from_command_line)
        .ok_or_else(|| {
            miette!(
                code = "gloss::cli::no_tokenizer",
                help = "add a `tokenizer \"program\" \"args\"...` node to settings.kdl",
                "no tokenizer configured"
            )
        })
}

fn load_dictionary(config: &Config) -> Result<MapDictionary> {
    let Some(path) = &config.dictionary else {
        tracing::warn!("no dictionary configured, tokens will have no glosses");
        return Ok(MapDictionary::new());
    };
    let json = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading dictionary {}", path.display()))?;
    let dictionary = MapDictionary::from_json(&json).into_diagnostic()?;
    tracing::info!(path = %path.display(), entries = dictionary.len(), "loaded dictionary");
    Ok(dictionary)
}

fn translate(config: &Config, file: &Path, output: Option<&Path>) -> Result<()> {
    let text = std::fs::read_to_string(file).into_diagnostic()?;
    let tokenizer = load_tokenizer(config)?;
    let dictionary = load_dictionary(config)?;

    let mut translated = Vec::new();
    for line in text.lines() {
        let tokens = tokenizer.run(line)?;
        translated.push(translate_text(line, &tokens, &config.settings, &dictionary)?);
    }
    let translated = translated.join("\n");

    match output {
        Some(path) => std::fs::write(path, translated + "\n").into_diagnostic()?,
        None => println!("{translated}"),
    }
    Ok(())
}

fn edit(config: Config, file: &Path, output: Option<PathBuf>) -> Result<()> {
    let text = std::fs::read_to_string(file).into_diagnostic()?;
    let tokenizer = load_tokenizer(&config)?;
    let dictionary = load_dictionary(&config)?;

    let editor = Editor::new(Arc::new(tokenizer), Box::new(dictionary), config.settings)
        .with_text(&text);
    let mut session = Session::new(editor, output.unwrap_or_else(|| file.to_path_buf()));

    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprintln!("gloss: editing {} (type `help` for commands)", file.display());
    }
    session.run(stdin.lock(), std::io::stdout().lock())?;
    tracing::debug!(chars = session.editor().len_chars(), "session ended");
    Ok(())
}

/// Logs go to stderr so translations on stdout stay clean.
fn init_tracing() {
    let default_level = if cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn init_miette() {
    let installed = miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }));
    if installed.is_err() {
        eprintln!("gloss: miette report hook already installed");
    }
    miette::set_panic_hook();
}
