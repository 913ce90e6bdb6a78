//! KDL settings file.
//!
//! ```kdl
//! tokenizer "python3" "-m" "ginza_tokens"
//! dictionary "dictionary.json"
//! translatable {
//!     include-pos "NOUN" "VERB" "ADJ"
//!     exclude-lemma "くる" "いう"
//!     exclude-foreign true
//! }
//! word-start {
//!     include-pos "VERB" "NOUN"
//! }
//! ```

use std::path::{Path, PathBuf};

use gloss_editor_core::{Settings, SmolStr, TokenFilter};
use kdl::{KdlDocument, KdlNode};
use miette::{IntoDiagnostic, Result, miette};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Tokenizer program followed by its arguments.
    pub tokenizer: Option<Vec<String>>,
    /// JSON dictionary file.
    pub dictionary: Option<PathBuf>,
    pub settings: Settings,
}

impl Config {
    /// Load `path`, falling back to defaults when it does not exist.
    ///
    /// A relative dictionary path is taken relative to the settings file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let source = std::fs::read_to_string(path).into_diagnostic()?;
        let mut config = Self::parse(&source)?;
        if let Some(dir) = path.parent() {
            if let Some(dict) = config.dictionary.as_mut().filter(|d| d.is_relative()) {
                *dict = dir.join(&*dict);
            }
        }
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(config)
    }

    pub fn parse(source: &str) -> Result<Self> {
        let doc: KdlDocument = source.parse().into_diagnostic()?;
        let defaults = Settings::default();

        let tokenizer = match doc.get("tokenizer") {
            Some(node) => {
                let command = string_args(node)?;
                if command.is_empty() {
                    return Err(miette!("`tokenizer` needs at least a program name"));
                }
                Some(command)
            }
            None => None,
        };

        let dictionary = match doc.get("dictionary") {
            Some(node) => Some(PathBuf::from(single_string(node)?)),
            None => None,
        };

        let translatable = match doc.get("translatable") {
            Some(node) => parse_filter(node, defaults.translatable)?,
            None => defaults.translatable,
        };
        let word_start = match doc.get("word-start") {
            Some(node) => parse_filter(node, defaults.word_start)?,
            None => defaults.word_start,
        };

        Ok(Self {
            tokenizer,
            dictionary,
            settings: Settings {
                translatable,
                word_start,
            },
        })
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gloss").join("settings.kdl"))
}

fn string_args(node: &KdlNode) -> Result<Vec<String>> {
    node.entries()
        .iter()
        .filter(|entry| entry.name().is_none())
        .map(|entry| {
            entry
                .value()
                .as_string()
                .map(str::to_owned)
                .ok_or_else(|| miette!("`{}` expects string arguments", node.name().value()))
        })
        .collect()
}

fn single_string(node: &KdlNode) -> Result<String> {
    let mut args = string_args(node)?;
    if args.len() != 1 {
        return Err(miette!(
            "`{}` expects exactly one string argument",
            node.name().value()
        ));
    }
    Ok(args.remove(0))
}

fn parse_filter(node: &KdlNode, mut filter: TokenFilter) -> Result<TokenFilter> {
    let Some(children) = node.children() else {
        return Ok(filter);
    };
    if let Some(include) = children.get("include-pos") {
        filter.include_pos = string_args(include)?.into_iter().map(SmolStr::from).collect();
    }
    if let Some(exclude) = children.get("exclude-lemma") {
        filter.exclude_lemmas = string_args(exclude)?.into_iter().map(SmolStr::from).collect();
    }
    if let Some(foreign) = children.get("exclude-foreign") {
        filter.exclude_foreign = foreign
            .entries()
            .first()
            .and_then(|entry| entry.value().as_bool())
            .ok_or_else(|| miette!("`exclude-foreign` expects true or false"))?;
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gloss_editor_core::Token;

    #[test]
    fn test_parse_full() {
        let config = Config::parse(
            r#"
            tokenizer "python3" "-m" "ginza_tokens"
            dictionary "/usr/share/gloss/dict.json"
            translatable {
                include-pos "NOUN" "VERB" "PROPN"
                exclude-lemma "くる" "いう"
                exclude-foreign false
            }
            word-start {
                include-pos "VERB"
            }
            "#,
        )
        .unwrap();

        assert_eq!(
            config.tokenizer,
            Some(vec!["python3".into(), "-m".into(), "ginza_tokens".into()])
        );
        assert_eq!(
            config.dictionary,
            Some(PathBuf::from("/usr/share/gloss/dict.json"))
        );
        let translatable = &config.settings.translatable;
        assert!(translatable.include_pos.contains("PROPN"));
        assert!(!translatable.include_pos.contains("ADJ"));
        assert!(translatable.exclude_lemmas.contains("くる"));
        assert!(!translatable.exclude_foreign);
        assert!(
            config
                .settings
                .word_start
                .matches(&Token::new("倒す", 0, "VERB", "倒す", 0))
        );
        assert!(
            !config
                .settings
                .word_start
                .matches(&Token::new("魔王", 0, "NOUN", "魔王", 0))
        );
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = Config::parse(r#"dictionary "dict.json""#).unwrap();
        assert_eq!(config.tokenizer, None);
        assert_eq!(config.settings, Settings::default());
    }

    #[test]
    fn test_partial_filter_keeps_other_defaults() {
        let config = Config::parse(
            r#"
            translatable {
                exclude-lemma "する"
            }
            "#,
        )
        .unwrap();
        let defaults = Settings::default().translatable;
        assert_eq!(config.settings.translatable.include_pos, defaults.include_pos);
        assert!(config.settings.translatable.exclude_foreign);
        assert!(config.settings.translatable.exclude_lemmas.contains("する"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::parse("tokenizer").is_err());
        assert!(Config::parse("dictionary 42").is_err());
        assert!(Config::parse("translatable {\n exclude-foreign \"yes\"\n}").is_err());
        assert!(Config::parse("translatable {").is_err());
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = Config::load(Path::new("/nonexistent/gloss/settings.kdl")).unwrap();
        assert_eq!(config, Config::default());
    }
}
