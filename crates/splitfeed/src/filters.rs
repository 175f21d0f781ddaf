// ai
//! 🃏 Name filters: the bouncer at the door of the dispatch queue.
//!
//! The lister finds keys. The filter decides which ones get in. It only ever looks
//! at the base name (the bit after the last `/`), so `*.gz` matches
//! `logs/2024/01/part-0001.gz` without anyone having to write `**/`.
//!
//! 🧠 Knowledge graph:
//! - `Glob`: `glob::Pattern`, for humans. `object_match = "*.gz"`
//! - `Regex`: `regex::Regex`, for people who have been hurt by globs before.
//!   `object_match_regex = "^part-\\d+\\.gz$"`
//! - No filter at all = everyone gets in. Skipped keys are logged, never counted as failures.

use anyhow::{Context, Result, bail};
use glob::Pattern;
use regex::Regex;

use crate::app_config::SourceConfig;

/// 📂 Final path segment after the last `/`. The whole key if there is no `/`.
pub fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[derive(Debug, Clone)]
pub enum NameFilter {
    Glob(Pattern),
    Regex(Regex),
}

impl NameFilter {
    pub fn glob(pattern: &str) -> Result<Self> {
        let compiled = Pattern::new(pattern)
            .with_context(|| format!("💀 object_match is not a valid glob pattern: '{pattern}'"))?;
        Ok(Self::Glob(compiled))
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        let compiled = Regex::new(pattern).with_context(|| {
            format!("💀 object_match_regex is not a valid regular expression: '{pattern}'")
        })?;
        Ok(Self::Regex(compiled))
    }

    /// 🔧 Resolve the optional filter from source config. A broken pattern is a startup error.
    /// An empty pattern is no pattern.
    pub fn from_source_config(config: &SourceConfig) -> Result<Option<Self>> {
        let the_glob = config.object_match.as_deref().filter(|p| !p.is_empty());
        let the_regex = config.object_match_regex.as_deref().filter(|p| !p.is_empty());
        match (the_glob, the_regex) {
            (Some(_), Some(_)) => {
                bail!("💀 set object_match or object_match_regex, not both. Pick a lane.")
            }
            (Some(glob), None) => Ok(Some(Self::glob(glob)?)),
            (None, Some(regex)) => Ok(Some(Self::regex(regex)?)),
            (None, None) => Ok(None),
        }
    }

    /// ✅ Does this key's base name get in?
    pub fn accepts(&self, key: &str) -> bool {
        let the_name = base_name(key);
        match self {
            Self::Glob(pattern) => pattern.matches(the_name),
            Self::Regex(regex) => regex.is_match(the_name),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Glob(pattern) => format!("glob('{}')", pattern.as_str()),
            Self::Regex(regex) => format!("regex('{}')", regex.as_str()),
        }
    }
}

/// 🚪 Absent filter accepts all.
pub fn accepts(filter: Option<&NameFilter>, key: &str) -> bool {
    filter.is_none_or(|f| f.accepts(key))
}
