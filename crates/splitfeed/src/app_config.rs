//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the bucket. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! ```toml
//! [source]
//! bucket = "telemetry-archive"
//! prefix = "/logs//2024/"        # cleaned to "logs/2024/"
//! object_match = "*.gz"
//!
//! [runtime]
//! worker_count = 16
//!
//! [splitter.LengthPrefixed]
//! max_record_size = 1048576
//!
//! [deliverer.File]
//! directory = "out"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use regex::Regex;
use serde::Deserialize;
use tracing::info;

use crate::deliverers::DelivererConfig;
use crate::filters::NameFilter;
use crate::splitters::SplitterConfig;

/// 📦 One struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub splitter: SplitterConfig,
    #[serde(default)]
    pub deliverer: DelivererConfig,
}

/// 🪣 Where the split files live and which ones we care about.
///
/// `bucket = None` is legal: the pipeline still runs, lists whatever the manifest
/// offers, and every fetch is a polite no-op. Useful for dry runs. Useful for demos.
/// Useful for confusing your coworkers.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub prefix: String,
    /// 🌎 us-west-2, because that is where the split files were born
    #[serde(default = "default_region")]
    pub region: String,
    /// 🧪 MinIO, LocalStack, or whatever S3-shaped thing is on localhost today
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// 🃏 glob over the base name
    #[serde(default)]
    pub object_match: Option<String>,
    /// 🧩 regex over the base name
    #[serde(default)]
    pub object_match_regex: Option<String>,
    /// 📒 local key list that replaces the bucket listing
    #[serde(default)]
    pub manifest_file: Option<PathBuf>,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_decompress_gzip")]
    pub decompress_gzip: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            prefix: String::new(),
            region: default_region(),
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            object_match: None,
            object_match_regex: None,
            manifest_file: None,
            retries: default_retries(),
            connect_timeout_secs: default_timeout_secs(),
            read_timeout_secs: default_timeout_secs(),
            decompress_gzip: default_decompress_gzip(),
        }
    }
}

impl SourceConfig {
    /// 🧹 The prefix as it will actually be listed.
    pub fn cleaned_prefix(&self) -> String {
        clean_bucket_prefix(&self.prefix)
    }
}

/// 🧵 Knobs for the worker pool and the queue feeding it.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RuntimeConfig {
    #[serde(default = "default_worker_count", alias = "s3_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

fn default_region() -> String {
    "us-west-2".to_string()
}

fn default_retries() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_decompress_gzip() -> bool {
    true
}

// 🧵 ten workers. enough to saturate a link, not enough to unionize.
fn default_worker_count() -> usize {
    10
}

// 📬 a thousand keys in flight before the lister has to sit down and wait
fn default_queue_capacity() -> usize {
    1000
}

fn default_stats_interval_secs() -> u64 {
    30
}

/// 🧹 Tidy a bucket prefix: no leading or trailing slashes, no `//`, and exactly one
/// trailing `/` when anything is left. `"//logs//2024/"` → `"logs/2024/"`.
pub fn clean_bucket_prefix(prefix: &str) -> String {
    let the_segments: Vec<&str> = prefix.split('/').filter(|s| !s.is_empty()).collect();
    if the_segments.is_empty() {
        return String::new();
    }
    let mut cleaned = the_segments.join("/");
    cleaned.push('/');
    cleaned
}

// -- 🗺️ us-east-1, eu-central-2, us-gov-west-1, ap-southeast-4 ...
const AWS_REGION_SHAPE: &str = r"^[a-z]{2}(-[a-z]+)+-[0-9]+$";

impl SourceConfig {
    /// 🗺️ AWS regions have a shape. A custom endpoint (MinIO, LocalStack) may call its
    /// region anything, as long as it is one word.
    fn validate_region(&self) -> Result<()> {
        let the_region = self.region.as_str();
        if the_region.is_empty() || the_region.chars().any(char::is_whitespace) {
            bail!("💀 source.region '{the_region}' must be a single non-empty word");
        }
        if self.endpoint_url.is_none() {
            let the_shape = Regex::new(AWS_REGION_SHAPE).context("💀 region pattern")?;
            if !the_shape.is_match(the_region) {
                bail!(
                    "💀 source.region '{the_region}' doesn't look like an AWS region (e.g. us-east-1)"
                );
            }
        }
        Ok(())
    }
}

impl AppConfig {
    /// ✅ Fatal startup checks. If this fails, no worker ever wakes up.
    pub fn validate(&self) -> Result<()> {
        if self.runtime.worker_count == 0 {
            bail!("💀 runtime.worker_count must be at least 1. Zero workers is a vacation, not a pipeline.");
        }
        if self.runtime.queue_capacity == 0 {
            bail!("💀 runtime.queue_capacity must be at least 1. The queue needs somewhere to sit.");
        }
        self.source.validate_region()?;
        match (&self.source.access_key_id, &self.source.secret_access_key) {
            (Some(_), None) | (None, Some(_)) => bail!(
                "💀 source.access_key_id and source.secret_access_key come as a pair or not at all"
            ),
            _ => {}
        }
        if let Some(bucket) = &self.source.bucket {
            if bucket.trim().is_empty() {
                bail!("💀 source.bucket is set but empty. Leave it out for no-op mode.");
            }
        }
        NameFilter::from_source_config(&self.source)?;
        self.splitter.validate()?;
        self.deliverer.validate()?;
        Ok(())
    }
}

/// 🚀 Load the config: environment first, TOML file on top if one was given.
///
/// 📐 DESIGN NOTE:
///   - `SPLITFEED_*` env vars form the base layer. Nested keys use `__`, so
///     `SPLITFEED_RUNTIME__WORKER_COUNT=4` lands in `runtime.worker_count`.
///   - If `config_file_name` is Some, that TOML is merged over the env. TOML wins on conflicts.
pub fn load_config(config_file_name: Option<&Path>) -> Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("SPLITFEED_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (SPLITFEED_*). \
             The file exists in our hearts, but apparently not in a parseable shape.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (SPLITFEED_*). \
                 No file was provided, so this one's all on the environment."
            .to_string(),
    };

    config.extract().context(context_msg)
}
