// ai
//! 📒 Manifest listing: a key list on local disk standing in for a bucket listing.
//!
//! Listing a few million keys from S3 costs minutes and money. If somebody already
//! wrote the keys down (an inventory export, yesterday's run, a cache), read that
//! instead. One key per line, optionally `key<TAB>size`. Blank lines and `#` comments
//! are ignored; keys outside the prefix are silently passed over.
//!
//! ```text
//! # nightly inventory, 2024-06-01
//! logs/2024/06/01/part-0000.gz	1048576
//! logs/2024/06/01/part-0001.gz
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use async_stream::stream;
use futures::stream::BoxStream;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::ListingSource;
use crate::common::{ListEntry, ObjectId};

#[derive(Debug, Clone)]
pub struct ManifestListing {
    path: PathBuf,
}

impl ManifestListing {
    /// 🚀 Fails right here, at startup, if the manifest isn't a readable file.
    pub async fn new(path: &Path) -> Result<Self> {
        let the_metadata = tokio::fs::metadata(path).await.with_context(|| {
            format!(
                "💀 manifest_file '{}' could not be read. We stared at the path. The path stared back.",
                path.display()
            )
        })?;
        if !the_metadata.is_file() {
            return Err(anyhow!("💀 manifest_file '{}' is not a file", path.display()));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

/// 🔍 One manifest line → `None` (nothing to see, or outside `prefix`), or an entry
/// (possibly a broken one).
pub(crate) fn parse_manifest_line(line: &str, prefix: &str) -> Option<ListEntry> {
    let the_line = line.trim_end_matches(['\r', '\n']);
    if the_line.trim().is_empty() || the_line.trim_start().starts_with('#') {
        return None;
    }
    let mut the_fields = the_line.splitn(2, '\t');
    let the_key = the_fields.next().unwrap_or_default().trim();
    if !the_key.starts_with(prefix) {
        return None;
    }
    match the_fields.next() {
        None => Some(Ok(ObjectId::new(the_key))),
        Some(size) => Some(
            size.trim()
                .parse::<u64>()
                .map(|s| ObjectId::with_size(the_key, s))
                .with_context(|| format!("💀 manifest size for '{the_key}' is not a number: '{size}'")),
        ),
    }
}

impl ListingSource for ManifestListing {
    fn list<'a>(&'a self, prefix: &'a str) -> BoxStream<'a, ListEntry> {
        Box::pin(stream! {
            match File::open(&self.path).await {
                Err(e) => {
                    yield Err(anyhow!("💀 could not open manifest '{}': {}", self.path.display(), e));
                }
                Ok(file) => {
                    let mut the_lines = BufReader::new(file).lines();
                    loop {
                        match the_lines.next_line().await {
                            Ok(Some(line)) => {
                                if let Some(entry) = parse_manifest_line(&line, prefix) {
                                    yield entry;
                                }
                            }
                            Ok(None) => break,
                            Err(e) => {
                                yield Err(anyhow!("💀 manifest '{}' read failed: {}", self.path.display(), e));
                                break;
                            }
                        }
                    }
                }
            }
        })
    }
}
