// ai
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::{
    fs::File,
    io::{self, AsyncWriteExt},
};
use tracing::trace;

use super::Deliverer;
use crate::common::Record;

// -- 🚰 FileDelivererConfig lives next to its FileDeliverer. One backend = one config = one file.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FileDelivererConfig {
    pub directory: PathBuf,
}

/// 📝 Writes each record, newline-terminated, to `{directory}/{worker_name}.out`.
///
/// It's a BufWriter around a tokio `File`. One file per worker, so nobody fights over
/// the write head.
///
/// ⚠️ `File::create` truncates if the file exists. No warning. No backup. Just gone.
#[derive(Debug)]
pub struct FileDeliverer {
    path: PathBuf,
    file_buf: io::BufWriter<File>,
}

impl FileDeliverer {
    /// 🚀 Creates (or obliterates and recreates) the worker's output file.
    pub async fn new(directory: &Path, worker_name: &str) -> Result<Self> {
        let the_path = directory.join(format!("{worker_name}.out"));
        let file_handle = File::create(&the_path).await.with_context(|| {
            format!(
                "💀 The output file '{}' could not be conjured into existence. \
                 We stared at the path. The path stared back.",
                the_path.display()
            )
        })?;
        Ok(Self {
            path: the_path,
            file_buf: io::BufWriter::new(file_handle),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Deliverer for FileDeliverer {
    async fn deliver(&mut self, record: Record) -> Result<()> {
        trace!("📬 {} bytes walked into {}", record.len(), self.path.display());
        self.file_buf.write_all(record.payload()).await?;
        self.file_buf.write_all(b"\n").await?;
        Ok(())
    }

    /// 🗑️ Flush. async Drop is not a thing, so without this the tail stays in the buffer.
    async fn close(&mut self) -> Result<()> {
        self.file_buf.flush().await.with_context(|| {
            format!(
                "💀 Error flushing '{}'. The bytes could SEE the disk. They never made it.",
                self.path.display()
            )
        })
    }
}
