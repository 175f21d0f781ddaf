// ai
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::Deliverer;
use crate::common::Record;

/// 🗑️ Counts records, then forgets them. The /dev/null of deliverers, with a tally sheet.
///
/// Useful for measuring how fast the bucket can be read without measuring how slow
/// the destination is.
#[derive(Debug)]
pub struct DiscardDeliverer {
    worker_name: String,
    records: u64,
    bytes: u64,
}

impl DiscardDeliverer {
    pub fn new(worker_name: &str) -> Self {
        Self {
            worker_name: worker_name.to_string(),
            records: 0,
            bytes: 0,
        }
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

#[async_trait]
impl Deliverer for DiscardDeliverer {
    async fn deliver(&mut self, record: Record) -> Result<()> {
        self.records += 1;
        self.bytes += record.len() as u64;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        debug!(
            "🗑️ {} discarded {} records ({} bytes). They were good records. Probably.",
            self.worker_name, self.records, self.bytes
        );
        Ok(())
    }
}
