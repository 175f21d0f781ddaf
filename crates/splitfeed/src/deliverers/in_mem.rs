// ai
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::Deliverer;
use crate::common::Record;

/// 📦 One record as a test will want to see it: who delivered it, and what it said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredRecord {
    pub worker: String,
    pub payload: Vec<u8>,
}

/// 🔒 The evidence locker every in-memory deliverer writes into.
///
/// Clone-able because tests need to peek inside after handing the factory off to the
/// pipeline. The `Arc` means everyone shares the same Vec.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeliveries {
    received: Arc<Mutex<Vec<DeliveredRecord>>>,
}

impl InMemoryDeliveries {
    /// 📋 A copy of everything delivered so far, in arrival order.
    pub fn records(&self) -> Vec<DeliveredRecord> {
        self.received
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// 📋 Just the payloads, in arrival order.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.records().into_iter().map(|r| r.payload).collect()
    }

    pub fn len(&self) -> usize {
        self.received.lock().map(|records| records.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 📦 A deliverer that never forgets.
#[derive(Debug)]
pub struct InMemoryDeliverer {
    worker_name: String,
    deliveries: InMemoryDeliveries,
}

impl InMemoryDeliverer {
    pub fn new(worker_name: &str, deliveries: InMemoryDeliveries) -> Self {
        Self {
            worker_name: worker_name.to_string(),
            deliveries,
        }
    }
}

#[async_trait]
impl Deliverer for InMemoryDeliverer {
    async fn deliver(&mut self, record: Record) -> Result<()> {
        // -- 🔒 std Mutex, never held across an await
        self.deliveries
            .received
            .lock()
            .map_err(|_| anyhow!("💀 in-memory deliveries lock was poisoned"))?
            .push(DeliveredRecord {
                worker: self.worker_name.clone(),
                payload: record.into_payload(),
            });
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
