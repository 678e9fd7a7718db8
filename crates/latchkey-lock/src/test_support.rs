// In-process lock store that records every call, for unit tests
// Records never expire on their own; `expire` drops one by hand

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use latchkey_common::StoreError;
use parking_lot::Mutex;

use crate::owner::OwnerId;
use crate::store::LockStore;
use crate::ttl::LockTtl;

#[derive(Default)]
pub(crate) struct RecordingStore {
    records: Mutex<HashMap<String, (OwnerId, u64)>>,
    insert_log: Mutex<Vec<(String, OwnerId)>>,
    schema_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    fail_schema: AtomicBool,
    fail_inserts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl RecordingStore {
    pub(crate) fn owner_of(&self, key: &str) -> Option<OwnerId> {
        self.records.lock().get(key).map(|(owner, _)| *owner)
    }

    pub(crate) fn ttl_of(&self, key: &str) -> Option<u64> {
        self.records.lock().get(key).map(|(_, ttl)| *ttl)
    }

    pub(crate) fn expire(&self, key: &str) {
        self.records.lock().remove(key);
    }

    pub(crate) fn insert_owners_for(&self, key: &str) -> Vec<OwnerId> {
        self.insert_log
            .lock()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, owner)| *owner)
            .collect()
    }

    pub(crate) fn schema_calls(&self) -> usize {
        self.schema_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_schema(&self, fail: bool) {
        self.fail_schema.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LockStore for RecordingStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        // Give concurrent first callers a chance to pile up on the gate
        tokio::task::yield_now().await;
        if self.fail_schema.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("schema provisioning failed".to_string()));
        }
        Ok(())
    }

    async fn insert_if_absent(
        &self,
        key: &str,
        owner_id: OwnerId,
        ttl: LockTtl,
    ) -> Result<bool, StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("insert timed out".to_string()));
        }
        self.insert_log.lock().push((key.to_string(), owner_id));

        let mut records = self.records.lock();
        if records.contains_key(key) {
            return Ok(false);
        }
        records.insert(key.to_string(), (owner_id, ttl.as_secs()));
        Ok(true)
    }

    async fn delete_if_owner(&self, key: &str, owner_id: OwnerId) -> Result<bool, StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("delete timed out".to_string()));
        }

        let mut records = self.records.lock();
        match records.get(key) {
            Some((owner, _)) if *owner == owner_id => {
                records.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
