//! Lock Source
//!
//! Façade over a `LockStore`: provisions the store schema once per instance,
//! then delegates to the `AcquisitionEngine`.
//!
//! Provisioning uses double-checked locking: an atomic fast path, a gate
//! mutex, and a second check behind the gate. The gate is only ever held
//! while provisioning, never during the acquisition loop. A failed
//! provisioning leaves the flag unset so the next call tries again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use latchkey_common::{Configuration, DEFAULT_POLL_INTERVAL_MS};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::attempt::LockAttempt;
use crate::engine::AcquisitionEngine;
use crate::error::{LockError, Result};
use crate::lock::Lock;
use crate::store::LockStore;

/// Entry point for acquiring locks
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Wait for an exclusive lock on `key` held for at most `ttl`.
    ///
    /// Fails with `LockError::Canceled` once `cancel` fires, or with
    /// `LockError::Store` on any store failure.
    async fn acquire(&self, key: &str, ttl: Duration, cancel: &CancellationToken) -> Result<Lock>;

    /// Try once to lock `key` without waiting.
    ///
    /// Contention yields `LockAttempt::NotAcquired`; store failures are errors.
    async fn attempt_acquire(&self, key: &str, ttl: Duration) -> Result<LockAttempt>;
}

/// Tuning knobs of a `LockSource`
#[derive(Debug, Clone)]
pub struct LockSourceOptions {
    /// Delay between conditional-insert attempts while the key is held
    pub poll_interval: Duration,
}

impl Default for LockSourceOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl LockSourceOptions {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            poll_interval: config.poll_interval(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

pub struct LockSource {
    store: Arc<dyn LockStore>,
    engine: AcquisitionEngine,
    provisioned: AtomicBool,
    provision_gate: Mutex<()>,
}

impl LockSource {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self::with_options(store, LockSourceOptions::default())
    }

    pub fn with_options(store: Arc<dyn LockStore>, options: LockSourceOptions) -> Self {
        Self {
            engine: AcquisitionEngine::new(store.clone(), options.poll_interval),
            store,
            provisioned: AtomicBool::new(false),
            provision_gate: Mutex::new(()),
        }
    }

    pub fn from_config(store: Arc<dyn LockStore>, config: &Configuration) -> Self {
        Self::with_options(store, LockSourceOptions::from_config(config))
    }

    pub fn is_provisioned(&self) -> bool {
        self.provisioned.load(Ordering::Acquire)
    }

    pub fn poll_interval(&self) -> Duration {
        self.engine.poll_interval()
    }

    async fn ensure_provisioned(&self) -> Result<()> {
        if self.provisioned.load(Ordering::Acquire) {
            return Ok(());
        }

        let _gate = self.provision_gate.lock().await;
        if self.provisioned.load(Ordering::Acquire) {
            return Ok(());
        }

        self.store.ensure_schema().await?;
        self.provisioned.store(true, Ordering::Release);
        info!("Lock store schema provisioned");
        Ok(())
    }
}

#[async_trait]
impl LockProvider for LockSource {
    async fn acquire(&self, key: &str, ttl: Duration, cancel: &CancellationToken) -> Result<Lock> {
        if cancel.is_cancelled() {
            return Err(LockError::Canceled {
                key: key.to_string(),
            });
        }

        self.ensure_provisioned().await?;
        self.engine.acquire(key, ttl, cancel).await
    }

    async fn attempt_acquire(&self, key: &str, ttl: Duration) -> Result<LockAttempt> {
        self.ensure_provisioned().await?;
        Ok(self.engine.try_acquire(key, ttl).await?.into())
    }
}
