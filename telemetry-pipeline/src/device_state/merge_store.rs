/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Device-state store: applies buffered fragments and persists merged state.

use crate::data_plane::flush_worker::{BatchOutcome, BatchSink};
use crate::device_state::fragment::{DeviceFragment, FragmentError};
use crate::device_state::merge::merge_fragment;
use crate::device_state::model::DeviceState;
use crate::ingress::topic_classifier::StateClass;
use crate::observability::events;
use crate::storage::{DeviceStateRepository, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

const COMPONENT: &str = "device_state_store";

/// A state message waiting in the status buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceStateUpdate {
    pub module_id: String,
    pub class: StateClass,
    pub document: Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum ApplyError {
    Fragment(FragmentError),
    Storage(StorageError),
}

impl Display for ApplyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyError::Fragment(err) => write!(f, "malformed device fragment: {err}"),
            ApplyError::Storage(err) => write!(f, "failed to persist device state: {err}"),
        }
    }
}

impl Error for ApplyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ApplyError::Fragment(err) => Some(err),
            ApplyError::Storage(err) => Some(err),
        }
    }
}

/// Owns the merged state cache in front of a [`DeviceStateRepository`].
///
/// Load, merge and upsert of one module run under that module's lock, so two
/// fragments for the same module never race each other's read-modify-write.
/// The shared maps are only locked for lookups, never across storage calls.
pub struct DeviceStateStore {
    repository: Arc<dyn DeviceStateRepository>,
    states: Mutex<HashMap<String, DeviceState>>,
    module_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DeviceStateStore {
    pub fn new(repository: Arc<dyn DeviceStateRepository>) -> Self {
        Self {
            repository,
            states: Mutex::new(HashMap::new()),
            module_locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn apply(&self, update: &DeviceStateUpdate) -> Result<DeviceState, ApplyError> {
        let fragment = DeviceFragment::from_value(update.class, update.document.clone())
            .map_err(ApplyError::Fragment)?;
        self.apply_fragment(&update.module_id, &fragment, update.received_at)
            .await
            .map_err(ApplyError::Storage)
    }

    pub async fn apply_fragment(
        &self,
        module_id: &str,
        fragment: &DeviceFragment,
        now: DateTime<Utc>,
    ) -> Result<DeviceState, StorageError> {
        let module_lock = self.module_lock(module_id).await;
        let _module_guard = module_lock.lock().await;

        let cached = self.states.lock().await.get(module_id).cloned();
        let current = match cached {
            Some(state) => state,
            None => self
                .repository
                .load_device_state(module_id)
                .await?
                .unwrap_or_else(|| DeviceState::empty(module_id)),
        };

        let mut merged = merge_fragment(&current, fragment);
        merged.updated_at = Some(now);
        self.repository.upsert_device_state(&merged).await?;
        self.states
            .lock()
            .await
            .insert(module_id.to_string(), merged.clone());

        debug!(
            event = events::STATE_MERGED,
            component = COMPONENT,
            module_id,
            class = fragment.class().as_str(),
            "merged device fragment"
        );
        Ok(merged)
    }

    /// Current merged state, or `None` for a module never seen.
    pub async fn get(&self, module_id: &str) -> Result<Option<DeviceState>, StorageError> {
        if let Some(state) = self.states.lock().await.get(module_id) {
            return Ok(Some(state.clone()));
        }

        let Some(loaded) = self.repository.load_device_state(module_id).await? else {
            return Ok(None);
        };
        // A merge may have cached a newer state while the load was in flight.
        let mut states = self.states.lock().await;
        let state = states.entry(module_id.to_string()).or_insert(loaded);
        Ok(Some(state.clone()))
    }

    pub async fn list_modules(&self) -> Result<Vec<String>, StorageError> {
        self.repository.list_modules().await
    }

    async fn module_lock(&self, module_id: &str) -> Arc<Mutex<()>> {
        self.module_locks
            .lock()
            .await
            .entry(module_id.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl BatchSink<DeviceStateUpdate> for DeviceStateStore {
    async fn write_batch(&self, batch: Vec<DeviceStateUpdate>) -> BatchOutcome<DeviceStateUpdate> {
        let mut outcome = BatchOutcome::written(0);
        // Once a module fails transiently, its later updates wait too so a
        // retry never applies an older fragment over a newer one.
        let mut blocked_modules: HashSet<String> = HashSet::new();

        for update in batch {
            if blocked_modules.contains(&update.module_id) {
                outcome.retry.push(update);
                continue;
            }

            match self.apply(&update).await {
                Ok(_) => outcome.written += 1,
                Err(ApplyError::Fragment(err)) => {
                    outcome.skipped += 1;
                    warn!(
                        event = events::STATE_FRAGMENT_SKIPPED,
                        component = COMPONENT,
                        module_id = update.module_id.as_str(),
                        class = update.class.as_str(),
                        err = %err,
                        "skipping malformed device fragment"
                    );
                }
                Err(ApplyError::Storage(err)) if !err.is_transient() => {
                    outcome.skipped += 1;
                    error!(
                        event = events::STATE_PERSIST_REJECTED,
                        component = COMPONENT,
                        module_id = update.module_id.as_str(),
                        class = update.class.as_str(),
                        err = %err,
                        "store rejected device state, dropping fragment"
                    );
                }
                Err(ApplyError::Storage(err)) => {
                    error!(
                        event = events::STATE_PERSIST_FAILED,
                        component = COMPONENT,
                        module_id = update.module_id.as_str(),
                        class = update.class.as_str(),
                        err = %err,
                        "failed to persist device state"
                    );
                    outcome.error = Some(err.to_string());
                    blocked_modules.insert(update.module_id.clone());
                    outcome.retry.push(update);
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::{ApplyError, DeviceStateStore, DeviceStateUpdate};
    use crate::data_plane::flush_worker::BatchSink;
    use crate::ingress::topic_classifier::StateClass;
    use crate::device_state::model::DeviceState;
    use crate::storage::memory::InMemoryStore;
    use crate::storage::{DeviceStateRepository, StorageError};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct RejectingRepository;

    #[async_trait]
    impl DeviceStateRepository for RejectingRepository {
        async fn load_device_state(
            &self,
            _module_id: &str,
        ) -> Result<Option<DeviceState>, StorageError> {
            Ok(None)
        }

        async fn upsert_device_state(&self, _state: &DeviceState) -> Result<(), StorageError> {
            Err(StorageError::Rejected("invalid input syntax for type json".to_string()))
        }

        async fn list_modules(&self) -> Result<Vec<String>, StorageError> {
            Ok(Vec::new())
        }
    }

    /// Holds upserts for one module until released.
    struct GatedRepository {
        inner: InMemoryStore,
        gated_module: &'static str,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl DeviceStateRepository for GatedRepository {
        async fn load_device_state(
            &self,
            module_id: &str,
        ) -> Result<Option<DeviceState>, StorageError> {
            self.inner.load_device_state(module_id).await
        }

        async fn upsert_device_state(&self, state: &DeviceState) -> Result<(), StorageError> {
            if state.module_id == self.gated_module {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.upsert_device_state(state).await
        }

        async fn list_modules(&self) -> Result<Vec<String>, StorageError> {
            self.inner.list_modules().await
        }
    }

    fn update(module_id: &str, class: StateClass, document: serde_json::Value) -> DeviceStateUpdate {
        DeviceStateUpdate {
            module_id: module_id.to_string(),
            class,
            document,
            received_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn first_fragment_creates_state_lazily() {
        let repository = Arc::new(InMemoryStore::new());
        let store = DeviceStateStore::new(repository.clone());

        assert_eq!(store.get("m1").await.unwrap(), None);
        let state = store
            .apply(&update("m1", StateClass::SystemSnapshot, json!({"rssi": -60})))
            .await
            .expect("apply should succeed");

        assert_eq!(state.system.rssi, Some(-60));
        assert!(state.updated_at.is_some());
        assert_eq!(store.list_modules().await.unwrap(), vec!["m1".to_string()]);
    }

    #[tokio::test]
    async fn existing_state_is_loaded_from_repository_before_merge() {
        let repository = Arc::new(InMemoryStore::new());
        DeviceStateStore::new(repository.clone())
            .apply(&update("m1", StateClass::SystemSnapshot, json!({"rssi": -60})))
            .await
            .unwrap();

        let fresh = DeviceStateStore::new(repository);
        let state = fresh
            .apply(&update(
                "m1",
                StateClass::SystemSnapshot,
                json!({"memory": {"heapFreeKb": 120}}),
            ))
            .await
            .unwrap();

        assert_eq!(state.system.rssi, Some(-60));
        assert_eq!(state.system.memory.heap_free_kb, Some(120));
    }

    #[tokio::test]
    async fn malformed_entry_is_skipped_and_batch_continues() {
        let store = DeviceStateStore::new(Arc::new(InMemoryStore::new()));
        let batch = vec![
            update("m1", StateClass::SystemSnapshot, json!({"rssi": "strong"})),
            update("m1", StateClass::HardwareConfig, json!({"chip": {"model": "ESP32"}})),
        ];

        let outcome = store.write_batch(batch).await;

        assert_eq!(outcome.written, 1);
        assert_eq!(outcome.skipped, 1);
        assert!(outcome.retry.is_empty());
        let state = store.get("m1").await.unwrap().expect("state exists");
        assert_eq!(
            state.hardware.chip.and_then(|chip| chip.model).as_deref(),
            Some("ESP32")
        );
    }

    #[tokio::test]
    async fn storage_failure_requeues_module_updates_in_order() {
        let repository = Arc::new(InMemoryStore::new());
        let store = DeviceStateStore::new(repository.clone());
        repository.fail_next_state_writes(1);
        let batch = vec![
            update("m1", StateClass::SystemSnapshot, json!({"rssi": -70})),
            update("m2", StateClass::SystemSnapshot, json!({"rssi": -50})),
            update("m1", StateClass::SystemSnapshot, json!({"rssi": -60})),
        ];

        let outcome = store.write_batch(batch).await;

        assert_eq!(outcome.written, 1);
        let retried: Vec<&str> = outcome
            .retry
            .iter()
            .map(|update| update.module_id.as_str())
            .collect();
        assert_eq!(retried, vec!["m1", "m1"]);
        assert!(outcome.error.is_some());

        let outcome = store.write_batch(outcome.retry).await;
        assert_eq!(outcome.written, 2);
        let state = store.get("m1").await.unwrap().expect("state exists");
        assert_eq!(state.system.rssi, Some(-60));
    }

    #[tokio::test]
    async fn apply_error_reports_fragment_source() {
        let store = DeviceStateStore::new(Arc::new(InMemoryStore::new()));
        let err = store
            .apply(&update("m1", StateClass::SensorsStatus, json!([1, 2])))
            .await
            .unwrap_err();

        assert!(matches!(err, ApplyError::Fragment(_)));
        assert!(err.to_string().contains("malformed device fragment"));
    }

    #[tokio::test]
    async fn rejected_write_is_skipped_without_blocking_module() {
        let store = DeviceStateStore::new(Arc::new(RejectingRepository));
        let batch = vec![
            update("m1", StateClass::SystemSnapshot, json!({"rssi": -70})),
            update("m1", StateClass::SystemSnapshot, json!({"rssi": -60})),
        ];

        let outcome = store.write_batch(batch).await;

        assert_eq!(outcome.written, 0);
        assert_eq!(outcome.skipped, 2);
        assert!(outcome.retry.is_empty());
        assert_eq!(store.get("m1").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_write_for_one_module_does_not_stall_others() {
        let repository = Arc::new(GatedRepository {
            inner: InMemoryStore::new(),
            gated_module: "esp-a",
            entered: Notify::new(),
            release: Notify::new(),
        });
        let store = Arc::new(DeviceStateStore::new(repository.clone()));

        let slow = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .apply(&update("esp-a", StateClass::SystemSnapshot, json!({"rssi": -70})))
                    .await
            })
        };
        repository.entered.notified().await;

        let other = tokio::time::timeout(
            Duration::from_secs(1),
            store.apply(&update("esp-b", StateClass::SystemSnapshot, json!({"rssi": -50}))),
        )
        .await
        .expect("esp-b merge waited on esp-a's write")
        .unwrap();
        assert_eq!(other.system.rssi, Some(-50));

        let read = tokio::time::timeout(Duration::from_secs(1), store.get("esp-b"))
            .await
            .expect("read waited on esp-a's write")
            .unwrap();
        assert_eq!(read.and_then(|state| state.system.rssi), Some(-50));

        repository.release.notify_one();
        let slow = slow.await.unwrap().unwrap();
        assert_eq!(slow.system.rssi, Some(-70));
    }
}
