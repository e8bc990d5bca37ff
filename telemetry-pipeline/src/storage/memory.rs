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

//! In-memory implementation of every storage seam.
//!
//! Used by tests and by the ingestor's dry-run mode. Aggregates are computed
//! at query time from the stored samples, and failures can be injected to
//! exercise retry and fallback paths.

use crate::device_state::DeviceState;
use crate::measurement::Measurement;
use crate::storage::{
    DeviceStateRepository, HistoryQuery, HistoryRow, HistoryStore, MeasurementSink, StorageError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

const HOUR: Duration = Duration::from_secs(3_600);

type MeasurementKey = (DateTime<Utc>, String, String);

/// Which history read a caller issued, in call order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HistoryCall {
    Raw,
    Bucketed,
    Hourly,
}

pub struct InMemoryStore {
    measurements: Mutex<BTreeMap<MeasurementKey, f64>>,
    states: Mutex<BTreeMap<String, DeviceState>>,
    insert_batches: Mutex<Vec<usize>>,
    history_calls: Mutex<Vec<HistoryCall>>,
    failing_inserts: AtomicUsize,
    failing_state_writes: AtomicUsize,
    bucketing_supported: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            measurements: Mutex::new(BTreeMap::new()),
            states: Mutex::new(BTreeMap::new()),
            insert_batches: Mutex::new(Vec::new()),
            history_calls: Mutex::new(Vec::new()),
            failing_inserts: AtomicUsize::new(0),
            failing_state_writes: AtomicUsize::new(0),
            bucketing_supported: AtomicBool::new(true),
        }
    }

    /// The next `count` measurement inserts fail as unavailable.
    pub fn fail_next_inserts(&self, count: usize) {
        self.failing_inserts.store(count, Ordering::SeqCst);
    }

    /// The next `count` device-state upserts fail as unavailable.
    pub fn fail_next_state_writes(&self, count: usize) {
        self.failing_state_writes.store(count, Ordering::SeqCst);
    }

    /// Simulates a store without a time-bucketing function.
    pub fn set_bucketing_supported(&self, supported: bool) {
        self.bucketing_supported.store(supported, Ordering::SeqCst);
    }

    /// Sizes of insert batches that reached the store, including failed ones.
    pub async fn insert_batches(&self) -> Vec<usize> {
        self.insert_batches.lock().await.clone()
    }

    pub async fn history_calls(&self) -> Vec<HistoryCall> {
        self.history_calls.lock().await.clone()
    }

    /// Stored samples ordered by time, then module, then sensor.
    pub async fn measurements(&self) -> Vec<Measurement> {
        self.measurements
            .lock()
            .await
            .iter()
            .map(|((time, module_id, sensor_type), value)| {
                Measurement::new(*time, module_id.clone(), sensor_type.clone(), *value)
            })
            .collect()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }

    async fn rows_in_window(&self, query: &HistoryQuery) -> Vec<HistoryRow> {
        self.measurements
            .lock()
            .await
            .iter()
            .filter(|((time, module_id, _), _)| module_id == &query.module_id && *time > query.since)
            .map(|((time, _, sensor_type), value)| HistoryRow {
                time: *time,
                sensor_type: sensor_type.clone(),
                value: *value,
            })
            .collect()
    }

    async fn averaged(&self, query: &HistoryQuery, bucket: Duration) -> Vec<HistoryRow> {
        let width = bucket.as_secs().max(1) as i64;
        let mut buckets: HashMap<(i64, String), (f64, usize)> = HashMap::new();

        // Every sample in the window contributes to its bucket; the window
        // then applies to the bucket start, like a materialized aggregate.
        let window = HistoryQuery {
            since: DateTime::<Utc>::MIN_UTC,
            ..query.clone()
        };
        for row in self.rows_in_window(&window).await {
            let start = row.time.timestamp().div_euclid(width) * width;
            let slot = buckets.entry((start, row.sensor_type)).or_insert((0.0, 0));
            slot.0 += row.value;
            slot.1 += 1;
        }

        let rows = buckets
            .into_iter()
            .filter_map(|((start, sensor_type), (sum, count))| {
                let time = DateTime::<Utc>::from_timestamp(start, 0)?;
                (time > query.since).then(|| HistoryRow {
                    time,
                    sensor_type,
                    value: sum / count as f64,
                })
            })
            .collect();
        newest_first(rows, query.limit)
    }
}

fn newest_first(mut rows: Vec<HistoryRow>, limit: usize) -> Vec<HistoryRow> {
    rows.sort_by(|left, right| {
        right
            .time
            .cmp(&left.time)
            .then_with(|| left.sensor_type.cmp(&right.sensor_type))
    });
    rows.truncate(limit);
    rows
}

#[async_trait]
impl MeasurementSink for InMemoryStore {
    async fn insert_measurements(&self, batch: &[Measurement]) -> Result<u64, StorageError> {
        self.insert_batches.lock().await.push(batch.len());
        if Self::take_failure(&self.failing_inserts) {
            return Err(StorageError::Unavailable(
                "injected insert failure".to_string(),
            ));
        }

        let mut measurements = self.measurements.lock().await;
        let mut inserted = 0;
        for measurement in batch {
            let key = (
                measurement.time,
                measurement.module_id.clone(),
                measurement.sensor_type.clone(),
            );
            if let std::collections::btree_map::Entry::Vacant(slot) = measurements.entry(key) {
                slot.insert(measurement.value);
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[async_trait]
impl DeviceStateRepository for InMemoryStore {
    async fn load_device_state(
        &self,
        module_id: &str,
    ) -> Result<Option<DeviceState>, StorageError> {
        Ok(self.states.lock().await.get(module_id).cloned())
    }

    async fn upsert_device_state(&self, state: &DeviceState) -> Result<(), StorageError> {
        if Self::take_failure(&self.failing_state_writes) {
            return Err(StorageError::Unavailable(
                "injected state write failure".to_string(),
            ));
        }
        self.states
            .lock()
            .await
            .insert(state.module_id.clone(), state.clone());
        Ok(())
    }

    async fn list_modules(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.states.lock().await.keys().cloned().collect())
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn raw_measurements(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<HistoryRow>, StorageError> {
        self.history_calls.lock().await.push(HistoryCall::Raw);
        Ok(newest_first(self.rows_in_window(query).await, query.limit))
    }

    async fn bucketed_measurements(
        &self,
        query: &HistoryQuery,
        bucket: Duration,
    ) -> Result<Vec<HistoryRow>, StorageError> {
        self.history_calls.lock().await.push(HistoryCall::Bucketed);
        if !self.bucketing_supported.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected(
                "time bucketing is not available".to_string(),
            ));
        }
        Ok(self.averaged(query, bucket).await)
    }

    async fn hourly_aggregates(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<HistoryRow>, StorageError> {
        self.history_calls.lock().await.push(HistoryCall::Hourly);
        Ok(self.averaged(query, HOUR).await)
    }
}
