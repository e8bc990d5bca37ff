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

//! Storage collaborator seams.
//!
//! The pipeline talks to persistence only through these traits. The ingestor
//! binary implements them on PostgreSQL; [`memory::InMemoryStore`] implements
//! them for tests and dry runs.

use crate::device_state::DeviceState;
use crate::measurement::Measurement;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub mod memory;

/// Failures reported by storage collaborators.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StorageError {
    /// Transient: connection loss, timeout, pool exhaustion. Worth retrying.
    Unavailable(String),
    /// The store refused the operation, e.g. an unsupported function.
    Rejected(String),
}

impl StorageError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Unavailable(reason) => write!(f, "storage unavailable: {reason}"),
            StorageError::Rejected(reason) => write!(f, "storage rejected operation: {reason}"),
        }
    }
}

impl Error for StorageError {}

/// Multi-row measurement insert. Rows already present under the same
/// `(time, module_id, sensor_type)` are ignored; returns rows newly written.
#[async_trait]
pub trait MeasurementSink: Send + Sync {
    async fn insert_measurements(&self, batch: &[Measurement]) -> Result<u64, StorageError>;
}

/// Merged device state persistence, keyed by module id.
#[async_trait]
pub trait DeviceStateRepository: Send + Sync {
    async fn load_device_state(&self, module_id: &str)
        -> Result<Option<DeviceState>, StorageError>;

    async fn upsert_device_state(&self, state: &DeviceState) -> Result<(), StorageError>;

    /// Module ids with stored state, ascending.
    async fn list_modules(&self) -> Result<Vec<String>, StorageError>;
}

/// Read window for historical queries: rows strictly newer than `since`.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryQuery {
    pub module_id: String,
    pub since: DateTime<Utc>,
    pub limit: usize,
}

/// One historical point, raw or aggregated.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub time: DateTime<Utc>,
    pub sensor_type: String,
    pub value: f64,
}

/// Parameterized historical reads. Every method returns rows newest first,
/// capped at `query.limit`.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn raw_measurements(&self, query: &HistoryQuery)
        -> Result<Vec<HistoryRow>, StorageError>;

    /// Raw rows averaged into fixed buckets of `bucket` width.
    async fn bucketed_measurements(
        &self,
        query: &HistoryQuery,
        bucket: Duration,
    ) -> Result<Vec<HistoryRow>, StorageError>;

    /// Rows from the pre-computed hourly aggregate relation.
    async fn hourly_aggregates(&self, query: &HistoryQuery)
        -> Result<Vec<HistoryRow>, StorageError>;
}
