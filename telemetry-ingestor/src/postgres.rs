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

//! PostgreSQL / TimescaleDB implementation of the pipeline storage seams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json as SqlJson;
use sqlx::PgPool;
use std::time::Duration;
use telemetry_pipeline::storage::{
    DeviceStateRepository, HistoryQuery, HistoryRow, HistoryStore, MeasurementSink, StorageError,
};
use telemetry_pipeline::{DeviceState, Measurement};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS measurements (
        time TIMESTAMPTZ NOT NULL,
        module_id TEXT NOT NULL,
        sensor_type TEXT NOT NULL,
        value DOUBLE PRECISION NOT NULL,
        PRIMARY KEY (time, module_id, sensor_type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS device_state (
        module_id TEXT PRIMARY KEY,
        state JSONB NOT NULL,
        updated_at TIMESTAMPTZ
    )
    "#,
];

#[derive(sqlx::FromRow)]
struct MeasurementRow {
    time: DateTime<Utc>,
    sensor_type: String,
    value: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct DeviceStateRow {
    state: SqlJson<DeviceState>,
}

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await
            .map_err(storage_error)?;
        Ok(Self { pool })
    }

    /// Creates the base tables. The hourly continuous aggregate is managed
    /// by database migrations since it needs the TimescaleDB extension.
    pub async fn initialize_schema(&self) -> Result<(), StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(storage_error)?;
        }
        Ok(())
    }

    async fn history_rows(
        &self,
        sql: &str,
        query: &HistoryQuery,
        bucket_secs: Option<f64>,
    ) -> Result<Vec<HistoryRow>, StorageError> {
        let mut statement = sqlx::query_as::<_, MeasurementRow>(sql)
            .bind(&query.module_id)
            .bind(query.since)
            .bind(i64::try_from(query.limit).unwrap_or(i64::MAX));
        if let Some(bucket_secs) = bucket_secs {
            statement = statement.bind(bucket_secs);
        }

        let rows = statement
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        // Aggregates over an empty bucket come back as NULL.
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                row.value.map(|value| HistoryRow {
                    time: row.time,
                    sensor_type: row.sensor_type,
                    value,
                })
            })
            .collect())
    }
}

/// Connection-level failures are worth retrying; anything the server
/// answered with is not.
fn storage_error(err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::Database(db_err) => StorageError::Rejected(db_err.to_string()),
        other @ (sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. }) => StorageError::Rejected(other.to_string()),
        other => StorageError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl MeasurementSink for PostgresStore {
    async fn insert_measurements(&self, batch: &[Measurement]) -> Result<u64, StorageError> {
        let mut times = Vec::with_capacity(batch.len());
        let mut modules = Vec::with_capacity(batch.len());
        let mut sensors = Vec::with_capacity(batch.len());
        let mut values = Vec::with_capacity(batch.len());
        for measurement in batch {
            times.push(measurement.time);
            modules.push(measurement.module_id.clone());
            sensors.push(measurement.sensor_type.clone());
            values.push(measurement.value);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO measurements (time, module_id, sensor_type, value)
            SELECT * FROM UNNEST($1::timestamptz[], $2::text[], $3::text[], $4::float8[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&times)
        .bind(&modules)
        .bind(&sensors)
        .bind(&values)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl DeviceStateRepository for PostgresStore {
    async fn load_device_state(
        &self,
        module_id: &str,
    ) -> Result<Option<DeviceState>, StorageError> {
        let row: Option<DeviceStateRow> =
            sqlx::query_as("SELECT state FROM device_state WHERE module_id = $1")
                .bind(module_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;
        Ok(row.map(|row| row.state.0))
    }

    async fn upsert_device_state(&self, state: &DeviceState) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO device_state (module_id, state, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (module_id)
            DO UPDATE SET state = EXCLUDED.state, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&state.module_id)
        .bind(SqlJson(state))
        .bind(state.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn list_modules(&self) -> Result<Vec<String>, StorageError> {
        sqlx::query_scalar::<_, String>("SELECT module_id FROM device_state ORDER BY module_id")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)
    }
}

#[async_trait]
impl HistoryStore for PostgresStore {
    async fn raw_measurements(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<HistoryRow>, StorageError> {
        self.history_rows(
            r#"
            SELECT time, sensor_type, value
            FROM measurements
            WHERE module_id = $1 AND time > $2
            ORDER BY time DESC
            LIMIT $3
            "#,
            query,
            None,
        )
        .await
    }

    async fn bucketed_measurements(
        &self,
        query: &HistoryQuery,
        bucket: Duration,
    ) -> Result<Vec<HistoryRow>, StorageError> {
        self.history_rows(
            r#"
            SELECT time_bucket(make_interval(secs => $4), time) AS time,
                   sensor_type,
                   AVG(value) AS value
            FROM measurements
            WHERE module_id = $1 AND time > $2
            GROUP BY 1, sensor_type
            ORDER BY 1 DESC
            LIMIT $3
            "#,
            query,
            Some(bucket.as_secs_f64()),
        )
        .await
    }

    async fn hourly_aggregates(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<HistoryRow>, StorageError> {
        self.history_rows(
            r#"
            SELECT bucket AS time, sensor_type, avg_value AS value
            FROM measurements_hourly
            WHERE module_id = $1 AND bucket > $2
            ORDER BY bucket DESC
            LIMIT $3
            "#,
            query,
            None,
        )
        .await
    }
}
