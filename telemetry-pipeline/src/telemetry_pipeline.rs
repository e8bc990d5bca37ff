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

//! Public facade wiring ingress, buffers, flush workers, device state,
//! realtime fan-out, history and the config write path.

use crate::data_plane::batch_buffer::BatchBuffer;
use crate::data_plane::flush_worker::{FlushHandle, FlushReport, FlushSchedule, FlushWorker};
use crate::data_plane::measurement_writer::MeasurementWriter;
use crate::device_state::{DeviceState, DeviceStateStore, DeviceStateUpdate};
use crate::history::{group_by_sensor, HistoryError, HistoryPlanner, ModuleHistory};
use crate::ingress::{IngressHandler, IngressOutcome, TopicClassifier};
use crate::measurement::Measurement;
use crate::observability::events;
use crate::pipeline_config::{PipelineConfig, PipelineConfigError};
use crate::realtime::{RealtimeFanOut, RealtimeHub};
use crate::sensor_config::{ConfigPublisher, ConfigWriteError, ModuleConfig, SensorConfigService};
use crate::storage::memory::InMemoryStore;
use crate::storage::{DeviceStateRepository, HistoryStore, MeasurementSink, StorageError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const COMPONENT: &str = "telemetry_pipeline";
const MEASUREMENT_BUFFER: &str = "measurements";
const STATE_BUFFER: &str = "device_state";

/// External collaborators the pipeline reads from and writes to.
#[derive(Clone)]
pub struct PipelineCollaborators {
    pub measurement_sink: Arc<dyn MeasurementSink>,
    pub device_states: Arc<dyn DeviceStateRepository>,
    pub history: Arc<dyn HistoryStore>,
    pub realtime: Arc<dyn RealtimeHub>,
    pub config_publisher: Arc<dyn ConfigPublisher>,
}

impl PipelineCollaborators {
    /// Every storage seam served by one [`InMemoryStore`].
    pub fn in_memory(
        store: Arc<InMemoryStore>,
        realtime: Arc<dyn RealtimeHub>,
        config_publisher: Arc<dyn ConfigPublisher>,
    ) -> Self {
        Self {
            measurement_sink: store.clone(),
            device_states: store.clone(),
            history: store,
            realtime,
            config_publisher,
        }
    }
}

/// Flush totals for both buffers.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PipelineFlushReport {
    pub measurements: FlushReport,
    pub device_states: FlushReport,
}

/// Ingestion-to-storage pipeline.
///
/// Construction spawns one flush worker per buffer on the current tokio
/// runtime. Call [`TelemetryPipeline::shutdown`] to flush what is left.
pub struct TelemetryPipeline {
    name: String,
    ingress: IngressHandler,
    measurements: Arc<BatchBuffer<Measurement>>,
    state_updates: Arc<BatchBuffer<DeviceStateUpdate>>,
    measurement_flush: FlushHandle<Measurement>,
    state_flush: FlushHandle<DeviceStateUpdate>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    device_states: Arc<DeviceStateStore>,
    history: HistoryPlanner,
    sensor_config: SensorConfigService,
}

impl TelemetryPipeline {
    pub fn new(
        name: &str,
        config: PipelineConfig,
        collaborators: PipelineCollaborators,
    ) -> Result<Self, PipelineConfigError> {
        config.validate()?;

        let measurements = Arc::new(BatchBuffer::new(
            MEASUREMENT_BUFFER,
            config.measurement_flush_capacity,
            config.max_buffered,
        ));
        let state_updates = Arc::new(BatchBuffer::new(
            STATE_BUFFER,
            config.status_flush_capacity,
            config.max_buffered,
        ));
        let device_states = Arc::new(DeviceStateStore::new(collaborators.device_states));

        let (measurement_flush, measurement_worker) = FlushWorker::spawn(
            measurements.clone(),
            Arc::new(MeasurementWriter::new(collaborators.measurement_sink)),
            FlushSchedule {
                flush_interval: config.measurement_flush_interval(),
                report_interval: Some(config.buffer_report_interval()),
            },
        );
        let (state_flush, state_worker) = FlushWorker::spawn(
            state_updates.clone(),
            device_states.clone(),
            FlushSchedule {
                flush_interval: config.status_flush_interval(),
                report_interval: None,
            },
        );

        let ingress = IngressHandler::new(
            TopicClassifier::new(config.reserved_modules.iter().cloned()),
            config.realtime_rejected_policy,
            measurements.clone(),
            measurement_flush.clone(),
            state_updates.clone(),
            state_flush.clone(),
            RealtimeFanOut::new(collaborators.realtime),
        );

        info!(
            event = events::PIPELINE_START,
            component = COMPONENT,
            name,
            measurement_flush_capacity = config.measurement_flush_capacity,
            status_flush_capacity = config.status_flush_capacity,
            max_buffered = config.max_buffered,
            "telemetry pipeline started"
        );

        Ok(Self {
            name: name.to_string(),
            ingress,
            measurements,
            state_updates,
            measurement_flush,
            state_flush,
            workers: Mutex::new(vec![measurement_worker, state_worker]),
            history: HistoryPlanner::new(collaborators.history, config.history_tiers()),
            sensor_config: SensorConfigService::new(
                device_states.clone(),
                collaborators.config_publisher,
            ),
            device_states,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transport delivery callback.
    pub async fn on_message(&self, topic: &str, payload: &[u8]) -> IngressOutcome {
        self.ingress.on_message(topic, payload).await
    }

    pub async fn on_message_at(
        &self,
        topic: &str,
        payload: &[u8],
        received_at: DateTime<Utc>,
    ) -> IngressOutcome {
        self.ingress.on_message_at(topic, payload, received_at).await
    }

    pub async fn get_device_state(
        &self,
        module_id: &str,
    ) -> Result<Option<DeviceState>, StorageError> {
        self.device_states.get(module_id).await
    }

    pub async fn list_modules(&self) -> Result<Vec<String>, StorageError> {
        self.device_states.list_modules().await
    }

    pub async fn get_history(
        &self,
        module_id: &str,
        days: f64,
        limit: Option<usize>,
    ) -> Result<ModuleHistory, HistoryError> {
        self.get_history_at(module_id, days, limit, Utc::now()).await
    }

    pub async fn get_history_at(
        &self,
        module_id: &str,
        days: f64,
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<ModuleHistory, HistoryError> {
        let fetch = self.history.fetch(module_id, days, limit, now).await?;
        Ok(ModuleHistory {
            module_id: module_id.to_string(),
            resolution: fetch.resolution,
            sensors: group_by_sensor(fetch.rows),
        })
    }

    pub async fn update_sensor_config(
        &self,
        module_id: &str,
        change: &ModuleConfig,
    ) -> Result<ModuleConfig, ConfigWriteError> {
        self.sensor_config.update(module_id, change, Utc::now()).await
    }

    pub async fn republish_sensor_configs(&self) -> Result<usize, ConfigWriteError> {
        self.sensor_config.republish_all().await
    }

    pub async fn pending_measurements(&self) -> usize {
        self.measurements.len().await
    }

    pub async fn pending_state_updates(&self) -> usize {
        self.state_updates.len().await
    }

    /// Measurements rejected by range validation so far.
    pub fn rejected_measurements(&self) -> u64 {
        self.ingress.validator().rejected_count()
    }

    /// Entries dropped because a buffer exceeded its ceiling.
    pub fn dropped_entries(&self) -> u64 {
        self.measurements.dropped() + self.state_updates.dropped()
    }

    /// Flushes both buffers once, after any batch already handed off.
    pub async fn flush_now(&self) -> PipelineFlushReport {
        PipelineFlushReport {
            measurements: self.measurement_flush.flush_now().await.unwrap_or_default(),
            device_states: self.state_flush.flush_now().await.unwrap_or_default(),
        }
    }

    /// Final flush of both buffers, then stops the workers. Later messages
    /// stay buffered in memory.
    pub async fn shutdown(&self) -> PipelineFlushReport {
        let report = PipelineFlushReport {
            measurements: self.measurement_flush.shutdown().await.unwrap_or_default(),
            device_states: self.state_flush.shutdown().await.unwrap_or_default(),
        };

        let workers: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        for worker in workers {
            if let Err(err) = worker.await {
                warn!(
                    event = events::FLUSH_WORKER_STOP,
                    component = COMPONENT,
                    name = self.name.as_str(),
                    err = %err,
                    "flush worker ended abnormally"
                );
            }
        }

        info!(
            event = events::PIPELINE_STOP,
            component = COMPONENT,
            name = self.name.as_str(),
            measurements_written = report.measurements.written,
            measurements_left = self.measurements.len().await,
            states_written = report.device_states.written,
            "telemetry pipeline stopped"
        );
        report
    }
}
