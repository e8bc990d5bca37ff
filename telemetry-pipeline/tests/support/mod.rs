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


use async_trait::async_trait;
use std::sync::Arc;
use telemetry_pipeline::realtime::ChannelHub;
use telemetry_pipeline::sensor_config::{ConfigPublisher, PublishError};
use telemetry_pipeline::storage::memory::InMemoryStore;
use telemetry_pipeline::{PipelineCollaborators, PipelineConfig, TelemetryPipeline};
use tokio::sync::Mutex;

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Captures retained config publishes instead of sending them to a broker.
#[derive(Default)]
pub(crate) struct RecordingPublisher {
    published: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingPublisher {
    #[allow(dead_code)]
    pub(crate) async fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl ConfigPublisher for RecordingPublisher {
    async fn publish_retained(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let document = serde_json::from_slice(&payload)
            .map_err(|err| PublishError(format!("payload is not JSON: {err}")))?;
        self.published
            .lock()
            .await
            .push((topic.to_string(), document));
        Ok(())
    }
}

#[allow(dead_code)]
pub(crate) struct Harness {
    pub(crate) pipeline: TelemetryPipeline,
    pub(crate) store: Arc<InMemoryStore>,
    pub(crate) hub: Arc<ChannelHub>,
    pub(crate) publisher: Arc<RecordingPublisher>,
}

pub(crate) fn make_pipeline(name: &str, config: PipelineConfig) -> Harness {
    init_tracing();

    let store = Arc::new(InMemoryStore::new());
    let hub = Arc::new(ChannelHub::new(64));
    let publisher = Arc::new(RecordingPublisher::default());
    let collaborators =
        PipelineCollaborators::in_memory(store.clone(), hub.clone(), publisher.clone());

    let pipeline = TelemetryPipeline::new(name, config, collaborators)
        .expect("pipeline creation should succeed");

    Harness {
        pipeline,
        store,
        hub,
        publisher,
    }
}

#[allow(dead_code)]
pub(crate) fn small_batches(capacity: usize) -> PipelineConfig {
    PipelineConfig {
        measurement_flush_capacity: capacity,
        status_flush_capacity: capacity,
        ..PipelineConfig::default()
    }
}
