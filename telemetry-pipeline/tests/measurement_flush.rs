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

mod support;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use support::{init_tracing, make_pipeline, small_batches, RecordingPublisher};
use telemetry_pipeline::ingress::{DropReason, UnrecognizedReason};
use telemetry_pipeline::realtime::ChannelHub;
use telemetry_pipeline::storage::memory::InMemoryStore;
use telemetry_pipeline::storage::{MeasurementSink, StorageError};
use telemetry_pipeline::{
    IngressOutcome, Measurement, PipelineCollaborators, PipelineConfig, TelemetryPipeline,
};

/// A store that refuses every insert outright.
#[derive(Default)]
struct RejectingSink {
    attempts: AtomicUsize,
}

#[async_trait]
impl MeasurementSink for RejectingSink {
    async fn insert_measurements(&self, _batch: &[Measurement]) -> Result<u64, StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Rejected("function does not exist".to_string()))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn reaching_capacity_hands_off_one_full_batch() {
    let harness = make_pipeline("capacity", small_batches(3));

    for value in ["400", "401", "402", "403"] {
        let outcome = harness.pipeline.on_message("esp-01/sensors/co2", value.as_bytes()).await;
        assert_eq!(outcome, IngressOutcome::MeasurementBuffered { broadcast: false });
    }

    let report = harness.pipeline.flush_now().await;
    assert_eq!(report.measurements.written, 1);
    assert_eq!(harness.store.insert_batches().await, vec![3, 1]);
    assert_eq!(harness.store.measurements().await.len(), 4);
    assert_eq!(harness.pipeline.pending_measurements().await, 0);

    harness.pipeline.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_insert_keeps_entries_for_the_next_flush() {
    let harness = make_pipeline("requeue", PipelineConfig::default());
    harness.store.fail_next_inserts(1);

    harness.pipeline.on_message("esp-01/sensors/temperature", b"21.5").await;
    harness.pipeline.on_message("esp-01/sensors/humidity", b"40").await;

    let failed = harness.pipeline.flush_now().await;
    assert_eq!(failed.measurements.requeued, 2);
    assert_eq!(harness.pipeline.pending_measurements().await, 2);
    assert!(harness.store.measurements().await.is_empty());

    let retried = harness.pipeline.flush_now().await;
    assert_eq!(retried.measurements.written, 2);
    assert_eq!(harness.pipeline.pending_measurements().await, 0);

    let stored: Vec<String> = harness
        .store
        .measurements()
        .await
        .into_iter()
        .map(|measurement| measurement.sensor_type)
        .collect();
    assert!(stored.contains(&"temperature".to_string()));
    assert!(stored.contains(&"humidity".to_string()));

    harness.pipeline.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_insert_is_discarded_instead_of_retried_forever() {
    init_tracing();
    let store = Arc::new(InMemoryStore::new());
    let sink = Arc::new(RejectingSink::default());
    let mut collaborators = PipelineCollaborators::in_memory(
        store,
        Arc::new(ChannelHub::new(8)),
        Arc::new(RecordingPublisher::default()),
    );
    collaborators.measurement_sink = sink.clone();
    let pipeline = TelemetryPipeline::new("rejected", PipelineConfig::default(), collaborators)
        .expect("pipeline creation should succeed");

    pipeline.on_message("esp-01/sensors/co2", b"412").await;

    let first = pipeline.flush_now().await;
    assert_eq!(first.measurements.skipped, 1);
    assert_eq!(first.measurements.requeued, 0);
    for _ in 0..4 {
        pipeline.flush_now().await;
    }

    assert_eq!(pipeline.pending_measurements().await, 0);
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 1);

    pipeline.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn out_of_range_values_are_counted_but_never_stored() {
    let harness = make_pipeline("validation", PipelineConfig::default());

    let outcome = harness.pipeline.on_message("esp-01/sensors/co2", b"10001").await;
    assert_eq!(outcome, IngressOutcome::MeasurementRejected { broadcast: false });
    let outcome = harness.pipeline.on_message("esp-01/sensors/co2", b"10000").await;
    assert_eq!(outcome, IngressOutcome::MeasurementBuffered { broadcast: false });

    harness.pipeline.shutdown().await;

    assert_eq!(harness.pipeline.rejected_measurements(), 1);
    let stored = harness.store.measurements().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].value, 10000.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn unusable_messages_are_dropped_before_buffering() {
    let harness = make_pipeline("drops", PipelineConfig::default());

    assert_eq!(
        harness.pipeline.on_message("home/sensors/co2", b"400").await,
        IngressOutcome::Dropped(DropReason::UnrecognizedTopic(
            UnrecognizedReason::ReservedModule
        ))
    );
    assert_eq!(
        harness.pipeline.on_message("esp-01", b"400").await,
        IngressOutcome::Dropped(DropReason::UnrecognizedTopic(UnrecognizedReason::TooShort))
    );
    assert_eq!(
        harness.pipeline.on_message("esp-01/sensors/co2", b"n/a").await,
        IngressOutcome::Dropped(DropReason::UnparseableValue)
    );
    assert_eq!(
        harness.pipeline.on_message("esp-01/system", b"{not json").await,
        IngressOutcome::Dropped(DropReason::MalformedDocument)
    );

    assert_eq!(harness.pipeline.pending_measurements().await, 0);
    assert_eq!(harness.pipeline.pending_state_updates().await, 0);
    harness.pipeline.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn configured_reserved_modules_match_whole_first_segment() {
    let config = PipelineConfig {
        reserved_modules: vec!["lab".to_string()],
        ..PipelineConfig::default()
    };
    let harness = make_pipeline("reserved", config);

    assert_eq!(
        harness.pipeline.on_message("lab/sensors/co2", b"400").await,
        IngressOutcome::Dropped(DropReason::UnrecognizedTopic(
            UnrecognizedReason::ReservedModule
        ))
    );
    assert_eq!(
        harness.pipeline.on_message("labs/sensors/co2", b"400").await,
        IngressOutcome::MeasurementBuffered { broadcast: false }
    );
    assert_eq!(
        harness.pipeline.on_message("home/sensors/co2", b"400").await,
        IngressOutcome::MeasurementBuffered { broadcast: false }
    );

    assert_eq!(harness.pipeline.pending_measurements().await, 2);
    harness.pipeline.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_writes_everything_still_buffered() {
    let harness = make_pipeline("shutdown", PipelineConfig::default());

    harness.pipeline.on_message("esp-02/sensors/voc", b"120").await;
    harness.pipeline.on_message("esp-02/sensors/pressure", b"1013.2").await;
    harness
        .pipeline
        .on_message("esp-02/system", br#"{"rssi": -60}"#)
        .await;

    let report = harness.pipeline.shutdown().await;
    assert_eq!(report.measurements.written, 2);
    assert_eq!(report.device_states.written, 1);
    assert_eq!(harness.store.measurements().await.len(), 2);
    assert_eq!(harness.pipeline.list_modules().await.unwrap(), vec!["esp-02"]);
}

#[tokio::test(start_paused = true)]
async fn interval_tick_flushes_a_partial_batch() {
    let harness = make_pipeline("interval", PipelineConfig::default());

    harness.pipeline.on_message("esp-03/sensors/co2", b"650").await;
    assert_eq!(harness.pipeline.pending_measurements().await, 1);

    tokio::time::sleep(std::time::Duration::from_millis(5_100)).await;

    assert_eq!(harness.pipeline.pending_measurements().await, 0);
    assert_eq!(harness.store.insert_batches().await, vec![1]);
    harness.pipeline.shutdown().await;
}
