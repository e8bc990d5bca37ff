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

//! Per-message ingress path: classify, validate, buffer, fan out.
//!
//! Never awaits storage. A capacity-triggered batch is handed to its flush
//! worker and the handler returns immediately.

use crate::data_plane::batch_buffer::BatchBuffer;
use crate::data_plane::flush_worker::FlushHandle;
use crate::device_state::DeviceStateUpdate;
use crate::ingress::device_log::forward_device_log;
use crate::ingress::topic_classifier::{StateClass, TopicClass, TopicClassifier, UnrecognizedReason};
use crate::ingress::value_validator::{Validation, ValueValidator};
use crate::measurement::Measurement;
use crate::observability::{events, fields};
use crate::pipeline_config::RealtimeRejectedPolicy;
use crate::realtime::RealtimeFanOut;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn, Level};

const COMPONENT: &str = "ingress_handler";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DropReason {
    UnrecognizedTopic(UnrecognizedReason),
    UnparseableValue,
    MalformedDocument,
    MalformedLog,
}

/// What happened to one inbound message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IngressOutcome {
    MeasurementBuffered { broadcast: bool },
    MeasurementRejected { broadcast: bool },
    StateUpdateBuffered { broadcast: bool },
    DeviceLogForwarded(Level),
    Dropped(DropReason),
}

pub struct IngressHandler {
    classifier: TopicClassifier,
    validator: ValueValidator,
    rejected_policy: RealtimeRejectedPolicy,
    measurements: Arc<BatchBuffer<Measurement>>,
    measurement_flush: FlushHandle<Measurement>,
    state_updates: Arc<BatchBuffer<DeviceStateUpdate>>,
    state_flush: FlushHandle<DeviceStateUpdate>,
    fan_out: RealtimeFanOut,
}

impl IngressHandler {
    pub(crate) fn new(
        classifier: TopicClassifier,
        rejected_policy: RealtimeRejectedPolicy,
        measurements: Arc<BatchBuffer<Measurement>>,
        measurement_flush: FlushHandle<Measurement>,
        state_updates: Arc<BatchBuffer<DeviceStateUpdate>>,
        state_flush: FlushHandle<DeviceStateUpdate>,
        fan_out: RealtimeFanOut,
    ) -> Self {
        Self {
            classifier,
            validator: ValueValidator::new(),
            rejected_policy,
            measurements,
            measurement_flush,
            state_updates,
            state_flush,
            fan_out,
        }
    }

    pub fn validator(&self) -> &ValueValidator {
        &self.validator
    }

    pub async fn on_message(&self, topic: &str, payload: &[u8]) -> IngressOutcome {
        self.on_message_at(topic, payload, Utc::now()).await
    }

    pub async fn on_message_at(
        &self,
        topic: &str,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> IngressOutcome {
        if tracing::enabled!(Level::DEBUG) {
            debug!(
                event = events::INGRESS_RECEIVE,
                component = COMPONENT,
                topic,
                payload = fields::format_payload_preview(payload),
                "received message"
            );
        }

        match self.classifier.classify(topic) {
            TopicClass::Unrecognized(reason) => {
                debug!(
                    event = events::INGRESS_DROP_UNRECOGNIZED_TOPIC,
                    component = COMPONENT,
                    topic,
                    reason = reason.as_str(),
                    "dropping message on unrecognized topic"
                );
                IngressOutcome::Dropped(DropReason::UnrecognizedTopic(reason))
            }
            TopicClass::DeviceLog { module_id } => match forward_device_log(module_id, payload) {
                Some(level) => IngressOutcome::DeviceLogForwarded(level),
                None => IngressOutcome::Dropped(DropReason::MalformedLog),
            },
            TopicClass::Measurement {
                module_id,
                sensor_type,
            } => {
                self.on_measurement(topic, module_id, sensor_type, payload, now)
                    .await
            }
            TopicClass::State { module_id, class } => {
                self.on_state(topic, module_id, class, payload, now).await
            }
        }
    }

    async fn on_measurement(
        &self,
        topic: &str,
        module_id: &str,
        sensor_type: &str,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> IngressOutcome {
        let text = String::from_utf8_lossy(payload);
        let value = match text.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => {
                debug!(
                    event = events::INGRESS_DROP_UNPARSEABLE_VALUE,
                    component = COMPONENT,
                    topic,
                    payload = fields::format_payload_preview(payload),
                    "dropping non-numeric measurement payload"
                );
                return IngressOutcome::Dropped(DropReason::UnparseableValue);
            }
        };

        if let Validation::Invalid(_) = self.validator.validate(module_id, sensor_type, value) {
            let broadcast = match self.rejected_policy {
                RealtimeRejectedPolicy::Suppress => false,
                RealtimeRejectedPolicy::Broadcast => {
                    self.fan_out
                        .publish(topic, payload, Some(value), None, now)
                        .await
                }
            };
            return IngressOutcome::MeasurementRejected { broadcast };
        }

        let measurement = Measurement::new(now, module_id, sensor_type, value);
        if let Some(batch) = self.measurements.append(measurement).await {
            if let Err(batch) = self.measurement_flush.hand_off(batch) {
                self.return_to_buffer(&self.measurements, batch).await;
            }
        }
        debug!(
            event = events::INGRESS_MEASUREMENT_BUFFERED,
            component = COMPONENT,
            module_id,
            sensor_type,
            value,
            "buffered measurement"
        );

        let broadcast = self
            .fan_out
            .publish(topic, payload, Some(value), None, now)
            .await;
        IngressOutcome::MeasurementBuffered { broadcast }
    }

    async fn on_state(
        &self,
        topic: &str,
        module_id: &str,
        class: StateClass,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> IngressOutcome {
        let document: Value = match serde_json::from_slice(payload) {
            Ok(document) => document,
            Err(err) => {
                debug!(
                    event = events::STATE_FRAGMENT_SKIPPED,
                    component = COMPONENT,
                    topic,
                    class = class.as_str(),
                    err = %err,
                    "dropping state message that is not JSON"
                );
                return IngressOutcome::Dropped(DropReason::MalformedDocument);
            }
        };

        let update = DeviceStateUpdate {
            module_id: module_id.to_string(),
            class,
            document: document.clone(),
            received_at: now,
        };
        if let Some(batch) = self.state_updates.append(update).await {
            if let Err(batch) = self.state_flush.hand_off(batch) {
                self.return_to_buffer(&self.state_updates, batch).await;
            }
        }
        debug!(
            event = events::INGRESS_STATE_UPDATE_BUFFERED,
            component = COMPONENT,
            module_id,
            class = class.as_str(),
            "buffered device state update"
        );

        let broadcast = self
            .fan_out
            .publish(topic, payload, None, Some(document), now)
            .await;
        IngressOutcome::StateUpdateBuffered { broadcast }
    }

    async fn return_to_buffer<T>(&self, buffer: &BatchBuffer<T>, batch: Vec<T>) {
        warn!(
            event = events::INGRESS_FLUSH_HANDOFF_FAILED,
            component = COMPONENT,
            buffer = buffer.label(),
            batch_size = batch.len(),
            "flush worker is not running, batch kept in buffer"
        );
        buffer.requeue_front(batch).await;
    }
}
