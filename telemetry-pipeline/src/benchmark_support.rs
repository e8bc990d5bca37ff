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

//! Deterministic benchmark fixtures for the Criterion harness.

use crate::data_plane::batch_buffer::BatchBuffer;
use crate::device_state::merge::merge_fragment;
use crate::device_state::{DeviceFragment, DeviceState, FragmentError};
use crate::history::group_by_sensor;
use crate::ingress::{StateClass, TopicClass, TopicClassifier};
use crate::measurement::Measurement;
use crate::storage::HistoryRow;
use chrono::{DateTime, Duration, Utc};

const SENSOR_TYPES: [&str; 6] = ["co2", "temperature", "humidity", "voc", "pressure", "temperature_bmp"];

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_000)
}

fn topic(index: usize) -> String {
    let module = format!("esp-{:03}", index % 97);
    match index % 8 {
        0 => format!("{module}/system"),
        1 => format!("{module}/sensors/status"),
        2 => format!("{module}/{}", SENSOR_TYPES[index % 3]),
        3 => format!("home/sensors/{}", SENSOR_TYPES[index % 6]),
        4 => format!("{module}/logs"),
        _ => format!("{module}/sensors/{}", SENSOR_TYPES[index % 6]),
    }
}

pub struct ClassificationFixture {
    classifier: TopicClassifier,
    topics: Vec<String>,
}

impl ClassificationFixture {
    pub fn new(rows: usize) -> Self {
        Self {
            classifier: TopicClassifier::new(["home", "dev", "test-module"]),
            topics: (0..rows).map(topic).collect(),
        }
    }

    /// Returns how many topics were measurements.
    pub fn classify_all(&self) -> usize {
        self.topics
            .iter()
            .filter(|topic| {
                matches!(
                    self.classifier.classify(topic),
                    TopicClass::Measurement { .. }
                )
            })
            .count()
    }
}

pub struct BufferAppendFixture {
    buffer: BatchBuffer<Measurement>,
    samples: Vec<Measurement>,
}

impl BufferAppendFixture {
    pub fn new(flush_capacity: usize, samples: usize) -> Self {
        Self {
            buffer: BatchBuffer::new("bench", flush_capacity, flush_capacity * 4),
            samples: (0..samples)
                .map(|index| {
                    Measurement::new(
                        epoch() + Duration::seconds(index as i64),
                        format!("esp-{:03}", index % 17),
                        SENSOR_TYPES[index % SENSOR_TYPES.len()],
                        400.0 + index as f64,
                    )
                })
                .collect(),
        }
    }

    /// Appends every sample and returns how many full batches came back.
    pub async fn append_all(&self) -> usize {
        let mut batches = 0;
        for sample in &self.samples {
            if self.buffer.append(sample.clone()).await.is_some() {
                batches += 1;
            }
        }
        batches + usize::from(!self.buffer.drain().await.is_empty())
    }
}

pub struct StateMergeFixture {
    fragments: Vec<DeviceFragment>,
}

impl StateMergeFixture {
    pub fn new() -> Result<Self, FragmentError> {
        let documents = [
            (
                StateClass::SystemConfig,
                r#"{"ip":"10.0.0.7","mac":"AA:BB","uptime_start":1700000000,
                    "flash":{"used_kb":1200,"free_kb":2800,"system_kb":64},
                    "memory":{"heap_total_kb":320}}"#,
            ),
            (
                StateClass::SystemSnapshot,
                r#"{"rssi":-61,"memory":{"heap_free_kb":150,"heap_min_free_kb":120}}"#,
            ),
            (
                StateClass::SensorsStatus,
                r#"{"co2":{"status":"ok","value":415},"voc":{"status":"warming","value":null}}"#,
            ),
            (
                StateClass::SensorsConfig,
                r#"{"sensors":{"co2":{"interval":30,"model":"SCD41"}}}"#,
            ),
            (
                StateClass::HardwareConfig,
                r#"{"chip":{"model":"ESP32-S3","rev":2,"flash_kb":8192,"cpu_freq_mhz":240}}"#,
            ),
        ];

        let fragments = documents
            .into_iter()
            .map(|(class, document)| DeviceFragment::decode(class, document))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { fragments })
    }

    pub fn merge_all(&self) -> DeviceState {
        self.fragments
            .iter()
            .fold(DeviceState::empty("esp-bench"), |state, fragment| {
                merge_fragment(&state, fragment)
            })
    }
}

pub struct SeriesGroupingFixture {
    rows: Vec<HistoryRow>,
}

impl SeriesGroupingFixture {
    pub fn new(rows: usize) -> Self {
        Self {
            rows: (0..rows)
                .map(|index| HistoryRow {
                    time: epoch() - Duration::minutes(index as i64),
                    sensor_type: SENSOR_TYPES[index % SENSOR_TYPES.len()].to_string(),
                    value: index as f64,
                })
                .collect(),
        }
    }

    /// Returns the number of series produced.
    pub fn group(&self) -> usize {
        group_by_sensor(self.rows.clone()).len()
    }
}
