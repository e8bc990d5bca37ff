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

//! # telemetry-pipeline
//!
//! `telemetry-pipeline` ingests sensor-module telemetry delivered over a
//! publish/subscribe transport, batches it into a time-series store, keeps a
//! merged current state per module, fans accepted messages out to live
//! subscribers and answers historical queries at a resolution matched to the
//! requested window.
//!
//! Typical usage is API-first and centered on [`TelemetryPipeline`]. Storage,
//! the realtime subscriber hub and the config publisher are trait seams; the
//! crate ships [`storage::memory::InMemoryStore`] and
//! [`realtime::ChannelHub`] implementations.
//!
//! ```
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use telemetry_pipeline::realtime::ChannelHub;
//! use telemetry_pipeline::sensor_config::{ConfigPublisher, PublishError};
//! use telemetry_pipeline::storage::memory::InMemoryStore;
//! use telemetry_pipeline::{IngressOutcome, PipelineCollaborators, PipelineConfig, TelemetryPipeline};
//!
//! struct NoopPublisher;
//!
//! #[async_trait]
//! impl ConfigPublisher for NoopPublisher {
//!     async fn publish_retained(&self, _topic: &str, _payload: Vec<u8>) -> Result<(), PublishError> {
//!         Ok(())
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = Arc::new(InMemoryStore::new());
//! let collaborators = PipelineCollaborators::in_memory(
//!     store.clone(),
//!     Arc::new(ChannelHub::new(16)),
//!     Arc::new(NoopPublisher),
//! );
//! let pipeline = TelemetryPipeline::new("quick-start", PipelineConfig::default(), collaborators)
//!     .unwrap();
//!
//! let outcome = pipeline.on_message("esp-01/sensors/co2", b"412").await;
//! assert_eq!(outcome, IngressOutcome::MeasurementBuffered { broadcast: false });
//!
//! pipeline.shutdown().await;
//! assert_eq!(store.measurements().await.len(), 1);
//!
//! let history = pipeline.get_history("esp-01", 0.5, None).await.unwrap();
//! assert_eq!(history.sensors["co2"][0].value, 412.0);
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - API facade: [`TelemetryPipeline`] and its [`PipelineCollaborators`]
//! - Ingress: topic classification, range validation, device log forwarding
//! - Data plane: bounded batch buffers and their background flush workers
//! - Device state: fragment decoding, pure per-class merges, the merge store
//! - Realtime: delta-only fan-out in front of a subscriber hub
//! - History: tiered query planning and per-sensor grouping
//! - Storage: collaborator traits and the in-memory implementation
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events. Every event carries an
//! `event` name from [`observability::events`] and a `component` field.
//! Library code does not initialize a global subscriber. Binaries and tests
//! are responsible for one-time `tracing_subscriber` initialization.

#[doc(hidden)]
pub mod benchmark_support;
pub mod data_plane;
pub mod device_state;
pub mod history;
pub mod ingress;
pub mod measurement;
#[doc(hidden)]
pub mod observability;
pub mod pipeline_config;
pub mod realtime;
pub mod sensor_config;
pub mod storage;

mod telemetry_pipeline;

pub use device_state::DeviceState;
pub use ingress::IngressOutcome;
pub use measurement::Measurement;
pub use pipeline_config::{PipelineConfig, PipelineConfigError, RealtimeRejectedPolicy};
pub use telemetry_pipeline::{PipelineCollaborators, PipelineFlushReport, TelemetryPipeline};
