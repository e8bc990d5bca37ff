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

//! Adapts a [`MeasurementSink`] to the flush worker's batch contract.

use crate::data_plane::flush_worker::{BatchOutcome, BatchSink};
use crate::measurement::Measurement;
use crate::observability::events;
use crate::storage::MeasurementSink;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

const COMPONENT: &str = "measurement_writer";

/// One multi-row insert per batch. A transient failure returns the whole
/// batch for retry; a rejected batch is counted as skipped and dropped.
/// Rows the store already held count as written.
pub struct MeasurementWriter {
    sink: Arc<dyn MeasurementSink>,
}

impl MeasurementWriter {
    pub fn new(sink: Arc<dyn MeasurementSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl BatchSink<Measurement> for MeasurementWriter {
    async fn write_batch(&self, batch: Vec<Measurement>) -> BatchOutcome<Measurement> {
        match self.sink.insert_measurements(&batch).await {
            Ok(inserted) => {
                let duplicates = (batch.len() as u64).saturating_sub(inserted);
                if duplicates > 0 {
                    debug!(
                        event = events::FLUSH_DUPLICATES_IGNORED,
                        component = COMPONENT,
                        batch_size = batch.len(),
                        duplicates,
                        "store ignored duplicate measurements"
                    );
                }
                BatchOutcome::written(batch.len())
            }
            Err(err) if err.is_transient() => BatchOutcome::failed(batch, err.to_string()),
            Err(err) => {
                error!(
                    event = events::FLUSH_BATCH_DISCARDED,
                    component = COMPONENT,
                    batch_size = batch.len(),
                    err = %err,
                    "store rejected measurement batch, discarding it"
                );
                BatchOutcome::discarded(batch.len(), err.to_string())
            }
        }
    }
}
