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

//! Physical-range validation for numeric sensor samples.

use crate::observability::{events, fields};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

const COMPONENT: &str = "value_validator";

/// Inclusive physical bounds for one sensor type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

const KNOWN_RANGES: [(&str, ValueRange); 6] = [
    ("co2", ValueRange { min: 0.0, max: 10_000.0 }),
    ("temperature", ValueRange { min: -40.0, max: 85.0 }),
    ("humidity", ValueRange { min: 0.0, max: 100.0 }),
    ("voc", ValueRange { min: 0.0, max: 500.0 }),
    ("pressure", ValueRange { min: 300.0, max: 1_200.0 }),
    ("temperature_bmp", ValueRange { min: -40.0, max: 85.0 }),
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Validation {
    Valid,
    Invalid(ValueRange),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }
}

/// Rejects physically impossible readings. Unknown sensor types always pass.
#[derive(Debug, Default)]
pub struct ValueValidator {
    rejected: AtomicU64,
}

impl ValueValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range_for(sensor_type: &str) -> Option<ValueRange> {
        KNOWN_RANGES
            .iter()
            .find(|(name, _)| *name == sensor_type)
            .map(|(_, range)| *range)
    }

    pub fn validate(&self, module_id: &str, sensor_type: &str, value: f64) -> Validation {
        let Some(range) = Self::range_for(sensor_type) else {
            return Validation::Valid;
        };

        if value >= range.min && value <= range.max {
            return Validation::Valid;
        }

        self.rejected.fetch_add(1, Ordering::Relaxed);
        warn!(
            event = events::INGRESS_VALUE_REJECTED,
            component = COMPONENT,
            module_id,
            sensor_type,
            value,
            min = range.min,
            max = range.max,
            reason = fields::REASON_OUT_OF_RANGE,
            "rejected out-of-range sensor value"
        );
        Validation::Invalid(range)
    }

    /// Number of samples rejected since construction.
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}
