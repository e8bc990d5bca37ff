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

//! The numeric sample record written to the time-series store.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One validated sensor sample. Unique on `(time, module_id, sensor_type)`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub time: DateTime<Utc>,
    pub module_id: String,
    pub sensor_type: String,
    pub value: f64,
}

impl Measurement {
    pub fn new(
        time: DateTime<Utc>,
        module_id: impl Into<String>,
        sensor_type: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            time,
            module_id: module_id.into(),
            sensor_type: sensor_type.into(),
            value,
        }
    }
}
