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

//! Groups history rows into per-sensor series for display.

use crate::history::query_planner::HistoryResolution;
use crate::storage::HistoryRow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Series always present in a response, even when empty.
const DISPLAY_SERIES: [&str; 6] = ["co2", "temp", "hum", "voc", "pressure", "temperature_bmp"];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleHistory {
    pub module_id: String,
    pub resolution: HistoryResolution,
    pub sensors: BTreeMap<String, Vec<SeriesPoint>>,
}

/// Short display name for a stored sensor type.
pub fn display_key(sensor_type: &str) -> &str {
    match sensor_type {
        "temperature" => "temp",
        "humidity" => "hum",
        other => other,
    }
}

/// Keeps row order within each series.
pub fn group_by_sensor(rows: Vec<HistoryRow>) -> BTreeMap<String, Vec<SeriesPoint>> {
    let mut sensors: BTreeMap<String, Vec<SeriesPoint>> = DISPLAY_SERIES
        .iter()
        .map(|name| (name.to_string(), Vec::new()))
        .collect();

    for row in rows {
        sensors
            .entry(display_key(&row.sensor_type).to_string())
            .or_default()
            .push(SeriesPoint {
                time: row.time,
                value: row.value,
            });
    }
    sensors
}
