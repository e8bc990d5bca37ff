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

//! Merged per-module device state.
//!
//! Field names serialize in camelCase. Deserialization also accepts the
//! snake_case spellings emitted by older firmware, so these types double as
//! fragment leaves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    pub module_id: String,
    #[serde(default)]
    pub system: SystemInfo,
    #[serde(default)]
    pub hardware: HardwareInfo,
    #[serde(default)]
    pub sensors_status: BTreeMap<String, SensorStatus>,
    #[serde(default)]
    pub sensors_config: BTreeMap<String, SensorConfig>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeviceState {
    pub fn empty(module_id: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            ..Self::default()
        }
    }

    /// Sensor configs that are switched on, for republishing to the device.
    pub fn enabled_sensor_configs(&self) -> impl Iterator<Item = (&String, &SensorConfig)> {
        self.sensors_config.iter().filter(|(_, config)| config.enabled)
    }
}

/// Network and runtime facts.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub ip: Option<String>,
    pub mac: Option<String>,
    #[serde(alias = "module_type")]
    pub module_type: Option<String>,
    #[serde(alias = "uptime_start")]
    pub uptime_start: Option<i64>,
    pub rssi: Option<i32>,
    pub flash: Option<FlashInfo>,
    #[serde(default)]
    pub memory: MemoryInfo,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashInfo {
    #[serde(alias = "used_kb")]
    pub used_kb: Option<i64>,
    #[serde(alias = "free_kb")]
    pub free_kb: Option<i64>,
    #[serde(alias = "system_kb")]
    pub system_kb: Option<i64>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInfo {
    #[serde(alias = "heap_total_kb")]
    pub heap_total_kb: Option<i64>,
    #[serde(alias = "heap_free_kb")]
    pub heap_free_kb: Option<i64>,
    #[serde(alias = "heap_min_free_kb")]
    pub heap_min_free_kb: Option<i64>,
    pub psram: Option<PsramInfo>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PsramInfo {
    #[serde(alias = "total_kb")]
    pub total_kb: Option<i64>,
    #[serde(alias = "free_kb")]
    pub free_kb: Option<i64>,
    #[serde(alias = "used_percent")]
    pub used_percent: Option<f64>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareInfo {
    pub chip: Option<ChipInfo>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChipInfo {
    pub model: Option<String>,
    pub rev: Option<i64>,
    #[serde(alias = "cpu_freq_mhz")]
    pub cpu_freq_mhz: Option<i64>,
    #[serde(alias = "flash_kb")]
    pub flash_kb: Option<i64>,
    pub cores: Option<i64>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorStatus {
    pub status: Option<String>,
    pub last_value: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorConfig {
    pub interval_seconds: Option<u32>,
    pub model: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            interval_seconds: None,
            model: None,
            enabled: true,
        }
    }
}

fn enabled_by_default() -> bool {
    true
}
