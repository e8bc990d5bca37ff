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

//! Pure merge functions, one per fragment variant.
//!
//! Each returns a new state. A field the fragment leaves out keeps its
//! existing value, so replaying a fragment is idempotent and fragments of
//! different classes never disturb each other's fields.

use crate::device_state::fragment::{
    DeviceFragment, HardwareConfigFragment, MemoryFragment, SensorConfigFragment,
    SensorStatusFragment, SystemConfigFragment, SystemSnapshotFragment,
};
use crate::device_state::model::{DeviceState, MemoryInfo, PsramInfo};
use std::collections::BTreeMap;

pub fn merge_fragment(state: &DeviceState, fragment: &DeviceFragment) -> DeviceState {
    match fragment {
        DeviceFragment::SystemSnapshot(fragment) => merge_system_snapshot(state, fragment),
        DeviceFragment::SystemConfig(fragment) => merge_system_config(state, fragment),
        DeviceFragment::SensorsStatus(fragment) => merge_sensors_status(state, fragment),
        DeviceFragment::SensorsConfig(fragment) => merge_sensors_config(state, fragment),
        DeviceFragment::HardwareConfig(fragment) => merge_hardware_config(state, fragment),
    }
}

pub fn merge_system_snapshot(state: &DeviceState, fragment: &SystemSnapshotFragment) -> DeviceState {
    let mut next = state.clone();
    prefer(&mut next.system.rssi, &fragment.rssi);
    if let Some(memory) = &fragment.memory {
        merge_memory(&mut next.system.memory, memory);
    }
    next
}

/// Static boot facts. Flash counters are replaced as a unit.
pub fn merge_system_config(state: &DeviceState, fragment: &SystemConfigFragment) -> DeviceState {
    let mut next = state.clone();
    let system = &mut next.system;
    prefer(&mut system.ip, &fragment.ip);
    prefer(&mut system.mac, &fragment.mac);
    prefer(&mut system.module_type, &fragment.module_type);
    prefer(&mut system.uptime_start, &fragment.uptime_start);
    prefer(&mut system.flash, &fragment.flash);
    if let Some(memory) = &fragment.memory {
        merge_memory(&mut system.memory, memory);
    }
    next
}

/// Touches only `status` and `last_value` of the mentioned sensors.
pub fn merge_sensors_status(
    state: &DeviceState,
    fragment: &BTreeMap<String, SensorStatusFragment>,
) -> DeviceState {
    let mut next = state.clone();
    for (sensor_type, incoming) in fragment {
        let entry = next.sensors_status.entry(sensor_type.clone()).or_default();
        prefer(&mut entry.status, &incoming.status);
        if let Some(value) = incoming.value {
            entry.last_value = value;
        }
    }
    next
}

pub fn merge_sensors_config(
    state: &DeviceState,
    fragment: &BTreeMap<String, SensorConfigFragment>,
) -> DeviceState {
    let mut next = state.clone();
    for (sensor_type, incoming) in fragment {
        let entry = next.sensors_config.entry(sensor_type.clone()).or_default();
        prefer(&mut entry.interval_seconds, &incoming.interval_seconds);
        prefer(&mut entry.model, &incoming.model);
        if let Some(enabled) = incoming.enabled {
            entry.enabled = enabled;
        }
    }
    next
}

/// Chip descriptors are replaced wholesale.
pub fn merge_hardware_config(state: &DeviceState, fragment: &HardwareConfigFragment) -> DeviceState {
    let mut next = state.clone();
    prefer(&mut next.hardware.chip, &fragment.chip);
    next
}

fn merge_memory(memory: &mut MemoryInfo, incoming: &MemoryFragment) {
    prefer(&mut memory.heap_total_kb, &incoming.heap_total_kb);
    prefer(&mut memory.heap_free_kb, &incoming.heap_free_kb);
    prefer(&mut memory.heap_min_free_kb, &incoming.heap_min_free_kb);
    if let Some(psram) = &incoming.psram {
        merge_psram(memory.psram.get_or_insert_with(PsramInfo::default), psram);
    }
}

fn merge_psram(psram: &mut PsramInfo, incoming: &PsramInfo) {
    prefer(&mut psram.total_kb, &incoming.total_kb);
    prefer(&mut psram.free_kb, &incoming.free_kb);
    prefer(&mut psram.used_percent, &incoming.used_percent);
}

fn prefer<T: Clone>(existing: &mut Option<T>, incoming: &Option<T>) {
    if let Some(value) = incoming {
        *existing = Some(value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_state::model::{ChipInfo, FlashInfo, SensorConfig};

    fn snapshot(rssi: Option<i32>, heap_free_kb: Option<i64>) -> SystemSnapshotFragment {
        SystemSnapshotFragment {
            rssi,
            memory: heap_free_kb.map(|heap_free_kb| MemoryFragment {
                heap_free_kb: Some(heap_free_kb),
                ..MemoryFragment::default()
            }),
        }
    }

    #[test]
    fn disjoint_snapshot_fields_survive_each_other() {
        let empty = DeviceState::empty("m1");

        let rssi_first = merge_system_snapshot(
            &merge_system_snapshot(&empty, &snapshot(Some(-60), None)),
            &snapshot(None, Some(120)),
        );
        let heap_first = merge_system_snapshot(
            &merge_system_snapshot(&empty, &snapshot(None, Some(120))),
            &snapshot(Some(-60), None),
        );

        assert_eq!(rssi_first.system.rssi, Some(-60));
        assert_eq!(rssi_first.system.memory.heap_free_kb, Some(120));
        assert_eq!(rssi_first, heap_first);
    }

    #[test]
    fn merges_are_idempotent_under_replay() {
        let fragment = DeviceFragment::SystemConfig(SystemConfigFragment {
            ip: Some("10.0.0.5".to_string()),
            flash: Some(FlashInfo {
                used_kb: Some(1),
                free_kb: Some(2),
                system_kb: Some(3),
            }),
            ..SystemConfigFragment::default()
        });
        let once = merge_fragment(&DeviceState::empty("m1"), &fragment);
        let twice = merge_fragment(&once, &fragment);

        assert_eq!(once, twice);
    }

    #[test]
    fn system_config_keeps_snapshot_counters() {
        let state = merge_system_snapshot(&DeviceState::empty("m1"), &snapshot(Some(-70), Some(100)));
        let config = SystemConfigFragment {
            mac: Some("AA:BB".to_string()),
            memory: Some(MemoryFragment {
                heap_total_kb: Some(320),
                ..MemoryFragment::default()
            }),
            ..SystemConfigFragment::default()
        };

        let merged = merge_system_config(&state, &config);

        assert_eq!(merged.system.rssi, Some(-70));
        assert_eq!(merged.system.memory.heap_free_kb, Some(100));
        assert_eq!(merged.system.memory.heap_total_kb, Some(320));
        assert_eq!(merged.system.mac.as_deref(), Some("AA:BB"));
    }

    #[test]
    fn psram_merges_field_by_field() {
        let mut state = DeviceState::empty("m1");
        state.system.memory.psram = Some(PsramInfo {
            total_kb: Some(4096),
            free_kb: Some(4000),
            used_percent: Some(2.3),
        });
        let fragment = SystemSnapshotFragment {
            rssi: None,
            memory: Some(MemoryFragment {
                psram: Some(PsramInfo {
                    free_kb: Some(3900),
                    ..PsramInfo::default()
                }),
                ..MemoryFragment::default()
            }),
        };

        let merged = merge_system_snapshot(&state, &fragment);
        let psram = merged.system.memory.psram.expect("psram kept");

        assert_eq!(psram.total_kb, Some(4096));
        assert_eq!(psram.free_kb, Some(3900));
    }

    #[test]
    fn sensor_status_does_not_touch_config() {
        let mut state = DeviceState::empty("m1");
        state.sensors_config.insert(
            "co2".to_string(),
            SensorConfig {
                interval_seconds: Some(30),
                ..SensorConfig::default()
            },
        );
        let mut status = BTreeMap::new();
        status.insert(
            "co2".to_string(),
            SensorStatusFragment {
                status: Some("ok".to_string()),
                value: Some(Some(412.0)),
            },
        );

        let merged = merge_sensors_status(&state, &status);

        assert_eq!(merged.sensors_status["co2"].last_value, Some(412.0));
        assert_eq!(merged.sensors_config["co2"].interval_seconds, Some(30));
    }

    #[test]
    fn explicit_null_value_clears_last_value_but_absence_keeps_it() {
        let mut state = DeviceState::empty("m1");
        state.sensors_status.insert(
            "voc".to_string(),
            crate::device_state::model::SensorStatus {
                status: Some("ok".to_string()),
                last_value: Some(80.0),
            },
        );
        let status_only = BTreeMap::from([(
            "voc".to_string(),
            SensorStatusFragment {
                status: Some("error".to_string()),
                value: None,
            },
        )]);
        let explicit_null = BTreeMap::from([(
            "voc".to_string(),
            SensorStatusFragment {
                status: None,
                value: Some(None),
            },
        )]);

        let kept = merge_sensors_status(&state, &status_only);
        assert_eq!(kept.sensors_status["voc"].last_value, Some(80.0));
        assert_eq!(kept.sensors_status["voc"].status.as_deref(), Some("error"));

        let cleared = merge_sensors_status(&kept, &explicit_null);
        assert_eq!(cleared.sensors_status["voc"].last_value, None);
        assert_eq!(cleared.sensors_status["voc"].status.as_deref(), Some("error"));
    }

    #[test]
    fn sensor_config_merges_per_key() {
        let first = BTreeMap::from([(
            "co2".to_string(),
            SensorConfigFragment {
                model: Some("MH-Z14A".to_string()),
                ..SensorConfigFragment::default()
            },
        )]);
        let second = BTreeMap::from([(
            "co2".to_string(),
            SensorConfigFragment {
                interval_seconds: Some(60),
                ..SensorConfigFragment::default()
            },
        )]);

        let merged = merge_sensors_config(
            &merge_sensors_config(&DeviceState::empty("m1"), &first),
            &second,
        );

        let co2 = &merged.sensors_config["co2"];
        assert_eq!(co2.model.as_deref(), Some("MH-Z14A"));
        assert_eq!(co2.interval_seconds, Some(60));
        assert!(co2.enabled);
    }

    #[test]
    fn hardware_chip_is_replaced_wholesale_and_kept_when_absent() {
        let chip = ChipInfo {
            model: Some("ESP32-S3".to_string()),
            cores: Some(2),
            ..ChipInfo::default()
        };
        let state = merge_hardware_config(
            &DeviceState::empty("m1"),
            &HardwareConfigFragment {
                chip: Some(chip.clone()),
            },
        );

        let replaced = merge_hardware_config(
            &state,
            &HardwareConfigFragment {
                chip: Some(ChipInfo {
                    model: Some("ESP32".to_string()),
                    ..ChipInfo::default()
                }),
            },
        );
        let kept = merge_hardware_config(&state, &HardwareConfigFragment { chip: None });

        assert_eq!(replaced.hardware.chip.and_then(|chip| chip.cores), None);
        assert_eq!(kept.hardware.chip, Some(chip));
    }
}
