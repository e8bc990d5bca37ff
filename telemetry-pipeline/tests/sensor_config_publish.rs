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

use serde_json::json;
use std::collections::BTreeMap;
use support::make_pipeline;
use telemetry_pipeline::sensor_config::{ConfigWriteError, ModuleConfig, SensorSettings};
use telemetry_pipeline::PipelineConfig;

fn interval_change(sensor_type: &str, interval: u32) -> ModuleConfig {
    ModuleConfig {
        sensors: BTreeMap::from([(
            sensor_type.to_string(),
            SensorSettings {
                interval: Some(interval),
                model: None,
            },
        )]),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn update_persists_then_publishes_retained_module_config() {
    let harness = make_pipeline("config", PipelineConfig::default());
    let pipeline = &harness.pipeline;

    pipeline
        .update_sensor_config("esp-01", &interval_change("co2", 30))
        .await
        .unwrap();
    let config = pipeline
        .update_sensor_config("esp-01", &interval_change("voc", 10))
        .await
        .unwrap();

    assert_eq!(config.sensors["co2"].interval, Some(30));
    assert_eq!(config.sensors["voc"].interval, Some(10));

    let published = harness.publisher.published().await;
    assert_eq!(published.len(), 2);
    assert_eq!(published[1].0, "esp-01/sensors/config");
    assert_eq!(
        published[1].1,
        json!({"sensors": {"co2": {"interval": 30}, "voc": {"interval": 10}}})
    );

    let state = pipeline.get_device_state("esp-01").await.unwrap().unwrap();
    assert_eq!(state.sensors_config["co2"].interval_seconds, Some(30));

    pipeline.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_changes_are_refused_before_anything_is_written() {
    let harness = make_pipeline("config-invalid", PipelineConfig::default());
    let pipeline = &harness.pipeline;

    let zero = pipeline
        .update_sensor_config("esp-01", &interval_change("co2", 0))
        .await;
    assert!(matches!(zero, Err(ConfigWriteError::InvalidInterval { .. })));

    let wildcard = pipeline
        .update_sensor_config("esp/+", &interval_change("co2", 30))
        .await;
    assert!(matches!(wildcard, Err(ConfigWriteError::InvalidModuleId(_))));

    assert!(harness.publisher.published().await.is_empty());
    assert!(pipeline.list_modules().await.unwrap().is_empty());

    pipeline.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn republish_covers_every_module_with_enabled_sensors() {
    let harness = make_pipeline("republish", PipelineConfig::default());
    let pipeline = &harness.pipeline;

    pipeline
        .update_sensor_config("esp-01", &interval_change("co2", 30))
        .await
        .unwrap();
    pipeline
        .update_sensor_config("esp-02", &interval_change("humidity", 60))
        .await
        .unwrap();
    // Status-only module has nothing to republish.
    pipeline
        .on_message("esp-03/system", br#"{"rssi":-70}"#)
        .await;
    pipeline.flush_now().await;

    let published = pipeline.republish_sensor_configs().await.unwrap();
    assert_eq!(published, 2);

    let topics: Vec<String> = harness
        .publisher
        .published()
        .await
        .into_iter()
        .skip(2)
        .map(|(topic, _)| topic)
        .collect();
    assert_eq!(topics, vec!["esp-01/sensors/config", "esp-02/sensors/config"]);

    pipeline.shutdown().await;
}
