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

//! Per-module device state: the merged model, the partial fragments devices
//! publish, the pure merge rules and the store that persists the result.

pub mod fragment;
pub mod merge;
pub mod merge_store;
pub mod model;

pub use fragment::{DeviceFragment, FragmentError};
pub use merge_store::{ApplyError, DeviceStateStore, DeviceStateUpdate};
pub use model::{
    ChipInfo, DeviceState, FlashInfo, HardwareInfo, MemoryInfo, PsramInfo, SensorConfig,
    SensorStatus, SystemInfo,
};
