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

//! Realtime fan-out to live subscribers.

pub mod broadcast_cache;
pub mod channel_hub;
pub mod fan_out;

pub use channel_hub::{ChannelHub, RealtimeMessage};
pub use fan_out::{RealtimeEvent, RealtimeFanOut, RealtimeHub, MQTT_DATA_EVENT};
