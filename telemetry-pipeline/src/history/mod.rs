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

//! Historical reads served straight from storage, bypassing the buffers.

pub mod query_planner;
pub mod series;

pub use query_planner::{HistoryError, HistoryFetch, HistoryPlanner, HistoryResolution, HistoryTiers};
pub use series::{display_key, group_by_sensor, ModuleHistory, SeriesPoint};
