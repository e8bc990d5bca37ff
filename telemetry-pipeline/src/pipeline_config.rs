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

//! Tunables for buffering, flushing, classification and history planning.

use crate::history::HistoryTiers;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Rejected pipeline settings.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineConfigError {
    ZeroFlushCapacity(&'static str),
    CeilingBelowCapacity { max_buffered: usize, capacity: usize },
    InvalidHistoryWindows { short_days: f64, long_days: f64 },
}

impl Display for PipelineConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineConfigError::ZeroFlushCapacity(buffer) => {
                write!(f, "{buffer} flush capacity must be at least 1")
            }
            PipelineConfigError::CeilingBelowCapacity {
                max_buffered,
                capacity,
            } => write!(
                f,
                "max_buffered ({max_buffered}) must not be below a flush capacity ({capacity})"
            ),
            PipelineConfigError::InvalidHistoryWindows {
                short_days,
                long_days,
            } => write!(
                f,
                "history windows must satisfy 0 < short ({short_days}) <= long ({long_days})"
            ),
        }
    }
}

impl Error for PipelineConfigError {}

/// What happens to an out-of-range sample on the realtime path.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RealtimeRejectedPolicy {
    /// Rejected samples are neither stored nor broadcast.
    #[default]
    Suppress,
    /// Rejected samples are still shown to live subscribers, never stored.
    Broadcast,
}

/// Pipeline tuning. Every field has a default so config files may be sparse.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub measurement_flush_capacity: usize,
    pub measurement_flush_interval_ms: u64,
    pub status_flush_capacity: usize,
    pub status_flush_interval_ms: u64,
    /// Hard ceiling per buffer; the oldest entries are dropped beyond it.
    pub max_buffered: usize,
    pub buffer_report_interval_ms: u64,
    /// Module ids whose topics are dropped. The first topic segment must
    /// equal an entry exactly; `home` does not reserve `homeroom`.
    pub reserved_modules: Vec<String>,
    pub history_short_window_days: f64,
    pub history_long_window_days: f64,
    pub history_default_limit: usize,
    pub history_long_window_limit: usize,
    pub realtime_rejected_policy: RealtimeRejectedPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            measurement_flush_capacity: 100,
            measurement_flush_interval_ms: 5_000,
            status_flush_capacity: 50,
            status_flush_interval_ms: 2_500,
            max_buffered: 100_000,
            buffer_report_interval_ms: 30_000,
            reserved_modules: vec![
                "home".to_string(),
                "dev".to_string(),
                "test-module".to_string(),
            ],
            history_short_window_days: 1.0,
            history_long_window_days: 7.0,
            history_default_limit: 5_000,
            history_long_window_limit: 10_000,
            realtime_rejected_policy: RealtimeRejectedPolicy::Suppress,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineConfigError> {
        if self.measurement_flush_capacity == 0 {
            return Err(PipelineConfigError::ZeroFlushCapacity("measurement"));
        }
        if self.status_flush_capacity == 0 {
            return Err(PipelineConfigError::ZeroFlushCapacity("status"));
        }

        let capacity = self
            .measurement_flush_capacity
            .max(self.status_flush_capacity);
        if self.max_buffered < capacity {
            return Err(PipelineConfigError::CeilingBelowCapacity {
                max_buffered: self.max_buffered,
                capacity,
            });
        }

        let short_days = self.history_short_window_days;
        let long_days = self.history_long_window_days;
        if !(short_days.is_finite() && long_days.is_finite() && short_days > 0.0 && short_days <= long_days)
        {
            return Err(PipelineConfigError::InvalidHistoryWindows {
                short_days,
                long_days,
            });
        }
        Ok(())
    }

    pub fn history_tiers(&self) -> HistoryTiers {
        HistoryTiers {
            short_window_days: self.history_short_window_days,
            long_window_days: self.history_long_window_days,
            default_limit: self.history_default_limit.max(1),
            long_window_limit: self.history_long_window_limit.max(1),
        }
    }

    pub fn measurement_flush_interval(&self) -> Duration {
        Duration::from_millis(self.measurement_flush_interval_ms.max(1))
    }

    pub fn status_flush_interval(&self) -> Duration {
        Duration::from_millis(self.status_flush_interval_ms.max(1))
    }

    pub fn buffer_report_interval(&self) -> Duration {
        Duration::from_millis(self.buffer_report_interval_ms.max(1))
    }
}
