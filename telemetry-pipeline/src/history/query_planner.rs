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

//! Tiered historical reads: raw rows, minute buckets or hourly aggregates
//! depending on the lookback window.

use crate::observability::events;
use crate::storage::{HistoryQuery, HistoryRow, HistoryStore, StorageError};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

const COMPONENT: &str = "history_planner";
const MINUTE_BUCKET: Duration = Duration::from_secs(60);
const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryResolution {
    Raw,
    MinuteBuckets,
    HourlyAggregate,
}

impl HistoryResolution {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryResolution::Raw => "raw",
            HistoryResolution::MinuteBuckets => "minute_buckets",
            HistoryResolution::HourlyAggregate => "hourly_aggregate",
        }
    }
}

#[derive(Debug)]
pub enum HistoryError {
    InvalidWindow(f64),
    Storage(StorageError),
}

impl Display for HistoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::InvalidWindow(days) => {
                write!(f, "lookback window must be a positive number of days, got {days}")
            }
            HistoryError::Storage(err) => write!(f, "history query failed: {err}"),
        }
    }
}

impl Error for HistoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HistoryError::Storage(err) => Some(err),
            HistoryError::InvalidWindow(_) => None,
        }
    }
}

/// Window thresholds (days) and default row caps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistoryTiers {
    pub short_window_days: f64,
    pub long_window_days: f64,
    pub default_limit: usize,
    pub long_window_limit: usize,
}

impl HistoryTiers {
    /// Largest window first: beyond `long` hourly, beyond `short` minute
    /// buckets, otherwise raw.
    pub fn resolution_for(&self, days: f64) -> HistoryResolution {
        if days > self.long_window_days {
            HistoryResolution::HourlyAggregate
        } else if days > self.short_window_days {
            HistoryResolution::MinuteBuckets
        } else {
            HistoryResolution::Raw
        }
    }

    pub fn default_limit_for(&self, days: f64) -> usize {
        if days > self.long_window_days {
            self.long_window_limit
        } else {
            self.default_limit
        }
    }
}

/// Rows of one history read and the resolution actually served.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryFetch {
    pub resolution: HistoryResolution,
    pub fell_back: bool,
    pub rows: Vec<HistoryRow>,
}

/// Read-only planner over a [`HistoryStore`].
pub struct HistoryPlanner {
    store: Arc<dyn HistoryStore>,
    tiers: HistoryTiers,
}

impl HistoryPlanner {
    pub fn new(store: Arc<dyn HistoryStore>, tiers: HistoryTiers) -> Self {
        Self { store, tiers }
    }

    pub fn tiers(&self) -> &HistoryTiers {
        &self.tiers
    }

    pub async fn fetch(
        &self,
        module_id: &str,
        days: f64,
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<HistoryFetch, HistoryError> {
        if !days.is_finite() || days <= 0.0 {
            return Err(HistoryError::InvalidWindow(days));
        }

        let query = HistoryQuery {
            module_id: module_id.to_string(),
            since: window_start(now, days),
            limit: limit
                .filter(|limit| *limit > 0)
                .unwrap_or_else(|| self.tiers.default_limit_for(days)),
        };
        let resolution = self.tiers.resolution_for(days);
        debug!(
            event = events::HISTORY_TIER_SELECTED,
            component = COMPONENT,
            module_id,
            days,
            limit = query.limit,
            resolution = resolution.as_str(),
            "selected history tier"
        );

        let result = match resolution {
            HistoryResolution::Raw => self.store.raw_measurements(&query).await,
            HistoryResolution::HourlyAggregate => self.store.hourly_aggregates(&query).await,
            HistoryResolution::MinuteBuckets => {
                match self.store.bucketed_measurements(&query, MINUTE_BUCKET).await {
                    Ok(rows) => Ok(rows),
                    Err(err) => {
                        warn!(
                            event = events::HISTORY_BUCKETED_FALLBACK,
                            component = COMPONENT,
                            module_id,
                            days,
                            err = %err,
                            "bucketed query failed, falling back to raw rows"
                        );
                        return self
                            .store
                            .raw_measurements(&query)
                            .await
                            .map(|rows| HistoryFetch {
                                resolution: HistoryResolution::Raw,
                                fell_back: true,
                                rows,
                            })
                            .map_err(|err| Self::query_failed(module_id, err));
                    }
                }
            }
        };

        result
            .map(|rows| HistoryFetch {
                resolution,
                fell_back: false,
                rows,
            })
            .map_err(|err| Self::query_failed(module_id, err))
    }

    fn query_failed(module_id: &str, err: StorageError) -> HistoryError {
        error!(
            event = events::HISTORY_QUERY_FAILED,
            component = COMPONENT,
            module_id,
            err = %err,
            "history query failed"
        );
        HistoryError::Storage(err)
    }
}

fn window_start(now: DateTime<Utc>, days: f64) -> DateTime<Utc> {
    let millis = (days * MILLIS_PER_DAY).min(i64::MAX as f64) as i64;
    TimeDelta::try_milliseconds(millis)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
