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

//! Ingress layer.
//!
//! Turns `(topic, payload)` deliveries into buffered measurements, buffered
//! device-state updates, forwarded device logs or drops.

pub mod device_log;
pub mod message_handler;
pub mod topic_classifier;
pub mod value_validator;

pub use message_handler::{DropReason, IngressHandler, IngressOutcome};
pub use topic_classifier::{StateClass, TopicClass, TopicClassifier, UnrecognizedReason};
pub use value_validator::{Validation, ValueRange, ValueValidator};
