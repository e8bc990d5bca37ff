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

mod config;
mod mqtt;
mod postgres;

use crate::config::{Config, ConfigError};
use crate::mqtt::MqttConfigPublisher;
use crate::postgres::PostgresStore;
use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use telemetry_pipeline::realtime::ChannelHub;
use telemetry_pipeline::storage::memory::InMemoryStore;
use telemetry_pipeline::{PipelineCollaborators, TelemetryPipeline};
use tokio::sync::watch;
use tracing::{info, warn};

const REALTIME_CHANNEL_CAPACITY: usize = 256;

#[derive(Parser)]
#[command()]
struct IngestorArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,
    /// Keep everything in memory instead of connecting to the database.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    info!("Started telemetry-ingestor");

    let args = IngestorArgs::parse();
    let config = Config::load(&args.config)?;

    let (client, eventloop) = mqtt::connect(&config.mqtt);
    let realtime = Arc::new(ChannelHub::new(REALTIME_CHANNEL_CAPACITY));
    let publisher = Arc::new(MqttConfigPublisher::new(client.clone()));

    let collaborators = if args.dry_run {
        warn!("dry run: measurements and device state stay in memory");
        PipelineCollaborators::in_memory(Arc::new(InMemoryStore::new()), realtime, publisher)
    } else {
        let database = config.database.as_ref().ok_or(ConfigError::MissingDatabase)?;
        let store = Arc::new(PostgresStore::connect(&database.url, database.max_connections).await?);
        store.initialize_schema().await?;
        PipelineCollaborators {
            measurement_sink: store.clone(),
            device_states: store.clone(),
            history: store,
            realtime,
            config_publisher: publisher,
        }
    };

    let pipeline = Arc::new(TelemetryPipeline::new(
        "telemetry-ingestor",
        config.pipeline.clone(),
        collaborators,
    )?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let session = tokio::spawn(mqtt::run_event_loop(
        eventloop,
        client,
        pipeline.clone(),
        config.mqtt.clone(),
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    let _ = shutdown_tx.send(true);
    if let Err(err) = session.await {
        warn!("mqtt session ended abnormally: {err}");
    }

    let report = pipeline.shutdown().await;
    info!(
        measurements_written = report.measurements.written,
        device_states_written = report.device_states.written,
        "Stopped telemetry-ingestor"
    );

    Ok(())
}
