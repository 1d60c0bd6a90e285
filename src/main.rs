mod config;
mod dialer;
mod mqtt;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{error, info, warn};

use crate::dialer::Dispatcher;
use crate::dialer::call::{CallPlacer, CommandCallPlacer, LogCallPlacer};
use crate::mqtt::SessionEvent;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting shadow-dialer (mqtt={}:{}, tls={}, thing={}, topic={})",
        config.mqtt.broker_host,
        config.mqtt.broker_port,
        config.mqtt.tls.is_some(),
        config.shadow.thing_name,
        config.shadow.topic,
    );

    let placer: Box<dyn CallPlacer> = if config.dial.dry_run {
        info!("Dry run: calls are logged, not placed");
        Box::new(LogCallPlacer)
    } else {
        match CommandCallPlacer::new(&config.dial.command) {
            Some(placer) => Box::new(placer),
            None => {
                error!("Configuration error: DIAL_COMMAND must not be empty");
                std::process::exit(1);
            }
        }
    };

    if !config.dial.parse_number {
        warn!(
            "Number parsing disabled: every message dials {}",
            config.dial.fallback_number.as_deref().unwrap_or_default()
        );
    }

    let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(100);

    let mqtt_client = mqtt::client::MqttClient::new(&config.mqtt);
    let session = mqtt_client.handle();
    let mqtt_handle = tokio::spawn(async move {
        mqtt_client.run(event_tx).await;
    });

    let dispatcher = Dispatcher::new(
        session.clone(),
        placer,
        config.shadow.topic.clone(),
        config.dial.clone(),
    );

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(event) => dispatcher.handle_event(event),
                    None => {
                        warn!("MQTT session ended");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
                break;
            }
            _ = sigterm() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
        }
    }

    if let Err(e) = session.try_disconnect() {
        warn!("Failed to request MQTT disconnect: {}", e);
    }
    // Let the session flush the disconnect and report it before tearing down.
    let drain = async {
        while let Some(event) = event_rx.recv().await {
            dispatcher.handle_shutdown_event(event);
        }
    };
    if tokio::time::timeout(Duration::from_secs(2), drain).await.is_err() {
        mqtt_handle.abort();
    }
    report_session_exit(mqtt_handle.await);
    info!("shadow-dialer stopped");
}

/// Logs a session task that panicked. Cancellation from shutdown is expected.
/// Returns whether a failure was reported.
fn report_session_exit(result: Result<(), JoinError>) -> bool {
    match result {
        Err(e) if !e.is_cancelled() => {
            error!("MQTT session task failed: {}", e);
            true
        }
        _ => false,
    }
}

async fn sigterm() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
