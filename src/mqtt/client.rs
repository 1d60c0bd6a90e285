use std::time::Duration;

use rumqttc::{
    AsyncClient, Event, EventLoop, Incoming, MqttOptions, Outgoing, TlsConfiguration, Transport,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::{ConnectionStatus, InboundMessage, SessionEvent};
use crate::config::MqttConfig;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub struct MqttClient {
    client: AsyncClient,
    eventloop: EventLoop,
    reconnect_delay: Duration,
}

impl MqttClient {
    pub fn new(config: &MqttConfig) -> Self {
        let (client, eventloop) = AsyncClient::new(mqtt_options(config), 100);
        Self {
            client,
            eventloop,
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    #[cfg(test)]
    fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Handle for requests (subscribe, disconnect) made outside the event loop.
    pub fn handle(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Drive the event loop and translate it into `SessionEvent`s. Reconnection is
    /// left to rumqttc: polling again after an error starts a fresh connect.
    /// Returns after an outgoing disconnect or once the receiver is gone.
    pub async fn run(mut self, event_tx: mpsc::Sender<SessionEvent>) {
        let mut connected = false;

        if !emit_status(&event_tx, ConnectionStatus::Connecting, None).await {
            return;
        }

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                    debug!("ConnAck: session_present={}", ack.session_present);
                    connected = true;
                    if !emit_status(&event_tx, ConnectionStatus::Connected, None).await {
                        return;
                    }
                }
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    let msg = InboundMessage {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    };
                    if event_tx.send(SessionEvent::Message(msg)).await.is_err() {
                        return;
                    }
                }
                Ok(Event::Incoming(Incoming::SubAck(ack))) => {
                    debug!("SubAck pkid={} codes={:?}", ack.pkid, ack.return_codes);
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    info!("Disconnect sent to MQTT broker");
                    emit_status(&event_tx, ConnectionStatus::Disconnected, None).await;
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    let detail = Some(e.to_string());
                    let status = if connected {
                        ConnectionStatus::ConnectionLost
                    } else {
                        ConnectionStatus::Reconnecting
                    };
                    if !emit_status(&event_tx, status, detail).await {
                        return;
                    }

                    tokio::time::sleep(self.reconnect_delay).await;

                    if connected {
                        connected = false;
                        if !emit_status(&event_tx, ConnectionStatus::Reconnecting, None).await {
                            return;
                        }
                    }
                }
            }
        }
    }
}

async fn emit_status(
    event_tx: &mpsc::Sender<SessionEvent>,
    status: ConnectionStatus,
    detail: Option<String>,
) -> bool {
    let sent = event_tx
        .send(SessionEvent::Status { status, detail })
        .await
        .is_ok();
    if !sent {
        error!("Session event channel closed");
    }
    sent
}

fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut mqttopts = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
    mqttopts.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        mqttopts.set_credentials(user, pass);
    }

    if let Some(tls) = &config.tls {
        mqttopts.set_transport(Transport::tls_with_config(TlsConfiguration::Simple {
            ca: tls.ca.clone(),
            alpn: None,
            client_auth: tls.client_auth.clone(),
        }));
    }

    mqttopts
}
