//! Reacts to session events: subscribes on connect and turns accepted shadow
//! updates into outgoing calls.

pub mod call;
pub mod shadow;

use tracing::{debug, error, info};

use crate::config::DialConfig;
use crate::mqtt::{ConnectionStatus, InboundMessage, SessionEvent, TopicSubscriber};

use self::call::{trigger_call, CallPlacer};
use self::shadow::ShadowUpdate;

pub struct Dispatcher<S, P> {
    subscriber: S,
    placer: P,
    topic: String,
    config: DialConfig,
}

impl<S, P> Dispatcher<S, P>
where
    S: TopicSubscriber,
    P: CallPlacer,
{
    pub fn new(subscriber: S, placer: P, topic: String, config: DialConfig) -> Self {
        Self {
            subscriber,
            placer,
            topic,
            config,
        }
    }

    pub fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Status { status, detail } => self.handle_status(status, detail.as_deref()),
            SessionEvent::Message(msg) => self.handle_message(&msg),
        }
    }

    /// Purely reactive; recovery belongs to the session.
    pub fn handle_status(&self, status: ConnectionStatus, detail: Option<&str>) {
        debug!("Status = {}", status);

        match status {
            ConnectionStatus::Connecting => info!("Connecting..."),
            ConnectionStatus::Connected => {
                info!("...Connected");
                self.subscribe();
            }
            ConnectionStatus::Reconnecting => {
                if let Some(detail) = detail {
                    error!("Connection error: {}", detail);
                }
                info!("...Reconnecting...");
            }
            ConnectionStatus::ConnectionLost => {
                if let Some(detail) = detail {
                    error!("Connection lost: {}", detail);
                }
                info!("...Disconnected");
            }
            ConnectionStatus::Disconnected => info!("...Disconnected"),
        }
    }

    /// Decode, pick a number, dial. Messages without a number are dropped.
    pub fn handle_message(&self, msg: &InboundMessage) {
        if self.config.log_payloads {
            info!(
                "Message arrived on {}: {}",
                msg.topic,
                String::from_utf8_lossy(&msg.payload)
            );
        } else {
            debug!("Message arrived on {} ({} bytes)", msg.topic, msg.payload.len());
        }

        let Some(number) = self.target_number(&msg.payload) else {
            debug!("No number in message on {}, dropping", msg.topic);
            return;
        };

        trigger_call(&self.placer, &number);
    }

    /// Session events that arrive after shutdown was requested. Status is
    /// logged; messages are dropped and nothing is subscribed or dialled.
    pub fn handle_shutdown_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Status { status, detail } => match detail {
                Some(detail) => info!("Status = {} during shutdown: {}", status, detail),
                None => info!("Status = {} during shutdown", status),
            },
            SessionEvent::Message(msg) => {
                debug!("Shutting down, dropping message on {}", msg.topic);
            }
        }
    }

    fn target_number(&self, payload: &[u8]) -> Option<String> {
        if !self.config.parse_number {
            return self.config.fallback_number.clone();
        }
        let update = ShadowUpdate::parse(payload);
        if let (Some(version), Some(_)) = (update.version, &update.number) {
            debug!("Shadow version {} requests call", version);
        }
        update.number
    }

    fn subscribe(&self) {
        info!("Subscribing to {}", self.topic);
        if let Err(e) = self.subscriber.subscribe(&self.topic) {
            error!("Subscription error on {}: {}", self.topic, e);
        }
    }
}
