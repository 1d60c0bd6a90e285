pub mod client;

use std::fmt;

use rumqttc::{AsyncClient, ClientError, QoS};
use thiserror::Error;

/// Lifecycle states reported by the MQTT session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting,
    ConnectionLost,
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Reconnecting => "Reconnecting",
            Self::ConnectionLost => "ConnectionLost",
            Self::Disconnected => "Disconnected",
        };
        f.write_str(s)
    }
}

/// A publish received on a subscribed topic.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Everything the session hands to the dispatcher.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Status {
        status: ConnectionStatus,
        detail: Option<String>,
    },
    Message(InboundMessage),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("MQTT client request failed: {0}")]
    Client(#[from] ClientError),
}

/// The one session operation the dispatcher needs.
pub trait TopicSubscriber {
    fn subscribe(&self, topic: &str) -> Result<(), SessionError>;
}

impl TopicSubscriber for AsyncClient {
    fn subscribe(&self, topic: &str) -> Result<(), SessionError> {
        self.try_subscribe(topic, QoS::AtMostOnce)?;
        Ok(())
    }
}
