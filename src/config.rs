use std::env;
use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_THING_NAME: &str = "bimsmith-thing";
const DEFAULT_DIAL_COMMAND: &str = "am start -a android.intent.action.CALL -d";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),
    #[error("{key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub shadow: ShadowConfig,
    pub dial: DialConfig,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    pub tls: Option<TlsMaterial>,
}

/// PEM bytes loaded at startup. CA alone means server auth only.
#[derive(Clone)]
pub struct TlsMaterial {
    pub ca: Vec<u8>,
    pub client_auth: Option<(Vec<u8>, Vec<u8>)>,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("ca_bytes", &self.ca.len())
            .field("client_auth", &self.client_auth.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ShadowConfig {
    pub thing_name: String,
    pub topic: String,
}

#[derive(Debug, Clone)]
pub struct DialConfig {
    /// Read the number from `state.desired.number`; otherwise always dial `fallback_number`.
    pub parse_number: bool,
    pub fallback_number: Option<String>,
    pub command: Vec<String>,
    pub dry_run: bool,
    pub log_payloads: bool,
}

/// Thin view over a variable source so tests don't touch the process environment.
struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.is_empty())
    }

    fn or_default<T: std::str::FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value }),
            None => Ok(default),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let broker_host = vars.required("MQTT_BROKER_HOST")?;
        let tls = load_tls(
            vars.optional("MQTT_CA_FILE"),
            vars.optional("MQTT_CERT_FILE"),
            vars.optional("MQTT_KEY_FILE"),
        )?;
        let default_port = if tls.is_some() { 8883 } else { 1883 };

        let thing_name = vars
            .optional("SHADOW_THING_NAME")
            .unwrap_or_else(|| DEFAULT_THING_NAME.to_string());
        let topic = vars
            .optional("SHADOW_TOPIC")
            .unwrap_or_else(|| update_accepted_topic(&thing_name));

        let command = vars
            .optional("DIAL_COMMAND")
            .unwrap_or_else(|| DEFAULT_DIAL_COMMAND.to_string())
            .split_whitespace()
            .map(String::from)
            .collect();

        let config = Self {
            mqtt: MqttConfig {
                broker_host,
                broker_port: vars.or_default("MQTT_BROKER_PORT", default_port)?,
                client_id: vars
                    .optional("MQTT_CLIENT_ID")
                    .unwrap_or_else(|| format!("shadow-dialer-{}", std::process::id())),
                username: vars.optional("MQTT_USERNAME"),
                password: vars.optional("MQTT_PASSWORD"),
                keep_alive_secs: vars.or_default("MQTT_KEEP_ALIVE_SECS", 30)?,
                tls,
            },
            shadow: ShadowConfig { thing_name, topic },
            dial: DialConfig {
                parse_number: vars.or_default("DIAL_PARSE_NUMBER", true)?,
                fallback_number: vars.optional("DIAL_FALLBACK_NUMBER"),
                command,
                dry_run: vars.or_default("DIAL_DRY_RUN", false)?,
                log_payloads: vars.or_default("LOG_PAYLOADS", false)?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.broker_host.trim().is_empty() {
            return Err(ConfigError::Validation("MQTT_BROKER_HOST must not be empty".into()));
        }
        if self.mqtt.keep_alive_secs == 0 {
            return Err(ConfigError::Validation("MQTT_KEEP_ALIVE_SECS must be > 0".into()));
        }
        if self.shadow.topic.trim().is_empty() {
            return Err(ConfigError::Validation("SHADOW_TOPIC must not be empty".into()));
        }
        if !self.dial.parse_number && self.dial.fallback_number.is_none() {
            return Err(ConfigError::Validation(
                "DIAL_FALLBACK_NUMBER is required when DIAL_PARSE_NUMBER=false".into(),
            ));
        }
        if !self.dial.dry_run && self.dial.command.is_empty() {
            return Err(ConfigError::Validation("DIAL_COMMAND must not be empty".into()));
        }
        Ok(())
    }
}

/// `$aws/things/{thing}/shadow/update/accepted`
pub fn update_accepted_topic(thing_name: &str) -> String {
    format!("$aws/things/{thing_name}/shadow/update/accepted")
}

fn load_tls(
    ca: Option<String>,
    cert: Option<String>,
    key: Option<String>,
) -> Result<Option<TlsMaterial>, ConfigError> {
    let client_auth = match (cert, key) {
        (Some(cert), Some(key)) => Some((read_pem(cert)?, read_pem(key)?)),
        (None, None) => None,
        _ => {
            return Err(ConfigError::Validation(
                "MQTT_CERT_FILE and MQTT_KEY_FILE must be set together".into(),
            ));
        }
    };

    match ca {
        Some(ca) => Ok(Some(TlsMaterial {
            ca: read_pem(ca)?,
            client_auth,
        })),
        None if client_auth.is_some() => Err(ConfigError::Validation(
            "MQTT_CA_FILE is required when a client certificate is configured".into(),
        )),
        None => Ok(None),
    }
}

fn read_pem(path: String) -> Result<Vec<u8>, ConfigError> {
    let path = PathBuf::from(path);
    std::fs::read(&path).map_err(|source| ConfigError::ReadFile { path, source })
}
