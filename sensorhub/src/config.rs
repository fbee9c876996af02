//! Configuration for the sensor hub.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use sensorhub_common::{Format, LoggingConfig, ZenohConfig};

use crate::registry::SensorRegistry;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete hub configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Telemetry sink
    pub sink: SinkConfig,

    /// Loop timing and routing
    #[serde(default)]
    pub hub: HubSettings,

    /// Network link probe
    #[serde(default)]
    pub link: LinkConfig,

    /// SNTP time sync
    #[serde(default)]
    pub time: TimeConfig,

    /// Simulated board settings
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Payload encoding
    #[serde(default)]
    pub serialization: Format,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Sensor entries, in acquisition order. Parsed one by one when the
    /// registry is built so a bad entry only costs that unit.
    pub sensors: Vec<Value>,
}

/// Telemetry sink selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    /// MQTT broker
    Mqtt(MqttSinkConfig),
    /// Zenoh network
    Zenoh(ZenohSinkConfig),
}

/// MQTT broker settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttSinkConfig {
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Connect and publish timeout
    #[serde(default = "default_sink_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "sensorhub".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_sink_timeout_ms() -> u64 {
    5000
}

impl MqttSinkConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Zenoh sink settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ZenohSinkConfig {
    /// "client", "peer" or "router"
    #[serde(default = "default_zenoh_mode")]
    pub mode: String,

    #[serde(default)]
    pub connect: Vec<String>,

    #[serde(default)]
    pub listen: Vec<String>,

    /// Session open timeout
    #[serde(default = "default_sink_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_zenoh_mode() -> String {
    "peer".to_string()
}

impl ZenohSinkConfig {
    pub fn zenoh_config(&self) -> ZenohConfig {
        ZenohConfig {
            mode: self.mode.clone(),
            connect: self.connect.clone(),
            listen: self.listen.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Hub loop settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HubSettings {
    /// Route prefix (default: "Sensor")
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Time between cycle starts
    #[serde(default = "default_loop_interval")]
    pub loop_interval_secs: u64,

    /// Wait after a failed sink connect
    #[serde(default = "default_reconnect_backoff")]
    pub reconnect_backoff_secs: u64,

    /// Delay after each publish
    #[serde(default = "default_publish_pacing")]
    pub publish_pacing_ms: u64,

    /// Upper bound for one unit read
    #[serde(default = "default_unit_timeout")]
    pub unit_timeout_ms: u64,

    /// Status LED pin; no LED when absent
    #[serde(default)]
    pub status_led_pin: Option<u8>,
}

fn default_key_prefix() -> String {
    sensorhub_common::ROUTE_PREFIX.to_string()
}

fn default_loop_interval() -> u64 {
    60
}

fn default_reconnect_backoff() -> u64 {
    30
}

fn default_publish_pacing() -> u64 {
    100
}

fn default_unit_timeout() -> u64 {
    5000
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            loop_interval_secs: default_loop_interval(),
            reconnect_backoff_secs: default_reconnect_backoff(),
            publish_pacing_ms: default_publish_pacing(),
            unit_timeout_ms: default_unit_timeout(),
            status_led_pin: None,
        }
    }
}

impl HubSettings {
    pub fn loop_interval(&self) -> Duration {
        Duration::from_secs(self.loop_interval_secs)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }

    pub fn publish_pacing(&self) -> Duration {
        Duration::from_millis(self.publish_pacing_ms)
    }

    pub fn unit_timeout(&self) -> Duration {
        Duration::from_millis(self.unit_timeout_ms)
    }
}

/// Network link settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// `host:port` that must resolve before the link counts as up
    #[serde(default)]
    pub probe: Option<String>,

    #[serde(default = "default_link_timeout")]
    pub timeout_secs: u64,
}

fn default_link_timeout() -> u64 {
    15
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            probe: None,
            timeout_secs: default_link_timeout(),
        }
    }
}

/// SNTP settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_ntp_server")]
    pub server: String,

    #[serde(default = "default_ntp_timeout")]
    pub timeout_ms: u64,

    /// Highest stratum accepted from the server
    #[serde(default = "default_max_stratum")]
    pub max_stratum: u8,
}

fn default_true() -> bool {
    true
}

fn default_ntp_server() -> String {
    "pool.ntp.org:123".to_string()
}

fn default_ntp_timeout() -> u64 {
    2000
}

fn default_max_stratum() -> u8 {
    15
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server: default_ntp_server(),
            timeout_ms: default_ntp_timeout(),
            max_stratum: default_max_stratum(),
        }
    }
}

/// Simulated board settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,

    /// Devices per simulated 1-Wire bus
    #[serde(default = "default_onewire_devices")]
    pub onewire_devices: usize,

    /// Probability that any hardware call times out
    #[serde(default)]
    pub failure_rate: f64,
}

fn default_onewire_devices() -> usize {
    2
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            onewire_devices: default_onewire_devices(),
            failure_rate: 0.0,
        }
    }
}

impl HubConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: HubConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = &self.hub.key_prefix;
        if prefix.is_empty() {
            return Err(ConfigError::Validation(
                "hub.key_prefix cannot be empty".to_string(),
            ));
        }
        if prefix.contains(['#', '+', '*', '$']) {
            return Err(ConfigError::Validation(format!(
                "hub.key_prefix '{}' must not contain wildcards",
                prefix
            )));
        }

        if self.hub.loop_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "hub.loop_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.hub.unit_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "hub.unit_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.simulation.failure_rate) {
            return Err(ConfigError::Validation(format!(
                "simulation.failure_rate must be between 0 and 1, got {}",
                self.simulation.failure_rate
            )));
        }

        if self.time.max_stratum == 0 || self.time.max_stratum > 15 {
            return Err(ConfigError::Validation(
                "time.max_stratum must be 1-15".to_string(),
            ));
        }

        match &self.sink {
            SinkConfig::Mqtt(mqtt) => {
                if mqtt.host.is_empty() {
                    return Err(ConfigError::Validation(
                        "sink.host cannot be empty".to_string(),
                    ));
                }
                if mqtt.client_id.is_empty() {
                    return Err(ConfigError::Validation(
                        "sink.client_id cannot be empty".to_string(),
                    ));
                }
                if mqtt.keep_alive_secs < 5 {
                    return Err(ConfigError::Validation(
                        "sink.keep_alive_secs must be at least 5".to_string(),
                    ));
                }
                // The event loop is idle between cycles, so nothing answers
                // the broker's 1.5 x keep-alive timer but the next publish.
                if self.hub.loop_interval_secs.saturating_mul(2)
                    >= mqtt.keep_alive_secs.saturating_mul(3)
                {
                    return Err(ConfigError::Validation(format!(
                        "hub.loop_interval_secs ({}) must be below 1.5 x sink.keep_alive_secs ({})",
                        self.hub.loop_interval_secs, mqtt.keep_alive_secs
                    )));
                }
            }
            SinkConfig::Zenoh(zenoh) => {
                if !matches!(zenoh.mode.as_str(), "client" | "peer" | "router") {
                    return Err(ConfigError::Validation(format!(
                        "sink.mode '{}' must be client, peer, or router",
                        zenoh.mode
                    )));
                }
            }
        }

        Ok(())
    }

    /// Build the sensor registry. Entries that fail their checks are logged
    /// and left out.
    pub fn registry(&self) -> SensorRegistry {
        SensorRegistry::from_entries(&self.sensors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorhub_common::{LogFormat, SensorKind};

    const SENSORS: &str = r#"
        sensors: [
            {
                name: "dht11", kind: "DHT11", pin: 14, location: "Living Room", active: true,
                provides: {
                    temperature: { id: "Sensor_DHT11_Temp", unit: "°C" },
                    humidity: { id: "Sensor_DHT11_Hum", unit: "%" },
                },
            },
            {
                name: "ds18b20", kind: "DS18B20", pin: 27, location: "Greenhouse", active: true,
                provides: { temperature: { id_prefix: "Sensor_DS18B20", unit: "°C" } },
            },
        ]
    "#;

    fn config(sink: &str) -> String {
        format!("{{ sink: {sink}, {SENSORS} }}")
    }

    #[test]
    fn test_parse_mqtt_config_with_defaults() {
        let config = HubConfig::parse(&config(r#"{ type: "mqtt", host: "broker.local" }"#)).unwrap();

        let SinkConfig::Mqtt(mqtt) = &config.sink else {
            panic!("Expected MQTT sink");
        };
        assert_eq!(mqtt.host, "broker.local");
        assert_eq!(mqtt.port, 1883);
        assert_eq!(mqtt.client_id, "sensorhub");
        assert_eq!(mqtt.keep_alive(), Duration::from_secs(60));

        assert_eq!(config.hub.key_prefix, "Sensor");
        assert_eq!(config.hub.loop_interval(), Duration::from_secs(60));
        assert_eq!(config.hub.reconnect_backoff(), Duration::from_secs(30));
        assert_eq!(config.hub.publish_pacing(), Duration::from_millis(100));
        assert_eq!(config.hub.status_led_pin, None);
        assert_eq!(config.link.timeout_secs, 15);
        assert!(config.time.enabled);
        assert_eq!(config.simulation.onewire_devices, 2);
        assert_eq!(config.serialization, Format::Json);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.sensors.len(), 2);
        assert_eq!(
            config.registry().get("ds18b20").map(|d| d.kind.clone()),
            Some(SensorKind::Ds18b20)
        );
    }

    #[test]
    fn test_parse_zenoh_sink() {
        let config = HubConfig::parse(&config(
            r#"{ type: "zenoh", mode: "client", connect: ["tcp/10.0.0.1:7447"] }"#,
        ))
        .unwrap();

        let SinkConfig::Zenoh(zenoh) = &config.sink else {
            panic!("Expected Zenoh sink");
        };
        let zc = zenoh.zenoh_config();
        assert_eq!(zc.mode, "client");
        assert_eq!(zc.connect, vec!["tcp/10.0.0.1:7447".to_string()]);
        assert_eq!(zenoh.timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_registry_preserves_order() {
        let config = HubConfig::parse(&config(r#"{ type: "mqtt", host: "h" }"#)).unwrap();
        let registry = config.registry();
        let names: Vec<_> = registry.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["dht11", "ds18b20"]);
    }

    #[test]
    fn test_validate_zero_interval() {
        let text = format!(
            "{{ sink: {{ type: \"mqtt\", host: \"h\" }}, hub: {{ loop_interval_secs: 0 }}, {SENSORS} }}"
        );
        assert!(matches!(
            HubConfig::parse(&text),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_wildcard_prefix() {
        let text = format!(
            "{{ sink: {{ type: \"mqtt\", host: \"h\" }}, hub: {{ key_prefix: \"a/#\" }}, {SENSORS} }}"
        );
        assert!(matches!(
            HubConfig::parse(&text),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_short_keep_alive() {
        let result = HubConfig::parse(&config(
            r#"{ type: "mqtt", host: "h", keep_alive_secs: 2 }"#,
        ));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_interval_against_keep_alive() {
        let text = |interval: u64, keep_alive: u64| {
            format!(
                "{{ sink: {{ type: \"mqtt\", host: \"h\", keep_alive_secs: {keep_alive} }}, \
                 hub: {{ loop_interval_secs: {interval} }}, {SENSORS} }}"
            )
        };

        assert!(HubConfig::parse(&text(60, 60)).is_ok());
        assert!(HubConfig::parse(&text(89, 60)).is_ok());
        assert!(matches!(
            HubConfig::parse(&text(90, 60)),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            HubConfig::parse(&text(300, 60)),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_zenoh_sink_has_no_keep_alive_bound() {
        let text = format!(
            "{{ sink: {{ type: \"zenoh\" }}, hub: {{ loop_interval_secs: 300 }}, {SENSORS} }}"
        );
        assert!(HubConfig::parse(&text).is_ok());
    }

    #[test]
    fn test_malformed_sensor_does_not_fail_load() {
        let text = r#"{
            sink: { type: "mqtt", host: "h" },
            sensors: [
                { name: "dht", kind: "DHT22", pin: 4, active: true,
                  provides: { temperature: { id: "t", unit: "°C" } } },
                { name: "ldr", kind: "LDR", pin: 34, active: true,
                  provides: { light: { unit: "µV" } } },
                { name: "button", kind: "Button", pin: 13, active: true,
                  provides: { state: { id: "Sensor_Button", unit: "boolean" } } },
            ],
        }"#;

        let config = HubConfig::parse(text).unwrap();
        let registry = config.registry();
        let names: Vec<_> = registry.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["button"]);
    }

    #[test]
    fn test_missing_sink_is_parse_error() {
        let text = format!("{{ {SENSORS} }}");
        assert!(matches!(HubConfig::parse(&text), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        assert!(matches!(
            HubConfig::load_from_file("/nonexistent/sensorhub.json5"),
            Err(ConfigError::Io(_))
        ));
    }
}
