use crate::telemetry::SensorKind;

/// Default route prefix for all sensor readings.
pub const ROUTE_PREFIX: &str = "Sensor";

/// Builder for publish routes.
///
/// Routes follow the pattern `<prefix>/<kind>`, so every reading of one
/// sensor kind lands on the same topic (MQTT) or key expression (Zenoh).
#[derive(Debug, Clone)]
pub struct RouteBuilder {
    prefix: String,
}

impl Default for RouteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteBuilder {
    /// Create a route builder with the default prefix.
    pub fn new() -> Self {
        Self {
            prefix: ROUTE_PREFIX.to_string(),
        }
    }

    /// Create a builder with a custom prefix.
    ///
    /// Trailing slashes are trimmed.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// The configured prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the route for a sensor kind.
    ///
    /// # Example
    /// ```
    /// use sensorhub_common::route::RouteBuilder;
    /// use sensorhub_common::telemetry::SensorKind;
    ///
    /// let routes = RouteBuilder::new();
    /// assert_eq!(routes.build(&SensorKind::Dht11), "Sensor/DHT11");
    /// ```
    pub fn build(&self, kind: &SensorKind) -> String {
        format!("{}/{}", self.prefix, kind.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_builder() {
        let routes = RouteBuilder::new();

        assert_eq!(routes.build(&SensorKind::Ds18b20), "Sensor/DS18B20");
        assert_eq!(routes.build(&SensorKind::Button), "Sensor/Button");
    }

    #[test]
    fn test_custom_prefix() {
        let routes = RouteBuilder::with_prefix("home/hub01/");
        assert_eq!(routes.prefix(), "home/hub01");
        assert_eq!(routes.build(&SensorKind::Gy521), "home/hub01/GY521");
    }
}
