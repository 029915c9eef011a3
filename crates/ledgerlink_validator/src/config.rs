//! Validator configuration.

/// Encoding used for structured response bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// `application/cbor`
    #[default]
    Cbor,
    /// `application/json`
    Json,
}

/// Configuration for the reference validator.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Node name reported by the status route.
    pub name: String,
    /// Encoding of structured responses.
    pub response_format: ResponseFormat,
    /// Name of the session cookie handed to new clients.
    pub cookie_name: String,
}

impl ValidatorConfig {
    /// Creates a configuration for a node called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response_format: ResponseFormat::Cbor,
            cookie_name: "ledgerlink_session".to_string(),
        }
    }

    /// Sets the response encoding.
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    /// Answers with JSON instead of CBOR.
    pub fn with_json_responses(self) -> Self {
        self.with_response_format(ResponseFormat::Json)
    }

    /// Sets the session cookie name.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self::new("validator")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ValidatorConfig::default();
        assert_eq!(config.response_format, ResponseFormat::Cbor);
        assert_eq!(config.cookie_name, "ledgerlink_session");
    }

    #[test]
    fn config_builder() {
        let config = ValidatorConfig::new("node-1")
            .with_json_responses()
            .with_cookie_name("sid");
        assert_eq!(config.name, "node-1");
        assert_eq!(config.response_format, ResponseFormat::Json);
        assert_eq!(config.cookie_name, "sid");
    }
}
