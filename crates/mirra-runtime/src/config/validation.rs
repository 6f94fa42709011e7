//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    ApiConfig, DisplayConfig, LogOutput, LoggingConfig, MirraConfig, PluginsConfig,
    ResourcesConfig,
};

/// Validates the entire configuration.
pub fn validate_config(config: &MirraConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_display_config(&config.display)?;
    validate_plugins_config(&config.plugins)?;
    validate_api_config(&config.api)?;
    validate_resources_config(&config.resources)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.filters.keys().any(|module| module.trim().is_empty()) {
        return Err(ConfigError::validation(
            "Logging filter module names cannot be empty",
        ));
    }

    Ok(())
}

fn validate_display_config(display: &DisplayConfig) -> ConfigResult<()> {
    validate_url(&display.url, "ws")?;
    validate_protocol(&display.protocol, "display.protocol")?;

    if display.width == 0 || display.height == 0 {
        return Err(ConfigError::validation(
            "Display surface size must be greater than 0",
        ));
    }

    if display.outbound_buffer == 0 {
        return Err(ConfigError::validation(
            "Outbound buffer must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_plugins_config(plugins: &PluginsConfig) -> ConfigResult<()> {
    if plugins.load_timeout_ms == 0 {
        return Err(ConfigError::validation("Load timeout must be greater than 0"));
    }

    if plugins.event_buffer == 0 {
        return Err(ConfigError::validation("Event buffer must be greater than 0"));
    }

    Ok(())
}

fn validate_api_config(api: &ApiConfig) -> ConfigResult<()> {
    validate_url(&api.url, "ws")?;
    validate_protocol(&api.protocol, "api.protocol")?;

    if api.request_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "Request timeout must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_resources_config(resources: &ResourcesConfig) -> ConfigResult<()> {
    validate_url(&resources.base_url, "http")?;

    if resources.fetch_timeout_ms == 0 {
        return Err(ConfigError::validation("Fetch timeout must be greater than 0"));
    }

    Ok(())
}

/// Validates a URL.
fn validate_url(url: &str, expected_scheme: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("url"));
    }

    let valid_schemes = match expected_scheme {
        "ws" => ["ws://", "wss://"],
        "http" => ["http://", "https://"],
        _ => return Err(ConfigError::validation("Unknown URL scheme type")),
    };

    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {valid_schemes:?}"),
        ));
    }

    Ok(())
}

/// Sub-protocols travel in an HTTP header, so they must be non-empty tokens.
fn validate_protocol(protocol: &str, field: &str) -> ConfigResult<()> {
    if protocol.is_empty() {
        return Err(ConfigError::missing_field(field));
    }

    if protocol.chars().any(|c| c.is_whitespace() || c == ',') {
        return Err(ConfigError::validation(format!(
            "{field} must be a single token, got '{protocol}'"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&MirraConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_display_url_scheme() {
        let mut config = MirraConfig::default();
        config.display.url = "http://127.0.0.1:5000".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = MirraConfig::default();
        config.plugins.load_timeout_ms = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_validate_empty_protocol() {
        let mut config = MirraConfig::default();
        config.api.protocol = String::new();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_validate_zero_surface() {
        let mut config = MirraConfig::default();
        config.display.height = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = MirraConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }
}
