use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - At least one conversion attempt and a non-zero timeout
/// - A non-empty extension list
/// - A parallelism cap, when set, is not 0
/// - The destination does not live inside the library
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let export = &config.export;

    if export.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "export.max_attempts must be at least 1".to_string(),
        ));
    }

    if export.conversion_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "export.conversion_timeout_ms cannot be 0".to_string(),
        ));
    }

    if export.extensions.iter().all(|e| e.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "export.extensions cannot be empty".to_string(),
        ));
    }

    if export.max_parallel_conversions == Some(0) {
        return Err(ConfigError::ValidationError(
            "export.max_parallel_conversions cannot be 0, omit it for no limit".to_string(),
        ));
    }

    // Exporting into the library would make the next scan pick up the output
    if export.destination.starts_with(&config.library.root) {
        return Err(ConfigError::ValidationError(format!(
            "export.destination {} is inside library.root {}",
            export.destination.display(),
            config.library.root.display()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_validate_valid_config() {
        let config = Config::new("/music", "/mnt/player");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_attempts_fails() {
        let mut config = Config::new("/music", "/mnt/player");
        config.export.max_attempts = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_parallelism_fails() {
        let mut config = Config::new("/music", "/mnt/player");
        config.export.max_parallel_conversions = Some(0);
        assert!(validate_config(&config).is_err());

        config.export.max_parallel_conversions = None;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_empty_extensions_fails() {
        let mut config = Config::new("/music", "/mnt/player");
        config.export.extensions = vec![];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_destination_inside_library_fails() {
        let config = Config::new("/music", "/music/export");
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("inside library.root"));
    }
}
