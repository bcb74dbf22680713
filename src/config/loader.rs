//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::BatchportConfig;
use super::secret::secret_string;
use crate::domain::errors::BatchportError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into BatchportConfig
/// 4. Applies environment variable overrides (BATCHPORT_* prefix)
/// 5. Validates the configuration, including every export profile
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use batchport::config::loader::load_config;
///
/// let config = load_config("batchport.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<BatchportConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(BatchportError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        BatchportError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration text (substitution, overrides and validation included)
///
/// # Errors
///
/// Same as [`load_config`] minus the file access errors.
pub fn parse_config(contents: &str) -> Result<BatchportConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: BatchportConfig = toml::from_str(&contents)
        .map_err(|e| BatchportError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        BatchportError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied unchanged.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| BatchportError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(BatchportError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

/// Applies environment variable overrides using the BATCHPORT_* prefix
///
/// Variables follow the pattern `BATCHPORT_<SECTION>_<KEY>`, for example
/// `BATCHPORT_EXPORT_PAGE_SIZE`. Values that do not parse are ignored.
fn apply_env_overrides(config: &mut BatchportConfig) {
    // Application overrides
    if let Ok(val) = std::env::var("BATCHPORT_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Source overrides
    if let Ok(val) = std::env::var("BATCHPORT_SOURCE_CONNECTION_STRING") {
        config.source.connection_string = secret_string(val);
    }
    if let Ok(val) = std::env::var("BATCHPORT_SOURCE_SCHEMA") {
        config.source.schema = val;
    }
    if let Some(max) = parsed_var("BATCHPORT_SOURCE_MAX_CONNECTIONS") {
        config.source.max_connections = max;
    }
    if let Some(timeout) = parsed_var("BATCHPORT_SOURCE_STATEMENT_TIMEOUT_SECONDS") {
        config.source.statement_timeout_seconds = timeout;
    }

    // Export overrides
    if let Ok(val) = std::env::var("BATCHPORT_EXPORT_OUTPUT_DIR") {
        config.export.output_dir = val;
    }
    if let Some(size) = parsed_var("BATCHPORT_EXPORT_PAGE_SIZE") {
        config.export.page_size = size;
    }
    if let Some(bytes) = parsed_var("BATCHPORT_EXPORT_FLUSH_THRESHOLD_BYTES") {
        config.export.flush_threshold_bytes = bytes;
    }
    if let Some(max) = parsed_var("BATCHPORT_EXPORT_MAX_RECORD_FAILURES") {
        config.export.max_record_failures = max;
    }

    // State overrides
    if let Ok(val) = std::env::var("BATCHPORT_STATE_STATE_DIR") {
        config.state.state_dir = val;
    }

    // Logging overrides
    if let Ok(val) = std::env::var("BATCHPORT_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("BATCHPORT_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("BATCHPORT_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[source]
connection_string = "postgresql://shop:pw@localhost:5432/shop"

[[profiles]]
id = "products"
entity_kind = "product"
provider = "csv"
batch_size = 1000
"#;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("BATCHPORT_LOADER_TEST_VAR", "test_value");
        let input = "password = \"${BATCHPORT_LOADER_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "password = \"test_value\"");
        std::env::remove_var("BATCHPORT_LOADER_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("BATCHPORT_LOADER_MISSING_VAR");
        let input = "password = \"${BATCHPORT_LOADER_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("BATCHPORT_LOADER_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_env_vars_skips_comments() {
        let input = "# password = \"${BATCHPORT_LOADER_COMMENTED}\"";
        assert_eq!(substitute_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent-batchport.toml");
        assert!(matches!(result, Err(BatchportError::Configuration(_))));
    }

    #[test]
    fn test_load_config_valid() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(MINIMAL.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(
            config.source.connection_string.expose_secret(),
            "postgresql://shop:pw@localhost:5432/shop"
        );
        assert_eq!(config.profiles.len(), 1);
        assert_eq!(config.profiles[0].batch_size, 1000);
        assert_eq!(config.export.max_record_failures, 11);
    }

    #[test]
    fn test_invalid_profile_fails_validation() {
        let toml = format!("{MINIMAL}file_name_pattern = \"static-name\"\n");
        let err = parse_config(&toml).unwrap_err();
        assert!(err.to_string().contains("validation failed"));
    }
}
