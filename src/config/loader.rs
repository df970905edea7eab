//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::AnvilConfig;
use crate::domain::errors::AnvilError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into AnvilConfig
/// 4. Applies environment variable overrides (ANVIL_* prefix)
/// 5. Validates the configuration
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
/// - Environment variable substitution fails
/// - Configuration validation fails
pub fn load_config(path: impl AsRef<Path>) -> Result<AnvilConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(AnvilError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        AnvilError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: AnvilConfig = toml::from_str(&contents)
        .map_err(|e| AnvilError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        AnvilError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    // Process line by line to skip comments
    for line in input.lines() {
        let trimmed = line.trim_start();

        if trimmed.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(AnvilError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using the ANVIL_* prefix
///
/// Environment variables follow the pattern: ANVIL_<SECTION>_<KEY>
/// For example: ANVIL_DATABASE_HOST, ANVIL_ENGINE_BATCH_SIZE
fn apply_env_overrides(config: &mut AnvilConfig) {
    if let Ok(val) = std::env::var("ANVIL_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    if let Ok(val) = std::env::var("ANVIL_DATABASE_HOST") {
        config.database.host = val;
    }
    if let Ok(val) = std::env::var("ANVIL_DATABASE_PORT") {
        if let Ok(port) = val.parse() {
            config.database.port = port;
        }
    }
    if let Ok(val) = std::env::var("ANVIL_DATABASE_DBNAME") {
        config.database.dbname = val;
    }
    if let Ok(val) = std::env::var("ANVIL_DATABASE_USER") {
        config.database.user = val;
    }
    if let Ok(val) = std::env::var("ANVIL_DATABASE_PASSWORD") {
        config.database.password = super::secret::secret_string(val);
    }
    if let Ok(val) = std::env::var("ANVIL_DATABASE_MAX_CONNECTIONS") {
        if let Ok(size) = val.parse() {
            config.database.max_connections = size;
        }
    }

    if let Ok(val) = std::env::var("ANVIL_ENGINE_BATCH_SIZE") {
        if let Ok(size) = val.parse() {
            config.engine.batch_size = size;
        }
    }
    if let Ok(val) = std::env::var("ANVIL_ENGINE_WORKERS") {
        if let Ok(workers) = val.parse() {
            config.engine.workers = workers;
        }
    }
    if let Ok(val) = std::env::var("ANVIL_ENGINE_RESUME") {
        config.engine.resume = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("ANVIL_ENGINE_POLL_INTERVAL_SECONDS") {
        config.engine.poll_interval_seconds = val.parse().ok();
    }

    if let Ok(val) = std::env::var("ANVIL_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("ANVIL_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID_CONFIG: &str = r#"
[application]
log_level = "info"

[database]
host = "localhost"
dbname = "equipment"
user = "anvil"
password = "secret"

[engine]
batch_size = 100
workers = 4

[[family]]
name = "fastening"
kind = "fastening"

[[family]]
name = "riveting"
kind = "riveting"
enabled = false
"#;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("ANVIL_TEST_SUBST_VAR", "test_value");
        let input = "password = \"${ANVIL_TEST_SUBST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "password = \"test_value\"\n");
        std::env::remove_var("ANVIL_TEST_SUBST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("ANVIL_TEST_MISSING_VAR");
        let input = "password = \"${ANVIL_TEST_MISSING_VAR}\"";
        let result = substitute_env_vars(input);
        assert!(result.is_err());
    }

    #[test]
    fn test_substitute_skips_comments() {
        let input = "# uses ${ANVIL_TEST_NOT_SET}\nhost = \"localhost\"";
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("${ANVIL_TEST_NOT_SET}"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_valid() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(VALID_CONFIG.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.engine.batch_size, 100);
        assert_eq!(config.families.len(), 2);
        assert_eq!(config.enabled_families().count(), 1);
    }

    #[test]
    fn test_load_config_rejects_invalid() {
        let bad = VALID_CONFIG.replace("workers = 4", "workers = 0");
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(bad.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        assert!(load_config(temp_file.path()).is_err());
    }
}
