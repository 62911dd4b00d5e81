//! Configuration validation

use tracing::debug;

use crate::artifact::validate_name_component;
use crate::error::{ConfigError, Result};

use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_project(config)?;
    validate_runner(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn validate_project(config: &Config) -> Result<()> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()).into());
    }

    if validate_name_component(&config.project.name, "project").is_err() {
        return Err(ConfigError::InvalidValue {
            field: "project.name".to_string(),
            message: "can only include alphanumeric characters, underscores, dashes, and/or dots"
                .to_string(),
        }
        .into());
    }

    if config.project.bucket.is_empty() {
        return Err(ConfigError::MissingField("project.bucket".to_string()).into());
    }

    Ok(())
}

fn validate_runner(config: &Config) -> Result<()> {
    if config.runner.concurrency == 0 {
        return Err(ConfigError::InvalidValue {
            field: "runner.concurrency".to_string(),
            message: "must be at least 1".to_string(),
        }
        .into());
    }

    Ok(())
}
