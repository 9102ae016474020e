//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals and timeouts > 0)
//! - Detect conflicting supervisor names
//! - Every watch target must end up with a timeout
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::{Channel, ServiceConfig, SweepConfig};

/// One semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_sweep("supervisors.ajax", &config.supervisors.ajax, &mut errors);
    validate_sweep("supervisors.jsonp", &config.supervisors.jsonp, &mut errors);
    if config.supervisors.ajax.name == config.supervisors.jsonp.name {
        errors.push(ValidationError::new(
            "supervisors.jsonp.name",
            format!("duplicate supervisor name `{}`", config.supervisors.jsonp.name),
        ));
    }

    if config.transport.connect_timeout_ms == 0 {
        errors.push(ValidationError::new("transport.connect_timeout_ms", "must be > 0"));
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new("admin.api_key", "required when admin is enabled"));
    }

    for (i, target) in config.watch.iter().enumerate() {
        let field = format!("watch[{}]", i);
        if target.url.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.url", field), "must not be empty"));
        }
        if target.every_ms == 0 {
            errors.push(ValidationError::new(format!("{}.every_ms", field), "must be > 0"));
        }
        let supervisor = match target.channel {
            Channel::Ajax => &config.supervisors.ajax,
            Channel::Jsonp => &config.supervisors.jsonp,
        };
        match target.timeout_ms {
            Some(0) => {
                errors.push(ValidationError::new(format!("{}.timeout_ms", field), "must be > 0"));
            }
            None if supervisor.default_timeout_ms.is_none() => {
                errors.push(ValidationError::new(
                    format!("{}.timeout_ms", field),
                    format!(
                        "required when supervisor `{}` has no default_timeout_ms",
                        supervisor.name
                    ),
                ));
            }
            _ => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_sweep(field: &str, sweep: &SweepConfig, errors: &mut Vec<ValidationError>) {
    if sweep.name.trim().is_empty() {
        errors.push(ValidationError::new(format!("{}.name", field), "must not be empty"));
    }
    if sweep.interval_ms == 0 {
        errors.push(ValidationError::new(format!("{}.interval_ms", field), "must be > 0"));
    }
    if sweep.default_timeout_ms == Some(0) {
        errors.push(ValidationError::new(
            format!("{}.default_timeout_ms", field),
            "must be > 0",
        ));
    }
}
