use super::models::{Config, PinningProvider};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("price_per_gb must be positive and finite, got {0}")]
    InvalidPrice(f64),

    #[error("Pinning provider is http but no endpoint is configured")]
    MissingPinningEndpoint,

    #[error("Invalid pinning endpoint '{endpoint}', expected 'http://' or 'https://'")]
    InvalidPinningEndpoint { endpoint: String },

    #[error("Duration must be positive: {field}")]
    ZeroDuration { field: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_pricing(config)?;
    validate_pinning(config)?;
    validate_jobs(config)?;
    Ok(())
}

fn validate_pricing(config: &Config) -> Result<(), ValidationError> {
    let price = config.pricing.price_per_gb;
    if !price.is_finite() || price <= 0.0 {
        return Err(ValidationError::InvalidPrice(price));
    }
    Ok(())
}

fn validate_pinning(config: &Config) -> Result<(), ValidationError> {
    if config.pinning.provider == PinningProvider::Http {
        let endpoint = config
            .pinning
            .endpoint
            .as_deref()
            .ok_or(ValidationError::MissingPinningEndpoint)?;

        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ValidationError::InvalidPinningEndpoint {
                endpoint: endpoint.to_string(),
            });
        }
    }

    Ok(())
}

fn validate_jobs(config: &Config) -> Result<(), ValidationError> {
    let durations = [
        ("jobs.settle_interval", config.jobs.settle_interval),
        ("jobs.reclaim_interval", config.jobs.reclaim_interval),
        ("jobs.batch_timeout", config.jobs.batch_timeout),
    ];

    for (field, value) in durations {
        if value.is_zero() {
            return Err(ValidationError::ZeroDuration {
                field: field.to_string(),
            });
        }
    }

    Ok(())
}
