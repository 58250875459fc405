//! Engine configuration.
//!
//! The retry policy's *shape* is fixed — bounded retries for connectivity
//! loss, unbounded refresh-then-retry for expired credentials, no retry for
//! server rejections — while the literal counts and the delay curve are
//! configurable here.

use std::time::Duration;

use chatwire_common::BackoffStrategy;
use thiserror::Error;

/// Invalid engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// A required collaborator was not provided to the client builder.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
}

/// Tunables for the request-execution engine.
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Connectivity-loss retries per operation, on top of the initial
    /// attempt. The default of 3 yields 4 total attempts.
    pub max_connectivity_retries: u32,
    /// Delay applied before each connectivity retry.
    pub connectivity_backoff: BackoffStrategy,
    /// Ceiling on credential-refresh episodes a single operation may wait
    /// through. `None` (the default) retries indefinitely: an expired
    /// credential alone never becomes a terminal failure.
    pub max_credential_refreshes: Option<u32>,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            max_connectivity_retries: 3,
            connectivity_backoff: BackoffStrategy::default(),
            max_credential_refreshes: None,
        }
    }
}

impl ApiClientConfig {
    /// Create a configuration builder.
    pub fn builder() -> ApiClientConfigBuilder {
        ApiClientConfigBuilder::default()
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if let BackoffStrategy::Exponential { base, .. } = self.connectivity_backoff {
            if base <= 0.0 {
                return Err(ConfigError::Invalid(
                    "exponential backoff base must be greater than 0".into(),
                ));
            }
        }
        if self.max_credential_refreshes == Some(0) {
            return Err(ConfigError::Invalid(
                "max_credential_refreshes must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ApiClientConfig`] with validation at `build`.
#[derive(Debug, Default)]
pub struct ApiClientConfigBuilder {
    config: ApiClientConfig,
}

impl ApiClientConfigBuilder {
    /// Set the connectivity retry ceiling (retries, not total attempts).
    #[must_use]
    pub fn max_connectivity_retries(mut self, retries: u32) -> Self {
        self.config.max_connectivity_retries = retries;
        self
    }

    /// Set the delay strategy between connectivity retries.
    #[must_use]
    pub fn connectivity_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.config.connectivity_backoff = backoff;
        self
    }

    /// Disable delays between connectivity retries.
    #[must_use]
    pub fn no_backoff(mut self) -> Self {
        self.config.connectivity_backoff = BackoffStrategy::None;
        self
    }

    /// Use a fixed delay between connectivity retries.
    #[must_use]
    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.connectivity_backoff = BackoffStrategy::Fixed(delay);
        self
    }

    /// Cap the number of credential-refresh episodes per operation.
    #[must_use]
    pub fn max_credential_refreshes(mut self, refreshes: u32) -> Self {
        self.config.max_credential_refreshes = Some(refreshes);
        self
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> Result<ApiClientConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
