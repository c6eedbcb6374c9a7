//! Application-level readiness check against the control endpoint.

use crate::{SupervisorError, SupervisorResult};

use std::panic::Location;
use std::time::Duration;

use async_trait::async_trait;
use error_location::ErrorLocation;
use tracing::debug;
use wd_config::{Binding, ProbeConfig};

/// Does the service answer correctly within a deadline.
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    async fn check(&self, binding: &Binding) -> SupervisorResult<()>;
}

/// GET `{path}` and require a JSON object carrying `marker` as a top-level key.
pub struct HttpReadinessCheck {
    client: reqwest::Client,
    path: String,
    marker: String,
    timeout: Duration,
}

impl HttpReadinessCheck {
    pub fn new(
        path: impl Into<String>,
        marker: impl Into<String>,
        timeout: Duration,
    ) -> SupervisorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(1)
            .build()?;

        Ok(Self {
            client,
            path: path.into(),
            marker: marker.into(),
            timeout,
        })
    }

    pub fn from_config(probe: &ProbeConfig) -> SupervisorResult<Self> {
        Self::new(
            probe.path.clone(),
            probe.marker.clone(),
            Duration::from_secs(probe.timeout_secs),
        )
    }

    #[track_caller]
    fn classify(&self, binding: &Binding, error: reqwest::Error) -> SupervisorError {
        if error.is_timeout() {
            SupervisorError::ProbeTimeout {
                binding: binding.to_string(),
                timeout_secs: self.timeout.as_secs(),
                location: ErrorLocation::from(Location::caller()),
            }
        } else if error.is_decode() {
            SupervisorError::MalformedResponse {
                binding: binding.to_string(),
                message: format!("Invalid JSON: {error}"),
                location: ErrorLocation::from(Location::caller()),
            }
        } else {
            error.into()
        }
    }
}

#[async_trait]
impl ReadinessCheck for HttpReadinessCheck {
    async fn check(&self, binding: &Binding) -> SupervisorResult<()> {
        let url = binding.url(&self.path);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.classify(binding, e))?;

        if !response.status().is_success() {
            return Err(SupervisorError::MalformedResponse {
                binding: binding.to_string(),
                message: format!("HTTP {}", response.status()),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| self.classify(binding, e))?;

        match body.as_object() {
            Some(object) if object.contains_key(&self.marker) => {
                debug!(binding = %binding, "Readiness marker {:?} present", self.marker);
                Ok(())
            }
            Some(_) => Err(SupervisorError::MalformedResponse {
                binding: binding.to_string(),
                message: format!("Response lacks {:?}", self.marker),
                location: ErrorLocation::from(Location::caller()),
            }),
            None => Err(SupervisorError::MalformedResponse {
                binding: binding.to_string(),
                message: "Response is not a JSON object".into(),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}
