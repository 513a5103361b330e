//! HTTP liveness probe.
//!
//! # Responsibilities
//! - Build the probe URL `http://{host}:{port}{path}`
//! - Issue one GET bounded by a timeout; any 2xx is success
//! - Retry failed attempts with jittered backoff within the same tick

use std::time::{Duration, Instant};
use hyper::header::USER_AGENT;
use hyper::{Method, Request};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::time;
use url::Url;
use crate::config::HealthCheckConfig;
use crate::instance::ServiceInstance;
use crate::resilience::backoff::probe_retry_delay;

/// Why a probe attempt failed. Recovered locally by the health checker.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid probe url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to build probe request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("non-success status {0}")]
    Status(u16),

    #[error("connection error: {0}")]
    Transport(String),
}

/// Result of probing one instance, possibly over several attempts.
#[derive(Debug)]
pub struct ProbeOutcome {
    /// `Ok` if any attempt succeeded, otherwise the last attempt's error.
    pub result: Result<(), ProbeError>,
    /// Duration of the last attempt.
    pub elapsed: Duration,
    pub attempts: u32,
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        self.result.is_ok()
    }
}

/// Probe URL for an instance. `path` is appended verbatim, never resolved
/// against the instance address.
pub fn probe_url(instance: &ServiceInstance, path: &str) -> Result<Url, ProbeError> {
    let host = if instance.host.contains(':') && !instance.host.starts_with('[') {
        format!("[{}]", instance.host)
    } else {
        instance.host.clone()
    };
    let url = Url::parse(&format!("http://{}:{}{}", host, instance.port, path))?;
    Ok(url)
}

/// Issues health probes on a shared connection pool.
#[derive(Debug, Clone)]
pub struct Prober {
    client: Client<HttpConnector, String>,
    config: HealthCheckConfig,
}

impl Prober {
    pub fn new(config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, config }
    }

    /// Single GET attempt, abandoned once the timeout elapses.
    pub async fn probe_once(&self, instance: &ServiceInstance) -> Result<(), ProbeError> {
        let url = probe_url(instance, &self.config.path)?;
        let request = Request::builder()
            .method(Method::GET)
            .uri(url.as_str())
            .header(USER_AGENT, "traffic-router-health-check")
            .body(String::new())?;

        let timeout = self.config.timeout();
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => Ok(()),
            Ok(Ok(response)) => Err(ProbeError::Status(response.status().as_u16())),
            Ok(Err(e)) => Err(ProbeError::Transport(e.to_string())),
            Err(_) => Err(ProbeError::Timeout(timeout)),
        }
    }

    /// Up to `1 + retries` attempts; stops at the first success.
    pub async fn probe(&self, instance: &ServiceInstance) -> ProbeOutcome {
        let max_attempts = self.config.retries.saturating_add(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            let result = self.probe_once(instance).await;
            let elapsed = started.elapsed();

            let retry = match &result {
                Ok(()) => false,
                Err(ProbeError::InvalidUrl(_)) | Err(ProbeError::Request(_)) => false,
                Err(e) => {
                    tracing::debug!(
                        instance = %instance.id,
                        attempt,
                        error = %e,
                        "Health probe attempt failed"
                    );
                    attempt < max_attempts
                }
            };
            if !retry {
                return ProbeOutcome { result, elapsed, attempts: attempt };
            }

            let delay = probe_retry_delay(
                attempt,
                self.config.retry_base_delay_ms,
                self.config.retry_max_delay_ms,
            );
            time::sleep(delay).await;
        }
    }
}
