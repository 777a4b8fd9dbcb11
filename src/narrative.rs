//! Narrative Generator
//!
//! Single choke point for every LLM call. Validates sampling limits,
//! bounds each call with a timeout, retries transient provider failures
//! with exponential backoff and stops calling the provider for the rest of a
//! request once the credential has been rejected.

use crate::error::{DdiError, Result};
use crate::llm::{ChatMessage, NarrativeRequest, TextCompletion};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Retry policy for transient provider failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: usize,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    /// No retries: the caller decides whether to run the assessment again.
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    pub fn with_max_retries(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Self::none()
        }
    }

    /// Calculate delay for retry attempt (exponential backoff)
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let delay_ms = (self.initial_delay.as_millis() as f64)
            * (self.backoff_multiplier.powi(attempt as i32));
        let delay_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }
}

/// Per-request flag tripped by the first credential rejection
#[derive(Debug, Clone, Default)]
pub struct AuthGate {
    rejected: Arc<AtomicBool>,
}

impl AuthGate {
    pub fn trip(&self) {
        self.rejected.store(true, Ordering::SeqCst);
    }

    pub fn is_tripped(&self) -> bool {
        self.rejected.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct NarrativeGenerator {
    provider: Arc<dyn TextCompletion>,
    timeout: Duration,
    retry_policy: RetryPolicy,
    auth_gate: AuthGate,
}

impl NarrativeGenerator {
    pub fn new(provider: Arc<dyn TextCompletion>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_TIMEOUT,
            retry_policy: RetryPolicy::default(),
            auth_gate: AuthGate::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Copy sharing the provider but with a fresh auth gate, one per request.
    pub fn for_request(&self) -> Self {
        Self {
            auth_gate: AuthGate::default(),
            ..self.clone()
        }
    }

    pub fn auth_gate(&self) -> &AuthGate {
        &self.auth_gate
    }

    pub async fn generate(
        &self,
        system_role: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(DdiError::InvalidRequest(format!(
                "temperature {} outside [0, 2]",
                temperature
            )));
        }
        if max_tokens == 0 {
            return Err(DdiError::InvalidRequest("max_tokens must be positive".to_string()));
        }

        let request = NarrativeRequest {
            messages: vec![ChatMessage::system(system_role), ChatMessage::user(user_prompt)],
            temperature,
            max_tokens,
        };
        self.execute(&request).await
    }

    async fn execute(&self, request: &NarrativeRequest) -> Result<String> {
        let mut attempt = 0;
        loop {
            if self.auth_gate.is_tripped() {
                return Err(DdiError::Auth(
                    "skipped: credential already rejected during this request".to_string(),
                ));
            }

            debug!("Calling {} (attempt {})", self.provider.name(), attempt + 1);
            let outcome = match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(DdiError::TransientProvider(format!(
                    "no response within {:?}",
                    self.timeout
                ))),
            };

            match outcome {
                Ok(text) => return Ok(text),
                Err(e @ DdiError::Auth(_)) => {
                    self.auth_gate.trip();
                    return Err(e);
                }
                Err(e) if e.is_transient() && attempt < self.retry_policy.max_retries => {
                    let delay = self.retry_policy.delay_for_attempt(attempt);
                    warn!("{}; retrying in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
