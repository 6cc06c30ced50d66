//! Retry and dead-letter policy for job attempts (§4.2).
//!
//! Generalized from a transaction-submission retry helper: no gas bumping here, just
//! backoff classification and a dead-letter decision for durable job processing.

use chrono::{DateTime, Utc};
use eyre::{eyre, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// Job retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_secs =
            self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped = backoff_secs.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    pub fn next_retry_after(&self, attempt: u32) -> DateTime<Utc> {
        let backoff = self.backoff_for_attempt(attempt);
        Utc::now() + chrono::Duration::from_std(backoff).unwrap_or(chrono::Duration::seconds(60))
    }

    pub fn is_ready_for_retry(&self, retry_after: Option<DateTime<Utc>>) -> bool {
        match retry_after {
            Some(time) => Utc::now() >= time,
            None => true,
        }
    }
}

/// Classifies job failures for retry decisions.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorClass {
    /// Temporary failure (RPC timeout, connection reset) - retry.
    Transient,
    /// Already handled - skip without error.
    AlreadyProcessed,
    /// Cannot ever succeed (invalid signature, blacklisted) - dead-letter immediately.
    Permanent,
    /// Unknown error - retry with backoff, same as Transient.
    Unknown,
}

pub fn classify_error(error: &str) -> ErrorClass {
    let error_lower = error.to_lowercase();

    if error_lower.contains("timeout")
        || error_lower.contains("connection")
        || error_lower.contains("network")
        || error_lower.contains("rate limit")
        || error_lower.contains("too many requests")
        || error_lower.contains("503")
        || error_lower.contains("502")
        || error_lower.contains("temporarily unavailable")
    {
        return ErrorClass::Transient;
    }

    if error_lower.contains("already processed")
        || error_lower.contains("already claimed")
        || error_lower.contains("already known")
    {
        return ErrorClass::AlreadyProcessed;
    }

    if error_lower.contains("invalid signature")
        || error_lower.contains("invalid owner")
        || error_lower.contains("blacklisted")
        || error_lower.contains("reverted")
        || error_lower.contains("execution reverted")
    {
        return ErrorClass::Permanent;
    }

    ErrorClass::Unknown
}

/// Retry context for one job attempt chain.
#[derive(Debug, Clone)]
pub struct RetryContext {
    pub config: RetryConfig,
    pub attempt: u32,
    pub last_error: Option<String>,
}

impl RetryContext {
    pub fn new() -> Self {
        Self::with_config(RetryConfig::default())
    }

    pub fn with_config(config: RetryConfig) -> Self {
        Self {
            config,
            attempt: 0,
            last_error: None,
        }
    }

    pub fn record_failure(&mut self, error: String) {
        self.attempt += 1;
        self.last_error = Some(error);
    }

    pub fn next_action(&self) -> RetryAction {
        let error = self.last_error.as_deref().unwrap_or("");
        let error_class = classify_error(error);

        match error_class {
            ErrorClass::Permanent => {
                warn!(error = %error, "Permanent error - moving job to dead letter");
                RetryAction::DeadLetter
            }
            ErrorClass::AlreadyProcessed => {
                debug!("Job already processed elsewhere, skipping");
                RetryAction::Skip
            }
            ErrorClass::Transient | ErrorClass::Unknown => {
                if !self.config.should_retry(self.attempt) {
                    return RetryAction::DeadLetter;
                }
                let backoff = self.config.backoff_for_attempt(self.attempt);
                debug!(?backoff, attempt = self.attempt, "Transient error - retrying");
                RetryAction::RetryAfter(backoff)
            }
        }
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
        self.last_error = None;
    }
}

impl Default for RetryContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub enum RetryAction {
    RetryAfter(Duration),
    Skip,
    DeadLetter,
}

/// Execute `operation` with retry logic, classifying each failure.
pub async fn with_retry<F, T, Fut>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut ctx = RetryContext::with_config(config.clone());

    loop {
        match operation(ctx.attempt).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let error_str = e.to_string();
                ctx.record_failure(error_str.clone());

                match ctx.next_action() {
                    RetryAction::RetryAfter(backoff) => {
                        warn!(
                            attempt = ctx.attempt,
                            max = config.max_retries,
                            ?backoff,
                            error = %error_str,
                            "Retrying job after backoff"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    RetryAction::Skip => {
                        debug!("Skipping job");
                        return Err(eyre!("Skipped: {}", error_str));
                    }
                    RetryAction::DeadLetter => {
                        warn!(error = %error_str, "Moving job to dead letter");
                        return Err(eyre!("Dead letter: {}", error_str));
                    }
                }
            }
        }
    }
}
