#![allow(dead_code)]

//! Durable multi-topic job queue backed by the `jobs` Postgres table (§4.2).
//!
//! Each topic runs its own single-worker polling loop (`SELECT ... FOR UPDATE SKIP
//! LOCKED`), giving per-topic FIFO ordering without a broker process.

pub mod retry;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};

use crate::bridge::error::BridgeError;
use crate::db::models::JobRow;
use crate::types::AtomicUnits;
use retry::{classify_error, ErrorClass, RetryConfig};

const DEFAULT_MAX_ATTEMPTS: i32 = 3;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct PendingWithdrawal {
    pub native: String,
    pub evm: String,
    pub amount: AtomicUnits,
    pub ts: i64,
    pub attempt: u32,
}

/// Outcome pushed to the per-job completion listener (§4.2 `AddJobListener`), which the
/// HTTP layer's SSE handler consumes to notify the owning user (§6.1).
#[derive(Debug, Clone)]
pub struct JobEvent {
    pub topic: String,
    pub job_id: String,
    pub native: Option<String>,
    pub succeeded: bool,
    pub message: String,
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, payload: serde_json::Value) -> eyre::Result<()>;
}

#[async_trait]
pub trait Queue: Send + Sync {
    /// Enqueue a job under `id` (natural dedup: a duplicate id is a no-op).
    async fn enqueue(
        &self,
        topic: &str,
        id: &str,
        payload: serde_json::Value,
        delay: Duration,
        max_attempts: i32,
    ) -> Result<(), BridgeError>;

    async fn enqueue_pending_withdrawal(&self, w: &PendingWithdrawal) -> Result<(), BridgeError>;

    async fn get_pending_withdrawals_amount(&self) -> Result<AtomicUnits, BridgeError>;

    async fn register_processor(&self, topic: &'static str, handler: Arc<dyn JobHandler>);

    fn subscribe_events(&self) -> broadcast::Receiver<JobEvent>;

    /// Run every registered topic's polling loop until `shutdown` fires. Takes `Arc<Self>`
    /// so each topic's spawned task can hold its own owned handle into the next poll tick.
    async fn run(self: Arc<Self>, shutdown: tokio::sync::watch::Receiver<bool>) -> eyre::Result<()>;
}

pub struct PostgresQueue {
    pool: PgPool,
    handlers: RwLock<HashMap<&'static str, Arc<dyn JobHandler>>>,
    events: broadcast::Sender<JobEvent>,
}

impl PostgresQueue {
    pub fn new(pool: PgPool) -> Self {
        let (events, _) = broadcast::channel(1024);
        PostgresQueue {
            pool,
            handlers: RwLock::new(HashMap::new()),
            events,
        }
    }

    async fn claim_next_job(&self, topic: &str) -> eyre::Result<Option<JobRow>> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, topic, payload, attempt, max_attempts, status, run_at, last_error, created_at
            FROM jobs
            WHERE topic = $1 AND status IN ('waiting', 'delayed') AND run_at <= now()
            ORDER BY run_at
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(topic)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(job) = &row {
            sqlx::query("UPDATE jobs SET status = 'active' WHERE id = $1")
                .bind(&job.id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(row)
    }

    async fn mark_succeeded(&self, job: &JobRow) -> eyre::Result<()> {
        sqlx::query("UPDATE jobs SET status = 'completed' WHERE id = $1")
            .bind(&job.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_retry(&self, job: &JobRow, error: &str) -> eyre::Result<()> {
        let config = RetryConfig {
            max_retries: job.max_attempts as u32,
            ..RetryConfig::default()
        };
        let attempt = (job.attempt + 1) as u32;
        let class = classify_error(error);
        let (status, run_at) = match class {
            ErrorClass::Permanent => ("failed".to_string(), chrono::Utc::now()),
            ErrorClass::AlreadyProcessed => ("completed".to_string(), chrono::Utc::now()),
            ErrorClass::Transient | ErrorClass::Unknown => {
                if config.should_retry(attempt) {
                    ("delayed".to_string(), config.next_retry_after(attempt))
                } else {
                    ("failed".to_string(), chrono::Utc::now())
                }
            }
        };
        sqlx::query(
            "UPDATE jobs SET status = $1, attempt = $2, run_at = $3, last_error = $4 WHERE id = $5",
        )
        .bind(&status)
        .bind(job.attempt + 1)
        .bind(run_at)
        .bind(error)
        .bind(&job.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn emit(&self, event: JobEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl Queue for PostgresQueue {
    async fn enqueue(
        &self,
        topic: &str,
        id: &str,
        payload: serde_json::Value,
        delay: Duration,
        max_attempts: i32,
    ) -> Result<(), BridgeError> {
        let run_at = chrono::Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
        sqlx::query(
            r#"
            INSERT INTO jobs (id, topic, payload, attempt, max_attempts, status, run_at)
            VALUES ($1, $2, $3, 0, $4, 'waiting', $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(topic)
        .bind(payload)
        .bind(max_attempts)
        .bind(run_at)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;
        Ok(())
    }

    async fn enqueue_pending_withdrawal(&self, w: &PendingWithdrawal) -> Result<(), BridgeError> {
        let next_attempt = w.attempt + 1;
        let id = format!(
            "pending-withdrawal-{}-{}-attempt-{}",
            w.native, w.ts, next_attempt
        );
        let payload = serde_json::json!({
            "native": w.native,
            "evm": w.evm,
            "amount": w.amount.to_string(),
            "ts": w.ts,
            "attempt": next_attempt,
        });
        let delay = Duration::from_millis(next_attempt as u64 * 60_000);
        self.enqueue("withdrawal", &id, payload, delay, 1).await
    }

    async fn get_pending_withdrawals_amount(&self) -> Result<AtomicUnits, BridgeError> {
        let rows = sqlx::query(
            "SELECT payload FROM jobs WHERE id LIKE 'pending-withdrawal-%' AND status IN ('waiting', 'delayed')",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::ExternalFailure(e.to_string()))?;

        let mut total = AtomicUnits::ZERO;
        for row in rows {
            let payload: serde_json::Value = row.get("payload");
            if let Some(amount_str) = payload.get("amount").and_then(|v| v.as_str()) {
                if let Ok(units) = amount_str.parse() {
                    total = total.saturating_add(AtomicUnits(units));
                }
            }
        }
        Ok(total)
    }

    async fn register_processor(&self, topic: &'static str, handler: Arc<dyn JobHandler>) {
        self.handlers.write().await.insert(topic, handler);
    }

    fn subscribe_events(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) -> eyre::Result<()> {
        let topics: Vec<&'static str> = self.handlers.read().await.keys().copied().collect();
        let mut set = tokio::task::JoinSet::new();

        for topic in topics {
            let mut shutdown = shutdown.clone();
            let this = Arc::clone(&self);
            set.spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                info!(topic, "queue worker shutting down");
                                return;
                            }
                        }
                        _ = tokio::time::sleep(POLL_INTERVAL) => {
                            if let Err(e) = this.poll_once(topic).await {
                                error!(topic, error = %e, "queue poll error");
                            }
                        }
                    }
                }
            });
        }

        while set.join_next().await.is_some() {}
        let _ = shutdown.changed().await;
        Ok(())
    }
}

impl PostgresQueue {
    async fn poll_once(&self, topic: &str) -> eyre::Result<()> {
        let Some(job) = self.claim_next_job(topic).await? else {
            return Ok(());
        };
        let handler = self.handlers.read().await.get(topic).cloned();
        let Some(handler) = handler else {
            warn!(topic, "no handler registered for topic, leaving job active");
            return Ok(());
        };

        let native = job
            .payload
            .get("native")
            .and_then(|v| v.as_str())
            .map(String::from);

        match handler.handle(job.payload.clone()).await {
            Ok(()) => {
                self.mark_succeeded(&job).await?;
                self.emit(JobEvent {
                    topic: topic.to_string(),
                    job_id: job.id.clone(),
                    native,
                    succeeded: true,
                    message: "completed".to_string(),
                });
            }
            Err(e) => {
                let message = e.to_string();
                self.mark_retry(&job, &message).await?;
                self.emit(JobEvent {
                    topic: topic.to_string(),
                    job_id: job.id.clone(),
                    native,
                    succeeded: false,
                    message,
                });
            }
        }
        Ok(())
    }
}

pub fn default_max_attempts() -> i32 {
    DEFAULT_MAX_ATTEMPTS
}
