use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use crate::billing::{ConsolidationService, InvoiceAssembler};
use crate::config;
use crate::error::{AppError, AppResult};

/// key: job-queue -> asynchronous billing runs
///
/// Two logical queues share one table, keyed by the `queue` column:
/// contract-billing handles per-contract invoices and (future) batch runs,
/// consolidated-billing handles subtree aggregation. Rows move
/// waiting -> active -> completed | failed; failed rows keep their error and
/// attempt count for inspection, completed rows are pruned past a retention
/// window to bound the table.
#[derive(Debug, Serialize, Deserialize)]
pub enum BillingJob {
    GenerateInvoice {
        contract_id: Uuid,
        period_start: Option<DateTime<Utc>>,
        period_end: Option<DateTime<Utc>>,
    },
    BatchBilling {
        billing_date: Option<DateTime<Utc>>,
        billing_period: Option<String>,
    },
    ConsolidatedInvoice {
        parent_account_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        include_children: bool,
    },
}

impl BillingJob {
    pub fn queue(&self) -> QueueKind {
        match self {
            BillingJob::GenerateInvoice { .. } | BillingJob::BatchBilling { .. } => {
                QueueKind::ContractBilling
            }
            BillingJob::ConsolidatedInvoice { .. } => QueueKind::ConsolidatedBilling,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BillingJob::GenerateInvoice { .. } => "generate_invoice",
            BillingJob::BatchBilling { .. } => "batch_billing",
            BillingJob::ConsolidatedInvoice { .. } => "consolidated_invoice",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    ContractBilling,
    ConsolidatedBilling,
}

impl QueueKind {
    pub const ALL: [QueueKind; 2] = [QueueKind::ContractBilling, QueueKind::ConsolidatedBilling];

    pub fn as_str(self) -> &'static str {
        match self {
            QueueKind::ContractBilling => "contract-billing",
            QueueKind::ConsolidatedBilling => "consolidated-billing",
        }
    }

    fn concurrency(self) -> usize {
        match self {
            QueueKind::ContractBilling => *config::CONTRACT_BILLING_CONCURRENCY,
            QueueKind::ConsolidatedBilling => *config::CONSOLIDATED_BILLING_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobStatus {
    pub id: Uuid,
    pub queue: String,
    pub kind: String,
    pub status: String,
    pub progress: i32,
    pub attempts: i32,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub queue: String,
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    pub delayed: i64,
    pub total: i64,
}

#[derive(Debug, FromRow)]
struct ClaimedJob {
    id: Uuid,
    payload: Value,
}

/// key: job-queue-handle -> submit/status/stats
#[derive(Clone)]
pub struct JobQueues {
    pool: PgPool,
}

impl JobQueues {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueues without blocking on execution; the worker loops pick the row
    /// up on their next poll, including after a restart.
    pub async fn submit(&self, job: &BillingJob) -> AppResult<Uuid> {
        let payload = serde_json::to_value(job)
            .map_err(|err| AppError::BadRequest(format!("unserializable job payload: {err}")))?;
        let job_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO billing_jobs (id, queue, kind, payload, status) VALUES ($1, $2, $3, $4, 'waiting')",
        )
        .bind(job_id)
        .bind(job.queue().as_str())
        .bind(job.kind())
        .bind(payload)
        .execute(&self.pool)
        .await?;

        tracing::info!(%job_id, queue = job.queue().as_str(), kind = job.kind(), "billing job submitted");
        Ok(job_id)
    }

    /// Looks the job up across both queues.
    pub async fn status(&self, job_id: Uuid) -> AppResult<JobStatus> {
        let status = sqlx::query_as::<_, JobStatus>(
            r#"
            SELECT id, queue, kind, status, progress, attempts, result, error,
                   created_at, started_at, finished_at
            FROM billing_jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("job"))?;
        Ok(status)
    }

    pub async fn stats(&self) -> AppResult<Vec<QueueStats>> {
        let mut all = Vec::with_capacity(QueueKind::ALL.len());
        for queue in QueueKind::ALL {
            let row: (i64, i64, i64, i64, i64, i64) = sqlx::query_as(
                r#"
                SELECT
                    COUNT(*) FILTER (WHERE status = 'waiting'),
                    COUNT(*) FILTER (WHERE status = 'active'),
                    COUNT(*) FILTER (WHERE status = 'completed'),
                    COUNT(*) FILTER (WHERE status = 'failed'),
                    COUNT(*) FILTER (WHERE status = 'delayed'),
                    COUNT(*)
                FROM billing_jobs
                WHERE queue = $1
                "#,
            )
            .bind(queue.as_str())
            .fetch_one(&self.pool)
            .await?;

            all.push(QueueStats {
                queue: queue.as_str().to_string(),
                waiting: row.0,
                active: row.1,
                completed: row.2,
                failed: row.3,
                delayed: row.4,
                total: row.5,
            });
        }
        Ok(all)
    }
}

/// Spawns one polling worker per queue. Correctness under concurrent sync and
/// async invocation rests on the invoice transaction and the numbering
/// sequence, not on anything the workers serialize.
pub fn start_workers(pool: PgPool) {
    for queue in QueueKind::ALL {
        spawn_queue_worker(pool.clone(), queue);
    }
}

fn spawn_queue_worker(pool: PgPool, queue: QueueKind) {
    let concurrency = queue.concurrency();
    let poll = Duration::from_millis(*config::JOB_POLL_INTERVAL_MS);

    tokio::spawn(async move {
        let semaphore = Arc::new(Semaphore::new(concurrency));
        tracing::info!(queue = queue.as_str(), concurrency, "billing queue worker started");

        loop {
            let free_slots = semaphore.available_permits();
            if free_slots == 0 {
                sleep(poll).await;
                continue;
            }

            let claimed = match claim_jobs(&pool, queue, free_slots as i64).await {
                Ok(jobs) => jobs,
                Err(err) => {
                    tracing::warn!(?err, queue = queue.as_str(), "failed to claim billing jobs");
                    sleep(poll).await;
                    continue;
                }
            };

            if claimed.is_empty() {
                if let Err(err) = prune_completed(&pool, queue).await {
                    tracing::warn!(?err, queue = queue.as_str(), "failed to prune completed jobs");
                }
                sleep(poll).await;
                continue;
            }

            for job in claimed {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    return;
                };
                let pool = pool.clone();
                tokio::spawn(async move {
                    run_job(&pool, job).await;
                    drop(permit);
                });
            }
        }
    });
}

/// Claims and runs up to `limit` waiting jobs inline, returning how many ran.
/// This is the synchronous way to drain a queue; the polling workers drive
/// the same claim-and-run path with a concurrency bound on top.
pub async fn run_pending(pool: &PgPool, queue: QueueKind, limit: i64) -> AppResult<usize> {
    let claimed = claim_jobs(pool, queue, limit).await?;
    let count = claimed.len();
    for job in claimed {
        run_job(pool, job).await;
    }
    Ok(count)
}

/// Claims up to `limit` waiting rows. `FOR UPDATE SKIP LOCKED` keeps
/// concurrent workers (or processes) from double-running a job.
async fn claim_jobs(pool: &PgPool, queue: QueueKind, limit: i64) -> AppResult<Vec<ClaimedJob>> {
    let rows = sqlx::query_as::<_, ClaimedJob>(
        r#"
        UPDATE billing_jobs
        SET status = 'active', attempts = attempts + 1, started_at = NOW()
        WHERE id IN (
            SELECT id FROM billing_jobs
            WHERE queue = $1 AND status = 'waiting'
            ORDER BY created_at
            LIMIT $2
            FOR UPDATE SKIP LOCKED
        )
        RETURNING id, payload
        "#,
    )
    .bind(queue.as_str())
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn run_job(pool: &PgPool, claimed: ClaimedJob) {
    let job_id = claimed.id;
    let job = match serde_json::from_value::<BillingJob>(claimed.payload) {
        Ok(job) => job,
        Err(err) => {
            mark_failed(pool, job_id, &format!("undecodable job payload: {err}")).await;
            return;
        }
    };

    let kind = job.kind();
    let outcome: AppResult<Value> = match job {
        BillingJob::GenerateInvoice {
            contract_id,
            period_start,
            period_end,
        } => {
            let assembler = InvoiceAssembler::new(pool.clone());
            assembler
                .generate(contract_id, period_start, period_end)
                .await
                .and_then(to_result_json)
        }
        BillingJob::ConsolidatedInvoice {
            parent_account_id,
            period_start,
            period_end,
            include_children,
        } => {
            let service = ConsolidationService::new(pool.clone());
            service
                .generate(parent_account_id, period_start, period_end, include_children)
                .await
                .and_then(to_result_json)
        }
        BillingJob::BatchBilling { .. } => {
            // Recognized kind, acknowledged stub. Failing loudly beats
            // pretending the run happened.
            Err(AppError::InvalidState(
                "batch billing is not yet implemented".to_string(),
            ))
        }
    };

    match outcome {
        Ok(result) => {
            mark_completed(pool, job_id, result).await;
            tracing::info!(%job_id, kind, "billing job completed");
        }
        Err(err) => {
            mark_failed(pool, job_id, &format!("{}: {}", err.kind(), err)).await;
            tracing::warn!(%job_id, kind, ?err, "billing job failed");
        }
    }
}

fn to_result_json<T: Serialize>(value: T) -> AppResult<Value> {
    serde_json::to_value(value)
        .map_err(|err| AppError::InvalidState(format!("unserializable job result: {err}")))
}

async fn mark_completed(pool: &PgPool, job_id: Uuid, result: Value) {
    if let Err(err) = sqlx::query(
        "UPDATE billing_jobs SET status = 'completed', progress = 100, result = $2, finished_at = NOW() WHERE id = $1",
    )
    .bind(job_id)
    .bind(result)
    .execute(pool)
    .await
    {
        tracing::error!(?err, %job_id, "failed to record billing job completion");
    }
}

async fn mark_failed(pool: &PgPool, job_id: Uuid, error: &str) {
    if let Err(err) = sqlx::query(
        "UPDATE billing_jobs SET status = 'failed', error = $2, finished_at = NOW() WHERE id = $1",
    )
    .bind(job_id)
    .bind(error)
    .execute(pool)
    .await
    {
        tracing::error!(?err, %job_id, "failed to record billing job failure");
    }
}

/// Keeps only the most recent completed rows per queue. Failed rows are never
/// pruned; operators inspect them.
async fn prune_completed(pool: &PgPool, queue: QueueKind) -> AppResult<()> {
    sqlx::query(
        r#"
        DELETE FROM billing_jobs
        WHERE queue = $1 AND status = 'completed'
          AND id NOT IN (
              SELECT id FROM billing_jobs
              WHERE queue = $1 AND status = 'completed'
              ORDER BY finished_at DESC NULLS LAST
              LIMIT $2
          )
        "#,
    )
    .bind(queue.as_str())
    .bind(*config::COMPLETED_JOB_RETENTION)
    .execute(pool)
    .await?;
    Ok(())
}
