use axum::{
    extract::{Extension, Path},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::job_queue::{BillingJob, JobQueues, JobStatus, QueueStats};

use super::assembler::{GeneratedInvoice, InvoiceAssembler};
use super::consolidation::{ConsolidatedInvoice, ConsolidationService};
use super::models::ContractShare;
use super::shares;

/// key: billing-api -> rest endpoints over the billing core

#[derive(Debug, Deserialize)]
pub struct GenerateInvoiceRequest {
    pub contract_id: Uuid,
    #[serde(default)]
    pub period_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub period_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct BatchBillingRequest {
    #[serde(default)]
    pub billing_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub billing_period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConsolidatedInvoiceRequest {
    pub parent_account_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    #[serde(default)]
    pub include_children: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct JobSubmitted {
    pub job_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    pub account_id: Uuid,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn generate_invoice(
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<GenerateInvoiceRequest>,
) -> AppResult<Json<GeneratedInvoice>> {
    let assembler = InvoiceAssembler::new(pool);
    let invoice = assembler
        .generate(payload.contract_id, payload.period_start, payload.period_end)
        .await?;
    Ok(Json(invoice))
}

pub async fn generate_invoice_async(
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<GenerateInvoiceRequest>,
) -> AppResult<Json<JobSubmitted>> {
    let queues = JobQueues::new(pool);
    let job_id = queues
        .submit(&BillingJob::GenerateInvoice {
            contract_id: payload.contract_id,
            period_start: payload.period_start,
            period_end: payload.period_end,
        })
        .await?;
    Ok(Json(JobSubmitted { job_id }))
}

/// Batch billing is async-only; the worker acknowledges the kind and fails
/// with "not yet implemented".
pub async fn submit_batch_billing(
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<BatchBillingRequest>,
) -> AppResult<Json<JobSubmitted>> {
    let queues = JobQueues::new(pool);
    let job_id = queues
        .submit(&BillingJob::BatchBilling {
            billing_date: payload.billing_date,
            billing_period: payload.billing_period,
        })
        .await?;
    Ok(Json(JobSubmitted { job_id }))
}

pub async fn generate_consolidated_invoice(
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<ConsolidatedInvoiceRequest>,
) -> AppResult<Json<ConsolidatedInvoice>> {
    let service = ConsolidationService::new(pool);
    let invoice = service
        .generate(
            payload.parent_account_id,
            payload.period_start,
            payload.period_end,
            payload.include_children.unwrap_or(true),
        )
        .await?;
    Ok(Json(invoice))
}

pub async fn generate_consolidated_invoice_async(
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<ConsolidatedInvoiceRequest>,
) -> AppResult<Json<JobSubmitted>> {
    let queues = JobQueues::new(pool);
    let job_id = queues
        .submit(&BillingJob::ConsolidatedInvoice {
            parent_account_id: payload.parent_account_id,
            period_start: payload.period_start,
            period_end: payload.period_end,
            include_children: payload.include_children.unwrap_or(true),
        })
        .await?;
    Ok(Json(JobSubmitted { job_id }))
}

pub async fn job_status(
    Extension(pool): Extension<PgPool>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<JobStatus>> {
    let queues = JobQueues::new(pool);
    Ok(Json(queues.status(job_id).await?))
}

pub async fn queue_stats(Extension(pool): Extension<PgPool>) -> AppResult<Json<Vec<QueueStats>>> {
    let queues = JobQueues::new(pool);
    Ok(Json(queues.stats().await?))
}

pub async fn create_share(
    Extension(pool): Extension<PgPool>,
    Path(contract_id): Path<Uuid>,
    Json(payload): Json<CreateShareRequest>,
) -> AppResult<Json<ContractShare>> {
    let share = shares::create_share(&pool, contract_id, payload.account_id, payload.notes).await?;
    Ok(Json(share))
}

pub async fn remove_share(
    Extension(pool): Extension<PgPool>,
    Path((contract_id, account_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<serde_json::Value>> {
    shares::remove_share(&pool, contract_id, account_id).await?;
    Ok(Json(serde_json::json!({ "removed": true })))
}

pub async fn list_account_shares(
    Extension(pool): Extension<PgPool>,
    Path(account_id): Path<Uuid>,
) -> AppResult<Json<Vec<ContractShare>>> {
    let shares = shares::list_shares_for_account(&pool, account_id).await?;
    Ok(Json(shares))
}
