use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::billing::api;

pub fn api_routes() -> Router {
    Router::new()
        .route("/api/billing/invoices/generate", post(api::generate_invoice))
        .route(
            "/api/billing/invoices/generate/async",
            post(api::generate_invoice_async),
        )
        .route("/api/billing/invoices/batch", post(api::submit_batch_billing))
        .route(
            "/api/billing/invoices/consolidated",
            post(api::generate_consolidated_invoice),
        )
        .route(
            "/api/billing/invoices/consolidated/async",
            post(api::generate_consolidated_invoice_async),
        )
        .route("/api/billing/jobs/:id", get(api::job_status))
        .route("/api/billing/queues/stats", get(api::queue_stats))
        .route(
            "/api/billing/contracts/:id/shares",
            post(api::create_share),
        )
        .route(
            "/api/billing/contracts/:id/shares/:account_id",
            delete(api::remove_share),
        )
        .route(
            "/api/billing/accounts/:id/shares",
            get(api::list_account_shares),
        )
}
