use once_cell::sync::Lazy;

/// Address the HTTP server should bind to. Defaults to `0.0.0.0`.
pub static BIND_ADDRESS: Lazy<String> =
    Lazy::new(|| std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Port the HTTP server should listen on. Defaults to `3000`.
pub static BIND_PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("BIND_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000)
});

/// When set to a truthy value, allows the application to continue running even if database
/// migrations fail. Defaults to `false`.
pub static ALLOW_MIGRATION_FAILURE: Lazy<bool> = Lazy::new(|| {
    std::env::var("ALLOW_MIGRATION_FAILURE")
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes")
        })
        .unwrap_or(false)
});

/// key: billing-config -> contract-billing queue parallelism
pub static CONTRACT_BILLING_CONCURRENCY: Lazy<usize> = Lazy::new(|| {
    std::env::var("CONTRACT_BILLING_CONCURRENCY")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(4)
});

/// key: billing-config -> consolidated-billing queue parallelism. Lower than the
/// contract queue: each job walks an account subtree and prices every contract in it.
pub static CONSOLIDATED_BILLING_CONCURRENCY: Lazy<usize> = Lazy::new(|| {
    std::env::var("CONSOLIDATED_BILLING_CONCURRENCY")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(2)
});

/// key: billing-config -> worker poll cadence in milliseconds
pub static JOB_POLL_INTERVAL_MS: Lazy<u64> = Lazy::new(|| {
    std::env::var("JOB_POLL_INTERVAL_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(1000)
});

/// key: billing-config -> completed jobs retained per queue before pruning.
/// Failed jobs are never pruned; operators inspect them.
pub static COMPLETED_JOB_RETENTION: Lazy<i64> = Lazy::new(|| {
    std::env::var("COMPLETED_JOB_RETENTION")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value >= 0)
        .unwrap_or(100)
});
