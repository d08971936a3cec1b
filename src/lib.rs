pub mod billing;
pub mod config;
pub mod error;
pub mod job_queue;
pub mod routes;

pub use error::{AppError, AppResult};
