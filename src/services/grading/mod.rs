pub(crate) mod aggregate;
pub(crate) mod cache;
pub(crate) mod client;
mod error;
pub(crate) mod provider;
pub(crate) mod rate_limiter;
pub(crate) mod rubric;

pub(crate) use error::GradingError;
