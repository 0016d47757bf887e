pub(crate) mod grading_cache;
pub(crate) mod grading_results;
pub(crate) mod health;
pub(crate) mod questions;
pub(crate) mod store;
pub(crate) mod submissions;
pub(crate) mod system_settings;
pub(crate) mod usage_logs;
