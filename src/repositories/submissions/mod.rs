mod commands;
mod queries;
mod types;

pub(crate) use commands::{apply_transition, insert};
pub(crate) use queries::{
    count_by_status, find_by_id, list_failed_for_retry, list_ids_by_status, list_stale_processing,
};
pub(crate) use types::{NewSubmission, StatusTransition};
