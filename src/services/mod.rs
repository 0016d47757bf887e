pub(crate) mod grading;
pub(crate) mod intake;
pub(crate) mod submission_state;
