mod maintenance;
mod pipeline;
mod queue;
mod worker;

pub(crate) use maintenance::{recover_on_startup, spawn_maintenance_loop};
pub(crate) use pipeline::{GradingPipeline, JobOutcome};
#[cfg(test)]
pub(crate) use queue::JobReceiver;
pub(crate) use queue::{GradingJob, GradingQueue};
pub(crate) use worker::spawn_workers;
