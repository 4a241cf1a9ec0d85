use thiserror::Error;

#[derive(Debug, Error)]
pub enum CronError {
    #[error("invalid cron expression '{expr}': {source}")]
    InvalidSchedule { expr: String, source: tokio_cron_scheduler::JobSchedulerError },

    #[error(transparent)]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error("no job named '{0}' is registered")]
    UnknownJob(String),

    #[error("unrecognized IANA timezone '{0}'")]
    InvalidTimezone(String),
}
