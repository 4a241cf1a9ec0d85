use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::error::CronError;

type JobFn = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Thin facade over `tokio_cron_scheduler::JobScheduler` exposing named
/// interval/cron jobs and a graceful `shutdown()`. The scheduler is
/// injected rather than global, so a cluster (or queue, or replicator)
/// with no schedule configured never starts one.
pub struct CronManager {
    scheduler: JobScheduler,
    names: HashMap<String, Uuid>,
}

impl CronManager {
    pub async fn new() -> Result<Self, CronError> {
        let scheduler = JobScheduler::new().await?;
        Ok(CronManager { scheduler, names: HashMap::new() })
    }

    /// Registers `name` to run on `cron_expr` (standard 6-field cron
    /// syntax), with `run_on_start` triggering one immediate execution
    /// before the first scheduled tick. `timezone`, when set, must name an
    /// IANA zone (e.g. `"America/New_York"`); the job otherwise ticks in
    /// the process's local timezone.
    pub async fn add_cron<F, Fut>(&mut self, name: &str, cron_expr: &str, timezone: Option<&str>, job: F) -> Result<Uuid, CronError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job_fn: JobFn = Arc::new(move || Box::pin(job()));
        let scheduled = match timezone {
            Some(tz) => {
                let tz = Tz::from_str(tz).map_err(|_| CronError::InvalidTimezone(tz.to_string()))?;
                Job::new_async_tz(cron_expr, tz, move |_uuid, _sched| {
                    let job_fn = job_fn.clone();
                    Box::pin(async move { job_fn().await })
                })
            }
            None => Job::new_async(cron_expr, move |_uuid, _sched| {
                let job_fn = job_fn.clone();
                Box::pin(async move { job_fn().await })
            }),
        }
        .map_err(|source| CronError::InvalidSchedule { expr: cron_expr.to_string(), source })?;
        let id = self.scheduler.add(scheduled).await?;
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Registers `name` to run every `interval`, starting one `interval`
    /// from now (use `run_once` first for `runOnStart` semantics).
    pub async fn add_interval<F, Fut>(&mut self, name: &str, interval: Duration, job: F) -> Result<Uuid, CronError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job_fn: JobFn = Arc::new(move || Box::pin(job()));
        let scheduled = Job::new_repeated_async(interval, move |_uuid, _sched| {
            let job_fn = job_fn.clone();
            Box::pin(async move { job_fn().await })
        })?;
        let id = self.scheduler.add(scheduled).await?;
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    pub async fn start(&self) -> Result<(), CronError> {
        self.scheduler.start().await?;
        Ok(())
    }

    pub async fn remove(&mut self, name: &str) -> Result<(), CronError> {
        let id = self.names.remove(name).ok_or_else(|| CronError::UnknownJob(name.to_string()))?;
        self.scheduler.remove(&id).await?;
        Ok(())
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.names.keys().map(String::as_str).collect()
    }

    /// Stops every scheduled job cleanly. Called by plugin teardown.
    pub async fn shutdown(mut self) -> Result<(), CronError> {
        self.scheduler.shutdown().await?;
        Ok(())
    }
}
