use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use objdb_resource::Resource;
use objdb_util::new_id;
use prometheus::{CounterVec, IntCounterVec, Opts, Registry, TextEncoder};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::MetricsError;
use crate::family::OperationFamily;
use crate::schema::{to_fields, ErrorRow, PerformanceRow};

/// In-process counters keyed by `(resource, operation)`, exposed both
/// globally (resource label `"*"`) and per resource. Backed by
/// `prometheus` vectors so `render()` is a direct `TextEncoder` dump in
/// exposition format 0.0.4 — no hand-rolled formatting.
pub struct Metrics {
    registry: Registry,
    operations_total: IntCounterVec,
    errors_total: IntCounterVec,
    duration_seconds_sum: CounterVec,
    duration_seconds_count: IntCounterVec,
    performance_buffer: Mutex<Vec<PerformanceRow>>,
    error_buffer: Mutex<Vec<ErrorRow>>,
}

const GLOBAL_LABEL: &str = "*";

impl Metrics {
    pub fn new() -> Result<Arc<Self>, MetricsError> {
        let registry = Registry::new();

        let operations_total = IntCounterVec::new(
            Opts::new("operations_total", "Total resource operations performed"),
            &["operation", "resource"],
        )?;
        let errors_total = IntCounterVec::new(
            Opts::new("operations_errors_total", "Total resource operations that failed"),
            &["operation", "resource"],
        )?;
        let duration_seconds_sum = CounterVec::new(
            Opts::new("operation_duration_seconds_sum", "Sum of operation durations in seconds"),
            &["operation", "resource"],
        )?;
        let duration_seconds_count = IntCounterVec::new(
            Opts::new("operation_duration_seconds_count", "Count of timed operations"),
            &["operation", "resource"],
        )?;

        registry.register(Box::new(operations_total.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(duration_seconds_sum.clone()))?;
        registry.register(Box::new(duration_seconds_count.clone()))?;

        Ok(Arc::new(Metrics {
            registry,
            operations_total,
            errors_total,
            duration_seconds_sum,
            duration_seconds_count,
            performance_buffer: Mutex::new(Vec::new()),
            error_buffer: Mutex::new(Vec::new()),
        }))
    }

    /// Times `fut`, recording it against both the per-resource and global
    /// (`"*"`) counters, then returns its result unmodified.
    pub async fn timed<T, E, Fut>(&self, resource: &str, op: OperationFamily, fut: Fut) -> Result<T, E>
    where
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start = Instant::now();
        let result = fut.await;
        let elapsed = start.elapsed();
        let error = result.as_ref().err().map(|e| e.to_string());
        self.record(resource, op, elapsed, error.as_deref()).await;
        result
    }

    async fn record(&self, resource: &str, op: OperationFamily, elapsed: Duration, error: Option<&str>) {
        let op_label = op.as_str();
        for label in [resource, GLOBAL_LABEL] {
            self.operations_total.with_label_values(&[op_label, label]).inc();
            self.duration_seconds_sum.with_label_values(&[op_label, label]).inc_by(elapsed.as_secs_f64());
            self.duration_seconds_count.with_label_values(&[op_label, label]).inc();
            if error.is_some() {
                self.errors_total.with_label_values(&[op_label, label]).inc();
            }
        }

        let now = Utc::now();
        let date = now.format("%Y-%m-%d").to_string();
        self.performance_buffer.lock().await.push(PerformanceRow {
            id: new_id(),
            resource: resource.to_string(),
            operation: op_label.to_string(),
            duration_ms: elapsed.as_millis() as u64,
            success: error.is_none(),
            date: date.clone(),
            timestamp: now,
        });
        if let Some(message) = error {
            self.error_buffer.lock().await.push(ErrorRow {
                id: new_id(),
                resource: resource.to_string(),
                operation: op_label.to_string(),
                message: message.to_string(),
                date,
                timestamp: now,
            });
        }
    }

    /// Drains the buffered performance/error rows into their resources.
    /// Called on an interval by the owning plugin; buffers are empty again
    /// on return regardless of whether every row made it (a row dropped
    /// here is logged, not retried).
    pub async fn flush(
        &self,
        metrics_resource: &Resource,
        errors_resource: &Resource,
        performance_resource: &Resource,
    ) -> Result<(usize, usize), MetricsError> {
        let performance: Vec<PerformanceRow> = std::mem::take(&mut *self.performance_buffer.lock().await);
        let errors: Vec<ErrorRow> = std::mem::take(&mut *self.error_buffer.lock().await);

        let mut aggregates: HashMap<(String, String, String), (u64, u64, u64)> = HashMap::new();
        for row in &performance {
            let key = (row.resource.clone(), row.operation.clone(), row.date.clone());
            let entry = aggregates.entry(key).or_insert((0, 0, 0));
            entry.0 += 1;
            entry.1 += row.duration_ms;
            if !row.success {
                entry.2 += 1;
            }
        }

        let mut flushed_performance = 0usize;
        for row in performance {
            if let Err(e) = performance_resource.insert(to_fields(&row)?).await {
                warn!(error = %e, "metrics performance flush failed for one row");
                continue;
            }
            flushed_performance += 1;
        }

        let mut flushed_errors = 0usize;
        for row in errors {
            if let Err(e) = errors_resource.insert(to_fields(&row)?).await {
                warn!(error = %e, "metrics error flush failed for one row");
                continue;
            }
            flushed_errors += 1;
        }

        let flushed_at = Utc::now();
        for ((resource, operation, date), (count, total_time_ms, errors)) in aggregates {
            let row = crate::schema::MetricRow {
                id: new_id(),
                resource,
                operation,
                count,
                total_time_ms,
                errors,
                date,
                flushed_at,
            };
            if let Err(e) = metrics_resource.insert(to_fields(&row)?).await {
                warn!(error = %e, "metrics aggregate flush failed for one row");
            }
        }

        Ok((flushed_performance, flushed_errors))
    }

    /// Deletes `plg_metrics*` rows dated more than `retention_days` in the
    /// past, scanning each resource's `byDate` partition one day at a time
    /// back to the oldest row the caller is willing to assume exists.
    pub async fn cleanup_old_data(
        &self,
        metrics_resource: &Resource,
        errors_resource: &Resource,
        performance_resource: &Resource,
        retention_days: i64,
        lookback_days: i64,
    ) -> Result<usize, MetricsError> {
        let mut deleted = 0usize;
        for resource in [metrics_resource, errors_resource, performance_resource] {
            for offset in (retention_days + 1)..=(retention_days + lookback_days) {
                let date = (Utc::now().date_naive() - chrono::Duration::days(offset)).to_string();
                let ids = resource.list_partition("byDate", Some(&date), None).await?;
                if ids.is_empty() {
                    continue;
                }
                let results = resource.delete_many(&ids).await;
                deleted += results.iter().filter(|r| r.is_ok()).count();
            }
        }
        Ok(deleted)
    }

    /// Prometheus text exposition format 0.0.4.
    pub fn render(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        Ok(encoder.encode_to_string(&families)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::metrics_resource_schema;
    use objdb_store::ObjectStoreBlob;
    use objdb_types::ResourceName;

    fn plain_resource(name: &str) -> Resource {
        let mut schema = metrics_resource_schema();
        schema.name = ResourceName::new(name);
        Resource::new(schema, std::sync::Arc::new(ObjectStoreBlob::in_memory()))
    }

    #[tokio::test]
    async fn timed_records_success_and_global_counters() {
        let metrics = Metrics::new().unwrap();
        let result: Result<u32, String> = metrics.timed("widgets", OperationFamily::Get, async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("operations_total"));
        assert!(rendered.contains("resource=\"widgets\""));
        assert!(rendered.contains("resource=\"*\""));
    }

    #[tokio::test]
    async fn timed_records_errors() {
        let metrics = Metrics::new().unwrap();
        let result: Result<u32, String> =
            metrics.timed("widgets", OperationFamily::Insert, async { Err("boom".to_string()) }).await;
        assert!(result.is_err());
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("operations_errors_total"));
    }

    #[tokio::test]
    async fn flush_drains_buffers_into_resources() {
        let metrics = Metrics::new().unwrap();
        let _: Result<u32, String> = metrics.timed("widgets", OperationFamily::Get, async { Ok(1) }).await;
        let _: Result<u32, String> = metrics.timed("widgets", OperationFamily::Get, async { Err("x".into()) }).await;

        let metrics_res = plain_resource("plg_metrics");
        let errors_res = plain_resource("plg_metrics_errors");
        let perf_res = plain_resource("plg_metrics_performance");

        let (perf_count, err_count) = metrics.flush(&metrics_res, &errors_res, &perf_res).await.unwrap();
        assert_eq!(perf_count, 2);
        assert_eq!(err_count, 1);
        assert_eq!(perf_res.list_ids().await.unwrap().len(), 2);
        assert_eq!(errors_res.list_ids().await.unwrap().len(), 1);
        assert_eq!(metrics_res.list_ids().await.unwrap().len(), 1);

        // Buffers are empty after flush.
        let (perf_count2, err_count2) = metrics.flush(&metrics_res, &errors_res, &perf_res).await.unwrap();
        assert_eq!(perf_count2, 0);
        assert_eq!(err_count2, 0);
    }
}
