use std::sync::Arc;

use objdb_metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<Metrics>,
    /// `None` disables auth entirely — every route is public. `Some` is
    /// checked against the `Authorization` header on `/metrics`.
    pub auth_token: Option<Arc<String>>,
}
