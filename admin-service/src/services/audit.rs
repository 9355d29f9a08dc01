use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::error::ServiceError;
use super::store::{bounded, AuditStore};
use crate::models::{AuditLog, ListParams, Paginated};

/// Writes audit rows off the request path and serves audit listings.
#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn AuditStore>,
    timeout: Duration,
}

impl AuditService {
    pub fn new(store: Arc<dyn AuditStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Fire-and-forget. A failed write is logged and never reaches the caller.
    pub fn record(&self, entry: AuditLog) {
        let store = self.store.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            if let Err(e) = bounded(timeout, store.log_audit_event(&entry)).await {
                tracing::warn!(
                    error = %e,
                    action = %entry.action,
                    resource = %entry.resource,
                    tenant_id = %entry.tenant_id,
                    "Failed to write audit log entry"
                );
            }
        });
    }

    #[tracing::instrument(skip(self, params), fields(tenant_id = %params.tenant_id))]
    pub async fn list(&self, params: &ListParams) -> Result<Paginated<AuditLog>, ServiceError> {
        let (logs, total) = bounded(self.timeout, self.store.list_audit_logs(params)).await?;
        Ok(Paginated::new(logs, total, params))
    }

    pub async fn recent_activity(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditLog>, ServiceError> {
        Ok(bounded(self.timeout, self.store.recent_activity(tenant_id, limit)).await?)
    }
}
