use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::audit::AuditService;
use super::error::ServiceError;
use super::store::{bounded, FeatureFlagStore};
use crate::dtos::admin::{CreateFeatureFlagRequest, UpdateFeatureFlagRequest};
use crate::models::{Actor, AuditAction, AuditLog, FeatureFlag};

const RESOURCE: &str = "feature_flag";

#[derive(Clone)]
pub struct FeatureFlagService {
    flags: Arc<dyn FeatureFlagStore>,
    audit: AuditService,
    timeout: Duration,
}

impl FeatureFlagService {
    pub fn new(flags: Arc<dyn FeatureFlagStore>, audit: AuditService, timeout: Duration) -> Self {
        Self {
            flags,
            audit,
            timeout,
        }
    }

    pub async fn list(&self, tenant_id: Uuid) -> Result<Vec<FeatureFlag>, ServiceError> {
        Ok(bounded(self.timeout, self.flags.list_flags(tenant_id)).await?)
    }

    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<FeatureFlag, ServiceError> {
        bounded(self.timeout, self.flags.get_flag(id))
            .await?
            .filter(|f| f.tenant_id == tenant_id)
            .ok_or(ServiceError::NotFound("Feature flag"))
    }

    #[tracing::instrument(skip(self, actor, req), fields(tenant_id = %actor.tenant_id, key = %req.key))]
    pub async fn create(
        &self,
        actor: &Actor,
        req: CreateFeatureFlagRequest,
    ) -> Result<FeatureFlag, ServiceError> {
        if bounded(
            self.timeout,
            self.flags.get_flag_by_key(actor.tenant_id, &req.key),
        )
        .await?
        .is_some()
        {
            return Err(ServiceError::Conflict(
                "Feature flag key already exists".to_string(),
            ));
        }

        let flag = FeatureFlag::new(
            actor.tenant_id,
            req.key,
            req.name,
            req.description,
            req.enabled,
            req.metadata.unwrap_or_else(|| serde_json::json!({})),
        );
        bounded(self.timeout, self.flags.create_flag(&flag)).await?;

        self.record(actor, AuditAction::Create, &flag, None);
        Ok(flag)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        req: UpdateFeatureFlagRequest,
    ) -> Result<FeatureFlag, ServiceError> {
        let mut flag = self.get(actor.tenant_id, id).await?;
        let before = snapshot(&flag);

        flag.name = req.name;
        flag.description = req.description;
        flag.enabled = req.enabled;
        if let Some(metadata) = req.metadata {
            flag.metadata = sqlx::types::Json(metadata);
        }
        flag.updated_at = Utc::now();
        bounded(self.timeout, self.flags.update_flag(&flag)).await?;

        self.record(actor, AuditAction::Update, &flag, before);
        Ok(flag)
    }

    pub async fn toggle(&self, actor: &Actor, id: Uuid) -> Result<FeatureFlag, ServiceError> {
        let mut flag = self.get(actor.tenant_id, id).await?;
        let before = snapshot(&flag);

        flag.enabled = !flag.enabled;
        flag.updated_at = Utc::now();
        bounded(self.timeout, self.flags.update_flag(&flag)).await?;

        tracing::info!(key = %flag.key, enabled = flag.enabled, "Feature flag toggled");
        self.record(actor, AuditAction::Toggle, &flag, before);
        Ok(flag)
    }

    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), ServiceError> {
        let flag = self.get(actor.tenant_id, id).await?;
        bounded(self.timeout, self.flags.delete_flag(flag.id)).await?;

        self.audit.record(
            AuditLog::new(actor.tenant_id, Some(actor.user_id), AuditAction::Delete, RESOURCE)
                .resource_id(flag.id)
                .client(&actor.client)
                .values(snapshot(&flag), None),
        );
        Ok(())
    }

    fn record(&self, actor: &Actor, action: AuditAction, flag: &FeatureFlag, before: Option<String>) {
        self.audit.record(
            AuditLog::new(actor.tenant_id, Some(actor.user_id), action, RESOURCE)
                .resource_id(flag.id)
                .client(&actor.client)
                .values(before, snapshot(flag)),
        );
    }
}

fn snapshot(flag: &FeatureFlag) -> Option<String> {
    serde_json::to_string(flag).ok()
}
