use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::audit::AuditService;
use super::error::ServiceError;
use super::permissions::PermissionEvaluator;
use super::store::{bounded, RoleStore};
use crate::dtos::admin::{CreateRoleRequest, UpdateRoleRequest};
use crate::models::{
    Actor, AuditAction, AuditLog, ListParams, Paginated, Permission, Role, RoleWithPermissions,
};

const RESOURCE: &str = "role";

#[derive(Clone)]
pub struct RoleService {
    roles: Arc<dyn RoleStore>,
    permissions: PermissionEvaluator,
    audit: AuditService,
    timeout: Duration,
}

impl RoleService {
    pub fn new(
        roles: Arc<dyn RoleStore>,
        permissions: PermissionEvaluator,
        audit: AuditService,
        timeout: Duration,
    ) -> Self {
        Self {
            roles,
            permissions,
            audit,
            timeout,
        }
    }

    #[tracing::instrument(skip(self, actor, req), fields(tenant_id = %actor.tenant_id))]
    pub async fn create(
        &self,
        actor: &Actor,
        req: CreateRoleRequest,
    ) -> Result<RoleWithPermissions, ServiceError> {
        self.ensure_name_free(actor.tenant_id, &req.name, None).await?;
        self.check_permissions(&req.permission_ids).await?;

        let role = Role::new(actor.tenant_id, req.name, req.description);
        bounded(self.timeout, self.roles.create_role(&role)).await?;

        if !req.permission_ids.is_empty() {
            bounded(
                self.timeout,
                self.roles.set_role_permissions(role.id, &req.permission_ids),
            )
            .await?;
        }

        let created = self.with_permissions(role).await?;
        self.audit.record(
            AuditLog::new(actor.tenant_id, Some(actor.user_id), AuditAction::Create, RESOURCE)
                .resource_id(created.role.id)
                .client(&actor.client)
                .values(None, snapshot(&created)),
        );
        tracing::info!(role_id = %created.role.id, name = %created.role.name, "Role created");

        Ok(created)
    }

    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<RoleWithPermissions, ServiceError> {
        let role = self.load(tenant_id, id).await?;
        self.with_permissions(role).await
    }

    pub async fn list(&self, params: &ListParams) -> Result<Paginated<Role>, ServiceError> {
        let (roles, total) = bounded(self.timeout, self.roles.list_roles(params)).await?;
        Ok(Paginated::new(roles, total, params))
    }

    #[tracing::instrument(skip(self, actor, req), fields(tenant_id = %actor.tenant_id))]
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        req: UpdateRoleRequest,
    ) -> Result<RoleWithPermissions, ServiceError> {
        let mut role = self.load(actor.tenant_id, id).await?;
        if role.is_system {
            return Err(ServiceError::SystemRole("System roles cannot be modified"));
        }
        let before = snapshot(&role);

        if let Some(name) = req.name {
            if name != role.name {
                self.ensure_name_free(actor.tenant_id, &name, Some(role.id)).await?;
                role.name = name;
            }
        }
        if let Some(description) = req.description {
            role.description = description;
        }
        if let Some(permission_ids) = &req.permission_ids {
            self.check_permissions(permission_ids).await?;
        }

        // Holders are read before any write so a failed lookup changes nothing.
        let holders = match &req.permission_ids {
            Some(_) => bounded(self.timeout, self.roles.users_with_role(role.id)).await?,
            None => Vec::new(),
        };

        role.updated_at = Utc::now();
        bounded(self.timeout, self.roles.update_role(&role)).await?;

        if let Some(permission_ids) = &req.permission_ids {
            let granted = bounded(
                self.timeout,
                self.roles.set_role_permissions(role.id, permission_ids),
            )
            .await;
            self.invalidate_holders(role.id, &holders, granted.is_ok()).await;
            granted?;
        }

        let updated = self.with_permissions(role).await?;
        self.audit.record(
            AuditLog::new(actor.tenant_id, Some(actor.user_id), AuditAction::Update, RESOURCE)
                .resource_id(updated.role.id)
                .client(&actor.client)
                .values(before, snapshot(&updated)),
        );

        Ok(updated)
    }

    #[tracing::instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id))]
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), ServiceError> {
        let role = self.load(actor.tenant_id, id).await?;
        if role.is_system {
            return Err(ServiceError::SystemRole("System roles cannot be deleted"));
        }

        let holders = bounded(self.timeout, self.roles.users_with_role(role.id)).await?;
        let deleted = bounded(self.timeout, self.roles.delete_role(role.id)).await;
        self.invalidate_holders(role.id, &holders, deleted.is_ok()).await;
        deleted?;

        self.audit.record(
            AuditLog::new(actor.tenant_id, Some(actor.user_id), AuditAction::Delete, RESOURCE)
                .resource_id(role.id)
                .client(&actor.client)
                .values(snapshot(&role), None),
        );
        tracing::info!(role_id = %role.id, holders = holders.len(), "Role deleted");

        Ok(())
    }

    pub async fn permissions_of(&self, tenant_id: Uuid, id: Uuid) -> Result<Vec<Permission>, ServiceError> {
        let role = self.load(tenant_id, id).await?;
        Ok(bounded(self.timeout, self.roles.get_role_permissions(role.id)).await?)
    }

    pub async fn all_permissions(&self) -> Result<Vec<Permission>, ServiceError> {
        Ok(bounded(self.timeout, self.roles.list_permissions()).await?)
    }

    async fn load(&self, tenant_id: Uuid, id: Uuid) -> Result<Role, ServiceError> {
        bounded(self.timeout, self.roles.get_role(id))
            .await?
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or(ServiceError::NotFound("Role"))
    }

    async fn with_permissions(&self, role: Role) -> Result<RoleWithPermissions, ServiceError> {
        let permissions = bounded(self.timeout, self.roles.get_role_permissions(role.id)).await?;
        Ok(RoleWithPermissions { role, permissions })
    }

    async fn ensure_name_free(
        &self,
        tenant_id: Uuid,
        name: &str,
        except: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let existing = bounded(self.timeout, self.roles.get_role_by_name(tenant_id, name)).await?;
        match existing {
            Some(role) if Some(role.id) != except => {
                Err(ServiceError::Conflict("Role name already exists".to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn check_permissions(&self, permission_ids: &[Uuid]) -> Result<(), ServiceError> {
        if permission_ids.is_empty() {
            return Ok(());
        }
        let known = bounded(self.timeout, self.roles.list_permissions()).await?;
        if let Some(unknown) = permission_ids
            .iter()
            .find(|id| !known.iter().any(|p| p.id == **id))
        {
            return Err(ServiceError::ValidationError(format!(
                "Unknown permission: {}",
                unknown
            )));
        }
        Ok(())
    }

    /// A role's grants changed: every holder's cached set is stale.
    ///
    /// When the write reported failure it may still have committed, and the
    /// holder list may have moved since it was read, so the whole cache goes.
    async fn invalidate_holders(&self, role_id: Uuid, holders: &[Uuid], write_succeeded: bool) {
        if !write_succeeded {
            tracing::warn!(%role_id, "Role grant write failed; dropping every cached permission set");
            self.permissions.invalidate_all().await;
            return;
        }
        for user_id in holders {
            self.permissions.invalidate_permission_cache(*user_id).await;
        }
        tracing::debug!(%role_id, holders = holders.len(), "Invalidated permission caches");
    }
}

fn snapshot<T: serde::Serialize>(value: &T) -> Option<String> {
    serde_json::to_string(value).ok()
}
