use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::audit::AuditService;
use super::error::ServiceError;
use super::permissions::PermissionEvaluator;
use super::sessions::SessionManager;
use super::store::{bounded, RoleStore, UserStore};
use crate::dtos::admin::{CreateUserRequest, ResetPasswordRequest, UpdateUserRequest};
use crate::models::{
    normalize_email, Actor, AuditAction, AuditLog, ListParams, Paginated, Role, User, UserResponse,
    UserStatus,
};
use crate::utils::{Password, PasswordHasherSet};

const RESOURCE: &str = "user";

/// Tenant-scoped user management. Every change to a user's roles or
/// standing flows through here so caches and sessions stay consistent.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    sessions: SessionManager,
    permissions: PermissionEvaluator,
    hashers: PasswordHasherSet,
    audit: AuditService,
    timeout: Duration,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
        sessions: SessionManager,
        permissions: PermissionEvaluator,
        hashers: PasswordHasherSet,
        audit: AuditService,
        timeout: Duration,
    ) -> Self {
        Self {
            users,
            roles,
            sessions,
            permissions,
            hashers,
            audit,
            timeout,
        }
    }

    #[tracing::instrument(skip(self, actor, req), fields(tenant_id = %actor.tenant_id))]
    pub async fn create(
        &self,
        actor: &Actor,
        req: CreateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        let email = normalize_email(&req.email);
        if bounded(self.timeout, self.users.get_user_by_email(&email))
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict("Email already exists".to_string()));
        }

        self.check_roles(actor.tenant_id, &req.role_ids).await?;

        let hash = self
            .hashers
            .hash_password_blocking(Password::new(req.password))
            .await
            .map_err(|e| ServiceError::Auth(e.into()))?;

        let user = User::new(
            actor.tenant_id,
            &email,
            hash.into_string(),
            req.first_name,
            req.last_name,
        );
        bounded(self.timeout, self.users.create_user(&user)).await?;

        if !req.role_ids.is_empty() {
            bounded(self.timeout, self.roles.set_user_roles(user.id, &req.role_ids)).await?;
        }

        let response = UserResponse::from(user);
        self.audit.record(
            AuditLog::new(actor.tenant_id, Some(actor.user_id), AuditAction::Create, RESOURCE)
                .resource_id(response.id)
                .client(&actor.client)
                .values(None, snapshot(&response)),
        );
        tracing::info!(user_id = %response.id, "User created");

        Ok(response)
    }

    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<UserResponse, ServiceError> {
        Ok(self.load(tenant_id, id).await?.into())
    }

    pub async fn list(&self, params: &ListParams) -> Result<Paginated<UserResponse>, ServiceError> {
        let (users, total) = bounded(self.timeout, self.users.list_users(params)).await?;
        Ok(Paginated::new(users, total, params).map(UserResponse::from))
    }

    #[tracing::instrument(skip(self, actor, req), fields(tenant_id = %actor.tenant_id))]
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        let mut user = self.load(actor.tenant_id, id).await?;
        let before = snapshot(&UserResponse::from(user.clone()));

        if let Some(email) = req.email {
            let email = normalize_email(&email);
            if email != user.email {
                let taken = bounded(self.timeout, self.users.get_user_by_email(&email)).await?;
                if taken.is_some_and(|other| other.id != user.id) {
                    return Err(ServiceError::Conflict("Email already exists".to_string()));
                }
                user.email = email;
            }
        }
        if let Some(first_name) = req.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = req.last_name {
            user.last_name = last_name;
        }
        let deactivated = match req.status {
            Some(status) => {
                user.status = status.as_str().to_string();
                status != UserStatus::Active
            }
            None => false,
        };

        if let Some(role_ids) = &req.role_ids {
            self.check_roles(actor.tenant_id, role_ids).await?;
        }

        user.updated_at = Utc::now();
        bounded(self.timeout, self.users.update_user(&user)).await?;

        if let Some(role_ids) = &req.role_ids {
            let assigned = bounded(self.timeout, self.roles.set_user_roles(user.id, role_ids)).await;
            // The write may have committed even when the call reports failure.
            self.permissions.invalidate_permission_cache(user.id).await;
            assigned?;
        }

        if deactivated {
            let revoked = self.sessions.revoke(user.id).await?;
            tracing::info!(user_id = %user.id, revoked, "Revoked sessions of deactivated user");
        }

        let response = UserResponse::from(user);
        self.audit.record(
            AuditLog::new(actor.tenant_id, Some(actor.user_id), AuditAction::Update, RESOURCE)
                .resource_id(response.id)
                .client(&actor.client)
                .values(before, snapshot(&response)),
        );

        Ok(response)
    }

    #[tracing::instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id))]
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), ServiceError> {
        if id == actor.user_id {
            return Err(ServiceError::ValidationError(
                "Cannot delete your own account".to_string(),
            ));
        }

        let user = self.load(actor.tenant_id, id).await?;

        self.sessions.revoke(user.id).await?;
        let deleted = bounded(self.timeout, self.users.delete_user(user.id)).await;
        self.permissions.invalidate_permission_cache(user.id).await;
        if !deleted? {
            return Err(ServiceError::NotFound("User"));
        }

        self.audit.record(
            AuditLog::new(actor.tenant_id, Some(actor.user_id), AuditAction::Delete, RESOURCE)
                .resource_id(user.id)
                .client(&actor.client)
                .values(snapshot(&UserResponse::from(user)), None),
        );

        Ok(())
    }

    #[tracing::instrument(skip(self, actor, req), fields(tenant_id = %actor.tenant_id))]
    pub async fn reset_password(
        &self,
        actor: &Actor,
        id: Uuid,
        req: ResetPasswordRequest,
    ) -> Result<(), ServiceError> {
        let user = self.load(actor.tenant_id, id).await?;

        let hash = self
            .hashers
            .hash_password_blocking(Password::new(req.new_password))
            .await
            .map_err(|e| ServiceError::Auth(e.into()))?;
        bounded(
            self.timeout,
            self.users.update_password_hash(user.id, hash.as_str()),
        )
        .await?;

        let revoked = self.sessions.revoke(user.id).await?;
        tracing::info!(user_id = %user.id, revoked, "Password reset");

        self.audit.record(
            AuditLog::new(
                actor.tenant_id,
                Some(actor.user_id),
                AuditAction::ResetPassword,
                RESOURCE,
            )
            .resource_id(user.id)
            .client(&actor.client),
        );

        Ok(())
    }

    pub async fn roles(&self, tenant_id: Uuid, id: Uuid) -> Result<Vec<Role>, ServiceError> {
        let user = self.load(tenant_id, id).await?;
        Ok(bounded(self.timeout, self.roles.get_user_roles(user.id)).await?)
    }

    /// Users of other tenants are indistinguishable from missing ones.
    async fn load(&self, tenant_id: Uuid, id: Uuid) -> Result<User, ServiceError> {
        bounded(self.timeout, self.users.get_user_by_id(id))
            .await?
            .filter(|u| u.tenant_id == tenant_id)
            .ok_or(ServiceError::NotFound("User"))
    }

    async fn check_roles(&self, tenant_id: Uuid, role_ids: &[Uuid]) -> Result<(), ServiceError> {
        for role_id in role_ids {
            let role = bounded(self.timeout, self.roles.get_role(*role_id)).await?;
            if !role.is_some_and(|r| r.tenant_id == tenant_id) {
                return Err(ServiceError::ValidationError(format!(
                    "Unknown role: {}",
                    role_id
                )));
            }
        }
        Ok(())
    }
}

fn snapshot<T: serde::Serialize>(value: &T) -> Option<String> {
    serde_json::to_string(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JwtConfig, PasswordConfig};
    use crate::models::{ClientInfo, Permission};
    use crate::services::permissions::InMemoryPermissionCache;
    use crate::services::store::MemoryStore;
    use crate::services::token::TokenEngine;
    use crate::utils::{Argon2Verifier, BcryptVerifier};

    struct Fixture {
        store: Arc<MemoryStore>,
        service: UserService,
        sessions: SessionManager,
        permissions: PermissionEvaluator,
        actor: Actor,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let timeout = Duration::from_secs(2);
        let tokens = TokenEngine::new(&JwtConfig {
            secret: "user-service-test-secret-0123456789abcdef".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        })
        .unwrap();
        let audit = AuditService::new(store.clone(), timeout);
        let sessions = SessionManager::new(
            store.clone(),
            store.clone(),
            tokens,
            audit.clone(),
            true,
            timeout,
        );
        let permissions =
            PermissionEvaluator::new(store.clone(), Arc::new(InMemoryPermissionCache::new()), timeout);
        let hashers = PasswordHasherSet::new(
            Arc::new(
                Argon2Verifier::new(&PasswordConfig {
                    argon2_memory_kib: 1024,
                    argon2_iterations: 1,
                    argon2_parallelism: 1,
                })
                .unwrap(),
            ),
            vec![Arc::new(BcryptVerifier::new(4))],
        )
        .unwrap();

        let service = UserService::new(
            store.clone(),
            store.clone(),
            sessions.clone(),
            permissions.clone(),
            hashers,
            audit,
            timeout,
        );

        Fixture {
            store,
            service,
            sessions,
            permissions,
            actor: Actor {
                user_id: Uuid::new_v4(),
                tenant_id: Uuid::new_v4(),
                client: ClientInfo::new("127.0.0.1", "tests"),
            },
        }
    }

    fn create_request(email: &str, role_ids: Vec<Uuid>) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            password: "password123".to_string(),
            first_name: "New".to_string(),
            last_name: "User".to_string(),
            role_ids,
        }
    }

    #[tokio::test]
    async fn create_lowercases_and_rejects_duplicates() -> Result<(), anyhow::Error> {
        let f = fixture().await;
        let created = f
            .service
            .create(&f.actor, create_request("Mixed@Example.com", vec![]))
            .await?;
        assert_eq!(created.email, "mixed@example.com");
        assert_eq!(created.status, "active");

        let stored = f.store.get_user_by_id(created.id).await?.unwrap();
        assert!(stored.password_hash.starts_with("$argon2id$"));

        let dup = f
            .service
            .create(&f.actor, create_request("mixed@EXAMPLE.com", vec![]))
            .await;
        assert!(matches!(dup, Err(ServiceError::Conflict(_))));
        Ok(())
    }

    #[tokio::test]
    async fn other_tenants_users_are_not_found() -> Result<(), anyhow::Error> {
        let f = fixture().await;
        let created = f
            .service
            .create(&f.actor, create_request("scoped@example.com", vec![]))
            .await?;

        let stranger = Uuid::new_v4();
        assert!(matches!(
            f.service.get(stranger, created.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(f.service.get(f.actor.tenant_id, created.id).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn changing_roles_invalidates_permissions() -> Result<(), anyhow::Error> {
        let f = fixture().await;
        let read = Permission::new("users", "read");
        f.store.insert_permission(read.clone()).await;
        let role = Role::new(f.actor.tenant_id, "reader".to_string(), String::new());
        f.store.create_role(&role).await?;
        f.store.set_role_permissions(role.id, &[read.id]).await?;

        let created = f
            .service
            .create(&f.actor, create_request("roles@example.com", vec![role.id]))
            .await?;
        assert!(f.permissions.has_permission(created.id, "users", "read").await?);

        f.service
            .update(
                &f.actor,
                created.id,
                UpdateUserRequest {
                    role_ids: Some(vec![]),
                    ..Default::default()
                },
            )
            .await?;
        assert!(!f.permissions.has_permission(created.id, "users", "read").await?);
        Ok(())
    }

    #[tokio::test]
    async fn foreign_role_ids_are_rejected() -> Result<(), anyhow::Error> {
        let f = fixture().await;
        let foreign = Role::new(Uuid::new_v4(), "elsewhere".to_string(), String::new());
        f.store.create_role(&foreign).await?;

        let result = f
            .service
            .create(&f.actor, create_request("foreign@example.com", vec![foreign.id]))
            .await;
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
        Ok(())
    }

    #[tokio::test]
    async fn suspending_revokes_sessions() -> Result<(), anyhow::Error> {
        let f = fixture().await;
        let created = f
            .service
            .create(&f.actor, create_request("suspend@example.com", vec![]))
            .await?;
        let user = f.store.get_user_by_id(created.id).await?.unwrap();
        let issued = f.sessions.create(&user, &ClientInfo::default()).await?;

        f.service
            .update(
                &f.actor,
                created.id,
                UpdateUserRequest {
                    status: Some(UserStatus::Suspended),
                    ..Default::default()
                },
            )
            .await?;

        let refresh = f
            .sessions
            .refresh(&issued.tokens.refresh_token, &ClientInfo::default())
            .await;
        assert!(refresh.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn cannot_delete_self_and_delete_removes_user() -> Result<(), anyhow::Error> {
        let f = fixture().await;
        let own = f.service.delete(&f.actor, f.actor.user_id).await;
        assert!(matches!(own, Err(ServiceError::ValidationError(_))));

        let created = f
            .service
            .create(&f.actor, create_request("gone@example.com", vec![]))
            .await?;
        f.service.delete(&f.actor, created.id).await?;
        assert!(f.store.get_user_by_id(created.id).await?.is_none());
        assert!(matches!(
            f.service.delete(&f.actor, created.id).await,
            Err(ServiceError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_replaces_hash_and_revokes() -> Result<(), anyhow::Error> {
        let f = fixture().await;
        let created = f
            .service
            .create(&f.actor, create_request("reset@example.com", vec![]))
            .await?;
        let user = f.store.get_user_by_id(created.id).await?.unwrap();
        let issued = f.sessions.create(&user, &ClientInfo::default()).await?;

        f.service
            .reset_password(
                &f.actor,
                created.id,
                ResetPasswordRequest {
                    new_password: "another-password".to_string(),
                },
            )
            .await?;

        let after = f.store.get_user_by_id(created.id).await?.unwrap();
        assert_ne!(after.password_hash, user.password_hash);
        assert!(f
            .store
            .sessions_for_user(created.id)
            .await
            .iter()
            .all(|s| s.is_revoked()));
        assert!(f
            .sessions
            .refresh(&issued.tokens.refresh_token, &ClientInfo::default())
            .await
            .is_err());
        Ok(())
    }
}
