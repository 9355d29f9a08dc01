//! In-process implementation of the store traits.
//!
//! All state sits behind one `tokio::sync::RwLock`, so multi-row writes
//! (session rotation, role replacement) are atomic with respect to each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AuditStore, FeatureFlagStore, RoleStore, SessionStore, StoreError, StoreResult, UserStore,
};
use crate::models::{
    AuditLog, FeatureFlag, ListParams, Permission, Role, Session, SessionRotation, User,
};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Role>,
    permissions: HashMap<Uuid, Permission>,
    user_roles: HashSet<(Uuid, Uuid)>,
    role_permissions: HashSet<(Uuid, Uuid)>,
    sessions: HashMap<Uuid, Session>,
    audit: Vec<AuditLog>,
    flags: HashMap<Uuid, FeatureFlag>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a global permission. Permissions are seeded, never created through the API.
    pub async fn insert_permission(&self, permission: Permission) {
        self.state
            .write()
            .await
            .permissions
            .insert(permission.id, permission);
    }

    /// Sessions currently held for a user, any state.
    pub async fn sessions_for_user(&self, user_id: Uuid) -> Vec<Session> {
        self.state
            .read()
            .await
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Overwrite a stored session as-is.
    pub async fn put_session(&self, session: Session) {
        self.state.write().await.sessions.insert(session.id, session);
    }

    pub async fn audit_entries(&self) -> Vec<AuditLog> {
        self.state.read().await.audit.clone()
    }
}

fn paginate<T: Clone>(items: Vec<T>, params: &ListParams) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let page = items
        .into_iter()
        .skip(params.offset().max(0) as usize)
        .take(params.per_page.max(0) as usize)
        .collect();
    (page, total)
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(user) = self.state.write().await.users.get_mut(&id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        if let Some(user) = self.state.write().await.users.get_mut(&id) {
            user.password_hash = password_hash.to_string();
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn create_user(&self, user: &User) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("users.email = {}", user.email)));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::Conflict(format!("users.email = {}", user.email)));
        }
        if let Some(existing) = state.users.get_mut(&user.id) {
            existing.email = user.email.clone();
            existing.first_name = user.first_name.clone();
            existing.last_name = user.last_name.clone();
            existing.status = user.status.clone();
            existing.updated_at = user.updated_at;
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        state.user_roles.retain(|(user_id, _)| *user_id != id);
        Ok(state.users.remove(&id).is_some())
    }

    async fn list_users(&self, params: &ListParams) -> StoreResult<(Vec<User>, i64)> {
        let state = self.state.read().await;
        let search = params.search_lower();
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| u.tenant_id == params.tenant_id)
            .filter(|u| params.status.as_ref().map_or(true, |s| &u.status == s))
            .filter(|u| {
                search.as_deref().map_or(true, |q| {
                    contains(&u.email, q) || contains(&u.first_name, q) || contains(&u.last_name, q)
                })
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(users, params))
    }

    async fn count_users_by_status(&self, tenant_id: Uuid) -> StoreResult<HashMap<String, i64>> {
        let state = self.state.read().await;
        let mut counts = HashMap::new();
        for user in state.users.values().filter(|u| u.tenant_id == tenant_id) {
            *counts.entry(user.status.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn get_user_permissions(&self, user_id: Uuid) -> StoreResult<Vec<Permission>> {
        let state = self.state.read().await;
        let permission_ids: HashSet<Uuid> = state
            .user_roles
            .iter()
            .filter(|(u, _)| *u == user_id)
            .flat_map(|(_, role_id)| {
                state
                    .role_permissions
                    .iter()
                    .filter(move |(r, _)| r == role_id)
                    .map(|(_, p)| *p)
            })
            .collect();
        Ok(permission_ids
            .iter()
            .filter_map(|id| state.permissions.get(id).cloned())
            .collect())
    }

    async fn get_user_roles(&self, user_id: Uuid) -> StoreResult<Vec<Role>> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state
            .user_roles
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, r)| state.roles.get(r).cloned())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn set_user_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.user_roles.retain(|(u, _)| *u != user_id);
        for role_id in role_ids {
            state.user_roles.insert((user_id, *role_id));
        }
        Ok(())
    }

    async fn users_with_role(&self, role_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .user_roles
            .iter()
            .filter(|(_, r)| *r == role_id)
            .map(|(u, _)| *u)
            .collect())
    }

    async fn create_role(&self, role: &Role) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state
            .roles
            .values()
            .any(|r| r.tenant_id == role.tenant_id && r.name == role.name)
        {
            return Err(StoreError::Conflict(format!("roles.name = {}", role.name)));
        }
        state.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn get_role(&self, id: Uuid) -> StoreResult<Option<Role>> {
        Ok(self.state.read().await.roles.get(&id).cloned())
    }

    async fn get_role_by_name(&self, tenant_id: Uuid, name: &str) -> StoreResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state
            .roles
            .values()
            .find(|r| r.tenant_id == tenant_id && r.name == name)
            .cloned())
    }

    async fn update_role(&self, role: &Role) -> StoreResult<()> {
        if let Some(existing) = self.state.write().await.roles.get_mut(&role.id) {
            existing.name = role.name.clone();
            existing.description = role.description.clone();
            existing.updated_at = role.updated_at;
        }
        Ok(())
    }

    async fn delete_role(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.user_roles.retain(|(_, r)| *r != id);
        state.role_permissions.retain(|(r, _)| *r != id);
        state.roles.remove(&id);
        Ok(())
    }

    async fn list_roles(&self, params: &ListParams) -> StoreResult<(Vec<Role>, i64)> {
        let state = self.state.read().await;
        let search = params.search_lower();
        let mut roles: Vec<Role> = state
            .roles
            .values()
            .filter(|r| r.tenant_id == params.tenant_id)
            .filter(|r| {
                search
                    .as_deref()
                    .map_or(true, |q| contains(&r.name, q) || contains(&r.description, q))
            })
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(roles, params))
    }

    async fn count_roles(&self, tenant_id: Uuid) -> StoreResult<i64> {
        let state = self.state.read().await;
        Ok(state.roles.values().filter(|r| r.tenant_id == tenant_id).count() as i64)
    }

    async fn get_role_permissions(&self, role_id: Uuid) -> StoreResult<Vec<Permission>> {
        let state = self.state.read().await;
        let mut permissions: Vec<Permission> = state
            .role_permissions
            .iter()
            .filter(|(r, _)| *r == role_id)
            .filter_map(|(_, p)| state.permissions.get(p).cloned())
            .collect();
        permissions.sort_by(|a, b| (&a.resource, &a.action).cmp(&(&b.resource, &b.action)));
        Ok(permissions)
    }

    async fn set_role_permissions(&self, role_id: Uuid, permission_ids: &[Uuid]) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.role_permissions.retain(|(r, _)| *r != role_id);
        for permission_id in permission_ids {
            state.role_permissions.insert((role_id, *permission_id));
        }
        Ok(())
    }

    async fn list_permissions(&self) -> StoreResult<Vec<Permission>> {
        let state = self.state.read().await;
        let mut permissions: Vec<Permission> = state.permissions.values().cloned().collect();
        permissions.sort_by(|a, b| (&a.resource, &a.action).cmp(&(&b.resource, &b.action)));
        Ok(permissions)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session: &Session) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state
            .sessions
            .values()
            .any(|s| s.refresh_token_hash == session.refresh_token_hash)
        {
            return Err(StoreError::Conflict("sessions.refresh_token_hash".to_string()));
        }
        state.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session_by_token(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        let state = self.state.read().await;
        Ok(state
            .sessions
            .values()
            .find(|s| s.refresh_token_hash == token_hash)
            .cloned())
    }

    async fn rotate_session(&self, rotation: &SessionRotation) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        match state.sessions.get_mut(&rotation.current_id) {
            Some(current)
                if current.refresh_token_hash == rotation.current_token_hash
                    && current.rotated_at.is_none()
                    && current.revoked_at.is_none() =>
            {
                current.rotated_at = Some(rotation.rotated_at);
                current.replaced_by_token_hash =
                    Some(rotation.successor.refresh_token_hash.clone());
            }
            _ => return Ok(false),
        }
        state
            .sessions
            .insert(rotation.successor.id, rotation.successor.clone());
        Ok(true)
    }

    async fn revoke_session(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(session) = self.state.write().await.sessions.get_mut(&id) {
            session.revoked_at.get_or_insert(at);
        }
        Ok(())
    }

    async fn revoke_user_sessions(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let mut revoked = 0;
        for session in state
            .sessions
            .values_mut()
            .filter(|s| s.user_id == user_id && s.revoked_at.is_none())
        {
            session.revoked_at = Some(at);
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.expires_at > now);
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn log_audit_event(&self, entry: &AuditLog) -> StoreResult<()> {
        self.state.write().await.audit.push(entry.clone());
        Ok(())
    }

    async fn list_audit_logs(&self, params: &ListParams) -> StoreResult<(Vec<AuditLog>, i64)> {
        let state = self.state.read().await;
        let search = params.search_lower();
        let mut logs: Vec<AuditLog> = state
            .audit
            .iter()
            .filter(|l| l.tenant_id == params.tenant_id)
            .filter(|l| params.action.as_ref().map_or(true, |a| &l.action == a))
            .filter(|l| params.resource.as_ref().map_or(true, |r| &l.resource == r))
            .filter(|l| {
                search
                    .as_deref()
                    .map_or(true, |q| contains(&l.action, q) || contains(&l.resource, q))
            })
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(logs, params))
    }

    async fn count_recent_logins(&self, tenant_id: Uuid, since: DateTime<Utc>) -> StoreResult<i64> {
        let state = self.state.read().await;
        Ok(state
            .audit
            .iter()
            .filter(|l| l.tenant_id == tenant_id && l.action == "login" && l.created_at >= since)
            .count() as i64)
    }

    async fn recent_activity(&self, tenant_id: Uuid, limit: i64) -> StoreResult<Vec<AuditLog>> {
        let state = self.state.read().await;
        let mut logs: Vec<AuditLog> = state
            .audit
            .iter()
            .filter(|l| l.tenant_id == tenant_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        logs.truncate(limit.max(0) as usize);
        Ok(logs)
    }
}

#[async_trait]
impl FeatureFlagStore for MemoryStore {
    async fn list_flags(&self, tenant_id: Uuid) -> StoreResult<Vec<FeatureFlag>> {
        let state = self.state.read().await;
        let mut flags: Vec<FeatureFlag> = state
            .flags
            .values()
            .filter(|f| f.tenant_id == tenant_id)
            .cloned()
            .collect();
        flags.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(flags)
    }

    async fn get_flag(&self, id: Uuid) -> StoreResult<Option<FeatureFlag>> {
        Ok(self.state.read().await.flags.get(&id).cloned())
    }

    async fn get_flag_by_key(&self, tenant_id: Uuid, key: &str) -> StoreResult<Option<FeatureFlag>> {
        let state = self.state.read().await;
        Ok(state
            .flags
            .values()
            .find(|f| f.tenant_id == tenant_id && f.key == key)
            .cloned())
    }

    async fn create_flag(&self, flag: &FeatureFlag) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state
            .flags
            .values()
            .any(|f| f.tenant_id == flag.tenant_id && f.key == flag.key)
        {
            return Err(StoreError::Conflict(format!("feature_flags.key = {}", flag.key)));
        }
        state.flags.insert(flag.id, flag.clone());
        Ok(())
    }

    async fn update_flag(&self, flag: &FeatureFlag) -> StoreResult<()> {
        if let Some(existing) = self.state.write().await.flags.get_mut(&flag.id) {
            existing.name = flag.name.clone();
            existing.description = flag.description.clone();
            existing.enabled = flag.enabled;
            existing.metadata = flag.metadata.clone();
            existing.updated_at = flag.updated_at;
        }
        Ok(())
    }

    async fn delete_flag(&self, id: Uuid) -> StoreResult<()> {
        self.state.write().await.flags.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(user_id: Uuid, hash: &str) -> Session {
        Session::new(
            user_id,
            hash.to_string(),
            Duration::days(1),
            "127.0.0.1".to_string(),
            "test".to_string(),
        )
    }

    #[tokio::test]
    async fn rotation_is_compare_and_set() -> Result<(), anyhow::Error> {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let current = session(user_id, "old");
        store.create_session(&current).await?;

        let rotation = SessionRotation {
            current_id: current.id,
            current_token_hash: "old".to_string(),
            successor: session(user_id, "new"),
            rotated_at: Utc::now(),
        };
        assert!(store.rotate_session(&rotation).await?);

        let second = SessionRotation {
            successor: session(user_id, "newer"),
            ..rotation
        };
        assert!(!store.rotate_session(&second).await?);
        assert!(store.get_session_by_token("newer").await?.is_none());

        let old = store.get_session_by_token("old").await?.unwrap();
        assert_eq!(old.replaced_by_token_hash.as_deref(), Some("new"));
        Ok(())
    }

    #[tokio::test]
    async fn purge_only_removes_expired_rows() -> Result<(), anyhow::Error> {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let mut expired = session(user_id, "expired");
        expired.expires_at = Utc::now() - Duration::minutes(1);
        store.create_session(&expired).await?;
        store.create_session(&session(user_id, "live")).await?;

        assert_eq!(store.purge_expired(Utc::now()).await?, 1);
        assert!(store.get_session_by_token("live").await?.is_some());
        assert!(store.get_session_by_token("expired").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn user_permissions_are_a_distinct_union() -> Result<(), anyhow::Error> {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let read = Permission::new("users", "read");
        let write = Permission::new("users", "update");
        store.insert_permission(read.clone()).await;
        store.insert_permission(write.clone()).await;

        let viewer = Role::new(tenant, "viewer".to_string(), String::new());
        let editor = Role::new(tenant, "editor".to_string(), String::new());
        store.create_role(&viewer).await?;
        store.create_role(&editor).await?;
        store.set_role_permissions(viewer.id, &[read.id]).await?;
        store.set_role_permissions(editor.id, &[read.id, write.id]).await?;

        let user_id = Uuid::new_v4();
        store.set_user_roles(user_id, &[viewer.id, editor.id]).await?;

        let mut keys: Vec<String> = store
            .get_user_permissions(user_id)
            .await?
            .iter()
            .map(Permission::key)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["users:read", "users:update"]);
        Ok(())
    }
}
