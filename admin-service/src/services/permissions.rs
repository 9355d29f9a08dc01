//! Effective-permission resolution with a pluggable cache.
//!
//! A grant is the string `resource:action`. A request for `(r, a)` is
//! allowed by the literal grant `r:a`, by `r:*`, or by `*:*`. Nothing else
//! is treated as a wildcard.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::error::AuthError;
use super::store::{bounded, RoleStore};

pub const WILDCARD: &str = "*";

/// The grants a user holds through all of their roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    grants: HashSet<String>,
}

impl PermissionSet {
    pub fn new<I, S>(grants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            grants: grants.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, resource: &str, action: &str) -> bool {
        self.grants.contains(&format!("{resource}:{action}"))
            || self.grants.contains(&format!("{resource}:{WILDCARD}"))
            || self.grants.contains(&format!("{WILDCARD}:{WILDCARD}"))
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Grants in sorted order.
    pub fn to_sorted_vec(&self) -> Vec<String> {
        let mut grants: Vec<String> = self.grants.iter().cloned().collect();
        grants.sort();
        grants
    }
}

/// Per-user cache of resolved permission sets.
///
/// Every invalidation advances an epoch. `insert` carries the epoch observed
/// before the store read, and an implementation must not let a set resolved
/// before an invalidation outlive it.
#[async_trait]
pub trait PermissionCache: Send + Sync {
    async fn get(&self, user_id: Uuid) -> Option<Arc<PermissionSet>>;
    async fn insert(&self, user_id: Uuid, set: Arc<PermissionSet>, observed_epoch: u64);
    async fn invalidate(&self, user_id: Uuid);
    async fn invalidate_all(&self);
    fn epoch(&self) -> u64;
}

/// Process-local cache. Entries live until invalidated.
#[derive(Default)]
pub struct InMemoryPermissionCache {
    entries: DashMap<Uuid, Arc<PermissionSet>>,
    epoch: AtomicU64,
}

impl InMemoryPermissionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl PermissionCache for InMemoryPermissionCache {
    async fn get(&self, user_id: Uuid) -> Option<Arc<PermissionSet>> {
        self.entries.get(&user_id).map(|entry| entry.value().clone())
    }

    async fn insert(&self, user_id: Uuid, set: Arc<PermissionSet>, observed_epoch: u64) {
        if self.epoch.load(Ordering::Acquire) != observed_epoch {
            return;
        }
        self.entries.insert(user_id, set);
        // An invalidation may have landed between the check and the insert.
        if self.epoch.load(Ordering::Acquire) != observed_epoch {
            self.entries.remove(&user_id);
        }
    }

    async fn invalidate(&self, user_id: Uuid) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.entries.remove(&user_id);
    }

    async fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.entries.clear();
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }
}

/// Answers "may this user do this action on this resource".
#[derive(Clone)]
pub struct PermissionEvaluator {
    roles: Arc<dyn RoleStore>,
    cache: Arc<dyn PermissionCache>,
    timeout: Duration,
}

impl PermissionEvaluator {
    pub fn new(roles: Arc<dyn RoleStore>, cache: Arc<dyn PermissionCache>, timeout: Duration) -> Self {
        Self {
            roles,
            cache,
            timeout,
        }
    }

    /// Union of grants across the user's roles, served from cache when present.
    pub async fn effective_permissions(&self, user_id: Uuid) -> Result<Arc<PermissionSet>, AuthError> {
        if let Some(set) = self.cache.get(user_id).await {
            return Ok(set);
        }

        let epoch = self.cache.epoch();
        let permissions = bounded(self.timeout, self.roles.get_user_permissions(user_id)).await?;
        let set = Arc::new(PermissionSet::new(permissions.iter().map(|p| p.key())));

        tracing::debug!(%user_id, grants = set.len(), "Resolved effective permissions");
        self.cache.insert(user_id, set.clone(), epoch).await;
        Ok(set)
    }

    #[tracing::instrument(skip(self))]
    pub async fn has_permission(
        &self,
        user_id: Uuid,
        resource: &str,
        action: &str,
    ) -> Result<bool, AuthError> {
        let set = self.effective_permissions(user_id).await?;
        Ok(set.allows(resource, action))
    }

    /// Drop the cached set after the user's roles changed.
    pub async fn invalidate_permission_cache(&self, user_id: Uuid) {
        self.cache.invalidate(user_id).await;
    }

    /// Drop every cached set after a role's grants changed.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Permission, Role, User};
    use crate::services::store::{MemoryStore, UserStore};
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn wildcard_rules() {
        let admin = PermissionSet::new(["*:*"]);
        assert!(admin.allows("users", "read"));
        assert!(admin.allows("anything", "delete"));

        let users_all = PermissionSet::new(["users:*"]);
        assert!(users_all.allows("users", "delete"));
        assert!(!users_all.allows("roles", "read"));

        let literal = PermissionSet::new(["users:read"]);
        assert!(literal.allows("users", "read"));
        assert!(!literal.allows("users", "write"));

        // Only the action position of a resource grant is a wildcard.
        let odd = PermissionSet::new(["*:read"]);
        assert!(!odd.allows("users", "read"));

        assert!(!PermissionSet::default().allows("users", "read"));
    }

    struct Seeded {
        store: Arc<MemoryStore>,
        user_id: Uuid,
        role: Role,
        read: Permission,
        write: Permission,
    }

    async fn seeded() -> Seeded {
        let store = Arc::new(MemoryStore::new());
        let tenant = Uuid::new_v4();

        let read = Permission::new("users", "read");
        let write = Permission::new("users", "write");
        store.insert_permission(read.clone()).await;
        store.insert_permission(write.clone()).await;

        let role = Role::new(tenant, "reader".to_string(), "Reads users".to_string());
        store.create_role(&role).await.unwrap();
        store.set_role_permissions(role.id, &[read.id]).await.unwrap();

        let user = User::new(
            tenant,
            "reader@example.com",
            "hash".to_string(),
            "Re".to_string(),
            "Ader".to_string(),
        );
        store.create_user(&user).await.unwrap();
        store.set_user_roles(user.id, &[role.id]).await.unwrap();

        Seeded {
            store,
            user_id: user.id,
            role,
            read,
            write,
        }
    }

    #[tokio::test]
    async fn evaluator_reads_through_store() -> Result<(), anyhow::Error> {
        let s = seeded().await;
        let evaluator = PermissionEvaluator::new(
            s.store.clone(),
            Arc::new(InMemoryPermissionCache::new()),
            Duration::from_secs(1),
        );

        assert!(evaluator.has_permission(s.user_id, "users", "read").await?);
        assert!(!evaluator.has_permission(s.user_id, "users", "write").await?);
        assert!(!evaluator.has_permission(Uuid::new_v4(), "users", "read").await?);
        Ok(())
    }

    #[tokio::test]
    async fn stale_cache_survives_until_invalidated() -> Result<(), anyhow::Error> {
        let s = seeded().await;
        let evaluator = PermissionEvaluator::new(
            s.store.clone(),
            Arc::new(InMemoryPermissionCache::new()),
            Duration::from_secs(1),
        );

        assert!(!evaluator.has_permission(s.user_id, "users", "write").await?);

        s.store
            .set_role_permissions(s.role.id, &[s.read.id, s.write.id])
            .await?;
        assert!(!evaluator.has_permission(s.user_id, "users", "write").await?);

        evaluator.invalidate_all().await;
        assert!(evaluator.has_permission(s.user_id, "users", "write").await?);

        s.store.set_user_roles(s.user_id, &[]).await?;
        evaluator.invalidate_permission_cache(s.user_id).await;
        assert!(!evaluator.has_permission(s.user_id, "users", "read").await?);
        Ok(())
    }

    /// Counts store reads and can park one of them.
    struct CountingRoles {
        inner: Arc<MemoryStore>,
        reads: AtomicUsize,
        gate: tokio::sync::Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl RoleStore for CountingRoles {
        async fn get_user_permissions(
            &self,
            user_id: Uuid,
        ) -> crate::services::store::StoreResult<Vec<Permission>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let result = self.inner.get_user_permissions(user_id).await;
            let gate = self.gate.lock().await.take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            result
        }

        async fn get_user_roles(&self, user_id: Uuid) -> crate::services::store::StoreResult<Vec<Role>> {
            self.inner.get_user_roles(user_id).await
        }

        async fn set_user_roles(
            &self,
            user_id: Uuid,
            role_ids: &[Uuid],
        ) -> crate::services::store::StoreResult<()> {
            self.inner.set_user_roles(user_id, role_ids).await
        }

        async fn users_with_role(&self, role_id: Uuid) -> crate::services::store::StoreResult<Vec<Uuid>> {
            self.inner.users_with_role(role_id).await
        }

        async fn create_role(&self, role: &Role) -> crate::services::store::StoreResult<()> {
            self.inner.create_role(role).await
        }

        async fn get_role(&self, id: Uuid) -> crate::services::store::StoreResult<Option<Role>> {
            self.inner.get_role(id).await
        }

        async fn get_role_by_name(
            &self,
            tenant_id: Uuid,
            name: &str,
        ) -> crate::services::store::StoreResult<Option<Role>> {
            self.inner.get_role_by_name(tenant_id, name).await
        }

        async fn update_role(&self, role: &Role) -> crate::services::store::StoreResult<()> {
            self.inner.update_role(role).await
        }

        async fn delete_role(&self, id: Uuid) -> crate::services::store::StoreResult<()> {
            self.inner.delete_role(id).await
        }

        async fn list_roles(
            &self,
            params: &crate::models::ListParams,
        ) -> crate::services::store::StoreResult<(Vec<Role>, i64)> {
            self.inner.list_roles(params).await
        }

        async fn count_roles(&self, tenant_id: Uuid) -> crate::services::store::StoreResult<i64> {
            self.inner.count_roles(tenant_id).await
        }

        async fn get_role_permissions(
            &self,
            role_id: Uuid,
        ) -> crate::services::store::StoreResult<Vec<Permission>> {
            self.inner.get_role_permissions(role_id).await
        }

        async fn set_role_permissions(
            &self,
            role_id: Uuid,
            permission_ids: &[Uuid],
        ) -> crate::services::store::StoreResult<()> {
            self.inner.set_role_permissions(role_id, permission_ids).await
        }

        async fn list_permissions(&self) -> crate::services::store::StoreResult<Vec<Permission>> {
            self.inner.list_permissions().await
        }
    }

    #[tokio::test]
    async fn cache_hit_skips_the_store() -> Result<(), anyhow::Error> {
        let s = seeded().await;
        let roles = Arc::new(CountingRoles {
            inner: s.store.clone(),
            reads: AtomicUsize::new(0),
            gate: tokio::sync::Mutex::new(None),
        });
        let evaluator = PermissionEvaluator::new(
            roles.clone(),
            Arc::new(InMemoryPermissionCache::new()),
            Duration::from_secs(1),
        );

        for _ in 0..5 {
            assert!(evaluator.has_permission(s.user_id, "users", "read").await?);
        }
        assert_eq!(roles.reads.load(Ordering::SeqCst), 1);

        evaluator.invalidate_permission_cache(s.user_id).await;
        assert!(evaluator.has_permission(s.user_id, "users", "read").await?);
        assert_eq!(roles.reads.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn read_racing_an_invalidation_is_not_cached() -> Result<(), anyhow::Error> {
        let s = seeded().await;
        let (release, gate) = tokio::sync::oneshot::channel();
        let roles = Arc::new(CountingRoles {
            inner: s.store.clone(),
            reads: AtomicUsize::new(0),
            gate: tokio::sync::Mutex::new(Some(gate)),
        });
        let cache = Arc::new(InMemoryPermissionCache::new());
        let evaluator = PermissionEvaluator::new(roles.clone(), cache.clone(), Duration::from_secs(5));

        // The first read resolves the old grants, then parks.
        let slow = {
            let evaluator = evaluator.clone();
            let user_id = s.user_id;
            tokio::spawn(async move { evaluator.has_permission(user_id, "users", "read").await })
        };
        while roles.reads.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        s.store.set_user_roles(s.user_id, &[]).await?;
        evaluator.invalidate_permission_cache(s.user_id).await;
        let _ = release.send(());

        assert!(slow.await??);
        assert!(cache.is_empty());
        assert!(!evaluator.has_permission(s.user_id, "users", "read").await?);
        Ok(())
    }
}
