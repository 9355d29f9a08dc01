use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::error::ServiceError;
use super::store::{bounded, AuditStore, RoleStore, UserStore};
use crate::dtos::admin::{ActivityItem, DashboardStats};
use crate::models::UserStatus;

const RECENT_ACTIVITY_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct DashboardService {
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    audit: Arc<dyn AuditStore>,
    timeout: Duration,
}

impl DashboardService {
    pub fn new(
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
        audit: Arc<dyn AuditStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            users,
            roles,
            audit,
            timeout,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn stats(&self, tenant_id: Uuid) -> Result<DashboardStats, ServiceError> {
        let since = Utc::now() - chrono::Duration::hours(24);

        let (users_by_status, total_roles, recent_logins, recent) = tokio::try_join!(
            bounded(self.timeout, self.users.count_users_by_status(tenant_id)),
            bounded(self.timeout, self.roles.count_roles(tenant_id)),
            bounded(self.timeout, self.audit.count_recent_logins(tenant_id, since)),
            bounded(
                self.timeout,
                self.audit.recent_activity(tenant_id, RECENT_ACTIVITY_LIMIT)
            ),
        )?;

        let total_users: i64 = users_by_status.values().sum();
        let active_users = users_by_status
            .get(UserStatus::Active.as_str())
            .copied()
            .unwrap_or(0);

        let mut emails: HashMap<Uuid, String> = HashMap::new();
        let mut recent_activity = Vec::with_capacity(recent.len());
        for entry in recent {
            let user_email = match entry.user_id {
                Some(user_id) => match emails.get(&user_id) {
                    Some(email) => email.clone(),
                    None => {
                        let email = bounded(self.timeout, self.users.get_user_by_id(user_id))
                            .await?
                            .map(|u| u.email)
                            .unwrap_or_default();
                        emails.insert(user_id, email.clone());
                        email
                    }
                },
                None => String::new(),
            };

            recent_activity.push(ActivityItem {
                action: entry.action,
                resource: entry.resource,
                user_email,
                created_at: entry.created_at,
            });
        }

        Ok(DashboardStats {
            total_users,
            active_users,
            total_roles,
            recent_logins,
            users_by_status,
            recent_activity,
        })
    }
}
