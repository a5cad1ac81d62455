//! AI alerts

use chrono::Utc;
use serde_json::json;

use super::{lookup, patch_object, DataSource, Entity, RepoError, Saved};
use crate::models::{AIAlert, AIAlertView};
use crate::remote::Order;
use crate::seed;

const SELECT: &str = "*,resolved_by_user:users(*)";

impl Entity for AIAlert {
    const TABLE: &'static str = "ai_alerts";
    const ID_PREFIX: &'static str = "alert";

    fn id(&self) -> &str {
        &self.id
    }

    fn seed() -> Vec<Self> {
        seed::ai_alerts()
    }
}

pub struct AlertsRepo<'a> {
    ds: &'a DataSource,
}

impl<'a> AlertsRepo<'a> {
    pub(crate) fn new(ds: &'a DataSource) -> Self {
        Self { ds }
    }

    pub async fn get_all(&self, online: bool) -> Vec<AIAlertView> {
        if online {
            if let Some(rows) = self.ds.fetch_remote(AIAlert::TABLE, SELECT, Order::desc("created_at")).await {
                return rows;
            }
        }

        let users = self.ds.users().directory();
        self.ds
            .local::<AIAlert>()
            .into_iter()
            .map(|alert| AIAlertView {
                resolved_by_user: lookup(&users, alert.resolved_by.as_deref()),
                alert,
            })
            .collect()
    }

    pub async fn mark_as_read(&self, id: &str, online: bool) -> Result<Saved<AIAlert>, RepoError> {
        let patch = patch_object(AIAlert::TABLE, &json!({ "is_read": true }), false)?;
        self.ds.patch::<AIAlert>(id, ("id", id), patch, online).await
    }

    pub async fn resolve(&self, id: &str, resolved_by: &str, online: bool) -> Result<Saved<AIAlert>, RepoError> {
        let patch = json!({
            "is_resolved": true,
            "resolved_by": resolved_by,
            "resolved_at": Utc::now().to_rfc3339(),
        });
        let patch = patch_object(AIAlert::TABLE, &patch, false)?;
        self.ds.patch::<AIAlert>(id, ("id", id), patch, online).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::test_support::*;

    #[tokio::test]
    async fn resolve_sets_resolver_and_joins_user() {
        let (_dir, ds) = offline_source();

        let read = ds.alerts().mark_as_read("alert-001", false).await.unwrap();
        assert!(read.record.is_read);
        assert!(!read.record.is_resolved);

        let resolved = ds.alerts().resolve("alert-001", "user-004", false).await.unwrap();
        assert!(resolved.record.is_resolved);
        assert!(resolved.record.resolved_at.is_some());

        let listed = ds.alerts().get_all(false).await;
        let alert = listed.iter().find(|v| v.alert.id == "alert-001").unwrap();
        assert_eq!(alert.resolved_by_user.as_ref().map(|u| u.name.as_str()), Some("Ana Oliveira"));
    }

    #[tokio::test]
    async fn alert_resolved_by_admin_joins_admin_user() {
        let (_dir, ds) = offline_source();
        ds.alerts().resolve("alert-001", "admin-001", false).await.unwrap();

        let listed = ds.alerts().get_all(false).await;
        let alert = listed.iter().find(|v| v.alert.id == "alert-001").unwrap();
        let resolver = alert.resolved_by_user.as_ref().unwrap();
        assert_eq!(resolver.id, "admin-001");
        assert_eq!(resolver.name, "Administrador");
    }

    #[tokio::test]
    async fn unknown_alert_is_not_found() {
        let (_dir, ds) = offline_source();
        let err = ds.alerts().mark_as_read("alert-404", false).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound { entity: "ai_alerts", .. }));
    }
}
