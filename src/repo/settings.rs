//! System settings

use chrono::Utc;
use serde_json::json;

use super::{patch_object, DataSource, Entity, RepoError, Saved};
use crate::models::SystemSetting;
use crate::remote::Order;
use crate::seed;

impl Entity for SystemSetting {
    const TABLE: &'static str = "system_settings";
    const ID_PREFIX: &'static str = "setting";

    fn id(&self) -> &str {
        &self.id
    }

    fn seed() -> Vec<Self> {
        seed::system_settings()
    }
}

pub struct SettingsRepo<'a> {
    ds: &'a DataSource,
}

impl<'a> SettingsRepo<'a> {
    pub(crate) fn new(ds: &'a DataSource) -> Self {
        Self { ds }
    }

    /// Ordered by category
    pub async fn get_all(&self, online: bool) -> Vec<SystemSetting> {
        if online {
            if let Some(rows) = self.ds.fetch_remote(SystemSetting::TABLE, "*", Order::asc("category")).await {
                return rows;
            }
        }
        self.ds.local::<SystemSetting>()
    }

    pub async fn get(&self, key: &str, online: bool) -> Option<SystemSetting> {
        self.get_all(online).await.into_iter().find(|s| s.key == key)
    }

    /// Change the value stored under `key`
    pub async fn update(
        &self,
        key: &str,
        value: &str,
        updated_by: &str,
        online: bool,
    ) -> Result<Saved<SystemSetting>, RepoError> {
        let setting = self.get(key, online).await.ok_or_else(|| RepoError::NotFound {
            entity: SystemSetting::TABLE,
            id: key.to_string(),
        })?;

        let patch = json!({
            "value": value,
            "updated_by": updated_by,
            "updated_at": Utc::now().to_rfc3339(),
        });
        let patch = patch_object(SystemSetting::TABLE, &patch, false)?;

        self.ds.patch::<SystemSetting>(&setting.id, ("key", key), patch, online).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::test_support::*;

    #[tokio::test]
    async fn update_by_key_persists_value() {
        let (_dir, ds) = offline_source();

        let saved = ds.settings().update("oee_target", "90", "admin-001", false).await.unwrap();
        assert_eq!(saved.record.id, "setting-002");
        assert_eq!(saved.record.updated_by.as_deref(), Some("admin-001"));

        let reread = ds.settings().get("oee_target", false).await.unwrap();
        assert_eq!(reread.value, "90");
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let (_dir, ds) = offline_source();
        let err = ds.settings().update("nope", "1", "admin-001", false).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound { id, .. } if id == "nope"));
    }
}
