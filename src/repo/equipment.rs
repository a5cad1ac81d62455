//! Equipment

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{lookup, patch_object, DataSource, Entity, RepoError, Saved};
use crate::models::{Equipment, EquipmentStatus, EquipmentView, ProductionLine};
use crate::remote::Order;
use crate::{seed, validation};

const SELECT: &str = "*,production_line:production_lines(*)";

impl Entity for Equipment {
    const TABLE: &'static str = "equipment";
    const ID_PREFIX: &'static str = "eq";

    fn id(&self) -> &str {
        &self.id
    }

    fn seed() -> Vec<Self> {
        seed::equipment()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEquipment {
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub equipment_type: String,
    #[serde(default)]
    pub production_line_id: Option<String>,
    #[serde(default = "operational")]
    pub status: EquipmentStatus,
    #[serde(default)]
    pub last_maintenance: Option<NaiveDate>,
    #[serde(default)]
    pub next_maintenance: Option<NaiveDate>,
    #[serde(default)]
    pub specifications: Option<serde_json::Value>,
}

fn operational() -> EquipmentStatus {
    EquipmentStatus::Operational
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EquipmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EquipmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_line_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_maintenance: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_maintenance: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specifications: Option<serde_json::Value>,
}

pub struct EquipmentRepo<'a> {
    ds: &'a DataSource,
}

impl<'a> EquipmentRepo<'a> {
    pub(crate) fn new(ds: &'a DataSource) -> Self {
        Self { ds }
    }

    pub async fn get_all(&self, online: bool) -> Vec<EquipmentView> {
        if online {
            if let Some(rows) = self.ds.fetch_remote(Equipment::TABLE, SELECT, Order::asc("name")).await {
                return rows;
            }
        }

        let lines = self.ds.local::<ProductionLine>();
        self.ds
            .local::<Equipment>()
            .into_iter()
            .map(|equipment| EquipmentView {
                production_line: lookup(&lines, equipment.production_line_id.as_deref()),
                equipment,
            })
            .collect()
    }

    pub async fn create(&self, draft: NewEquipment, online: bool) -> Result<Saved<Equipment>, RepoError> {
        validation::required("name", &draft.name)?;
        validation::required("code", &draft.code)?;

        let now = Utc::now();
        let equipment = Equipment {
            id: self.ds.next_id::<Equipment>(),
            name: draft.name.trim().to_string(),
            code: draft.code.trim().to_string(),
            equipment_type: draft.equipment_type,
            production_line_id: draft.production_line_id,
            status: draft.status,
            last_maintenance: draft.last_maintenance,
            next_maintenance: draft.next_maintenance,
            specifications: draft.specifications,
            created_at: now,
            updated_at: now,
        };

        self.ds.insert(equipment, online).await
    }

    pub async fn update(&self, id: &str, patch: &EquipmentPatch, online: bool) -> Result<Saved<Equipment>, RepoError> {
        let patch = patch_object(Equipment::TABLE, patch, true)?;
        self.ds.patch::<Equipment>(id, ("id", id), patch, online).await
    }

    pub async fn delete(&self, id: &str, online: bool) -> Result<bool, RepoError> {
        self.ds.remove::<Equipment>(id, online).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::test_support::*;

    #[tokio::test]
    async fn status_change_is_mirrored_and_joined() {
        let (_dir, ds) = offline_source();
        let patch = EquipmentPatch { status: Some(EquipmentStatus::Broken), ..Default::default() };

        let saved = ds.equipment().update("eq-002", &patch, false).await.unwrap();
        assert_eq!(saved.record.status, EquipmentStatus::Broken);
        assert!(saved.record.updated_at >= saved.record.created_at);

        let listed = ds.equipment().get_all(false).await;
        let robot = listed.iter().find(|v| v.equipment.id == "eq-002").unwrap();
        assert_eq!(robot.equipment.status, EquipmentStatus::Broken);
        assert_eq!(robot.production_line.as_ref().map(|l| l.id.as_str()), Some("line-001"));
    }
}
