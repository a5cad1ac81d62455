//! Maintenance orders

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{lookup, patch_object, DataSource, Entity, RepoError, Saved};
use crate::models::{
    document_number, round2, Equipment, MaintenanceOrder, MaintenanceOrderView, MaintenanceStatus,
    MaintenanceType, Priority,
};
use crate::remote::Order;
use crate::{seed, validation};

const SELECT: &str =
    "*,equipment:equipment(*),assigned_user:users!assigned_to(*),created_by_user:users!created_by(*)";

impl Entity for MaintenanceOrder {
    const TABLE: &'static str = "maintenance_orders";
    const ID_PREFIX: &'static str = "mo";

    fn id(&self) -> &str {
        &self.id
    }

    fn seed() -> Vec<Self> {
        seed::maintenance_orders()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMaintenanceOrder {
    /// Generated as `MO-YYYYMMDD-NNNN` when absent
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub equipment_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: MaintenanceType,
    #[serde(default)]
    pub priority: Priority,
    pub description: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl NewMaintenanceOrder {
    pub fn new(kind: MaintenanceType, description: impl Into<String>) -> Self {
        Self {
            order_number: None,
            equipment_id: None,
            kind,
            priority: Priority::Normal,
            description: description.into(),
            assigned_to: None,
            scheduled_date: None,
            estimated_hours: None,
            created_by: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintenancePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MaintenanceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceStats {
    pub total: usize,
    pub open: usize,
    pub in_progress: usize,
    pub completed: usize,
    /// Mean actual hours over completed orders
    pub avg_hours: f64,
    pub total_cost: f64,
}

impl MaintenanceStats {
    pub fn from_orders<'o>(orders: impl IntoIterator<Item = &'o MaintenanceOrder>) -> Self {
        let mut stats = MaintenanceStats {
            total: 0,
            open: 0,
            in_progress: 0,
            completed: 0,
            avg_hours: 0.0,
            total_cost: 0.0,
        };
        let mut hours = 0.0;

        for order in orders {
            stats.total += 1;
            hours += order.actual_hours.unwrap_or(0.0);
            stats.total_cost += order.cost.unwrap_or(0.0);
            match order.status {
                MaintenanceStatus::Open => stats.open += 1,
                MaintenanceStatus::InProgress => stats.in_progress += 1,
                MaintenanceStatus::Completed => stats.completed += 1,
                MaintenanceStatus::Cancelled => {}
            }
        }

        if stats.completed > 0 {
            stats.avg_hours = round2(hours / stats.completed as f64);
        }
        stats
    }
}

pub struct MaintenanceRepo<'a> {
    ds: &'a DataSource,
}

impl<'a> MaintenanceRepo<'a> {
    pub(crate) fn new(ds: &'a DataSource) -> Self {
        Self { ds }
    }

    pub async fn get_all(&self, online: bool) -> Vec<MaintenanceOrderView> {
        if online {
            if let Some(rows) = self.ds.fetch_remote(MaintenanceOrder::TABLE, SELECT, Order::desc("created_at")).await {
                return rows;
            }
        }

        let equipment = self.ds.local::<Equipment>();
        let users = self.ds.users().directory();

        self.ds
            .local::<MaintenanceOrder>()
            .into_iter()
            .map(|order| MaintenanceOrderView {
                equipment: lookup(&equipment, order.equipment_id.as_deref()),
                assigned_user: lookup(&users, order.assigned_to.as_deref()),
                created_by_user: lookup(&users, order.created_by.as_deref()),
                order,
            })
            .collect()
    }

    pub async fn create(&self, draft: NewMaintenanceOrder, online: bool) -> Result<Saved<MaintenanceOrder>, RepoError> {
        validation::required("description", &draft.description)?;
        if let Some(number) = &draft.order_number {
            validation::required("order_number", number)?;
        }

        let now = Utc::now();
        let order = MaintenanceOrder {
            id: self.ds.next_id::<MaintenanceOrder>(),
            order_number: draft.order_number.unwrap_or_else(|| document_number("MO", now)),
            equipment_id: draft.equipment_id.filter(|id| !id.is_empty()),
            kind: draft.kind,
            priority: draft.priority,
            status: MaintenanceStatus::Open,
            description: draft.description.trim().to_string(),
            assigned_to: draft.assigned_to.filter(|id| !id.is_empty()),
            scheduled_date: draft.scheduled_date,
            started_at: None,
            completed_at: None,
            estimated_hours: draft.estimated_hours,
            actual_hours: None,
            cost: None,
            parts_used: None,
            notes: None,
            created_by: draft.created_by,
            created_at: now,
            updated_at: now,
        };

        self.ds.insert(order, online).await
    }

    pub async fn update(&self, id: &str, patch: &MaintenancePatch, online: bool) -> Result<Saved<MaintenanceOrder>, RepoError> {
        let patch = patch_object(MaintenanceOrder::TABLE, patch, true)?;
        self.ds.patch::<MaintenanceOrder>(id, ("id", id), patch, online).await
    }

    pub async fn delete(&self, id: &str, online: bool) -> Result<bool, RepoError> {
        self.ds.remove::<MaintenanceOrder>(id, online).await
    }

    pub async fn stats(&self, online: bool) -> MaintenanceStats {
        let orders = self.get_all(online).await;
        MaintenanceStats::from_orders(orders.iter().map(|v| &v.order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::test_support::*;

    #[tokio::test]
    async fn offline_list_resolves_equipment_and_users() {
        let (_dir, ds) = offline_source();
        let orders = ds.maintenance().get_all(false).await;

        let belt = orders.iter().find(|v| v.order.id == "mo-001").unwrap();
        assert_eq!(belt.equipment.as_ref().map(|e| e.code.as_str()), Some("EMB-001"));
        assert_eq!(belt.assigned_user.as_ref().map(|u| u.id.as_str()), Some("user-005"));
        assert_eq!(belt.created_by_user.as_ref().map(|u| u.id.as_str()), Some("user-002"));
    }

    #[tokio::test]
    async fn create_requires_description_and_opens_order() {
        let (_dir, ds) = offline_source();
        let err = ds
            .maintenance()
            .create(NewMaintenanceOrder::new(MaintenanceType::Corrective, ""), false)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));

        let saved = ds
            .maintenance()
            .create(NewMaintenanceOrder::new(MaintenanceType::Preventive, "Lubrificação"), false)
            .await
            .unwrap();
        assert_eq!(saved.record.status, MaintenanceStatus::Open);
        assert!(saved.record.order_number.starts_with("MO-"));
    }

    #[tokio::test]
    async fn completing_an_order_moves_stats() {
        let (_dir, ds) = offline_source();
        let before = ds.maintenance().stats(false).await;
        assert_eq!(before.completed, 1);
        assert_eq!(before.avg_hours, 1.0);
        assert_eq!(before.total_cost, 150.0);

        let patch = MaintenancePatch {
            status: Some(MaintenanceStatus::Completed),
            actual_hours: Some(4.5),
            cost: Some(320.0),
            ..Default::default()
        };
        ds.maintenance().update("mo-001", &patch, false).await.unwrap();

        let after = ds.maintenance().stats(false).await;
        assert_eq!(after.completed, 2);
        assert_eq!(after.in_progress, 0);
        assert_eq!(after.avg_hours, 2.75);
        assert_eq!(after.total_cost, 470.0);
    }
}
