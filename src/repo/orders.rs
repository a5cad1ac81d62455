//! Production orders

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{lookup, patch_object, DataSource, Entity, RepoError, Saved};
use crate::models::{document_number, OrderStatus, Priority, ProductionLine, ProductionOrder, ProductionOrderView};
use crate::remote::Order;
use crate::{seed, validation};

const SELECT: &str = "*,production_line:production_lines(*),created_by_user:users(*)";

impl Entity for ProductionOrder {
    const TABLE: &'static str = "production_orders";
    const ID_PREFIX: &'static str = "po";

    fn id(&self) -> &str {
        &self.id
    }

    fn seed() -> Vec<Self> {
        seed::production_orders()
    }
}

/// Fields accepted when opening a production order
#[derive(Debug, Clone, Deserialize)]
pub struct NewProductionOrder {
    /// Generated as `OP-YYYYMMDD-NNNN` when absent
    #[serde(default)]
    pub order_number: Option<String>,
    pub product_name: String,
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default = "pending")]
    pub status: OrderStatus,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub production_line_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_duration: Option<u32>,
    #[serde(default)]
    pub created_by: Option<String>,
}

fn pending() -> OrderStatus {
    OrderStatus::Pending
}

fn one() -> u32 {
    1
}

impl NewProductionOrder {
    pub fn new(product_name: impl Into<String>, quantity: u32) -> Self {
        Self {
            order_number: None,
            product_name: product_name.into(),
            product_code: None,
            status: pending(),
            quantity,
            priority: Priority::Normal,
            production_line_id: None,
            start_date: None,
            estimated_duration: None,
            created_by: None,
        }
    }
}

/// Partial update of a production order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub produced_quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_line_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_duration: Option<u32>,
}

pub struct OrdersRepo<'a> {
    ds: &'a DataSource,
}

impl<'a> OrdersRepo<'a> {
    pub(crate) fn new(ds: &'a DataSource) -> Self {
        Self { ds }
    }

    /// Newest first, with line and creator resolved
    pub async fn get_all(&self, online: bool) -> Vec<ProductionOrderView> {
        if online {
            if let Some(rows) = self.ds.fetch_remote(ProductionOrder::TABLE, SELECT, Order::desc("created_at")).await {
                return rows;
            }
        }

        let lines = self.ds.local::<ProductionLine>();
        let users = self.ds.users().directory();

        self.ds
            .local::<ProductionOrder>()
            .into_iter()
            .map(|order| ProductionOrderView {
                production_line: lookup(&lines, order.production_line_id.as_deref()),
                created_by_user: lookup(&users, order.created_by.as_deref()),
                order,
            })
            .collect()
    }

    pub async fn create(&self, draft: NewProductionOrder, online: bool) -> Result<Saved<ProductionOrder>, RepoError> {
        validation::required("product_name", &draft.product_name)?;

        let now = Utc::now();
        let order = ProductionOrder {
            id: self.ds.next_id::<ProductionOrder>(),
            order_number: draft
                .order_number
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| document_number("OP", now)),
            product_name: draft.product_name.trim().to_string(),
            product_code: draft.product_code,
            status: draft.status,
            quantity: draft.quantity,
            produced_quantity: 0,
            priority: draft.priority,
            production_line_id: draft.production_line_id,
            start_date: draft.start_date,
            end_date: None,
            estimated_duration: draft.estimated_duration,
            actual_duration: None,
            created_by: draft.created_by,
            created_at: now,
            updated_at: now,
        };

        self.ds.insert(order, online).await
    }

    pub async fn update(&self, id: &str, patch: &OrderPatch, online: bool) -> Result<Saved<ProductionOrder>, RepoError> {
        let patch = patch_object(ProductionOrder::TABLE, patch, true)?;
        self.ds.patch::<ProductionOrder>(id, ("id", id), patch, online).await
    }

    /// Returns whether the delete only reached the local mirror
    pub async fn delete(&self, id: &str, online: bool) -> Result<bool, RepoError> {
        self.ds.remove::<ProductionOrder>(id, online).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::test_support::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn offline_list_resolves_line_and_creator() {
        let (_dir, ds) = offline_source();
        let orders = ds.orders().get_all(false).await;

        assert_eq!(orders.len(), 3);
        let alpha = &orders[0];
        assert_eq!(alpha.order.id, "po-001");
        assert_eq!(alpha.production_line.as_ref().map(|l| l.id.as_str()), Some("line-001"));
        assert_eq!(alpha.created_by_user.as_ref().map(|u| u.name.as_str()), Some("João Silva"));
    }

    #[tokio::test]
    async fn offline_create_prepends_to_mirror() {
        let (_dir, ds) = offline_source();
        let saved = ds.orders().create(NewProductionOrder::new("Produto Delta", 20), false).await.unwrap();

        assert!(saved.offline);
        assert!(saved.record.id.starts_with("po-"));
        assert!(saved.record.order_number.starts_with("OP-"));
        assert_eq!(saved.record.status, OrderStatus::Pending);

        let mirror = ds.local::<ProductionOrder>();
        assert_eq!(mirror.len(), 4);
        assert_eq!(mirror[0].id, saved.record.id);
    }

    #[tokio::test]
    async fn create_requires_product_name() {
        let (_dir, ds) = offline_source();
        let err = ds.orders().create(NewProductionOrder::new("  ", 1), false).await.unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    #[tokio::test]
    async fn failing_backend_still_persists_locally() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/rest/v1/production_orders").with_status(500).create_async().await;
        server.mock("PATCH", "/rest/v1/production_orders").match_query(Matcher::Any).with_status(500).create_async().await;
        server.mock("DELETE", "/rest/v1/production_orders").match_query(Matcher::Any).with_status(500).create_async().await;
        let (_dir, ds) = data_source(&server.url());

        let saved = ds.orders().create(NewProductionOrder::new("Produto Delta", 20), true).await.unwrap();
        assert!(saved.offline);

        let patch = OrderPatch { produced_quantity: Some(80), ..Default::default() };
        let updated = ds.orders().update("po-001", &patch, true).await.unwrap();
        assert!(updated.offline);
        assert_eq!(updated.record.produced_quantity, 80);

        let offline = ds.orders().delete("po-002", true).await.unwrap();
        assert!(offline);

        let mirror = ds.local::<ProductionOrder>();
        assert!(mirror.iter().any(|o| o.id == saved.record.id));
        assert!(mirror.iter().any(|o| o.id == "po-001" && o.produced_quantity == 80));
        assert!(!mirror.iter().any(|o| o.id == "po-002"));
    }

    #[tokio::test]
    async fn update_of_unknown_order_is_not_found() {
        let (_dir, ds) = offline_source();
        let err = ds.orders().update("po-999", &OrderPatch::default(), false).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound { id, .. } if id == "po-999"));
    }

    #[tokio::test]
    async fn online_list_comes_from_backend_and_is_backed_up() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!([{
            "id": "2c6a",
            "order_number": "OP-REMOTE",
            "product_name": "Remote",
            "status": "Pausada",
            "quantity": 5,
            "produced_quantity": 1,
            "priority": "Alta",
            "created_at": "2024-03-01T10:00:00+00:00",
            "updated_at": "2024-03-01T10:00:00+00:00",
            "production_line": null,
            "created_by_user": null
        }]);
        server
            .mock("GET", "/rest/v1/production_orders")
            .match_query(Matcher::UrlEncoded("order".into(), "created_at.desc".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;
        let (_dir, ds) = data_source(&server.url());

        let orders = ds.orders().get_all(true).await;

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order.status, OrderStatus::Paused);
        assert!(ds.store().exists("production_orders_backup"));
    }

    #[tokio::test]
    async fn online_create_mirrors_the_stored_row() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/production_orders")
            .match_header("prefer", "return=representation")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(serde_json::json!({
                "id": "9f1e",
                "order_number": "OP-1",
                "product_name": "Produto Delta",
                "status": "Pendente",
                "quantity": 20,
                "produced_quantity": 0,
                "priority": "Normal",
                "created_at": "2024-03-01T10:00:00+00:00",
                "updated_at": "2024-03-01T10:00:00+00:00"
            }).to_string())
            .create_async()
            .await;
        let (_dir, ds) = data_source(&server.url());

        let saved = ds.orders().create(NewProductionOrder::new("Produto Delta", 20), true).await.unwrap();

        assert!(!saved.offline);
        assert_eq!(saved.record.id, "9f1e");
        assert_eq!(ds.local::<ProductionOrder>()[0].id, "9f1e");
    }
}
