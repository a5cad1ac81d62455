//! Traceability records

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{lookup, DataSource, Entity, RepoError, Saved};
use crate::models::{Equipment, ProductionOrder, TraceabilityRecord, TraceabilityRecordView};
use crate::remote::Order;
use crate::{seed, validation};

const SELECT: &str = "*,production_order:production_orders(*),equipment:equipment(*),operator:users(*)";

impl Entity for TraceabilityRecord {
    const TABLE: &'static str = "traceability_records";
    const ID_PREFIX: &'static str = "tr";

    fn id(&self) -> &str {
        &self.id
    }

    fn seed() -> Vec<Self> {
        seed::traceability_records()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTraceabilityRecord {
    pub batch_number: String,
    #[serde(default)]
    pub production_order_id: Option<String>,
    #[serde(default)]
    pub equipment_id: Option<String>,
    pub operation: String,
    #[serde(default)]
    pub operator_id: Option<String>,
    /// Defaults to now
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    #[serde(default)]
    pub quality_data: Option<serde_json::Value>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub struct TraceabilityRepo<'a> {
    ds: &'a DataSource,
}

impl<'a> TraceabilityRepo<'a> {
    pub(crate) fn new(ds: &'a DataSource) -> Self {
        Self { ds }
    }

    pub async fn get_all(&self, online: bool) -> Vec<TraceabilityRecordView> {
        if online {
            if let Some(rows) = self.ds.fetch_remote(TraceabilityRecord::TABLE, SELECT, Order::desc("timestamp")).await {
                return rows;
            }
        }

        let orders = self.ds.local::<ProductionOrder>();
        let equipment = self.ds.local::<Equipment>();
        let users = self.ds.users().directory();

        self.ds
            .local::<TraceabilityRecord>()
            .into_iter()
            .map(|record| TraceabilityRecordView {
                production_order: lookup(&orders, record.production_order_id.as_deref()),
                equipment: lookup(&equipment, record.equipment_id.as_deref()),
                operator: lookup(&users, record.operator_id.as_deref()),
                record,
            })
            .collect()
    }

    pub async fn create(&self, draft: NewTraceabilityRecord, online: bool) -> Result<Saved<TraceabilityRecord>, RepoError> {
        validation::required("batch_number", &draft.batch_number)?;
        validation::required("operation", &draft.operation)?;

        let now = Utc::now();
        let record = TraceabilityRecord {
            id: self.ds.next_id::<TraceabilityRecord>(),
            batch_number: draft.batch_number.trim().to_string(),
            production_order_id: draft.production_order_id,
            equipment_id: draft.equipment_id,
            operation: draft.operation,
            operator_id: draft.operator_id,
            timestamp: draft.timestamp.unwrap_or(now),
            parameters: draft.parameters,
            quality_data: draft.quality_data,
            notes: draft.notes,
            created_at: now,
        };

        self.ds.insert(record, online).await
    }

    /// Records whose batch number contains `term`, ignoring case
    pub async fn get_by_batch(&self, term: &str, online: bool) -> Vec<TraceabilityRecordView> {
        let needle = term.to_lowercase();
        self.get_all(online)
            .await
            .into_iter()
            .filter(|v| v.record.batch_number.to_lowercase().contains(&needle))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::test_support::*;
    use serde_json::json;

    #[tokio::test]
    async fn batch_search_is_case_insensitive_substring() {
        let (_dir, ds) = offline_source();

        let first = ds.traceability().get_by_batch("batch-2024-001", false).await;
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|v| v.operator.as_ref().map(|u| u.id.as_str()) == Some("user-003")));

        let all = ds.traceability().get_by_batch("2024", false).await;
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn created_record_is_searchable() {
        let (_dir, ds) = offline_source();
        let draft = NewTraceabilityRecord {
            batch_number: "LOT-77".into(),
            production_order_id: Some("po-002".into()),
            equipment_id: Some("eq-003".into()),
            operation: "Embalagem".into(),
            operator_id: Some("user-002".into()),
            timestamp: None,
            parameters: Some(json!({ "speed": 3 })),
            quality_data: None,
            notes: None,
        };
        let saved = ds.traceability().create(draft, false).await.unwrap();
        assert!(saved.record.id.starts_with("tr-"));

        let found = ds.traceability().get_by_batch("lot", false).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].equipment.as_ref().map(|e| e.code.as_str()), Some("EMB-001"));
    }
}
