//! Quality inspections

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{lookup, patch_object, DataSource, Entity, RepoError, Saved};
use crate::models::{
    document_number, round2, InspectionStatus, ProductionOrder, QualityInspection, QualityInspectionView,
};
use crate::remote::Order;
use crate::validation::{self, ValidationError};
use crate::seed;

const SELECT: &str = "*,production_order:production_orders(*),inspector:users(*)";

impl Entity for QualityInspection {
    const TABLE: &'static str = "quality_inspections";
    const ID_PREFIX: &'static str = "qi";

    fn id(&self) -> &str {
        &self.id
    }

    fn seed() -> Vec<Self> {
        seed::quality_inspections()
    }
}

/// Share of conforming items in a sample, as a percentage with two decimals.
///
/// An empty sample yields 0.
pub fn conformity_rate(sample_size: u32, defects_found: u32) -> f64 {
    if sample_size == 0 {
        return 0.0;
    }
    let conforming = sample_size.saturating_sub(defects_found);
    round2(f64::from(conforming) / f64::from(sample_size) * 100.0)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInspection {
    /// Generated as `QI-YYYYMMDD-NNNN` when absent
    #[serde(default)]
    pub inspection_number: Option<String>,
    #[serde(default)]
    pub production_order_id: Option<String>,
    #[serde(default)]
    pub inspector_id: Option<String>,
    pub inspection_type: String,
    pub sample_size: u32,
    #[serde(default)]
    pub defects_found: u32,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub inspection_date: Option<DateTime<Utc>>,
}

impl NewInspection {
    pub fn new(inspection_type: impl Into<String>, sample_size: u32, defects_found: u32) -> Self {
        Self {
            inspection_number: None,
            production_order_id: None,
            inspector_id: None,
            inspection_type: inspection_type.into(),
            sample_size,
            defects_found,
            observations: None,
            inspection_date: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InspectionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<InspectionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspector_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityStats {
    pub total: usize,
    pub approved: usize,
    pub rejected: usize,
    pub pending: usize,
    pub avg_conformity: f64,
    /// Whole percent
    pub approval_rate: f64,
}

impl QualityStats {
    pub fn from_inspections<'i>(inspections: impl IntoIterator<Item = &'i QualityInspection>) -> Self {
        let mut stats = QualityStats {
            total: 0,
            approved: 0,
            rejected: 0,
            pending: 0,
            avg_conformity: 0.0,
            approval_rate: 0.0,
        };
        let mut conformity_sum = 0.0;

        for inspection in inspections {
            stats.total += 1;
            conformity_sum += inspection.conformity_rate;
            match inspection.status {
                InspectionStatus::Approved => stats.approved += 1,
                InspectionStatus::Rejected => stats.rejected += 1,
                InspectionStatus::Pending => stats.pending += 1,
                InspectionStatus::InProgress | InspectionStatus::Rework => {}
            }
        }

        if stats.total > 0 {
            let total = stats.total as f64;
            stats.avg_conformity = round2(conformity_sum / total);
            stats.approval_rate = (stats.approved as f64 / total * 100.0).round();
        }
        stats
    }
}

pub struct QualityRepo<'a> {
    ds: &'a DataSource,
}

impl<'a> QualityRepo<'a> {
    pub(crate) fn new(ds: &'a DataSource) -> Self {
        Self { ds }
    }

    pub async fn get_all(&self, online: bool) -> Vec<QualityInspectionView> {
        if online {
            if let Some(rows) = self.ds.fetch_remote(QualityInspection::TABLE, SELECT, Order::desc("created_at")).await {
                return rows;
            }
        }

        let orders = self.ds.local::<ProductionOrder>();
        let users = self.ds.users().directory();

        self.ds
            .local::<QualityInspection>()
            .into_iter()
            .map(|inspection| QualityInspectionView {
                production_order: lookup(&orders, inspection.production_order_id.as_deref()),
                inspector: lookup(&users, inspection.inspector_id.as_deref()),
                inspection,
            })
            .collect()
    }

    /// Record a new inspection; it starts out pending with its conformity
    /// rate computed from the sample.
    pub async fn create(&self, draft: NewInspection, online: bool) -> Result<Saved<QualityInspection>, RepoError> {
        validation::required("inspection_type", &draft.inspection_type)?;
        if let Some(number) = &draft.inspection_number {
            validation::required("inspection_number", number)?;
        }
        if draft.sample_size == 0 {
            return Err(ValidationError::EmptySample.into());
        }
        if draft.defects_found > draft.sample_size {
            return Err(ValidationError::TooManyDefects {
                sample: draft.sample_size,
                defects: draft.defects_found,
            }
            .into());
        }

        let now = Utc::now();
        let inspection = QualityInspection {
            id: self.ds.next_id::<QualityInspection>(),
            inspection_number: draft.inspection_number.unwrap_or_else(|| document_number("QI", now)),
            production_order_id: draft.production_order_id.filter(|id| !id.is_empty()),
            inspector_id: draft.inspector_id.filter(|id| !id.is_empty()),
            inspection_type: draft.inspection_type,
            status: InspectionStatus::Pending,
            sample_size: draft.sample_size,
            defects_found: draft.defects_found,
            conformity_rate: conformity_rate(draft.sample_size, draft.defects_found),
            observations: draft.observations,
            inspection_date: draft.inspection_date.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };

        self.ds.insert(inspection, online).await
    }

    pub async fn update(&self, id: &str, patch: &InspectionPatch, online: bool) -> Result<Saved<QualityInspection>, RepoError> {
        let patch = patch_object(QualityInspection::TABLE, patch, true)?;
        self.ds.patch::<QualityInspection>(id, ("id", id), patch, online).await
    }

    pub async fn stats(&self, online: bool) -> QualityStats {
        let inspections = self.get_all(online).await;
        QualityStats::from_inspections(inspections.iter().map(|v| &v.inspection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::test_support::*;

    #[test]
    fn conformity_rate_is_rounded_to_two_decimals() {
        assert_eq!(conformity_rate(5, 1), 80.0);
        assert_eq!(conformity_rate(3, 1), 66.67);
        assert_eq!(conformity_rate(7, 0), 100.0);
        assert_eq!(conformity_rate(0, 0), 0.0);
    }

    #[tokio::test]
    async fn create_computes_rate_and_starts_pending() {
        let (_dir, ds) = offline_source();
        let mut draft = NewInspection::new("Inspeção Visual", 12, 1);
        draft.production_order_id = Some("po-001".into());

        let saved = ds.quality().create(draft, false).await.unwrap();

        assert_eq!(saved.record.conformity_rate, 91.67);
        assert_eq!(saved.record.status, InspectionStatus::Pending);
        assert!(saved.record.inspection_number.starts_with("QI-"));

        let listed = ds.quality().get_all(false).await;
        assert_eq!(listed[0].production_order.as_ref().map(|o| o.id.as_str()), Some("po-001"));
    }

    #[tokio::test]
    async fn create_rejects_bad_samples() {
        let (_dir, ds) = offline_source();
        let err = ds.quality().create(NewInspection::new("Visual", 0, 0), false).await.unwrap_err();
        assert!(matches!(err, RepoError::Validation(ValidationError::EmptySample)));

        let err = ds.quality().create(NewInspection::new("Visual", 2, 3), false).await.unwrap_err();
        assert!(matches!(err, RepoError::Validation(ValidationError::TooManyDefects { .. })));
    }

    #[tokio::test]
    async fn stats_over_fixtures() {
        let (_dir, ds) = offline_source();
        let stats = ds.quality().stats(false).await;

        assert_eq!(stats.total, 3);
        assert_eq!(stats.approved, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.avg_conformity, 60.0);
        assert_eq!(stats.approval_rate, 67.0);
    }

    #[test]
    fn stats_of_nothing_are_zero() {
        let stats = QualityStats::from_inspections(std::iter::empty());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.avg_conformity, 0.0);
        assert_eq!(stats.approval_rate, 0.0);
    }
}
