//! Data-access façade.
//!
//! Each entity has a repository that reads from the remote backend when
//! online and from the local mirror otherwise. Writes are attempted remotely
//! when online and always land in the local mirror; a failing remote call
//! only downgrades the write to local-only.

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn, debug};

use crate::remote::{ApiClient, Order};
use crate::storage::{LocalStore, StorageError};

pub mod alerts;
pub mod equipment;
pub mod lines;
pub mod maintenance;
pub mod orders;
pub mod quality;
pub mod settings;
pub mod traceability;
pub mod users;

pub use alerts::AlertsRepo;
pub use equipment::{EquipmentPatch, EquipmentRepo, NewEquipment};
pub use lines::LinesRepo;
pub use maintenance::{MaintenancePatch, MaintenanceRepo, MaintenanceStats, NewMaintenanceOrder};
pub use orders::{NewProductionOrder, OrderPatch, OrdersRepo};
pub use quality::{conformity_rate, InspectionPatch, NewInspection, QualityRepo, QualityStats};
pub use settings::SettingsRepo;
pub use traceability::{NewTraceabilityRecord, TraceabilityRepo};
pub use users::{NewUser, UserPatch, UsersRepo};

/// A record kept both remotely and in the local mirror
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Remote table name, also the local storage key
    const TABLE: &'static str;
    /// Prefix of locally generated ids
    const ID_PREFIX: &'static str;

    fn id(&self) -> &str;

    /// Contents of the mirror before anything was stored
    fn seed() -> Vec<Self>;
}

/// Outcome of a write: the stored record and whether it only reached the
/// local mirror.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Saved<T> {
    pub record: T,
    pub offline: bool,
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid update for {entity}: {reason}")]
    InvalidPatch { entity: &'static str, reason: String },

    #[error(transparent)]
    Validation(#[from] crate::validation::ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Remote client plus local mirror; the handle every repository borrows
#[derive(Debug, Clone)]
pub struct DataSource {
    api: ApiClient,
    store: LocalStore,
}

impl DataSource {
    pub fn new(api: ApiClient, store: LocalStore) -> Self {
        Self { api, store }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn orders(&self) -> OrdersRepo<'_> {
        OrdersRepo::new(self)
    }

    pub fn quality(&self) -> QualityRepo<'_> {
        QualityRepo::new(self)
    }

    pub fn maintenance(&self) -> MaintenanceRepo<'_> {
        MaintenanceRepo::new(self)
    }

    pub fn equipment(&self) -> EquipmentRepo<'_> {
        EquipmentRepo::new(self)
    }

    pub fn lines(&self) -> LinesRepo<'_> {
        LinesRepo::new(self)
    }

    pub fn traceability(&self) -> TraceabilityRepo<'_> {
        TraceabilityRepo::new(self)
    }

    pub fn alerts(&self) -> AlertsRepo<'_> {
        AlertsRepo::new(self)
    }

    pub fn settings(&self) -> SettingsRepo<'_> {
        SettingsRepo::new(self)
    }

    pub fn users(&self) -> UsersRepo<'_> {
        UsersRepo::new(self)
    }

    /// Local mirror of `T`, seeded on first use
    pub fn local<T: Entity>(&self) -> Vec<T> {
        self.store.load_list(T::TABLE, T::seed)
    }

    fn save_local<T: Entity>(&self, items: &[T]) -> Result<(), RepoError> {
        self.store.save(T::TABLE, items)?;
        Ok(())
    }

    /// Select from the backend. `None` means the caller should fall back to
    /// the local mirror. Successful non-empty reads are kept as a backup.
    pub(crate) async fn fetch_remote<V>(&self, table: &str, select: &str, order: Order<'_>) -> Option<Vec<V>>
    where
        V: Serialize + DeserializeOwned,
    {
        match self.api.select::<V>(table, select, order).await {
            Ok(rows) => {
                if !rows.is_empty() {
                    let key = format!("{}_backup", table);
                    if let Err(e) = self.store.save(&key, &rows) {
                        warn!("Failed to save {} backup: {}", table, e);
                    }
                }
                Some(rows)
            }
            Err(e) => {
                warn!("Query on {} failed, using offline data: {}", table, e);
                None
            }
        }
    }

    /// Next free `<prefix>-<millis>` id in the local mirror
    pub(crate) fn next_id<T: Entity>(&self) -> String {
        let existing = self.local::<T>();
        let mut millis = Utc::now().timestamp_millis();
        loop {
            let id = format!("{}-{}", T::ID_PREFIX, millis);
            if !existing.iter().any(|item| item.id() == id) {
                return id;
            }
            millis += 1;
        }
    }

    /// Put `record` at the front of the mirror, replacing any same-id entry
    pub(crate) fn mirror_add<T: Entity>(&self, record: T) -> Result<(), RepoError> {
        let mut items = self.local::<T>();
        items.retain(|item| item.id() != record.id());
        items.insert(0, record);
        self.save_local(&items)
    }

    /// Merge `patch` into the mirrored record with `id`
    pub(crate) fn mirror_patch<T: Entity>(&self, id: &str, patch: &Map<String, Value>) -> Result<T, RepoError> {
        let mut items = self.local::<T>();
        let slot = items
            .iter_mut()
            .find(|item| item.id() == id)
            .ok_or_else(|| RepoError::NotFound { entity: T::TABLE, id: id.to_string() })?;

        let updated = apply_patch(slot, patch)?;
        *slot = updated.clone();
        self.save_local(&items)?;
        Ok(updated)
    }

    pub(crate) fn mirror_remove<T: Entity>(&self, id: &str) -> Result<(), RepoError> {
        let mut items = self.local::<T>();
        items.retain(|item| item.id() != id);
        self.save_local(&items)
    }

    /// Create `record` remotely when online, always mirroring the result
    pub(crate) async fn insert<T: Entity>(&self, record: T, online: bool) -> Result<Saved<T>, RepoError> {
        if online {
            match self.api.insert::<_, T>(T::TABLE, &remote_body(&record)).await {
                Ok(stored) => {
                    self.mirror_add(stored.clone())?;
                    info!("Created {} {}", T::TABLE, stored.id());
                    return Ok(Saved { record: stored, offline: false });
                }
                Err(e) => warn!("Remote insert into {} failed, saving locally: {}", T::TABLE, e),
            }
        }

        self.mirror_add(record.clone())?;
        debug!("Created {} {} locally", T::TABLE, record.id());
        Ok(Saved { record, offline: true })
    }

    /// Update the record with `id`. Remotely the row is matched on
    /// `remote_filter`, locally always on id.
    pub(crate) async fn patch<T: Entity>(
        &self,
        id: &str,
        remote_filter: (&str, &str),
        patch: Map<String, Value>,
        online: bool,
    ) -> Result<Saved<T>, RepoError> {
        if online {
            let (column, value) = remote_filter;
            match self.api.update::<_, T>(T::TABLE, column, value, &patch).await {
                Ok(stored) => {
                    match self.mirror_patch::<T>(id, &patch) {
                        Ok(_) | Err(RepoError::NotFound { .. }) => {}
                        Err(e) => return Err(e),
                    }
                    info!("Updated {} {}", T::TABLE, id);
                    return Ok(Saved { record: stored, offline: false });
                }
                Err(e) => warn!("Remote update of {} failed, updating locally: {}", T::TABLE, e),
            }
        }

        let record = self.mirror_patch::<T>(id, &patch)?;
        Ok(Saved { record, offline: true })
    }

    /// Best-effort remote delete, always applied locally
    pub(crate) async fn remove<T: Entity>(&self, id: &str, online: bool) -> Result<bool, RepoError> {
        let mut offline = true;
        if online {
            match self.api.delete(T::TABLE, "id", id).await {
                Ok(()) => offline = false,
                Err(e) => warn!("Remote delete from {} failed, removing locally: {}", T::TABLE, e),
            }
        }

        self.mirror_remove::<T>(id)?;
        Ok(offline)
    }
}

/// Serialize a typed patch into a JSON object, stamping `updated_at`
pub(crate) fn patch_object<P: Serialize>(entity: &'static str, patch: &P, touch: bool) -> Result<Map<String, Value>, RepoError> {
    let value = serde_json::to_value(patch)
        .map_err(|e| RepoError::InvalidPatch { entity, reason: e.to_string() })?;

    let mut map = match value {
        Value::Object(map) => map,
        _ => return Err(RepoError::InvalidPatch { entity, reason: "patch must be an object".into() }),
    };

    if touch {
        map.insert("updated_at".into(), Value::String(Utc::now().to_rfc3339()));
    }
    Ok(map)
}

fn apply_patch<T: Entity>(item: &T, patch: &Map<String, Value>) -> Result<T, RepoError> {
    let invalid = |e: serde_json::Error| RepoError::InvalidPatch { entity: T::TABLE, reason: e.to_string() };

    let mut value = serde_json::to_value(item).map_err(invalid)?;
    if let Value::Object(fields) = &mut value {
        for (key, field) in patch {
            fields.insert(key.clone(), field.clone());
        }
    }
    serde_json::from_value(value).map_err(invalid)
}

/// Insert payload: the backend assigns id and timestamps
fn remote_body<T: Entity>(record: &T) -> Value {
    let mut value = serde_json::to_value(record).unwrap_or(Value::Null);
    if let Value::Object(fields) = &mut value {
        for key in ["id", "created_at", "updated_at"] {
            fields.remove(key);
        }
    }
    value
}

/// First element whose id matches, the offline stand-in for a join
pub(crate) fn lookup<T: Entity>(items: &[T], id: Option<&str>) -> Option<T> {
    let id = id?;
    items.iter().find(|item| item.id() == id).cloned()
}
