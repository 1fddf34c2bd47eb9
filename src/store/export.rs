//! Save export and import
//!
//! The export document is a camelCase JSON snapshot of every collection.
//! Import validates the whole document before touching the database, then
//! upserts every record in a single transaction. Records missing from the
//! document are left alone.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::snapshot::keys;
use super::{Collection, Store, record_key};
use crate::error::{ActionResult, Rejection, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: u32,
    pub timestamp: i64,
    pub game_state: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    #[serde(default)]
    pub skills: Vec<Value>,
    #[serde(default)]
    pub shop: Vec<Value>,
    #[serde(default)]
    pub events: Vec<Value>,
    #[serde(default)]
    pub achievements: Vec<Value>,
    #[serde(default)]
    pub daily_tasks: Vec<Value>,
    #[serde(default)]
    pub notifications: Vec<Value>,
    #[serde(default)]
    pub pets: Vec<Value>,
    #[serde(default)]
    pub equipment: Vec<Value>,
    #[serde(default)]
    pub exploration: Vec<Value>,
}

impl ExportDocument {
    /// Every record paired with its target collection
    fn records(&self) -> Vec<(Collection, &Value)> {
        let mut records = vec![(Collection::GameState, &self.game_state)];
        if let Some(settings) = &self.settings {
            records.push((Collection::Settings, settings));
        }
        let lists = [
            (Collection::Skills, &self.skills),
            (Collection::Shop, &self.shop),
            (Collection::Events, &self.events),
            (Collection::Achievements, &self.achievements),
            (Collection::DailyTasks, &self.daily_tasks),
            (Collection::Notifications, &self.notifications),
            (Collection::Pets, &self.pets),
            (Collection::Equipment, &self.equipment),
            (Collection::Exploration, &self.exploration),
        ];
        for (collection, list) in lists {
            records.extend(list.iter().map(|v| (collection, v)));
        }
        records
    }
}

pub fn export(store: &Store, timestamp: i64) -> Result<Option<ExportDocument>, StoreError> {
    let Some(game_state) = store.get::<Value>(Collection::GameState, keys::GAME_STATE)? else {
        return Ok(None);
    };
    Ok(Some(ExportDocument {
        version: store.version(),
        timestamp,
        game_state,
        settings: store.get(Collection::Settings, keys::USER_SETTINGS)?,
        skills: store.get_all_values(Collection::Skills)?,
        shop: store.get_all_values(Collection::Shop)?,
        events: store.get_all_values(Collection::Events)?,
        achievements: store.get_all_values(Collection::Achievements)?,
        daily_tasks: store.get_all_values(Collection::DailyTasks)?,
        notifications: store.get_all_values(Collection::Notifications)?,
        pets: store.get_all_values(Collection::Pets)?,
        equipment: store.get_all_values(Collection::Equipment)?,
        exploration: store.get_all_values(Collection::Exploration)?,
    }))
}

/// Check a raw document without writing anything
pub fn validate(store: &Store, json: &str) -> Result<ExportDocument, Rejection> {
    let raw: Value =
        serde_json::from_str(json).map_err(|e| Rejection::InvalidImport(e.to_string()))?;
    if !raw.get("version").is_some_and(Value::is_u64) {
        return Err(Rejection::InvalidImport("missing version".into()));
    }
    if !raw.get("gameState").is_some_and(Value::is_object) {
        return Err(Rejection::InvalidImport("missing gameState".into()));
    }

    let doc: ExportDocument =
        serde_json::from_value(raw).map_err(|e| Rejection::InvalidImport(e.to_string()))?;
    if doc.version > store.version() {
        return Err(Rejection::InvalidImport(format!(
            "document version {} is newer than {}",
            doc.version,
            store.version()
        )));
    }
    for (collection, record) in doc.records() {
        record_key(collection, record).map_err(|e| Rejection::InvalidImport(e.to_string()))?;
    }
    Ok(doc)
}

/// Upsert a validated document. Returns the number of records written.
pub fn import(store: &Store, json: &str) -> ActionResult<usize> {
    let doc = validate(store, json)?;
    let records = doc.records();
    store.batch(|tx| {
        for (collection, record) in &records {
            tx.put_value(*collection, record)?;
        }
        Ok(())
    })?;
    info!("Imported {} records from a version {} save", records.len(), doc.version);
    Ok(records.len())
}
