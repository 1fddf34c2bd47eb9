//! Player-facing notifications
//!
//! The engine only produces [`NewNotification`]s; where they end up is the
//! job of a [`NotificationSink`]. Sinks shipped with the crate:
//! - [`TracingNotifier`] logs them
//! - [`StoreNotifier`] keeps the newest ones in the `notifications` collection
//! - [`MemoryNotifier`] buffers them for a UI to drain
//! - [`FanoutNotifier`] forwards to several of the above

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::TimeSource;
use crate::error::StoreError;
use crate::store::snapshot::NotificationRecord;
use crate::store::{Collection, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Achievement,
    DailyTask,
    Event,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Achievement => "achievement",
            NotificationKind::DailyTask => "daily_task",
            NotificationKind::Event => "event",
            NotificationKind::System => "system",
        }
    }

    pub fn default_icon(&self) -> &'static str {
        match self {
            NotificationKind::Achievement => "award",
            NotificationKind::DailyTask => "calendar",
            NotificationKind::Event => "gift",
            NotificationKind::System => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub icon: Option<String>,
    pub data: Option<Value>,
}

impl NewNotification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind,
            icon: None,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Receives notifications produced by the engine. Delivery never fails the
/// action that produced the notification.
pub trait NotificationSink: Send + Sync {
    fn create_notification(&self, notification: NewNotification);
}

/// Logs notifications through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn create_notification(&self, n: NewNotification) {
        debug!(kind = n.kind.as_str(), "{}: {}", n.title, n.message);
    }
}

/// Forwards every notification to each sink in order
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutNotifier {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }
}

impl NotificationSink for FanoutNotifier {
    fn create_notification(&self, n: NewNotification) {
        for sink in &self.sinks {
            sink.create_notification(n.clone());
        }
    }
}

/// Persists notifications, newest first, keeping at most `limit`
#[derive(Clone)]
pub struct StoreNotifier {
    store: Store,
    time: Arc<dyn TimeSource>,
    limit: usize,
}

impl StoreNotifier {
    pub fn new(store: Store, time: Arc<dyn TimeSource>, limit: usize) -> Self {
        Self { store, time, limit }
    }

    /// Stored notifications, newest first
    pub fn list(&self) -> Result<Vec<NotificationRecord>, StoreError> {
        let mut all: Vec<NotificationRecord> = self.store.get_all(Collection::Notifications)?;
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(all)
    }

    pub fn mark_read(&self, id: &str) -> Result<bool, StoreError> {
        let Some(mut record) = self
            .store
            .get::<NotificationRecord>(Collection::Notifications, id)?
        else {
            return Ok(false);
        };
        record.read = true;
        self.store.put(Collection::Notifications, &record)?;
        Ok(true)
    }

    fn persist(&self, n: NewNotification) -> Result<(), StoreError> {
        let now = self.time.now_ms();
        let record = NotificationRecord {
            id: format!("{}-{}", now, uuid::Uuid::new_v4().simple()),
            icon: n.icon.unwrap_or_else(|| n.kind.default_icon().to_string()),
            title: n.title,
            message: n.message,
            kind: n.kind,
            data: n.data,
            timestamp: now,
            read: false,
        };
        self.store.put(Collection::Notifications, &record)?;

        let stale: Vec<String> = self
            .list()?
            .into_iter()
            .skip(self.limit)
            .map(|r| r.id)
            .collect();
        if !stale.is_empty() {
            self.store.batch(|tx| {
                for id in &stale {
                    tx.delete(Collection::Notifications, id)?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }
}

impl NotificationSink for StoreNotifier {
    fn create_notification(&self, n: NewNotification) {
        if let Err(e) = self.persist(n) {
            warn!("Failed to store notification: {}", e);
        }
    }
}

/// Buffers notifications in memory
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    pending: Mutex<Vec<NewNotification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything buffered so far, oldest first
    pub fn drain(&self) -> Vec<NewNotification> {
        match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for MemoryNotifier {
    fn create_notification(&self, n: NewNotification) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push(n);
        }
    }
}
