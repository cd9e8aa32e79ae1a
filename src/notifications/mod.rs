use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::NotificationConfig;

/// Represents a notification pushed to the browser bridge
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Key subscribers use to debounce duplicate deliveries
    pub dedupe_key: String,
    pub created_at: DateTime<Utc>,
}

/// Types of notifications
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    PurchaseStatus,
    BatchUpdate,
    SystemMessage,
}

/// Notification service errors
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Lock file {0} still held after retries")]
    LockContended(PathBuf),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Trait for notification service operations
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError>;
    async fn recent(&self, limit: usize) -> Result<Vec<Notification>, NotificationError>;
}

/// Removes the lock file when the guard goes out of scope, including on the
/// error paths of the append sequence.
struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove notification lock file");
            }
        }
    }
}

/// Flat-file notification store backing the SSE bridge.
///
/// Appends are serialized through a sibling `.lock` file acquired with bounded
/// retry and exponential backoff; the JSON payload is written to a temp file
/// and renamed into place so readers never observe a torn write. The file
/// retains only the most recent `history_limit` notifications.
#[derive(Clone)]
pub struct FileNotificationStore {
    file_path: PathBuf,
    lock_path: PathBuf,
    history_limit: usize,
    lock_attempts: u32,
    lock_backoff: Duration,
    live: broadcast::Sender<Notification>,
}

impl FileNotificationStore {
    pub fn new(config: &NotificationConfig) -> Self {
        let file_path = config.file_path.clone();
        let lock_path = sibling_lock_path(&file_path);
        let (live, _) = broadcast::channel(256);
        Self {
            file_path,
            lock_path,
            history_limit: config.history_limit,
            lock_attempts: config.lock_attempts,
            lock_backoff: Duration::from_millis(config.lock_backoff_ms),
            live,
        }
    }

    /// Subscribe to live notifications for SSE delivery
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.live.subscribe()
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    async fn acquire_lock(&self) -> Result<LockGuard, NotificationError> {
        let mut backoff = self.lock_backoff;
        for attempt in 0..self.lock_attempts {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.lock_path)
                .await
            {
                Ok(_) => {
                    return Ok(LockGuard {
                        path: self.lock_path.clone(),
                    })
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(
                        attempt,
                        path = %self.lock_path.display(),
                        "Notification lock held, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(NotificationError::Io(e)),
            }
        }
        Err(NotificationError::LockContended(self.lock_path.clone()))
    }

    async fn load(&self) -> Result<Vec<Notification>, NotificationError> {
        match tokio::fs::read(&self.file_path).await {
            Ok(bytes) => {
                if bytes.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(serde_json::from_slice(&bytes)?)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(NotificationError::Io(e)),
        }
    }

    async fn persist(&self, notifications: &[Notification]) -> Result<(), NotificationError> {
        let tmp_path = self.file_path.with_extension("json.tmp");
        let payload = serde_json::to_vec_pretty(notifications)?;
        tokio::fs::write(&tmp_path, payload).await?;
        tokio::fs::rename(&tmp_path, &self.file_path).await?;
        Ok(())
    }
}

fn sibling_lock_path(file_path: &Path) -> PathBuf {
    file_path.with_extension("lock")
}

#[async_trait]
impl NotificationService for FileNotificationStore {
    #[instrument(skip(self, notification), fields(id = %notification.id, dedupe_key = %notification.dedupe_key))]
    async fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        let _lock = self.acquire_lock().await?;

        let mut notifications = self.load().await?;
        notifications.push(notification.clone());

        // Keep only the newest entries
        if notifications.len() > self.history_limit {
            let excess = notifications.len() - self.history_limit;
            notifications.drain(0..excess);
        }

        self.persist(&notifications).await?;

        // Live subscribers are optional; a lagging or absent SSE client must
        // not fail the append
        let _ = self.live.send(notification);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn recent(&self, limit: usize) -> Result<Vec<Notification>, NotificationError> {
        let mut notifications = self.load().await?;
        if notifications.len() > limit {
            let excess = notifications.len() - limit;
            notifications.drain(0..excess);
        }
        Ok(notifications)
    }
}

/// Notification creation helpers
pub struct NotificationBuilder;

impl NotificationBuilder {
    pub fn purchase_status(
        purchase_id: Uuid,
        invoice_number: &str,
        old_status: &str,
        new_status: &str,
    ) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            message: format!(
                "Purchase {} moved from {} to {}",
                invoice_number, old_status, new_status
            ),
            notification_type: NotificationType::PurchaseStatus,
            dedupe_key: format!("purchase-status:{}:{}", purchase_id, new_status),
            created_at: Utc::now(),
        }
    }

    pub fn batches_generated(purchase_id: Uuid, batch_count: usize) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            message: format!(
                "{} batch(es) materialized for purchase {}",
                batch_count, purchase_id
            ),
            notification_type: NotificationType::BatchUpdate,
            dedupe_key: format!("batches-generated:{}", purchase_id),
            created_at: Utc::now(),
        }
    }

    pub fn purchase_deleted(purchase_id: Uuid, invoice_number: &str) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            message: format!("Purchase {} was deleted", invoice_number),
            notification_type: NotificationType::PurchaseStatus,
            dedupe_key: format!("purchase-deleted:{}", purchase_id),
            created_at: Utc::now(),
        }
    }

    pub fn system(message: impl Into<String>) -> Notification {
        let message = message.into();
        Notification {
            id: Uuid::new_v4(),
            dedupe_key: format!("system:{}", message),
            message,
            notification_type: NotificationType::SystemMessage,
            created_at: Utc::now(),
        }
    }
}

pub type SharedNotificationStore = Arc<FileNotificationStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileNotificationStore {
        let config = NotificationConfig {
            file_path: dir.path().join("sse-notifications.json"),
            history_limit: 50,
            lock_attempts: 5,
            lock_backoff_ms: 5,
        };
        FileNotificationStore::new(&config)
    }

    #[tokio::test]
    async fn send_then_recent_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let notification = NotificationBuilder::system("hello");
        store.send(notification.clone()).await.unwrap();

        let recent = store.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].message, "hello");
        assert_eq!(recent[0].dedupe_key, notification.dedupe_key);
    }

    #[tokio::test]
    async fn history_window_is_bounded() {
        let dir = TempDir::new().unwrap();
        let config = NotificationConfig {
            file_path: dir.path().join("sse-notifications.json"),
            history_limit: 3,
            lock_attempts: 5,
            lock_backoff_ms: 5,
        };
        let store = FileNotificationStore::new(&config);

        for i in 0..5 {
            store
                .send(NotificationBuilder::system(format!("msg-{}", i)))
                .await
                .unwrap();
        }

        let recent = store.recent(10).await.unwrap();
        assert_eq!(recent.len(), 3);
        // Oldest entries dropped first
        assert_eq!(recent[0].message, "msg-2");
        assert_eq!(recent[2].message, "msg-4");
    }

    #[tokio::test]
    async fn stale_lock_eventually_fails_with_contention_error() {
        let dir = TempDir::new().unwrap();
        let config = NotificationConfig {
            file_path: dir.path().join("sse-notifications.json"),
            history_limit: 50,
            lock_attempts: 2,
            lock_backoff_ms: 1,
        };
        let store = FileNotificationStore::new(&config);

        // Simulate a lock held by another writer
        std::fs::write(dir.path().join("sse-notifications.lock"), b"").unwrap();

        let result = store.send(NotificationBuilder::system("blocked")).await;
        assert!(matches!(result, Err(NotificationError::LockContended(_))));
    }

    #[tokio::test]
    async fn lock_is_released_after_append() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.send(NotificationBuilder::system("one")).await.unwrap();
        assert!(!dir.path().join("sse-notifications.lock").exists());

        // A second append must succeed without contention
        store.send(NotificationBuilder::system("two")).await.unwrap();
        let recent = store.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn live_subscribers_receive_appends() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut rx = store.subscribe();

        store
            .send(NotificationBuilder::batches_generated(Uuid::new_v4(), 2))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.notification_type, NotificationType::BatchUpdate);
    }
}
