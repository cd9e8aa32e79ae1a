use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::notifications::{NotificationBuilder, NotificationService};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Purchase events
    PurchaseCreated(Uuid),
    PurchaseUpdated(Uuid),
    PurchaseItemAdded { purchase_id: Uuid, item_id: Uuid },
    PurchaseStatusChanged {
        purchase_id: Uuid,
        invoice_number: String,
        old_status: String,
        new_status: String,
    },
    BatchesGenerated {
        purchase_id: Uuid,
        livestock_id: Uuid,
        batch_count: usize,
    },
    PurchaseDeleted {
        purchase_id: Uuid,
        invoice_number: String,
    },

    // Master data events
    PartnerCreated(Uuid),
    PartnerUpdated(Uuid),
    PartnerDeleted(Uuid),
    FarmCreated(Uuid),
    FarmUpdated(Uuid),
    FarmDeleted(Uuid),
    CoopCreated(Uuid),
    CoopUpdated(Uuid),
    CoopDeleted(Uuid),
    StrainCreated(Uuid),
    StrainUpdated(Uuid),
    StrainDeleted(Uuid),

    // Company events
    CompanyConfigUpdated(Uuid),

    // Generic event for custom messages
    Generic {
        message: String,
        metadata: serde_json::Value,
    },
}

// Define a trait for handling events. Handlers implementing this trait will process events asynchronously.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: Event) -> Result<(), String>;
}

/// Processes incoming events. Purchase-lifecycle events are bridged into the
/// notification side-channel; everything else is logged only.
pub async fn process_events(
    mut rx: mpsc::Receiver<Event>,
    notifier: Option<Arc<dyn NotificationService>>,
) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        info!("Received event: {:?}", event);

        let notification = match &event {
            Event::PurchaseStatusChanged {
                purchase_id,
                invoice_number,
                old_status,
                new_status,
            } => Some(NotificationBuilder::purchase_status(
                *purchase_id,
                invoice_number,
                old_status,
                new_status,
            )),
            Event::BatchesGenerated {
                purchase_id,
                batch_count,
                ..
            } => Some(NotificationBuilder::batches_generated(
                *purchase_id,
                *batch_count,
            )),
            Event::PurchaseDeleted {
                purchase_id,
                invoice_number,
            } => Some(NotificationBuilder::purchase_deleted(
                *purchase_id,
                invoice_number,
            )),
            _ => None,
        };

        if let (Some(notification), Some(notifier)) = (notification, notifier.as_ref()) {
            if let Err(e) = notifier.send(notification).await {
                warn!(error = %e, "Failed to bridge event into notification channel");
            }
        }
    }

    info!("Event processing loop stopped: channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_sender_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        let purchase_id = Uuid::new_v4();
        sender
            .send(Event::PurchaseCreated(purchase_id))
            .await
            .expect("send should succeed");

        match rx.recv().await {
            Some(Event::PurchaseCreated(id)) => assert_eq!(id, purchase_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn event_sender_reports_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        let result = sender.send(Event::PurchaseCreated(Uuid::new_v4())).await;
        assert!(result.is_err());
    }
}
