use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{entities::audit_trail, errors::ServiceError};

/// Writes before/after snapshots of mutated records. Runs against whatever
/// connection the caller passes, so snapshots written inside a transaction
/// roll back with it.
#[derive(Clone, Default)]
pub struct AuditRecorder;

impl AuditRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Records one snapshot row.
    pub async fn record<C: ConnectionTrait>(
        &self,
        conn: &C,
        entity_type: &str,
        entity_id: Uuid,
        action: &str,
        before: Option<Value>,
        after: Option<Value>,
    ) -> Result<(), ServiceError> {
        audit_trail::ActiveModel {
            id: Set(Uuid::new_v4()),
            entity_type: Set(entity_type.to_string()),
            entity_id: Set(entity_id),
            action: Set(action.to_string()),
            before: Set(before),
            after: Set(after),
            recorded_at: Set(Utc::now()),
        }
        .insert(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;

        Ok(())
    }

    /// Convenience wrapper serializing a model as the before-image of a
    /// deletion.
    pub async fn record_deletion<C: ConnectionTrait, M: Serialize>(
        &self,
        conn: &C,
        entity_type: &str,
        entity_id: Uuid,
        model: &M,
    ) -> Result<(), ServiceError> {
        let before = serde_json::to_value(model)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        self.record(conn, entity_type, entity_id, "delete", Some(before), None)
            .await
    }
}
