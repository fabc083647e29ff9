use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub user_id: Option<Uuid>,
    pub action: &'static str,
    pub resource: &'static str,
    pub metadata: Option<Value>,
}

impl AuditEvent {
    pub fn new(user_id: Uuid, action: &'static str, resource: &'static str) -> Self {
        Self {
            user_id: Some(user_id),
            action,
            resource,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

pub async fn log_audit(pool: &DbPool, event: &AuditEvent) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(event.user_id)
    .bind(event.action)
    .bind(event.resource)
    .bind(event.metadata.as_ref())
    .execute(pool)
    .await?;

    Ok(())
}

/// Write an audit row, logging instead of failing when the insert errors.
pub async fn record(pool: &DbPool, event: AuditEvent) {
    if let Err(err) = log_audit(pool, &event).await {
        tracing::warn!(error = %err, action = event.action, "audit log failed");
    }
}
