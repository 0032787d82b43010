use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

// ============================================================================
// Audit Log
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub admin_id: String,
    pub target_type: String,
    pub target_id: Uuid,
    pub action_type: String,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn status_override(
        admin_id: impl Into<String>,
        order_id: Uuid,
        reason: &str,
        comment: &str,
    ) -> Self {
        let comment = match (reason.trim(), comment.trim()) {
            (reason, "") => reason.to_string(),
            ("", comment) => comment.to_string(),
            (reason, comment) => format!("{}: {}", reason, comment),
        };

        Self {
            admin_id: admin_id.into(),
            target_type: "ORDER".to_string(),
            target_id: order_id,
            action_type: "STATUS_OVERRIDE".to_string(),
            comment,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AuditLogger: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> anyhow::Result<()>;
}

/// Writes entries as structured events on the `audit` target.
#[derive(Default)]
pub struct TracingAuditLogger;

#[async_trait]
impl AuditLogger for TracingAuditLogger {
    async fn record(&self, entry: AuditEntry) -> anyhow::Result<()> {
        tracing::info!(
            target: "audit",
            admin_id = %entry.admin_id,
            target_type = %entry.target_type,
            target_id = %entry.target_id,
            action_type = %entry.action_type,
            comment = %entry.comment,
            timestamp = %entry.timestamp,
            "Admin action recorded"
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditLogger for InMemoryAuditLog {
    async fn record(&self, entry: AuditEntry) -> anyhow::Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}
