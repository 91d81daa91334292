//! Row types for the lead store.

use serde::Serialize;
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

/// A row from the `leads` table.
///
/// `stage` and `priority` are stored as plain strings on purpose: the
/// pipeline tolerates unknown stages (probability defaults to zero) and the
/// back office may introduce labels faster than the service ships.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbLead {
    pub id: String,
    pub name: String,
    /// "vendor" or "couple".
    pub kind: String,
    pub email: Option<String>,
    /// Where the lead came from: "application", "chat", "form".
    pub source: String,
    pub notes: Option<String>,
    pub stage: String,
    pub priority: String,
    /// Externally assigned qualification score (0–100).
    pub score: Option<i64>,
    /// Stage-derived win probability, stored as a 0.0–1.0 fraction.
    pub deal_probability: f64,
    /// Human-entered monetary estimate, currency-agnostic.
    pub deal_value: Option<f64>,
    /// True once a human manually set priority; suppresses score-derived
    /// priority recomputation.
    pub priority_overridden: bool,
    pub assigned_to: Option<String>,
    pub assigned_at: Option<String>,
    pub invited_at: Option<String>,
    pub stage_entered_at: String,
    /// Advisory summary attached by the qualification step.
    pub summary: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the append-only `audit_log` table.
///
/// Created once, never updated or deleted. The only historical trail for a
/// lead's state transitions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAuditEntry {
    pub id: String,
    pub lead_id: String,
    /// "stage_change", "priority_override", "priority_change",
    /// "assignment", "INVITE_SENT".
    pub action_type: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    /// Operator id, or the literal "System" for automated changes.
    pub changed_by: String,
    pub changed_by_name: Option<String>,
    pub created_at: String,
}

/// A row from the `conversations` table (chat widget transcripts).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbConversation {
    pub id: String,
    pub lead_id: String,
    /// "chat" or "voice".
    pub channel: String,
    pub started_at: String,
}

/// A row from the `messages` table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbMessage {
    pub id: String,
    pub conversation_id: String,
    /// "visitor", "concierge", "assistant".
    pub role: String,
    pub body: String,
    pub sent_at: String,
}
