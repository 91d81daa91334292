//! Lead lifecycle orchestration.
//!
//! Each operation is one synchronous read-derive-write-audit cycle. The
//! write and its audit entry commit in a single transaction: a stage can
//! never change without leaving its trail, and a failed audit insert rolls
//! the field mutation back with it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::{DbAuditEntry, DbLead, LeadDb};
use crate::error::AppError;
use crate::intelligence::QualificationAssessment;
use crate::risk::{self, RiskInputs};
use crate::scoring::{self, ProbabilityInputs};

/// Actor name recorded when a change is automated rather than human.
pub const SYSTEM_ACTOR: &str = "System";

const PRIORITIES: [&str; 3] = ["HOT", "WARM", "COLD"];

/// Who is making a change, for the audit trail.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub name: Option<String>,
}

impl Actor {
    pub fn system() -> Self {
        Actor {
            id: SYSTEM_ACTOR.to_string(),
            name: None,
        }
    }
}

/// Fields accepted when a capture surface submits a new lead.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub name: String,
    pub kind: String,
    pub email: Option<String>,
    pub source: String,
    pub notes: Option<String>,
    pub deal_value: Option<f64>,
}

/// A lead as the back office sees it: stored fields plus the risk score,
/// which is recomputed on every read rather than persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadView {
    #[serde(flatten)]
    pub lead: DbLead,
    pub risk_score: u8,
}

fn parse_ts(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn view_of(lead: DbLead, now: DateTime<Utc>) -> LeadView {
    let inputs = RiskInputs {
        stage: Some(lead.stage.as_str()),
        probability: Some(lead.deal_probability),
        assigned_to: lead.assigned_to.as_deref(),
        invited_at: parse_ts(lead.invited_at.as_deref()),
        updated_at: parse_ts(Some(lead.updated_at.as_str())),
        assigned_at: parse_ts(lead.assigned_at.as_deref()),
        priority_overridden: lead.priority_overridden,
        stage_entered_at: parse_ts(Some(lead.stage_entered_at.as_str())),
    };
    let risk_score = risk::risk_score(&inputs, now);
    LeadView { lead, risk_score }
}

fn probability_for(lead: &DbLead) -> f64 {
    let pct = scoring::deal_probability(&ProbabilityInputs {
        stage: &lead.stage,
        priority: Some(&lead.priority),
        priority_overridden: lead.priority_overridden,
    });
    f64::from(pct) / 100.0
}

fn audit_entry(
    lead_id: &str,
    action_type: &str,
    old_value: Option<String>,
    new_value: Option<String>,
    actor: &Actor,
    now: &str,
) -> DbAuditEntry {
    DbAuditEntry {
        id: Uuid::new_v4().to_string(),
        lead_id: lead_id.to_string(),
        action_type: action_type.to_string(),
        old_value,
        new_value,
        changed_by: actor.id.clone(),
        changed_by_name: actor.name.clone(),
        created_at: now.to_string(),
    }
}

fn require_lead(db: &LeadDb, id: &str) -> Result<DbLead, AppError> {
    db.get_lead(id)?
        .ok_or_else(|| AppError::not_found(format!("Lead not found: {}", id)))
}

// =============================================================================
// Operations
// =============================================================================

/// Create a lead from an application/chat/form submission. Starts in stage
/// "new" with the stage-derived probability; priority starts COLD until the
/// qualification step scores it. Creation is not a tracked mutation, so no
/// audit entry is written.
pub fn create_lead(db: &LeadDb, new: NewLead) -> Result<DbLead, AppError> {
    if new.name.trim().is_empty() {
        return Err(AppError::invalid_input("Lead name must not be empty"));
    }
    if let Some(value) = new.deal_value {
        validate_deal_value(value)?;
    }

    let now = Utc::now().to_rfc3339();
    let mut lead = DbLead {
        id: Uuid::new_v4().to_string(),
        name: new.name,
        kind: new.kind,
        email: new.email,
        source: new.source,
        notes: new.notes,
        stage: "new".to_string(),
        priority: "COLD".to_string(),
        score: None,
        deal_probability: 0.0,
        deal_value: new.deal_value,
        priority_overridden: false,
        assigned_to: None,
        assigned_at: None,
        invited_at: None,
        stage_entered_at: now.clone(),
        summary: None,
        created_at: now.clone(),
        updated_at: now,
    };
    lead.deal_probability = probability_for(&lead);

    db.upsert_lead(&lead)?;
    log::info!("Created lead '{}' ({}) from {}", lead.name, lead.id, lead.source);
    Ok(lead)
}

/// Move a lead to a new stage.
///
/// No transition-legality guard: operators may move any stage to any other,
/// including out of won/lost. Probability is recomputed from the stage map,
/// `stage_entered_at` resets, and entering "invited" stamps `invited_at`.
/// Exactly one `stage_change` audit entry records old vs. new.
pub fn change_stage(
    db: &LeadDb,
    lead_id: &str,
    new_stage: &str,
    actor: &Actor,
) -> Result<DbLead, AppError> {
    if new_stage.trim().is_empty() {
        return Err(AppError::invalid_input("Stage must not be empty"));
    }

    db.with_transaction(|db| {
        let mut lead = require_lead(db, lead_id)?;
        let old_stage = lead.stage.clone();
        let now = Utc::now().to_rfc3339();

        lead.stage = new_stage.to_string();
        lead.deal_probability = probability_for(&lead);
        lead.stage_entered_at = now.clone();
        if new_stage == "invited" {
            lead.invited_at = Some(now.clone());
        }
        lead.updated_at = now.clone();

        db.upsert_lead(&lead)?;
        db.insert_audit_entry(&audit_entry(
            lead_id,
            "stage_change",
            Some(old_stage.clone()),
            Some(new_stage.to_string()),
            actor,
            &now,
        ))?;

        log::info!(
            "Lead {} stage {} -> {} (probability {:.2}) by {}",
            lead_id,
            old_stage,
            new_stage,
            lead.deal_probability,
            actor.id
        );
        Ok(lead)
    })
}

/// Manually set a lead's priority. Marks the lead as overridden so the
/// qualification step stops re-deriving priority from the score.
pub fn change_priority(
    db: &LeadDb,
    lead_id: &str,
    new_priority: &str,
    actor: &Actor,
) -> Result<DbLead, AppError> {
    if !PRIORITIES.contains(&new_priority) {
        return Err(AppError::invalid_input(format!(
            "Unknown priority '{}'; expected one of HOT, WARM, COLD",
            new_priority
        )));
    }

    db.with_transaction(|db| {
        let mut lead = require_lead(db, lead_id)?;
        let old_priority = lead.priority.clone();
        let now = Utc::now().to_rfc3339();

        lead.priority = new_priority.to_string();
        lead.priority_overridden = true;
        lead.updated_at = now.clone();

        db.upsert_lead(&lead)?;
        db.insert_audit_entry(&audit_entry(
            lead_id,
            "priority_override",
            Some(old_priority),
            Some(new_priority.to_string()),
            actor,
            &now,
        ))?;
        Ok(lead)
    })
}

/// Assign a lead to an operator.
pub fn assign_lead(
    db: &LeadDb,
    lead_id: &str,
    operator: &str,
    actor: &Actor,
) -> Result<DbLead, AppError> {
    if operator.trim().is_empty() {
        return Err(AppError::invalid_input("Operator id must not be empty"));
    }

    db.with_transaction(|db| {
        let mut lead = require_lead(db, lead_id)?;
        let old = lead.assigned_to.clone();
        let now = Utc::now().to_rfc3339();

        lead.assigned_to = Some(operator.to_string());
        lead.assigned_at = Some(now.clone());
        lead.updated_at = now.clone();

        db.upsert_lead(&lead)?;
        db.insert_audit_entry(&audit_entry(
            lead_id,
            "assignment",
            old,
            Some(operator.to_string()),
            actor,
            &now,
        ))?;
        Ok(lead)
    })
}

/// Set the human-entered deal value. Not a tracked field, so no audit entry.
pub fn set_deal_value(db: &LeadDb, lead_id: &str, value: f64) -> Result<DbLead, AppError> {
    validate_deal_value(value)?;

    let mut lead = require_lead(db, lead_id)?;
    lead.deal_value = Some(value);
    lead.updated_at = Utc::now().to_rfc3339();
    db.upsert_lead(&lead)?;
    Ok(lead)
}

fn validate_deal_value(value: f64) -> Result<(), AppError> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::invalid_input(
            "Deal value must be a non-negative number",
        ));
    }
    Ok(())
}

/// Attach a qualification assessment (score + summary) to a lead.
///
/// While no human override is recorded, priority is re-derived from the
/// score; the derived change is audited under the System actor. Probability
/// is untouched — it follows stage only.
pub fn apply_qualification(
    db: &LeadDb,
    lead_id: &str,
    assessment: &QualificationAssessment,
) -> Result<DbLead, AppError> {
    db.with_transaction(|db| {
        let mut lead = require_lead(db, lead_id)?;
        let now = Utc::now().to_rfc3339();

        lead.score = Some(assessment.score);
        lead.summary = Some(assessment.summary.clone());
        lead.updated_at = now.clone();

        if !lead.priority_overridden {
            let derived = scoring::priority_from_score(assessment.score);
            if derived != lead.priority {
                let old_priority = lead.priority.clone();
                lead.priority = derived.to_string();
                db.insert_audit_entry(&audit_entry(
                    lead_id,
                    "priority_change",
                    Some(old_priority),
                    Some(derived.to_string()),
                    &Actor::system(),
                    &now,
                ))?;
            }
        }

        db.upsert_lead(&lead)?;
        log::info!(
            "Qualified lead {} (score {}, priority {})",
            lead_id,
            assessment.score,
            lead.priority
        );
        Ok(lead)
    })
}

/// Record that an invitation went out: stamp `invited_at` and append the
/// INVITE_SENT audit entry. The email dispatch itself is the caller's
/// fire-and-forget concern — a failed send is logged, never retried, and
/// does not undo this record.
pub fn record_invitation(db: &LeadDb, lead_id: &str, actor: &Actor) -> Result<DbLead, AppError> {
    db.with_transaction(|db| {
        let mut lead = require_lead(db, lead_id)?;
        let recipient = lead
            .email
            .clone()
            .ok_or_else(|| AppError::invalid_input("Lead has no email address"))?;
        let now = Utc::now().to_rfc3339();

        lead.invited_at = Some(now.clone());
        lead.updated_at = now.clone();

        db.upsert_lead(&lead)?;
        db.insert_audit_entry(&audit_entry(
            lead_id,
            "INVITE_SENT",
            None,
            Some(recipient),
            actor,
            &now,
        ))?;
        Ok(lead)
    })
}

/// Admin hard-delete. Cascades to the lead's conversations, messages, and
/// audit rows.
pub fn delete_lead(db: &LeadDb, lead_id: &str) -> Result<(), AppError> {
    let deleted = db.delete_lead(lead_id)?;
    if !deleted {
        return Err(AppError::not_found(format!("Lead not found: {}", lead_id)));
    }
    log::info!("Deleted lead {} and its dependents", lead_id);
    Ok(())
}

/// A single lead with its risk score recomputed as of now.
pub fn get_lead_view(db: &LeadDb, lead_id: &str) -> Result<LeadView, AppError> {
    let lead = require_lead(db, lead_id)?;
    Ok(view_of(lead, Utc::now()))
}

/// All leads with risk scores recomputed as of now, most recent first.
pub fn list_lead_views(db: &LeadDb) -> Result<Vec<LeadView>, AppError> {
    let now = Utc::now();
    Ok(db
        .get_all_leads()?
        .into_iter()
        .map(|lead| view_of(lead, now))
        .collect())
}

// =============================================================================
// Tests
// =============================================================================
