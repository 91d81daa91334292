//! HTTP surface for the back office and the public capture widgets.
//!
//! Informal REST: JSON in, JSON out, with the `{ "ok": bool, ... }` envelope
//! the front ends expect. Handlers stay thin — gather under the DB lock,
//! call upstream services without it, and let [`ApiError`] translate the
//! error taxonomy into status codes at this boundary only.

use std::sync::{Arc, MutexGuard};

use axum::extract::{Json, Path, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::db::{DbConversation, DbMessage, LeadDb};
use crate::email;
use crate::error::AppError;
use crate::intelligence;
use crate::services::leads::{self, Actor, NewLead};
use crate::services::pipeline;
use crate::state::AppState;

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    // The capture widgets are embedded on customer sites; the back office
    // runs on its own origin. Both talk JSON with no cookies, so a
    // permissive CORS policy is the intended posture.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        // Lead lifecycle
        .route("/api/leads", post(create_lead).get(list_leads))
        .route("/api/leads/:id", get(get_lead).delete(remove_lead))
        .route("/api/leads/:id/stage", patch(change_stage))
        .route("/api/leads/:id/priority", patch(change_priority))
        .route("/api/leads/:id/value", patch(set_deal_value))
        .route("/api/leads/:id/assign", post(assign))
        .route("/api/leads/:id/qualify", post(qualify))
        .route("/api/leads/:id/invite", post(invite))
        .route("/api/leads/:id/audit", get(audit_trail))
        .route("/api/leads/:id/conversations", get(lead_conversations))
        // Chat capture write path
        .route("/api/conversations", post(create_conversation))
        .route("/api/conversations/:id/messages", post(add_message))
        // Reporting
        .route("/api/forecast", get(forecast))
        // Health check
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Error envelope
// =============================================================================

pub struct ApiError(pub AppError);

impl<E: Into<AppError>> From<E> for ApiError {
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

/// Build the `{ ok: false, ... }` error body. `InvalidResponse` carries the
/// raw upstream text so the back office can show what the model actually
/// said.
fn error_body(err: &AppError) -> Value {
    let mut body = json!({ "ok": false, "error": err.to_string() });
    if let AppError::InvalidResponse { raw, .. } = err {
        body["raw"] = json!(raw);
    }
    body
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            log::error!("Request failed: {}", self.0);
        } else {
            log::warn!("Request rejected: {}", self.0);
        }
        (status, Json(error_body(&self.0))).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn db_guard(state: &AppState) -> Result<MutexGuard<'_, LeadDb>, AppError> {
    state
        .db
        .lock()
        .map_err(|_| AppError::Storage(crate::db::DbError::LockPoisoned))
}

// =============================================================================
// Request payloads
// =============================================================================

/// Who is making the change. Absent fields mean an automated caller.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ActorFields {
    changed_by: Option<String>,
    changed_by_name: Option<String>,
}

impl ActorFields {
    fn actor(&self) -> Actor {
        match self.changed_by.as_deref() {
            Some(id) if !id.trim().is_empty() => Actor {
                id: id.to_string(),
                name: self.changed_by_name.clone(),
            },
            _ => Actor::system(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateLeadRequest {
    name: String,
    kind: String,
    #[serde(default)]
    email: Option<String>,
    source: String,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    deal_value: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StageRequest {
    stage: String,
    #[serde(flatten)]
    actor: ActorFields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriorityRequest {
    priority: String,
    #[serde(flatten)]
    actor: ActorFields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRequest {
    deal_value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignRequest {
    operator: String,
    #[serde(flatten)]
    actor: ActorFields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversationRequest {
    lead_id: String,
    #[serde(default = "default_channel")]
    channel: String,
}

fn default_channel() -> String {
    "chat".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRequest {
    role: String,
    body: String,
}

// =============================================================================
// Handlers — lead lifecycle
// =============================================================================

async fn health() -> Json<Value> {
    Json(json!({ "ok": true, "service": "gardenia", "version": env!("CARGO_PKG_VERSION") }))
}

async fn create_lead(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateLeadRequest>,
) -> ApiResult {
    let db = db_guard(&state)?;
    let lead = leads::create_lead(
        &db,
        NewLead {
            name: req.name,
            kind: req.kind,
            email: req.email,
            source: req.source,
            notes: req.notes,
            deal_value: req.deal_value,
        },
    )?;
    Ok(Json(json!({ "ok": true, "lead": lead })))
}

async fn list_leads(State(state): State<Arc<AppState>>) -> ApiResult {
    let db = db_guard(&state)?;
    let leads = leads::list_lead_views(&db)?;
    Ok(Json(json!({ "ok": true, "leads": leads })))
}

async fn get_lead(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let db = db_guard(&state)?;
    let lead = leads::get_lead_view(&db, &id)?;
    Ok(Json(json!({ "ok": true, "lead": lead })))
}

async fn change_stage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<StageRequest>,
) -> ApiResult {
    let db = db_guard(&state)?;
    let lead = leads::change_stage(&db, &id, &req.stage, &req.actor.actor())?;
    Ok(Json(json!({ "ok": true, "lead": lead })))
}

async fn change_priority(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<PriorityRequest>,
) -> ApiResult {
    let db = db_guard(&state)?;
    let lead = leads::change_priority(&db, &id, &req.priority, &req.actor.actor())?;
    Ok(Json(json!({ "ok": true, "lead": lead })))
}

async fn set_deal_value(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ValueRequest>,
) -> ApiResult {
    let db = db_guard(&state)?;
    let lead = leads::set_deal_value(&db, &id, req.deal_value)?;
    Ok(Json(json!({ "ok": true, "lead": lead })))
}

async fn assign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> ApiResult {
    let db = db_guard(&state)?;
    let lead = leads::assign_lead(&db, &id, &req.operator, &req.actor.actor())?;
    Ok(Json(json!({ "ok": true, "lead": lead })))
}

/// Run the LLM qualification step for a lead.
///
/// Two phases: snapshot the lead under the lock, call the model without it,
/// then re-lock to apply the assessment.
async fn qualify(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let lead = {
        let db = db_guard(&state)?;
        db.get_lead(&id)?
            .ok_or_else(|| AppError::not_found(format!("Lead not found: {}", id)))?
    };

    let assessment = intelligence::request_assessment(&state.http, &state.config.llm, &lead).await?;

    let updated = {
        let db = db_guard(&state)?;
        leads::apply_qualification(&db, &id, &assessment)?
    };

    Ok(Json(json!({ "ok": true, "lead": updated, "assessment": {
        "score": assessment.score,
        "summary": assessment.summary,
    }})))
}

/// Record the invitation and dispatch the email in the background.
/// A failed send is logged, not retried, and does not undo the record.
async fn invite(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let (lead, message) = {
        let db = db_guard(&state)?;
        let lead = leads::record_invitation(&db, &id, &Actor::system())?;
        let recipient = lead.email.clone().unwrap_or_default();
        let message = email::build_invitation_email(&lead, &recipient);
        (lead, message)
    };

    let client = state.http.clone();
    let email_config = state.config.email.clone();
    tokio::spawn(async move {
        if let Err(e) = email::send(&client, &email_config, &message).await {
            log::warn!("Invitation email to {} failed: {}", message.to, e);
        }
    });

    Ok(Json(json!({ "ok": true, "lead": lead })))
}

async fn audit_trail(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let db = db_guard(&state)?;
    // 404 for unknown leads rather than an empty trail
    if db.get_lead(&id)?.is_none() {
        return Err(AppError::not_found(format!("Lead not found: {}", id)).into());
    }
    let entries = db.get_audit_for_lead(&id, 100)?;
    Ok(Json(json!({ "ok": true, "entries": entries })))
}

async fn remove_lead(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let db = db_guard(&state)?;
    leads::delete_lead(&db, &id)?;
    Ok(Json(json!({ "ok": true })))
}

async fn forecast(State(state): State<Arc<AppState>>) -> ApiResult {
    let db = db_guard(&state)?;
    let report = pipeline::pipeline_forecast(&db)?;
    Ok(Json(json!({ "ok": true, "forecast": report })))
}

// =============================================================================
// Handlers — chat capture
// =============================================================================

async fn create_conversation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConversationRequest>,
) -> ApiResult {
    let db = db_guard(&state)?;
    if db.get_lead(&req.lead_id)?.is_none() {
        return Err(AppError::not_found(format!("Lead not found: {}", req.lead_id)).into());
    }

    let conversation = DbConversation {
        id: Uuid::new_v4().to_string(),
        lead_id: req.lead_id,
        channel: req.channel,
        started_at: Utc::now().to_rfc3339(),
    };
    db.insert_conversation(&conversation)?;
    Ok(Json(json!({ "ok": true, "conversation": conversation })))
}

async fn add_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> ApiResult {
    let db = db_guard(&state)?;
    let conversation = db
        .get_conversation(&id)?
        .ok_or_else(|| AppError::not_found(format!("Conversation not found: {}", id)))?;

    let message = DbMessage {
        id: Uuid::new_v4().to_string(),
        conversation_id: conversation.id,
        role: req.role,
        body: req.body,
        sent_at: Utc::now().to_rfc3339(),
    };
    db.insert_message(&message)?;

    // A new message is activity on the lead
    let _ = db.touch_lead(&conversation.lead_id);

    Ok(Json(json!({ "ok": true, "message": message })))
}

async fn lead_conversations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let db = db_guard(&state)?;
    if db.get_lead(&id)?.is_none() {
        return Err(AppError::not_found(format!("Lead not found: {}", id)).into());
    }
    let conversations = db.get_conversations_for_lead(&id)?;
    Ok(Json(json!({ "ok": true, "conversations": conversations })))
}

// =============================================================================
// Tests
// =============================================================================
