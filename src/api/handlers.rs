//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    AddActivityRequest, ContactListResponse, ContactResponse, ConversationListResponse,
    ConversationResponse, ConversationWithMessagesResponse, CreateKbEntryRequest, ErrorResponse,
    IngressRequest, IngressResponse, KbListResponse, SendMessageRequest,
    StartConversationRequest, SuccessResponse, TakeOverRequest, TeamResponse,
    UpdateStageRequest,
};
use super::AppState;
use crate::db::Ownership;
use crate::provisioning;
use crate::runtime::SseEvent;
use crate::state_machine::Event;
use crate::visibility::{self, Viewer};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Transport ingress (stand-in for the real messaging integration)
        .route("/api/ingress", post(ingress))
        // Conversations
        .route(
            "/api/conversations",
            get(list_conversations).post(start_conversation),
        )
        .route("/api/conversations/:id", get(get_conversation))
        .route("/api/conversations/:id/stream", get(stream_conversation))
        .route("/api/conversations/:id/messages", post(send_message))
        .route("/api/conversations/:id/take_over", post(take_over))
        .route(
            "/api/conversations/:id/return_to_automated",
            post(return_to_automated),
        )
        .route("/api/conversations/:id/read", post(mark_read))
        // CRM contacts
        .route("/api/contacts", get(list_contacts))
        .route("/api/contacts/:id", get(get_contact).delete(delete_contact))
        .route("/api/contacts/:id/stage", post(update_stage))
        .route("/api/contacts/:id/activities", post(add_activity))
        // Responder knowledge base
        .route("/api/knowledge", get(list_knowledge).post(add_knowledge))
        // Roster
        .route("/api/team", get(get_team))
        .with_state(state)
}

/// Resolve the requesting human from the `x-agent-id` header against the
/// roster. Every command and read is scoped to a known team member.
fn viewer_from_headers(headers: &HeaderMap, state: &AppState) -> Result<Viewer, AppError> {
    let agent_id = headers
        .get("x-agent-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing x-agent-id header".to_string()))?;

    Viewer::from_roster(&state.team, agent_id)
        .ok_or_else(|| AppError::Forbidden(format!("Unknown agent: {agent_id}")))
}

// ============================================================
// Transport ingress
// ============================================================

async fn ingress(
    State(state): State<AppState>,
    Json(req): Json<IngressRequest>,
) -> Result<Json<IngressResponse>, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("Empty message text".to_string()));
    }

    let db = state.runtime.db();
    let conversation = match db
        .get_conversation_by_contact(&req.contact_id)
        .map_err(|e| AppError::Internal(e.to_string()))?
    {
        Some(existing) => existing,
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            let display_name = req.name.clone().unwrap_or_else(|| req.contact_id.clone());
            let conversation = db
                .create_conversation(
                    &id,
                    &req.contact_id,
                    &display_name,
                    req.avatar.as_deref(),
                    &Ownership::Automated,
                )
                .map_err(|e| AppError::Internal(e.to_string()))?;

            // The registry changed: make sure the party has a CRM contact
            provisioning::reconcile(db, state.runtime.config(), Utc::now())
                .map_err(|e| AppError::Internal(e.to_string()))?;

            conversation
        }
    };

    let first_interaction = db
        .count_contact_messages(&conversation.id)
        .map_err(|e| AppError::Internal(e.to_string()))?
        == 0;

    state
        .runtime
        .send_event(
            &conversation.id,
            Event::CustomerMessage {
                text: req.text,
                first_interaction,
            },
        )
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(IngressResponse {
        conversation_id: conversation.id,
        queued: true,
    }))
}

// ============================================================
// Conversation reads (visibility recomputed per request)
// ============================================================

async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConversationListResponse>, AppError> {
    let viewer = viewer_from_headers(&headers, &state)?;
    let conversations = state
        .runtime
        .db()
        .list_conversations()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(ConversationListResponse {
        conversations: visibility::filter_conversations(conversations, &viewer, &state.team),
    }))
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ConversationWithMessagesResponse>, AppError> {
    let viewer = viewer_from_headers(&headers, &state)?;
    let conversation = state
        .runtime
        .db()
        .get_conversation(&id)
        .map_err(|e| AppError::NotFound(e.to_string()))?;

    // A conversation that left the viewer's scope reads as absent, so a
    // client holding it open drops its reference
    if !visibility::conversation_visible(&conversation, &viewer, &state.team) {
        return Err(AppError::NotFound(format!("Conversation not found: {id}")));
    }

    let messages = state
        .runtime
        .db()
        .get_messages(&id)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(ConversationWithMessagesResponse {
        conversation,
        messages,
    }))
}

async fn stream_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let viewer = viewer_from_headers(&headers, &state)?;
    let conversation = state
        .runtime
        .db()
        .get_conversation(&id)
        .map_err(|e| AppError::NotFound(e.to_string()))?;

    if !visibility::conversation_visible(&conversation, &viewer, &state.team) {
        return Err(AppError::NotFound(format!("Conversation not found: {id}")));
    }

    let messages = state
        .runtime
        .db()
        .get_messages(&id)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let broadcast_rx = state
        .runtime
        .subscribe(&id)
        .await
        .map_err(AppError::Internal)?;

    let init_event = SseEvent::Init {
        conversation: Box::new(conversation),
        messages,
    };

    Ok(sse_stream(init_event, broadcast_rx))
}

// ============================================================
// Conversation commands
// ============================================================

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let viewer = viewer_from_headers(&headers, &state)?;
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("Empty message text".to_string()));
    }

    let conversation = state
        .runtime
        .db()
        .get_conversation(&id)
        .map_err(|e| AppError::NotFound(e.to_string()))?;
    if !visibility::conversation_visible(&conversation, &viewer, &state.team) {
        return Err(AppError::NotFound(format!("Conversation not found: {id}")));
    }

    state
        .runtime
        .send_event(
            &id,
            Event::AgentMessage {
                agent_id: viewer.agent_id,
                text: req.text,
                kind: req.kind,
            },
        )
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(SuccessResponse { success: true }))
}

async fn take_over(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<TakeOverRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    viewer_from_headers(&headers, &state)?;

    // The new owner must exist in the roster at assignment time
    state
        .team
        .validate(&req.agent_id)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state
        .runtime
        .db()
        .get_conversation(&id)
        .map_err(|e| AppError::NotFound(e.to_string()))?;

    state
        .runtime
        .send_event(
            &id,
            Event::TakeOver {
                agent_id: req.agent_id,
            },
        )
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(SuccessResponse { success: true }))
}

async fn return_to_automated(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse>, AppError> {
    viewer_from_headers(&headers, &state)?;
    state
        .runtime
        .db()
        .get_conversation(&id)
        .map_err(|e| AppError::NotFound(e.to_string()))?;

    state
        .runtime
        .send_event(&id, Event::ReturnToAutomated)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(SuccessResponse { success: true }))
}

async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse>, AppError> {
    let viewer = viewer_from_headers(&headers, &state)?;
    let conversation = state
        .runtime
        .db()
        .get_conversation(&id)
        .map_err(|e| AppError::NotFound(e.to_string()))?;
    if !visibility::conversation_visible(&conversation, &viewer, &state.team) {
        return Err(AppError::NotFound(format!("Conversation not found: {id}")));
    }

    state
        .runtime
        .db()
        .mark_read(&id)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(SuccessResponse { success: true }))
}

async fn start_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<StartConversationRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    viewer_from_headers(&headers, &state)?;
    state
        .team
        .validate(&req.agent_id)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let db = state.runtime.db();
    let contact = db
        .get_contact(&req.contact_id)
        .map_err(|e| AppError::NotFound(e.to_string()))?;

    // One conversation per external party: reuse the existing thread
    if let Some(existing) = db
        .get_conversation_by_contact(&req.contact_id)
        .map_err(|e| AppError::Internal(e.to_string()))?
    {
        return Ok(Json(ConversationResponse {
            conversation: existing,
        }));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let conversation = db
        .create_conversation(
            &id,
            &contact.id,
            &contact.name,
            contact.avatar.as_deref(),
            &Ownership::human(req.agent_id),
        )
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(ConversationResponse { conversation }))
}

// ============================================================
// CRM contacts
// ============================================================

async fn list_contacts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ContactListResponse>, AppError> {
    let viewer = viewer_from_headers(&headers, &state)?;
    let contacts = state
        .runtime
        .db()
        .list_contacts()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(ContactListResponse {
        contacts: visibility::filter_contacts(contacts, &viewer, &state.team),
    }))
}

async fn get_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ContactResponse>, AppError> {
    let viewer = viewer_from_headers(&headers, &state)?;
    let contact = state
        .runtime
        .db()
        .get_contact(&id)
        .map_err(|e| AppError::NotFound(e.to_string()))?;

    if !visibility::contact_visible(&contact, &viewer, &state.team) {
        return Err(AppError::NotFound(format!("Contact not found: {id}")));
    }

    let activities = state
        .runtime
        .db()
        .list_contact_activities(&id)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(ContactResponse {
        contact,
        activities,
    }))
}

/// Elevated-only cascade: removes the contact and every conversation
/// referencing its identifier
async fn delete_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse>, AppError> {
    let viewer = viewer_from_headers(&headers, &state)?;
    if !viewer.is_elevated() {
        return Err(AppError::Forbidden(
            "Deleting contacts requires an elevated role".to_string(),
        ));
    }

    let db = state.runtime.db();
    // Stop the conversation loop before its rows disappear
    if let Some(conversation) = db
        .get_conversation_by_contact(&id)
        .map_err(|e| AppError::Internal(e.to_string()))?
    {
        state.runtime.remove(&conversation.id).await;
    }

    db.delete_contact(&id)
        .map_err(|e| AppError::NotFound(e.to_string()))?;

    Ok(Json(SuccessResponse { success: true }))
}

async fn update_stage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateStageRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let viewer = viewer_from_headers(&headers, &state)?;
    let contact = state
        .runtime
        .db()
        .get_contact(&id)
        .map_err(|e| AppError::NotFound(e.to_string()))?;
    if !visibility::contact_visible(&contact, &viewer, &state.team) {
        return Err(AppError::NotFound(format!("Contact not found: {id}")));
    }

    state
        .runtime
        .db()
        .update_contact_stage(&id, req.stage)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(SuccessResponse { success: true }))
}

async fn add_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AddActivityRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let viewer = viewer_from_headers(&headers, &state)?;
    let contact = state
        .runtime
        .db()
        .get_contact(&id)
        .map_err(|e| AppError::NotFound(e.to_string()))?;
    if !visibility::contact_visible(&contact, &viewer, &state.team) {
        return Err(AppError::NotFound(format!("Contact not found: {id}")));
    }

    state
        .runtime
        .db()
        .add_contact_activity(&id, req.kind, &req.body)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Knowledge base
// ============================================================

async fn list_knowledge(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<KbListResponse>, AppError> {
    viewer_from_headers(&headers, &state)?;
    let entries = state
        .runtime
        .db()
        .list_kb_entries()
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(KbListResponse { entries }))
}

async fn add_knowledge(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateKbEntryRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    viewer_from_headers(&headers, &state)?;
    state
        .runtime
        .db()
        .add_kb_entry(&req.question, &req.answer)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Roster
// ============================================================

async fn get_team(State(state): State<AppState>) -> Json<TeamResponse> {
    Json(TeamResponse {
        members: state.team.members().into_iter().cloned().collect(),
    })
}

// ============================================================
// Errors
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
