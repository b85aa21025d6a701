use axum::{
    extract::{Json as ExtractJson, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use chrono::{Local, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::client::ZoomApi;
use crate::crm::CrmApi;
use crate::error::SyncError;
use crate::models::api::{
    AccountQuery, AttendanceRequest, MessageResponse, ProfileCheckRequest, ProfileCheckResponse,
    RegistrantsRequest, RegistrantsResponse, ValidateRequest, ZoomDataRequest, ZoomDataResponse,
};
use crate::models::crm::CrmEvent;
use crate::models::settings::{ZoomAccount, ZoomSettings};
use crate::models::zoom::ZoomEntityKind;
use crate::services::attendance::{AttendanceReconciler, AttendanceReport};
use crate::services::bootstrap::{Bootstrap, BootstrapReport};
use crate::services::events::{EventFormOptions, EventService};
use crate::services::notifier::EmailNotifier;
use crate::services::participant_sync::ParticipantSync;
use crate::services::profiles::ProfileChecker;
use crate::services::registrants::{filter_registrants_by_time, RegistrantNotes};
use crate::services::settings::SettingsService;
use crate::services::zoom_entities::{EntityValidation, ZoomEntityService};

// AppState struct containing shared resources
pub struct AppState {
    pub crm: Arc<dyn CrmApi>,
    pub zoom: Arc<dyn ZoomApi>,
    pub settings: Arc<SettingsService>,
    pub api_auth_token: Option<String>,
}

/// Reject `/api` requests without the configured bearer token
pub async fn require_api_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = &state.api_auth_token {
        let provided = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        if provided != Some(expected.as_str()) {
            warn!("Rejected {} {}: invalid API token", request.method(), request.uri().path());
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "success": false,
                    "message": "Invalid or missing API token",
                })),
            )
                .into_response();
        }
    }

    next.run(request).await
}

// Mark attendees of events that ended in the last `days` days
pub async fn generate_zoom_attendance(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<AttendanceRequest>,
) -> Result<Json<AttendanceReport>, SyncError> {
    let days = request
        .days
        .ok_or_else(|| SyncError::MissingParams("days".to_string()))?;
    info!("Received request to generate Zoom attendance for the last {} days", days);

    let reconciler = AttendanceReconciler::new(
        state.crm.clone(),
        state.zoom.clone(),
        state.settings.clone(),
    );
    let report = reconciler
        .generate_attendance(days, Local::now().date_naive())
        .await?;

    info!(
        "Attendance generated for {} events, {} participants updated",
        report.events.len(),
        report.updated_participants
    );
    Ok(Json(report))
}

pub async fn upcoming_events(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CrmEvent>>, SyncError> {
    let events = EventService::new(state.crm.clone(), state.settings.clone())
        .upcoming_events(Local::now().date_naive())
        .await?;
    Ok(Json(events))
}

// Zoom settings resolved through the event's account, secrets masked
pub async fn event_zoom_settings(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> Result<Json<ZoomSettings>, SyncError> {
    let settings = state
        .settings
        .zoom_settings_for_event(state.crm.as_ref(), event_id)
        .await?;
    Ok(Json(settings.redacted()))
}

pub async fn event_form_options(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> Result<Json<EventFormOptions>, SyncError> {
    let event_id = Some(event_id).filter(|id| *id > 0);
    let options = EventService::new(state.crm.clone(), state.settings.clone())
        .event_form_options(event_id)
        .await?;
    Ok(Json(options))
}

/// Store recent registrants in the event notes and optionally mail them out
pub async fn event_registrants(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    ExtractJson(request): ExtractJson<RegistrantsRequest>,
) -> Result<Json<RegistrantsResponse>, SyncError> {
    info!(
        "Received {} Zoom registrants for event {}",
        request.registrants.len(),
        event_id
    );

    let recent = filter_registrants_by_time(&request.registrants, request.mins_back, Utc::now());
    if recent.is_empty() {
        info!("No registrants within the last {} minutes", request.mins_back);
        return Ok(Json(RegistrantsResponse {
            success: true,
            event_id,
            recent_registrants: 0,
            notes: None,
            emails: Vec::new(),
        }));
    }

    let notes = RegistrantNotes::new(state.crm.clone())
        .update_registrants_to_notes(event_id, &recent)
        .await?;

    let mut emails = Vec::new();
    if let Some(to_emails) = request.notify_emails.as_deref().filter(|e| !e.trim().is_empty()) {
        let event_title = match request.event_title.clone() {
            Some(title) => title,
            None => state
                .crm
                .get_events(json!({ "id": event_id }))
                .await?
                .into_iter()
                .next()
                .and_then(|event| event.title)
                .unwrap_or_default(),
        };

        emails = EmailNotifier::new(state.crm.clone(), state.settings.clone())
            .send_registrants_email(to_emails, &recent, &event_title)
            .await?;
    }

    Ok(Json(RegistrantsResponse {
        success: true,
        event_id,
        recent_registrants: recent.len(),
        notes: Some(notes.message),
        emails,
    }))
}

pub async fn participant_zoom_data(
    State(state): State<Arc<AppState>>,
    Path(participant_id): Path<i64>,
    ExtractJson(request): ExtractJson<ZoomDataRequest>,
) -> Result<Json<ZoomDataResponse>, SyncError> {
    let updated = ParticipantSync::new(state.crm.clone(), state.settings.clone())
        .update_zoom_participant_data(participant_id, request.data)
        .await?;

    Ok(Json(ZoomDataResponse {
        success: true,
        participant_id,
        updated,
    }))
}

pub async fn missing_profile_fields(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<ProfileCheckRequest>,
) -> Json<ProfileCheckResponse> {
    let missing_fields = ProfileChecker::new(state.crm.clone())
        .missing_profile_fields(&request.profile_ids, &request.fields)
        .await;
    Json(ProfileCheckResponse { missing_fields })
}

pub async fn list_zoom_accounts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<i64, String>>, SyncError> {
    Ok(Json(state.settings.account_names_and_ids()?))
}

pub async fn upsert_zoom_account(
    State(state): State<Arc<AppState>>,
    ExtractJson(account): ExtractJson<ZoomAccount>,
) -> Result<Json<MessageResponse>, SyncError> {
    if account.id <= 0 || account.name.trim().is_empty() {
        return Err(SyncError::MissingParams(
            "account id and name are required".to_string(),
        ));
    }

    let id = account.id;
    state.settings.upsert_account(account)?;
    info!("Saved Zoom account {}", id);

    Ok(Json(MessageResponse {
        success: true,
        message: format!("Zoom account {} saved", id),
    }))
}

pub async fn zoom_user_entities(
    State(state): State<Arc<AppState>>,
    Path((user_id, entity)): Path<(String, String)>,
    Query(query): Query<AccountQuery>,
) -> Result<Json<EntityValidation>, SyncError> {
    let kind: ZoomEntityKind = entity.parse().map_err(SyncError::MissingParams)?;

    let listing = ZoomEntityService::new(state.zoom.clone(), state.settings.clone())
        .meetings_webinars_by_user_id(query.account_id, &user_id, kind)
        .await?;

    Ok(Json(match listing {
        Ok(entities) => EntityValidation::Valid { entities },
        Err(message) => EntityValidation::Invalid { message },
    }))
}

pub async fn validate_zoom_entity(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<ValidateRequest>,
) -> Result<Json<EntityValidation>, SyncError> {
    let validation = ZoomEntityService::new(state.zoom.clone(), state.settings.clone())
        .validate_meeting_webinar_by_user_id(
            request.account_id,
            &request.user_id,
            &request.entity_id,
            request.entity,
        )
        .await?;
    Ok(Json(validation))
}

pub async fn bootstrap(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BootstrapReport>, SyncError> {
    let report = Bootstrap::new(state.crm.clone(), state.settings.clone())
        .run()
        .await?;
    Ok(Json(report))
}

// Merged global settings for debugging, development only
pub async fn current_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ZoomSettings>, SyncError> {
    Ok(Json(state.settings.zoom_settings(None)?.redacted()))
}

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;
