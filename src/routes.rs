use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::info;

use crate::handlers::api::{
    bootstrap, current_settings, event_form_options, event_registrants, event_zoom_settings,
    generate_zoom_attendance, list_zoom_accounts, missing_profile_fields, participant_zoom_data,
    require_api_token, upcoming_events, upsert_zoom_account, validate_zoom_entity,
    zoom_user_entities, AppState,
};
use crate::handlers::health::health_check;

pub fn create_router(app_state: Arc<AppState>, is_production: bool) -> Router {
    // Health check is always available and never authenticated
    let mut router = Router::new().route("/health", get(health_check));

    let mut api_routes = Router::new()
        .route(
            "/api/events/generate-zoom-attendance",
            post(generate_zoom_attendance),
        )
        .route("/api/events/upcoming", get(upcoming_events))
        .route("/api/events/:event_id/zoom-settings", get(event_zoom_settings))
        .route("/api/events/:event_id/form-options", get(event_form_options))
        .route("/api/events/:event_id/registrants", post(event_registrants))
        .route(
            "/api/participants/:participant_id/zoom-data",
            post(participant_zoom_data),
        )
        .route("/api/profiles/missing-fields", post(missing_profile_fields))
        .route(
            "/api/zoom/accounts",
            get(list_zoom_accounts).post(upsert_zoom_account),
        )
        .route("/api/zoom/users/:user_id/:entity", get(zoom_user_entities))
        .route("/api/zoom/validate", post(validate_zoom_entity))
        .route("/api/admin/bootstrap", post(bootstrap));

    // Settings dump only outside production
    if !is_production {
        api_routes = api_routes.route("/api/settings", get(current_settings));
        info!("Settings endpoint enabled - server running in development mode");
    } else {
        info!("Running in production mode - settings endpoint hidden");
    }

    if app_state.api_auth_token.is_some() {
        api_routes = api_routes.route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_api_token,
        ));
    }

    router = router.merge(api_routes);
    router.with_state(app_state)
}
