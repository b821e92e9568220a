mod handlers;

use axum::{
    extract::FromRef,
    http::HeaderValue,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::breeds::BreedValidator;
use crate::db::Database;

/// Shared handler state. Handlers extract the parts they need via [`FromRef`].
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub breeds: BreedValidator,
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for BreedValidator {
    fn from_ref(state: &AppState) -> Self {
        state.breeds.clone()
    }
}

/// Router with permissive CORS, as used for local runs and tests.
pub fn create_router(db: Database, breeds: BreedValidator) -> Router {
    create_router_with_cors(db, breeds, None)
}

/// Router restricted to the given CORS origins. `None` allows any origin.
pub fn create_router_with_cors(
    db: Database,
    breeds: BreedValidator,
    cors_origins: Option<&[String]>,
) -> Router {
    let api = Router::new()
        // Cats
        .route("/cats", get(handlers::list_cats))
        .route("/cats", post(handlers::create_cat))
        .route("/cats/{id}", get(handlers::get_cat))
        .route("/cats/{id}", put(handlers::update_cat))
        .route("/cats/{id}", patch(handlers::update_cat))
        .route("/cats/{id}", delete(handlers::delete_cat))
        // Missions
        .route("/missions", get(handlers::list_missions))
        .route("/missions", post(handlers::create_mission))
        .route("/missions/{id}", get(handlers::get_mission))
        .route("/missions/{id}", put(handlers::update_mission))
        .route("/missions/{id}", patch(handlers::update_mission))
        .route("/missions/{id}", delete(handlers::delete_mission))
        .route("/missions/{id}/assign", post(handlers::assign_cat))
        .route("/missions/{id}/assign", delete(handlers::unassign_cat))
        // Targets (always through their mission)
        .route("/missions/{id}/targets", get(handlers::list_targets))
        .route(
            "/missions/{id}/targets/{target_id}",
            get(handlers::get_target),
        )
        .route(
            "/missions/{id}/targets/{target_id}/complete",
            post(handlers::complete_target),
        )
        .route(
            "/missions/{id}/targets/{target_id}/notes",
            patch(handlers::update_target_notes),
        )
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors_origins)),
        )
        .with_state(AppState { db, breeds })
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
