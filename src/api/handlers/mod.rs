use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::breeds::BreedValidator;
use crate::db::Database;
use crate::models::*;
use crate::Error;

// ============================================================
// Error Handling
// ============================================================

/// JSON body returned for every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Rule violations are returned to the client verbatim. Store failures are
/// logged in full and the client only sees a generic message.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Error::Validation(msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::Conflict(msg) => {
                tracing::warn!("Conflict: {}", msg);
                (StatusCode::CONFLICT, msg)
            }
            Error::Database(e) => {
                tracing::error!("Internal error: {}", e);
                internal()
            }
            Error::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                internal()
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Cats
// ============================================================

pub async fn list_cats(
    State(db): State<Database>,
    Query(query): Query<ListCatsQuery>,
) -> Result<Json<Vec<CatWithMission>>, Error> {
    db.get_all_cats(&query).map(Json)
}

pub async fn get_cat(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<Json<CatWithMission>, Error> {
    db.get_cat(id)?
        .map(Json)
        .ok_or_else(|| Error::not_found("Cat not found"))
}

pub async fn create_cat(
    State(db): State<Database>,
    State(breeds): State<BreedValidator>,
    Json(input): Json<CreateCatInput>,
) -> Result<(StatusCode, Json<Cat>), Error> {
    // Reject malformed input before spending a network round trip on the breed.
    input.validate()?;
    breeds.ensure_valid(&input.breed).await?;

    db.create_cat(input).map(|c| (StatusCode::CREATED, Json(c)))
}

pub async fn update_cat(
    State(db): State<Database>,
    State(breeds): State<BreedValidator>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateCatInput>,
) -> Result<Json<Cat>, Error> {
    if db.get_cat(id)?.is_none() {
        return Err(Error::not_found("Cat not found"));
    }
    input.validate()?;
    if let Some(breed) = &input.breed {
        breeds.ensure_valid(breed).await?;
    }

    db.update_cat(id, input)?
        .map(Json)
        .ok_or_else(|| Error::not_found("Cat not found"))
}

pub async fn delete_cat(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Error> {
    if db.delete_cat(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::not_found("Cat not found"))
    }
}

// ============================================================
// Missions
// ============================================================

pub async fn list_missions(
    State(db): State<Database>,
    Query(query): Query<ListMissionsQuery>,
) -> Result<Json<Vec<MissionWithTargets>>, Error> {
    db.get_all_missions(&query).map(Json)
}

pub async fn get_mission(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<Json<MissionWithTargets>, Error> {
    db.get_mission(id)?
        .map(Json)
        .ok_or_else(|| Error::not_found("Mission not found"))
}

pub async fn create_mission(
    State(db): State<Database>,
    Json(input): Json<CreateMissionInput>,
) -> Result<(StatusCode, Json<MissionWithTargets>), Error> {
    db.create_mission(input)
        .map(|m| (StatusCode::CREATED, Json(m)))
}

pub async fn update_mission(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateMissionInput>,
) -> Result<Json<MissionWithTargets>, Error> {
    db.update_mission(id, input)?
        .map(Json)
        .ok_or_else(|| Error::not_found("Mission not found"))
}

pub async fn delete_mission(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Error> {
    db.delete_mission(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_cat(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
    Json(input): Json<AssignCatInput>,
) -> Result<Json<MissionWithTargets>, Error> {
    db.assign_cat(id, input.cat_id.as_deref()).map(Json)
}

pub async fn unassign_cat(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<Json<MissionWithTargets>, Error> {
    db.unassign_cat(id).map(Json)
}

// ============================================================
// Targets
// ============================================================

pub async fn list_targets(
    State(db): State<Database>,
    Path(mission_id): Path<Uuid>,
) -> Result<Json<Vec<Target>>, Error> {
    db.get_targets(mission_id).map(Json)
}

pub async fn get_target(
    State(db): State<Database>,
    Path((mission_id, target_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Target>, Error> {
    db.get_target(mission_id, target_id).map(Json)
}

pub async fn complete_target(
    State(db): State<Database>,
    Path((mission_id, target_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<TargetCompletion>, Error> {
    db.complete_target(mission_id, target_id).map(Json)
}

pub async fn update_target_notes(
    State(db): State<Database>,
    Path((mission_id, target_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateNotesInput>,
) -> Result<Json<Target>, Error> {
    db.update_target_notes(mission_id, target_id, input.notes)
        .map(Json)
}
