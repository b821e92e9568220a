use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::require_text;
use super::target::{CreateTargetInput, Target};
use crate::{Error, Result};

pub const MAX_TITLE_LEN: usize = 200;
pub const MIN_TARGETS: usize = 1;
pub const MAX_TARGETS: usize = 3;

/// A field operation, optionally assigned to one cat.
///
/// `completed` is derived from the mission's targets (see [`derive_completed`])
/// and is never written by clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mission {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assigned_cat_id: Option<Uuid>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

/// A mission is completed iff it has at least one target and every target is completed.
pub fn derive_completed(targets: &[Target]) -> bool {
    !targets.is_empty() && targets.iter().all(Target::is_completed)
}

/// Input for creating a mission together with its targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMissionInput {
    pub title: String,
    pub description: Option<String>,
    pub targets: Vec<CreateTargetInput>,
}

impl CreateMissionInput {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_TARGETS..=MAX_TARGETS).contains(&self.targets.len()) {
            return Err(Error::validation("1 to 3 targets required"));
        }
        require_text("title", &self.title, MAX_TITLE_LEN)?;
        self.targets
            .iter()
            .try_for_each(CreateTargetInput::validate)
    }
}

/// Input for updating a mission. Only the descriptive fields are writable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMissionInput {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl UpdateMissionInput {
    pub fn validate(&self) -> Result<()> {
        match &self.title {
            Some(title) => require_text("title", title, MAX_TITLE_LEN),
            None => Ok(()),
        }
    }
}

/// Body of an assignment request.
///
/// `cat_id` stays raw text so that a blank value reads as missing and an
/// unparsable one as an unknown cat, instead of failing JSON extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignCatInput {
    pub cat_id: Option<String>,
}

/// A mission with its targets in creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionWithTargets {
    #[serde(flatten)]
    pub mission: Mission,
    pub targets: Vec<Target>,
}

/// Query parameters for listing missions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListMissionsQuery {
    pub completed: Option<bool>,
    pub cat_id: Option<Uuid>,
    /// Case-insensitive substring matched against title and description.
    pub q: Option<String>,
}
