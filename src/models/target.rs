use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::require_text;
use crate::Result;

pub const MAX_TARGET_NAME_LEN: usize = 200;
pub const MAX_COUNTRY_LEN: usize = 100;

/// A person or place under surveillance within a mission.
///
/// Targets are created together with their mission and are only read through it.
/// `completed` moves from false to true exactly once; `completed_at` is stamped
/// at that moment and is `None` for as long as the target is open.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Target {
    pub id: Uuid,
    pub mission_id: Uuid,
    /// Unique within the owning mission (exact byte comparison).
    pub name: String,
    pub country: String,
    pub notes: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Lifecycle of a target.
///
/// - `Open`: being worked; notes may be edited
/// - `Completed`: finished; terminal, notes are locked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Open,
    Completed { at: DateTime<Utc> },
}

impl Target {
    pub fn state(&self) -> TargetState {
        match (self.completed, self.completed_at) {
            (true, Some(at)) => TargetState::Completed { at },
            // The schema forbids completed without a timestamp; treat it as open
            // so that completing it stamps the missing time.
            _ => TargetState::Open,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state(), TargetState::Completed { .. })
    }

    /// Applies the Open → Completed transition.
    ///
    /// Returns `false` and leaves the target untouched when it is already completed.
    pub fn complete(&mut self, now: DateTime<Utc>) -> bool {
        match self.state() {
            TargetState::Completed { .. } => false,
            TargetState::Open => {
                self.completed = true;
                self.completed_at = Some(now);
                true
            }
        }
    }
}

/// Input for one target of a new mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTargetInput {
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub notes: String,
}

impl CreateTargetInput {
    pub fn validate(&self) -> Result<()> {
        require_text("target name", &self.name, MAX_TARGET_NAME_LEN)?;
        require_text("country", &self.country, MAX_COUNTRY_LEN)
    }
}

/// Body of a notes update. `notes` is required; an absent field is rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateNotesInput {
    pub notes: Option<String>,
}

/// Result of completing a target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetCompletion {
    pub target: Target,
    /// The owning mission's completion flag after the cascade ran.
    pub mission_completed: bool,
    /// True when the target had been completed by an earlier request.
    pub already_completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_target() -> Target {
        Target {
            id: Uuid::new_v4(),
            mission_id: Uuid::new_v4(),
            name: "Dr. Bark".to_string(),
            country: "Belgium".to_string(),
            notes: String::new(),
            completed: false,
            completed_at: None,
        }
    }

    #[test]
    fn new_targets_are_open() {
        assert_eq!(open_target().state(), TargetState::Open);
    }

    #[test]
    fn completing_stamps_time_once() {
        let mut target = open_target();
        let first = Utc::now();
        assert!(target.complete(first));
        assert_eq!(target.state(), TargetState::Completed { at: first });

        let later = first + chrono::Duration::seconds(30);
        assert!(!target.complete(later));
        assert_eq!(target.completed_at, Some(first));
        assert!(target.completed);
    }

    #[test]
    fn create_input_rejects_unknown_fields() {
        let parsed = serde_json::from_str::<CreateTargetInput>(
            r#"{"name": "A", "country": "X", "completed": true}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn create_input_defaults_notes_to_empty() {
        let parsed: CreateTargetInput =
            serde_json::from_str(r#"{"name": "A", "country": "X"}"#).unwrap();
        assert_eq!(parsed.notes, "");
    }
}
