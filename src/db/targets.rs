use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::missions::require_mission;
use super::{opt_datetime_at, uuid_at, Database};
use crate::error::is_unique_violation;
use crate::models::*;
use crate::{Error, Result};

const TARGET_COLUMNS: &str = "id, mission_id, name, country, notes, completed, completed_at";

impl Database {
    // ============================================================
    // Target operations (always scoped to the owning mission)
    // ============================================================

    pub fn get_targets(&self, mission_id: Uuid) -> Result<Vec<Target>> {
        self.read(|conn| {
            require_mission(conn, mission_id)?;
            load_targets(conn, mission_id)
        })
    }

    pub fn get_target(&self, mission_id: Uuid, target_id: Uuid) -> Result<Target> {
        self.read(|conn| {
            require_mission(conn, mission_id)?;
            require_target(conn, mission_id, target_id)
        })
    }

    /// Marks a target completed and re-derives the mission's completion.
    ///
    /// Completing an already completed target changes nothing; the result reports
    /// `already_completed` and the original `completed_at`.
    pub fn complete_target(&self, mission_id: Uuid, target_id: Uuid) -> Result<TargetCompletion> {
        self.transaction(|conn| {
            let mission = require_mission(conn, mission_id)?;
            let mut target = require_target(conn, mission_id, target_id)?;

            if !target.complete(Utc::now()) {
                return Ok(TargetCompletion {
                    target,
                    mission_completed: mission.completed,
                    already_completed: true,
                });
            }

            conn.execute(
                "UPDATE targets SET completed = 1, completed_at = ? WHERE id = ? AND completed = 0",
                (
                    target.completed_at.map(|at| at.to_rfc3339()),
                    target_id.to_string(),
                ),
            )?;
            tracing::info!(%mission_id, %target_id, "Completed target {}", target.name);

            let mission_completed = recompute_completion(conn, mission_id)?;

            Ok(TargetCompletion {
                target,
                mission_completed,
                already_completed: false,
            })
        })
    }

    /// Overwrites a target's notes while both the target and its mission are open.
    pub fn update_target_notes(
        &self,
        mission_id: Uuid,
        target_id: Uuid,
        notes: Option<String>,
    ) -> Result<Target> {
        self.transaction(|conn| {
            let mission = require_mission(conn, mission_id)?;
            let target = require_target(conn, mission_id, target_id)?;
            let notes = notes.ok_or_else(|| Error::validation("notes required"))?;

            match target.state() {
                TargetState::Open if !mission.completed => {}
                _ => {
                    return Err(Error::validation(
                        "cannot edit notes on completed target or mission",
                    ))
                }
            }

            conn.execute(
                "UPDATE targets SET notes = ? WHERE id = ?",
                (&notes, target_id.to_string()),
            )?;

            Ok(Target { notes, ..target })
        })
    }

    /// Re-derives every mission's `completed` flag from its targets and returns
    /// how many flags were corrected.
    ///
    /// Target writes keep the flag current; this repairs databases edited by
    /// hand or restored from elsewhere.
    pub fn repair_mission_completion(&self) -> Result<usize> {
        self.transaction(|conn| {
            let mut stmt = conn.prepare("SELECT id, completed FROM missions ORDER BY created_at")?;
            let stored = stmt
                .query_map([], |row| Ok((uuid_at(row, 0)?, row.get::<_, bool>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;

            let mut repaired = 0;
            for (mission_id, was_completed) in stored {
                let completed = recompute_completion(conn, mission_id).map_err(|e| match e {
                    Error::Database(ref db_err) if is_unique_violation(db_err) => {
                        Error::conflict(format!(
                            "mission {mission_id} cannot reopen: its cat already has an active mission"
                        ))
                    }
                    other => other,
                })?;
                if completed != was_completed {
                    repaired += 1;
                }
            }

            tracing::info!(repaired, "Repaired mission completion flags");
            Ok(repaired)
        })
    }
}

/// Stores `derive_completed` of the mission's targets, writing only on change.
fn recompute_completion(conn: &Connection, mission_id: Uuid) -> Result<bool> {
    let targets = load_targets(conn, mission_id)?;
    let completed = derive_completed(&targets);

    let changed = conn.execute(
        "UPDATE missions SET completed = ? WHERE id = ? AND completed != ?",
        (completed, mission_id.to_string(), completed),
    )?;
    if changed > 0 {
        tracing::info!(%mission_id, completed, "Mission completion changed");
    }

    Ok(completed)
}

pub(super) fn insert_target(
    conn: &Connection,
    mission_id: Uuid,
    position: usize,
    input: CreateTargetInput,
) -> Result<Target> {
    let target = Target {
        id: Uuid::new_v4(),
        mission_id,
        name: input.name,
        country: input.country,
        notes: input.notes,
        completed: false,
        completed_at: None,
    };

    conn.execute(
        "INSERT INTO targets
         (id, mission_id, position, name, country, notes, completed, completed_at)
         VALUES (?, ?, ?, ?, ?, ?, 0, NULL)",
        (
            target.id.to_string(),
            mission_id.to_string(),
            position as i64,
            &target.name,
            &target.country,
            &target.notes,
        ),
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::conflict(format!(
                "target name '{}' is already used in this mission",
                target.name
            ))
        } else {
            e.into()
        }
    })?;

    Ok(target)
}

pub(super) fn load_targets(conn: &Connection, mission_id: Uuid) -> Result<Vec<Target>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TARGET_COLUMNS} FROM targets WHERE mission_id = ? ORDER BY position"
    ))?;
    let targets = stmt
        .query_map([mission_id.to_string()], target_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(targets)
}

fn require_target(conn: &Connection, mission_id: Uuid, target_id: Uuid) -> Result<Target> {
    conn.query_row(
        &format!("SELECT {TARGET_COLUMNS} FROM targets WHERE id = ? AND mission_id = ?"),
        (target_id.to_string(), mission_id.to_string()),
        target_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("Target not found for this mission"))
}

fn target_from_row(row: &Row<'_>) -> rusqlite::Result<Target> {
    Ok(Target {
        id: uuid_at(row, 0)?,
        mission_id: uuid_at(row, 1)?,
        name: row.get(2)?,
        country: row.get(3)?,
        notes: row.get(4)?,
        completed: row.get(5)?,
        completed_at: opt_datetime_at(row, 6)?,
    })
}
