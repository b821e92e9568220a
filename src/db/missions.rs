use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, ToSql};
use uuid::Uuid;

use super::{
    datetime_at, like_pattern, load_cat, opt_uuid_at, targets, uuid_at, where_clause, Database,
};
use crate::error::is_unique_violation;
use crate::models::*;
use crate::{Error, Result};

const MISSION_COLUMNS: &str = "id, title, description, assigned_cat_id, completed, created_at";

const ACTIVE_MISSION_TAKEN: &str = "cat already has an active mission";

impl Database {
    // ============================================================
    // Mission operations
    // ============================================================

    pub fn get_all_missions(&self, query: &ListMissionsQuery) -> Result<Vec<MissionWithTargets>> {
        let mut clauses = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(completed) = query.completed {
            clauses.push("completed = ?");
            params.push(Box::new(completed));
        }
        if let Some(cat_id) = query.cat_id {
            clauses.push("assigned_cat_id = ?");
            params.push(Box::new(cat_id.to_string()));
        }
        if let Some(pattern) = query.q.as_deref().and_then(like_pattern) {
            clauses.push("(title LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\')");
            params.push(Box::new(pattern.clone()));
            params.push(Box::new(pattern));
        }

        let sql = format!(
            "SELECT {MISSION_COLUMNS} FROM missions{} ORDER BY created_at, title",
            where_clause(&clauses)
        );

        self.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let params_ref: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
            let missions = stmt
                .query_map(params_ref.as_slice(), mission_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            missions
                .into_iter()
                .map(|mission| with_targets(conn, mission))
                .collect()
        })
    }

    pub fn get_mission(&self, id: Uuid) -> Result<Option<MissionWithTargets>> {
        self.read(|conn| {
            load_mission(conn, id)?
                .map(|mission| with_targets(conn, mission))
                .transpose()
        })
    }

    /// Creates a mission and its targets, in the order given, as one unit.
    ///
    /// A duplicate target name within the request fails with [`Error::Conflict`]
    /// and nothing is persisted.
    pub fn create_mission(&self, input: CreateMissionInput) -> Result<MissionWithTargets> {
        input.validate()?;

        let mission = Mission {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            assigned_cat_id: None,
            completed: false,
            created_at: Utc::now(),
        };

        let targets = self.transaction(|conn| {
            conn.execute(
                "INSERT INTO missions
                 (id, title, description, assigned_cat_id, completed, created_at)
                 VALUES (?, ?, ?, NULL, 0, ?)",
                (
                    mission.id.to_string(),
                    &mission.title,
                    &mission.description,
                    mission.created_at.to_rfc3339(),
                ),
            )?;

            let mut created = Vec::with_capacity(input.targets.len());
            for (position, target_input) in input.targets.into_iter().enumerate() {
                created.push(targets::insert_target(
                    conn,
                    mission.id,
                    position,
                    target_input,
                )?);
            }
            Ok(created)
        })?;

        tracing::info!(
            mission_id = %mission.id,
            targets = targets.len(),
            "Created mission {}",
            mission.title
        );
        Ok(MissionWithTargets { mission, targets })
    }

    /// Updates the descriptive fields of a mission.
    pub fn update_mission(
        &self,
        id: Uuid,
        input: UpdateMissionInput,
    ) -> Result<Option<MissionWithTargets>> {
        input.validate()?;

        self.transaction(|conn| {
            let Some(existing) = load_mission(conn, id)? else {
                return Ok(None);
            };

            let mission = Mission {
                title: input.title.unwrap_or(existing.title),
                description: input.description.or(existing.description),
                ..existing
            };

            conn.execute(
                "UPDATE missions SET title = ?, description = ? WHERE id = ?",
                (&mission.title, &mission.description, id.to_string()),
            )?;

            with_targets(conn, mission).map(Some)
        })
    }

    /// Deletes an unassigned mission together with its targets.
    pub fn delete_mission(&self, id: Uuid) -> Result<()> {
        self.transaction(|conn| {
            let mission = require_mission(conn, id)?;
            if mission.assigned_cat_id.is_some() {
                tracing::debug!(mission_id = %id, "Refusing to delete assigned mission");
                return Err(Error::validation("mission assigned, cannot delete"));
            }

            conn.execute("DELETE FROM missions WHERE id = ?", [id.to_string()])?;
            tracing::info!(mission_id = %id, "Deleted mission");
            Ok(())
        })
    }

    // ============================================================
    // Assignment
    // ============================================================

    /// Assigns a cat to a mission.
    ///
    /// Fails when `cat_id` is missing or blank, no cat has that id, or the cat
    /// already works another incomplete mission. Re-assigning the same cat is a
    /// no-op success.
    pub fn assign_cat(&self, mission_id: Uuid, cat_id: Option<&str>) -> Result<MissionWithTargets> {
        self.transaction(|conn| {
            let mission = require_mission(conn, mission_id)?;
            let cat_id = cat_id
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| Error::validation("missing cat_id"))?;
            let cat_id = match Uuid::parse_str(cat_id) {
                Ok(id) if load_cat(conn, id)?.is_some() => id,
                _ => return Err(Error::not_found("Cat not found")),
            };

            let busy: bool = conn.query_row(
                "SELECT EXISTS (
                    SELECT 1 FROM missions
                    WHERE assigned_cat_id = ? AND completed = 0 AND id != ?
                )",
                (cat_id.to_string(), mission_id.to_string()),
                |row| row.get(0),
            )?;
            if busy {
                tracing::debug!(%cat_id, %mission_id, "Cat already has an active mission");
                return Err(Error::validation(ACTIVE_MISSION_TAKEN));
            }

            conn.execute(
                "UPDATE missions SET assigned_cat_id = ? WHERE id = ?",
                (cat_id.to_string(), mission_id.to_string()),
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::conflict(ACTIVE_MISSION_TAKEN)
                } else {
                    e.into()
                }
            })?;

            tracing::info!(%cat_id, %mission_id, "Assigned cat to mission");
            with_targets(
                conn,
                Mission {
                    assigned_cat_id: Some(cat_id),
                    ..mission
                },
            )
        })
    }

    /// Clears the mission's assigned cat. Unassigning an unassigned mission is a no-op.
    pub fn unassign_cat(&self, mission_id: Uuid) -> Result<MissionWithTargets> {
        self.transaction(|conn| {
            let mission = require_mission(conn, mission_id)?;
            if mission.assigned_cat_id.is_some() {
                conn.execute(
                    "UPDATE missions SET assigned_cat_id = NULL WHERE id = ?",
                    [mission_id.to_string()],
                )?;
                tracing::info!(%mission_id, "Unassigned mission");
            }
            with_targets(
                conn,
                Mission {
                    assigned_cat_id: None,
                    ..mission
                },
            )
        })
    }
}

pub(super) fn load_mission(conn: &Connection, id: Uuid) -> Result<Option<Mission>> {
    let mission = conn
        .query_row(
            &format!("SELECT {MISSION_COLUMNS} FROM missions WHERE id = ?"),
            [id.to_string()],
            mission_from_row,
        )
        .optional()?;
    Ok(mission)
}

pub(super) fn require_mission(conn: &Connection, id: Uuid) -> Result<Mission> {
    load_mission(conn, id)?.ok_or_else(|| Error::not_found("Mission not found"))
}

pub(super) fn load_active_mission_for_cat(
    conn: &Connection,
    cat_id: Uuid,
) -> Result<Option<Mission>> {
    let mission = conn
        .query_row(
            &format!(
                "SELECT {MISSION_COLUMNS} FROM missions
                 WHERE assigned_cat_id = ? AND completed = 0
                 ORDER BY created_at LIMIT 1"
            ),
            [cat_id.to_string()],
            mission_from_row,
        )
        .optional()?;
    Ok(mission)
}

pub(super) fn with_targets(conn: &Connection, mission: Mission) -> Result<MissionWithTargets> {
    let targets = targets::load_targets(conn, mission.id)?;
    Ok(MissionWithTargets { mission, targets })
}

fn mission_from_row(row: &Row<'_>) -> rusqlite::Result<Mission> {
    Ok(Mission {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        assigned_cat_id: opt_uuid_at(row, 3)?,
        completed: row.get(4)?,
        created_at: datetime_at(row, 5)?,
    })
}
