mod missions;
mod schema;
mod targets;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, ToSql, TransactionBehavior};
use uuid::Uuid;

use crate::models::*;
use crate::Result;

/// SQLite-backed entity store for cats, missions and targets.
///
/// A single connection is shared behind a mutex. Every operation that checks a
/// rule and then writes runs inside one IMMEDIATE transaction while holding the
/// lock, so rule checks and the writes they guard are never interleaved with
/// another request.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    pub fn open_default() -> anyhow::Result<Self> {
        Self::open(default_path()?)
    }

    pub fn open_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        // Cascades and SET NULL on cat deletion depend on this.
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    /// Runs `f` against the connection without opening a transaction.
    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().expect("database lock poisoned");
        f(&*conn)
    }

    /// Runs `f` inside an IMMEDIATE transaction, committing only if it succeeds.
    fn transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&*tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ============================================================
    // Cat operations
    // ============================================================

    pub fn get_all_cats(&self, query: &ListCatsQuery) -> Result<Vec<CatWithMission>> {
        let mut clauses = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(breed) = &query.breed {
            clauses.push("breed = ?");
            params.push(Box::new(breed.clone()));
        }
        if let Some(pattern) = query.q.as_deref().and_then(like_pattern) {
            clauses.push("(name LIKE ? ESCAPE '\\' OR breed LIKE ? ESCAPE '\\')");
            params.push(Box::new(pattern.clone()));
            params.push(Box::new(pattern));
        }

        let sql = format!(
            "SELECT {CAT_COLUMNS} FROM cats{} ORDER BY name, hired_at",
            where_clause(&clauses)
        );

        self.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let params_ref: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
            let cats = stmt
                .query_map(params_ref.as_slice(), cat_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            cats.into_iter()
                .map(|cat| with_current_mission(conn, cat))
                .collect()
        })
    }

    pub fn get_cat(&self, id: Uuid) -> Result<Option<CatWithMission>> {
        self.read(|conn| {
            load_cat(conn, id)?
                .map(|cat| with_current_mission(conn, cat))
                .transpose()
        })
    }

    /// Hires a cat. Breed membership must already have been checked by the caller.
    pub fn create_cat(&self, input: CreateCatInput) -> Result<Cat> {
        input.validate()?;

        let cat = Cat {
            id: Uuid::new_v4(),
            name: input.name,
            years_of_experience: input.years_of_experience,
            breed: input.breed,
            salary: input.salary,
            hired_at: Utc::now(),
        };

        self.transaction(|conn| {
            conn.execute(
                "INSERT INTO cats (id, name, years_of_experience, breed, salary, hired_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                (
                    cat.id.to_string(),
                    &cat.name,
                    cat.years_of_experience,
                    &cat.breed,
                    cat.salary,
                    cat.hired_at.to_rfc3339(),
                ),
            )?;
            Ok(())
        })?;

        tracing::info!(cat_id = %cat.id, "Hired cat {}", cat.name);
        Ok(cat)
    }

    /// Applies a partial update. `hired_at` is never touched.
    pub fn update_cat(&self, id: Uuid, input: UpdateCatInput) -> Result<Option<Cat>> {
        input.validate()?;

        self.transaction(|conn| {
            let Some(existing) = load_cat(conn, id)? else {
                return Ok(None);
            };

            let cat = Cat {
                name: input.name.unwrap_or(existing.name),
                years_of_experience: input
                    .years_of_experience
                    .unwrap_or(existing.years_of_experience),
                breed: input.breed.unwrap_or(existing.breed),
                salary: input.salary.unwrap_or(existing.salary),
                ..existing
            };

            conn.execute(
                "UPDATE cats SET name = ?, years_of_experience = ?, breed = ?, salary = ?
                 WHERE id = ?",
                (
                    &cat.name,
                    cat.years_of_experience,
                    &cat.breed,
                    cat.salary,
                    id.to_string(),
                ),
            )?;

            Ok(Some(cat))
        })
    }

    /// Deletes a cat. Missions it was assigned to stay, unassigned.
    pub fn delete_cat(&self, id: Uuid) -> Result<bool> {
        self.transaction(|conn| {
            let rows = conn.execute("DELETE FROM cats WHERE id = ?", [id.to_string()])?;
            Ok(rows > 0)
        })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn default_path() -> anyhow::Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "spy-cats")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("spy_cats.db"))
}

const CAT_COLUMNS: &str = "id, name, years_of_experience, breed, salary, hired_at";

pub(crate) fn load_cat(conn: &Connection, id: Uuid) -> Result<Option<Cat>> {
    let cat = conn
        .query_row(
            &format!("SELECT {CAT_COLUMNS} FROM cats WHERE id = ?"),
            [id.to_string()],
            cat_from_row,
        )
        .optional()?;
    Ok(cat)
}

fn with_current_mission(conn: &Connection, cat: Cat) -> Result<CatWithMission> {
    let current_mission = missions::load_active_mission_for_cat(conn, cat.id)?
        .map(|mission| missions::with_targets(conn, mission))
        .transpose()?;
    Ok(CatWithMission {
        cat,
        current_mission,
    })
}

fn cat_from_row(row: &Row<'_>) -> rusqlite::Result<Cat> {
    Ok(Cat {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        years_of_experience: row.get(2)?,
        breed: row.get(3)?,
        salary: row.get(4)?,
        hired_at: datetime_at(row, 5)?,
    })
}

/// Builds ` WHERE a AND b` from the given clauses, or nothing.
fn where_clause(clauses: &[&str]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

/// Turns a search term into an escaped `%term%` LIKE pattern. Blank terms match nothing.
fn like_pattern(term: &str) -> Option<String> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{escaped}%"))
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => uuid_at(row, idx).map(Some),
        None => Ok(None),
    }
}

fn datetime_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_datetime_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => datetime_at(row, idx).map(Some),
        None => Ok(None),
    }
}
