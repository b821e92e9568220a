use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::mission::MissionWithTargets;
use super::require_text;
use crate::{Error, Result};

pub const MAX_CAT_NAME_LEN: usize = 100;
pub const MAX_BREED_LEN: usize = 50;
pub const MAX_YEARS_OF_EXPERIENCE: u32 = 50;
/// Salaries are stored with two fractional digits and at most ten digits total.
pub const MAX_SALARY: f64 = 100_000_000.0;

/// A field agent.
///
/// `hired_at` is stamped when the cat is created and never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cat {
    pub id: Uuid,
    pub name: String,
    pub years_of_experience: u32,
    pub breed: String,
    pub salary: f64,
    pub hired_at: DateTime<Utc>,
}

/// Input for hiring a new cat. A `hired_at` value in the body is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCatInput {
    pub name: String,
    pub years_of_experience: u32,
    pub breed: String,
    pub salary: f64,
}

impl CreateCatInput {
    /// Checks every field except breed membership, which needs the breed lookup.
    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name, MAX_CAT_NAME_LEN)?;
        require_text("breed", &self.breed, MAX_BREED_LEN)?;
        validate_experience(self.years_of_experience)?;
        validate_salary(self.salary)
    }
}

/// Input for updating a cat. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCatInput {
    pub name: Option<String>,
    pub years_of_experience: Option<u32>,
    pub breed: Option<String>,
    pub salary: Option<f64>,
}

impl UpdateCatInput {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            require_text("name", name, MAX_CAT_NAME_LEN)?;
        }
        if let Some(breed) = &self.breed {
            require_text("breed", breed, MAX_BREED_LEN)?;
        }
        if let Some(years) = self.years_of_experience {
            validate_experience(years)?;
        }
        if let Some(salary) = self.salary {
            validate_salary(salary)?;
        }
        Ok(())
    }
}

/// A cat together with the mission it is currently working, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatWithMission {
    #[serde(flatten)]
    pub cat: Cat,
    pub current_mission: Option<MissionWithTargets>,
}

/// Query parameters for listing cats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListCatsQuery {
    /// Exact breed filter.
    pub breed: Option<String>,
    /// Case-insensitive substring matched against name and breed.
    pub q: Option<String>,
}

fn validate_experience(years: u32) -> Result<()> {
    if years > MAX_YEARS_OF_EXPERIENCE {
        return Err(Error::validation(format!(
            "years_of_experience must be at most {MAX_YEARS_OF_EXPERIENCE}"
        )));
    }
    Ok(())
}

fn validate_salary(salary: f64) -> Result<()> {
    if !salary.is_finite() || salary <= 0.0 {
        return Err(Error::validation("salary must be a positive number"));
    }
    if salary >= MAX_SALARY {
        return Err(Error::validation("salary must be below 100000000"));
    }
    let cents = salary * 100.0;
    if (cents - cents.round()).abs() > 1e-6 {
        return Err(Error::validation(
            "salary must have at most 2 decimal places",
        ));
    }
    Ok(())
}
