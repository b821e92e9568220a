//! Breed validation against an external breed catalogue.
//!
//! The remote catalogue is a JSON array of objects with a `name` field, as served
//! by `https://api.thecatapi.com/v1/breeds`. Lookups are bounded by a timeout and
//! fail closed: if the list cannot be fetched, the write is rejected.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::{Error, Result};

pub const DEFAULT_BREEDS_URL: &str = "https://api.thecatapi.com/v1/breeds";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors fetching the breed catalogue.
#[derive(Debug, Error)]
pub enum BreedError {
    #[error("breed lookup timed out")]
    Timeout,

    #[error("breed lookup failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("breed service returned {0}")]
    Status(reqwest::StatusCode),
}

impl From<reqwest::Error> for BreedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::Status(status)
        } else {
            Self::Http(err)
        }
    }
}

#[derive(Debug, Deserialize)]
struct BreedRecord {
    name: String,
}

#[derive(Debug, Clone)]
enum Source {
    Remote { url: String, client: Client },
    Fixed(Arc<[String]>),
}

/// Source of the currently acceptable breed names.
#[derive(Debug, Clone)]
pub struct BreedValidator {
    source: Source,
}

impl BreedValidator {
    /// Validator backed by the HTTP catalogue at `url`.
    pub fn remote(url: impl Into<String>, timeout: Duration) -> Result<Self, BreedError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            source: Source::Remote {
                url: url.into(),
                client,
            },
        })
    }

    /// Validator with a fixed in-process list.
    pub fn fixed<I, S>(breeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source: Source::Fixed(breeds.into_iter().map(Into::into).collect()),
        }
    }

    /// Fetches the current list of acceptable breed names.
    pub async fn allowed_breeds(&self) -> Result<Vec<String>, BreedError> {
        match &self.source {
            Source::Fixed(breeds) => Ok(breeds.to_vec()),
            Source::Remote { url, client } => {
                let records: Vec<BreedRecord> = client
                    .get(url)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                tracing::debug!(count = records.len(), "Fetched breed catalogue");
                Ok(records.into_iter().map(|r| r.name).collect())
            }
        }
    }

    /// Rejects `breed` unless it is in the current catalogue (exact match).
    ///
    /// A catalogue that cannot be fetched rejects every breed.
    pub async fn ensure_valid(&self, breed: &str) -> Result<()> {
        let breeds = self.allowed_breeds().await.map_err(|e| {
            tracing::warn!("Could not validate breed: {}", e);
            Error::validation("could not validate breed at this time, please try again later")
        })?;

        if breeds.iter().any(|b| b == breed) {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "breed must be one of the valid cat breeds: {}",
                breeds.join(", ")
            )))
        }
    }
}
