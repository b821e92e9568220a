//! Record-keeping service for spy cat field operations.
//!
//! Tracks cats, the missions they are assigned and the targets within each
//! mission. The store enforces assignment exclusivity, target-count bounds at
//! mission creation, one-way target completion and the mission completion
//! cascade; [`api`] exposes those operations over HTTP.

pub mod api;
pub mod breeds;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
