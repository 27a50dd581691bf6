//! Core types and trait definitions for the nestmatch household engine.
//!
//! No HTTP or database dependencies live here. This crate owns
//! the domain model, the error taxonomy, the [`store::NestStore`] collaborator
//! trait, and the pure reconciliation logic (membership checks, decision
//! classification, location merging).

pub mod decisions;
pub mod error;
pub mod household;
pub mod interaction;
pub mod location;
pub mod membership;
pub mod params;
pub mod property;
pub mod store;

pub use error::{Error, Result};
