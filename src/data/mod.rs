//! Database models and schema.

pub mod batch;
pub mod catalog;
mod context;
pub mod entrants;
pub mod equipment;
pub mod leaderboards;
pub mod metadata;
pub mod models;
pub mod relations;
pub mod stale;
pub mod stats;

pub use context::DbContext;
