//! Ticker Digest
//!
//! Aggregates per-ticker market information into one composite summary:
//! - Five category sub-services turn vendor data into raw text
//! - Each category's text is narrated by a completion collaborator
//! - The composite is optionally stored or forwarded by write key
//! - Every aggregate request leaves one audit record
//!
//! REQUEST FLOW:
//! VALIDATE → FAN OUT (fetch → annotate → narrate) → ASSEMBLE → PERSIST? → AUDIT

pub mod aggregator;
pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod financials;
pub mod inference;
pub mod ingest;
pub mod models;
pub mod numbers;
pub mod prices;
pub mod providers;
pub mod services;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use aggregator::{AggregateOutcome, Orchestrator};
