//! Glottocat bibliographic reconciliation engine
//!
//! Ingests heterogeneous bibliography records harvested from many external
//! providers and reconciles them into a canonical catalog of references,
//! each linked to macro-areas, document types and contributing providers,
//! alongside a genealogical tree of languoids backed by a transitive-closure
//! table.

pub mod bib;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
