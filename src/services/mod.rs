//! Business logic services

pub mod import;
pub mod reconcile;
pub mod tree;

pub use import::{ImportMode, ImportOutcome, ImportService};
pub use tree::LanguoidForest;
