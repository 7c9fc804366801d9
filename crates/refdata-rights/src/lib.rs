//! ---
//! refdata_section: "04-rights"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Right assignment materialization."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
//! Flattens role assignments into `(user, right, facility, program)` tuples.
//!
//! Role assignments scoped to a supervisory node are expanded through a
//! [`SupervisionGraph`] into every facility the node supervises; the result
//! is deduplicated and written in one transaction by
//! [`RightAssignmentGenerator`].

pub mod generator;
pub mod graph;
pub mod metrics;

use refdata_persistence::PersistenceError;

pub use generator::{expand, GenerationReport, GenerationScope, RightAssignmentGenerator};
pub use graph::SupervisionGraph;
pub use metrics::RightsMetrics;

pub type Result<T> = std::result::Result<T, RightsError>;

#[derive(Debug, thiserror::Error)]
pub enum RightsError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}
