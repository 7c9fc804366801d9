//! ---
//! refdata_section: "03-persistence"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Persistence abstractions and storage bindings."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
//! Relational storage for the reference data service.
//!
//! A single [`Database`] wraps the sqlx SQLite pool. Repositories are cheap
//! clones of the pool grouped in [`Repositories`].

use refdata_domain::DomainError;

/// Result alias used throughout the persistence crate.
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Error type for the persistence subsystem.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Filesystem failure while preparing the database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Driver or connection failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A unique index rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    /// A foreign key rejected the write or delete.
    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),
    /// Stored JSON columns could not be (de)serialised.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// A stored value could not be decoded into its domain type.
    #[error("corrupt column {column}: {value}")]
    Corrupt {
        /// Column name.
        column: &'static str,
        /// Offending raw value.
        value: String,
    },
    /// Stored data violated a domain rule on load.
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Schema migration failure.
    #[error("migration v{version} failed: {source}")]
    Migration {
        /// Migration version being applied.
        version: i64,
        /// Underlying driver error.
        source: sqlx::Error,
    },
}

impl PersistenceError {
    /// Classify a driver error, surfacing constraint violations separately.
    pub(crate) fn classify(err: sqlx::Error) -> Self {
        if let Some(db) = err.as_database_error() {
            match db.kind() {
                sqlx::error::ErrorKind::UniqueViolation => {
                    return Self::UniqueViolation(db.message().to_owned())
                }
                sqlx::error::ErrorKind::ForeignKeyViolation => {
                    return Self::ForeignKeyViolation(db.message().to_owned())
                }
                _ => {}
            }
        }
        Self::Database(err)
    }
}

mod codec;
pub mod database;
pub mod migrations;
pub mod repositories;

pub use database::Database;
pub use migrations::{MigrationStatus, CURRENT_VERSION};
pub use repositories::{
    access::{RightRepository, RoleAssignmentRepository, RoleRepository, UserRepository},
    audit::{AuditRecord, AuditRepository},
    geography::{FacilityRepository, FacilitySearch, FacilityTypeRepository, GeographicZoneRepository},
    product::{
        FacilityTypeApprovedProductRepository, OrderableDisplayCategoryRepository,
        OrderableRepository, OrderableSearch, TradeItemRepository,
    },
    program::ProgramRepository,
    right_assignment::RightAssignmentRepository,
    supervision::{
        RequisitionGroupRepository, SupervisionSnapshot, SupervisoryNodeRepository,
        SupervisoryNodeSearch,
    },
    token::{StoredToken, TokenRepository},
    Repositories,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_error_names_column() {
        let err = PersistenceError::Corrupt {
            column: "user_id",
            value: "nope".into(),
        };
        assert_eq!(err.to_string(), "corrupt column user_id: nope");
    }
}
