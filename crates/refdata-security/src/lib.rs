//! ---
//! refdata_section: "06-security-access-control"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Identity, right checks and audit trail."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
//! Authentication and authorization for the reference data service.

pub mod audit;
pub mod identity;
pub mod metrics;
pub mod rights;

use refdata_persistence::PersistenceError;

pub use audit::AuditTrail;
pub use identity::{hash_secret, IssuedToken, Principal, TokenService};
pub use metrics::SecurityMetrics;
pub use rights::RightService;

pub type Result<T> = std::result::Result<T, SecurityError>;

/// Errors returned by the security subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    /// No token matches the presented secret.
    #[error("bearer token invalid")]
    InvalidToken,
    /// The token matched but its TTL elapsed.
    #[error("bearer token expired")]
    TokenExpired,
    #[error("user {0} not found")]
    UserNotFound(uuid::Uuid),
    #[error("user {0} is inactive")]
    UserInactive(uuid::Uuid),
    /// The user lacks the named right.
    #[error("missing right {right}")]
    Unauthorized { right: String },
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
