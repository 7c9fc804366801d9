//! ---
//! refdata_section: "02-domain-model"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Domain error taxonomy."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use thiserror::Error;

use crate::messages::EntityKind;

/// Result alias used across the domain crate.
pub type Result<T> = std::result::Result<T, DomainError>;

/// Failures raised by domain rules, independent of transport or storage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: String },
    #[error("{message}")]
    Validation { message_key: String, message: String },
    #[error("{message}")]
    Duplicate { message_key: String, message: String },
}

impl DomainError {
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            message_key: message_key.into(),
            message: message.into(),
        }
    }

    pub fn duplicate(message_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Duplicate {
            message_key: message_key.into(),
            message: message.into(),
        }
    }

    /// Localisation key presented to clients.
    pub fn message_key(&self) -> String {
        match self {
            Self::NotFound { entity, .. } => entity.not_found_key(),
            Self::Validation { message_key, .. } | Self::Duplicate { message_key, .. } => {
                message_key.clone()
            }
        }
    }
}
