//! ---
//! refdata_section: "01-core-functionality"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Shared primitives and utilities for the service runtime."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
//! Core shared primitives for the reference data workspace.
//! This crate exposes configuration loading, logging, and version
//! metadata utilities consumed across the workspace.

pub mod config;
pub mod logging;
pub mod version;

pub use config::{
    ApiConfig, AppConfig, AuditConfig, AuthConfig, DatabaseConfig, LoadedAppConfig,
    LoggingConfig, MetricsConfig, RightAssignmentConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use version::VersionInfo;
