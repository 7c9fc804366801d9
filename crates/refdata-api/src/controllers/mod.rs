//! ---
//! refdata_section: "05-networking-external-interfaces"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Route handlers grouped by aggregate."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use axum::http::StatusCode;
use axum::Json;
use refdata_domain::EntityKind;
use uuid::Uuid;

use crate::error::ApiError;

pub(crate) mod access;
pub(crate) mod geography;
pub(crate) mod health;
pub(crate) mod products;
pub(crate) mod programs;
pub(crate) mod supervision;

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;
pub(crate) type Created<T> = Result<(StatusCode, Json<T>), ApiError>;

pub(crate) const ACTION_CREATE: &str = "create";
pub(crate) const ACTION_UPDATE: &str = "update";
pub(crate) const ACTION_DELETE: &str = "delete";

pub(crate) fn created<T>(value: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(value)))
}

pub(crate) fn found<T>(value: Option<T>, entity: EntityKind, id: Uuid) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::not_found(entity, id))
}

/// 400 when `code` already belongs to a different entity than `id`.
pub(crate) fn ensure_code_free(
    holder: Option<Uuid>,
    id: Uuid,
    entity: EntityKind,
    code: &str,
) -> Result<(), ApiError> {
    match holder {
        Some(other) if other != id => Err(ApiError::bad_request(
            entity.code_duplicated_key(),
            format!("{entity} code {code} is already in use"),
        )),
        _ => Ok(()),
    }
}

/// 400 when a referenced entity is missing.
pub(crate) fn ensure_reference(exists: bool, entity: EntityKind, id: Uuid) -> Result<(), ApiError> {
    if exists {
        Ok(())
    } else {
        Err(ApiError::unknown_reference(entity, id))
    }
}
