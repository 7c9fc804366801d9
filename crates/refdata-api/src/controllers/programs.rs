//! ---
//! refdata_section: "05-networking-external-interfaces"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Program endpoints."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use refdata_domain::{right_names, validate, EntityKind, Page, Program};
use uuid::Uuid;

use super::{
    created, ensure_code_free, found, ApiResult, Created, ACTION_CREATE, ACTION_DELETE,
    ACTION_UPDATE,
};
use crate::error::ApiError;
use crate::extract::{AuthenticatedUser, JsonBody, QueryParams};
use crate::state::ApiState;

pub(crate) async fn list_programs(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    params: QueryParams,
) -> ApiResult<Page<Program>> {
    let pageable = state.pageable(&params)?;
    Ok(Json(state.repos.programs.find_page(pageable).await?))
}

pub(crate) async fn get_program(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Program> {
    let program = state.repos.programs.find_by_id(id).await?;
    Ok(Json(found(program, EntityKind::Program, id)?))
}

async fn save_program(
    state: &ApiState,
    user: &AuthenticatedUser,
    program: &Program,
    action: &str,
) -> Result<(), ApiError> {
    state.require(user, right_names::PROGRAMS_MANAGE).await?;
    validate(EntityKind::Program, program)?;
    let holder = state
        .repos
        .programs
        .find_by_code(&program.code)
        .await?
        .map(|p| p.id);
    ensure_code_free(holder, program.id, EntityKind::Program, &program.code)?;
    state.repos.programs.save(program).await?;
    state
        .record(user, action, EntityKind::Program, program.id, program)
        .await
}

pub(crate) async fn create_program(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    JsonBody(program): JsonBody<Program>,
) -> Created<Program> {
    save_program(&state, &user, &program, ACTION_CREATE).await?;
    created(program)
}

pub(crate) async fn update_program(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    JsonBody(mut program): JsonBody<Program>,
) -> ApiResult<Program> {
    program.id = id;
    save_program(&state, &user, &program, ACTION_UPDATE).await?;
    Ok(Json(program))
}

pub(crate) async fn delete_program(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.require(&user, right_names::PROGRAMS_MANAGE).await?;
    if !state.repos.programs.delete(id).await? {
        return Err(ApiError::not_found(EntityKind::Program, id));
    }
    state
        .record(&user, ACTION_DELETE, EntityKind::Program, id, &id)
        .await?;
    // Program scoped role assignments cascade with the program.
    state.regenerate_all().await?;
    Ok(StatusCode::NO_CONTENT)
}
