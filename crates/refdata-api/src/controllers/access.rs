//! ---
//! refdata_section: "05-networking-external-interfaces"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "User, role assignment, role and right endpoints."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use refdata_domain::{
    right_names, validate, AssignmentScope, EntityKind, Page, Right, Role, RoleAssignment, User,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{
    created, ensure_reference, found, ApiResult, Created, ACTION_CREATE, ACTION_DELETE,
    ACTION_UPDATE,
};
use crate::error::ApiError;
use crate::extract::{AuthenticatedUser, JsonBody, QueryParams};
use crate::state::ApiState;

/// Users may always read their own record.
async fn require_self_or(
    state: &ApiState,
    user: &AuthenticatedUser,
    id: Uuid,
    right: &str,
) -> Result<(), ApiError> {
    if user.id() == id {
        return Ok(());
    }
    state.require(user, right).await
}

/// Every assignment must name an existing role whose right type fits the
/// assignment kind, and existing scope entities.
async fn check_assignments(state: &ApiState, assignments: &[RoleAssignment]) -> Result<(), ApiError> {
    let repos = &state.repos;
    for assignment in assignments {
        ensure_reference(
            repos.roles.exists(assignment.role_id).await?,
            EntityKind::Role,
            assignment.role_id,
        )?;
        let role_type = repos.roles.right_type(assignment.role_id).await?;
        assignment.check_right_type(role_type)?;
        match assignment.scope {
            AssignmentScope::Direct => {}
            AssignmentScope::Supervision {
                program_id,
                supervisory_node_id,
            } => {
                ensure_reference(
                    repos.programs.exists(program_id).await?,
                    EntityKind::Program,
                    program_id,
                )?;
                if let Some(node) = supervisory_node_id {
                    ensure_reference(
                        repos.supervisory_nodes.exists(node).await?,
                        EntityKind::SupervisoryNode,
                        node,
                    )?;
                }
            }
            AssignmentScope::Fulfillment { warehouse_id } => {
                ensure_reference(
                    repos.facilities.exists(warehouse_id).await?,
                    EntityKind::Facility,
                    warehouse_id,
                )?;
            }
        }
    }
    Ok(())
}

fn same_assignments(a: &[RoleAssignment], b: &[RoleAssignment]) -> bool {
    a.iter().collect::<HashSet<_>>() == b.iter().collect::<HashSet<_>>()
}

pub(crate) async fn list_users(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    params: QueryParams,
) -> ApiResult<Page<User>> {
    state.require(&user, right_names::USERS_MANAGE).await?;
    let pageable = state.pageable(&params)?;
    Ok(Json(state.repos.users.find_page(pageable).await?))
}

pub(crate) async fn get_user(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<User> {
    require_self_or(&state, &user, id, right_names::USERS_MANAGE).await?;
    let found_user = state.repos.users.find_by_id(id).await?;
    Ok(Json(found(found_user, EntityKind::User, id)?))
}

/// Saves the user's columns and, when they changed, its role assignments.
async fn save_user(
    state: &ApiState,
    caller: &AuthenticatedUser,
    user: &User,
    action: &str,
) -> Result<(), ApiError> {
    state.require(caller, right_names::USERS_MANAGE).await?;
    validate(EntityKind::User, user)?;
    let repos = &state.repos;
    let holder = repos.users.find_by_username(&user.username).await?;
    if holder.is_some_and(|other| other.id != user.id) {
        return Err(ApiError::bad_request(
            EntityKind::User.field_key("username", "duplicated"),
            format!("username {} is already in use", user.username),
        ));
    }
    if let Some(home) = user.home_facility_id {
        ensure_reference(repos.facilities.exists(home).await?, EntityKind::Facility, home)?;
    }

    let current = repos.role_assignments.find_by_user(user.id).await?;
    let assignments_changed = !same_assignments(&current, &user.role_assignments);
    if assignments_changed {
        state.require(caller, right_names::USER_ROLES_MANAGE).await?;
        check_assignments(state, &user.role_assignments).await?;
    }

    let assignments = assignments_changed.then_some(user.role_assignments.as_slice());
    repos.users.save_with_assignments(user, assignments).await?;
    state
        .record(caller, action, EntityKind::User, user.id, user)
        .await?;
    // Home facility supervision depends on the user's own columns as well.
    state.regenerate_user(user.id).await
}

pub(crate) async fn create_user(
    State(state): State<Arc<ApiState>>,
    caller: AuthenticatedUser,
    JsonBody(user): JsonBody<User>,
) -> Created<User> {
    save_user(&state, &caller, &user, ACTION_CREATE).await?;
    created(user)
}

pub(crate) async fn update_user(
    State(state): State<Arc<ApiState>>,
    caller: AuthenticatedUser,
    Path(id): Path<Uuid>,
    JsonBody(mut user): JsonBody<User>,
) -> ApiResult<User> {
    user.id = id;
    save_user(&state, &caller, &user, ACTION_UPDATE).await?;
    Ok(Json(user))
}

pub(crate) async fn delete_user(
    State(state): State<Arc<ApiState>>,
    caller: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.require(&caller, right_names::USERS_MANAGE).await?;
    if !state.repos.users.delete(id).await? {
        return Err(ApiError::not_found(EntityKind::User, id));
    }
    state
        .record(&caller, ACTION_DELETE, EntityKind::User, id, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn get_role_assignments(
    State(state): State<Arc<ApiState>>,
    caller: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<RoleAssignment>> {
    require_self_or(&state, &caller, id, right_names::USER_ROLES_MANAGE).await?;
    if !state.repos.users.exists(id).await? {
        return Err(ApiError::not_found(EntityKind::User, id));
    }
    Ok(Json(state.repos.role_assignments.find_by_user(id).await?))
}

/// Replace the user's role assignments and regenerate their right assignments.
pub(crate) async fn put_role_assignments(
    State(state): State<Arc<ApiState>>,
    caller: AuthenticatedUser,
    Path(id): Path<Uuid>,
    JsonBody(assignments): JsonBody<Vec<RoleAssignment>>,
) -> ApiResult<Vec<RoleAssignment>> {
    state.require(&caller, right_names::USER_ROLES_MANAGE).await?;
    if !state.repos.users.exists(id).await? {
        return Err(ApiError::not_found(EntityKind::User, id));
    }
    check_assignments(&state, &assignments).await?;
    state
        .repos
        .role_assignments
        .replace_for_user(id, &assignments)
        .await?;
    state
        .record(&caller, ACTION_UPDATE, EntityKind::User, id, &assignments)
        .await?;
    state.regenerate_user(id).await?;
    info!(user_id = %id, count = assignments.len(), "role assignments replaced");
    Ok(Json(assignments))
}

#[derive(Debug, Serialize)]
pub(crate) struct HasRightResponse {
    result: bool,
}

/// Exact lookup of `(user, right, facilityId?, programId?)`.
pub(crate) async fn has_right(
    State(state): State<Arc<ApiState>>,
    caller: AuthenticatedUser,
    Path(id): Path<Uuid>,
    params: QueryParams,
) -> ApiResult<HasRightResponse> {
    require_self_or(&state, &caller, id, right_names::USERS_MANAGE).await?;
    if !state.repos.users.exists(id).await? {
        return Err(ApiError::not_found(EntityKind::User, id));
    }
    let right_id = params.require_uuid("rightId")?;
    let right = state
        .repos
        .rights
        .find_by_id(right_id)
        .await?
        .ok_or_else(|| ApiError::unknown_reference(EntityKind::Right, right_id))?;
    let result = state
        .rights
        .has_right(
            id,
            &right.name,
            params.uuid("facilityId")?,
            params.uuid("programId")?,
        )
        .await?;
    Ok(Json(HasRightResponse { result }))
}

/// `RIGHT|facility|program` strings of the user's right assignments.
pub(crate) async fn permission_strings(
    State(state): State<Arc<ApiState>>,
    caller: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<String>> {
    require_self_or(&state, &caller, id, right_names::USERS_MANAGE).await?;
    if !state.repos.users.exists(id).await? {
        return Err(ApiError::not_found(EntityKind::User, id));
    }
    let strings = state
        .repos
        .right_assignments
        .find_by_user(id)
        .await?
        .iter()
        .map(|assignment| assignment.permission_string())
        .collect();
    Ok(Json(strings))
}

pub(crate) async fn list_roles(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
) -> ApiResult<Vec<Role>> {
    Ok(Json(state.repos.roles.find_all().await?))
}

pub(crate) async fn get_role(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Role> {
    let role = state.repos.roles.find_by_id(id).await?;
    Ok(Json(found(role, EntityKind::Role, id)?))
}

async fn save_role(
    state: &ApiState,
    user: &AuthenticatedUser,
    role: &Role,
    action: &str,
) -> Result<(), ApiError> {
    state.require(user, right_names::ROLES_MANAGE).await?;
    validate(EntityKind::Role, role)?;
    let repos = &state.repos;
    let holder = repos.roles.find_by_name(&role.name).await?;
    if holder.is_some_and(|other| other.id != role.id) {
        return Err(ApiError::bad_request(
            EntityKind::Role.field_key("name", "duplicated"),
            format!("role name {} is already in use", role.name),
        ));
    }

    let wanted: BTreeSet<Uuid> = role.right_ids.iter().copied().collect();
    let ids: Vec<Uuid> = wanted.iter().copied().collect();
    let rights = repos.rights.find_by_ids(&ids).await?;
    let known: BTreeSet<Uuid> = rights.iter().map(|r| r.id).collect();
    if let Some(missing) = wanted.difference(&known).next() {
        return Err(ApiError::unknown_reference(EntityKind::Right, missing));
    }
    let right_type = Role::right_type(&rights)?;
    for assignment in repos.role_assignments.find_by_role(role.id).await? {
        assignment.check_right_type(right_type)?;
    }

    repos.roles.save(role).await?;
    state
        .record(user, action, EntityKind::Role, role.id, role)
        .await
}

pub(crate) async fn create_role(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    JsonBody(role): JsonBody<Role>,
) -> Created<Role> {
    save_role(&state, &user, &role, ACTION_CREATE).await?;
    created(role)
}

pub(crate) async fn update_role(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    JsonBody(mut role): JsonBody<Role>,
) -> ApiResult<Role> {
    role.id = id;
    save_role(&state, &user, &role, ACTION_UPDATE).await?;
    state.regenerate_all().await?;
    Ok(Json(role))
}

pub(crate) async fn delete_role(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.require(&user, right_names::ROLES_MANAGE).await?;
    if !state.repos.roles.delete(id).await? {
        return Err(ApiError::not_found(EntityKind::Role, id));
    }
    state
        .record(&user, ACTION_DELETE, EntityKind::Role, id, &id)
        .await?;
    state.regenerate_all().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn list_rights(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
) -> ApiResult<Vec<Right>> {
    Ok(Json(state.repos.rights.find_all().await?))
}

pub(crate) async fn get_right(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Right> {
    let right = state.repos.rights.find_by_id(id).await?;
    Ok(Json(found(right, EntityKind::Right, id)?))
}
