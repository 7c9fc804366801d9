//! ---
//! refdata_section: "05-networking-external-interfaces"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Supervisory node and requisition group endpoints."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use refdata_domain::messages::ERROR_INVALID_PARAMETER;
use refdata_domain::{
    right_names, validate, EntityKind, Facility, Page, RequisitionGroup, SupervisoryNode, User,
};
use refdata_persistence::{AuditRecord, SupervisoryNodeSearch};
use refdata_rights::SupervisionGraph;
use tracing::debug;
use uuid::Uuid;

use super::{
    created, ensure_code_free, ensure_reference, found, ApiResult, Created, ACTION_CREATE,
    ACTION_DELETE, ACTION_UPDATE,
};
use crate::error::ApiError;
use crate::extract::{AuthenticatedUser, JsonBody, QueryParams};
use crate::state::ApiState;

const CSV_HEADER: [&str; 4] = ["code", "name", "facilityCode", "parentNodeCode"];

pub(crate) async fn search_nodes(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    params: QueryParams,
) -> ApiResult<Page<SupervisoryNode>> {
    let search = SupervisoryNodeSearch {
        name: params.owned("name"),
        code: params.owned("code"),
        facility_id: params.uuid("facilityId")?,
        program_id: params.uuid("programId")?,
        zone_id: params.uuid("zoneId")?,
        ids: params.uuids("id")?,
    };
    let pageable = state.pageable(&params)?;
    debug!(?search, "searching supervisory nodes");
    Ok(Json(
        state.repos.supervisory_nodes.search(&search, pageable).await?,
    ))
}

pub(crate) async fn get_node(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<SupervisoryNode> {
    let node = state.repos.supervisory_nodes.find_by_id(id).await?;
    Ok(Json(found(node, EntityKind::SupervisoryNode, id)?))
}

async fn save_node(
    state: &ApiState,
    user: &AuthenticatedUser,
    node: &SupervisoryNode,
    action: &str,
) -> Result<(), ApiError> {
    state
        .require(user, right_names::SUPERVISORY_NODES_MANAGE)
        .await?;
    validate(EntityKind::SupervisoryNode, node)?;

    let repos = &state.repos;
    let holder = repos
        .supervisory_nodes
        .find_by_code(&node.code)
        .await?
        .map(|n| n.id);
    ensure_code_free(holder, node.id, EntityKind::SupervisoryNode, &node.code)?;

    if let Some(facility) = node.facility_id {
        ensure_reference(
            repos.facilities.exists(facility).await?,
            EntityKind::Facility,
            facility,
        )?;
    }
    if let Some(parent) = node.parent_node_id {
        if parent == node.id {
            return Err(ApiError::bad_request(
                EntityKind::SupervisoryNode.field_key("parentNode", "invalid"),
                "a supervisory node cannot be its own parent",
            ));
        }
        ensure_reference(
            repos.supervisory_nodes.exists(parent).await?,
            EntityKind::SupervisoryNode,
            parent,
        )?;
    }
    for child in node.child_node_ids.iter().flatten() {
        ensure_reference(
            repos.supervisory_nodes.exists(*child).await?,
            EntityKind::SupervisoryNode,
            *child,
        )?;
    }
    if let Some(group) = node.requisition_group_id {
        ensure_reference(
            repos.requisition_groups.exists(group).await?,
            EntityKind::RequisitionGroup,
            group,
        )?;
    }

    repos.supervisory_nodes.save(node).await?;
    state
        .record(user, action, EntityKind::SupervisoryNode, node.id, node)
        .await?;
    state.regenerate_all().await
}

pub(crate) async fn create_node(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    JsonBody(node): JsonBody<SupervisoryNode>,
) -> Created<SupervisoryNode> {
    save_node(&state, &user, &node, ACTION_CREATE).await?;
    let stored = state.repos.supervisory_nodes.find_by_id(node.id).await?;
    created(found(stored, EntityKind::SupervisoryNode, node.id)?)
}

/// Updates the node or creates it under the path id.
pub(crate) async fn update_node(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    JsonBody(mut node): JsonBody<SupervisoryNode>,
) -> ApiResult<SupervisoryNode> {
    node.id = id;
    save_node(&state, &user, &node, ACTION_UPDATE).await?;
    let stored = state.repos.supervisory_nodes.find_by_id(id).await?;
    Ok(Json(found(stored, EntityKind::SupervisoryNode, id)?))
}

pub(crate) async fn delete_node(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .require(&user, right_names::SUPERVISORY_NODES_MANAGE)
        .await?;
    if !state.repos.supervisory_nodes.delete(id).await? {
        return Err(ApiError::not_found(EntityKind::SupervisoryNode, id));
    }
    state
        .record(&user, ACTION_DELETE, EntityKind::SupervisoryNode, id, &id)
        .await?;
    state.regenerate_all().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Users holding `rightId` for `programId` through a supervision role at the node.
pub(crate) async fn supervising_users(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    params: QueryParams,
) -> ApiResult<Vec<User>> {
    state.require(&user, right_names::USERS_MANAGE).await?;
    let repos = &state.repos;
    if !repos.supervisory_nodes.exists(id).await? {
        return Err(ApiError::not_found(EntityKind::SupervisoryNode, id));
    }
    let right_id = params.require_uuid("rightId")?;
    let program_id = params.require_uuid("programId")?;
    ensure_reference(repos.rights.exists(right_id).await?, EntityKind::Right, right_id)?;
    ensure_reference(
        repos.programs.exists(program_id).await?,
        EntityKind::Program,
        program_id,
    )?;

    let users = repos
        .users
        .find_users_by_supervision_right(right_id, id, program_id)
        .await?;
    Ok(Json(users))
}

/// Facilities the node supervises for `programId`, including descendants.
pub(crate) async fn supervised_facilities(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    params: QueryParams,
) -> ApiResult<Page<Facility>> {
    state
        .require(&user, right_names::SUPERVISORY_NODES_MANAGE)
        .await?;
    let repos = &state.repos;
    if !repos.supervisory_nodes.exists(id).await? {
        return Err(ApiError::not_found(EntityKind::SupervisoryNode, id));
    }
    let program_id = params.uuid("programId")?.ok_or_else(|| {
        ApiError::bad_request(ERROR_INVALID_PARAMETER, "programId is required")
    })?;
    if !repos.programs.exists(program_id).await? {
        return Err(ApiError::not_found(EntityKind::Program, program_id));
    }
    let pageable = state.pageable(&params)?;

    let snapshot = repos.supervisory_nodes.load_snapshot().await?;
    let mut graph = SupervisionGraph::from_snapshot(&snapshot);
    let ids = graph.supervised_facilities(id, program_id);
    let mut facilities = Vec::with_capacity(ids.len());
    for facility_id in ids.iter() {
        if let Some(facility) = repos.facilities.find_by_id(*facility_id).await? {
            facilities.push(facility);
        }
    }
    facilities.sort_by(|a, b| a.code.cmp(&b.code));
    Ok(Json(Page::from_all(facilities, pageable)))
}

pub(crate) async fn node_audit_log(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<AuditRecord>> {
    state
        .require(&user, right_names::SUPERVISORY_NODES_MANAGE)
        .await?;
    if !state.repos.supervisory_nodes.exists(id).await? {
        return Err(ApiError::not_found(EntityKind::SupervisoryNode, id));
    }
    let history = state
        .audit
        .history(EntityKind::SupervisoryNode.as_ref(), id)
        .await?;
    Ok(Json(history))
}

/// CSV export of every node.
pub(crate) async fn download_nodes(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    state
        .require(&user, right_names::SUPERVISORY_NODES_MANAGE)
        .await?;
    let nodes = state.repos.supervisory_nodes.find_all().await?;
    let facility_codes = state.repos.facilities.codes_by_id().await?;
    let body = nodes_csv(&nodes, &facility_codes).map_err(ApiError::internal)?;
    Ok((
        [
            (CONTENT_TYPE, "text/csv"),
            (
                CONTENT_DISPOSITION,
                "attachment; filename=supervisory_nodes.csv",
            ),
        ],
        body,
    ))
}

fn nodes_csv(
    nodes: &[SupervisoryNode],
    facility_codes: &HashMap<Uuid, String>,
) -> anyhow::Result<Vec<u8>> {
    let node_codes: HashMap<Uuid, &str> = nodes.iter().map(|n| (n.id, n.code.as_str())).collect();
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for node in nodes {
        let facility = node
            .facility_id
            .and_then(|id| facility_codes.get(&id))
            .map(String::as_str)
            .unwrap_or_default();
        let parent = node
            .parent_node_id
            .and_then(|id| node_codes.get(&id).copied())
            .unwrap_or_default();
        writer.write_record([
            node.code.as_str(),
            node.name.as_deref().unwrap_or_default(),
            facility,
            parent,
        ])?;
    }
    writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("csv flush failed: {}", err.error()))
}

pub(crate) async fn list_groups(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    params: QueryParams,
) -> ApiResult<Page<RequisitionGroup>> {
    let pageable = state.pageable(&params)?;
    Ok(Json(state.repos.requisition_groups.find_page(pageable).await?))
}

pub(crate) async fn get_group(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<RequisitionGroup> {
    let group = state.repos.requisition_groups.find_by_id(id).await?;
    Ok(Json(found(group, EntityKind::RequisitionGroup, id)?))
}

async fn save_group(
    state: &ApiState,
    user: &AuthenticatedUser,
    group: &RequisitionGroup,
    action: &str,
) -> Result<(), ApiError> {
    state
        .require(user, right_names::REQUISITION_GROUPS_MANAGE)
        .await?;
    validate(EntityKind::RequisitionGroup, group)?;
    let repos = &state.repos;
    let holder = repos
        .requisition_groups
        .find_by_code(&group.code)
        .await?
        .map(|g| g.id);
    ensure_code_free(holder, group.id, EntityKind::RequisitionGroup, &group.code)?;
    ensure_reference(
        repos.supervisory_nodes.exists(group.supervisory_node_id).await?,
        EntityKind::SupervisoryNode,
        group.supervisory_node_id,
    )?;
    for facility in &group.member_facility_ids {
        ensure_reference(
            repos.facilities.exists(*facility).await?,
            EntityKind::Facility,
            *facility,
        )?;
    }
    for program in &group.program_ids {
        ensure_reference(
            repos.programs.exists(*program).await?,
            EntityKind::Program,
            *program,
        )?;
    }

    repos.requisition_groups.save(group).await?;
    state
        .record(user, action, EntityKind::RequisitionGroup, group.id, group)
        .await?;
    state.regenerate_all().await
}

pub(crate) async fn create_group(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    JsonBody(group): JsonBody<RequisitionGroup>,
) -> Created<RequisitionGroup> {
    save_group(&state, &user, &group, ACTION_CREATE).await?;
    created(group)
}

pub(crate) async fn update_group(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    JsonBody(mut group): JsonBody<RequisitionGroup>,
) -> ApiResult<RequisitionGroup> {
    group.id = id;
    save_group(&state, &user, &group, ACTION_UPDATE).await?;
    Ok(Json(group))
}

pub(crate) async fn delete_group(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .require(&user, right_names::REQUISITION_GROUPS_MANAGE)
        .await?;
    if !state.repos.requisition_groups.delete(id).await? {
        return Err(ApiError::not_found(EntityKind::RequisitionGroup, id));
    }
    state
        .record(&user, ACTION_DELETE, EntityKind::RequisitionGroup, id, &id)
        .await?;
    state.regenerate_all().await?;
    Ok(StatusCode::NO_CONTENT)
}
