//! ---
//! refdata_section: "05-networking-external-interfaces"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Geographic zone, facility type and facility endpoints."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use refdata_domain::{
    right_names, validate, EntityKind, Facility, FacilityType, GeographicZone, Page,
};
use refdata_persistence::FacilitySearch;
use uuid::Uuid;

use super::{
    created, ensure_code_free, ensure_reference, found, ApiResult, Created, ACTION_CREATE,
    ACTION_DELETE, ACTION_UPDATE,
};
use crate::error::ApiError;
use crate::extract::{AuthenticatedUser, JsonBody, QueryParams};
use crate::state::ApiState;

pub(crate) async fn list_zones(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    params: QueryParams,
) -> ApiResult<Page<GeographicZone>> {
    let pageable = state.pageable(&params)?;
    Ok(Json(state.repos.geographic_zones.find_page(pageable).await?))
}

pub(crate) async fn get_zone(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<GeographicZone> {
    let zone = state.repos.geographic_zones.find_by_id(id).await?;
    Ok(Json(found(zone, EntityKind::GeographicZone, id)?))
}

pub(crate) async fn create_zone(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    JsonBody(zone): JsonBody<GeographicZone>,
) -> Created<GeographicZone> {
    state
        .require(&user, right_names::GEOGRAPHIC_ZONES_MANAGE)
        .await?;
    validate(EntityKind::GeographicZone, &zone)?;
    let repo = &state.repos.geographic_zones;
    if let Some(parent) = zone.parent_id {
        ensure_reference(repo.exists(parent).await?, EntityKind::GeographicZone, parent)?;
    }
    let holder = repo.find_by_code(&zone.code).await?.map(|z| z.id);
    ensure_code_free(holder, zone.id, EntityKind::GeographicZone, &zone.code)?;

    repo.save(&zone).await?;
    state
        .record(&user, ACTION_CREATE, EntityKind::GeographicZone, zone.id, &zone)
        .await?;
    created(zone)
}

pub(crate) async fn list_facility_types(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    params: QueryParams,
) -> ApiResult<Page<FacilityType>> {
    let pageable = state.pageable(&params)?;
    Ok(Json(state.repos.facility_types.find_page(pageable).await?))
}

pub(crate) async fn get_facility_type(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<FacilityType> {
    let facility_type = state.repos.facility_types.find_by_id(id).await?;
    Ok(Json(found(facility_type, EntityKind::FacilityType, id)?))
}

async fn save_facility_type(
    state: &ApiState,
    user: &AuthenticatedUser,
    facility_type: &FacilityType,
    action: &str,
) -> Result<(), ApiError> {
    state.require(user, right_names::FACILITY_TYPES_MANAGE).await?;
    validate(EntityKind::FacilityType, facility_type)?;
    let repo = &state.repos.facility_types;
    let holder = repo.find_by_code(&facility_type.code).await?.map(|t| t.id);
    ensure_code_free(
        holder,
        facility_type.id,
        EntityKind::FacilityType,
        &facility_type.code,
    )?;
    repo.save(facility_type).await?;
    state
        .record(
            user,
            action,
            EntityKind::FacilityType,
            facility_type.id,
            facility_type,
        )
        .await
}

pub(crate) async fn create_facility_type(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    JsonBody(facility_type): JsonBody<FacilityType>,
) -> Created<FacilityType> {
    save_facility_type(&state, &user, &facility_type, ACTION_CREATE).await?;
    created(facility_type)
}

pub(crate) async fn update_facility_type(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    JsonBody(mut facility_type): JsonBody<FacilityType>,
) -> ApiResult<FacilityType> {
    facility_type.id = id;
    save_facility_type(&state, &user, &facility_type, ACTION_UPDATE).await?;
    Ok(Json(facility_type))
}

pub(crate) async fn delete_facility_type(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.require(&user, right_names::FACILITY_TYPES_MANAGE).await?;
    if !state.repos.facility_types.delete(id).await? {
        return Err(ApiError::not_found(EntityKind::FacilityType, id));
    }
    state
        .record(&user, ACTION_DELETE, EntityKind::FacilityType, id, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn search_facilities(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    params: QueryParams,
) -> ApiResult<Page<Facility>> {
    let search = FacilitySearch {
        code: params.owned("code"),
        name: params.owned("name"),
        zone_id: params.uuid("zoneId")?,
    };
    let pageable = state.pageable(&params)?;
    Ok(Json(state.repos.facilities.search(&search, pageable).await?))
}

pub(crate) async fn get_facility(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Facility> {
    let facility = state.repos.facilities.find_by_id(id).await?;
    Ok(Json(found(facility, EntityKind::Facility, id)?))
}

async fn save_facility(
    state: &ApiState,
    user: &AuthenticatedUser,
    facility: &Facility,
    action: &str,
) -> Result<(), ApiError> {
    state.require(user, right_names::FACILITIES_MANAGE).await?;
    validate(EntityKind::Facility, facility)?;
    let repos = &state.repos;
    ensure_reference(
        repos.geographic_zones.exists(facility.geographic_zone_id).await?,
        EntityKind::GeographicZone,
        facility.geographic_zone_id,
    )?;
    ensure_reference(
        repos.facility_types.exists(facility.type_id).await?,
        EntityKind::FacilityType,
        facility.type_id,
    )?;
    for supported in &facility.supported_programs {
        ensure_reference(
            repos.programs.exists(supported.program_id).await?,
            EntityKind::Program,
            supported.program_id,
        )?;
    }
    let holder = repos.facilities.find_by_code(&facility.code).await?.map(|f| f.id);
    ensure_code_free(holder, facility.id, EntityKind::Facility, &facility.code)?;

    repos.facilities.save(facility).await?;
    state
        .record(user, action, EntityKind::Facility, facility.id, facility)
        .await
}

pub(crate) async fn create_facility(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    JsonBody(facility): JsonBody<Facility>,
) -> Created<Facility> {
    save_facility(&state, &user, &facility, ACTION_CREATE).await?;
    created(facility)
}

pub(crate) async fn update_facility(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    JsonBody(mut facility): JsonBody<Facility>,
) -> ApiResult<Facility> {
    facility.id = id;
    save_facility(&state, &user, &facility, ACTION_UPDATE).await?;
    Ok(Json(facility))
}

pub(crate) async fn delete_facility(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.require(&user, right_names::FACILITIES_MANAGE).await?;
    if !state.repos.facilities.delete(id).await? {
        return Err(ApiError::not_found(EntityKind::Facility, id));
    }
    state
        .record(&user, ACTION_DELETE, EntityKind::Facility, id, &id)
        .await?;
    // Group memberships and warehouse assignments cascade with the facility.
    state.regenerate_all().await?;
    Ok(StatusCode::NO_CONTENT)
}
