//! ---
//! refdata_section: "05-networking-external-interfaces"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Orderable, trade item, display category and approved product endpoints."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::LAST_MODIFIED;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use refdata_domain::messages::{
    ERROR_SEARCH_FACILITY_TYPE_REQUIRED, ERROR_SEARCH_PROGRAM_REQUIRED,
};
use refdata_domain::{
    right_names, validate, EntityKind, FacilityTypeApprovedProduct, Orderable,
    OrderableDisplayCategory, Page, Pageable, TradeItem,
};
use refdata_persistence::OrderableSearch;
use serde::Deserialize;
use uuid::Uuid;

use super::{
    created, ensure_code_free, ensure_reference, found, ApiResult, Created, ACTION_CREATE,
    ACTION_DELETE, ACTION_UPDATE,
};
use crate::error::ApiError;
use crate::extract::{AuthenticatedUser, JsonBody, QueryParams};
use crate::state::ApiState;

/// RFC 7231 IMF-fixdate.
fn http_date(ts: DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub(crate) async fn list_categories(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    params: QueryParams,
) -> ApiResult<Page<OrderableDisplayCategory>> {
    let pageable = state.pageable(&params)?;
    Ok(Json(
        state
            .repos
            .orderable_display_categories
            .find_page(pageable)
            .await?,
    ))
}

pub(crate) async fn get_category(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderableDisplayCategory> {
    let category = state.repos.orderable_display_categories.find_by_id(id).await?;
    Ok(Json(found(category, EntityKind::OrderableDisplayCategory, id)?))
}

pub(crate) async fn create_category(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    JsonBody(category): JsonBody<OrderableDisplayCategory>,
) -> Created<OrderableDisplayCategory> {
    state.require(&user, right_names::ORDERABLES_MANAGE).await?;
    validate(EntityKind::OrderableDisplayCategory, &category)?;
    let repo = &state.repos.orderable_display_categories;
    let holder = repo.find_by_code(&category.code).await?.map(|c| c.id);
    ensure_code_free(
        holder,
        category.id,
        EntityKind::OrderableDisplayCategory,
        &category.code,
    )?;
    repo.save(&category).await?;
    state
        .record(
            &user,
            ACTION_CREATE,
            EntityKind::OrderableDisplayCategory,
            category.id,
            &category,
        )
        .await?;
    created(category)
}

/// Search by `code`, `name`, `program` or repeated `id`; `Last-Modified`
/// carries the newest `lastUpdated` of the matching orderables.
pub(crate) async fn search_orderables(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    params: QueryParams,
) -> Result<(HeaderMap, Json<Page<Orderable>>), ApiError> {
    let search = OrderableSearch {
        code: params.owned("code"),
        name: params.owned("name"),
        program_code: params.owned("program"),
    };
    let ids = params.uuids("id")?;
    let pageable = state.pageable(&params)?;
    let repo = &state.repos.orderables;

    let (page, last_modified) = if !ids.is_empty() {
        (
            repo.find_all_latest_by_ids(&ids, pageable).await?,
            repo.find_latest_modified_date_by_ids(&ids).await?,
        )
    } else if search.is_empty() {
        (
            repo.find_all_latest(pageable).await?,
            repo.find_latest_modified_date_of_all().await?,
        )
    } else {
        (
            repo.search(&search, pageable).await?,
            repo.find_latest_modified_date_by_params(&search).await?,
        )
    };

    let mut headers = HeaderMap::new();
    if let Some(ts) = last_modified {
        let value = HeaderValue::from_str(&http_date(ts)).map_err(ApiError::internal)?;
        headers.insert(LAST_MODIFIED, value);
    }
    Ok((headers, Json(page)))
}

/// Latest version, or the one named by `versionNumber`.
pub(crate) async fn get_orderable(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    params: QueryParams,
) -> ApiResult<Orderable> {
    let repo = &state.repos.orderables;
    let orderable = match params.u32("versionNumber")? {
        Some(version) => repo.find_version(id, i64::from(version)).await?,
        None => repo.find_latest(id).await?,
    };
    Ok(Json(found(orderable, EntityKind::Orderable, id)?))
}

async fn check_orderable(state: &ApiState, orderable: &Orderable) -> Result<(), ApiError> {
    validate(EntityKind::Orderable, orderable)?;
    let repos = &state.repos;
    let holder = repos
        .orderables
        .find_latest_by_product_code(&orderable.product_code)
        .await?
        .map(|o| o.id);
    if holder.is_some_and(|other| other != orderable.id) {
        return Err(ApiError::bad_request(
            EntityKind::Orderable.field_key("productCode", "duplicated"),
            format!("product code {} is already in use", orderable.product_code),
        ));
    }
    for link in &orderable.programs {
        ensure_reference(
            repos.programs.exists(link.program_id).await?,
            EntityKind::Program,
            link.program_id,
        )?;
        ensure_reference(
            repos
                .orderable_display_categories
                .exists(link.orderable_display_category_id)
                .await?,
            EntityKind::OrderableDisplayCategory,
            link.orderable_display_category_id,
        )?;
    }
    if let Some(trade_item) = orderable.trade_item_id {
        ensure_reference(
            repos.trade_items.exists(trade_item).await?,
            EntityKind::TradeItem,
            trade_item,
        )?;
    }
    Ok(())
}

fn first_version(mut orderable: Orderable) -> Orderable {
    orderable.version_number = 1;
    orderable.last_updated = Utc::now();
    orderable.link_programs();
    orderable
}

pub(crate) async fn create_orderable(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    JsonBody(orderable): JsonBody<Orderable>,
) -> Created<Orderable> {
    state.require(&user, right_names::ORDERABLES_MANAGE).await?;
    check_orderable(&state, &orderable).await?;
    if state.repos.orderables.exists(orderable.id).await? {
        return Err(ApiError::bad_request(
            EntityKind::Orderable.duplicated_key(),
            format!("orderable {} already exists", orderable.id),
        ));
    }
    let orderable = first_version(orderable);
    state.repos.orderables.insert_version(&orderable).await?;
    state
        .record(&user, ACTION_CREATE, EntityKind::Orderable, orderable.id, &orderable)
        .await?;
    created(orderable)
}

/// Stores a new version; an unknown id starts at version 1.
pub(crate) async fn update_orderable(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    JsonBody(mut update): JsonBody<Orderable>,
) -> ApiResult<Orderable> {
    state.require(&user, right_names::ORDERABLES_MANAGE).await?;
    update.id = id;
    check_orderable(&state, &update).await?;
    let orderable = match state.repos.orderables.find_latest(id).await? {
        Some(current) => current.next_version(update),
        None => first_version(update),
    };
    state.repos.orderables.insert_version(&orderable).await?;
    state
        .record(&user, ACTION_UPDATE, EntityKind::Orderable, id, &orderable)
        .await?;
    Ok(Json(orderable))
}

pub(crate) async fn list_trade_items(
    State(state): State<Arc<ApiState>>,
    _user: AuthenticatedUser,
    params: QueryParams,
) -> ApiResult<Vec<TradeItem>> {
    let items = state
        .repos
        .trade_items
        .find_all(params.get("classificationId"))
        .await?;
    Ok(Json(items))
}

pub(crate) async fn save_trade_item(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    JsonBody(item): JsonBody<TradeItem>,
) -> ApiResult<TradeItem> {
    state.require(&user, right_names::ORDERABLES_MANAGE).await?;
    let action = if state.repos.trade_items.exists(item.id).await? {
        ACTION_UPDATE
    } else {
        ACTION_CREATE
    };
    state.repos.trade_items.save(&item).await?;
    state
        .record(&user, action, EntityKind::TradeItem, item.id, &item)
        .await?;
    Ok(Json(item))
}

async fn save_approved_product(
    state: &ApiState,
    user: &AuthenticatedUser,
    product: &FacilityTypeApprovedProduct,
    action: &str,
) -> Result<(), ApiError> {
    state
        .require(user, right_names::FACILITY_APPROVED_ORDERABLES_MANAGE)
        .await?;
    validate(EntityKind::FacilityTypeApprovedProduct, product)?;
    let repos = &state.repos;
    ensure_reference(
        repos.facility_types.exists(product.facility_type_id).await?,
        EntityKind::FacilityType,
        product.facility_type_id,
    )?;
    ensure_reference(
        repos.orderables.exists(product.orderable_id).await?,
        EntityKind::Orderable,
        product.orderable_id,
    )?;
    ensure_reference(
        repos.programs.exists(product.program_id).await?,
        EntityKind::Program,
        product.program_id,
    )?;

    let existing = repos
        .approved_products
        .find_by_facility_type_orderable_program(
            product.facility_type_id,
            product.orderable_id,
            product.program_id,
        )
        .await?;
    if existing.is_some_and(|other| other.id != product.id) {
        return Err(ApiError::bad_request(
            EntityKind::FacilityTypeApprovedProduct.duplicated_key(),
            "the orderable is already approved for this facility type and program",
        ));
    }

    repos.approved_products.save(product).await?;
    state
        .record(
            user,
            action,
            EntityKind::FacilityTypeApprovedProduct,
            product.id,
            product,
        )
        .await
}

pub(crate) async fn create_approved_product(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    JsonBody(product): JsonBody<FacilityTypeApprovedProduct>,
) -> Created<FacilityTypeApprovedProduct> {
    save_approved_product(&state, &user, &product, ACTION_CREATE).await?;
    created(product)
}

pub(crate) async fn get_approved_product(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<FacilityTypeApprovedProduct> {
    state
        .require(&user, right_names::FACILITY_APPROVED_ORDERABLES_MANAGE)
        .await?;
    let product = state.repos.approved_products.find_by_id(id).await?;
    Ok(Json(found(product, EntityKind::FacilityTypeApprovedProduct, id)?))
}

pub(crate) async fn update_approved_product(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    JsonBody(mut product): JsonBody<FacilityTypeApprovedProduct>,
) -> ApiResult<FacilityTypeApprovedProduct> {
    product.id = id;
    save_approved_product(&state, &user, &product, ACTION_UPDATE).await?;
    Ok(Json(product))
}

pub(crate) async fn delete_approved_product(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .require(&user, right_names::FACILITY_APPROVED_ORDERABLES_MANAGE)
        .await?;
    if !state.repos.approved_products.delete(id).await? {
        return Err(ApiError::not_found(EntityKind::FacilityTypeApprovedProduct, id));
    }
    state
        .record(
            &user,
            ACTION_DELETE,
            EntityKind::FacilityTypeApprovedProduct,
            id,
            &id,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApprovedProductSearch {
    #[serde(default)]
    facility_type: Option<String>,
    #[serde(default)]
    program: Option<String>,
}

/// Active approved products for a facility type code and program code.
pub(crate) async fn search_approved_products(
    State(state): State<Arc<ApiState>>,
    user: AuthenticatedUser,
    body: Option<JsonBody<ApprovedProductSearch>>,
) -> ApiResult<Vec<FacilityTypeApprovedProduct>> {
    state
        .require(&user, right_names::FACILITY_APPROVED_ORDERABLES_MANAGE)
        .await?;
    let search = body.map(|JsonBody(search)| search).unwrap_or_default();
    let facility_type = search
        .facility_type
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| {
            ApiError::bad_request(
                ERROR_SEARCH_FACILITY_TYPE_REQUIRED,
                "facilityType is required",
            )
        })?;
    let program = search
        .program
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| {
            ApiError::bad_request(ERROR_SEARCH_PROGRAM_REQUIRED, "program is required")
        })?;
    let page = state
        .repos
        .approved_products
        .search_products(&facility_type, &program, Pageable::unpaged())
        .await?;
    Ok(Json(page.content))
}
