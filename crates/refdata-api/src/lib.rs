//! ---
//! refdata_section: "05-networking-external-interfaces"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "REST surface for reference data."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
//! REST API for the reference data service.
//!
//! Every route except `/api/health` requires a bearer token. Errors are
//! rendered as `{messageKey, message}` with the status chosen in
//! [`error::ApiError`].

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub mod bootstrap;
mod controllers;
pub mod error;
pub mod extract;
pub mod state;

pub use bootstrap::bootstrap_admin;
pub use error::ApiError;
pub use state::ApiState;

use controllers::{access, geography, health, products, programs, supervision};

/// Every route of the service.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .route(
            "/api/geographicZones",
            get(geography::list_zones).post(geography::create_zone),
        )
        .route("/api/geographicZones/:id", get(geography::get_zone))
        .route(
            "/api/facilityTypes",
            get(geography::list_facility_types).post(geography::create_facility_type),
        )
        .route(
            "/api/facilityTypes/:id",
            get(geography::get_facility_type)
                .put(geography::update_facility_type)
                .delete(geography::delete_facility_type),
        )
        .route(
            "/api/facilities",
            get(geography::search_facilities).post(geography::create_facility),
        )
        .route(
            "/api/facilities/:id",
            get(geography::get_facility)
                .put(geography::update_facility)
                .delete(geography::delete_facility),
        )
        .route(
            "/api/programs",
            get(programs::list_programs).post(programs::create_program),
        )
        .route(
            "/api/programs/:id",
            get(programs::get_program)
                .put(programs::update_program)
                .delete(programs::delete_program),
        )
        .route(
            "/api/supervisoryNodes",
            get(supervision::search_nodes).post(supervision::create_node),
        )
        .route(
            "/api/supervisoryNodes/download",
            get(supervision::download_nodes),
        )
        .route(
            "/api/supervisoryNodes/:id",
            get(supervision::get_node)
                .put(supervision::update_node)
                .delete(supervision::delete_node),
        )
        .route(
            "/api/supervisoryNodes/:id/supervisingUsers",
            get(supervision::supervising_users),
        )
        .route(
            "/api/supervisoryNodes/:id/facilities",
            get(supervision::supervised_facilities),
        )
        .route(
            "/api/supervisoryNodes/:id/auditLog",
            get(supervision::node_audit_log),
        )
        .route(
            "/api/requisitionGroups",
            get(supervision::list_groups).post(supervision::create_group),
        )
        .route(
            "/api/requisitionGroups/:id",
            get(supervision::get_group)
                .put(supervision::update_group)
                .delete(supervision::delete_group),
        )
        .route(
            "/api/orderableDisplayCategories",
            get(products::list_categories).post(products::create_category),
        )
        .route(
            "/api/orderableDisplayCategories/:id",
            get(products::get_category),
        )
        .route(
            "/api/orderables",
            get(products::search_orderables).post(products::create_orderable),
        )
        .route(
            "/api/orderables/:id",
            get(products::get_orderable).put(products::update_orderable),
        )
        .route(
            "/api/tradeItems",
            get(products::list_trade_items).put(products::save_trade_item),
        )
        .route(
            "/api/facilityTypeApprovedProducts",
            post(products::create_approved_product),
        )
        .route(
            "/api/facilityTypeApprovedProducts/search",
            post(products::search_approved_products),
        )
        .route(
            "/api/facilityTypeApprovedProducts/:id",
            get(products::get_approved_product)
                .put(products::update_approved_product)
                .delete(products::delete_approved_product),
        )
        .route(
            "/api/users",
            get(access::list_users).post(access::create_user),
        )
        .route(
            "/api/users/:id",
            get(access::get_user)
                .put(access::update_user)
                .delete(access::delete_user),
        )
        .route(
            "/api/users/:id/roleAssignments",
            get(access::get_role_assignments).put(access::put_role_assignments),
        )
        .route("/api/users/:id/hasRight", get(access::has_right))
        .route(
            "/api/users/:id/permissionStrings",
            get(access::permission_strings),
        )
        .route(
            "/api/roles",
            get(access::list_roles).post(access::create_role),
        )
        .route(
            "/api/roles/:id",
            get(access::get_role)
                .put(access::update_role)
                .delete(access::delete_role),
        )
        .route("/api/rights", get(access::list_rights))
        .route("/api/rights/:id", get(access::get_right))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Handle to the running API server.
#[derive(Debug)]
pub struct ApiServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl ApiServer {
    /// Bound address; differs from the requested one when port 0 was used.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(err.into()),
        }
    }
}

/// Bind `addr` and serve [`router`] until [`ApiServer::shutdown`].
pub async fn spawn_api_server(state: Arc<ApiState>, addr: SocketAddr) -> Result<ApiServer> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind API listener {addr}"))?;
    let addr = listener
        .local_addr()
        .context("failed to read API listener address")?;
    let router = router(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task: JoinHandle<Result<()>> = tokio::spawn(async move {
        info!(address = %addr, "api server listening");
        if let Err(err) = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
        {
            error!(address = %addr, error = %err, "api server exited with error");
            return Err(err.into());
        }
        Ok(())
    });

    Ok(ApiServer {
        addr,
        shutdown: Some(shutdown_tx),
        task,
    })
}
