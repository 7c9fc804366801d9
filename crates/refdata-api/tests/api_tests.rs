//! ---
//! refdata_section: "05-networking-external-interfaces"
//! refdata_subsection: "tests"
//! refdata_type: "test"
//! refdata_scope: "code"
//! refdata_description: "HTTP tests for the REST controllers."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::sync::Arc;

use refdata_api::{bootstrap_admin, spawn_api_server, ApiServer, ApiState};
use refdata_common::config::AppConfig;
use refdata_domain::messages::{
    ERROR_INVALID_REQUEST_BODY, ERROR_ROLE_ASSIGNMENT_MISMATCH, ERROR_ROLE_RIGHT_TYPES_MIXED,
    ERROR_SEARCH_FACILITY_TYPE_REQUIRED, ERROR_SEARCH_PROGRAM_REQUIRED, ERROR_UNAUTHORIZED,
};
use refdata_domain::{
    right_names, FacilityType, GeographicZone, OrderableDisplayCategory, Program, Right,
    RightType, User,
};
use refdata_persistence::Database;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

struct TestApi {
    server: ApiServer,
    state: Arc<ApiState>,
    client: Client,
    token: String,
    admin_id: Uuid,
}

impl TestApi {
    async fn start() -> Self {
        let db = Database::in_memory().await.unwrap();
        let state = Arc::new(ApiState::new(db, &AppConfig::default()));
        let issued = bootstrap_admin(&state, "administrator").await.unwrap();
        let server = spawn_api_server(state.clone(), "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        Self {
            server,
            state,
            client: Client::new(),
            token: issued.access_token,
            admin_id: issued.user_id,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.server.addr(), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(&self.token)
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        let text = response.text().await.unwrap();
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        (status, value)
    }

    async fn plain_user_token(&self, username: &str) -> String {
        let user = User {
            id: Uuid::new_v4(),
            username: username.into(),
            first_name: None,
            last_name: None,
            email: None,
            job_title: None,
            timezone: None,
            home_facility_id: None,
            active: true,
            login_restricted: false,
            role_assignments: Vec::new(),
        };
        self.state.repositories().users.save(&user).await.unwrap();
        self.state
            .tokens()
            .issue(user.id, None)
            .await
            .unwrap()
            .access_token
    }

    /// Zone, facility type, program and display category shared by tests.
    async fn basics(&self) -> (Uuid, Uuid, Uuid, Uuid) {
        let repos = self.state.repositories();
        let zone = GeographicZone {
            id: Uuid::new_v4(),
            code: "Z1".into(),
            name: Some("Zone".into()),
            parent_id: None,
        };
        repos.geographic_zones.save(&zone).await.unwrap();
        let facility_type = FacilityType {
            id: Uuid::new_v4(),
            code: "HC".into(),
            name: Some("Health center".into()),
            description: None,
            display_order: None,
            active: true,
        };
        repos.facility_types.save(&facility_type).await.unwrap();
        let program = Program {
            id: Uuid::new_v4(),
            code: "FP".into(),
            name: Some("Family planning".into()),
            description: None,
            active: true,
            periods_skippable: false,
            show_non_full_supply_tab: false,
        };
        repos.programs.save(&program).await.unwrap();
        let category = OrderableDisplayCategory {
            id: Uuid::new_v4(),
            code: "C1".into(),
            display_name: "Category".into(),
            display_order: 1,
        };
        repos
            .orderable_display_categories
            .save(&category)
            .await
            .unwrap();
        (zone.id, facility_type.id, program.id, category.id)
    }
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_a_token() {
    let api = TestApi::start().await;

    let response = api
        .client
        .get(api.url("/api/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "UP");
    assert_eq!(body["database"], "UP");

    let response = api
        .client
        .get(api.url("/api/supervisoryNodes"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = api
        .client
        .get(api.url("/api/supervisoryNodes"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = api
        .client
        .get(api.url(&format!("/api/programs?access_token={}", api.token)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    api.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn supervisory_node_lifecycle() {
    let api = TestApi::start().await;

    let (status, created) = api
        .send(
            Method::POST,
            "/api/supervisoryNodes",
            Some(json!({ "code": "SN1", "name": "Node 1" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_owned();

    let (status, body) = api
        .send(
            Method::POST,
            "/api/supervisoryNodes",
            Some(json!({ "code": "sn1", "name": "Again" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["messageKey"],
        "referenceData.error.supervisoryNode.code.duplicated"
    );

    let (status, body) = api
        .send(
            Method::POST,
            "/api/supervisoryNodes",
            Some(json!({ "name": "No code" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["messageKey"], ERROR_INVALID_REQUEST_BODY);

    let (status, body) = api
        .send(
            Method::POST,
            "/api/supervisoryNodes",
            Some(json!({ "code": "  " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["messageKey"],
        "referenceData.error.supervisoryNode.code.required"
    );

    // PUT on an unknown id creates the node as a child of SN1.
    let child_id = Uuid::new_v4();
    let (status, child) = api
        .send(
            Method::PUT,
            &format!("/api/supervisoryNodes/{child_id}"),
            Some(json!({ "code": "SN1.1", "parentNode": { "id": id } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(child["id"], child_id.to_string());

    let (status, parent) = api
        .send(Method::GET, &format!("/api/supervisoryNodes/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parent["childNodes"][0]["id"], child_id.to_string());

    let (status, page) = api
        .send(
            Method::GET,
            &format!("/api/supervisoryNodes?id={id}&id={child_id}&size=1"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalElements"], 2);
    assert_eq!(page["numberOfElements"], 1);
    assert_eq!(page["totalPages"], 2);

    let (status, history) = api
        .send(Method::GET, &format!("/api/supervisoryNodes/{id}/auditLog"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history[0]["action"], "create");
    assert_eq!(history[0]["actorId"], api.admin_id.to_string());

    let (status, _) = api
        .send(Method::DELETE, &format!("/api/supervisoryNodes/{child_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = api
        .send(Method::GET, &format!("/api/supervisoryNodes/{child_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["messageKey"],
        "referenceData.error.supervisoryNode.notFound"
    );

    assert!(api.state.audit().verify().await.unwrap());
    api.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn writes_without_the_right_are_forbidden() {
    let api = TestApi::start().await;
    let token = api.plain_user_token("clerk").await;

    let response = api
        .client
        .post(api.url("/api/supervisoryNodes"))
        .bearer_auth(&token)
        .json(&json!({ "code": "SN9" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["messageKey"], ERROR_UNAUTHORIZED);

    let response = api
        .client
        .get(api.url("/api/supervisoryNodes"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    api.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn supervising_users_checks_node_before_right_and_program() {
    let api = TestApi::start().await;
    let (_, _, program, _) = api.basics().await;
    let (_, node) = api
        .send(Method::POST, "/api/supervisoryNodes", Some(json!({ "code": "SN1" })))
        .await;
    let node_id = node["id"].as_str().unwrap();
    let right = api
        .state
        .repositories()
        .rights
        .find_by_name(right_names::USERS_MANAGE)
        .await
        .unwrap()
        .unwrap();

    let missing = Uuid::new_v4();
    let (status, _) = api
        .send(
            Method::GET,
            &format!("/api/supervisoryNodes/{missing}/supervisingUsers?rightId={}&programId={program}", right.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = api
        .send(
            Method::GET,
            &format!("/api/supervisoryNodes/{node_id}/supervisingUsers?rightId={missing}&programId={program}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["messageKey"], "referenceData.error.right.notFound");

    let (status, body) = api
        .send(
            Method::GET,
            &format!("/api/supervisoryNodes/{node_id}/supervisingUsers?rightId={}&programId={missing}", right.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["messageKey"], "referenceData.error.program.notFound");

    let (status, body) = api
        .send(
            Method::GET,
            &format!("/api/supervisoryNodes/{node_id}/supervisingUsers?rightId={}&programId={program}", right.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    api.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn node_export_is_csv() {
    let api = TestApi::start().await;
    let (_, root) = api
        .send(
            Method::POST,
            "/api/supervisoryNodes",
            Some(json!({ "code": "SN1", "name": "Root" })),
        )
        .await;
    api.send(
        Method::POST,
        "/api/supervisoryNodes",
        Some(json!({ "code": "SN2", "name": "Leaf", "parentNode": { "id": root["id"] } })),
    )
    .await;

    let response = api
        .request(Method::GET, "/api/supervisoryNodes/download")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/csv");
    let text = response.text().await.unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "code,name,facilityCode,parentNodeCode",
            "SN1,Root,,",
            "SN2,Leaf,,SN1"
        ]
    );

    api.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn orderable_updates_create_versions_and_set_last_modified() {
    let api = TestApi::start().await;
    let (_, _, program, category) = api.basics().await;

    let (status, orderable) = api
        .send(
            Method::POST,
            "/api/orderables",
            Some(json!({
                "productCode": "C100",
                "fullProductName": "Condoms",
                "netContent": 10,
                "programs": [{ "programId": program, "orderableDisplayCategoryId": category }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(orderable["versionNumber"], 1);
    let id = orderable["id"].as_str().unwrap().to_owned();

    let (status, updated) = api
        .send(
            Method::PUT,
            &format!("/api/orderables/{id}"),
            Some(json!({
                "productCode": "C100",
                "fullProductName": "Male condoms",
                "netContent": 12,
                "programs": [{ "programId": program, "orderableDisplayCategoryId": category }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["versionNumber"], 2);

    let (_, first) = api
        .send(Method::GET, &format!("/api/orderables/{id}?versionNumber=1"), None)
        .await;
    assert_eq!(first["fullProductName"], "Condoms");

    let response = api
        .request(Method::GET, "/api/orderables?program=FP")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("last-modified"));
    let page: Value = response.json().await.unwrap();
    assert_eq!(page["totalElements"], 1);
    assert_eq!(page["content"][0]["versionNumber"], 2);

    let (status, body) = api
        .send(
            Method::POST,
            "/api/orderables",
            Some(json!({ "productCode": "c100", "fullProductName": "Clash" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["messageKey"],
        "referenceData.error.orderable.productCode.duplicated"
    );

    api.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn approved_products_reject_duplicates_and_search_by_codes() {
    let api = TestApi::start().await;
    let (_, facility_type, program, category) = api.basics().await;
    let (_, orderable) = api
        .send(
            Method::POST,
            "/api/orderables",
            Some(json!({
                "productCode": "C100",
                "fullProductName": "Condoms",
                "programs": [{ "programId": program, "orderableDisplayCategoryId": category }]
            })),
        )
        .await;
    let body = json!({
        "facilityType": { "id": facility_type },
        "orderable": { "id": orderable["id"] },
        "program": { "id": program },
        "maxPeriodsOfStock": 3.0
    });

    let (status, created) = api
        .send(Method::POST, "/api/facilityTypeApprovedProducts", Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_owned();

    let (status, error) = api
        .send(Method::POST, "/api/facilityTypeApprovedProducts", Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error["messageKey"],
        "referenceData.error.facilityTypeApprovedProduct.duplicated"
    );

    let mut update = body.clone();
    update["maxPeriodsOfStock"] = json!(5.0);
    let (status, updated) = api
        .send(
            Method::PUT,
            &format!("/api/facilityTypeApprovedProducts/{id}"),
            Some(update),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["maxPeriodsOfStock"], 5.0);

    let (status, found) = api
        .send(
            Method::POST,
            "/api/facilityTypeApprovedProducts/search",
            Some(json!({ "facilityType": "HC", "program": "FP" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.as_array().unwrap().len(), 1);

    let (status, error) = api
        .send(
            Method::POST,
            "/api/facilityTypeApprovedProducts/search",
            Some(json!({ "program": "FP" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["messageKey"], ERROR_SEARCH_FACILITY_TYPE_REQUIRED);
    let (_, error) = api
        .send(
            Method::POST,
            "/api/facilityTypeApprovedProducts/search",
            Some(json!({ "facilityType": "HC" })),
        )
        .await;
    assert_eq!(error["messageKey"], ERROR_SEARCH_PROGRAM_REQUIRED);

    let (status, _) = api
        .send(
            Method::DELETE,
            &format!("/api/facilityTypeApprovedProducts/{id}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = api
        .send(
            Method::GET,
            &format!("/api/facilityTypeApprovedProducts/{id}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    api.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn roles_and_assignments_enforce_right_types() {
    let api = TestApi::start().await;
    let (_, _, program, _) = api.basics().await;
    let repos = api.state.repositories();
    let admin_right = repos
        .rights
        .find_by_name(right_names::FACILITIES_MANAGE)
        .await
        .unwrap()
        .unwrap();
    let supervision_right = Right {
        id: Uuid::new_v4(),
        name: "REQUISITION_CREATE".into(),
        right_type: RightType::Supervision,
        description: None,
        attachment_ids: Vec::new(),
    };
    repos.rights.save(&supervision_right).await.unwrap();

    let (status, body) = api
        .send(
            Method::POST,
            "/api/roles",
            Some(json!({ "name": "Mixed", "rightIds": [admin_right.id, supervision_right.id] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["messageKey"], ERROR_ROLE_RIGHT_TYPES_MIXED);

    let (status, role) = api
        .send(
            Method::POST,
            "/api/roles",
            Some(json!({ "name": "Facility admin", "rightIds": [admin_right.id] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, user) = api
        .send(
            Method::POST,
            "/api/users",
            Some(json!({ "username": "jdoe", "email": "jdoe@example.org" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = user["id"].as_str().unwrap().to_owned();

    let (status, body) = api
        .send(
            Method::PUT,
            &format!("/api/users/{user_id}/roleAssignments"),
            Some(json!([{ "roleId": role["id"], "programId": program }])),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["messageKey"], ERROR_ROLE_ASSIGNMENT_MISMATCH);

    let (status, _) = api
        .send(
            Method::PUT,
            &format!("/api/users/{user_id}/roleAssignments"),
            Some(json!([{ "roleId": role["id"] }])),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, strings) = api
        .send(
            Method::GET,
            &format!("/api/users/{user_id}/permissionStrings"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(strings, json!(["FACILITIES_MANAGE"]));

    let (_, answer) = api
        .send(
            Method::GET,
            &format!("/api/users/{user_id}/hasRight?rightId={}", admin_right.id),
            None,
        )
        .await;
    assert_eq!(answer["result"], true);

    let (status, _) = api
        .send(
            Method::POST,
            "/api/users",
            Some(json!({ "username": "JDOE" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    api.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn approved_product_search_requires_the_manage_right() {
    let api = TestApi::start().await;
    api.basics().await;
    let token = api.plain_user_token("viewer").await;
    let url = api.url("/api/facilityTypeApprovedProducts/search");

    let response = api
        .client
        .post(&url)
        .bearer_auth(&token)
        .json(&json!({ "facilityType": "HC", "program": "FP" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["messageKey"], ERROR_UNAUTHORIZED);

    // The right is checked before the search keys.
    let response = api.client.post(&url).bearer_auth(&token).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let (status, body) = api
        .send(Method::POST, "/api/facilityTypeApprovedProducts/search", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["messageKey"], ERROR_SEARCH_FACILITY_TYPE_REQUIRED);

    api.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn role_rights_cannot_change_type_under_existing_assignments() {
    let api = TestApi::start().await;
    let repos = api.state.repositories();
    let admin_right = repos
        .rights
        .find_by_name(right_names::FACILITIES_MANAGE)
        .await
        .unwrap()
        .unwrap();
    let supervision_right = Right {
        id: Uuid::new_v4(),
        name: "REQUISITION_CREATE".into(),
        right_type: RightType::Supervision,
        description: None,
        attachment_ids: Vec::new(),
    };
    repos.rights.save(&supervision_right).await.unwrap();

    let (_, role) = api
        .send(
            Method::POST,
            "/api/roles",
            Some(json!({ "name": "Clerk", "rightIds": [admin_right.id] })),
        )
        .await;
    let role_id = role["id"].as_str().unwrap().to_owned();
    let (status, user) = api
        .send(
            Method::POST,
            "/api/users",
            Some(json!({ "username": "u1", "roleAssignments": [{ "roleId": role_id }] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = user["id"].as_str().unwrap().to_owned();

    let (status, body) = api
        .send(
            Method::PUT,
            &format!("/api/roles/{role_id}"),
            Some(json!({ "name": "Clerk", "rightIds": [supervision_right.id] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["messageKey"], ERROR_ROLE_ASSIGNMENT_MISMATCH);

    let (_, strings) = api
        .send(
            Method::GET,
            &format!("/api/users/{user_id}/permissionStrings"),
            None,
        )
        .await;
    assert_eq!(strings, json!(["FACILITIES_MANAGE"]));

    // Another right of the same type is accepted.
    let (status, _) = api
        .send(
            Method::PUT,
            &format!("/api/roles/{role_id}"),
            Some(json!({ "name": "Clerk", "rightIds": [admin_right.id] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    api.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn renaming_a_node_keeps_its_children() {
    let api = TestApi::start().await;
    let (_, parent) = api
        .send(
            Method::POST,
            "/api/supervisoryNodes",
            Some(json!({ "code": "P", "name": "Parent" })),
        )
        .await;
    let parent_id = parent["id"].as_str().unwrap().to_owned();
    let (status, child) = api
        .send(
            Method::POST,
            "/api/supervisoryNodes",
            Some(json!({ "code": "C", "parentNode": { "id": parent_id } })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, renamed) = api
        .send(
            Method::PUT,
            &format!("/api/supervisoryNodes/{parent_id}"),
            Some(json!({ "code": "P", "name": "Renamed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "Renamed");
    assert_eq!(renamed["childNodes"], json!([{ "id": child["id"] }]));

    // An explicit empty list still detaches the children.
    let (_, detached) = api
        .send(
            Method::PUT,
            &format!("/api/supervisoryNodes/{parent_id}"),
            Some(json!({ "code": "P", "name": "Renamed", "childNodes": [] })),
        )
        .await;
    assert_eq!(detached["childNodes"], json!([]));

    api.server.shutdown().await.unwrap();
}
