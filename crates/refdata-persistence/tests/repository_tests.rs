//! ---
//! refdata_section: "03-persistence"
//! refdata_subsection: "tests"
//! refdata_type: "test"
//! refdata_scope: "code"
//! refdata_description: "Repository behaviour against an in-memory database."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use chrono::{Duration, Utc};
use refdata_common::DatabaseConfig;
use refdata_domain::{
    right_names, Facility, FacilityType, GeographicZone, Pageable, Program, RequisitionGroup,
    RightAssignment, RightType, Role, RoleAssignment, SupervisoryNode, User,
};
use refdata_persistence::{
    AuditRecord, Database, PersistenceError, Repositories, StoredToken, SupervisoryNodeSearch,
    CURRENT_VERSION,
};
use serde_json::json;
use uuid::Uuid;

struct Fixture {
    repos: Repositories,
    zone: Uuid,
    facility_type: Uuid,
}

async fn fixture() -> Fixture {
    let db = Database::in_memory().await.expect("in-memory database");
    let repos = db.repositories();
    let zone = GeographicZone {
        id: Uuid::new_v4(),
        code: "Z1".into(),
        name: Some("Zone".into()),
        parent_id: None,
    };
    repos.geographic_zones.save(&zone).await.expect("zone");
    let facility_type = FacilityType {
        id: Uuid::new_v4(),
        code: "health_center".into(),
        name: Some("Health Center".into()),
        description: None,
        display_order: Some(1),
        active: true,
    };
    repos.facility_types.save(&facility_type).await.expect("type");
    Fixture {
        repos,
        zone: zone.id,
        facility_type: facility_type.id,
    }
}

impl Fixture {
    async fn program(&self, code: &str) -> Uuid {
        let program = Program {
            id: Uuid::new_v4(),
            code: code.into(),
            name: Some(code.to_lowercase()),
            description: None,
            active: true,
            periods_skippable: false,
            show_non_full_supply_tab: false,
        };
        self.repos.programs.save(&program).await.expect("program");
        program.id
    }

    async fn facility(&self, code: &str) -> Uuid {
        let facility = Facility {
            id: Uuid::new_v4(),
            code: code.into(),
            name: format!("Facility {code}"),
            description: None,
            geographic_zone_id: self.zone,
            type_id: self.facility_type,
            active: true,
            enabled: true,
            go_live_date: None,
            go_down_date: None,
            supported_programs: Vec::new(),
        };
        self.repos.facilities.save(&facility).await.expect("facility");
        facility.id
    }

    async fn node(&self, code: &str, facility: Option<Uuid>, parent: Option<Uuid>) -> Uuid {
        let node = SupervisoryNode {
            id: Uuid::new_v4(),
            code: code.into(),
            name: Some(format!("Node {code}")),
            description: None,
            facility_id: facility,
            parent_node_id: parent,
            child_node_ids: None,
            requisition_group_id: None,
        };
        self.repos.supervisory_nodes.save(&node).await.expect("node");
        node.id
    }

    async fn group(&self, code: &str, node: Uuid, members: Vec<Uuid>, programs: Vec<Uuid>) -> Uuid {
        let group = RequisitionGroup {
            id: Uuid::new_v4(),
            code: code.into(),
            name: format!("Group {code}"),
            description: None,
            supervisory_node_id: node,
            member_facility_ids: members,
            program_ids: programs,
        };
        self.repos.requisition_groups.save(&group).await.expect("group");
        group.id
    }

    async fn user(&self, username: &str, home: Option<Uuid>) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.into(),
            first_name: None,
            last_name: None,
            email: None,
            job_title: None,
            timezone: None,
            home_facility_id: home,
            active: true,
            login_restricted: false,
            role_assignments: Vec::new(),
        };
        self.repos.users.save(&user).await.expect("user");
        user
    }

    async fn supervision_role(&self, name: &str) -> Uuid {
        let right = refdata_domain::Right {
            id: Uuid::new_v4(),
            name: format!("{name}_RIGHT"),
            right_type: RightType::Supervision,
            description: None,
            attachment_ids: Vec::new(),
        };
        self.repos.rights.save(&right).await.expect("right");
        let role = Role {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            right_ids: vec![right.id],
        };
        self.repos.roles.save(&role).await.expect("role");
        role.id
    }
}

#[tokio::test]
async fn migrations_reach_current_version_and_seed_admin_rights() {
    let db = Database::connect(&DatabaseConfig::in_memory()).await.unwrap();
    let status = db.migration_status().await.unwrap();
    assert_eq!(status.current_version, CURRENT_VERSION);
    assert!(!status.needs_migration);

    let rights = db.repositories().rights.find_all().await.unwrap();
    for name in right_names::ALL_ADMIN {
        let right = rights.iter().find(|r| r.name == name).expect(name);
        assert_eq!(right.right_type, RightType::GeneralAdmin);
    }

    // Re-running is a no-op.
    db.migrate().await.unwrap();
    db.health_check().await.unwrap();
}

#[tokio::test]
async fn file_database_is_created_under_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("nested").join("refdata.db"),
        ..DatabaseConfig::default()
    };
    let db = Database::connect(&config).await.unwrap();
    assert!(config.path.exists());
    db.close().await;
}

#[tokio::test]
async fn duplicate_codes_are_reported_as_unique_violations() {
    let fx = fixture().await;
    fx.program("PRG").await;
    let clash = Program {
        id: Uuid::new_v4(),
        code: "prg".into(),
        name: None,
        description: None,
        active: true,
        periods_skippable: false,
        show_non_full_supply_tab: false,
    };
    let err = fx.repos.programs.save(&clash).await.unwrap_err();
    assert!(matches!(err, PersistenceError::UniqueViolation(_)), "{err:?}");
}

#[tokio::test]
async fn node_hierarchy_is_derived_from_parent_links() {
    let fx = fixture().await;
    let root = fx.node("SN1", None, None).await;
    let child = fx.node("SN1.1", None, Some(root)).await;

    let loaded = fx.repos.supervisory_nodes.find_by_id(root).await.unwrap().unwrap();
    assert_eq!(loaded.child_node_ids, Some(vec![child]));

    // Saving the parent without a child list keeps its children.
    let mut renamed = loaded.clone();
    renamed.name = Some("Renamed".into());
    renamed.child_node_ids = None;
    fx.repos.supervisory_nodes.save(&renamed).await.unwrap();
    let reloaded = fx.repos.supervisory_nodes.find_by_id(root).await.unwrap().unwrap();
    assert_eq!(reloaded.child_node_ids, Some(vec![child]));

    // An explicit empty list detaches them.
    let mut updated = loaded.clone();
    updated.child_node_ids = Some(Vec::new());
    fx.repos.supervisory_nodes.save(&updated).await.unwrap();
    let child = fx.repos.supervisory_nodes.find_by_id(child).await.unwrap().unwrap();
    assert_eq!(child.parent_node_id, None);
}

#[tokio::test]
async fn node_search_filters_by_facility_program_and_zone() {
    let fx = fixture().await;
    let program = fx.program("PRG").await;
    let other_program = fx.program("OTHER").await;
    let home = fx.facility("HC01").await;
    let member = fx.facility("HC02").await;
    let node = fx.node("SN1", Some(home), None).await;
    fx.node("SN2", None, None).await;
    let group = fx.group("RG1", node, vec![member], vec![program]).await;

    let loaded = fx.repos.supervisory_nodes.find_by_id(node).await.unwrap().unwrap();
    assert_eq!(loaded.requisition_group_id, Some(group));

    let page = |search: SupervisoryNodeSearch| {
        let repos = fx.repos.clone();
        async move {
            repos
                .supervisory_nodes
                .search(&search, Pageable::unpaged())
                .await
                .unwrap()
        }
    };

    let by_member = page(SupervisoryNodeSearch {
        facility_id: Some(member),
        program_id: Some(program),
        ..Default::default()
    })
    .await;
    assert_eq!(by_member.total_elements, 1);
    assert_eq!(by_member.content[0].id, node);

    let wrong_program = page(SupervisoryNodeSearch {
        facility_id: Some(member),
        program_id: Some(other_program),
        ..Default::default()
    })
    .await;
    assert_eq!(wrong_program.total_elements, 0);

    let by_zone = page(SupervisoryNodeSearch {
        zone_id: Some(fx.zone),
        ..Default::default()
    })
    .await;
    assert_eq!(by_zone.total_elements, 1);

    let by_name = page(SupervisoryNodeSearch {
        name: Some("node".into()),
        ..Default::default()
    })
    .await;
    assert_eq!(by_name.total_elements, 2);
}

#[tokio::test]
async fn snapshot_lists_tree_and_coverage() {
    let fx = fixture().await;
    let program = fx.program("PRG").await;
    let f1 = fx.facility("HC01").await;
    let root = fx.node("SN1", None, None).await;
    let child = fx.node("SN1.1", None, Some(root)).await;
    fx.group("RG1", child, vec![f1], vec![program]).await;

    let snapshot = fx.repos.supervisory_nodes.load_snapshot().await.unwrap();
    assert_eq!(snapshot.nodes.len(), 2);
    assert!(snapshot.nodes.contains(&(child, Some(root))));
    assert_eq!(snapshot.coverage, vec![(child, program, f1)]);
}

#[tokio::test]
async fn intermediate_rows_resolve_home_facility_and_skip_homeless_users() {
    let fx = fixture().await;
    let program = fx.program("PRG").await;
    let home = fx.facility("HC01").await;
    let role = fx.supervision_role("Storeroom Manager").await;

    let housed = fx.user("housed", Some(home)).await;
    let homeless = fx.user("homeless", None).await;
    for user in [&housed, &homeless] {
        fx.repos
            .role_assignments
            .replace_for_user(user.id, &[RoleAssignment::supervision(role, program, None)])
            .await
            .unwrap();
    }

    let rows = fx.repos.role_assignments.find_intermediate(None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, housed.id);
    assert_eq!(rows[0].facility_id, Some(home));
    assert_eq!(rows[0].program_id, Some(program));
    assert_eq!(rows[0].right_name, "Storeroom Manager_RIGHT");

    let only = fx
        .repos
        .role_assignments
        .find_intermediate(Some(homeless.id))
        .await
        .unwrap();
    assert!(only.is_empty());
}

#[tokio::test]
async fn right_assignments_are_replaced_wholesale_or_per_user() {
    let fx = fixture().await;
    let alice = fx.user("alice", None).await;
    let bob = fx.user("bob", None).await;
    let facility = fx.facility("HC01").await;

    let initial = [
        RightAssignment::new(alice.id, right_names::USERS_MANAGE, None, None),
        RightAssignment::new(bob.id, right_names::USERS_MANAGE, None, None),
    ];
    let written = fx.repos.right_assignments.replace_all(&initial).await.unwrap();
    assert_eq!(written, 2);

    let replacement = [
        RightAssignment::new(alice.id, "REQUISITION_VIEW", Some(facility), None),
        RightAssignment::new(bob.id, "IGNORED", None, None),
    ];
    fx.repos
        .right_assignments
        .replace_for_user(alice.id, &replacement)
        .await
        .unwrap();

    assert_eq!(fx.repos.right_assignments.count().await.unwrap(), 2);
    assert!(fx
        .repos
        .right_assignments
        .has_right(alice.id, "REQUISITION_VIEW", Some(facility), None)
        .await
        .unwrap());
    assert!(!fx
        .repos
        .right_assignments
        .has_right(alice.id, right_names::USERS_MANAGE, None, None)
        .await
        .unwrap());
    assert!(fx
        .repos
        .right_assignments
        .has_right(bob.id, right_names::USERS_MANAGE, None, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn tokens_round_trip_and_are_revoked_per_user() {
    let fx = fixture().await;
    let user = fx.user("admin", None).await;
    let token = StoredToken {
        token_hash: "ab".repeat(32),
        user_id: user.id,
        label: Some("cli".into()),
        created_at: Utc::now(),
        expires_at: Some(Utc::now() + Duration::hours(1)),
    };
    fx.repos.tokens.insert(&token).await.unwrap();
    let found = fx.repos.tokens.find_by_hash(&token.token_hash).await.unwrap().unwrap();
    assert_eq!(found.user_id, user.id);
    assert!(!found.is_expired(Utc::now()));

    assert_eq!(fx.repos.tokens.delete_for_user(user.id).await.unwrap(), 1);
    assert!(fx.repos.tokens.find_by_hash(&token.token_hash).await.unwrap().is_none());
}

#[tokio::test]
async fn audit_records_keep_insertion_order() {
    let fx = fixture().await;
    let entity = Uuid::new_v4();
    assert!(fx.repos.audit.last_hash().await.unwrap().is_none());

    let first = fx
        .repos
        .audit
        .append(&AuditRecord {
            sequence: 0,
            recorded_at: Utc::now(),
            actor_id: None,
            action: "create".into(),
            entity_type: "supervisoryNode".into(),
            entity_id: entity,
            metadata: json!({"code": "SN1"}),
            previous_hash: None,
            hash: "h1".into(),
        })
        .await
        .unwrap();
    assert!(first.sequence > 0);
    fx.repos
        .audit
        .append(&AuditRecord {
            action: "update".into(),
            previous_hash: Some("h1".into()),
            hash: "h2".into(),
            ..first.clone()
        })
        .await
        .unwrap();

    let history = fx.repos.audit.list_for_entity("supervisoryNode", entity).await.unwrap();
    let actions: Vec<_> = history.iter().map(|r| r.action.as_str()).collect();
    assert_eq!(actions, ["create", "update"]);
    assert_eq!(history[1].metadata, json!({"code": "SN1"}));
    assert_eq!(fx.repos.audit.last_hash().await.unwrap().as_deref(), Some("h2"));
}

#[tokio::test]
async fn user_and_role_assignments_are_saved_atomically() {
    let fx = fixture().await;
    let program = fx.program("PRG").await;
    let role = fx.supervision_role("Approver").await;
    let user = User {
        id: Uuid::new_v4(),
        username: "atomic".into(),
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

    let dangling = [RoleAssignment::direct(Uuid::new_v4())];
    assert!(fx
        .repos
        .users
        .save_with_assignments(&user, Some(&dangling[..]))
        .await
        .is_err());
    assert!(fx.repos.users.find_by_id(user.id).await.unwrap().is_none());

    let assignments = [RoleAssignment::supervision(role, program, None)];
    fx.repos
        .users
        .save_with_assignments(&user, Some(&assignments[..]))
        .await
        .unwrap();
    assert!(fx.repos.users.exists(user.id).await.unwrap());
    assert_eq!(
        fx.repos.role_assignments.find_by_role(role).await.unwrap(),
        assignments.to_vec()
    );

    // Saving without assignments keeps the stored ones.
    fx.repos.users.save_with_assignments(&user, None).await.unwrap();
    assert_eq!(
        fx.repos.role_assignments.find_by_user(user.id).await.unwrap(),
        assignments.to_vec()
    );
}
