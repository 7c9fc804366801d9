//! ---
//! refdata_section: "04-rights"
//! refdata_subsection: "tests"
//! refdata_type: "test"
//! refdata_scope: "code"
//! refdata_description: "End-to-end right assignment generation over SQLite."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::Registry;
use refdata_domain::{
    right_names, Facility, FacilityType, GeographicZone, Program, RequisitionGroup, Right,
    RightAssignment, RightType, Role, RoleAssignment, SupervisoryNode, User,
};
use refdata_persistence::{Database, Repositories};
use refdata_rights::{GenerationScope, RightAssignmentGenerator, RightsMetrics};
use uuid::Uuid;

struct World {
    repos: Repositories,
    program: Uuid,
    facilities: Vec<Uuid>,
    root: Uuid,
    child: Uuid,
    supervision_role: Uuid,
    admin_role: Uuid,
}

async fn role(repos: &Repositories, name: &str, right: Uuid) -> Uuid {
    let role = Role {
        id: Uuid::new_v4(),
        name: name.into(),
        description: None,
        right_ids: vec![right],
    };
    repos.roles.save(&role).await.unwrap();
    role.id
}

async fn node(repos: &Repositories, code: &str, parent: Option<Uuid>) -> Uuid {
    let node = SupervisoryNode {
        id: Uuid::new_v4(),
        code: code.into(),
        name: None,
        description: None,
        facility_id: None,
        parent_node_id: parent,
        child_node_ids: None,
        requisition_group_id: None,
    };
    repos.supervisory_nodes.save(&node).await.unwrap();
    node.id
}

/// SN1 (group: HC01) -> SN1.1 (group: HC02, HC03) for one program.
async fn world() -> World {
    let db = Database::in_memory().await.unwrap();
    let repos = db.repositories();

    let zone = GeographicZone {
        id: Uuid::new_v4(),
        code: "Z".into(),
        name: None,
        parent_id: None,
    };
    repos.geographic_zones.save(&zone).await.unwrap();
    let facility_type = FacilityType {
        id: Uuid::new_v4(),
        code: "HC".into(),
        name: None,
        description: None,
        display_order: None,
        active: true,
    };
    repos.facility_types.save(&facility_type).await.unwrap();
    let program = Program {
        id: Uuid::new_v4(),
        code: "FP".into(),
        name: Some("Family Planning".into()),
        description: None,
        active: true,
        periods_skippable: false,
        show_non_full_supply_tab: false,
    };
    repos.programs.save(&program).await.unwrap();

    let mut facilities = Vec::new();
    for code in ["HC01", "HC02", "HC03"] {
        let facility = Facility {
            id: Uuid::new_v4(),
            code: code.into(),
            name: code.into(),
            description: None,
            geographic_zone_id: zone.id,
            type_id: facility_type.id,
            active: true,
            enabled: true,
            go_live_date: None,
            go_down_date: None,
            supported_programs: Vec::new(),
        };
        repos.facilities.save(&facility).await.unwrap();
        facilities.push(facility.id);
    }

    let root = node(&repos, "SN1", None).await;
    let child = node(&repos, "SN1.1", Some(root)).await;
    for (code, node, members) in [
        ("RG1", root, vec![facilities[0]]),
        ("RG2", child, vec![facilities[1], facilities[2]]),
    ] {
        repos
            .requisition_groups
            .save(&RequisitionGroup {
                id: Uuid::new_v4(),
                code: code.into(),
                name: code.into(),
                description: None,
                supervisory_node_id: node,
                member_facility_ids: members,
                program_ids: vec![program.id],
            })
            .await
            .unwrap();
    }

    let approve = Right {
        id: Uuid::new_v4(),
        name: "REQUISITION_APPROVE".into(),
        right_type: RightType::Supervision,
        description: None,
        attachment_ids: Vec::new(),
    };
    repos.rights.save(&approve).await.unwrap();
    let supervision_role = role(&repos, "Approver", approve.id).await;
    let users_manage = repos
        .rights
        .find_by_name(right_names::USERS_MANAGE)
        .await
        .unwrap()
        .unwrap();
    let admin_role = role(&repos, "User Admin", users_manage.id).await;

    World {
        repos,
        program: program.id,
        facilities,
        root,
        child,
        supervision_role,
        admin_role,
    }
}

impl World {
    async fn user(&self, username: &str, home: Option<Uuid>, roles: &[RoleAssignment]) -> Uuid {
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
        self.repos.users.save(&user).await.unwrap();
        self.repos
            .role_assignments
            .replace_for_user(user.id, roles)
            .await
            .unwrap();
        user.id
    }
}

#[tokio::test]
async fn node_assignment_covers_whole_subtree() {
    let w = world().await;
    let user = w
        .user(
            "approver",
            None,
            &[RoleAssignment::supervision(w.supervision_role, w.program, Some(w.root))],
        )
        .await;

    let report = RightAssignmentGenerator::new(w.repos.clone())
        .generate_all()
        .await
        .unwrap();
    assert_eq!(report.rows_written, 3);
    assert_eq!(report.scope, GenerationScope::All);

    let rows = w.repos.right_assignments.find_by_user(user).await.unwrap();
    let mut facilities: Vec<_> = rows.iter().filter_map(|r| r.facility_id).collect();
    facilities.sort();
    let mut expected = w.facilities.clone();
    expected.sort();
    assert_eq!(facilities, expected);
    assert!(rows.iter().all(|r| r.program_id == Some(w.program)));
}

#[tokio::test]
async fn child_node_assignment_excludes_parent_group() {
    let w = world().await;
    let user = w
        .user(
            "child-approver",
            None,
            &[RoleAssignment::supervision(w.supervision_role, w.program, Some(w.child))],
        )
        .await;
    RightAssignmentGenerator::new(w.repos.clone())
        .generate_all()
        .await
        .unwrap();
    let rows = w.repos.right_assignments.find_by_user(user).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(!rows.iter().any(|r| r.facility_id == Some(w.facilities[0])));
}

#[tokio::test]
async fn overlapping_home_and_node_supervision_is_deduplicated() {
    let w = world().await;
    let user = w
        .user(
            "both",
            Some(w.facilities[0]),
            &[
                RoleAssignment::supervision(w.supervision_role, w.program, None),
                RoleAssignment::supervision(w.supervision_role, w.program, Some(w.root)),
                RoleAssignment::direct(w.admin_role),
            ],
        )
        .await;
    RightAssignmentGenerator::new(w.repos.clone())
        .generate_all()
        .await
        .unwrap();

    let rows = w.repos.right_assignments.find_by_user(user).await.unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows.contains(&RightAssignment::new(
        user,
        right_names::USERS_MANAGE,
        None,
        None
    )));
}

#[tokio::test]
async fn per_user_run_leaves_other_users_untouched() {
    let w = world().await;
    let admin = w
        .user("admin", None, &[RoleAssignment::direct(w.admin_role)])
        .await;
    let approver = w
        .user(
            "approver",
            None,
            &[RoleAssignment::supervision(w.supervision_role, w.program, Some(w.child))],
        )
        .await;
    let generator = RightAssignmentGenerator::new(w.repos.clone());
    generator.generate_all().await.unwrap();
    assert_eq!(w.repos.right_assignments.count().await.unwrap(), 3);

    w.repos.role_assignments.replace_for_user(approver, &[]).await.unwrap();
    let report = generator.generate_for_user(approver).await.unwrap();
    assert_eq!(report.rows_written, 0);
    assert_eq!(report.scope, GenerationScope::User(approver));

    assert!(w.repos.right_assignments.find_by_user(approver).await.unwrap().is_empty());
    assert_eq!(w.repos.right_assignments.find_by_user(admin).await.unwrap().len(), 1);
}

#[tokio::test]
async fn runs_are_recorded_in_metrics() {
    let w = world().await;
    w.user("admin", None, &[RoleAssignment::direct(w.admin_role)]).await;

    let registry = Arc::new(Registry::new());
    let metrics = RightsMetrics::new(registry.clone()).unwrap();
    RightAssignmentGenerator::new(w.repos.clone())
        .with_metrics(metrics)
        .generate_all()
        .await
        .unwrap();

    let written = registry
        .gather()
        .into_iter()
        .find(|family| family.get_name() == "refdata_right_assignment_rows_written_total")
        .unwrap();
    assert_eq!(written.get_metric()[0].get_counter().get_value(), 1.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_full_and_user_runs_settle_on_latest_assignments() {
    let w = world().await;
    let approver = w
        .user(
            "approver",
            None,
            &[RoleAssignment::supervision(w.supervision_role, w.program, Some(w.root))],
        )
        .await;
    let generator = RightAssignmentGenerator::new(w.repos.clone());
    generator.generate_all().await.unwrap();
    assert_eq!(w.repos.right_assignments.find_by_user(approver).await.unwrap().len(), 3);

    w.repos
        .role_assignments
        .replace_for_user(approver, &[RoleAssignment::direct(w.admin_role)])
        .await
        .unwrap();
    let full = generator.clone();
    let per_user = generator.clone();
    let (all, user) = tokio::join!(
        tokio::spawn(async move { full.generate_all().await }),
        tokio::spawn(async move { per_user.generate_for_user(approver).await }),
    );
    all.unwrap().unwrap();
    user.unwrap().unwrap();

    let rows = w.repos.right_assignments.find_by_user(approver).await.unwrap();
    assert_eq!(
        rows,
        vec![RightAssignment::new(approver, right_names::USERS_MANAGE, None, None)]
    );
}
