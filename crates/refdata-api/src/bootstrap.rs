//! ---
//! refdata_section: "05-networking-external-interfaces"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "First administrator provisioning."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use anyhow::{Context, Result};
use refdata_domain::{new_id, right_names, Role, RoleAssignment, User};
use refdata_security::IssuedToken;
use tracing::info;

use crate::state::ApiState;

pub const ADMIN_ROLE: &str = "System Administrator";

/// Ensure `username` exists and holds every administrative right, then
/// issue a bearer token for it. Safe to run repeatedly.
pub async fn bootstrap_admin(state: &ApiState, username: &str) -> Result<IssuedToken> {
    let repos = &state.repos;

    let mut right_ids = Vec::with_capacity(right_names::ALL_ADMIN.len());
    for name in right_names::ALL_ADMIN {
        let right = repos
            .rights
            .find_by_name(name)
            .await?
            .with_context(|| format!("right {name} is not seeded; run migrations first"))?;
        right_ids.push(right.id);
    }

    let role = match repos.roles.find_by_name(ADMIN_ROLE).await? {
        Some(mut role) => {
            role.right_ids = right_ids;
            role
        }
        None => Role {
            id: new_id(),
            name: ADMIN_ROLE.to_owned(),
            description: Some("All administrative rights".to_owned()),
            right_ids,
        },
    };
    repos.roles.save(&role).await?;

    let user = match repos.users.find_by_username(username).await? {
        Some(user) => user,
        None => {
            let user = User {
                id: new_id(),
                username: username.trim().to_owned(),
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
            repos.users.save(&user).await?;
            user
        }
    };

    let mut assignments = repos.role_assignments.find_by_user(user.id).await?;
    let admin = RoleAssignment::direct(role.id);
    if !assignments.contains(&admin) {
        assignments.push(admin);
        repos
            .role_assignments
            .replace_for_user(user.id, &assignments)
            .await?;
    }
    state.generator.generate_for_user(user.id).await?;

    let token = state
        .tokens
        .issue(user.id, Some("bootstrap".to_owned()))
        .await?;
    info!(user_id = %user.id, username = %user.username, "administrator bootstrapped");
    Ok(token)
}
