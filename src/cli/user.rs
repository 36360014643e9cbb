use anyhow::{bail, Context, Result};
use regex::Regex;
use std::sync::OnceLock;
use tracing::info;

use super::Session;
use crate::api::models::{InviteRequest, OrganizationRole, RoleRequest, UpdateUserRequest, User};
use crate::prompt::ask_with_default;
use crate::setup::SetupRequest;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

pub fn validate_email(email: &str) -> Result<()> {
    if !email_regex().is_match(email) {
        bail!("'{}' is not a valid email address", email);
    }
    Ok(())
}

/// Invite someone to the selected organization
pub async fn invite_user(session: &mut Session, email: &str, role: OrganizationRole) -> Result<()> {
    validate_email(email)?;
    if role == OrganizationRole::None {
        bail!("Invitations need a role other than 'none'");
    }

    let state = session.setup(SetupRequest::organization_scoped()).await?;
    let org = state.organization()?;

    let request = InviteRequest {
        invitee_email: email.to_string(),
        role,
    };
    let _: serde_json::Value = session
        .api
        .post(&format!("/organization/{}/invite", org.id), &request)
        .await
        .with_context(|| format!("Failed to invite {}", email))?;

    info!(org_id = %org.id, role = %role, "Sent organization invite");
    println!("✓ Invited {} to '{}' as {}", email, org.name, role);
    Ok(())
}

/// Change a member's role; `none` removes them from the organization
pub async fn set_role(session: &mut Session, email: &str, role: OrganizationRole) -> Result<()> {
    validate_email(email)?;

    let state = session.setup(SetupRequest::organization_scoped()).await?;
    let org = state.organization()?;

    let request = RoleRequest {
        target_user_email: email.to_string(),
        role,
    };
    let _: serde_json::Value = session
        .api
        .post(&format!("/organization/{}/role", org.id), &request)
        .await
        .with_context(|| format!("Failed to change the role of {}", email))?;

    println!("✓ {} is now {} of '{}'", email, role, org.name);
    Ok(())
}

/// Update the logged in user's profile; missing values are asked for
pub async fn update_user(
    session: &mut Session,
    name: Option<String>,
    email: Option<String>,
) -> Result<()> {
    let state = session.setup(SetupRequest::login_only()).await?;
    let current = state.user.unwrap_or_default();

    let (name, email) = if name.is_none() && email.is_none() {
        let name = ask_with_default(session.input.as_mut(), "Name", &current.name)?;
        let email = ask_with_default(session.input.as_mut(), "Email", &current.email)?;
        (Some(name), Some(email))
    } else {
        (name, email)
    };

    let request = UpdateUserRequest {
        name: name.filter(|n| !n.is_empty() && *n != current.name),
        email: email.filter(|e| !e.is_empty() && *e != current.email),
    };
    if let Some(email) = &request.email {
        validate_email(email)?;
    }
    if request.name.is_none() && request.email.is_none() {
        println!("Nothing to update.");
        return Ok(());
    }

    let user: User = session
        .api
        .post("/user", &request)
        .await
        .context("Failed to update user")?;

    session.config.credential.name = user.name.clone();
    session.config.save_or_warn();
    println!("✓ Updated user {} <{}>", user.name, user.email);
    Ok(())
}
