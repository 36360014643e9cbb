use anyhow::{Context, Result};
use comfy_table::Cell;

use super::{new_table, Session};
use crate::api::models::Organization;
use crate::resolve::{Organizations, Selection};
use crate::setup::SetupRequest;

/// List the user's organizations, marking the selected one
pub async fn list_organizations(session: &mut Session) -> Result<()> {
    session.setup(SetupRequest::login_only()).await?;

    let organizations = Organizations::new(&session.api)
        .list()
        .await
        .context("Failed to list organizations")?;

    if organizations.is_empty() {
        println!("No organizations found. Create one with 'world organization create'.");
        return Ok(());
    }
    println!(
        "{}",
        organizations_table(&organizations, &session.config.organization_id)
    );
    Ok(())
}

fn organizations_table(organizations: &[Organization], selected: &str) -> comfy_table::Table {
    let mut table = new_table(&["", "NAME", "SLUG", "ID"]);
    for org in organizations {
        table.add_row(vec![
            Cell::new(if org.id == selected { "*" } else { "" }),
            Cell::new(&org.name),
            Cell::new(&org.slug),
            Cell::new(&org.id),
        ]);
    }
    table
}

pub async fn create_organization(session: &mut Session) -> Result<()> {
    session.setup(SetupRequest::login_only()).await?;

    let org = Organizations::new(&session.api)
        .create_and_select(session.input.as_mut(), &mut session.config)
        .await?;
    println!("Selected organization '{}' [{}]", org.name, org.slug);
    Ok(())
}

pub async fn switch_organization(session: &mut Session) -> Result<()> {
    session.setup(SetupRequest::login_only()).await?;

    let organizations = Organizations::new(&session.api);
    let org = match organizations
        .select(session.input.as_mut(), &mut session.config)
        .await?
    {
        Selection::Chosen(org) => org,
        Selection::CreateNew => {
            organizations
                .create_and_select(session.input.as_mut(), &mut session.config)
                .await?
        }
        Selection::Empty => {
            println!("You don't belong to any organization yet. Create one with 'world organization create'.");
            return Ok(());
        }
    };

    println!("✓ Switched to organization '{}' [{}]", org.name, org.slug);
    Ok(())
}
