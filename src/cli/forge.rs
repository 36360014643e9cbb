use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::Cell;

use super::login::format_token_expiration;
use super::{new_table, Session};
use crate::config::Config;
use crate::setup::{LoginStepRequirement, SetupRequest, StepRequirement};

/// First-run flow: make sure an organization and a project are selected,
/// creating them when the user has none
pub async fn init(session: &mut Session) -> Result<()> {
    let state = session
        .setup(SetupRequest::new(
            LoginStepRequirement::NeedLogin,
            StepRequirement::NeedData,
            StepRequirement::NeedData,
        ))
        .await?;
    let org = state.organization()?;
    let project = state.project()?;

    println!();
    println!("✓ Ready to forge");
    println!("  Organization: {} [{}]", org.name, org.slug);
    println!("  Project:      {} [{}]", project.name, project.slug);
    if state.curr_repo_known {
        println!("  (selected from the current repository)");
    }
    println!();
    println!("Next: 'world build <path> --tag <image> --push', then 'world deploy'.");
    Ok(())
}

/// Print the local configuration without contacting the backend
pub async fn status(session: &mut Session) -> Result<()> {
    session
        .setup(SetupRequest::new(
            LoginStepRequirement::IgnoreLogin,
            StepRequirement::Ignore,
            StepRequirement::Ignore,
        ))
        .await?;
    print!("{}", render_status(&session.config, Utc::now()));
    Ok(())
}

fn render_status(config: &Config, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str(&format!("Backend:      {}\n", config.get_backend_url()));

    let credential = &config.credential;
    if credential.token.is_empty() {
        out.push_str("Login:        not logged in\n");
    } else {
        out.push_str(&format!("Login:        {} ({})\n", credential.name, credential.id));
        match credential.expiry {
            Some(expiry) => out.push_str(&format!(
                "Token:        {}\n",
                format_token_expiration(expiry, now)
            )),
            None => out.push_str("Token:        no expiry recorded\n"),
        }
    }

    out.push_str(&format!(
        "Organization: {}\n",
        or_none(&config.organization_id)
    ));
    if config.project_id.is_empty() {
        out.push_str("Project:      (none)\n");
    } else {
        out.push_str(&format!(
            "Project:      {} ({})\n",
            config.curr_project_name, config.project_id
        ));
    }
    if !config.curr_repo_url.is_empty() {
        let mut repo = config.curr_repo_url.clone();
        if !config.curr_repo_path.is_empty() {
            repo.push_str(&format!(" ({})", config.curr_repo_path));
        }
        if config.curr_repo_known {
            repo.push_str(" [known]");
        }
        out.push_str(&format!("Repository:   {}\n", repo));
    }

    if !config.known_projects.is_empty() {
        let mut table = new_table(&["PROJECT", "REPOSITORY", "PATH", "ORGANIZATION"]);
        for known in &config.known_projects {
            table.add_row(vec![
                Cell::new(&known.project_name),
                Cell::new(&known.repo_url),
                Cell::new(or_dash(&known.repo_path)),
                Cell::new(&known.organization_id),
            ]);
        }
        out.push_str("\nKnown projects:\n");
        out.push_str(&table.to_string());
        out.push('\n');
    }
    out
}

fn or_none(value: &str) -> &str {
    if value.is_empty() {
        "(none)"
    } else {
        value
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
