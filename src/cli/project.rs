use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use tracing::info;

use super::{new_table, Session};
use crate::api::models::Project;
use crate::config::KnownProject;
use crate::prompt::ask_with_default;
use crate::resolve::{Projects, Selection};
use crate::setup::SetupRequest;

/// List the projects of the selected organization
pub async fn list_projects(session: &mut Session) -> Result<()> {
    let state = session.setup(SetupRequest::organization_scoped()).await?;
    let org = state.organization()?;

    let projects = Projects::new(&session.api, &org.id)
        .list()
        .await
        .context("Failed to list projects")?;

    if projects.is_empty() {
        println!(
            "Organization '{}' has no projects. Create one with 'world project create'.",
            org.name
        );
        return Ok(());
    }
    println!("{}", projects_table(&projects, &session.config.project_id));
    Ok(())
}

fn projects_table(projects: &[Project], selected: &str) -> Table {
    let mut table = new_table(&["", "NAME", "SLUG", "REPOSITORY", "ID"]);
    for project in projects {
        let repo = match (project.repo_url.as_str(), project.repo_path.as_str()) {
            ("", _) => "-".to_string(),
            (url, "") => url.to_string(),
            (url, path) => format!("{} ({})", url, path),
        };
        table.add_row(vec![
            Cell::new(if project.id == selected { "*" } else { "" }),
            Cell::new(&project.name),
            Cell::new(&project.slug),
            Cell::new(repo),
            Cell::new(&project.id),
        ]);
    }
    table
}

pub async fn create_project(session: &mut Session) -> Result<()> {
    let state = session.setup(SetupRequest::organization_scoped()).await?;
    let org = state.organization()?;
    let repo = session.repo.current_repo();

    let project = Projects::new(&session.api, &org.id)
        .create_and_select(session.input.as_mut(), &mut session.config, repo.as_ref())
        .await?;
    println!("Selected project '{}' [{}]", project.name, project.slug);
    Ok(())
}

pub async fn switch_project(session: &mut Session) -> Result<()> {
    let state = session.setup(SetupRequest::organization_scoped()).await?;
    let org = state.organization()?;
    let repo = session.repo.current_repo();

    let projects = Projects::new(&session.api, &org.id);
    let project = match projects
        .select(session.input.as_mut(), &mut session.config)
        .await?
    {
        Selection::Chosen(project) => project,
        Selection::CreateNew => {
            projects
                .create_and_select(session.input.as_mut(), &mut session.config, repo.as_ref())
                .await?
        }
        Selection::Empty => {
            println!(
                "Organization '{}' has no projects. Create one with 'world project create'.",
                org.name
            );
            return Ok(());
        }
    };

    println!("✓ Switched to project '{}' [{}]", project.name, project.slug);
    Ok(())
}

pub async fn update_project(session: &mut Session) -> Result<()> {
    let state = session.setup(SetupRequest::project_scoped()).await?;
    let org = state.organization()?;
    let current = state.project()?;

    let updated = Projects::new(&session.api, &org.id)
        .update_interactive(session.input.as_mut(), current)
        .await?;

    // The repo binding may have moved; rebuild the known-project entry
    let was_selected = session.config.project_id == updated.id;
    session.config.forget_project(&updated.id);
    if was_selected {
        session.config.select_project(&updated);
    } else if !updated.repo_url.is_empty() {
        session.config.remember_project(KnownProject {
            repo_url: updated.repo_url.clone(),
            repo_path: updated.repo_path.clone(),
            organization_id: updated.org_id.clone(),
            project_id: updated.id.clone(),
            project_name: updated.name.clone(),
        });
    }
    session.config.save_or_warn();
    Ok(())
}

pub async fn delete_project(session: &mut Session) -> Result<()> {
    let state = session.setup(SetupRequest::project_scoped()).await?;
    let org = state.organization()?;
    let project = state.project()?;

    println!(
        "Deleting project '{}' removes all of its deployments. This cannot be undone.",
        project.name
    );
    let typed = ask_with_default(
        session.input.as_mut(),
        &format!("Type the project slug '{}' to confirm", project.slug),
        "",
    )?;
    if typed != project.slug {
        println!("Slug did not match. Project was not deleted.");
        return Ok(());
    }

    Projects::new(&session.api, &org.id)
        .delete(&project.id)
        .await
        .with_context(|| format!("Failed to delete project '{}'", project.slug))?;
    info!(project_id = %project.id, "Deleted project");

    session.config.forget_project(&project.id);
    session.config.save_or_warn();
    println!("✓ Project '{}' deleted", project.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::testing;
    use crate::config::Config;
    use httpmock::prelude::*;
    use serde_json::json;

    fn known_alpha() -> KnownProject {
        KnownProject {
            repo_url: "https://github.com/acme/alpha".into(),
            repo_path: "".into(),
            organization_id: "o-1".into(),
            project_id: "p-1".into(),
            project_name: "Alpha".into(),
        }
    }

    #[tokio::test]
    async fn test_delete_requires_matching_slug() {
        let server = MockServer::start();
        testing::mock_selection(&server);
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/organization/o-1/project/p-1");
            then.status(204);
        });

        let temp_dir = tempfile::tempdir().unwrap();
        let mut session = testing::session(&server, &temp_dir, ["alpah"]);
        delete_project(&mut session).await.unwrap();
        assert_eq!(delete.calls(), 0);
        assert_eq!(session.config.project_id, "p-1");
    }

    #[tokio::test]
    async fn test_delete_forgets_project() {
        let server = MockServer::start();
        testing::mock_selection(&server);
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/organization/o-1/project/p-1");
            then.status(204);
        });

        let temp_dir = tempfile::tempdir().unwrap();
        let mut session = testing::session(&server, &temp_dir, ["alpha"]);
        session.config.known_projects.push(known_alpha());

        delete_project(&mut session).await.unwrap();

        assert_eq!(delete.calls(), 1);
        let stored = Config::load_from(session.config.path().unwrap()).unwrap();
        assert!(stored.project_id.is_empty());
        assert!(stored.known_projects.is_empty());
        assert_eq!(stored.organization_id, "o-1");
    }

    #[tokio::test]
    async fn test_update_rebinds_known_project() {
        let server = MockServer::start();
        testing::mock_selection(&server);
        server.mock(|when, then| {
            when.method(PUT).path("/organization/o-1/project/p-1");
            then.status(200).json_body(json!({
                "data": {
                    "id": "p-1", "org_id": "o-1", "name": "Alpha", "slug": "alpha",
                    "repo_url": "https://github.com/acme/alpha-next", "repo_path": "game"
                }
            }));
        });

        let temp_dir = tempfile::tempdir().unwrap();
        // name, slug, repo url, repo path, confirm
        let mut session = testing::session(
            &server,
            &temp_dir,
            ["", "", "https://github.com/acme/alpha-next", "game", "y"],
        );
        session.config.known_projects.push(known_alpha());

        update_project(&mut session).await.unwrap();

        let stored = Config::load_from(session.config.path().unwrap()).unwrap();
        assert_eq!(stored.project_id, "p-1");
        assert_eq!(stored.known_projects.len(), 1);
        assert_eq!(
            stored.known_projects[0].repo_url,
            "https://github.com/acme/alpha-next"
        );
        assert_eq!(stored.known_projects[0].repo_path, "game");
    }

    #[tokio::test]
    async fn test_create_needs_selected_organization() {
        let server = MockServer::start();
        testing::mock_selection(&server);

        let temp_dir = tempfile::tempdir().unwrap();
        let mut session = testing::session(&server, &temp_dir, Vec::<String>::new());
        session.config.organization_id.clear();

        let err = create_project(&mut session).await.unwrap_err();
        assert!(err.to_string().contains("No organization selected"));
    }

    #[test]
    fn test_projects_table_shows_repo_path() {
        let project = Project {
            id: "p-2".into(),
            org_id: "o-1".into(),
            name: "Beta".into(),
            slug: "beta".into(),
            repo_url: "https://github.com/acme/mono".into(),
            repo_path: "beta".into(),
            repo_token: Some("secret".into()),
        };
        let rendered = projects_table(&[project], "p-1").to_string();
        assert!(rendered.contains("https://github.com/acme/mono (beta)"));
        assert!(!rendered.contains("secret"));
    }
}
