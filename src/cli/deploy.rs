use anyhow::{bail, Context, Result};
use comfy_table::{Cell, Color, Table};
use serde_json::json;
use std::fmt;
use tracing::{debug, info};

use super::{new_table, Session};
use crate::api::models::{
    DeploymentInfo, DeploymentPreview, DeploymentSnapshot, HealthInfo, HealthSnapshot,
};
use crate::api::ApiError;
use crate::prompt::{confirm, select_many};
use crate::setup::SetupRequest;

/// Remote operations on the selected project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployAction {
    Deploy,
    ForceDeploy,
    Destroy,
    Reset,
    Promote,
}

impl DeployAction {
    /// Path segment appended to the project endpoint
    pub fn path_segment(&self) -> &'static str {
        match self {
            DeployAction::Deploy => "deploy",
            DeployAction::ForceDeploy => "deploy/force",
            DeployAction::Destroy => "destroy",
            DeployAction::Reset => "reset",
            DeployAction::Promote => "promote",
        }
    }

    /// Destroy and reset throw away running state
    pub fn is_destructive(&self) -> bool {
        matches!(self, DeployAction::Destroy | DeployAction::Reset)
    }
}

impl fmt::Display for DeployAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeployAction::Deploy => "deploy",
            DeployAction::ForceDeploy => "forceDeploy",
            DeployAction::Destroy => "destroy",
            DeployAction::Reset => "reset",
            DeployAction::Promote => "promote",
        };
        write!(f, "{}", label)
    }
}

pub fn action_path(org_id: &str, project_id: &str, action: DeployAction, preview: bool) -> String {
    let mut path = format!(
        "/organization/{}/project/{}/{}",
        org_id,
        project_id,
        action.path_segment()
    );
    if preview {
        path.push_str("?preview=true");
    }
    path
}

pub async fn run_action(session: &mut Session, action: DeployAction, preview: bool) -> Result<()> {
    let state = session.setup(SetupRequest::project_scoped()).await?;
    let org = state.organization()?;
    let project = state.project()?;

    if action.is_destructive() && !preview {
        let question = format!(
            "This will {} all deployments of project '{}'. Continue?",
            action, project.name
        );
        if !confirm(session.input.as_mut(), &question, false)? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let path = action_path(&org.id, &project.id, action, preview);
    info!(action = %action, project_id = %project.id, preview, "Requesting deployment action");

    let response: serde_json::Value = session
        .api
        .post(&path, &json!({}))
        .await
        .with_context(|| format!("Failed to {} project '{}'", action, project.slug))?;

    if preview {
        let plan: DeploymentPreview =
            serde_json::from_value(response).context("Failed to parse deployment preview")?;
        print!("{}", render_preview(action, &plan));
        return Ok(());
    }

    report_done(action, &project.name, &response);
    Ok(())
}

/// Deploy to a subset of regions: the preview supplies the regions on
/// offer, the user picks from them, and the choice goes in the request body
pub async fn deploy_to_selected_regions(session: &mut Session, action: DeployAction) -> Result<()> {
    let state = session.setup(SetupRequest::project_scoped()).await?;
    let org = state.organization()?;
    let project = state.project()?;

    let plan: DeploymentPreview = session
        .api
        .post(&action_path(&org.id, &project.id, action, true), &json!({}))
        .await
        .with_context(|| format!("Failed to list regions for project '{}'", project.slug))?;
    if plan.regions.is_empty() {
        bail!("Project '{}' has no regions to deploy to", project.name);
    }

    let regions = match select_many(session.input.as_mut(), "Regions", &plan.regions)? {
        Some(regions) => regions,
        None => {
            println!("Cancelled.");
            return Ok(());
        }
    };
    debug!(?regions, "Selected regions");

    let response: serde_json::Value = session
        .api
        .post(
            &action_path(&org.id, &project.id, action, false),
            &json!({ "regions": regions }),
        )
        .await
        .with_context(|| format!("Failed to {} project '{}'", action, project.slug))?;

    report_done(action, &project.name, &response);
    Ok(())
}

fn report_done(action: DeployAction, project_name: &str, response: &serde_json::Value) {
    match response.as_str() {
        Some(message) if !message.is_empty() => println!("✓ {}", message),
        _ => println!("✓ {} requested for project '{}'", action, project_name),
    }
}

pub fn render_preview(action: DeployAction, plan: &DeploymentPreview) -> String {
    let mut out = format!(
        "Preview of {} for {}/{}:\n",
        action, plan.org_name, plan.project_name
    );
    out.push_str(&format!("  Type:      {}\n", or_dash(&plan.deployment_type)));
    out.push_str(&format!("  Executor:  {}\n", or_dash(&plan.executor_name)));
    out.push_str(&format!(
        "  Tick rate: {}\n",
        plan.tick_rate
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    if plan.regions.is_empty() {
        out.push_str("  Regions:   -\n");
    } else {
        out.push_str(&format!("  Regions:   {}\n", plan.regions.join(", ")));
    }
    out
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

/// Treat a 404 on a snapshot endpoint as "nothing deployed yet"
fn empty_on_not_found<T: Default>(result: Result<T, ApiError>) -> Result<T, ApiError> {
    match result {
        Err(e) if e.is_not_found() => Ok(T::default()),
        other => other,
    }
}

pub async fn show_status(session: &mut Session) -> Result<()> {
    let state = session.setup(SetupRequest::project_scoped()).await?;
    let project = state.project()?;

    let deployments: DeploymentSnapshot = empty_on_not_found(
        session
            .api
            .get(&format!("/deployment/{}", project.id))
            .await,
    )
    .context("Failed to fetch deployment status")?;
    let health: HealthSnapshot =
        empty_on_not_found(session.api.get(&format!("/health/{}", project.id)).await)
            .context("Failed to fetch deployment health")?;
    debug!(
        environments = deployments.len(),
        "Fetched deployment snapshot"
    );

    if deployments.is_empty() {
        println!("No deployments found for project '{}'.", project.name);
        return Ok(());
    }

    println!("Project: {} [{}]", project.name, project.slug);
    for (environment, table) in render_status_tables(&deployments, &health) {
        println!(
            "\n{} ({})",
            environment,
            environment_health(health.get(&environment))
        );
        println!("{}", table);
    }
    Ok(())
}

/// One table per environment, one row per region
pub fn render_status_tables(
    deployments: &DeploymentSnapshot,
    health: &HealthSnapshot,
) -> Vec<(String, Table)> {
    deployments
        .iter()
        .map(|(environment, info)| {
            let table = environment_table(info, health.get(environment));
            (environment.clone(), table)
        })
        .collect()
}

fn environment_table(info: &DeploymentInfo, health: Option<&HealthInfo>) -> Table {
    let mut table = new_table(&["REGION", "HEALTH", "TYPE", "EXECUTOR", "BUILD", "STATUS", "TIME"]);

    let build = match (info.build_number, info.build_state.as_deref()) {
        (Some(number), Some(state)) => format!("#{} ({})", number, state),
        (Some(number), None) => format!("#{}", number),
        (None, Some(state)) => state.to_string(),
        (None, None) => "-".to_string(),
    };
    let status = info.execution_status.as_deref().unwrap_or("-");
    let time = info.execution_time.as_deref().unwrap_or("-");

    let regions: Vec<&str> = if info.regions.is_empty() {
        vec!["-"]
    } else {
        info.regions.iter().map(String::as_str).collect()
    };

    for region in regions {
        table.add_row(vec![
            Cell::new(region),
            health_cell(region, health),
            Cell::new(or_dash(&info.deployment_type)),
            Cell::new(or_dash(&info.executor_name)),
            Cell::new(&build),
            Cell::new(status),
            Cell::new(time),
        ]);
    }
    table
}

/// Overall health of an environment as reported by the backend
fn environment_health(health: Option<&HealthInfo>) -> &'static str {
    match health {
        Some(h) if h.offline => "offline",
        Some(h) if h.ok => "healthy",
        Some(_) => "unhealthy",
        None => "health unknown",
    }
}

fn health_cell(region: &str, health: Option<&HealthInfo>) -> Cell {
    let region_health = health.and_then(|h| h.regions.iter().find(|r| r.region == region));
    match region_health {
        Some(r) if r.offline => Cell::new("offline").fg(Color::DarkGrey),
        Some(r) if r.ok => Cell::new("healthy").fg(Color::Green),
        Some(_) => Cell::new("unhealthy").fg(Color::Red),
        None => Cell::new("unknown"),
    }
}
