//! Backend request/response types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current user as returned by `GET /user`
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Project {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub repo_url: String,
    #[serde(default)]
    pub repo_path: String,
    #[serde(default, skip_serializing)]
    #[allow(dead_code)]
    pub repo_token: Option<String>,
}

/// Body for project create (POST) and update (PUT)
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ProjectRequest {
    pub name: String,
    pub slug: String,
    pub repo_url: String,
    pub repo_path: String,
    pub org_id: String,
}

/// Result of the login token poll
#[derive(Debug, Deserialize)]
pub struct TokenPoll {
    pub status: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrganizationRole {
    Member,
    Admin,
    Owner,
    /// Removes the user from the organization
    None,
}

impl std::str::FromStr for OrganizationRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "member" => Ok(OrganizationRole::Member),
            "admin" => Ok(OrganizationRole::Admin),
            "owner" => Ok(OrganizationRole::Owner),
            "none" => Ok(OrganizationRole::None),
            _ => Err(anyhow::anyhow!(
                "Invalid role: {}. Must be one of 'member', 'admin', 'owner' or 'none'",
                s
            )),
        }
    }
}

impl std::fmt::Display for OrganizationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrganizationRole::Member => write!(f, "member"),
            OrganizationRole::Admin => write!(f, "admin"),
            OrganizationRole::Owner => write!(f, "owner"),
            OrganizationRole::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InviteRequest {
    pub invitee_email: String,
    pub role: OrganizationRole,
}

#[derive(Debug, Serialize)]
pub struct RoleRequest {
    pub target_user_email: String,
    pub role: OrganizationRole,
}

/// Plan returned by an action requested with `?preview=true`
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DeploymentPreview {
    #[serde(default)]
    pub org_name: String,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub deployment_type: String,
    #[serde(default)]
    pub executor_name: String,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub tick_rate: Option<u32>,
}

/// Latest deployment of one environment, keyed by environment name in
/// [`DeploymentSnapshot`]
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DeploymentInfo {
    #[serde(default)]
    pub deployment_type: String,
    #[serde(default)]
    pub executor_name: String,
    #[serde(default)]
    pub execution_time: Option<String>,
    #[serde(default)]
    pub build_number: Option<u64>,
    #[serde(default)]
    pub build_state: Option<String>,
    #[serde(default)]
    pub execution_status: Option<String>,
    #[serde(default)]
    pub regions: Vec<String>,
}

pub type DeploymentSnapshot = BTreeMap<String, DeploymentInfo>;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RegionHealth {
    pub region: String,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub offline: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HealthInfo {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub offline: bool,
    #[serde(default)]
    pub regions: Vec<RegionHealth>,
}

pub type HealthSnapshot = BTreeMap<String, HealthInfo>;
