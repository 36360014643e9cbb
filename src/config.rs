use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::api::models::Project;
use crate::build::env_var_non_empty;
use crate::git::{normalize_repo_path, normalize_repo_url};

const DEFAULT_BACKEND_URL: &str = "https://forge.worldengine.dev/api";

/// Login credential persisted between invocations
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Credential {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl Credential {
    /// A token without a known expiry is treated as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= now,
            None => true,
        }
    }
}

/// Repo location previously bound to a project
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct KnownProject {
    #[serde(rename = "RepoURL")]
    pub repo_url: String,
    #[serde(rename = "RepoPath", default)]
    pub repo_path: String,
    #[serde(rename = "OrganizationID")]
    pub organization_id: String,
    #[serde(rename = "ProjectID")]
    pub project_id: String,
    #[serde(rename = "ProjectName", default)]
    pub project_name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(rename = "OrganizationID", default)]
    pub organization_id: String,
    #[serde(rename = "ProjectID", default)]
    pub project_id: String,
    #[serde(rename = "CurrProjectName", default)]
    pub curr_project_name: String,
    #[serde(rename = "CurrRepoURL", default)]
    pub curr_repo_url: String,
    #[serde(rename = "CurrRepoPath", default)]
    pub curr_repo_path: String,
    #[serde(rename = "CurrRepoKnown", default)]
    pub curr_repo_known: bool,
    #[serde(rename = "KnownProjects", default)]
    pub known_projects: Vec<KnownProject>,
    #[serde(rename = "Credential", default)]
    pub credential: Credential,
    #[serde(rename = "BackendURL", default, skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,

    #[serde(skip)]
    pub(crate) path: Option<PathBuf>,
}

impl Config {
    /// Directory holding the config file, `WORLD_FORGE_CONFIG_DIR` wins
    pub fn config_dir() -> Result<PathBuf> {
        if let Some(dir) = env_var_non_empty("WORLD_FORGE_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        let base = dirs::config_dir().context("Failed to determine config directory")?;
        Ok(base.join("world-forge"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`; a missing file yields an empty config
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str::<Config>(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            debug!("No config file at {}, starting fresh", path.display());
            Config::default()
        };
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => Self::config_path()?,
        };

        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir).context("Failed to create config directory")?;
            }
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;

        debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Save, logging a warning instead of failing
    pub fn save_or_warn(&self) {
        if let Err(e) = self.save() {
            warn!("Failed to save config: {:#}", e);
        }
    }

    /// Get the authentication token, if any
    pub fn get_token(&self) -> Option<String> {
        if self.credential.token.is_empty() {
            None
        } else {
            Some(self.credential.token.clone())
        }
    }

    /// Backend URL: `WORLD_FORGE_URL`, then the config file, then the default
    pub fn get_backend_url(&self) -> String {
        env_var_non_empty("WORLD_FORGE_URL")
            .or_else(|| self.backend_url.clone())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
    }

    pub fn set_credential(&mut self, credential: Credential) {
        self.credential = credential;
    }

    pub fn clear_credential(&mut self) {
        self.credential = Credential::default();
    }

    /// Select an organization; switching organizations drops the project selection
    pub fn select_organization(&mut self, organization_id: &str) {
        if self.organization_id != organization_id {
            self.project_id.clear();
            self.curr_project_name.clear();
        }
        self.organization_id = organization_id.to_string();
    }

    /// Select a project and bind the current repo to it
    pub fn select_project(&mut self, project: &Project) {
        self.project_id = project.id.clone();
        self.curr_project_name = project.name.clone();

        if !project.repo_url.is_empty() {
            self.remember_project(KnownProject {
                repo_url: project.repo_url.clone(),
                repo_path: project.repo_path.clone(),
                organization_id: project.org_id.clone(),
                project_id: project.id.clone(),
                project_name: project.name.clone(),
            });
        }
    }

    /// Insert or replace the known-project entry for the same repo location.
    /// The location is stored in the same normalised form git inspection yields.
    pub fn remember_project(&mut self, mut entry: KnownProject) {
        entry.repo_url = normalize_repo_url(&entry.repo_url);
        entry.repo_path = normalize_repo_path(&entry.repo_path);
        self.known_projects.retain(|known| {
            !(known.repo_url == entry.repo_url
                && known.repo_path == entry.repo_path
                && known.organization_id == entry.organization_id)
        });
        self.known_projects.push(entry);
    }

    /// Drop every reference to a deleted project
    pub fn forget_project(&mut self, project_id: &str) {
        self.known_projects
            .retain(|known| known.project_id != project_id);
        if self.project_id == project_id {
            self.project_id.clear();
            self.curr_project_name.clear();
        }
    }

    pub fn find_known_project(
        &self,
        organization_id: &str,
        repo_url: &str,
        repo_path: &str,
    ) -> Option<&KnownProject> {
        if repo_url.is_empty() {
            return None;
        }
        let repo_url = normalize_repo_url(repo_url);
        let repo_path = normalize_repo_path(repo_path);
        self.known_projects.iter().find(|known| {
            known.organization_id == organization_id
                && known.repo_url == repo_url
                && known.repo_path == repo_path
        })
    }

    /// Record the repo of the working directory (not persisted on its own)
    pub fn set_current_repo(&mut self, repo_url: &str, repo_path: &str) {
        let repo_url = normalize_repo_url(repo_url);
        let repo_path = normalize_repo_path(repo_path);
        self.curr_repo_known = self
            .known_projects
            .iter()
            .any(|known| known.repo_url == repo_url && known.repo_path == repo_path);
        self.curr_repo_url = repo_url;
        self.curr_repo_path = repo_path;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn project(id: &str, org: &str) -> Project {
        Project {
            id: id.to_string(),
            org_id: org.to_string(),
            name: format!("Project {}", id),
            slug: id.to_string(),
            repo_url: "https://github.com/acme/game".to_string(),
            repo_path: "shard".to_string(),
            repo_token: None,
        }
    }

    #[test]
    fn test_missing_file_loads_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&temp_dir.path().join("config.json")).unwrap();
        assert!(config.organization_id.is_empty());
        assert!(config.get_token().is_none());
    }

    #[test]
    fn test_save_and_reload_keeps_field_names() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let mut config = Config::load_from(&path).unwrap();
        config.select_organization("org-1");
        config.select_project(&project("p-1", "org-1"));
        config.set_credential(Credential {
            token: "tok".into(),
            expiry: Some(Utc::now() + Duration::hours(1)),
            id: "u-1".into(),
            name: "Ada".into(),
        });
        config.save().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"OrganizationID\""));
        assert!(raw.contains("\"KnownProjects\""));
        assert!(raw.contains("\"RepoURL\""));

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.organization_id, "org-1");
        assert_eq!(reloaded.project_id, "p-1");
        assert_eq!(reloaded.known_projects.len(), 1);
        assert_eq!(reloaded.get_token().as_deref(), Some("tok"));
    }

    #[test]
    fn test_switching_organization_clears_project() {
        let mut config = Config::default();
        config.select_organization("org-1");
        config.select_project(&project("p-1", "org-1"));

        config.select_organization("org-1");
        assert_eq!(config.project_id, "p-1");

        config.select_organization("org-2");
        assert!(config.project_id.is_empty());
        assert!(config.curr_project_name.is_empty());
    }

    #[test]
    fn test_remember_project_replaces_same_repo() {
        let mut config = Config::default();
        config.select_project(&project("p-1", "org-1"));
        config.select_project(&project("p-2", "org-1"));

        assert_eq!(config.known_projects.len(), 1);
        assert_eq!(config.known_projects[0].project_id, "p-2");
    }

    #[test]
    fn test_find_known_project_is_scoped_to_organization() {
        let mut config = Config::default();
        config.select_project(&project("p-1", "org-1"));

        assert!(config
            .find_known_project("org-1", "https://github.com/acme/game", "shard")
            .is_some());
        assert!(config
            .find_known_project("org-2", "https://github.com/acme/game", "shard")
            .is_none());
        assert!(config
            .find_known_project("org-1", "https://github.com/acme/game", "")
            .is_none());
        assert!(config.find_known_project("org-1", "", "").is_none());
    }

    #[test]
    fn test_known_project_matches_normalised_remote() {
        let mut config = Config::default();
        let mut beta = project("p-2", "org-1");
        beta.repo_url = "git@github.com:acme/beta.git".to_string();
        beta.repo_path = "./shard/".to_string();
        config.select_project(&beta);

        assert_eq!(config.known_projects[0].repo_url, "https://github.com/acme/beta");
        assert_eq!(config.known_projects[0].repo_path, "shard");
        let found = config
            .find_known_project("org-1", "https://github.com/acme/beta", "shard")
            .map(|known| known.project_id.as_str());
        assert_eq!(found, Some("p-2"));

        config.set_current_repo("https://github.com/acme/beta.git", "shard");
        assert!(config.curr_repo_known);
        assert_eq!(config.curr_repo_url, "https://github.com/acme/beta");
    }

    #[test]
    fn test_forget_project_clears_selection_and_cache() {
        let mut config = Config::default();
        config.select_project(&project("p-1", "org-1"));
        config.forget_project("p-1");

        assert!(config.project_id.is_empty());
        assert!(config.known_projects.is_empty());
    }

    #[test]
    fn test_credential_expiry() {
        let now = Utc::now();
        let mut credential = Credential {
            token: "tok".into(),
            expiry: Some(now + Duration::minutes(5)),
            ..Default::default()
        };
        assert!(!credential.is_expired(now));

        credential.expiry = Some(now - Duration::seconds(1));
        assert!(credential.is_expired(now));

        credential.expiry = None;
        assert!(credential.is_expired(now));
    }

    #[test]
    fn test_set_current_repo_marks_known() {
        let mut config = Config::default();
        config.select_project(&project("p-1", "org-1"));

        config.set_current_repo("https://github.com/acme/game", "shard");
        assert!(config.curr_repo_known);

        config.set_current_repo("https://github.com/acme/other", "");
        assert!(!config.curr_repo_known);
    }
}
