//! Per-command precondition resolution.
//!
//! Each command declares what it needs (a valid login, a selected
//! organization, a selected project) and [`Setup::run`] resolves those needs
//! in order, login first, into a [`CommandState`]. The first failing gate
//! ends the run; later gates are never evaluated.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::api::models::{Organization, Project, User};
use crate::api::ApiClient;
use crate::config::Config;
use crate::error::{ForgeError, ForgeResult};
use crate::git::RepoInspector;
use crate::prompt::InputReader;
use crate::resolve::{Organizations, Projects};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStepRequirement {
    IgnoreLogin,
    NeedLogin,
}

/// What a command needs from one resource (organization or project)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRequirement {
    /// Leave the resource alone
    Ignore,
    /// A selection must already exist; it is fetched and validated
    NeedIdOnly,
    /// No selection may exist
    MustNotExist,
    /// Use the selection if there is one, otherwise select or create interactively
    NeedData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupRequest {
    pub login: LoginStepRequirement,
    pub organization: StepRequirement,
    pub project: StepRequirement,
}

impl SetupRequest {
    pub const fn new(
        login: LoginStepRequirement,
        organization: StepRequirement,
        project: StepRequirement,
    ) -> Self {
        Self {
            login,
            organization,
            project,
        }
    }

    /// Logged in, nothing else
    pub const fn login_only() -> Self {
        Self::new(
            LoginStepRequirement::NeedLogin,
            StepRequirement::Ignore,
            StepRequirement::Ignore,
        )
    }

    /// Logged in with a selected organization
    pub const fn organization_scoped() -> Self {
        Self::new(
            LoginStepRequirement::NeedLogin,
            StepRequirement::NeedIdOnly,
            StepRequirement::Ignore,
        )
    }

    /// Logged in with a selected organization and project
    pub const fn project_scoped() -> Self {
        Self::new(
            LoginStepRequirement::NeedLogin,
            StepRequirement::NeedIdOnly,
            StepRequirement::NeedIdOnly,
        )
    }
}

/// Everything resolved for the running command
#[derive(Debug, Clone, Default)]
pub struct CommandState {
    pub logged_in: bool,
    pub user: Option<User>,
    pub organization: Option<Organization>,
    pub project: Option<Project>,
    pub curr_repo_known: bool,
}

impl CommandState {
    pub fn organization(&self) -> ForgeResult<&Organization> {
        self.organization
            .as_ref()
            .ok_or_else(|| ForgeError::not_found(NO_ORGANIZATION))
    }

    pub fn project(&self) -> ForgeResult<&Project> {
        self.project
            .as_ref()
            .ok_or_else(|| ForgeError::not_found(NO_PROJECT))
    }
}

const NO_ORGANIZATION: &str =
    "No organization selected. Run 'world organization switch' to select one.";
const NO_PROJECT: &str = "No project selected. Run 'world project switch' to select one.";

pub struct Setup<'a> {
    api: &'a ApiClient,
    config: &'a mut Config,
    input: &'a mut dyn InputReader,
    repo: &'a dyn RepoInspector,
    now: DateTime<Utc>,
}

impl<'a> Setup<'a> {
    pub fn new(
        api: &'a ApiClient,
        config: &'a mut Config,
        input: &'a mut dyn InputReader,
        repo: &'a dyn RepoInspector,
    ) -> Self {
        Self {
            api,
            config,
            input,
            repo,
            now: Utc::now(),
        }
    }

    /// Evaluate token expiry against `now` instead of the wall clock
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub async fn run(mut self, request: SetupRequest) -> ForgeResult<CommandState> {
        debug!(?request, "Resolving command preconditions");
        let mut state = CommandState::default();

        self.login_step(request.login, &mut state).await?;
        self.organization_step(request.organization, &mut state)
            .await?;
        self.project_step(request.project, &mut state).await?;

        Ok(state)
    }

    async fn login_step(
        &mut self,
        requirement: LoginStepRequirement,
        state: &mut CommandState,
    ) -> ForgeResult<()> {
        if requirement == LoginStepRequirement::IgnoreLogin {
            return Ok(());
        }

        let credential = &self.config.credential;
        if credential.token.is_empty() {
            return Err(ForgeError::NotLoggedIn);
        }
        if credential.is_expired(self.now) {
            return Err(ForgeError::TokenExpired);
        }

        let user: User = self.api.get("/user").await.map_err(|e| {
            if e.status() == Some(StatusCode::UNAUTHORIZED) {
                ForgeError::TokenExpired
            } else {
                ForgeError::Api(e)
            }
        })?;

        state.logged_in = true;
        state.user = Some(user);
        Ok(())
    }

    async fn organization_step(
        &mut self,
        requirement: StepRequirement,
        state: &mut CommandState,
    ) -> ForgeResult<()> {
        let selected = self.config.organization_id.clone();
        let organizations = Organizations::new(self.api);

        match requirement {
            StepRequirement::Ignore => {}
            StepRequirement::MustNotExist => {
                if !selected.is_empty() {
                    return Err(ForgeError::PreconditionViolated(format!(
                        "An organization is already selected ({}). This command must run without one.",
                        selected
                    )));
                }
            }
            StepRequirement::NeedIdOnly => {
                if selected.is_empty() {
                    return Err(ForgeError::not_found(NO_ORGANIZATION));
                }
                state.organization = Some(organizations.get(&selected).await?);
            }
            StepRequirement::NeedData => {
                let existing = if selected.is_empty() {
                    None
                } else {
                    match organizations.get(&selected).await {
                        Ok(org) => Some(org),
                        Err(ForgeError::NotFound(_)) => {
                            warn!(org_id = %selected, "Selected organization no longer exists");
                            None
                        }
                        Err(e) => return Err(e),
                    }
                };
                let org = match existing {
                    Some(org) => org,
                    None => {
                        organizations
                            .select_or_create(&mut *self.input, self.config)
                            .await?
                    }
                };
                state.organization = Some(org);
            }
        }
        Ok(())
    }

    async fn project_step(
        &mut self,
        requirement: StepRequirement,
        state: &mut CommandState,
    ) -> ForgeResult<()> {
        match requirement {
            StepRequirement::Ignore => return Ok(()),
            StepRequirement::MustNotExist => {
                if !self.config.project_id.is_empty() {
                    return Err(ForgeError::PreconditionViolated(format!(
                        "A project is already selected ({}). This command must run without one.",
                        self.config.project_id
                    )));
                }
                return Ok(());
            }
            StepRequirement::NeedIdOnly | StepRequirement::NeedData => {}
        }

        let org_id = match &state.organization {
            Some(org) => org.id.clone(),
            None if !self.config.organization_id.is_empty() => self.config.organization_id.clone(),
            None => return Err(ForgeError::not_found(NO_ORGANIZATION)),
        };

        // The working directory's repo overrides the stored selection when known
        let repo = self.repo.current_repo();
        let mut selected = self.config.project_id.clone();
        if let Some(repo) = &repo {
            if requirement == StepRequirement::NeedData {
                self.config.set_current_repo(&repo.url, &repo.path);
            }
            if let Some(known) = self.config.find_known_project(&org_id, &repo.url, &repo.path) {
                debug!(
                    project_id = %known.project_id,
                    repo_url = %repo.url,
                    "Using known project for current repository"
                );
                selected = known.project_id.clone();
                state.curr_repo_known = true;
            }
        }

        let projects = Projects::new(self.api, &org_id);
        let project = if requirement == StepRequirement::NeedIdOnly {
            if selected.is_empty() {
                return Err(ForgeError::not_found(NO_PROJECT));
            }
            projects.get(&selected).await?
        } else {
            let existing = if selected.is_empty() {
                None
            } else {
                match projects.get(&selected).await {
                    Ok(project) => Some(project),
                    Err(ForgeError::NotFound(_)) => {
                        warn!(project_id = %selected, "Selected project no longer exists");
                        None
                    }
                    Err(e) => return Err(e),
                }
            };
            match existing {
                Some(project) => project,
                None => {
                    projects
                        .select_or_create(&mut *self.input, self.config, repo.as_ref())
                        .await?
                }
            }
        };

        state.project = Some(project);
        Ok(())
    }
}
