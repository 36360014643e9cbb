use tracing::{debug, info};
use url::Url;

use super::{choose, not_found_as, Selection, WizardStep};
use crate::api::models::{Project, ProjectRequest};
use crate::api::ApiClient;
use crate::config::Config;
use crate::error::{ForgeError, ForgeResult};
use crate::git::{normalize_repo_path, normalize_repo_url, RepoInfo};
use crate::prompt::{ask_with_default, confirm, InputReader};
use crate::slug::{slugify, validate_slug};

/// Placeholder id used by the slug check before a project exists
const UNSAVED_PROJECT_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Project endpoints of one organization
pub struct Projects<'a> {
    api: &'a ApiClient,
    org_id: &'a str,
}

/// Editable fields collected by the project wizard
#[derive(Debug, Clone, Default, PartialEq)]
struct ProjectDraft {
    name: String,
    slug: String,
    repo_url: String,
    repo_path: String,
}

impl<'a> Projects<'a> {
    pub fn new(api: &'a ApiClient, org_id: &'a str) -> Self {
        Self { api, org_id }
    }

    fn collection_path(&self) -> String {
        format!("/organization/{}/project", self.org_id)
    }

    fn item_path(&self, id: &str) -> String {
        format!("/organization/{}/project/{}", self.org_id, id)
    }

    /// All projects of the organization, in backend order
    pub async fn list(&self) -> ForgeResult<Vec<Project>> {
        Ok(self.api.get(&self.collection_path()).await?)
    }

    pub async fn get(&self, id: &str) -> ForgeResult<Project> {
        self.api
            .get(&self.item_path(id))
            .await
            .map_err(|e| not_found_as(e, || format!("Project '{}' not found", id)))
    }

    pub async fn create(&self, request: &ProjectRequest) -> ForgeResult<Project> {
        Ok(self.api.post(&self.collection_path(), request).await?)
    }

    pub async fn update(&self, id: &str, request: &ProjectRequest) -> ForgeResult<Project> {
        self.api
            .put(&self.item_path(id), request)
            .await
            .map_err(|e| not_found_as(e, || format!("Project '{}' not found", id)))
    }

    pub async fn delete(&self, id: &str) -> ForgeResult<()> {
        self.api
            .delete(&self.item_path(id))
            .await
            .map_err(|e| not_found_as(e, || format!("Project '{}' not found", id)))
    }

    /// Ask the backend whether `slug` is free; `project_id` excludes the
    /// project being renamed
    pub async fn check_slug(&self, project_id: Option<&str>, slug: &str) -> ForgeResult<()> {
        let path = format!(
            "{}/{}/check_slug",
            self.item_path(project_id.unwrap_or(UNSAVED_PROJECT_ID)),
            urlencoding::encode(slug)
        );
        match self.api.get::<serde_json::Value>(&path).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_validation() => Err(ForgeError::ValidationFailed(format!(
                "slug '{}' is already in use",
                slug
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// List and pick; the choice is persisted in `config`
    pub async fn select(
        &self,
        input: &mut dyn InputReader,
        config: &mut Config,
    ) -> ForgeResult<Selection<Project>> {
        let projects = self.list().await?;
        debug!(org_id = self.org_id, "Found {} projects", projects.len());

        let selection = choose(input, "project", &projects)?;
        if let Selection::Chosen(project) = &selection {
            persist(config, project);
        }
        Ok(selection)
    }

    /// Select a project, offering to create one when none fits
    pub async fn select_or_create(
        &self,
        input: &mut dyn InputReader,
        config: &mut Config,
        repo: Option<&RepoInfo>,
    ) -> ForgeResult<Project> {
        match self.select(input, config).await? {
            Selection::Chosen(project) => Ok(project),
            Selection::CreateNew => self.create_and_select(input, config, repo).await,
            Selection::Empty => {
                println!("This organization has no projects yet.");
                if confirm(input, "Create a new project now?", true)? {
                    self.create_and_select(input, config, repo).await
                } else {
                    Err(ForgeError::CreationCancelled)
                }
            }
        }
    }

    pub async fn create_and_select(
        &self,
        input: &mut dyn InputReader,
        config: &mut Config,
        repo: Option<&RepoInfo>,
    ) -> ForgeResult<Project> {
        let project = self.create_interactive(input, repo).await?;
        persist(config, &project);
        Ok(project)
    }

    /// Walk the user through a new project; repo defaults come from `repo`
    pub async fn create_interactive(
        &self,
        input: &mut dyn InputReader,
        repo: Option<&RepoInfo>,
    ) -> ForgeResult<Project> {
        let draft = ProjectDraft {
            repo_url: repo.map(|r| r.url.clone()).unwrap_or_default(),
            repo_path: repo.map(|r| r.path.clone()).unwrap_or_default(),
            ..Default::default()
        };
        let project = self.run_wizard(input, draft, None).await?;
        info!(project_id = %project.id, slug = %project.slug, "Created project");
        println!("✓ Project '{}' created successfully!", project.name);
        Ok(project)
    }

    /// Re-run the wizard with the current values as defaults and PUT the result
    pub async fn update_interactive(
        &self,
        input: &mut dyn InputReader,
        current: &Project,
    ) -> ForgeResult<Project> {
        let draft = ProjectDraft {
            name: current.name.clone(),
            slug: current.slug.clone(),
            repo_url: current.repo_url.clone(),
            repo_path: current.repo_path.clone(),
        };
        let project = self.run_wizard(input, draft, Some(current)).await?;
        info!(project_id = %project.id, "Updated project");
        println!("✓ Project '{}' updated successfully!", project.name);
        Ok(project)
    }

    async fn run_wizard(
        &self,
        input: &mut dyn InputReader,
        mut draft: ProjectDraft,
        existing: Option<&Project>,
    ) -> ForgeResult<Project> {
        let verb = if existing.is_some() { "Update" } else { "Create" };
        let mut step = WizardStep::AwaitingName;

        loop {
            step = match step {
                WizardStep::AwaitingName => {
                    draft.name = ask_with_default(input, "Project name", &draft.name)?;
                    if draft.name.is_empty() {
                        println!("Project name cannot be empty.");
                        WizardStep::AwaitingName
                    } else {
                        WizardStep::AwaitingSlug
                    }
                }
                WizardStep::AwaitingSlug => {
                    let default = if draft.slug.is_empty() {
                        slugify(&draft.name)
                    } else {
                        draft.slug.clone()
                    };
                    let slug = ask_with_default(input, "Project slug", &default)?;

                    let unchanged = existing.is_some_and(|p| p.slug == slug);
                    let checked = match validate_slug(&slug) {
                        Ok(()) if unchanged => Ok(()),
                        Ok(()) => self.check_slug(existing.map(|p| p.id.as_str()), &slug).await,
                        Err(e) => Err(e),
                    };
                    match checked {
                        Ok(()) => {
                            draft.slug = slug;
                            WizardStep::AwaitingConfirmFinal
                        }
                        Err(e @ ForgeError::ValidationFailed(_)) => {
                            println!("{}", e);
                            draft.slug.clear();
                            WizardStep::AwaitingSlug
                        }
                        Err(e) => return Err(e),
                    }
                }
                WizardStep::AwaitingConfirmFinal => {
                    if let Err(e) = self.ask_repo(input, &mut draft) {
                        match e {
                            ForgeError::ValidationFailed(_) => {
                                println!("{}", e);
                                continue;
                            }
                            other => return Err(other),
                        }
                    }

                    println!("\nProject:");
                    println!("  Name:      {}", draft.name);
                    println!("  Slug:      {}", draft.slug);
                    println!("  Repo URL:  {}", draft.repo_url);
                    println!(
                        "  Repo path: {}",
                        if draft.repo_path.is_empty() { "(root)" } else { &draft.repo_path }
                    );
                    if !confirm(input, &format!("{} this project?", verb), true)? {
                        return Err(ForgeError::CreationCancelled);
                    }

                    let request = ProjectRequest {
                        name: draft.name.clone(),
                        slug: draft.slug.clone(),
                        repo_url: draft.repo_url.clone(),
                        repo_path: draft.repo_path.clone(),
                        org_id: self.org_id.to_string(),
                    };
                    let result = match existing {
                        Some(project) => self.update(&project.id, &request).await,
                        None => self.create(&request).await,
                    };

                    match result {
                        Ok(project) => return Ok(project),
                        Err(e) if e.is_validation() => {
                            println!("The backend rejected the project: {}", e);
                            println!("Please choose another slug.");
                            draft.slug.clear();
                            WizardStep::AwaitingSlug
                        }
                        Err(e) => return Err(e),
                    }
                }
            };
        }
    }

    /// Repo URL and path prompts, asked right before the final confirmation
    fn ask_repo(&self, input: &mut dyn InputReader, draft: &mut ProjectDraft) -> ForgeResult<()> {
        let repo_url = ask_with_default(input, "Game repository URL", &draft.repo_url)?;
        let repo_url = validate_repo_url(&repo_url)?;
        let repo_path = ask_with_default(input, "Path to the game within the repository", &draft.repo_path)?;

        draft.repo_url = repo_url;
        draft.repo_path = normalize_repo_path(&repo_path);
        Ok(())
    }
}

/// Accepts http(s) and git@ remotes and returns the normalised URL
pub fn validate_repo_url(raw: &str) -> ForgeResult<String> {
    let normalized = normalize_repo_url(raw);
    if normalized.is_empty() {
        return Err(ForgeError::ValidationFailed(
            "repository URL cannot be empty".to_string(),
        ));
    }
    match Url::parse(&normalized) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            Ok(normalized)
        }
        _ => Err(ForgeError::ValidationFailed(format!(
            "'{}' is not a valid repository URL",
            raw
        ))),
    }
}

fn persist(config: &mut Config, project: &Project) {
    config.select_project(project);
    config.save_or_warn();
}
