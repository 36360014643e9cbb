use tracing::{debug, info};

use super::{choose, not_found_as, Selection, WizardStep};
use crate::api::models::{CreateOrganizationRequest, Organization};
use crate::api::ApiClient;
use crate::config::Config;
use crate::error::{ForgeError, ForgeResult};
use crate::prompt::{ask_with_default, confirm, InputReader};
use crate::slug::{slugify, validate_slug};

/// Organization endpoints
pub struct Organizations<'a> {
    api: &'a ApiClient,
}

impl<'a> Organizations<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// All organizations of the current user, in backend order
    pub async fn list(&self) -> ForgeResult<Vec<Organization>> {
        Ok(self.api.get("/organization").await?)
    }

    pub async fn get(&self, id: &str) -> ForgeResult<Organization> {
        self.api
            .get(&format!("/organization/{}", id))
            .await
            .map_err(|e| not_found_as(e, || format!("Organization '{}' not found", id)))
    }

    pub async fn create(&self, name: &str, slug: &str) -> ForgeResult<Organization> {
        let request = CreateOrganizationRequest {
            name: name.to_string(),
            slug: slug.to_string(),
        };
        Ok(self.api.post("/organization", &request).await?)
    }

    /// List and pick; the choice is persisted in `config`
    pub async fn select(
        &self,
        input: &mut dyn InputReader,
        config: &mut Config,
    ) -> ForgeResult<Selection<Organization>> {
        let organizations = self.list().await?;
        debug!("Found {} organizations", organizations.len());

        let selection = choose(input, "organization", &organizations)?;
        if let Selection::Chosen(org) = &selection {
            persist(config, org);
        }
        Ok(selection)
    }

    /// Select an organization, offering to create one when none fits
    pub async fn select_or_create(
        &self,
        input: &mut dyn InputReader,
        config: &mut Config,
    ) -> ForgeResult<Organization> {
        match self.select(input, config).await? {
            Selection::Chosen(org) => Ok(org),
            Selection::CreateNew => self.create_and_select(input, config).await,
            Selection::Empty => {
                println!("You don't belong to any organization yet.");
                if confirm(input, "Create a new organization now?", true)? {
                    self.create_and_select(input, config).await
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
    ) -> ForgeResult<Organization> {
        let org = self.create_interactive(input).await?;
        persist(config, &org);
        Ok(org)
    }

    /// Walk the user through naming a new organization and create it.
    ///
    /// A slug the backend refuses sends the wizard back to the slug prompt.
    pub async fn create_interactive(
        &self,
        input: &mut dyn InputReader,
    ) -> ForgeResult<Organization> {
        let mut step = WizardStep::AwaitingName;
        let mut name = String::new();
        let mut slug = String::new();

        loop {
            step = match step {
                WizardStep::AwaitingName => {
                    name = ask_with_default(input, "Organization name", "")?;
                    if name.is_empty() {
                        println!("Organization name cannot be empty.");
                        WizardStep::AwaitingName
                    } else {
                        WizardStep::AwaitingSlug
                    }
                }
                WizardStep::AwaitingSlug => {
                    let default = if slug.is_empty() { slugify(&name) } else { slug.clone() };
                    slug = ask_with_default(input, "Organization slug", &default)?;
                    match validate_slug(&slug) {
                        Ok(()) => WizardStep::AwaitingConfirmFinal,
                        Err(e) => {
                            println!("{}", e);
                            slug.clear();
                            WizardStep::AwaitingSlug
                        }
                    }
                }
                WizardStep::AwaitingConfirmFinal => {
                    println!("\nOrganization:");
                    println!("  Name: {}", name);
                    println!("  Slug: {}", slug);
                    if !confirm(input, "Create this organization?", true)? {
                        return Err(ForgeError::CreationCancelled);
                    }

                    match self.create(&name, &slug).await {
                        Ok(org) => {
                            info!(org_id = %org.id, slug = %org.slug, "Created organization");
                            println!("✓ Organization '{}' created successfully!", org.name);
                            return Ok(org);
                        }
                        Err(e) if e.is_validation() => {
                            println!("The backend rejected slug '{}': {}", slug, e);
                            println!("Please choose another slug.");
                            slug.clear();
                            WizardStep::AwaitingSlug
                        }
                        Err(e) => return Err(e),
                    }
                }
            };
        }
    }
}

fn persist(config: &mut Config, org: &Organization) {
    config.select_organization(&org.id);
    config.save_or_warn();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedInput;
    use httpmock::prelude::*;
    use serde_json::json;

    fn temp_config(dir: &tempfile::TempDir) -> Config {
        Config::load_from(&dir.path().join("config.json")).unwrap()
    }

    #[tokio::test]
    async fn test_get_maps_404_to_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/organization/missing");
            then.status(404).json_body(json!({ "message": "not found" }));
        });

        let api = ApiClient::new(server.base_url());
        let err = Organizations::new(&api).get("missing").await.unwrap_err();
        assert!(matches!(err, ForgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_select_single_persists_choice() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/organization");
            then.status(200).json_body(json!({
                "data": [{ "id": "o-1", "name": "Acme", "slug": "acme" }]
            }));
        });

        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = temp_config(&temp_dir);
        let mut input = ScriptedInput::new(["y"]);
        let api = ApiClient::new(server.base_url());

        let selection = Organizations::new(&api)
            .select(&mut input, &mut config)
            .await
            .unwrap();

        assert!(matches!(selection, Selection::Chosen(ref o) if o.id == "o-1"));
        assert_eq!(config.organization_id, "o-1");
        let reloaded = Config::load_from(config.path().unwrap()).unwrap();
        assert_eq!(reloaded.organization_id, "o-1");
    }

    #[tokio::test]
    async fn test_create_interactive_retries_rejected_slug() {
        let server = MockServer::start();
        let taken = server.mock(|when, then| {
            when.method(POST)
                .path("/organization")
                .json_body(json!({ "name": "Acme Games", "slug": "acme_games" }));
            then.status(409).json_body(json!({ "message": "slug already exists" }));
        });
        let created = server.mock(|when, then| {
            when.method(POST)
                .path("/organization")
                .json_body(json!({ "name": "Acme Games", "slug": "acme_games_2" }));
            then.status(201).json_body(json!({
                "data": { "id": "o-9", "name": "Acme Games", "slug": "acme_games_2" }
            }));
        });

        let api = ApiClient::new(server.base_url());
        // name, accept default slug, confirm, new slug, confirm
        let mut input = ScriptedInput::new(["Acme Games", "", "y", "acme_games_2", "y"]);

        let org = Organizations::new(&api)
            .create_interactive(&mut input)
            .await
            .unwrap();

        assert_eq!(org.slug, "acme_games_2");
        assert_eq!(taken.calls(), 1);
        assert_eq!(created.calls(), 1);
        assert_eq!(input.remaining(), 0);
    }

    #[tokio::test]
    async fn test_create_interactive_rejects_invalid_slug_locally() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST).path("/organization");
            then.status(201).json_body(json!({
                "data": { "id": "o-1", "name": "Acme", "slug": "acme" }
            }));
        });

        let api = ApiClient::new(server.base_url());
        let mut input = ScriptedInput::new(["Acme", "Bad Slug!", "acme", "y"]);

        let org = Organizations::new(&api)
            .create_interactive(&mut input)
            .await
            .unwrap();

        assert_eq!(org.id, "o-1");
        assert_eq!(create.calls(), 1);
    }

    #[tokio::test]
    async fn test_create_interactive_decline_is_cancelled() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST).path("/organization");
            then.status(201);
        });

        let api = ApiClient::new(server.base_url());
        let mut input = ScriptedInput::new(["Acme", "", "n"]);

        let err = Organizations::new(&api)
            .create_interactive(&mut input)
            .await
            .unwrap_err();

        assert!(matches!(err, ForgeError::CreationCancelled));
        assert_eq!(create.calls(), 0);
    }

    #[tokio::test]
    async fn test_select_or_create_on_empty_list() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/organization");
            then.status(200).json_body(json!({ "data": [] }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/organization");
            then.status(201).json_body(json!({
                "data": { "id": "o-2", "name": "Acme", "slug": "acme" }
            }));
        });

        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = temp_config(&temp_dir);
        let api = ApiClient::new(server.base_url());
        let mut input = ScriptedInput::new(["y", "Acme", "", "y"]);

        let org = Organizations::new(&api)
            .select_or_create(&mut input, &mut config)
            .await
            .unwrap();

        assert_eq!(org.id, "o-2");
        assert_eq!(config.organization_id, "o-2");
    }
}
