pub mod deploy;
pub mod forge;
pub mod login;
pub mod organization;
pub mod project;
pub mod user;

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Attribute, Cell, Table};

use crate::api::ApiClient;
use crate::config::Config;
use crate::error::ForgeResult;
use crate::git::{GitCli, RepoInspector};
use crate::prompt::{InputReader, StdinReader};
use crate::setup::{CommandState, Setup, SetupRequest};

/// Everything a command handler works with
pub struct Session {
    pub api: ApiClient,
    pub config: Config,
    pub input: Box<dyn InputReader>,
    pub repo: Box<dyn RepoInspector>,
}

impl Session {
    /// Session reading from the terminal and inspecting the working directory
    pub fn new(config: Config) -> Self {
        let api = ApiClient::new(config.get_backend_url()).with_token(config.get_token());
        Self::with_parts(
            api,
            config,
            Box::new(StdinReader),
            Box::new(GitCli::current_dir()),
        )
    }

    pub fn with_parts(
        api: ApiClient,
        config: Config,
        input: Box<dyn InputReader>,
        repo: Box<dyn RepoInspector>,
    ) -> Self {
        Self {
            api,
            config,
            input,
            repo,
        }
    }

    /// Resolve the command's preconditions
    pub async fn setup(&mut self, request: SetupRequest) -> ForgeResult<CommandState> {
        Setup::new(
            &self.api,
            &mut self.config,
            self.input.as_mut(),
            self.repo.as_ref(),
        )
        .run(request)
        .await
    }
}

/// Table with the bold header row used by every listing
pub(crate) fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    table
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Session;
    use crate::api::ApiClient;
    use crate::config::{Config, Credential};
    use crate::git::NoRepo;
    use crate::prompt::ScriptedInput;
    use chrono::{Duration, Utc};
    use httpmock::prelude::*;
    use serde_json::json;

    /// Logged-in session against `server` with `o-1`/`p-1` selected and
    /// its config stored in `dir`
    pub(crate) fn session<I, S>(server: &MockServer, dir: &tempfile::TempDir, answers: I) -> Session
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = Config::load_from(&dir.path().join("config.json")).unwrap();
        config.organization_id = "o-1".into();
        config.project_id = "p-1".into();
        config.set_credential(Credential {
            token: "tok".into(),
            expiry: Some(Utc::now() + Duration::hours(1)),
            id: "u-1".into(),
            name: "Ada".into(),
        });

        let api = ApiClient::new(server.base_url()).with_token(config.get_token());
        Session::with_parts(
            api,
            config,
            Box::new(ScriptedInput::new(answers)),
            Box::new(NoRepo),
        )
    }

    /// Mocks for `GET /user`, organization `o-1` and project `p-1`
    pub(crate) fn mock_selection(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET).path("/user");
            then.status(200).json_body(json!({
                "data": { "id": "u-1", "name": "Ada", "email": "ada@acme.dev" }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/organization/o-1");
            then.status(200).json_body(json!({
                "data": { "id": "o-1", "name": "Acme", "slug": "acme" }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/organization/o-1/project/p-1");
            then.status(200).json_body(json!({
                "data": {
                    "id": "p-1", "org_id": "o-1", "name": "Alpha", "slug": "alpha",
                    "repo_url": "https://github.com/acme/alpha", "repo_path": ""
                }
            }));
        });
    }
}
