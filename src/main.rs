use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod build;
mod cli;
mod config;
mod error;
mod git;
mod prompt;
mod resolve;
mod setup;
mod slug;

use api::models::OrganizationRole;
use cli::deploy::DeployAction;
use cli::Session;

#[derive(Parser, Debug)]
#[command(name = "world", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in through the browser
    Login {
        /// Backend URL to log in to (remembered for later commands)
        #[arg(long)]
        url: Option<String>,
    },
    /// Forget the stored login
    Logout,
    /// Set up an organization and project for the current repository
    Forge {
        #[command(subcommand)]
        command: Option<ForgeCommands>,
    },
    /// Organization management commands
    #[command(visible_alias = "org")]
    Organization {
        #[command(subcommand)]
        command: Option<OrganizationCommands>,
    },
    /// Project management commands
    #[command(visible_alias = "p")]
    Project {
        #[command(subcommand)]
        command: Option<ProjectCommands>,
    },
    /// Organization members and your own profile
    #[command(subcommand)]
    #[command(visible_alias = "u")]
    User(UserCommands),
    /// Deploy the selected project
    #[command(visible_alias = "d")]
    Deploy {
        /// Redeploy even when nothing changed
        #[arg(long)]
        force: bool,
        /// Show the deployment plan without executing it
        #[arg(long, conflicts_with = "select_regions")]
        preview: bool,
        /// Pick the regions to deploy to instead of deploying everywhere
        #[arg(long)]
        select_regions: bool,
    },
    /// Tear down all deployments of the selected project
    Destroy {
        /// Show what would be destroyed without executing it
        #[arg(long)]
        preview: bool,
    },
    /// Reset the running deployments of the selected project
    Reset {
        /// Show what would be reset without executing it
        #[arg(long)]
        preview: bool,
    },
    /// Promote the latest deployment to the next environment
    Promote {
        /// Show the promotion plan without executing it
        #[arg(long)]
        preview: bool,
    },
    /// Show deployments and region health of the selected project
    #[command(visible_alias = "s")]
    Status,
    /// Build a container image of the game
    Build {
        /// Path to the directory containing the game
        path: String,
        /// Tag for the built image (e.g., registry.io/org/game:v1.0)
        #[arg(long, short)]
        tag: String,
        /// Push image to registry after building
        #[arg(long)]
        push: bool,
        /// Container CLI to use
        #[arg(long, default_value = "docker", env = "WORLD_FORGE_CONTAINER_CLI")]
        container_cli: String,
        /// Dockerfile relative to the game directory
        #[arg(long, short = 'f')]
        dockerfile: Option<String>,
        /// Build argument passed to the image build (KEY=VALUE, repeatable)
        #[arg(long = "build-arg", value_parser = build::parse_build_arg)]
        build_args: Vec<(String, String)>,
    },
}

#[derive(Subcommand, Debug)]
enum ForgeCommands {
    /// Show the local configuration
    Status,
}

#[derive(Subcommand, Debug)]
enum OrganizationCommands {
    /// Create a new organization and select it
    #[command(visible_alias = "c")]
    #[command(visible_alias = "new")]
    Create,
    /// Select another organization
    #[command(visible_alias = "sw")]
    Switch,
}

#[derive(Subcommand, Debug)]
enum ProjectCommands {
    /// Create a new project and select it
    #[command(visible_alias = "c")]
    #[command(visible_alias = "new")]
    Create,
    /// Select another project
    #[command(visible_alias = "sw")]
    Switch,
    /// Update the selected project
    #[command(visible_alias = "u")]
    #[command(visible_alias = "edit")]
    Update,
    /// Delete the selected project
    #[command(visible_alias = "del")]
    #[command(visible_alias = "rm")]
    Delete,
}

#[derive(Subcommand, Debug)]
enum UserCommands {
    /// Invite someone to the selected organization
    Invite {
        /// Email address of the invitee
        email: String,
        /// Role to grant (member, admin or owner)
        #[arg(long, default_value = "member")]
        role: OrganizationRole,
    },
    /// Change a member's role (none removes them)
    Role {
        /// Email address of the member
        email: String,
        /// New role (member, admin, owner or none)
        role: OrganizationRole,
    },
    /// Update your name or email
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = config::Config::load()?;
    let mut session = Session::new(config);

    match cli.command {
        Commands::Login { url } => cli::login::handle_login(&mut session, url).await,
        Commands::Logout => cli::login::handle_logout(&mut session),
        Commands::Forge { command } => match command {
            None => cli::forge::init(&mut session).await,
            Some(ForgeCommands::Status) => cli::forge::status(&mut session).await,
        },
        Commands::Organization { command } => match command {
            None => cli::organization::list_organizations(&mut session).await,
            Some(OrganizationCommands::Create) => {
                cli::organization::create_organization(&mut session).await
            }
            Some(OrganizationCommands::Switch) => {
                cli::organization::switch_organization(&mut session).await
            }
        },
        Commands::Project { command } => match command {
            None => cli::project::list_projects(&mut session).await,
            Some(ProjectCommands::Create) => cli::project::create_project(&mut session).await,
            Some(ProjectCommands::Switch) => cli::project::switch_project(&mut session).await,
            Some(ProjectCommands::Update) => cli::project::update_project(&mut session).await,
            Some(ProjectCommands::Delete) => cli::project::delete_project(&mut session).await,
        },
        Commands::User(user_cmd) => match user_cmd {
            UserCommands::Invite { email, role } => {
                cli::user::invite_user(&mut session, &email, role).await
            }
            UserCommands::Role { email, role } => {
                cli::user::set_role(&mut session, &email, role).await
            }
            UserCommands::Update { name, email } => {
                cli::user::update_user(&mut session, name, email).await
            }
        },
        Commands::Deploy {
            force,
            preview,
            select_regions,
        } => {
            let action = if force {
                DeployAction::ForceDeploy
            } else {
                DeployAction::Deploy
            };
            if select_regions {
                cli::deploy::deploy_to_selected_regions(&mut session, action).await
            } else {
                cli::deploy::run_action(&mut session, action, preview).await
            }
        }
        Commands::Destroy { preview } => {
            cli::deploy::run_action(&mut session, DeployAction::Destroy, preview).await
        }
        Commands::Reset { preview } => {
            cli::deploy::run_action(&mut session, DeployAction::Reset, preview).await
        }
        Commands::Promote { preview } => {
            cli::deploy::run_action(&mut session, DeployAction::Promote, preview).await
        }
        Commands::Status => cli::deploy::show_status(&mut session).await,
        Commands::Build {
            path,
            tag,
            push,
            container_cli,
            dockerfile,
            build_args,
        } => {
            let mut options = build::BuildOptions::new(path, tag);
            options.container_cli = container_cli;
            options.dockerfile = dockerfile;
            options.build_args = build_args;
            options.push = push;
            build::build_and_publish(&options)
        }
    }
}
