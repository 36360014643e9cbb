// Container image build and publish
//
// Images are built and pushed by shelling out to a container CLI (docker or
// podman). Registry credentials come from the environment.

mod docker;
mod registry;

pub(crate) use docker::{build_image, parse_build_arg, BuildOptions};
pub(crate) use registry::{docker_login, docker_push, RegistryAuth};

use anyhow::Result;
use tracing::info;

/// Read an environment variable, treating empty strings as if the variable is not set.
pub(crate) fn env_var_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Build the image and, when asked, log in to its registry and push it
pub(crate) fn build_and_publish(options: &BuildOptions) -> Result<()> {
    build_image(options)?;

    if options.push {
        if let Some(auth) = RegistryAuth::from_env(&options.image_tag) {
            docker_login(&options.container_cli, &auth)?;
        }
        docker_push(&options.container_cli, &options.image_tag)?;
        info!("Pushed image '{}'", options.image_tag);
    }

    Ok(())
}
