// Container registry operations (push and login)

use anyhow::{bail, Context, Result};
use std::io::{self, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use tracing::{debug, info};

use super::env_var_non_empty;

const DEFAULT_REGISTRY: &str = "docker.io";

/// Registry login taken from `WORLD_FORGE_REGISTRY_USER` and
/// `WORLD_FORGE_REGISTRY_PASSWORD`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RegistryAuth {
    pub registry: String,
    pub username: String,
    pub password: String,
}

impl RegistryAuth {
    pub fn from_env(image_tag: &str) -> Option<Self> {
        Self::from_values(
            image_tag,
            env_var_non_empty("WORLD_FORGE_REGISTRY_USER"),
            env_var_non_empty("WORLD_FORGE_REGISTRY_PASSWORD"),
        )
    }

    fn from_values(
        image_tag: &str,
        username: Option<String>,
        password: Option<String>,
    ) -> Option<Self> {
        Some(Self {
            registry: registry_host(image_tag),
            username: username?,
            password: password?,
        })
    }
}

/// Registry host of an image reference, `docker.io` for bare names
pub(crate) fn registry_host(image_tag: &str) -> String {
    match image_tag.split_once('/') {
        Some((first, _)) if first.contains('.') || first.contains(':') || first == "localhost" => {
            first.to_string()
        }
        _ => DEFAULT_REGISTRY.to_string(),
    }
}

/// Push image to container registry
pub(crate) fn docker_push(container_cli: &str, image_tag: &str) -> Result<()> {
    info!("Pushing image to registry: {}", image_tag);

    let mut cmd = Command::new(container_cli);
    cmd.arg("push").arg(image_tag);

    debug!("Executing command: {:?}", cmd);

    let status = cmd
        .status()
        .with_context(|| format!("Failed to execute {} push", container_cli))?;

    if !status.success() {
        bail!("{} push failed with status: {}", container_cli, status);
    }

    Ok(())
}

/// Login to container registry, passing the password on stdin
pub(crate) fn docker_login(container_cli: &str, auth: &RegistryAuth) -> Result<()> {
    debug!(
        "Executing: {} login {} --username {} --password-stdin",
        container_cli, auth.registry, auth.username
    );

    let status = Command::new(container_cli)
        .arg("login")
        .arg(&auth.registry)
        .arg("--username")
        .arg(&auth.username)
        .arg("--password-stdin")
        .stdin(Stdio::piped())
        .spawn()
        .and_then(|mut child| write_and_wait(&mut child, auth.password.as_bytes()))
        .with_context(|| format!("Failed to execute {} login", container_cli))?;

    if !status.success() {
        bail!("{} login to {} failed with status: {}", container_cli, auth.registry, status);
    }

    Ok(())
}

/// Feed `input` to the child's stdin, then reap it even when the write fails
fn write_and_wait(child: &mut Child, input: &[u8]) -> io::Result<ExitStatus> {
    // Dropping stdin closes the pipe so the child sees EOF
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(input),
        None => Ok(()),
    };
    let status = child.wait()?;
    written.map(|_| status)
}
