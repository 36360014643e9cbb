// Docker/Podman image builds

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Game servers run on amd64 hosts
const TARGET_PLATFORM: &str = "linux/amd64";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BuildOptions {
    pub app_path: String,
    pub image_tag: String,
    pub container_cli: String,
    /// Dockerfile relative to `app_path`; the CLI default applies when unset
    pub dockerfile: Option<String>,
    pub build_args: Vec<(String, String)>,
    pub push: bool,
}

impl BuildOptions {
    pub fn new(app_path: impl Into<String>, image_tag: impl Into<String>) -> Self {
        Self {
            app_path: app_path.into(),
            image_tag: image_tag.into(),
            container_cli: "docker".to_string(),
            dockerfile: None,
            build_args: Vec::new(),
            push: false,
        }
    }
}

/// Parse `KEY=VALUE` into a build argument
pub(crate) fn parse_build_arg(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => bail!("Invalid build argument '{}'. Use KEY=VALUE", raw),
    }
}

/// The `<cli> build` invocation for `options`
pub(crate) fn build_command(options: &BuildOptions) -> Command {
    let mut cmd = Command::new(&options.container_cli);
    cmd.arg("build")
        .arg("-t")
        .arg(&options.image_tag)
        .arg("--platform")
        .arg(TARGET_PLATFORM);

    if let Some(dockerfile) = &options.dockerfile {
        let path = Path::new(&options.app_path).join(dockerfile);
        cmd.arg("-f").arg(path);
    }
    for (key, value) in &options.build_args {
        cmd.arg("--build-arg").arg(format!("{}={}", key, value));
    }

    cmd.arg(&options.app_path);
    cmd
}

/// Build the image with the configured container CLI
pub(crate) fn build_image(options: &BuildOptions) -> Result<()> {
    let app_path = Path::new(&options.app_path);
    if !app_path.exists() {
        bail!("Path '{}' does not exist", options.app_path);
    }
    if !app_path.is_dir() {
        bail!("Path '{}' is not a directory", options.app_path);
    }
    if let Some(dockerfile) = &options.dockerfile {
        if !app_path.join(dockerfile).is_file() {
            bail!("Dockerfile '{}' not found in '{}'", dockerfile, options.app_path);
        }
    }

    let cli_check = Command::new(&options.container_cli).arg("--version").output();
    if cli_check.is_err() {
        bail!(
            "{} CLI not found. Please install Docker or Podman.",
            options.container_cli
        );
    }

    info!(
        "Building image '{}' from '{}' with {}",
        options.image_tag, options.app_path, options.container_cli
    );
    let mut cmd = build_command(options);
    debug!("Executing command: {:?}", cmd);

    let status = cmd
        .status()
        .with_context(|| format!("Failed to execute {} build", options.container_cli))?;

    if !status.success() {
        bail!("{} build failed with status: {}", options.container_cli, status);
    }

    Ok(())
}
