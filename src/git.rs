// Git repository inspection for known-project matching

use std::path::{Component, Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Location of the working directory inside a git repository
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RepoInfo {
    /// Normalised remote URL of `origin`
    pub url: String,
    /// Path of the working directory relative to the repo root, no slashes at the ends
    pub path: String,
}

/// Finds the repo the command runs in
pub trait RepoInspector {
    fn current_repo(&self) -> Option<RepoInfo>;
}

/// Shells out to the `git` CLI
#[derive(Debug, Clone)]
pub struct GitCli {
    dir: PathBuf,
}

impl GitCli {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Inspector for the process working directory
    pub fn current_dir() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    fn git(&self, args: &[&str]) -> Option<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .output()
            .ok()?;

        if !output.status.success() {
            debug!(
                "git {:?} failed in {}: {}",
                args,
                self.dir.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }

        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl RepoInspector for GitCli {
    fn current_repo(&self) -> Option<RepoInfo> {
        let url = self.git(&["config", "--get", "remote.origin.url"])?;
        if url.is_empty() {
            return None;
        }
        let prefix = self
            .git(&["rev-parse", "--show-prefix"])
            .unwrap_or_default();

        Some(RepoInfo {
            url: normalize_repo_url(&url),
            path: normalize_repo_path(&prefix),
        })
    }
}

/// Inspector that never finds a repo
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct NoRepo;

#[cfg(test)]
impl RepoInspector for NoRepo {
    fn current_repo(&self) -> Option<RepoInfo> {
        None
    }
}

/// Inspector with a fixed answer
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct FixedRepo(pub RepoInfo);

#[cfg(test)]
impl RepoInspector for FixedRepo {
    fn current_repo(&self) -> Option<RepoInfo> {
        Some(self.0.clone())
    }
}

/// Bring SSH and HTTPS remotes to the same `https://host/owner/repo` form
pub fn normalize_repo_url(url: &str) -> String {
    let url = url.trim();

    let url = if let Some(rest) = url.strip_prefix("git@") {
        match rest.split_once(':') {
            Some((host, path)) => format!("https://{}/{}", host, path),
            None => format!("https://{}", rest),
        }
    } else if let Some(rest) = url.strip_prefix("ssh://git@") {
        format!("https://{}", rest)
    } else {
        url.to_string()
    };

    let url = url.trim_end_matches('/');
    url.strip_suffix(".git").unwrap_or(url).to_string()
}

pub fn normalize_repo_path(path: &str) -> String {
    let normalized = Path::new(path.trim())
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/");
    normalized.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_repo_url_ssh() {
        assert_eq!(
            normalize_repo_url("git@github.com:acme/game.git"),
            "https://github.com/acme/game"
        );
        assert_eq!(
            normalize_repo_url("ssh://git@gitlab.com/acme/game.git"),
            "https://gitlab.com/acme/game"
        );
    }

    #[test]
    fn test_normalize_repo_url_https() {
        assert_eq!(
            normalize_repo_url("https://github.com/acme/game.git/"),
            "https://github.com/acme/game"
        );
        assert_eq!(
            normalize_repo_url("https://github.com/acme/game"),
            "https://github.com/acme/game"
        );
    }

    #[test]
    fn test_normalize_repo_path() {
        assert_eq!(normalize_repo_path("shards/world/"), "shards/world");
        assert_eq!(normalize_repo_path(""), "");
        assert_eq!(normalize_repo_path("./shard"), "shard");
        assert_eq!(normalize_repo_path("."), "");
    }

    #[test]
    fn test_git_cli_outside_repo_returns_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(GitCli::new(temp_dir.path()).current_repo().is_none());
    }
}
