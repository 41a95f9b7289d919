use crate::error::HangarError;
use git2::Repository;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct RepoInfo {
    pub root: PathBuf,
    pub remote: Option<String>,
}

impl RepoInfo {
    /// Short label for listings: `owner/repo` from the remote, else the
    /// directory name.
    pub fn label(&self) -> String {
        if let Some(url) = &self.remote {
            let trimmed = url.trim_end_matches('/').trim_end_matches(".git");
            let mut parts = trimmed.rsplit(['/', ':']);
            if let (Some(repo), Some(owner)) = (parts.next(), parts.next()) {
                if !repo.is_empty() && !owner.is_empty() {
                    return format!("{owner}/{repo}");
                }
            }
        }
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Detect the repository root from any path within it
pub fn find_repo_root(start_path: &Path) -> Result<PathBuf, HangarError> {
    let repo = Repository::discover(start_path)?;
    let workdir = repo
        .workdir()
        .ok_or_else(|| HangarError::Git("Bare repositories are not supported".into()))?;
    Ok(workdir.to_path_buf())
}

/// Repo root and origin URL for `path`, if it is inside a repository.
pub fn repo_info(path: &Path) -> Option<RepoInfo> {
    let repo = Repository::discover(path).ok()?;
    let root = repo.workdir()?.to_path_buf();
    let remote = repo
        .find_remote("origin")
        .ok()
        .and_then(|r| r.url().map(str::to_string));
    Some(RepoInfo { root, remote })
}

/// Create a worktree at `worktree_path` on `branch`, creating the branch from
/// HEAD when it does not exist yet.
pub async fn create_worktree(
    repo_root: &Path,
    worktree_path: &Path,
    branch: &str,
) -> Result<(), HangarError> {
    let output = Command::new("git")
        .current_dir(repo_root)
        .args(["worktree", "add", "-b", branch])
        .arg(worktree_path)
        .arg("HEAD")
        .output()
        .await?;

    if !output.status.success() {
        // Branch might already exist — try without -b
        let retry = Command::new("git")
            .current_dir(repo_root)
            .args(["worktree", "add"])
            .arg(worktree_path)
            .arg(branch)
            .output()
            .await?;

        if !retry.status.success() {
            return Err(HangarError::Git(
                String::from_utf8_lossy(&retry.stderr).trim().to_string(),
            ));
        }
    }

    info!(path = %worktree_path.display(), branch, "worktree created");
    Ok(())
}

pub async fn remove_worktree(repo_root: &Path, worktree_path: &Path) -> Result<(), HangarError> {
    let output = Command::new("git")
        .current_dir(repo_root)
        .args(["worktree", "remove", "--force"])
        .arg(worktree_path)
        .output()
        .await?;

    if !output.status.success() {
        return Err(HangarError::Git(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    info!(path = %worktree_path.display(), "worktree removed");
    Ok(())
}

/// Default location for a session's worktree: a sibling of the repo named
/// `<repo>-<session>`.
pub fn default_worktree_path(repo_root: &Path, session: &str) -> PathBuf {
    let repo_name = repo_root
        .file_name()
        .unwrap_or_default()
        .to_string_lossy();
    repo_root
        .parent()
        .unwrap_or(repo_root)
        .join(format!("{repo_name}-{session}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_from_remote() {
        let info = RepoInfo {
            root: PathBuf::from("/src/hangar"),
            remote: Some("git@github.com:acme/hangar.git".into()),
        };
        assert_eq!(info.label(), "acme/hangar");

        let info = RepoInfo {
            root: PathBuf::from("/src/hangar"),
            remote: Some("https://github.com/acme/widgets/".into()),
        };
        assert_eq!(info.label(), "acme/widgets");
    }

    #[test]
    fn label_falls_back_to_dir() {
        let info = RepoInfo {
            root: PathBuf::from("/src/hangar"),
            remote: None,
        };
        assert_eq!(info.label(), "hangar");
    }

    #[test]
    fn worktree_path_is_sibling() {
        assert_eq!(
            default_worktree_path(Path::new("/src/app"), "fix-login"),
            PathBuf::from("/src/app-fix-login")
        );
    }

    #[test]
    fn repo_info_outside_repo_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(repo_info(dir.path()).is_none());
    }

    #[test]
    fn repo_info_inside_repo() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        repo.remote("origin", "https://example.com/acme/tool.git")
            .unwrap();
        let nested = dir.path().join("src");
        std::fs::create_dir_all(&nested).unwrap();

        let info = repo_info(&nested).unwrap();
        assert_eq!(info.label(), "acme/tool");
    }
}
