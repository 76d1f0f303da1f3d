//! Git test helper utilities
//!
//! Builds throwaway repositories that Git registries can clone over `file://`.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Git command wrapper for tests.
///
/// Use this instead of raw `std::process::Command` when a test needs a real
/// repository to clone from.
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    fn run_git_command(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Initializes a repository whose default branch is `main`, with a test
    /// identity configured.
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.repo_path)
            .with_context(|| format!("Failed to create {}", self.repo_path.display()))?;
        self.run_git_command(&["init"], "Failed to initialize git repository")?;
        self.run_git_command(&["symbolic-ref", "HEAD", "refs/heads/main"], "Failed to set HEAD to main")?;
        self.config_user()
    }

    pub fn config_user(&self) -> Result<()> {
        self.run_git_command(
            &["config", "user.email", "test@promptscript.example"],
            "Failed to configure git user email",
        )?;
        self.run_git_command(&["config", "user.name", "Test User"], "Failed to configure git user name")?;
        Ok(())
    }

    /// Writes a file relative to the repository root, creating parent directories.
    pub fn write_file(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.repo_path.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn add_all(&self) -> Result<()> {
        self.run_git_command(&["add", "."], "Failed to add files to git")?;
        Ok(())
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        self.run_git_command(&["commit", "-m", message], "Failed to create git commit")?;
        Ok(())
    }

    /// Stages everything and commits, returning the new HEAD.
    pub fn commit_all(&self, message: &str) -> Result<String> {
        self.add_all()?;
        self.commit(message)?;
        self.rev_parse_head()
    }

    pub fn tag(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(&["tag", tag_name], &format!("Failed to create tag: {tag_name}"))?;
        Ok(())
    }

    pub fn checkout(&self, ref_name: &str) -> Result<()> {
        self.run_git_command(&["checkout", ref_name], &format!("Failed to checkout: {ref_name}"))?;
        Ok(())
    }

    pub fn create_branch(&self, branch_name: &str) -> Result<()> {
        self.run_git_command(
            &["checkout", "-b", branch_name],
            &format!("Failed to create branch: {branch_name}"),
        )?;
        Ok(())
    }

    pub fn rev_parse_head(&self) -> Result<String> {
        let output = self.run_git_command(&["rev-parse", "HEAD"], "Failed to get current commit SHA")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// `file://` URL for cloning this repository.
    pub fn file_url(&self) -> String {
        format!("file://{}", self.repo_path.display())
    }
}
