//! Build a code-review prompt from a GitHub pull request diff.
//!
//! The diff comes from the `gh` CLI run inside the repository; review
//! instructions come from the repository's checklist file when it exists.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::io::ConsoleIo;

/// Instructions used when the repository has no checklist.
pub const DEFAULT_REVIEW_INSTRUCTIONS: &str =
    "Look for potential bugs, suggest improvements, and check for adherence to coding standards.";

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("`gh` CLI tool not found. Please install it to use review-pr.\nSee https://cli.github.com/ for installation instructions.")]
    GhNotFound,

    #[error("Please provide a PR number or URL.")]
    EmptyIdentifier,

    #[error("Not in a git repository.")]
    NotGitRepo,

    #[error("This does not appear to be a GitHub repository.")]
    NotGitHub,

    #[error("Error getting diff for PR '{id}':\n{stderr}")]
    DiffFailed { id: String, stderr: String },

    #[error("PR '{0}' has an empty diff.")]
    EmptyDiff(String),

    #[error("Failed to run {program}: {source}")]
    Command {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Locate the `gh` executable.
pub fn check_gh_installed() -> Result<PathBuf, ReviewError> {
    which::which("gh").map_err(|_| ReviewError::GhNotFound)
}

/// Trimmed PR identifier, rejecting blank input.
pub fn validate_identifier(raw: &str) -> Result<&str, ReviewError> {
    let id = raw.trim();
    if id.is_empty() {
        Err(ReviewError::EmptyIdentifier)
    } else {
        Ok(id)
    }
}

/// Whether any remote in `git remote -v` output points at github.com.
pub fn has_github_remote(remotes: &str) -> bool {
    remotes
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|url| url.contains("github.com"))
}

/// Fail unless `repo_root` is a git repository with a GitHub remote.
pub async fn check_github_repo(repo_root: &Path) -> Result<(), ReviewError> {
    let output = Command::new("git")
        .args(["-C", &repo_root.to_string_lossy(), "remote", "-v"])
        .output()
        .await
        .map_err(|source| ReviewError::Command {
            program: "git",
            source,
        })?;

    if !output.status.success() {
        debug!(
            "git remote failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return Err(ReviewError::NotGitRepo);
    }

    if has_github_remote(&String::from_utf8_lossy(&output.stdout)) {
        Ok(())
    } else {
        Err(ReviewError::NotGitHub)
    }
}

/// Run `gh pr diff <id>` in `repo_root`.
pub async fn fetch_pr_diff(repo_root: &Path, id: &str) -> Result<String, ReviewError> {
    let output = Command::new("gh")
        .args(["pr", "diff", id])
        .current_dir(repo_root)
        .output()
        .await
        .map_err(|source| ReviewError::Command {
            program: "gh",
            source,
        })?;

    if !output.status.success() {
        return Err(ReviewError::DiffFailed {
            id: id.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let diff = String::from_utf8_lossy(&output.stdout).into_owned();
    if diff.trim().is_empty() {
        return Err(ReviewError::EmptyDiff(id.to_string()));
    }
    Ok(diff)
}

/// Checklist content when present and non-empty, else the default
/// instructions. Read failures are reported and fall back to the default.
pub fn load_instructions(checklist: &Path, io: &ConsoleIo) -> String {
    if !checklist.exists() {
        return DEFAULT_REVIEW_INSTRUCTIONS.to_string();
    }

    match std::fs::read_to_string(checklist) {
        Ok(text) if !text.trim().is_empty() => {
            io.tool_output(&format!(
                "Using custom review checklist from {}",
                checklist.display()
            ));
            text
        }
        Ok(_) => DEFAULT_REVIEW_INSTRUCTIONS.to_string(),
        Err(e) => {
            io.tool_error(&format!("Error reading review checklist: {}", e));
            DEFAULT_REVIEW_INSTRUCTIONS.to_string()
        }
    }
}

pub fn build_review_prompt(id: &str, instructions: &str, diff: &str) -> String {
    format!(
        "Please review the following pull request diff for PR '{}'.\n{}\n\n```diff\n{}\n```\n",
        id, instructions, diff
    )
}

/// Fetch the diff for `raw_id` and return the review prompt.
pub async fn review_pr(
    repo_root: &Path,
    raw_id: &str,
    checklist: &Path,
    io: &ConsoleIo,
) -> Result<String, ReviewError> {
    check_gh_installed()?;
    let id = validate_identifier(raw_id)?;
    check_github_repo(repo_root).await?;

    io.tool_output(&format!("Fetching diff for PR '{}'...", id));
    let diff = fetch_pr_diff(repo_root, id).await?;

    let instructions = load_instructions(checklist, io);
    io.tool_output("Diff fetched successfully.");
    Ok(build_review_prompt(id, &instructions, &diff))
}
