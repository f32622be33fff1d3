// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Repository-hosting operations used by the update driver.
//!
//! [`RepositoryHost`] is the seam between the update algorithm and the remote
//! API. The production implementation lives in [`crate::github`]; tests plug
//! in a recording in-memory host.

use async_trait::async_trait;
use serde::Serialize;

use crate::{error::Error, target::RepoTarget};

/// Head of a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct BranchHead
{
    /// Branch name without the `refs/heads/` prefix.
    pub name: String,
    /// Commit the branch points to.
    pub sha:  String,
}

/// Outcome of ensuring a working branch exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize,)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus
{
    /// The branch was created from the default branch head.
    Created,
    /// The branch was already present.
    AlreadyExisted,
}

/// File fetched from a branch.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct RemoteFile
{
    /// Repository-relative path reported by the host.
    pub path:    String,
    /// Blob sha used for optimistic concurrency on update.
    pub sha:     String,
    /// Decoded UTF-8 content, if the host returned any.
    pub content: Option<String,>,
}

/// Result of fetching a path.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub enum RemoteContent
{
    /// The path is a regular file.
    File(RemoteFile,),
    /// The path is a directory listing.
    Directory,
}

/// Write request for [`RepositoryHost::update_file`].
#[derive(Debug, Clone, Copy,)]
pub struct FileUpdate<'a,>
{
    /// Repository-relative path.
    pub path:         &'a str,
    /// New file content.
    pub content:      &'a str,
    /// Blob sha obtained from the fetch; stale shas are rejected by the host.
    pub previous_sha: &'a str,
    /// Branch receiving the commit.
    pub branch:       &'a str,
    /// Commit message.
    pub message:      &'a str,
}

/// Open or newly created pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct PullRequestRef
{
    /// Pull request number.
    pub number: u64,
    /// Browser URL of the pull request.
    pub url:    String,
    /// Base branch name.
    pub base:   String,
    /// Head branch name.
    pub head:   String,
}

/// Creation request for [`RepositoryHost::create_pull_request`].
#[derive(Debug, Clone, Copy,)]
pub struct PullRequestDraft<'a,>
{
    /// Pull request title.
    pub title: &'a str,
    /// Pull request body.
    pub body:  &'a str,
    /// Base branch name.
    pub base:  &'a str,
    /// Head branch name.
    pub head:  &'a str,
}

/// Operations of a repository-hosting API.
///
/// Every call is a blocking round-trip from the caller's point of view; no
/// implementation retries on its own.
#[async_trait]
pub trait RepositoryHost: Send + Sync
{
    /// Returns the default branch name of `repo`.
    async fn default_branch(&self, repo: &RepoTarget,) -> Result<String, Error,>;

    /// Looks up a branch; `None` when it does not exist.
    async fn get_branch(&self, repo: &RepoTarget, name: &str,) -> Result<Option<BranchHead,>, Error,>;

    /// Creates `refs/heads/<name>` at `from_sha`.
    ///
    /// Returns [`BranchStatus::AlreadyExisted`] when the ref appeared in the
    /// meantime.
    async fn create_branch(
        &self,
        repo: &RepoTarget,
        name: &str,
        from_sha: &str,
    ) -> Result<BranchStatus, Error,>;

    /// Fetches a path on `git_ref`.
    async fn fetch_file(
        &self,
        repo: &RepoTarget,
        path: &str,
        git_ref: &str,
    ) -> Result<RemoteContent, Error,>;

    /// Commits new file content; returns the resulting commit sha.
    async fn update_file(&self, repo: &RepoTarget, update: FileUpdate<'_,>,) -> Result<String, Error,>;

    /// Lists open pull requests targeting `base`.
    async fn list_open_pull_requests(
        &self,
        repo: &RepoTarget,
        base: &str,
    ) -> Result<Vec<PullRequestRef,>, Error,>;

    /// Opens a pull request.
    async fn create_pull_request(
        &self,
        repo: &RepoTarget,
        draft: PullRequestDraft<'_,>,
    ) -> Result<PullRequestRef, Error,>;

    /// Returns the tag of the latest release of `repo`.
    async fn latest_release(&self, repo: &RepoTarget,) -> Result<String, Error,>;

    /// Reports whether a release tagged `tag` exists.
    async fn release_exists(&self, repo: &RepoTarget, tag: &str,) -> Result<bool, Error,>;

    /// Ensures `name` exists, branching from the head of `base` when absent.
    async fn get_or_create_branch(
        &self,
        repo: &RepoTarget,
        name: &str,
        base: &str,
    ) -> Result<BranchStatus, Error,>
    {
        if self.get_branch(repo, name,).await?.is_some() {
            return Ok(BranchStatus::AlreadyExisted,);
        }

        let source = self.get_branch(repo, base,).await?.ok_or_else(|| {
            Error::service(format!("base branch {base} not found in {}", repo.full_name()),)
        },)?;

        self.create_branch(repo, name, &source.sha,).await
    }
}
