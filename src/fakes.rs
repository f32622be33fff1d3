// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! In-memory [`RepositoryHost`] that records every call.
//!
//! Branches own a full copy of their files so edits on a working branch never
//! leak into the default branch. Blob shas are checked on update the same way
//! the real API rejects stale writes.

use std::{
    collections::{BTreeMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;

use crate::{
    error::Error,
    host::{
        BranchHead, BranchStatus, FileUpdate, PullRequestDraft, PullRequestRef, RemoteContent,
        RemoteFile, RepositoryHost,
    },
    target::RepoTarget,
};

/// Recorded host interaction.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub(crate) enum Call
{
    DefaultBranch(String,),
    GetBranch(String, String,),
    CreateBranch
    {
        repo: String, name: String, from_sha: String
    },
    FetchFile
    {
        repo: String, path: String, git_ref: String
    },
    UpdateFile
    {
        repo: String, path: String, branch: String, message: String
    },
    ListPulls
    {
        repo: String, base: String
    },
    CreatePull
    {
        repo: String, title: String, body: String, head: String
    },
    LatestRelease(String,),
    ReleaseExists(String, String,),
}

#[derive(Debug, Clone,)]
enum Entry
{
    File
    {
        content: Option<String,>, sha: String
    },
    Directory,
}

#[derive(Debug, Default,)]
struct Branch
{
    sha:   String,
    files: BTreeMap<String, Entry,>,
}

#[derive(Debug, Default,)]
struct Repo
{
    default_branch: String,
    branches:       BTreeMap<String, Branch,>,
    pulls:          Vec<PullRequestRef,>,
    releases:       Vec<String,>,
}

#[derive(Debug, Default,)]
struct State
{
    repos:   BTreeMap<String, Repo,>,
    failing: HashSet<String,>,
    calls:   Vec<Call,>,
    counter: u64,
}

impl State
{
    fn next_id(&mut self, prefix: &str,) -> String
    {
        self.counter += 1;
        format!("{prefix}-{}", self.counter)
    }

    fn repo(&self, repo: &str,) -> Result<&Repo, Error,>
    {
        if self.failing.contains(repo,) {
            return Err(Error::service(format!("{repo}: simulated outage"),),);
        }
        self.repos.get(repo,).ok_or_else(|| Error::service(format!("{repo}: Not Found"),),)
    }

    fn repo_mut(&mut self, repo: &str,) -> Result<&mut Repo, Error,>
    {
        if self.failing.contains(repo,) {
            return Err(Error::service(format!("{repo}: simulated outage"),),);
        }
        self.repos.get_mut(repo,).ok_or_else(|| Error::service(format!("{repo}: Not Found"),),)
    }
}

#[derive(Debug, Default,)]
pub(crate) struct FakeHost
{
    state: Mutex<State,>,
}

impl FakeHost
{
    pub(crate) fn new() -> Self
    {
        Self::default()
    }

    fn lock(&self,) -> MutexGuard<'_, State,>
    {
        self.state.lock().expect("fake host lock poisoned",)
    }

    /// Registers `full_name` with an empty default branch.
    pub(crate) fn with_repo(self, full_name: &str, default_branch: &str,) -> Self
    {
        {
            let mut state = self.lock();
            let sha = state.next_id("commit",);
            let repo = state.repos.entry(full_name.to_owned(),).or_default();
            repo.default_branch = default_branch.to_owned();
            repo.branches.insert(default_branch.to_owned(), Branch {
                sha,
                files: BTreeMap::new(),
            },);
        }
        self
    }

    pub(crate) fn with_file(self, full_name: &str, branch: &str, path: &str, content: &str,) -> Self
    {
        self.insert_entry(full_name, branch, path, Some(content.to_owned(),),);
        self
    }

    pub(crate) fn with_empty_file(self, full_name: &str, branch: &str, path: &str,) -> Self
    {
        self.insert_entry(full_name, branch, path, None,);
        self
    }

    pub(crate) fn with_directory(self, full_name: &str, branch: &str, path: &str,) -> Self
    {
        {
            let mut state = self.lock();
            state
                .repos
                .entry(full_name.to_owned(),)
                .or_default()
                .branches
                .entry(branch.to_owned(),)
                .or_default()
                .files
                .insert(path.to_owned(), Entry::Directory,);
        }
        self
    }

    pub(crate) fn with_pull(self, full_name: &str, pull: PullRequestRef,) -> Self
    {
        self.lock().repos.entry(full_name.to_owned(),).or_default().pulls.push(pull,);
        self
    }

    /// Adds a release; the most recently added one is the latest.
    pub(crate) fn with_release(self, full_name: &str, tag: &str,) -> Self
    {
        self.lock().repos.entry(full_name.to_owned(),).or_default().releases.push(tag.to_owned(),);
        self
    }

    /// Makes every call against `full_name` fail.
    pub(crate) fn failing(self, full_name: &str,) -> Self
    {
        self.lock().failing.insert(full_name.to_owned(),);
        self
    }

    fn insert_entry(&self, full_name: &str, branch: &str, path: &str, content: Option<String,>,)
    {
        let mut state = self.lock();
        let sha = state.next_id("blob",);
        state
            .repos
            .entry(full_name.to_owned(),)
            .or_default()
            .branches
            .entry(branch.to_owned(),)
            .or_default()
            .files
            .insert(path.to_owned(), Entry::File {
                content,
                sha,
            },);
    }

    pub(crate) fn calls(&self,) -> Vec<Call,>
    {
        self.lock().calls.clone()
    }

    pub(crate) fn writes(&self,) -> usize
    {
        self.lock().calls.iter().filter(|call| matches!(call, Call::UpdateFile { .. }),).count()
    }

    pub(crate) fn created_pulls(&self,) -> usize
    {
        self.lock().calls.iter().filter(|call| matches!(call, Call::CreatePull { .. }),).count()
    }

    pub(crate) fn file(&self, full_name: &str, branch: &str, path: &str,) -> Option<String,>
    {
        let state = self.lock();
        match state.repos.get(full_name,)?.branches.get(branch,)?.files.get(path,)? {
            Entry::File {
                content, ..
            } => content.clone(),
            Entry::Directory => None,
        }
    }

    pub(crate) fn has_branch(&self, full_name: &str, branch: &str,) -> bool
    {
        self.lock().repos.get(full_name,).is_some_and(|repo| repo.branches.contains_key(branch,),)
    }

    fn record(&self, call: Call,)
    {
        self.lock().calls.push(call,);
    }
}

#[async_trait]
impl RepositoryHost for FakeHost
{
    async fn default_branch(&self, repo: &RepoTarget,) -> Result<String, Error,>
    {
        let name = repo.full_name();
        self.record(Call::DefaultBranch(name.clone(),),);
        Ok(self.lock().repo(&name,)?.default_branch.clone(),)
    }

    async fn get_branch(&self, repo: &RepoTarget, branch: &str,) -> Result<Option<BranchHead,>, Error,>
    {
        let name = repo.full_name();
        self.record(Call::GetBranch(name.clone(), branch.to_owned(),),);
        let state = self.lock();
        Ok(state.repo(&name,)?.branches.get(branch,).map(|head| BranchHead {
            name: branch.to_owned(),
            sha:  head.sha.clone(),
        },),)
    }

    async fn create_branch(
        &self,
        repo: &RepoTarget,
        branch: &str,
        from_sha: &str,
    ) -> Result<BranchStatus, Error,>
    {
        let name = repo.full_name();
        self.record(Call::CreateBranch {
            repo:     name.clone(),
            name:     branch.to_owned(),
            from_sha: from_sha.to_owned(),
        },);

        let mut state = self.lock();
        let entry = state.repo_mut(&name,)?;
        if entry.branches.contains_key(branch,) {
            return Ok(BranchStatus::AlreadyExisted,);
        }

        let files = entry
            .branches
            .values()
            .find(|head| head.sha == from_sha,)
            .map(|head| head.files.clone(),)
            .ok_or_else(|| Error::service(format!("{name}: unknown commit {from_sha}"),),)?;

        entry.branches.insert(branch.to_owned(), Branch {
            sha: from_sha.to_owned(),
            files,
        },);
        Ok(BranchStatus::Created,)
    }

    async fn fetch_file(
        &self,
        repo: &RepoTarget,
        path: &str,
        git_ref: &str,
    ) -> Result<RemoteContent, Error,>
    {
        let name = repo.full_name();
        self.record(Call::FetchFile {
            repo:    name.clone(),
            path:    path.to_owned(),
            git_ref: git_ref.to_owned(),
        },);

        let state = self.lock();
        let branch = state
            .repo(&name,)?
            .branches
            .get(git_ref,)
            .ok_or_else(|| Error::service(format!("No commit found for the ref {git_ref}"),),)?;

        match branch.files.get(path,) {
            Some(Entry::File {
                content,
                sha,
            },) => Ok(RemoteContent::File(RemoteFile {
                path:    path.to_owned(),
                sha:     sha.clone(),
                content: content.clone(),
            },),),
            Some(Entry::Directory,) => Ok(RemoteContent::Directory,),
            None => Err(Error::service(format!("{name}: {path} Not Found"),),),
        }
    }

    async fn update_file(&self, repo: &RepoTarget, update: FileUpdate<'_,>,) -> Result<String, Error,>
    {
        let name = repo.full_name();
        self.record(Call::UpdateFile {
            repo:    name.clone(),
            path:    update.path.to_owned(),
            branch:  update.branch.to_owned(),
            message: update.message.to_owned(),
        },);

        let mut state = self.lock();
        let blob = state.next_id("blob",);
        let commit = state.next_id("commit",);
        let branch = state
            .repo_mut(&name,)?
            .branches
            .get_mut(update.branch,)
            .ok_or_else(|| Error::service(format!("branch {} not found", update.branch),),)?;

        match branch.files.get(update.path,) {
            Some(Entry::File {
                sha, ..
            },) if sha == update.previous_sha => {}
            _ => return Err(Error::service(format!("{}: sha does not match", update.path),),),
        }

        branch.files.insert(update.path.to_owned(), Entry::File {
            content: Some(update.content.to_owned(),),
            sha:     blob,
        },);
        branch.sha = commit.clone();
        Ok(commit,)
    }

    async fn list_open_pull_requests(
        &self,
        repo: &RepoTarget,
        base: &str,
    ) -> Result<Vec<PullRequestRef,>, Error,>
    {
        let name = repo.full_name();
        self.record(Call::ListPulls {
            repo: name.clone(),
            base: base.to_owned(),
        },);
        let state = self.lock();
        Ok(state.repo(&name,)?.pulls.iter().filter(|pull| pull.base == base,).cloned().collect(),)
    }

    async fn create_pull_request(
        &self,
        repo: &RepoTarget,
        draft: PullRequestDraft<'_,>,
    ) -> Result<PullRequestRef, Error,>
    {
        let name = repo.full_name();
        self.record(Call::CreatePull {
            repo:  name.clone(),
            title: draft.title.to_owned(),
            body:  draft.body.to_owned(),
            head:  draft.head.to_owned(),
        },);

        let mut state = self.lock();
        let entry = state.repo_mut(&name,)?;
        let number = entry.pulls.len() as u64 + 1;
        let pull = PullRequestRef {
            number,
            url: format!("{}/pull/{number}", repo.url()),
            base: draft.base.to_owned(),
            head: draft.head.to_owned(),
        };
        entry.pulls.push(pull.clone(),);
        Ok(pull,)
    }

    async fn latest_release(&self, repo: &RepoTarget,) -> Result<String, Error,>
    {
        let name = repo.full_name();
        self.record(Call::LatestRelease(name.clone(),),);
        let state = self.lock();
        state
            .repo(&name,)?
            .releases
            .last()
            .cloned()
            .ok_or_else(|| Error::service(format!("{name} has no releases"),),)
    }

    async fn release_exists(&self, repo: &RepoTarget, tag: &str,) -> Result<bool, Error,>
    {
        let name = repo.full_name();
        self.record(Call::ReleaseExists(name.clone(), tag.to_owned(),),);
        let state = self.lock();
        Ok(state.repo(&name,)?.releases.iter().any(|release| release == tag,),)
    }
}
