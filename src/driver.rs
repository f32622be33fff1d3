// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Per-repository update driver.
//!
//! A run ensures the working branch exists, then applies the manifest,
//! descriptor and requirement steps in that order. Every step fetches its file
//! from the working branch, patches it, and commits only when the content
//! changed. The first commit of a run opens (or adopts) the pull request; later
//! commits reuse it.

use serde::Serialize;
use serde_yaml::Value;
use tracing::{debug, info};

use crate::{
    branch::make_branch_name,
    descriptor::{DescriptorPatcher, SERVERLESS_YML_PATH},
    edit::FileEdit,
    error::Error,
    host::{BranchStatus, FileUpdate, PullRequestDraft, PullRequestRef, RemoteContent, RepositoryHost},
    manifest::{DependencyMapping, PACKAGE_JSON_PATH, edit_manifest},
    requirements::{REQUIREMENTS_PATH, edit_requirements},
    target::RepoTarget,
};

/// Title of pull requests opened by the updater.
pub const PULL_REQUEST_TITLE: &str = "CLI- dependency version bump";

/// Updates applied to every repository of a batch.
#[derive(Debug, Clone, Default, Serialize,)]
pub struct UpdateRequest
{
    /// `package.json` dependencies to set.
    pub dependencies:       DependencyMapping,
    /// Skip dependencies the manifest does not already declare.
    pub replace_only:       bool,
    /// Partial `serverless.yml` document merged into the descriptor.
    pub descriptor_changes: Value,
    /// Merge policy and layout for descriptor writes.
    pub descriptor:         DescriptorPatcher,
    /// Resolved `socless_python` release tag.
    pub socless_python:     Option<String,>,
    /// Existing branch to reuse; a fresh branch is generated when absent.
    pub head_branch:        Option<String,>,
    /// Label embedded in generated branch names.
    pub branch_label:       Option<String,>,
}

impl UpdateRequest
{
    /// Reports whether the descriptor step has anything to merge.
    pub fn has_descriptor_changes(&self,) -> bool
    {
        matches!(&self.descriptor_changes, Value::Mapping(changes) if !changes.is_empty())
    }

    /// Returns the requirement release when one was requested.
    pub fn release(&self,) -> Option<&str,>
    {
        self.socless_python.as_deref().map(str::trim,).filter(|release| !release.is_empty(),)
    }

    /// Reports whether no step would run.
    pub fn is_empty(&self,) -> bool
    {
        self.dependencies.is_empty() && !self.has_descriptor_changes() && self.release().is_none()
    }

    fn branch_name(&self,) -> String
    {
        self.head_branch
            .as_deref()
            .map(str::trim,)
            .filter(|branch| !branch.is_empty(),)
            .map_or_else(|| make_branch_name(self.branch_label.as_deref(),), str::to_owned,)
    }
}

/// File touched by a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize,)]
#[serde(rename_all = "snake_case")]
pub enum StepKind
{
    /// `package.json` dependency bump.
    Manifest,
    /// `serverless.yml` merge.
    Descriptor,
    /// `functions/requirements.txt` release pin.
    Requirement,
}

impl StepKind
{
    /// Repository-relative path of the file the step edits.
    pub const fn path(self,) -> &'static str
    {
        match self {
            Self::Manifest => PACKAGE_JSON_PATH,
            Self::Descriptor => SERVERLESS_YML_PATH,
            Self::Requirement => REQUIREMENTS_PATH,
        }
    }
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct StepOutcome
{
    /// Step that produced this outcome.
    pub step:    StepKind,
    /// Repository-relative path of the edited file.
    pub path:    String,
    /// Whether the file content changed.
    pub changed: bool,
    /// Commit sha when the file was written.
    pub commit:  Option<String,>,
    /// Commit message, empty for unchanged files.
    pub message: String,
}

/// Result of updating one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct RepoUpdateOutcome
{
    /// Canonical repository URL.
    pub repository:    String,
    /// Working branch the steps committed to.
    pub branch:        String,
    /// Whether the working branch was created by this run.
    pub branch_status: BranchStatus,
    /// `true` when at least one step committed a change.
    pub updated:       bool,
    /// Pull request opened or reused for the working branch.
    pub pull_request:  Option<PullRequestRef,>,
    /// Outcomes of the steps that ran, in order.
    pub steps:         Vec<StepOutcome,>,
}

/// Applies an [`UpdateRequest`] to single repositories.
#[derive(Debug, Clone, Copy, Default,)]
pub struct RepoUpdater;

impl RepoUpdater
{
    /// Runs every requested step against `target`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotAFile`] when a step path is a directory.
    /// - [`Error::MissingFileContent`] when a fetched file is empty.
    /// - [`Error::TypeConflict`], [`Error::Json`], [`Error::Parse`] or
    ///   [`Error::Decode`] from the patchers.
    /// - [`Error::Service`] for host failures.
    pub async fn update<H,>(
        &self,
        host: &H,
        target: &RepoTarget,
        request: &UpdateRequest,
    ) -> Result<RepoUpdateOutcome, Error,>
    where
        H: RepositoryHost + ?Sized,
    {
        let base = host.default_branch(target,).await?;
        let branch = request.branch_name();
        let branch_status = host.get_or_create_branch(target, &branch, &base,).await?;
        match branch_status {
            BranchStatus::Created => info!("Created branch {branch} on {target} from {base}"),
            BranchStatus::AlreadyExisted => info!("Using existing branch {branch} on {target}"),
        }

        let mut run = Run {
            host,
            target,
            base,
            branch,
            pull_request: None,
        };
        let mut steps = Vec::with_capacity(3,);

        if !request.dependencies.is_empty() {
            steps.push(
                run.apply(StepKind::Manifest, |text| {
                    edit_manifest(text, &request.dependencies, request.replace_only,)
                },)
                .await?,
            );
        }

        if request.has_descriptor_changes() {
            steps.push(
                run.apply(StepKind::Descriptor, |text| {
                    request.descriptor.edit(text, &request.descriptor_changes,)
                },)
                .await?,
            );
        }

        if let Some(release,) = request.release() {
            steps.push(
                run.apply(StepKind::Requirement, |text| edit_requirements(text, release,),).await?,
            );
        }

        let updated = steps.iter().any(|step| step.changed,);
        if !updated {
            info!("No changes needed for {target}");
        }

        Ok(RepoUpdateOutcome {
            repository: target.url(),
            branch: run.branch,
            branch_status,
            updated,
            pull_request: run.pull_request,
            steps,
        },)
    }
}

struct Run<'a, H: ?Sized,>
{
    host:         &'a H,
    target:       &'a RepoTarget,
    base:         String,
    branch:       String,
    pull_request: Option<PullRequestRef,>,
}

impl<H,> Run<'_, H,>
where
    H: RepositoryHost + ?Sized,
{
    async fn apply<F,>(&mut self, step: StepKind, edit: F,) -> Result<StepOutcome, Error,>
    where
        F: FnOnce(&str,) -> Result<FileEdit, Error,>,
    {
        let path = step.path();
        let file = match self.host.fetch_file(self.target, path, &self.branch,).await? {
            RemoteContent::File(file,) => file,
            RemoteContent::Directory => {
                return Err(Error::NotAFile {
                    path:   path.to_owned(),
                    branch: self.branch.clone(),
                },);
            }
        };

        let content = file.content.as_deref().filter(|content| !content.is_empty(),).ok_or_else(|| {
            Error::MissingFileContent {
                path:   path.to_owned(),
                branch: self.branch.clone(),
            }
        },)?;

        let edit = edit(content,)?;
        if !edit.changed {
            debug!("{path} on {} is already up to date", self.target);
            return Ok(StepOutcome {
                step,
                path: path.to_owned(),
                changed: false,
                commit: None,
                message: edit.commit_message,
            },);
        }

        let commit = self
            .host
            .update_file(self.target, FileUpdate {
                path,
                content: &edit.new_content,
                previous_sha: &file.sha,
                branch: &self.branch,
                message: &edit.commit_message,
            },)
            .await?;
        info!("Committed {path} to {} on {}: {}", self.branch, self.target, edit.commit_message);

        self.ensure_pull_request(&edit.commit_message,).await?;

        Ok(StepOutcome {
            step,
            path: path.to_owned(),
            changed: true,
            commit: Some(commit,),
            message: edit.commit_message,
        },)
    }

    async fn ensure_pull_request(&mut self, body: &str,) -> Result<(), Error,>
    {
        if self.pull_request.is_some() {
            return Ok((),);
        }

        let existing = self
            .host
            .list_open_pull_requests(self.target, &self.base,)
            .await?
            .into_iter()
            .find(|pull| pull.base == self.base && pull.head == self.branch,);

        let pull = match existing {
            Some(pull,) => {
                info!("PR already exists: {}", pull.number);
                pull
            }
            None => {
                let pull = self
                    .host
                    .create_pull_request(self.target, PullRequestDraft {
                        title: PULL_REQUEST_TITLE,
                        body,
                        base: &self.base,
                        head: &self.branch,
                    },)
                    .await?;
                info!("New PR created: {}", pull.number);
                pull
            }
        };

        self.pull_request = Some(pull,);
        Ok((),)
    }
}
