// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Batch dependency bumps for SOCless repositories.
//!
//! The library patches `package.json`, `serverless.yml` and
//! `functions/requirements.txt` on a working branch of every repository in a
//! plan and opens (or reuses) one pull request per repository. The patchers
//! are pure functions over file content; all remote access goes through the
//! [`RepositoryHost`] trait so the update algorithm can run against GitHub,
//! GitHub Enterprise or an in-memory host.

pub mod branch;
mod config;
pub mod descriptor;
pub mod driver;
mod edit;
mod error;
#[cfg(test)]
mod fakes;
pub mod github;
pub mod host;
pub mod manifest;
pub mod merge;
pub mod orchestrator;
pub mod release;
pub mod requirements;
mod splice;
pub mod target;

pub use branch::make_branch_name;
pub use config::{
    DescriptorSection, ManifestSection, PlanConfig, UpdatePlan, load_plan, normalize_plan,
    parse_plan,
};
pub use descriptor::{DescriptorPatcher, YamlLayout, descriptors_equal};
pub use driver::{RepoUpdateOutcome, RepoUpdater, StepKind, StepOutcome, UpdateRequest};
pub use edit::FileEdit;
pub use error::{Error, io_error};
pub use github::GitHubHost;
pub use host::{BranchStatus, PullRequestRef, RemoteContent, RepositoryHost};
pub use manifest::{DependencyMapping, edit_manifest, patch_manifest};
pub use merge::{merge, merge_all};
pub use orchestrator::{BatchReport, BatchRunner, BatchSummary, HostSelector, RepoFailure};
pub use release::{LATEST_RELEASE, resolve_release};
pub use requirements::{edit_requirements, patch_requirement, requirements_equal};
pub use target::{RepoTarget, resolve_targets};
