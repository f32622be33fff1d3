// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Batch orchestration across many repositories.
//!
//! Targets are processed one at a time in canonical-URL order. A failure in
//! one repository is recorded and the batch moves on.

use std::{fmt, sync::Arc};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    driver::{RepoUpdateOutcome, RepoUpdater, UpdateRequest},
    host::RepositoryHost,
    target::RepoTarget,
};

/// Chooses the host client responsible for a target.
#[derive(Clone,)]
pub struct HostSelector
{
    public:     Arc<dyn RepositoryHost,>,
    enterprise: Option<(String, Arc<dyn RepositoryHost,>,),>,
}

impl fmt::Debug for HostSelector
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.debug_struct("HostSelector",)
            .field("enterprise_domain", &self.enterprise_domain(),)
            .finish_non_exhaustive()
    }
}

impl HostSelector
{
    /// Routes every target to `public`.
    pub fn new(public: Arc<dyn RepositoryHost,>,) -> Self
    {
        Self {
            public,
            enterprise: None,
        }
    }

    /// Routes targets hosted on `domain` to `host`.
    pub fn with_enterprise(mut self, domain: impl Into<String,>, host: Arc<dyn RepositoryHost,>,) -> Self
    {
        self.enterprise = Some((domain.into(), host,),);
        self
    }

    /// Configured enterprise domain, if any.
    pub fn enterprise_domain(&self,) -> Option<&str,>
    {
        self.enterprise.as_ref().map(|(domain, _,)| domain.as_str(),)
    }

    /// Client serving the public host.
    pub fn public(&self,) -> &dyn RepositoryHost
    {
        self.public.as_ref()
    }

    /// Returns the client for `target`.
    pub fn select(&self, target: &RepoTarget,) -> &dyn RepositoryHost
    {
        match &self.enterprise {
            Some((domain, host,),) if target.is_hosted_on(domain,) => host.as_ref(),
            _ => self.public.as_ref(),
        }
    }
}

/// Repository that could not be updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct RepoFailure
{
    /// Canonical repository URL.
    pub repository: String,
    /// Rendered error.
    pub error:      String,
}

/// Everything a batch produced.
#[derive(Debug, Clone, Default, Serialize,)]
pub struct BatchReport
{
    /// Repositories that completed, updated or not.
    pub outcomes: Vec<RepoUpdateOutcome,>,
    /// Repositories whose update returned an error.
    pub failures: Vec<RepoFailure,>,
}

/// Aggregated counts of a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct BatchSummary
{
    /// Distinct repositories processed.
    pub total:         usize,
    /// Repositories that received at least one commit.
    pub updated:       usize,
    /// Repositories that needed no change.
    pub skipped:       usize,
    /// Repositories that failed.
    pub errored:       usize,
    /// URLs of the pull requests opened or reused.
    pub pull_requests: Vec<String,>,
    /// Failure details in batch order.
    pub failures:      Vec<RepoFailure,>,
}

impl BatchReport
{
    /// Reports whether any repository failed.
    pub fn has_failures(&self,) -> bool
    {
        !self.failures.is_empty()
    }

    /// Summarizes the batch.
    pub fn summary(&self,) -> BatchSummary
    {
        let updated = self.outcomes.iter().filter(|outcome| outcome.updated,).count();
        BatchSummary {
            total: self.outcomes.len() + self.failures.len(),
            updated,
            skipped: self.outcomes.len() - updated,
            errored: self.failures.len(),
            pull_requests: self
                .outcomes
                .iter()
                .filter_map(|outcome| outcome.pull_request.as_ref(),)
                .map(|pull| pull.url.clone(),)
                .collect(),
            failures: self.failures.clone(),
        }
    }
}

/// Runs an [`UpdateRequest`] over a list of repositories.
#[derive(Debug, Clone,)]
pub struct BatchRunner
{
    selector:      HostSelector,
    updater:       RepoUpdater,
    show_progress: bool,
}

impl BatchRunner
{
    /// Creates a runner with the progress bar disabled.
    pub fn new(selector: HostSelector,) -> Self
    {
        Self {
            selector,
            updater: RepoUpdater,
            show_progress: false,
        }
    }

    /// Renders a progress bar on stderr while the batch runs.
    pub fn show_progress(mut self, enabled: bool,) -> Self
    {
        self.show_progress = enabled;
        self
    }

    /// Updates every target and collects the per-repository results.
    ///
    /// Targets are de-duplicated and sorted by canonical URL first. Errors
    /// never abort the batch; they land in [`BatchReport::failures`].
    pub async fn run(&self, targets: &[RepoTarget], request: &UpdateRequest,) -> BatchReport
    {
        let mut ordered = targets.to_vec();
        ordered.sort_by_cached_key(RepoTarget::url,);
        ordered.dedup();

        let progress = self.progress_bar(ordered.len(),);
        let mut report = BatchReport::default();

        for target in &ordered {
            progress.set_message(target.full_name(),);
            let host = self.selector.select(target,);

            match self.updater.update(host, target, request,).await {
                Ok(outcome,) => report.outcomes.push(outcome,),
                Err(error,) => {
                    warn!("Failed to update {target}: {error}");
                    report.failures.push(RepoFailure {
                        repository: target.url(),
                        error:      error.to_display_string(),
                    },);
                }
            }
            progress.inc(1,);
        }

        let summary = report.summary();
        progress.finish_with_message(format!(
            "{} updated, {} skipped, {} failed",
            summary.updated, summary.skipped, summary.errored
        ),);

        info!("Number of repos in batch: {}", summary.total);
        info!("Number of repos updated: {}", summary.updated);
        info!("Number of repos skipped: {}", summary.skipped);
        info!("Number of repos failed: {}", summary.errored);
        for url in &summary.pull_requests {
            info!("{url}");
        }

        report
    }

    fn progress_bar(&self, len: usize,) -> ProgressBar
    {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(len as u64,);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",)
            .unwrap_or_else(|_| ProgressStyle::default_bar(),);
        bar.set_style(style,);
        bar
    }
}
