// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Release validation for the pinned `socless_python` requirement.
//!
//! Runs once before the batch so an unusable version aborts the run before
//! any repository is touched.

use tracing::{debug, info};

use crate::{
    error::Error,
    host::RepositoryHost,
    requirements::SOCLESS_PYTHON_REPOSITORY,
    target::RepoTarget,
};

/// Sentinel resolving to the most recent upstream release.
pub const LATEST_RELEASE: &str = "latest";

/// Repository publishing `socless_python` releases.
pub fn socless_python_target() -> RepoTarget
{
    let (owner, name,) =
        SOCLESS_PYTHON_REPOSITORY.split_once('/',).unwrap_or(("twilio-labs", "socless_python",),);
    RepoTarget::new(owner, name,)
}

/// Resolves a requested release into a concrete, existing tag.
///
/// `latest` resolves to the newest release tag; any other value must name an
/// existing release.
///
/// # Errors
///
/// - [`Error::NoVersionSpecified`] when `requested` is blank.
/// - [`Error::ReleaseNotFound`] when the tag does not exist.
/// - [`Error::Service`] when the host lookup fails.
pub async fn resolve_release<H,>(host: &H, requested: &str,) -> Result<String, Error,>
where
    H: RepositoryHost + ?Sized,
{
    let requested = requested.trim();
    let repository = socless_python_target();

    if requested.is_empty() {
        return Err(Error::NoVersionSpecified {
            package: repository.name,
        },);
    }

    if requested == LATEST_RELEASE {
        let tag = host.latest_release(&repository,).await?;
        info!("Resolved latest {} release to {tag}", repository.full_name());
        return Ok(tag,);
    }

    if !host.release_exists(&repository, requested,).await? {
        return Err(Error::ReleaseNotFound {
            tag:        requested.to_owned(),
            repository: repository.full_name(),
        },);
    }

    debug!("Release {requested} exists for {}", repository.full_name());
    Ok(requested.to_owned(),)
}
