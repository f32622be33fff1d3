// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Repository target resolution.
//!
//! Users name repositories as `owner/name`, as a bare `name` qualified by the
//! plan's organization, or as a full `https://host/owner/name[.git]` URL.
//! Every form is normalized into a [`RepoTarget`] whose canonical URL drives
//! de-duplication, ordering and host selection.

use std::fmt;

use serde::Serialize;
use url::Url;

use crate::error::Error;

/// Host assumed for targets given without a URL.
pub const DEFAULT_HOST: &str = "github.com";

/// Canonical repository coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize,)]
pub struct RepoTarget
{
    /// Lowercase host name, e.g. `github.com`.
    pub host:  String,
    /// Owning user or organization.
    pub owner: String,
    /// Repository name without a `.git` suffix.
    pub name:  String,
}

impl RepoTarget
{
    /// Creates a target on [`DEFAULT_HOST`].
    pub fn new(owner: impl Into<String,>, name: impl Into<String,>,) -> Self
    {
        Self {
            host:  DEFAULT_HOST.to_owned(),
            owner: owner.into(),
            name:  name.into(),
        }
    }

    /// Parses user input into a target.
    ///
    /// `organization` qualifies bare repository names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for blank input, malformed URLs, paths
    /// without both owner and name, and bare names when no organization is
    /// configured.
    ///
    /// # Examples
    ///
    /// ```
    /// use socless_repo_updater::RepoTarget;
    ///
    /// let target = RepoTarget::parse("https://ghe.example.com/soc/alerts.git", None,)?;
    /// assert_eq!(target.host, "ghe.example.com");
    /// assert_eq!(target.full_name(), "soc/alerts");
    ///
    /// let bare = RepoTarget::parse("alerts", Some("soc",),)?;
    /// assert_eq!(bare.url(), "https://github.com/soc/alerts");
    /// # Ok::<(), socless_repo_updater::Error>(())
    /// ```
    pub fn parse(input: &str, organization: Option<&str,>,) -> Result<Self, Error,>
    {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("repository names cannot be empty strings",),);
        }

        if trimmed.contains("://",) {
            return Self::parse_url(trimmed,);
        }

        let segments: Vec<&str,> = trimmed.split('/',).collect();
        match segments.as_slice() {
            [name] => {
                let owner = organization.map(str::trim).filter(|org| !org.is_empty(),).ok_or_else(
                    || {
                        Error::validation(format!(
                            "repository '{trimmed}' has no owner and no organization is configured"
                        ),)
                    },
                )?;
                Self::from_parts(DEFAULT_HOST, owner, name, trimmed,)
            }
            [owner, name] => Self::from_parts(DEFAULT_HOST, owner, name, trimmed,),
            _ => Err(Error::validation(format!(
                "repository '{trimmed}' must be given as owner/name, name, or a URL"
            ),),),
        }
    }

    fn parse_url(input: &str,) -> Result<Self, Error,>
    {
        let url = Url::parse(input,)
            .map_err(|error| Error::validation(format!("invalid repository URL '{input}': {error}"),),)?;

        if !matches!(url.scheme(), "https" | "http") {
            return Err(Error::validation(format!(
                "repository URL '{input}' must use http or https"
            ),),);
        }

        let host = url
            .host_str()
            .ok_or_else(|| Error::validation(format!("repository URL '{input}' has no host"),),)?;

        let segments: Vec<&str,> = url
            .path_segments()
            .map(|segments| segments.filter(|segment| !segment.is_empty(),).collect(),)
            .unwrap_or_default();

        match segments.as_slice() {
            [owner, name, ..] => Self::from_parts(host, owner, name, input,),
            _ => Err(Error::validation(format!(
                "repository URL '{input}' must include owner and repository name"
            ),),),
        }
    }

    fn from_parts(host: &str, owner: &str, name: &str, input: &str,) -> Result<Self, Error,>
    {
        let owner = owner.trim();
        let name = name.trim();
        let name = name.strip_suffix(".git",).unwrap_or(name,);

        if owner.is_empty() || name.is_empty() {
            return Err(Error::validation(format!(
                "repository '{input}' must include owner and repository name"
            ),),);
        }

        if owner.contains(char::is_whitespace,) || name.contains(char::is_whitespace,) {
            return Err(Error::validation(format!("repository '{input}' contains whitespace"),),);
        }

        Ok(Self {
            host:  host.to_ascii_lowercase(),
            owner: owner.to_owned(),
            name:  name.to_owned(),
        },)
    }

    /// Returns `owner/name`.
    pub fn full_name(&self,) -> String
    {
        format!("{}/{}", self.owner, self.name)
    }

    /// Returns the canonical browser URL.
    pub fn url(&self,) -> String
    {
        format!("https://{}/{}/{}", self.host, self.owner, self.name)
    }

    /// Reports whether the target lives on `domain`.
    ///
    /// The domain may be given bare or with a scheme and trailing slash.
    pub fn is_hosted_on(&self, domain: &str,) -> bool
    {
        let domain = domain.trim();
        let domain = domain
            .strip_prefix("https://",)
            .or_else(|| domain.strip_prefix("http://",),)
            .unwrap_or(domain,)
            .trim_end_matches('/',);
        !domain.is_empty() && self.host.eq_ignore_ascii_case(domain,)
    }
}

impl fmt::Display for RepoTarget
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        write!(f, "{}", self.url())
    }
}

/// Parses every input, then de-duplicates and sorts by canonical URL.
///
/// # Errors
///
/// Propagates the first [`RepoTarget::parse`] failure.
pub fn resolve_targets<I, S,>(inputs: I, organization: Option<&str,>,) -> Result<Vec<RepoTarget,>, Error,>
where
    I: IntoIterator<Item = S,>,
    S: AsRef<str,>,
{
    let mut targets = inputs
        .into_iter()
        .map(|input| RepoTarget::parse(input.as_ref(), organization,),)
        .collect::<Result<Vec<_,>, _,>>()?;

    targets.sort_by_cached_key(RepoTarget::url,);
    targets.dedup();
    Ok(targets,)
}
