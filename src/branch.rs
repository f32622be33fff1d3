// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Working-branch naming for update runs.
//!
//! Branch names start with [`BRANCH_PREFIX`], optionally carry a slugged
//! label, and end with a random UUID so concurrent runs never collide. The
//! result is capped at [`BRANCH_NAME_LIMIT`] characters; long labels are cut
//! so that at least [`MIN_RANDOM_SUFFIX`] characters of the UUID survive.

use uuid::Uuid;

/// Prefix shared by every generated branch.
pub const BRANCH_PREFIX: &str = "cli-";

/// Maximum length of a generated branch name.
pub const BRANCH_NAME_LIMIT: usize = 39;

/// Minimum number of UUID characters kept at the end of a labeled name.
pub const MIN_RANDOM_SUFFIX: usize = 8;

const MAX_SLUG_LEN: usize = BRANCH_NAME_LIMIT - BRANCH_PREFIX.len() - 1 - MIN_RANDOM_SUFFIX;

/// Generates a fresh working-branch name.
///
/// # Examples
///
/// ```
/// use socless_repo_updater::make_branch_name;
///
/// let name = make_branch_name(Some("Bump Serverless",),);
/// assert!(name.starts_with("cli-bump-serverless-"));
/// assert!(name.len() <= 39);
/// ```
pub fn make_branch_name(label: Option<&str,>,) -> String
{
    let mut name = String::from(BRANCH_PREFIX,);
    if let Some(mut slug,) = label.and_then(slugify,) {
        if slug.len() > MAX_SLUG_LEN {
            slug.truncate(MAX_SLUG_LEN,);
            while slug.ends_with('-',) {
                slug.pop();
            }
        }
        name.push_str(&slug,);
        name.push('-',);
    }
    name.push_str(&Uuid::new_v4().to_string(),);
    name.truncate(BRANCH_NAME_LIMIT,);
    name
}

/// Lowercases ASCII alphanumerics and collapses every other run of
/// characters into a single hyphen. Returns `None` when nothing survives.
fn slugify(source: &str,) -> Option<String,>
{
    let mut slug = String::with_capacity(source.len(),);
    let mut previous_hyphen = false;

    for candidate in source.trim().chars() {
        if candidate.is_ascii_alphanumeric() {
            slug.push(candidate.to_ascii_lowercase(),);
            previous_hyphen = false;
        } else if !previous_hyphen && !slug.is_empty() {
            slug.push('-',);
            previous_hyphen = true;
        }
    }

    while slug.ends_with('-',) {
        slug.pop();
    }

    if slug.is_empty() { None } else { Some(slug,) }
}
