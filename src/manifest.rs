// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Dependency patcher for `package.json` manifests.
//!
//! Only the top-level `dependencies` object is touched. Key order of the
//! manifest is preserved and the serialized output keeps the conventional
//! two-space indentation used by npm.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::info;

use crate::{edit::FileEdit, error::Error};

/// Repository-relative location of the manifest.
pub const PACKAGE_JSON_PATH: &str = "package.json";

const DEPENDENCIES_KEY: &str = "dependencies";

/// Mapping from package name to version or reference specifier.
pub type DependencyMapping = BTreeMap<String, String,>;

/// Outcome of [`patch_manifest`].
#[derive(Debug, Clone, PartialEq,)]
pub struct ManifestPatch
{
    /// Patched copy of the manifest.
    pub document: Value,
    /// Dependencies written to the manifest as `(name, version)` pairs.
    pub applied:  Vec<(String, String,),>,
    /// Dependencies skipped because they were absent and replace-only was
    /// requested.
    pub skipped:  Vec<String,>,
}

impl ManifestPatch
{
    /// Returns `true` when the patched manifest differs from `original`.
    pub fn differs_from(&self, original: &Value,) -> bool
    {
        &self.document != original
    }
}

/// Applies dependency updates to a copy of `document`.
///
/// Absent dependencies are skipped when `replace_only` is `true` and inserted
/// otherwise; present dependencies are always overwritten.
///
/// # Errors
///
/// Returns [`Error::Validation`] when the manifest root is not an object or
/// its `dependencies` entry is not an object.
///
/// # Examples
///
/// ```
/// use socless_repo_updater::{DependencyMapping, patch_manifest};
///
/// let manifest = serde_json::json!({"dependencies": {"serverless": "1.0.0"}});
/// let updates = DependencyMapping::from([
///     ("serverless".to_owned(), "9.9.9".to_owned(),),
///     ("newdep".to_owned(), "0.1.0".to_owned(),),
/// ]);
/// let patch = patch_manifest(&manifest, &updates, true,)?;
/// assert_eq!(patch.document, serde_json::json!({"dependencies": {"serverless": "9.9.9"}}));
/// assert_eq!(patch.skipped, vec!["newdep".to_owned()]);
/// # Ok::<(), socless_repo_updater::Error>(())
/// ```
pub fn patch_manifest(
    document: &Value,
    updates: &DependencyMapping,
    replace_only: bool,
) -> Result<ManifestPatch, Error,>
{
    let mut patched = document.clone();
    let root = patched
        .as_object_mut()
        .ok_or_else(|| Error::validation("package.json root must be an object",),)?;

    let mut applied = Vec::with_capacity(updates.len(),);
    let mut skipped = Vec::new();

    if !replace_only && !root.contains_key(DEPENDENCIES_KEY,) {
        root.insert(DEPENDENCIES_KEY.to_owned(), Value::Object(Map::new(),),);
    }

    let dependencies = match root.get_mut(DEPENDENCIES_KEY,) {
        Some(Value::Object(map,),) => Some(map,),
        Some(_,) => {
            return Err(Error::validation("package.json dependencies must be an object",),);
        }
        None => None,
    };

    match dependencies {
        Some(dependencies,) => {
            for (name, version) in updates {
                if replace_only && !dependencies.contains_key(name,) {
                    info!(
                        "Skipping {name}: not in dependencies and replace-only updates were requested"
                    );
                    skipped.push(name.clone(),);
                    continue;
                }
                dependencies.insert(name.clone(), Value::String(version.clone(),),);
                applied.push((name.clone(), version.clone(),),);
            }
        }
        None => {
            info!("Skipping all dependencies: package.json declares none");
            skipped.extend(updates.keys().cloned(),);
        }
    }

    Ok(ManifestPatch {
        document: patched,
        applied,
        skipped,
    },)
}

/// Patches manifest text and reports whether a commit is needed.
///
/// The comparison is semantic: formatting differences in the fetched file do
/// not count as a change, and an unchanged manifest is never re-rendered.
///
/// # Errors
///
/// Propagates [`Error::Json`] for undecodable manifests and
/// [`Error::Validation`] from [`patch_manifest`].
pub fn edit_manifest(
    text: &str,
    updates: &DependencyMapping,
    replace_only: bool,
) -> Result<FileEdit, Error,>
{
    let original = parse_manifest(text,)?;
    let patch = patch_manifest(&original, updates, replace_only,)?;

    if !patch.differs_from(&original,) {
        return Ok(FileEdit::unchanged(PACKAGE_JSON_PATH, text,),);
    }

    let rendered = render_manifest(&patch.document, text.ends_with('\n',),)?;
    Ok(FileEdit::changed(PACKAGE_JSON_PATH, rendered, manifest_commit_message(&patch.applied,),),)
}

/// Parses manifest text.
///
/// # Errors
///
/// Returns [`Error::Json`] when the text is not valid JSON.
pub fn parse_manifest(text: &str,) -> Result<Value, Error,>
{
    Ok(serde_json::from_str(text,)?,)
}

/// Serializes a manifest with two-space indentation.
///
/// A trailing newline is emitted when `trailing_newline` is `true`, so the
/// original file convention survives the round trip.
///
/// # Errors
///
/// Returns [`Error::Json`] when serialization fails.
pub fn render_manifest(document: &Value, trailing_newline: bool,) -> Result<String, Error,>
{
    let mut rendered = serde_json::to_string_pretty(document,)?;
    if trailing_newline {
        rendered.push('\n',);
    }
    Ok(rendered,)
}

/// Builds the commit message naming every applied dependency.
pub fn manifest_commit_message(applied: &[(String, String,)],) -> String
{
    let changes: Vec<String,> =
        applied.iter().map(|(name, version,)| format!("{name} to {version}"),).collect();
    format!("update {PACKAGE_JSON_PATH} dependencies: {}", changes.join(", "))
}
