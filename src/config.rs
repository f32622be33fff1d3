// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Update plan documents.
//!
//! A plan names the repositories of a batch and the updates applied to each
//! of them. [`PlanConfig`] mirrors the YAML document as written by users;
//! [`parse_plan`] validates it and produces the normalized [`UpdatePlan`]
//! consumed by the batch runner.

use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::{
    descriptor::{DescriptorPatcher, YamlLayout},
    driver::UpdateRequest,
    error::{self, Error},
    manifest::DependencyMapping,
    target::{RepoTarget, resolve_targets},
};

/// Root plan document.
///
/// # Examples
///
/// ```
/// use socless_repo_updater::PlanConfig;
///
/// let yaml = r#"
/// org: twilio-labs
/// repos:
///   - socless-slack
/// package_json:
///   dependencies:
///     serverless: 9.9.9
/// "#;
/// let config: PlanConfig = serde_yaml::from_str(yaml,).expect("valid plan",);
/// assert_eq!(config.repositories, vec!["socless-slack".to_owned()]);
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize,)]
pub struct PlanConfig
{
    /// Repositories as `owner/name`, bare names or URLs.
    #[serde(default, alias = "repos")]
    pub repositories: Vec<String,>,

    /// Owner used to qualify bare repository names.
    #[serde(default, alias = "org", alias = "owner")]
    pub organization: Option<String,>,

    /// Existing branch to commit to instead of a generated one.
    #[serde(default, alias = "branch", alias = "head-branch", alias = "headBranch")]
    pub head_branch: Option<String,>,

    /// Label embedded in generated branch names.
    #[serde(default, alias = "label", alias = "branch-label", alias = "branchLabel")]
    pub branch_label: Option<String,>,

    /// `package.json` updates.
    #[serde(default, alias = "package-json", alias = "packageJson")]
    pub package_json: Option<ManifestSection,>,

    /// `serverless.yml` updates.
    #[serde(default, alias = "serverless-yml", alias = "serverlessYml")]
    pub serverless_yml: Option<DescriptorSection,>,

    /// `socless_python` release tag or `latest`.
    #[serde(default, alias = "socless-python", alias = "soclessPython")]
    pub socless_python: Option<String,>,
}

/// `package_json` section of a plan.
#[derive(Debug, Clone, Deserialize, Serialize,)]
pub struct ManifestSection
{
    /// Dependency versions keyed by package name. Versions must be strings;
    /// unquoted YAML numbers lose digits (`1.10` reads as `1.1`).
    #[serde(default)]
    pub dependencies: BTreeMap<String, Value,>,

    /// Only bump dependencies the manifest already declares.
    #[serde(default = "default_replace_only", alias = "replace-only", alias = "replaceOnly")]
    pub replace_only: bool,
}

fn default_replace_only() -> bool
{
    true
}

/// `serverless_yml` section of a plan.
#[derive(Debug, Clone, Default, Deserialize, Serialize,)]
pub struct DescriptorSection
{
    /// Partial descriptor merged into each repository's `serverless.yml`.
    #[serde(default)]
    pub changes: Value,

    /// Introduce keys the descriptor does not already have.
    #[serde(default, alias = "add-keys", alias = "addKeys")]
    pub add_keys: bool,
}

/// Validated plan ready for execution.
#[derive(Debug, Clone, Serialize,)]
pub struct UpdatePlan
{
    /// De-duplicated targets in canonical-URL order.
    pub targets: Vec<RepoTarget,>,
    /// Updates applied to every target.
    pub request: UpdateRequest,
}

/// Loads and validates a plan from a YAML file.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read and propagates
/// [`parse_plan`] errors.
pub fn load_plan(path: &Path,) -> Result<UpdatePlan, Error,>
{
    let contents = fs::read_to_string(path,).map_err(|source| error::io_error(path, source,),)?;
    parse_plan(&contents,)
}

/// Parses and validates a plan from YAML text.
///
/// # Errors
///
/// Propagates [`Error::Parse`] when the YAML cannot be decoded and
/// [`Error::Validation`] when the plan has no repositories, no updates, an
/// unparsable repository, a dependency version that is not a string, or descriptor
/// changes that are not a mapping.
pub fn parse_plan(contents: &str,) -> Result<UpdatePlan, Error,>
{
    let config: PlanConfig = serde_yaml::from_str(contents,)?;
    normalize_plan(config,)
}

/// Validates a decoded [`PlanConfig`].
///
/// # Errors
///
/// See [`parse_plan`].
pub fn normalize_plan(config: PlanConfig,) -> Result<UpdatePlan, Error,>
{
    if config.repositories.is_empty() {
        return Err(Error::validation("plan must include at least one repository",),);
    }

    let targets = resolve_targets(&config.repositories, non_blank(config.organization.as_deref(),),)?;

    let (dependencies, replace_only,) = match &config.package_json {
        Some(section,) => (dependency_mapping(&section.dependencies,)?, section.replace_only,),
        None => (DependencyMapping::new(), default_replace_only(),),
    };

    let (descriptor_changes, add_keys,) = match config.serverless_yml {
        Some(section,) => (descriptor_changes(section.changes,)?, section.add_keys,),
        None => (Value::Null, false,),
    };

    let request = UpdateRequest {
        dependencies,
        replace_only,
        descriptor_changes,
        descriptor: DescriptorPatcher::new(YamlLayout::default(), add_keys,),
        socless_python: non_blank(config.socless_python.as_deref(),).map(str::to_owned,),
        head_branch: non_blank(config.head_branch.as_deref(),).map(str::to_owned,),
        branch_label: non_blank(config.branch_label.as_deref(),).map(str::to_owned,),
    };

    if request.is_empty() {
        return Err(Error::validation(
            "plan must request at least one update (package_json, serverless_yml or socless_python)",
        ),);
    }

    Ok(UpdatePlan {
        targets,
        request,
    },)
}

fn non_blank(value: Option<&str,>,) -> Option<&str,>
{
    value.map(str::trim,).filter(|value| !value.is_empty(),)
}

fn dependency_mapping(raw: &BTreeMap<String, Value,>,) -> Result<DependencyMapping, Error,>
{
    raw.iter()
        .map(|(name, version,)| {
            let version = match version {
                Value::String(text,) => text.trim().to_owned(),
                Value::Number(_,) | Value::Bool(_,) => {
                    return Err(Error::validation(format!(
                        "version of dependency '{name}' must be quoted, e.g. {name}: \"1.10.0\""
                    ),),);
                }
                _ => {
                    return Err(Error::validation(format!(
                        "version of dependency '{name}' must be a string"
                    ),),);
                }
            };
            if version.is_empty() {
                return Err(Error::validation(format!("version of dependency '{name}' is empty"),),);
            }
            Ok((name.clone(), version,),)
        },)
        .collect()
}

fn descriptor_changes(changes: Value,) -> Result<Value, Error,>
{
    match changes {
        Value::Null | Value::Mapping(_,) => Ok(changes,),
        _ => Err(Error::validation("serverless_yml.changes must be a mapping",),),
    }
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use tempfile::tempdir;

    use super::{load_plan, parse_plan};
    use crate::{error::Error, target::RepoTarget};

    const PLAN: &str = r#"
organization: twilio-labs
repositories:
  - socless-slack
  - https://github.com/twilio-labs/socless-jira.git
  - twilio-labs/socless-slack
branch_label: bump
package_json:
  dependencies:
    serverless: 9.9.9
    sls_apb: "git+https://github.com/twilio-labs/sls-apb.git#1.3.0"
serverless_yml:
  changes:
    plugins:
      - socless-plugin
socless_python: latest
"#;

    #[test]
    fn plan_is_normalized()
    {
        let plan = parse_plan(PLAN,).expect("plan failed",);

        assert_eq!(plan.targets, vec![
            RepoTarget::new("twilio-labs", "socless-jira"),
            RepoTarget::new("twilio-labs", "socless-slack"),
        ]);
        assert_eq!(plan.request.dependencies.get("serverless").map(String::as_str), Some("9.9.9"));
        assert!(plan.request.replace_only);
        assert!(plan.request.has_descriptor_changes());
        assert!(!plan.request.descriptor.add_keys());
        assert_eq!(plan.request.release(), Some("latest"));
        assert_eq!(plan.request.branch_label.as_deref(), Some("bump"));
        assert!(plan.request.head_branch.is_none());
    }

    #[test]
    fn aliases_are_accepted()
    {
        let plan = parse_plan(
            "repos: [soc/alerts]\nhead-branch: cli-open\npackageJson:\n  replace-only: false\n  dependencies:\n    serverless: '2.0'\n",
        )
        .expect("plan failed",);

        assert_eq!(plan.request.dependencies.get("serverless").map(String::as_str), Some("2.0"));
        assert!(!plan.request.replace_only);
        assert_eq!(plan.request.head_branch.as_deref(), Some("cli-open"));
    }

    #[test]
    fn plan_without_updates_is_rejected()
    {
        let error = parse_plan("repositories: [soc/alerts]\nsocless_python: '  '\n",)
            .expect_err("expected validation error",);
        match error {
            Error::Validation {
                message,
            } => assert!(message.contains("at least one update")),
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn plan_without_repositories_is_rejected()
    {
        let error = parse_plan("socless_python: 1.3.0\n",).expect_err("expected validation error",);
        assert!(matches!(error, Error::Validation { .. }));
    }

    #[test]
    fn bare_names_without_organization_are_rejected()
    {
        let error = parse_plan("repositories: [alerts]\nsocless_python: 1.3.0\n",)
            .expect_err("expected validation error",);
        assert!(matches!(error, Error::Validation { .. }));
    }

    #[test]
    fn non_mapping_descriptor_changes_are_rejected()
    {
        let error = parse_plan("repositories: [soc/alerts]\nserverless_yml:\n  changes: [a]\n",)
            .expect_err("expected validation error",);
        assert!(matches!(error, Error::Validation { .. }));
    }

    #[test]
    fn unquoted_numeric_versions_are_rejected()
    {
        for version in ["1.10", "2", "true"] {
            let error = parse_plan(&format!(
                "repositories: [soc/alerts]\npackage_json:\n  dependencies:\n    serverless: {version}\n"
            ),)
            .expect_err("expected validation error",);
            match error {
                Error::Validation {
                    message,
                } => assert!(message.contains("must be quoted"), "{message}"),
                other => panic!("unexpected error variant: {other:?}"),
            }
        }
    }

    #[test]
    fn quoted_versions_keep_every_digit()
    {
        let plan = parse_plan(
            "repositories: [soc/alerts]\npackage_json:\n  dependencies:\n    serverless: \"1.10\"\n",
        )
        .expect("plan failed",);
        assert_eq!(plan.request.dependencies.get("serverless").map(String::as_str), Some("1.10"));
    }

    #[test]
    fn nested_dependency_versions_are_rejected()
    {
        let error = parse_plan(
            "repositories: [soc/alerts]\npackage_json:\n  dependencies:\n    serverless: {version: 1}\n",
        )
        .expect_err("expected validation error",);
        assert!(matches!(error, Error::Validation { .. }));
    }

    #[test]
    fn load_plan_reads_file()
    {
        let temp = tempdir().expect("failed to create tempdir",);
        let path = temp.path().join("plan.yaml",);
        fs::write(&path, PLAN,).expect("failed to write plan",);

        let plan = load_plan(&path,).expect("load failed",);
        assert_eq!(plan.targets.len(), 2);
    }

    #[test]
    fn load_plan_reports_missing_file()
    {
        let temp = tempdir().expect("failed to create tempdir",);
        let path = temp.path().join("missing.yaml",);

        let error = load_plan(&path,).expect_err("expected io error",);
        match error {
            Error::Io {
                path: reported, ..
            } => assert_eq!(reported, path),
            other => panic!("unexpected error variant: {other:?}"),
        }
    }
}
