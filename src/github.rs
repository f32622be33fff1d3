// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! [`RepositoryHost`] implementation backed by the GitHub REST API.
//!
//! Public GitHub and GitHub Enterprise share the implementation; only the
//! base URI and credentials differ. Requests are issued once, without retry.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::Error,
    host::{
        BranchHead, BranchStatus, FileUpdate, PullRequestDraft, PullRequestRef, RemoteContent,
        RemoteFile, RepositoryHost,
    },
    target::RepoTarget,
};

/// REST endpoint of public GitHub.
pub const PUBLIC_API_URI: &str = "https://api.github.com";

/// Items requested per page from list endpoints.
const PAGE_SIZE: u8 = 100;
/// Upper bound on pages read from a single list endpoint.
const MAX_PAGES: u32 = 50;

/// Builds the REST endpoint of a GitHub Enterprise instance.
///
/// # Examples
///
/// ```
/// use socless_repo_updater::github::enterprise_api_uri;
///
/// assert_eq!(enterprise_api_uri("https://ghe.example.com/",), "https://ghe.example.com/api/v3/");
/// ```
pub fn enterprise_api_uri(domain: &str,) -> String
{
    let domain = domain.trim();
    let domain = domain
        .strip_prefix("https://",)
        .or_else(|| domain.strip_prefix("http://",),)
        .unwrap_or(domain,)
        .trim_end_matches('/',);
    format!("https://{domain}/api/v3/")
}

#[derive(Debug, Deserialize,)]
struct RepositoryPayload
{
    default_branch: String,
}

#[derive(Debug, Deserialize,)]
struct BranchPayload
{
    name:   String,
    commit: CommitPayload,
}

#[derive(Debug, Deserialize,)]
struct CommitPayload
{
    sha: String,
}

#[derive(Debug, Deserialize,)]
struct ContentEntry
{
    #[serde(rename = "type")]
    kind:    String,
    path:    String,
    sha:     String,
    #[serde(default)]
    content: Option<String,>,
}

#[derive(Debug, Deserialize,)]
#[serde(untagged)]
enum ContentsPayload
{
    Listing(Vec<serde_json::Value,>,),
    Entry(ContentEntry,),
}

#[derive(Debug, Deserialize,)]
struct UpdateFilePayload
{
    commit: CommitPayload,
}

#[derive(Debug, Deserialize,)]
struct GitRefPayload
{
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Debug, Deserialize,)]
struct PullPayload
{
    number:   u64,
    html_url: String,
    base:     GitRefPayload,
    head:     GitRefPayload,
}

impl From<PullPayload,> for PullRequestRef
{
    fn from(payload: PullPayload,) -> Self
    {
        Self {
            number: payload.number,
            url:    payload.html_url,
            base:   payload.base.name,
            head:   payload.head.name,
        }
    }
}

#[derive(Debug, Deserialize,)]
struct ReleasePayload
{
    tag_name: String,
}

#[derive(Serialize,)]
struct RefQuery<'a,>
{
    #[serde(rename = "ref")]
    git_ref: &'a str,
}

#[derive(Serialize,)]
struct PullsQuery<'a,>
{
    state:    &'static str,
    base:     &'a str,
    per_page: u8,
    page:     u32,
}

#[derive(Serialize,)]
struct CreateRefBody
{
    #[serde(rename = "ref")]
    git_ref: String,
    sha:     String,
}

#[derive(Serialize,)]
struct UpdateFileBody<'a,>
{
    message: &'a str,
    content: String,
    sha:     &'a str,
    branch:  &'a str,
}

/// GitHub REST client.
#[derive(Debug, Clone,)]
pub struct GitHubHost
{
    client: Octocrab,
}

impl GitHubHost
{
    /// Wraps an already configured client.
    pub fn from_client(client: Octocrab,) -> Self
    {
        Self {
            client,
        }
    }

    /// Connects to public GitHub, anonymously when `token` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Service`] when the client cannot be built.
    pub fn public(token: Option<&str,>,) -> Result<Self, Error,>
    {
        Self::connect(PUBLIC_API_URI, token,)
    }

    /// Connects to a GitHub Enterprise instance at `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Service`] when the client cannot be built.
    pub fn enterprise(domain: &str, token: Option<&str,>,) -> Result<Self, Error,>
    {
        Self::connect(&enterprise_api_uri(domain,), token,)
    }

    fn connect(base_uri: &str, token: Option<&str,>,) -> Result<Self, Error,>
    {
        let builder = Octocrab::builder()
            .base_uri(base_uri,)
            .map_err(|e| Error::service(format!("invalid API base URI {base_uri}: {e}"),),)?;
        let builder = match token.filter(|token| !token.is_empty(),) {
            Some(token,) => builder.personal_token(token.to_owned(),),
            None => builder,
        };
        let client = builder
            .build()
            .map_err(|e| Error::service(format!("failed to build octocrab: {e}"),),)?;
        Ok(Self::from_client(client,),)
    }
}

fn status_of(error: &octocrab::Error,) -> Option<u16,>
{
    match error {
        octocrab::Error::GitHub {
            source, ..
        } => Some(source.status_code.as_u16(),),
        _ => None,
    }
}

fn github_message(error: &octocrab::Error,) -> Option<&str,>
{
    match error {
        octocrab::Error::GitHub {
            source, ..
        } => Some(source.message.as_str(),),
        _ => None,
    }
}

/// Reports whether a failed ref creation means the ref is already there.
///
/// GitHub answers 422 both for existing refs and for invalid ref names; only
/// the former carries "Reference already exists".
fn is_existing_ref(status: Option<u16,>, message: Option<&str,>,) -> bool
{
    status == Some(422,)
        && message.is_some_and(|message| message.to_ascii_lowercase().contains("already exists",),)
}

/// Reads a paginated list endpoint until a short page or [`MAX_PAGES`].
async fn collect_pages<T, F, Fut,>(mut fetch: F,) -> Result<Vec<T,>, Error,>
where
    F: FnMut(u32,) -> Fut,
    Fut: Future<Output = Result<Vec<T,>, Error,>,>,
{
    let mut items = Vec::new();
    let mut page = 1u32;

    loop {
        let batch = fetch(page,).await?;
        let count = batch.len();
        items.extend(batch,);

        if count < usize::from(PAGE_SIZE,) || page >= MAX_PAGES {
            break;
        }

        page += 1;
    }

    Ok(items,)
}

fn service_error(context: String, error: &octocrab::Error,) -> Error
{
    Error::service(format!("{context}: {error}"),)
}

/// Decodes base64 file content as returned by the contents API.
///
/// The API wraps the payload at 60 columns, so whitespace is removed first.
fn decode_content(path: &str, encoded: &str,) -> Result<String, Error,>
{
    let compact: String = encoded.chars().filter(|ch| !ch.is_ascii_whitespace(),).collect();
    let bytes = STANDARD.decode(compact,).map_err(|e| Error::Decode {
        path:    path.to_owned(),
        message: e.to_string(),
    },)?;
    String::from_utf8(bytes,).map_err(|e| Error::Decode {
        path:    path.to_owned(),
        message: e.to_string(),
    },)
}

fn into_remote_content(payload: ContentsPayload,) -> Result<RemoteContent, Error,>
{
    match payload {
        ContentsPayload::Listing(_,) => Ok(RemoteContent::Directory,),
        ContentsPayload::Entry(entry,) if entry.kind != "file" => Ok(RemoteContent::Directory,),
        ContentsPayload::Entry(entry,) => {
            let content = entry
                .content
                .as_deref()
                .map(|encoded| decode_content(&entry.path, encoded,),)
                .transpose()?;
            Ok(RemoteContent::File(RemoteFile {
                path: entry.path,
                sha: entry.sha,
                content,
            },),)
        }
    }
}

#[async_trait]
impl RepositoryHost for GitHubHost
{
    async fn default_branch(&self, repo: &RepoTarget,) -> Result<String, Error,>
    {
        let route = format!("/repos/{}/{}", repo.owner, repo.name);
        let payload: RepositoryPayload = self
            .client
            .get(&route, None::<&(),>,)
            .await
            .map_err(|e| service_error(format!("failed to fetch {}", repo.full_name()), &e,),)?;
        Ok(payload.default_branch,)
    }

    async fn get_branch(&self, repo: &RepoTarget, name: &str,) -> Result<Option<BranchHead,>, Error,>
    {
        let route = format!("/repos/{}/{}/branches/{name}", repo.owner, repo.name);
        let response: Result<BranchPayload, octocrab::Error,> =
            self.client.get(&route, None::<&(),>,).await;
        match response {
            Ok(payload,) => Ok(Some(BranchHead {
                name: payload.name,
                sha:  payload.commit.sha,
            },),),
            Err(e,) if status_of(&e,) == Some(404,) => Ok(None,),
            Err(e,) => Err(service_error(
                format!("failed to fetch branch {name} of {}", repo.full_name()),
                &e,
            ),),
        }
    }

    async fn create_branch(
        &self,
        repo: &RepoTarget,
        name: &str,
        from_sha: &str,
    ) -> Result<BranchStatus, Error,>
    {
        let route = format!("/repos/{}/{}/git/refs", repo.owner, repo.name);
        let body = CreateRefBody {
            git_ref: format!("refs/heads/{name}"),
            sha:     from_sha.to_owned(),
        };
        let response: Result<serde_json::Value, octocrab::Error,> =
            self.client.post(&route, Some(&body,),).await;
        match response {
            Ok(_,) => {
                debug!("Created branch {name} on {} at {from_sha}", repo.full_name());
                Ok(BranchStatus::Created,)
            }
            Err(e,) if is_existing_ref(status_of(&e,), github_message(&e,),) => {
                debug!("Branch {name} already exists on {}", repo.full_name());
                Ok(BranchStatus::AlreadyExisted,)
            }
            Err(e,) => Err(service_error(
                format!("failed to create branch {name} on {}", repo.full_name()),
                &e,
            ),),
        }
    }

    async fn fetch_file(
        &self,
        repo: &RepoTarget,
        path: &str,
        git_ref: &str,
    ) -> Result<RemoteContent, Error,>
    {
        let route = format!("/repos/{}/{}/contents/{path}", repo.owner, repo.name);
        let payload: ContentsPayload = self
            .client
            .get(&route, Some(&RefQuery {
                git_ref,
            },),)
            .await
            .map_err(|e| {
                service_error(
                    format!("failed to fetch {path} on {git_ref} of {}", repo.full_name()),
                    &e,
                )
            },)?;
        into_remote_content(payload,)
    }

    async fn update_file(&self, repo: &RepoTarget, update: FileUpdate<'_,>,) -> Result<String, Error,>
    {
        let route = format!("/repos/{}/{}/contents/{}", repo.owner, repo.name, update.path);
        let body = UpdateFileBody {
            message: update.message,
            content: STANDARD.encode(update.content,),
            sha:     update.previous_sha,
            branch:  update.branch,
        };
        let payload: UpdateFilePayload =
            self.client.put(&route, Some(&body,),).await.map_err(|e| {
                service_error(
                    format!("failed to update {} on {} of {}", update.path, update.branch, repo.full_name()),
                    &e,
                )
            },)?;
        Ok(payload.commit.sha,)
    }

    async fn list_open_pull_requests(
        &self,
        repo: &RepoTarget,
        base: &str,
    ) -> Result<Vec<PullRequestRef,>, Error,>
    {
        let route = format!("/repos/{}/{}/pulls", repo.owner, repo.name);
        let route = route.as_str();
        let client = &self.client;

        let payload = collect_pages(|page| async move {
            let response: Result<Vec<PullPayload,>, octocrab::Error,> = client
                .get(route, Some(&PullsQuery {
                    state: "open",
                    base,
                    per_page: PAGE_SIZE,
                    page,
                },),)
                .await;
            response.map_err(|e| {
                service_error(
                    format!("failed to list pull requests of {} (page {page})", repo.full_name()),
                    &e,
                )
            },)
        },)
        .await?;
        debug!("Found {} open pull requests against {base} on {}", payload.len(), repo.full_name());
        Ok(payload.into_iter().map(PullRequestRef::from,).collect(),)
    }

    async fn create_pull_request(
        &self,
        repo: &RepoTarget,
        draft: PullRequestDraft<'_,>,
    ) -> Result<PullRequestRef, Error,>
    {
        let route = format!("/repos/{}/{}/pulls", repo.owner, repo.name);
        let body = serde_json::json!({
            "title": draft.title,
            "body": draft.body,
            "base": draft.base,
            "head": draft.head,
        });
        let payload: PullPayload = self.client.post(&route, Some(&body,),).await.map_err(|e| {
            service_error(format!("failed to open pull request on {}", repo.full_name()), &e,)
        },)?;
        Ok(payload.into(),)
    }

    async fn latest_release(&self, repo: &RepoTarget,) -> Result<String, Error,>
    {
        let route = format!("/repos/{}/{}/releases/latest", repo.owner, repo.name);
        let payload: ReleasePayload = self.client.get(&route, None::<&(),>,).await.map_err(|e| {
            service_error(format!("failed to fetch latest release of {}", repo.full_name()), &e,)
        },)?;
        Ok(payload.tag_name,)
    }

    async fn release_exists(&self, repo: &RepoTarget, tag: &str,) -> Result<bool, Error,>
    {
        let route = format!("/repos/{}/{}/releases/tags/{tag}", repo.owner, repo.name);
        let response: Result<ReleasePayload, octocrab::Error,> =
            self.client.get(&route, None::<&(),>,).await;
        match response {
            Ok(_,) => Ok(true,),
            Err(e,) if status_of(&e,) == Some(404,) => Ok(false,),
            Err(e,) => Err(service_error(
                format!("failed to look up release {tag} of {}", repo.full_name()),
                &e,
            ),),
        }
    }
}
