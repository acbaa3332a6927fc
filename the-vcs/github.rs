use async_trait::async_trait;
use base64::{
  Engine as _,
  engine::general_purpose::STANDARD as BASE64,
};
use reqwest::{
  Method,
  RequestBuilder,
  Response,
};
use serde::{
  Deserialize,
  Serialize,
};
use url::Url;

use crate::{
  BlobRef,
  PutResult,
  RemoteEntry,
  RemoteError,
  RemoteFile,
  RemoteRepository,
  RepoRef,
  Result,
};

const ACCEPT: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!("the-shell/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct TreeResponse {
  tree:      Vec<TreeItem>,
  #[serde(default)]
  truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
  path: String,
  #[serde(rename = "type")]
  kind: String,
  sha:  String,
  url:  Option<String>,
}

/// Files of a tree listing; subtrees and submodules are dropped.
fn blob_entries(tree: TreeResponse) -> Vec<RemoteEntry> {
  tree
    .tree
    .into_iter()
    .filter(|item| item.kind == "blob")
    .map(|item| {
      RemoteEntry {
        path: item.path,
        blob: BlobRef {
          sha: item.sha,
          url: item.url,
        },
      }
    })
    .collect()
}

#[derive(Debug, Deserialize)]
struct EncodedContent {
  content:  String,
  #[serde(default)]
  encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
  sha:      String,
  #[serde(default)]
  content:  Option<String>,
  #[serde(default)]
  encoding: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
  message: &'a str,
  content: String,
  branch:  &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  sha:     Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
  content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
  sha: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
  message: String,
}

/// Decodes the base64 payload of a blob or contents response. GitHub wraps
/// the encoded text at 60 columns.
fn decode_content(content: &str, encoding: Option<&str>) -> Result<Vec<u8>> {
  match encoding {
    None | Some("base64") => {
      let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
      Ok(BASE64.decode(compact)?)
    },
    Some("utf-8") => Ok(content.as_bytes().to_vec()),
    Some(other) => Err(RemoteError::Malformed(format!("unsupported encoding `{other}`"))),
  }
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
  http:    reqwest::Client,
  api_url: Url,
  token:   Option<String>,
}

impl GitHubClient {
  pub const DEFAULT_API_URL: &'static str = "https://api.github.com";

  pub fn new(token: Option<String>) -> Result<Self> {
    Self::with_api_url(Self::DEFAULT_API_URL, token)
  }

  /// Client for a GitHub compatible API rooted at `api_url`.
  pub fn with_api_url(api_url: &str, token: Option<String>) -> Result<Self> {
    let api_url = Url::parse(api_url).map_err(|_| RemoteError::InvalidUrl(api_url.to_string()))?;
    if api_url.cannot_be_a_base() {
      return Err(RemoteError::InvalidUrl(api_url.to_string()));
    }
    let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    Ok(Self {
      http,
      api_url,
      token: token.filter(|token| !token.is_empty()),
    })
  }

  fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
    let mut url = self.api_url.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  fn repo_endpoint<'a>(&self, repo: &'a RepoRef, rest: &[&'a str]) -> Url {
    self.endpoint(
      ["repos", repo.owner.as_str(), repo.repo.as_str()]
        .into_iter()
        .chain(rest.iter().copied()),
    )
  }

  fn contents_endpoint(&self, repo: &RepoRef, path: &str) -> Url {
    let mut url = self.repo_endpoint(repo, &["contents"]);
    if let Ok(mut segments) = url.path_segments_mut() {
      segments.extend(path.split('/').filter(|segment| !segment.is_empty()));
    }
    url
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    let request = self.http.request(method, url).header("Accept", ACCEPT);
    match &self.token {
      Some(token) => request.header("Authorization", format!("token {token}")),
      None => request,
    }
  }

  /// Sends `request`, turning non-success statuses into errors about `path`.
  async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let message = match response.json::<ErrorBody>().await {
      Ok(body) => body.message,
      Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
    };
    log::debug!("github {status} for {path}: {message}");
    Err(RemoteError::from_status(status.as_u16(), message, path))
  }

  async fn contents(&self, repo: &RepoRef, path: &str) -> Result<ContentsResponse> {
    let mut url = self.contents_endpoint(repo, path);
    url.query_pairs_mut().append_pair("ref", &repo.branch);
    let response = self.send(self.request(Method::GET, url), path).await?;
    Ok(response.json().await?)
  }
}

#[async_trait]
impl RemoteRepository for GitHubClient {
  async fn list_files(&self, repo: &RepoRef) -> Result<Vec<RemoteEntry>> {
    let mut url = self.repo_endpoint(repo, &["git", "trees", repo.branch.as_str()]);
    url.query_pairs_mut().append_pair("recursive", "1");

    let label = repo.to_string();
    let response = self.send(self.request(Method::GET, url), &label).await?;
    let tree: TreeResponse = response.json().await?;
    if tree.truncated {
      log::warn!("tree listing of {label} was truncated by the server");
    }

    Ok(blob_entries(tree))
  }

  async fn get_blob(&self, repo: &RepoRef, blob: &BlobRef) -> Result<Vec<u8>> {
    let url = match blob.url.as_deref().map(Url::parse) {
      Some(Ok(url)) => url,
      _ => self.repo_endpoint(repo, &["git", "blobs", blob.sha.as_str()]),
    };
    let response = self.send(self.request(Method::GET, url), &blob.sha).await?;
    let body: EncodedContent = response.json().await?;
    decode_content(&body.content, body.encoding.as_deref())
  }

  async fn get_file_sha(&self, repo: &RepoRef, path: &str) -> Result<String> {
    Ok(self.contents(repo, path).await?.sha)
  }

  async fn get_file(&self, repo: &RepoRef, path: &str) -> Result<RemoteFile> {
    let body = self.contents(repo, path).await?;
    let Some(content) = body.content else {
      return Err(RemoteError::Malformed(format!("{path} is not a file")));
    };
    Ok(RemoteFile {
      path:    path.to_string(),
      content: decode_content(&content, body.encoding.as_deref())?,
      sha:     body.sha,
    })
  }

  async fn put_blob(
    &self,
    repo: &RepoRef,
    path: &str,
    content: &[u8],
    message: &str,
    base_sha: Option<&str>,
  ) -> Result<PutResult> {
    let body = PutRequest {
      message,
      content: BASE64.encode(content),
      branch: &repo.branch,
      sha: base_sha,
    };
    let request = self
      .request(Method::PUT, self.contents_endpoint(repo, path))
      .json(&body);
    let response = self.send(request, path).await?;
    let written: PutResponse = response.json().await?;
    log::info!("pushed {path} to {repo} at {}", written.content.sha);
    Ok(PutResult {
      sha: written.content.sha,
    })
  }
}
