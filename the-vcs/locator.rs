//! Parsing of `github.com` repository and file URLs.

use percent_encoding::percent_decode_str;
use url::Url;

use crate::{
  RemoteError,
  RepoRef,
  Result,
};

fn segments(input: &str) -> Result<Vec<String>> {
  let trimmed = input.trim();
  let with_scheme = if trimmed.contains("://") {
    trimmed.to_string()
  } else {
    format!("https://{trimmed}")
  };

  let url = Url::parse(&with_scheme).map_err(|_| RemoteError::InvalidUrl(input.to_string()))?;
  match url.host_str() {
    Some("github.com" | "www.github.com") => {},
    _ => return Err(RemoteError::InvalidUrl(input.to_string())),
  }

  // Segments come back percent-encoded; callers encode them again.
  let Some(segments) = url.path_segments() else {
    return Ok(Vec::new());
  };
  segments
    .filter(|segment| !segment.is_empty())
    .map(|segment| {
      percent_decode_str(segment)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| RemoteError::InvalidUrl(input.to_string()))
    })
    .collect()
}

fn repo_name(segment: &str) -> &str {
  segment.strip_suffix(".git").unwrap_or(segment)
}

/// Parses `github.com/<owner>/<repo>`. Anything after the repository name
/// is ignored.
pub fn parse_repo_url(input: &str, branch: &str) -> Result<RepoRef> {
  match segments(input)?.as_slice() {
    [owner, repo, ..] => Ok(RepoRef::new(owner.as_str(), repo_name(repo)).with_branch(branch)),
    _ => Err(RemoteError::InvalidUrl(input.to_string())),
  }
}

/// Parses `github.com/<owner>/<repo>/blob/<branch>/<path>` into the
/// repository and the file path inside it.
pub fn parse_blob_url(input: &str) -> Result<(RepoRef, String)> {
  match segments(input)?.as_slice() {
    [owner, repo, blob, branch, path @ ..] if blob == "blob" && !path.is_empty() => {
      Ok((
        RepoRef::new(owner.as_str(), repo_name(repo)).with_branch(branch.as_str()),
        path.join("/"),
      ))
    },
    _ => Err(RemoteError::InvalidUrl(input.to_string())),
  }
}
