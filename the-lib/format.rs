//! Whole-buffer minify and pretty-print helpers.
//!
//! Minification is regex based and does not parse the source: comment
//! markers inside string literals are stripped like real comments.

use std::{
  borrow::Cow,
  sync::LazyLock,
};

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
  #[error("invalid JSON: {0}")]
  InvalidJson(#[from] serde_json::Error),
  #[error("formatting is not supported for {0}")]
  Unsupported(String),
}

pub type Result<T> = std::result::Result<T, FormatError>;

static BLOCK_COMMENT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"/\*[\s\S]*?\*/").expect("block comment regex should compile"));
static LINE_COMMENT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"//.*").expect("line comment regex should compile"));
static HTML_COMMENT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"<!--[\s\S]*?-->").expect("html comment regex should compile"));
static WHITESPACE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));
static PUNCTUATION: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\s*([{};,:])\s*").expect("punctuation regex should compile"));
static BETWEEN_TAGS: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r">\s+<").expect("tag gap regex should compile"));

fn collapse(text: Cow<'_, str>) -> String {
  WHITESPACE.replace_all(&text, " ").into_owned()
}

/// Minified form of `content`. Languages without a minifier are returned
/// unchanged.
pub fn minify(language: &str, content: &str) -> Result<String> {
  let minified = match language {
    "javascript" | "typescript" => {
      let text = BLOCK_COMMENT.replace_all(content, "");
      let text = LINE_COMMENT.replace_all(&text, "").into_owned();
      let text = collapse(Cow::Owned(text));
      PUNCTUATION.replace_all(&text, "$1").trim().to_string()
    },
    "css" | "scss" | "sass" => {
      let text = collapse(BLOCK_COMMENT.replace_all(content, ""));
      PUNCTUATION.replace_all(&text, "$1").trim().to_string()
    },
    "html" => {
      let text = collapse(HTML_COMMENT.replace_all(content, ""));
      BETWEEN_TAGS.replace_all(&text, "><").trim().to_string()
    },
    "json" => {
      let value: serde_json::Value = serde_json::from_str(content)?;
      serde_json::to_string(&value)?
    },
    _ => content.to_string(),
  };
  Ok(minified)
}

/// Pretty printed form of `content`, two space indented.
pub fn pretty(language: &str, content: &str) -> Result<String> {
  match language {
    "json" => {
      let value: serde_json::Value = serde_json::from_str(content)?;
      Ok(serde_json::to_string_pretty(&value)?)
    },
    other => Err(FormatError::Unsupported(other.to_string())),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn javascript_drops_comments_and_tightens_punctuation() {
    let source = "/* header */\nfunction add(a, b) {\n  // sum\n  return a + b;\n}\n";
    assert_eq!(
      minify("javascript", source).unwrap(),
      "function add(a,b){return a + b;}"
    );
  }

  #[test]
  fn css_is_collapsed() {
    let source = "body {\n  color : red; /* x */\n  margin: 0;\n}\n";
    assert_eq!(minify("css", source).unwrap(), "body{color:red;margin:0;}");
  }

  #[test]
  fn html_comments_and_tag_gaps_are_removed() {
    let source = "<div>\n  <!-- note -->\n  <p>hi   there</p>\n</div>\n";
    assert_eq!(minify("html", source).unwrap(), "<div><p>hi there</p></div>");
  }

  #[test]
  fn json_keeps_key_order() {
    let source = "{\n  \"b\": 1,\n  \"a\": [1, 2]\n}";
    assert_eq!(minify("json", source).unwrap(), r#"{"b":1,"a":[1,2]}"#);
    assert_eq!(pretty("json", r#"{"b":1}"#).unwrap(), "{\n  \"b\": 1\n}");
  }

  #[test]
  fn invalid_json_is_an_error() {
    assert!(matches!(
      minify("json", "{oops"),
      Err(FormatError::InvalidJson(_))
    ));
  }

  #[test]
  fn other_languages_pass_through() {
    assert_eq!(minify("python", "x = 1\n").unwrap(), "x = 1\n");
    assert!(matches!(
      pretty("python", "x = 1"),
      Err(FormatError::Unsupported(_))
    ));
  }
}
