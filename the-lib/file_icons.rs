//! File type to glyph mapping for tree rows and tabs.
//!
//! Hosts without an icon font render these glyphs directly next to the
//! file name.

/// Glyph for a file or folder row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIcon {
  pub glyph: &'static str,
}

impl FileIcon {
  const fn new(glyph: &'static str) -> Self {
    Self { glyph }
  }
}

pub const FOLDER_CLOSED: FileIcon = FileIcon::new("📁");
pub const FOLDER_OPEN: FileIcon = FileIcon::new("📂");

const FILE_GENERIC: FileIcon = FileIcon::new("📄");

const JAVASCRIPT: FileIcon = FileIcon::new("📜");
const TYPESCRIPT: FileIcon = FileIcon::new("📘");
const REACT: FileIcon = FileIcon::new("⚛️");
const HTML: FileIcon = FileIcon::new("🌐");
const STYLE: FileIcon = FileIcon::new("🎨");
const JSON: FileIcon = FileIcon::new("📋");
const MARKDOWN: FileIcon = FileIcon::new("📝");
const PYTHON: FileIcon = FileIcon::new("🐍");
const JAVA: FileIcon = FileIcon::new("☕");
const NATIVE: FileIcon = FileIcon::new("⚙️");
const GO: FileIcon = FileIcon::new("🐹");
const RUST: FileIcon = FileIcon::new("🦀");
const PHP: FileIcon = FileIcon::new("🐘");
const RUBY: FileIcon = FileIcon::new("💎");
const TERMINAL: FileIcon = FileIcon::new("🐚");
const VUE: FileIcon = FileIcon::new("💚");

/// Returns the icon for a file based on its name and extension.
pub fn icon_for_file(filename: &str) -> FileIcon {
  if let Some(icon) = match_exact_filename(filename) {
    return icon;
  }

  filename
    .rsplit('.')
    .next()
    .and_then(match_extension)
    .unwrap_or(FILE_GENERIC)
}

pub fn icon_for_folder(expanded: bool) -> FileIcon {
  if expanded { FOLDER_OPEN } else { FOLDER_CLOSED }
}

fn match_exact_filename(filename: &str) -> Option<FileIcon> {
  let lower = filename.to_lowercase();

  Some(match lower.as_str() {
    "cargo.toml" | "cargo.lock" => RUST,
    "package.json" | "package-lock.json" => JSON,
    "tsconfig.json" | "jsconfig.json" => TYPESCRIPT,
    "makefile" | "justfile" => TERMINAL,
    "gemfile" | "rakefile" => RUBY,
    "go.mod" | "go.sum" => GO,
    _ => return None,
  })
}

fn match_extension(ext: &str) -> Option<FileIcon> {
  let lower = ext.to_lowercase();

  Some(match lower.as_str() {
    "js" | "mjs" | "cjs" => JAVASCRIPT,
    "ts" | "mts" | "cts" => TYPESCRIPT,
    "jsx" | "tsx" => REACT,
    "html" | "htm" => HTML,
    "css" | "scss" | "sass" => STYLE,
    "json" => JSON,
    "md" | "markdown" => MARKDOWN,
    "py" => PYTHON,
    "java" => JAVA,
    "c" | "h" | "cpp" | "hpp" => NATIVE,
    "go" => GO,
    "rs" => RUST,
    "php" => PHP,
    "rb" => RUBY,
    "sh" | "bash" | "zsh" => TERMINAL,
    "vue" => VUE,
    "xml" | "yml" | "yaml" | "txt" => FILE_GENERIC,
    _ => return None,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rust_sources_and_manifest() {
    assert_eq!(icon_for_file("main.rs"), RUST);
    assert_eq!(icon_for_file("Cargo.toml"), RUST);
  }

  #[test]
  fn extension_match_is_case_insensitive() {
    assert_eq!(icon_for_file("Main.PY"), icon_for_file("main.py"));
  }

  #[test]
  fn unknown_extension_is_generic() {
    assert_eq!(icon_for_file("mystery.xyz123"), FILE_GENERIC);
  }

  #[test]
  fn folder_icon_follows_expansion() {
    assert_eq!(icon_for_folder(true), FOLDER_OPEN);
    assert_eq!(icon_for_folder(false), FOLDER_CLOSED);
  }
}
