//! Extension based language detection.
//!
//! The table is fixed: hosts that need a different language for a file
//! reassign it explicitly on the record instead of extending the lookup.

/// Language assigned to files whose extension is not in the table.
pub const PLAINTEXT: &str = "plaintext";

const LANGUAGES: &[(&str, &str)] = &[
  ("js", "javascript"),
  ("ts", "typescript"),
  ("jsx", "javascript"),
  ("tsx", "typescript"),
  ("html", "html"),
  ("css", "css"),
  ("scss", "scss"),
  ("sass", "sass"),
  ("json", "json"),
  ("md", "markdown"),
  ("py", "python"),
  ("java", "java"),
  ("cpp", "cpp"),
  ("c", "c"),
  ("go", "go"),
  ("rs", "rust"),
  ("php", "php"),
  ("rb", "ruby"),
  ("xml", "xml"),
  ("yml", "yaml"),
  ("yaml", "yaml"),
  ("sql", "sql"),
  ("sh", "shell"),
  ("txt", PLAINTEXT),
  ("vue", "html"),
];

/// Extension of `filename`, lowercased.
///
/// A name without a dot is its own extension, so `Makefile` yields
/// `makefile` and falls through to [`PLAINTEXT`].
pub fn extension(filename: &str) -> String {
  filename
    .rsplit('.')
    .next()
    .unwrap_or(filename)
    .to_lowercase()
}

pub fn language_for_extension(ext: &str) -> Option<&'static str> {
  LANGUAGES
    .iter()
    .find(|(known, _)| known.eq_ignore_ascii_case(ext))
    .map(|(_, language)| *language)
}

/// Language identifier for a file name, falling back to [`PLAINTEXT`].
pub fn detect_language(filename: &str) -> &'static str {
  language_for_extension(&extension(filename)).unwrap_or(PLAINTEXT)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn known_extensions_map_to_languages() {
    assert_eq!(detect_language("main.rs"), "rust");
    assert_eq!(detect_language("App.TSX"), "typescript");
    assert_eq!(detect_language("component.vue"), "html");
    assert_eq!(detect_language("ci.yml"), "yaml");
  }

  #[test]
  fn unknown_or_missing_extensions_fall_back() {
    assert_eq!(detect_language("Makefile"), PLAINTEXT);
    assert_eq!(detect_language("archive.tar.zst"), PLAINTEXT);
    assert_eq!(detect_language(""), PLAINTEXT);
  }

  #[test]
  fn table_has_no_duplicate_extensions() {
    for (i, (ext, _)) in LANGUAGES.iter().enumerate() {
      assert!(
        LANGUAGES[i + 1..].iter().all(|(other, _)| other != ext),
        "duplicate extension {ext}"
      );
    }
    assert_eq!(LANGUAGES.len(), 25);
  }
}
