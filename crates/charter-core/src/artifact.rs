// artifact.rs: the text under evaluation and where it came from.
//
// Every artifact source (file, inline string, auto-detected target) is
// normalized to UTF-8 text plus a location label. The label is used purely
// for reporting; rules only look at `content` and `kind`.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CharterError;

/// What kind of text an artifact holds. Rules use this to decide which of
/// their scans apply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Source code (parsed as Python by the AST-based rules).
    Code,
    /// A single SQL statement.
    Sql,
    /// Natural language: a user query or a generated response.
    Text,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Code => write!(f, "code"),
            ArtifactKind::Sql => write!(f, "sql"),
            ArtifactKind::Text => write!(f, "text"),
        }
    }
}

/// A text artifact ready for evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub content: String,
    /// Reporting label: a file path, `<string>`, `<sql>`, `<query>`...
    pub location: String,
    pub kind: ArtifactKind,
    /// Whether the content was read from disk.
    pub from_file: bool,
}

impl Artifact {
    fn inline(content: impl Into<String>, location: &str, kind: ArtifactKind) -> Self {
        Self {
            content: content.into(),
            location: location.to_string(),
            kind,
            from_file: false,
        }
    }

    /// Inline source code.
    pub fn code(content: impl Into<String>) -> Self {
        Self::inline(content, "<string>", ArtifactKind::Code)
    }

    /// An inline SQL statement.
    pub fn sql(content: impl Into<String>) -> Self {
        Self::inline(content, "<sql>", ArtifactKind::Sql)
    }

    /// Inline natural-language text.
    pub fn text(content: impl Into<String>) -> Self {
        Self::inline(content, "<text>", ArtifactKind::Text)
    }

    /// Override the reporting label.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Read an artifact from disk. `.sql` files are scanned as SQL,
    /// everything else as source code.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CharterError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| CharterError::ReadArtifact {
            path: path.to_path_buf(),
            source,
        })?;
        let content = String::from_utf8(bytes).map_err(|_| CharterError::NotText {
            path: path.to_path_buf(),
        })?;
        let kind = if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
        {
            ArtifactKind::Sql
        } else {
            ArtifactKind::Code
        };
        Ok(Self {
            content,
            location: path.display().to_string(),
            kind,
            from_file: true,
        })
    }

    /// Treat `target` as a file path if such a file exists, otherwise as
    /// inline source code.
    pub fn detect(target: &str) -> Result<Self, CharterError> {
        let path = Path::new(target);
        if path.is_file() {
            Self::from_file(path)
        } else {
            Ok(Self::code(target))
        }
    }

    /// The `targetType` reported in result metadata.
    pub fn target_type(&self) -> String {
        if self.from_file {
            "file".to_string()
        } else {
            self.kind.to_string()
        }
    }

    /// Lowercase hex SHA-256 of the content.
    pub fn content_sha256(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Length in characters, used by the "non-trivial artifact" thresholds.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_extension_selects_sql_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.SQL");
        fs::write(&path, "SELECT 1").unwrap();

        let artifact = Artifact::from_file(&path).unwrap();
        assert_eq!(artifact.kind, ArtifactKind::Sql);
        assert_eq!(artifact.target_type(), "file");
        assert_eq!(artifact.location, path.display().to_string());
    }

    #[test]
    fn binary_file_is_a_caller_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.py");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x81]).unwrap();

        match Artifact::from_file(&path) {
            Err(CharterError::NotText { .. }) => {}
            other => panic!("expected NotText, got {:?}", other),
        }
    }

    #[test]
    fn missing_file_is_a_caller_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Artifact::from_file(dir.path().join("nope.py"));
        assert!(matches!(result, Err(CharterError::ReadArtifact { .. })));
    }

    #[test]
    fn detect_falls_back_to_inline_code() {
        let artifact = Artifact::detect("print('hello')").unwrap();
        assert_eq!(artifact.kind, ArtifactKind::Code);
        assert_eq!(artifact.location, "<string>");
        assert_eq!(artifact.target_type(), "code");
    }

    #[test]
    fn content_hash_is_deterministic() {
        let a = Artifact::text("hello world");
        let b = Artifact::code("hello world");
        assert_eq!(a.content_sha256(), b.content_sha256());
        assert_eq!(a.content_sha256().len(), 64);
    }
}
