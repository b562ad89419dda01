//! Relative document paths that can never escape their storage root.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_PATH_LEN: usize = 512;

/// Normalised, `/`-separated path relative to a storage root.
///
/// Construction rejects absolute paths, parent (`..`) components that would
/// climb above the root, empty paths and NUL bytes, so a `DocumentPath` joined
/// onto a root directory always stays inside it.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentPath(String);

impl DocumentPath {
    /// Validates and normalises the supplied relative path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDocumentPath`] when the path is empty, absolute,
    /// too long, contains NUL bytes, or escapes the root.
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let raw = path.as_ref();
        if raw.trim().is_empty() {
            return Err(invalid(raw, "path cannot be empty"));
        }
        if raw.len() > MAX_PATH_LEN {
            return Err(invalid(raw, format!("path length must be <= {MAX_PATH_LEN}")));
        }
        if raw.contains('\0') {
            return Err(invalid(raw, "path cannot contain NUL bytes"));
        }
        let unified = raw.replace('\\', "/");
        if unified.starts_with('/') || has_drive_prefix(&unified) {
            return Err(invalid(raw, "path must be relative"));
        }
        normalise(raw, std::iter::empty(), unified.split('/'))
    }

    /// Resolves `reference` relative to the directory containing this path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDocumentPath`] if the reference is absolute or
    /// climbs above the storage root.
    pub fn resolve_sibling(&self, reference: &str) -> Result<Self> {
        let unified = reference.replace('\\', "/");
        if unified.starts_with('/') || has_drive_prefix(&unified) {
            return Err(invalid(reference, "reference must be relative"));
        }
        let parent = self.segments();
        let base = &parent[..parent.len().saturating_sub(1)];
        normalise(reference, base.iter().copied(), unified.split('/'))
    }

    /// Returns a copy with `.{extension}` appended unless the path already ends with it.
    #[must_use]
    pub fn with_default_extension(&self, extension: &str) -> Self {
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() || self.0.ends_with(&format!(".{extension}")) {
            return self.clone();
        }
        Self(format!("{}.{extension}", self.0))
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the final path component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Returns `true` if the file name ends with `.{extension}`.
    #[must_use]
    pub fn has_extension(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.file_name().ends_with(&format!(".{extension}"))
    }

    /// Joins the path onto a filesystem root.
    #[must_use]
    pub fn under(&self, root: &Path) -> PathBuf {
        self.segments()
            .into_iter()
            .fold(root.to_path_buf(), |acc, segment| acc.join(segment))
    }

    fn segments(&self) -> Vec<&str> {
        self.0.split('/').collect()
    }
}

fn normalise<'a>(
    raw: &str,
    base: impl IntoIterator<Item = &'a str>,
    components: impl Iterator<Item = &'a str>,
) -> Result<DocumentPath> {
    let mut stack: Vec<&str> = base.into_iter().collect();
    for component in components {
        match component {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() {
                    return Err(invalid(raw, "path escapes the storage root"));
                }
            }
            other => stack.push(other),
        }
    }
    if stack.is_empty() {
        return Err(invalid(raw, "path does not name a document"));
    }
    Ok(DocumentPath(stack.join("/")))
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn invalid(path: &str, reason: impl Into<String>) -> Error {
    Error::InvalidDocumentPath {
        path: path.to_owned(),
        reason: reason.into(),
    }
}

impl Display for DocumentPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DocumentPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for DocumentPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DocumentPath> for String {
    fn from(value: DocumentPath) -> Self {
        value.0
    }
}
