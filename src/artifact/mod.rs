//! Action artifacts
//!
//! Every executed action leaves one text file behind, named
//! `<leadingToken>_results_<YYYYMMDD_HHMMSS>.txt`, holding its merged output.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::Result;
use crate::id::capture_timestamp;

const RESULTS_MARKER: &str = "_results_";
const EXTENSION: &str = ".txt";

/// Token used when an action has no leading token at all
const EMPTY_ACTION_TOKEN: &str = "action";

/// Location of one action's captured output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    path: PathBuf,
}

impl ArtifactHandle {
    /// Handle for `action` captured at `at`, inside `dir`
    pub fn for_action(dir: &Path, action: &str, at: DateTime<Local>) -> Self {
        Self {
            path: dir.join(artifact_file_name(action, at)),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Read the whole artifact back
    pub async fn read_to_string(&self) -> Result<String> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// First whitespace-separated token of the action, as typed
pub fn leading_token(action: &str) -> &str {
    action.split_whitespace().next().unwrap_or("")
}

/// Leading token made safe for use inside a file name
fn file_token(action: &str) -> String {
    let token = leading_token(action);
    if token.is_empty() {
        return EMPTY_ACTION_TOKEN.to_string();
    }
    token.replace(['/', '\\'], "_")
}

/// `<leadingToken>_results_<YYYYMMDD_HHMMSS>.txt`
pub fn artifact_file_name(action: &str, at: DateTime<Local>) -> String {
    format!("{}{}{}{}", file_token(action), RESULTS_MARKER, capture_timestamp(at), EXTENSION)
}

/// Split an artifact file name into its token and timestamp
pub fn parse_artifact_name(name: &str) -> Option<(&str, &str)> {
    let stem = name.strip_suffix(EXTENSION)?;
    let (token, timestamp) = stem.rsplit_once(RESULTS_MARKER)?;
    let valid = timestamp.len() == 15
        && timestamp
            .char_indices()
            .all(|(i, c)| if i == 8 { c == '_' } else { c.is_ascii_digit() });
    (valid && !token.is_empty()).then_some((token, timestamp))
}

/// Artifact files in `dir`, oldest capture first
pub fn list_artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some((_, timestamp)) = parse_artifact_name(name) {
            found.push((timestamp.to_string(), name.to_string(), path.clone()));
        }
    }

    found.sort();
    Ok(found.into_iter().map(|(_, _, path)| path).collect())
}
