//! The selection request sent to the explanation server.

use reqwest::Url;
use serde::Serialize;

use crate::error::RequestError;

/// Selections shorter than this (after trimming) are rejected.
pub const MIN_SELECTION_CHARS: usize = 4;

/// Revision used when a location does not name one.
pub const DEFAULT_SHA: &str = "main";

/// Body of `POST {base_url}/select`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectRequest {
    pub owner: String,
    pub repo: String,
    pub sha: String,
    pub file: String,
    pub selected_text: String,
    pub language: String,
}

impl SelectRequest {
    /// Build a request for `selection` inside `location`.
    ///
    /// The selection is trimmed and must keep at least
    /// [`MIN_SELECTION_CHARS`] characters. When `language` is not given it is
    /// derived from the file extension.
    pub fn new(
        location: RepoLocation,
        selection: &str,
        language: Option<&str>,
    ) -> Result<Self, RequestError> {
        let selected_text = selection.trim();
        if selected_text.chars().count() < MIN_SELECTION_CHARS {
            return Err(RequestError::SelectionTooShort {
                min: MIN_SELECTION_CHARS,
            });
        }

        let language = match language {
            Some(lang) if !lang.trim().is_empty() => lang.trim().to_string(),
            _ => language_for_file(&location.file).to_string(),
        };

        Ok(Self {
            owner: location.owner,
            repo: location.repo,
            sha: location.sha,
            file: location.file,
            selected_text: selected_text.to_string(),
            language,
        })
    }
}

/// Where a selection lives: repository, revision and file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocation {
    pub owner: String,
    pub repo: String,
    pub sha: String,
    pub file: String,
}

impl RepoLocation {
    /// Parse a GitHub file URL such as
    /// `https://github.com/owner/repo/blob/<sha>/src/lib.rs`, or just its
    /// path. The revision defaults to `main` and the file may be empty.
    pub fn parse(input: &str) -> Result<Self, RequestError> {
        let input = input.trim();
        let path = match Url::parse(input) {
            Ok(url) => url.path().to_string(),
            Err(_) => input.to_string(),
        };

        let parts: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let owner = parts.first().copied().unwrap_or_default();
        let repo = parts.get(1).copied().unwrap_or_default();
        if owner.is_empty() || repo.is_empty() {
            return Err(RequestError::InvalidLocation(input.to_string()));
        }

        // parts[2] is the view kind (`blob`, `tree`, ...) and is not sent
        let sha = parts
            .get(3)
            .copied()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SHA);
        let file = parts.get(4..).map(|rest| rest.join("/")).unwrap_or_default();

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            sha: sha.to_string(),
            file,
        })
    }
}

/// Language name for a file, from its extension. Unknown extensions map to
/// `text`.
pub fn language_for_file(file: &str) -> &'static str {
    let ext = file.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "js" => "javascript",
        "ts" => "typescript",
        "py" => "python",
        "java" => "java",
        "cpp" => "cpp",
        "c" => "c",
        "go" => "go",
        "rs" => "rust",
        "php" => "php",
        "rb" => "ruby",
        "swift" => "swift",
        "kt" => "kotlin",
        "scala" => "scala",
        "sh" => "bash",
        "sql" => "sql",
        "html" => "html",
        "css" => "css",
        "scss" => "scss",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "md" => "markdown",
        _ => "text",
    }
}
