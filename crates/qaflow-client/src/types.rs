use serde::{Deserialize, Serialize};

/// Review of a single uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReview {
    pub file_name: String,
    pub review: String,
}

/// Response of `processes/code_review/run`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeReviewResponse {
    #[serde(default)]
    pub reviews: Vec<FileReview>,
}

impl CodeReviewResponse {
    /// Render every review as a markdown section, separated by rules.
    pub fn to_markdown(&self) -> String {
        self.reviews
            .iter()
            .map(|r| format!("## {}\n\n{}\n\n---\n", r.file_name, r.review))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Response of the generic process endpoints: either a `result` or an `error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResponse {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProcessResponse {
    /// `Err(message)` when the service reported an error, otherwise the result
    /// text (empty when the service sent neither field).
    pub fn into_result(self) -> std::result::Result<String, String> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or_default()),
        }
    }
}
