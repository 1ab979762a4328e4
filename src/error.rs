//! Error types for teacher scoring and log-prob extraction.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, OpdError>;

/// Everything that can go wrong between sending a rollout to the teacher and
/// attaching its log-probabilities to the sample.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum OpdError {
    /// Transport-level failure talking to the teacher endpoint.
    #[error("teacher request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The teacher endpoint answered with a non-success status.
    #[error("teacher endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not a valid teacher response.
    #[error("failed to decode teacher response: {0}")]
    Decode(String),

    /// No teacher response has been stored on the sample yet.
    #[error("sample {index} has no teacher response")]
    MissingReward { index: usize },

    /// The teacher response carries no token log-probabilities.
    #[error("teacher response for sample {index} has no input_token_logprobs")]
    MissingLogProbs { index: usize },

    /// Fewer log-probabilities than `response_length + 1` were returned.
    #[error(
        "sample {index}: teacher returned {available} log-probs, need at least {required}"
    )]
    LogProbsTooShort {
        index: usize,
        required: usize,
        available: usize,
    },

    /// A response position carried a null log-probability.
    #[error("sample {index}: null log-prob at position {position}")]
    NullLogProb { index: usize, position: usize },

    /// The sample list and raw reward list are not paired one-to-one.
    #[error("batch mismatch: {samples} samples but {rewards} rewards")]
    BatchMismatch { samples: usize, rewards: usize },

    #[error("image encoding failed: {0}")]
    ImageEncoding(String),

    /// A task grader could not score a sample.
    #[error("task grader failed: {0}")]
    Grader(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error at '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_short_message_names_counts() {
        let err = OpdError::LogProbsTooShort {
            index: 2,
            required: 6,
            available: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("sample 2"));
        assert!(msg.contains("5 log-probs"));
        assert!(msg.contains("at least 6"));
    }

    #[test]
    fn status_message_includes_body() {
        let err = OpdError::Status {
            status: 503,
            body: "overloaded".into(),
        };
        assert_eq!(err.to_string(), "teacher endpoint returned 503: overloaded");
    }
}
