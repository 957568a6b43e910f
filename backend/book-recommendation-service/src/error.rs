use crate::models::Channel;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommendationError>;

#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream error in {channel} channel: {message}")]
    Upstream { channel: Channel, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecommendationError {
    /// Wrap a collaborator failure, keeping the channel it surfaced from.
    pub fn upstream(channel: Channel, err: impl std::fmt::Display) -> Self {
        RecommendationError::Upstream {
            channel,
            message: err.to_string(),
        }
    }

    /// Like [`upstream`](Self::upstream), naming the input being served.
    pub fn upstream_for(
        channel: Channel,
        context: impl std::fmt::Display,
        err: impl std::fmt::Display,
    ) -> Self {
        RecommendationError::Upstream {
            channel,
            message: format!("{}: {}", context, err),
        }
    }

    /// Stable machine-readable kind, used by the stdin worker responses.
    pub fn kind(&self) -> &'static str {
        match self {
            RecommendationError::Validation(_) => "validation",
            RecommendationError::NotFound(_) => "not_found",
            RecommendationError::Upstream { .. } => "upstream",
            RecommendationError::Config(_) => "config",
            RecommendationError::Internal(_) => "internal",
        }
    }

    /// Errors caused by the caller's input rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RecommendationError::Validation(_) | RecommendationError::NotFound(_)
        )
    }
}

impl From<envy::Error> for RecommendationError {
    fn from(err: envy::Error) -> Self {
        RecommendationError::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RecommendationError {
    fn from(err: tokio::task::JoinError) -> Self {
        RecommendationError::Internal(format!("background task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_names_channel() {
        let err = RecommendationError::upstream(Channel::SemanticQuery, "index offline");
        assert_eq!(
            err.to_string(),
            "Upstream error in semantic_query channel: index offline"
        );
        assert_eq!(err.kind(), "upstream");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_upstream_for_carries_input() {
        let err = RecommendationError::upstream_for(Channel::SemanticSeed, "seed book 7", "timeout");
        assert_eq!(
            err.to_string(),
            "Upstream error in semantic_seed channel: seed book 7: timeout"
        );
    }

    #[test]
    fn test_client_errors() {
        assert!(RecommendationError::Validation("k".into()).is_client_error());
        assert!(RecommendationError::NotFound("book 1".into()).is_client_error());
        assert!(!RecommendationError::Internal("boom".into()).is_client_error());
    }
}
