//! Kernel error type and the structured reply handed to the RPC layer.

use serde::Serialize;

/// Error type for kernel operations.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// Entity absent, or not owned by the caller.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity (collection) name.
        entity: &'static str,
        /// Requested id.
        id: String,
    },
    /// A referenced channel or edge could not be resolved.
    #[error("Unresolved reference: {0}")]
    ValidationMiss(String),
    /// The document store reported a failure.
    #[error("Store error: {0}")]
    Store(String),
    /// The job sink refused a submission.
    #[error("Job sink error: {0}")]
    JobSink(String),
    /// A stored preference is outside the recognized enumeration.
    #[error("Unrecognized preference {value:?} for owner {owner_id}")]
    PolicyMismatch {
        /// Owner whose preference is bad.
        owner_id: String,
        /// The stored value.
        value: String,
    },
    /// A stored document could not be encoded or decoded.
    #[error("Document codec error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl KernelError {
    /// Create a store error from any error type.
    pub fn from_store<E: std::error::Error>(e: E) -> Self {
        Self::Store(e.to_string())
    }

    /// Create a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// HTTP-style status hint for callers that render replies.
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::ValidationMiss(_) => 422,
            Self::PolicyMismatch { .. } => 400,
            Self::JobSink(_) => 502,
            Self::Store(_) | Self::Decode(_) => 500,
        }
    }
}

impl From<crate::jobs::JobSinkError> for KernelError {
    fn from(e: crate::jobs::JobSinkError) -> Self {
        Self::JobSink(e.to_string())
    }
}

/// Structured `(error, entity, result, status)` reply.
#[derive(Debug, Clone, Serialize)]
pub struct Reply<T> {
    /// Error message, when the operation failed.
    pub error: Option<String>,
    /// Entity the reply is about.
    pub entity: &'static str,
    /// Result body, when the operation succeeded.
    pub result: Option<T>,
    /// Status hint.
    pub status: u16,
}

impl<T> Reply<T> {
    /// Build a reply from an operation result.
    pub fn from_result(entity: &'static str, result: Result<T, KernelError>) -> Self {
        match result {
            Ok(body) => Self {
                error: None,
                entity,
                result: Some(body),
                status: 200,
            },
            Err(e) => Self {
                error: Some(e.to_string()),
                entity,
                result: None,
                status: e.status_hint(),
            },
        }
    }

    /// Whether the reply carries a result.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_hints() {
        assert_eq!(KernelError::not_found("bip_share", "s1").status_hint(), 404);
        assert_eq!(KernelError::Store("down".into()).status_hint(), 500);
        assert_eq!(
            KernelError::PolicyMismatch {
                owner_id: "o1".into(),
                value: "x".into()
            }
            .status_hint(),
            400
        );
    }

    #[test]
    fn test_reply_from_error() {
        let reply: Reply<()> = Reply::from_result("bip_share", Err(KernelError::not_found("bip_share", "s1")));
        assert!(!reply.is_ok());
        assert_eq!(reply.status, 404);
        assert_eq!(reply.error.as_deref(), Some("bip_share not found: s1"));
    }

    #[test]
    fn test_reply_from_ok() {
        let reply = Reply::from_result("bip_share", Ok("OK"));
        assert!(reply.is_ok());
        assert_eq!(reply.status, 200);
        assert_eq!(reply.result, Some("OK"));
    }
}
