//! Error taxonomy shared by every marketplace operation
use std::fmt::Display;

use serde::Serialize;

/// Stable failure category, independent of any transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    InternalError,
}

impl ErrorCode {
    /// HTTP status a request layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::InvalidRequest => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::Conflict => 409,
            ErrorCode::InternalError => 500,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("employee `{0}` does not exist")]
    ActorNotFound(String),
    #[error("`{username}` is not responsible for organization `{organization_id}`")]
    NotAuthorized {
        username: String,
        organization_id: String,
    },
    #[error("{kind} `{id}` was not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} `{id}` has no version {version}")]
    VersionNotFound {
        kind: &'static str,
        id: String,
        version: u32,
    },
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("`{0}` is not a recognised status")]
    InvalidStatus(String),
    #[error("version {version} of {kind} `{id}` was written concurrently, retry the operation")]
    VersionConflict {
        kind: &'static str,
        id: String,
        version: u32,
    },
    #[error("storage failure during {operation}: {detail}")]
    StorageFailure {
        operation: &'static str,
        detail: String,
    },
}

impl MarketError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MarketError::ActorNotFound(_) => ErrorCode::Unauthorized,
            MarketError::NotAuthorized { .. } => ErrorCode::Forbidden,
            MarketError::NotFound { .. } | MarketError::VersionNotFound { .. } => {
                ErrorCode::NotFound
            }
            MarketError::ValidationFailed(_) | MarketError::InvalidStatus(_) => {
                ErrorCode::InvalidRequest
            }
            MarketError::VersionConflict { .. } => ErrorCode::Conflict,
            MarketError::StorageFailure { .. } => ErrorCode::InternalError,
        }
    }

    /// Message safe to hand back to a caller. Storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            MarketError::StorageFailure { .. } => "internal error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, MarketError::VersionConflict { .. })
    }

    pub(crate) fn storage(operation: &'static str, err: impl Display) -> Self {
        let detail = err.to_string();
        tracing::error!(operation, %detail, "storage failure");
        MarketError::StorageFailure { operation, detail }
    }

    /// Same as [`MarketError::storage`], logging the entity the operation touched.
    pub(crate) fn storage_for(operation: &'static str, id: &str, err: impl Display) -> Self {
        let detail = err.to_string();
        tracing::error!(operation, id, %detail, "storage failure");
        MarketError::StorageFailure { operation, detail }
    }
}

/// Attaches the failing operation to sled, codec and id errors.
pub trait StorageResultExt<T> {
    fn storage(self, operation: &'static str) -> Result<T, MarketError>;

    /// Like `storage`, for failures that concern one entity id.
    fn storage_for(self, operation: &'static str, id: &str) -> Result<T, MarketError>;
}

impl<T, E: Display> StorageResultExt<T> for Result<T, E> {
    fn storage(self, operation: &'static str) -> Result<T, MarketError> {
        self.map_err(|err| MarketError::storage(operation, err))
    }

    fn storage_for(self, operation: &'static str, id: &str) -> Result<T, MarketError> {
        self.map_err(|err| MarketError::storage_for(operation, id, err))
    }
}

pub type MarketResult<T> = Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_http_statuses() {
        let cases = [
            (MarketError::ActorNotFound("ghost".into()), 401),
            (
                MarketError::NotAuthorized {
                    username: "u".into(),
                    organization_id: "o".into(),
                },
                403,
            ),
            (
                MarketError::NotFound {
                    kind: "tender",
                    id: "t".into(),
                },
                404,
            ),
            (
                MarketError::VersionNotFound {
                    kind: "bid",
                    id: "b".into(),
                    version: 9,
                },
                404,
            ),
            (MarketError::ValidationFailed("name".into()), 400),
            (MarketError::InvalidStatus("DONE".into()), 400),
            (
                MarketError::VersionConflict {
                    kind: "tender",
                    id: "t".into(),
                    version: 2,
                },
                409,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.code().http_status(), status, "{err}");
        }
    }

    #[test]
    fn storage_detail_is_not_public() {
        let err: Result<(), MarketError> =
            Err::<(), _>("tree `tender_live` is corrupt").storage("load tender");
        let err = err.unwrap_err();

        assert_eq!(err.code(), ErrorCode::InternalError);
        assert_eq!(err.public_message(), "internal error");
        assert!(err.to_string().contains("corrupt"));
    }

    #[test]
    fn entity_storage_failure_keeps_operation() {
        let err = Err::<(), _>("unexpected end of input")
            .storage_for("decode version row", "tender_1abc")
            .unwrap_err();

        assert_eq!(
            err,
            MarketError::StorageFailure {
                operation: "decode version row",
                detail: "unexpected end of input".into(),
            }
        );
        assert_eq!(err.public_message(), "internal error");
    }

    #[test]
    fn only_conflicts_are_retriable() {
        let conflict = MarketError::VersionConflict {
            kind: "bid",
            id: "b".into(),
            version: 3,
        };
        assert!(conflict.is_retriable());
        assert!(!MarketError::ValidationFailed("x".into()).is_retriable());
    }
}
