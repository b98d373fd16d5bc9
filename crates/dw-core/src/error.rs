use dw_events::NormalizeError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("corrupt row: {message}")]
    Corrupt { message: String },
}

impl StoreError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenantError {
    #[error("tenant not found")]
    NotFound,
    #[error("auth token already in use")]
    TokenConflict,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Closed classification of ingestion failures. Transports map these to
/// their own status codes without inspecting the error further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestErrorKind {
    MissingAuth,
    InvalidAuth,
    InvalidSignature,
    InvalidPayload,
    InvalidSchema,
    UnsupportedType,
    Busy,
    Internal,
}

impl IngestErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::MissingAuth => "missing_auth",
            Self::InvalidAuth => "invalid_auth",
            Self::InvalidSignature => "invalid_signature",
            Self::InvalidPayload => "invalid_payload",
            Self::InvalidSchema => "invalid_schema",
            Self::UnsupportedType => "unsupported_type",
            Self::Busy => "busy",
            Self::Internal => "internal_error",
        }
    }

    pub fn is_retryable(self) -> bool {
        self == Self::Busy
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("missing auth token")]
    MissingAuth,
    #[error("invalid auth token")]
    InvalidAuth,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid payload: {message}")]
    InvalidPayload { message: String },
    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },
    #[error("unsupported event type: {event_type}")]
    UnsupportedType { event_type: String },
    #[error("ingestion busy")]
    Busy,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl IngestError {
    pub fn kind(&self) -> IngestErrorKind {
        match self {
            Self::MissingAuth => IngestErrorKind::MissingAuth,
            Self::InvalidAuth => IngestErrorKind::InvalidAuth,
            Self::InvalidSignature => IngestErrorKind::InvalidSignature,
            Self::InvalidPayload { .. } => IngestErrorKind::InvalidPayload,
            Self::InvalidSchema { .. } => IngestErrorKind::InvalidSchema,
            Self::UnsupportedType { .. } => IngestErrorKind::UnsupportedType,
            Self::Busy => IngestErrorKind::Busy,
            Self::Store(_) | Self::Internal { .. } => IngestErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<NormalizeError> for IngestError {
    fn from(value: NormalizeError) -> Self {
        match value {
            NormalizeError::InvalidPayload { message } => Self::InvalidPayload { message },
            NormalizeError::InvalidSchema { message } => Self::InvalidSchema { message },
            NormalizeError::UnsupportedType { event_type } => Self::UnsupportedType { event_type },
        }
    }
}

impl From<TenantError> for IngestError {
    fn from(value: TenantError) -> Self {
        match value {
            TenantError::NotFound => Self::InvalidAuth,
            TenantError::Store(err) => Self::Store(err),
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Tenant(#[from] TenantError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{what} not found")]
    NotFound { what: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("unavailable: {message}")]
    Unavailable { message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_busy_is_retryable() {
        let errors = [
            IngestError::MissingAuth,
            IngestError::InvalidAuth,
            IngestError::InvalidSignature,
            IngestError::InvalidPayload {
                message: "x".to_string(),
            },
            IngestError::InvalidSchema {
                message: "x".to_string(),
            },
            IngestError::UnsupportedType {
                event_type: "x".to_string(),
            },
            IngestError::Store(StoreError::storage("disk")),
        ];
        for err in errors {
            assert!(!err.is_retryable(), "{err} should not be retryable");
        }
        assert!(IngestError::Busy.is_retryable());
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(IngestError::MissingAuth.kind().code(), "missing_auth");
        assert_eq!(
            IngestError::from(NormalizeError::UnsupportedType {
                event_type: "dev.cdevents.unknown.thing.0.1.0".to_string()
            })
            .kind()
            .code(),
            "unsupported_type"
        );
        assert_eq!(
            IngestError::Store(StoreError::storage("locked")).kind(),
            IngestErrorKind::Internal
        );
    }

    #[test]
    fn test_unknown_tenant_maps_to_invalid_auth() {
        assert_eq!(IngestError::from(TenantError::NotFound), IngestError::InvalidAuth);
    }
}
