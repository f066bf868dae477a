use std::fmt;

/// Stable tag carried by every error, independent of its `Display` text.
///
/// Callers (notably the CLI's diagnostic renderer) match on this instead of
/// parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VibORMErrorCode {
    InvalidInput,
    InvalidSchema,
    FeatureNotSupported,
    DialectMismatch,
    JournalDivergence,
    MigrationLockFailed,
    DriverNotSupported,
    Internal,
}

impl fmt::Display for VibORMErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::InvalidInput => "InvalidInputError",
            Self::InvalidSchema => "InvalidSchemaError",
            Self::FeatureNotSupported => "FeatureNotSupportedError",
            Self::DialectMismatch => "DialectMismatchError",
            Self::JournalDivergence => "JournalDivergenceError",
            Self::MigrationLockFailed => "MigrationLockFailedError",
            Self::DriverNotSupported => "DriverNotSupportedError",
            Self::Internal => "InternalError",
        };
        f.write_str(tag)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("feature not supported by dialect `{dialect}`: {message}")]
    FeatureNotSupported { dialect: String, message: String },

    #[error(
        "journal dialect mismatch: journal was created for `{expected}`, current dialect is `{actual}`"
    )]
    DialectMismatch { expected: String, actual: String },

    #[error("journal divergence: {message}")]
    JournalDivergence { message: String },

    #[error("could not acquire migration lock: {message}")]
    MigrationLockFailed { message: String },

    #[error("no driver registered for `{driver_or_dialect}`")]
    DriverNotSupported { driver_or_dialect: String },

    #[error("internal error: {message}")]
    Internal { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Database(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    #[must_use]
    pub fn code(&self) -> VibORMErrorCode {
        match self {
            Self::InvalidInput { .. } => VibORMErrorCode::InvalidInput,
            Self::InvalidSchema { .. } => VibORMErrorCode::InvalidSchema,
            Self::FeatureNotSupported { .. } => VibORMErrorCode::FeatureNotSupported,
            Self::DialectMismatch { .. } => VibORMErrorCode::DialectMismatch,
            Self::JournalDivergence { .. } => VibORMErrorCode::JournalDivergence,
            Self::MigrationLockFailed { .. } => VibORMErrorCode::MigrationLockFailed,
            Self::DriverNotSupported { .. } => VibORMErrorCode::DriverNotSupported,
            Self::Io(_) | Self::Serde(_) | Self::Database(_) | Self::Internal { .. } => {
                VibORMErrorCode::Internal
            }
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    pub fn feature_not_supported(dialect: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FeatureNotSupported {
            dialect: dialect.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn database(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Database(Box::new(source))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
