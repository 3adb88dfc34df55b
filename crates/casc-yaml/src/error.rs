//! Error types for YAML parsing with source locations.

use crate::SourceInfo;
use thiserror::Error;

/// Result type alias for casc-yaml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Prefix of the alias-limit message; callers match on the variant, not the text.
pub const ALIAS_LIMIT_MESSAGE: &str = "Number of aliases for non-scalar nodes exceeds the specified max";

/// Prefix of the message for documents whose aliases copy too many nodes.
pub const ALIAS_EXPANSION_MESSAGE: &str = "Number of nodes copied by aliases exceeds the specified max";

/// Errors that can occur during YAML parsing.
#[derive(Debug, Error)]
pub enum Error {
    /// YAML syntax error reported by the scanner or parser.
    #[error("{message}")]
    Syntax {
        message: String,
        location: Option<SourceInfo>,
    },

    /// The stream holds more than one YAML document.
    #[error("expected a single document in the stream, but found another document at {location}")]
    MultipleDocuments { location: SourceInfo },

    /// A mapping defines the same key twice.
    #[error("found duplicate key '{key}' at {location}")]
    DuplicateKey { key: String, location: SourceInfo },

    /// An alias refers to an anchor that was never defined.
    #[error("found undefined alias at {location}")]
    UndefinedAlias { location: SourceInfo },

    /// Too many aliases point at sequences or mappings.
    #[error("{ALIAS_LIMIT_MESSAGE}={max}")]
    AliasLimitExceeded { max: usize, location: SourceInfo },

    /// Aliases copied more nodes than the expansion budget allows.
    #[error("{ALIAS_EXPANSION_MESSAGE}={max_nodes}")]
    AliasExpansionExceeded { max_nodes: usize, location: SourceInfo },

    /// The character stream could not be read or is not valid UTF-8.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Source location of the failure, when one is known.
    pub fn location(&self) -> Option<&SourceInfo> {
        match self {
            Error::Syntax { location, .. } => location.as_ref(),
            Error::MultipleDocuments { location }
            | Error::DuplicateKey { location, .. }
            | Error::UndefinedAlias { location }
            | Error::AliasLimitExceeded { location, .. }
            | Error::AliasExpansionExceeded { location, .. } => Some(location),
            Error::Io(_) => None,
        }
    }
}

impl From<yaml_rust2::ScanError> for Error {
    fn from(err: yaml_rust2::ScanError) -> Self {
        Error::Syntax {
            message: err.to_string(),
            location: None,
        }
    }
}
