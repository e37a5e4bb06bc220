//! Error types for the vCenter folder crate.

use std::fmt;

/// Categorised error kinds.
///
/// Platform faults returned by mutation calls are tagged with their own
/// variant so the reconciler can decide between fatal and recoverable
/// outcomes with an exhaustive `match`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderErrorKind {
    /// Invalid or conflicting request parameters
    Config,
    /// vCenter unreachable or session expired
    ConnectionError,
    /// Authentication failed (401)
    AuthenticationError,
    /// A required inventory object (datacenter, parent, path segment) is missing
    NotFound,
    /// A managed object reference no longer resolves on the server
    ManagedObjectNotFound,
    /// Another object already has this name in the target folder
    DuplicateName,
    /// Name is not a valid entity name
    InvalidName,
    /// Another client modified the object mid-operation
    ConcurrentAccess,
    /// Object is not in a state that allows the operation
    InvalidState,
    /// Operation not supported on this object
    NotSupported,
    /// Task failed on vCenter
    TaskError,
    /// Timeout
    Timeout,
    /// Permission denied (403)
    AccessDenied,
    /// HTTP / API error with status code
    ApiError(u16),
    /// JSON parse / deserialization error
    ParseError,
    /// Unclassified vSphere fault, carrying its `_typeName`
    Fault(String),
    /// Generic
    Other,
}

impl FolderErrorKind {
    /// Map a vSphere fault `_typeName` onto a kind.
    pub fn from_fault_type(type_name: &str) -> Self {
        match type_name {
            "DuplicateName" => Self::DuplicateName,
            "InvalidName" => Self::InvalidName,
            "ConcurrentAccess" => Self::ConcurrentAccess,
            "InvalidState" => Self::InvalidState,
            "ManagedObjectNotFound" => Self::ManagedObjectNotFound,
            "NotSupported" => Self::NotSupported,
            "NoPermission" => Self::AccessDenied,
            "NotAuthenticated" | "InvalidLogin" => Self::AuthenticationError,
            other => Self::Fault(other.to_string()),
        }
    }
}

/// Crate error type carrying a kind + human-readable message.
#[derive(Debug, Clone)]
pub struct FolderError {
    pub kind: FolderErrorKind,
    pub message: String,
}

impl FolderError {
    pub fn new(kind: FolderErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(FolderErrorKind::Config, msg)
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::new(FolderErrorKind::ConnectionError, msg)
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::new(FolderErrorKind::AuthenticationError, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(FolderErrorKind::NotFound, msg)
    }

    pub fn api(status: u16, msg: impl Into<String>) -> Self {
        Self::new(FolderErrorKind::ApiError(status), msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(FolderErrorKind::ParseError, msg)
    }

    pub fn task(msg: impl Into<String>) -> Self {
        Self::new(FolderErrorKind::TaskError, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(FolderErrorKind::Timeout, msg)
    }

    /// Build an error from a vSphere fault type name and its message.
    pub fn fault(type_name: &str, msg: impl Into<String>) -> Self {
        Self::new(FolderErrorKind::from_fault_type(type_name), msg)
    }

    /// Keep the kind, prefix the message.
    pub fn with_context(self, context: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{context} : {}", self.message),
        }
    }

    /// Whether this is a configuration error raised before any inventory call.
    pub fn is_config(&self) -> bool {
        self.kind == FolderErrorKind::Config
    }
}

impl fmt::Display for FolderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for FolderError {}

impl From<reqwest::Error> for FolderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::timeout(format!("HTTP timeout: {e}"))
        } else if e.is_connect() {
            Self::connection(format!("Connection failed: {e}"))
        } else {
            Self::new(FolderErrorKind::Other, format!("HTTP error: {e}"))
        }
    }
}

impl From<serde_json::Error> for FolderError {
    fn from(e: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {e}"))
    }
}

/// Convenience alias.
pub type FolderResult<T> = Result<T, FolderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_types_map_to_kinds() {
        assert_eq!(
            FolderErrorKind::from_fault_type("DuplicateName"),
            FolderErrorKind::DuplicateName
        );
        assert_eq!(
            FolderErrorKind::from_fault_type("ConcurrentAccess"),
            FolderErrorKind::ConcurrentAccess
        );
        assert_eq!(
            FolderErrorKind::from_fault_type("InvalidState"),
            FolderErrorKind::InvalidState
        );
        assert_eq!(
            FolderErrorKind::from_fault_type("ResourceInUse"),
            FolderErrorKind::Fault("ResourceInUse".into())
        );
    }

    #[test]
    fn context_keeps_kind() {
        let err = FolderError::fault("InvalidName", "bad name").with_context("Failed to create folder");
        assert_eq!(err.kind, FolderErrorKind::InvalidName);
        assert_eq!(err.message, "Failed to create folder : bad name");
    }

    #[test]
    fn display_includes_kind_and_message() {
        let s = FolderError::not_found("Could not find folder x").to_string();
        assert!(s.contains("NotFound"));
        assert!(s.contains("Could not find folder x"));
    }
}
