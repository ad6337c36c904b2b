//! Error taxonomy for mapping configuration, reading, writing and reference
//! resolution.
//!
//! Configuration errors surface from `DescriptorRegistry::initialize` only.
//! Everything else is raised while a single marshal/unmarshal call runs and
//! aborts that call without touching shared descriptor state.

use crate::reference::UnresolvedReference;

/// Broad classification of an [`OxmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad descriptor or mapping setup, raised at initialize time
    Configuration,
    /// No descriptor/subtype could be chosen for a node
    Resolution,
    /// Cross-reference keys that did not resolve, or resolver misuse
    Reference,
    /// Identity/copy protocol used on a kind that cannot take part in it
    UnsupportedOperation,
    /// Scalar text could not be coerced
    Conversion,
    /// Attachment transport failures
    Attachment,
    /// Malformed input document
    Parse,
}

/// Errors produced by the mapping engine.
#[derive(Debug, thiserror::Error)]
pub enum OxmError {
    #[error("invalid path expression '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("unresolved namespace prefix '{prefix}' in path '{path}'")]
    UnresolvedPrefix { prefix: String, path: String },

    #[error("mapping '{attribute}' on '{type_name}' has no field path")]
    MissingFieldPath { type_name: String, attribute: String },

    #[error("invalid container: {0}")]
    InvalidContainer(String),

    #[error("invalid mapping '{attribute}' on '{type_name}': {reason}")]
    InvalidMapping {
        type_name: String,
        attribute: String,
        reason: String,
    },

    #[error("no descriptor registered for type '{0}'")]
    UnknownType(String),

    #[error("type '{type_name}' has no direct mapping for primary key field '{field}'")]
    MissingPrimaryKey { type_name: String, field: String },

    #[error("descriptor registry has not been initialized")]
    NotInitialized,

    #[error("no descriptor found for element '{0}'")]
    NoDescriptorForElement(String),

    #[error("no subtype of '{base}' matches indicator value '{indicator}'")]
    NoSubtypeForIndicator { base: String, indicator: String },

    #[error("cannot instantiate abstract type '{0}'")]
    AbstractType(String),

    #[error("type '{0}' has no default root element")]
    NoDefaultRootElement(String),

    #[error("cannot convert '{text}' to {target}")]
    Conversion { text: String, target: String },

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("{} unresolved reference(s), first: {}", .0.len(), describe_first(.0))]
    UnresolvedReferences(Vec<UnresolvedReference>),

    #[error("reference resolver is {actual}, expected {expected}")]
    ResolverState {
        actual: &'static str,
        expected: &'static str,
    },

    #[error("operation '{operation}' is not valid for {kind} mapping '{attribute}'")]
    InvalidMappingOperation {
        operation: &'static str,
        kind: &'static str,
        attribute: String,
    },

    #[error("attachment error: {0}")]
    Attachment(String),

    #[error("XML parsing error: {0}")]
    XmlParse(#[from] roxmltree::Error),
}

fn describe_first(refs: &[UnresolvedReference]) -> String {
    refs.first().map(|r| r.to_string()).unwrap_or_default()
}

impl OxmError {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            OxmError::InvalidPath { .. }
            | OxmError::UnresolvedPrefix { .. }
            | OxmError::MissingFieldPath { .. }
            | OxmError::InvalidContainer(_)
            | OxmError::InvalidMapping { .. }
            | OxmError::UnknownType(_)
            | OxmError::MissingPrimaryKey { .. }
            | OxmError::NotInitialized => ErrorCategory::Configuration,
            OxmError::NoDescriptorForElement(_)
            | OxmError::NoSubtypeForIndicator { .. }
            | OxmError::AbstractType(_)
            | OxmError::NoDefaultRootElement(_) => ErrorCategory::Resolution,
            OxmError::UnresolvedReferences(_) | OxmError::ResolverState { .. } => {
                ErrorCategory::Reference
            }
            OxmError::InvalidMappingOperation { .. } => ErrorCategory::UnsupportedOperation,
            OxmError::Conversion { .. } | OxmError::Base64(_) | OxmError::Hex(_) => {
                ErrorCategory::Conversion
            }
            OxmError::Attachment(_) => ErrorCategory::Attachment,
            OxmError::XmlParse(_) => ErrorCategory::Parse,
        }
    }

    pub(crate) fn invalid_mapping(
        type_name: &str,
        attribute: &str,
        reason: impl Into<String>,
    ) -> Self {
        OxmError::InvalidMapping {
            type_name: type_name.to_string(),
            attribute: attribute.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn conversion(text: &str, target: impl std::fmt::Display) -> Self {
        OxmError::Conversion {
            text: text.to_string(),
            target: target.to_string(),
        }
    }
}

/// Result type alias for mapping operations
pub type Result<T> = std::result::Result<T, OxmError>;
