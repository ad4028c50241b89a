use thiserror::Error;

use crate::model::{Environment, Id};

pub type Result<T> = std::result::Result<T, EngineError>;

/// Error taxonomy of the reconciliation and lifecycle engine. Every variant
/// carries enough context to report to the caller without a retry; downstream
/// collaborator failures are wrapped as `Internal` unless they map onto one of
/// the typed kinds.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("caller is not authorized to update field '{field}'; requires one of {required:?}")]
    ScopeDenied {
        field: String,
        required: Vec<String>,
    },

    #[error("no resource operations found in the definition")]
    NoResourcesFound,

    #[error(
        "cannot remove resource paths {resources:?} from {name} {version} because they are used by one or more products"
    )]
    ResourceInUse {
        name: String,
        version: String,
        resources: Vec<String>,
    },

    #[error("client secret is not provided for {environment} endpoint security")]
    InvalidEndpointCredentials { environment: Environment },

    #[error("error while encrypting endpoint credentials: {0}")]
    EndpointCrypto(String),

    #[error("action '{action}' is not allowed; allowed actions are {allowed:?}")]
    InvalidLifecycleAction {
        action: String,
        allowed: Vec<String>,
    },

    #[error("malformed definition document: {0}")]
    DefinitionParse(String),

    #[error("invalid category name(s) {names:?} for organization '{organization}'")]
    CategoryInvalid {
        names: Vec<String>,
        organization: String,
    },

    #[error("descriptor {id} was modified concurrently (expected revision {expected})")]
    ConflictingUpdate { id: Id, expected: u64 },

    #[error("descriptor {0} not found")]
    NotFound(Id),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable code, independent of the display message.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::ScopeDenied { .. } => "SCOPE_DENIED",
            EngineError::NoResourcesFound => "NO_RESOURCES_FOUND",
            EngineError::ResourceInUse { .. } => "RESOURCE_IN_USE",
            EngineError::InvalidEndpointCredentials { .. } => "INVALID_ENDPOINT_CREDENTIALS",
            EngineError::EndpointCrypto(_) => "ENDPOINT_CRYPTO_ERROR",
            EngineError::InvalidLifecycleAction { .. } => "UNSUPPORTED_LIFECYCLE_ACTION",
            EngineError::DefinitionParse(_) => "DEFINITION_PARSE_ERROR",
            EngineError::CategoryInvalid { .. } => "CATEGORY_INVALID",
            EngineError::ConflictingUpdate { .. } => "CONFLICTING_UPDATE",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(EngineError::NoResourcesFound.code(), "NO_RESOURCES_FOUND");
        assert_eq!(
            EngineError::InvalidEndpointCredentials {
                environment: Environment::Sandbox
            }
            .code(),
            "INVALID_ENDPOINT_CREDENTIALS"
        );
    }

    #[test]
    fn messages_name_the_offending_context() {
        let err = EngineError::InvalidEndpointCredentials {
            environment: Environment::Production,
        };
        assert!(err.to_string().contains("production"));

        let err = EngineError::InvalidLifecycleAction {
            action: "Retire".to_string(),
            allowed: vec!["Publish".to_string()],
        };
        assert!(err.to_string().contains("Publish"));
    }
}
