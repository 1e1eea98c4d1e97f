//! Error types for access control lists
//!
//! Every variant here is fatal for the current request cycle: it points at a
//! misconfigured role table or corrupt identity data. A denied authorization
//! is never reported through this type.

use thiserror::Error;

/// Access control error types.
#[derive(Debug, Error)]
pub enum AclError {
    /// A referenced role was never registered
    #[error("Role not found: {0}")]
    RoleNotFound(String),

    /// A referenced resource was never registered
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// The identity index has no corresponding role in the role table
    #[error("ACL role out of range: identity {index} with {roles} declared roles")]
    IdentityOutOfRange {
        /// Identity index reported by the authentication provider.
        index: usize,
        /// Number of declared roles.
        roles: usize,
    },

    /// A role with the same name is already registered
    #[error("Duplicate role: {0}")]
    DuplicateRole(String),

    /// A resource with the same name is already registered
    #[error("Duplicate resource: {0}")]
    DuplicateResource(String),

    /// Generic lookup failure wrapping the underlying registry error
    #[error("Could not find role {role}")]
    RoleLookup {
        /// The role name that was looked up.
        role: String,
        /// The registry error.
        #[source]
        source: Box<AclError>,
    },
}

/// Result type for access control operations.
pub type AclResult<T> = Result<T, AclError>;

impl AclError {
    /// Check if this error comes from the static role/resource/rule setup.
    ///
    /// `IdentityOutOfRange` is the only variant caused by runtime data rather
    /// than configuration.
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, AclError::IdentityOutOfRange { .. })
    }

    /// Get error code for logs and API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AclError::RoleNotFound(_) => "ROLE_NOT_FOUND",
            AclError::ResourceNotFound(_) => "RESOURCE_NOT_FOUND",
            AclError::IdentityOutOfRange { .. } => "IDENTITY_OUT_OF_RANGE",
            AclError::DuplicateRole(_) => "DUPLICATE_ROLE",
            AclError::DuplicateResource(_) => "DUPLICATE_RESOURCE",
            AclError::RoleLookup { .. } => "ROLE_LOOKUP_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AclError::RoleNotFound("x".to_string()).error_code(),
            "ROLE_NOT_FOUND"
        );
        assert_eq!(
            AclError::IdentityOutOfRange { index: 4, roles: 4 }.error_code(),
            "IDENTITY_OUT_OF_RANGE"
        );
    }

    #[test]
    fn test_configuration_errors() {
        assert!(AclError::ResourceNotFound("blog".to_string()).is_configuration_error());
        assert!(AclError::DuplicateRole("member".to_string()).is_configuration_error());
        assert!(!AclError::IdentityOutOfRange { index: 9, roles: 4 }.is_configuration_error());
    }

    #[test]
    fn test_role_lookup_keeps_source() {
        let err = AclError::RoleLookup {
            role: "superadmin".to_string(),
            source: Box::new(AclError::RoleNotFound("superadmin".to_string())),
        };
        assert_eq!(err.to_string(), "Could not find role superadmin");
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Role not found: superadmin"));
    }
}
