//! Caller-aware authorization.
//!
//! An [`Authorizer`] pairs the installed permission matrix with the caller's
//! resolved role. The dispatch guard builds one per request and publishes it;
//! later stages use it for ad-hoc checks such as
//! [`has_allowed_role`](Authorizer::has_allowed_role).

use platform_acl::{AclError, AclResult, PermissionMatrix, RoleDefinition, RoleTable};
use std::sync::Arc;
use tracing::debug;

use crate::config::GuardConfig;

/// Answers authorization questions for one caller.
///
/// # Example
///
/// ```
/// use platform_dispatch::{Authorizer, GuardConfig};
/// use std::sync::Arc;
///
/// let config = Arc::new(GuardConfig::default());
/// let matrix = Arc::new(config.base_matrix().unwrap());
/// let authorizer = Authorizer::new(config, matrix, Some(1)).unwrap();
///
/// assert_eq!(authorizer.role().key, "member");
/// assert_eq!(authorizer.role_name(), "Member");
/// assert!(authorizer.can_access("member"));
/// assert!(!authorizer.can_access("admin"));
/// assert!(authorizer.has_allowed_role(["member", "moderator"]).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct Authorizer {
    config: Arc<GuardConfig>,
    matrix: Arc<PermissionMatrix>,
    identity: usize,
    role: RoleDefinition,
}

impl Authorizer {
    /// Create an authorizer for the caller with the given identity index.
    /// `None` is an anonymous caller (index 0).
    ///
    /// # Errors
    ///
    /// `IdentityOutOfRange` if the index has no role in the table.
    pub fn new(
        config: Arc<GuardConfig>,
        matrix: Arc<PermissionMatrix>,
        identity: Option<usize>,
    ) -> AclResult<Self> {
        let role = config.roles.resolve(identity)?.clone();
        Ok(Self {
            identity: identity.unwrap_or(0),
            config,
            matrix,
            role,
        })
    }

    /// Map an identity index to its role. `None` means anonymous (index 0).
    ///
    /// # Errors
    ///
    /// `IdentityOutOfRange` if the index has no role in the table.
    pub fn resolve_role(&self, identity: Option<usize>) -> AclResult<&RoleDefinition> {
        self.config.roles.resolve(identity)
    }

    /// The caller's resolved role.
    pub fn role(&self) -> &RoleDefinition {
        &self.role
    }

    /// The caller's identity index (0 when anonymous).
    pub fn identity(&self) -> usize {
        self.identity
    }

    /// Display name of the caller's role (e.g. `Member`).
    pub fn role_name(&self) -> &str {
        &self.role.display_name
    }

    /// Identity index of a role.
    ///
    /// # Errors
    ///
    /// `RoleLookup` wrapping `RoleNotFound` if the role is not registered.
    pub fn key_for_role(&self, role: &str) -> AclResult<usize> {
        let lookup = |source: AclError| AclError::RoleLookup {
            role: role.to_string(),
            source: Box::new(source),
        };
        self.matrix.roles().get_role(role).map_err(lookup)?;
        self.config
            .roles
            .position(role)
            .ok_or_else(|| lookup(AclError::RoleNotFound(role.to_string())))
    }

    /// Check if `role` may access `resource`.
    pub fn is_allowed(&self, role: &str, resource: &str) -> bool {
        self.matrix.is_allowed(role, resource)
    }

    /// Check if the caller may access `resource`.
    pub fn can_access(&self, resource: &str) -> bool {
        self.matrix.is_allowed(&self.role.key, resource)
    }

    /// Decide a dispatch to `module`/`controller` for the caller.
    ///
    /// The module must be allowed. The controller is checked as a resource
    /// too, and blocks the request when an explicit deny decides it; a
    /// controller without any applicable rule does not.
    pub fn authorize_dispatch(&self, module: &str, controller: &str) -> bool {
        let role = self.role.key.as_str();
        let module_allowed = self.matrix.is_allowed(role, module);
        let controller_denied = self.matrix.is_explicitly_denied(role, controller);
        debug!(
            role = %role,
            module = %module,
            controller = %controller,
            module_allowed,
            controller_denied,
            "Evaluated dispatch"
        );
        module_allowed && !controller_denied
    }

    /// Check if the caller's role is one of `required`.
    ///
    /// Membership is literal: a moderator is not a member here even though
    /// it inherits member's rules. Every name is validated before the check.
    ///
    /// # Errors
    ///
    /// `RoleNotFound` for the first unregistered name in `required`.
    pub fn has_allowed_role<I, S>(&self, required: I) -> AclResult<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let required: Vec<S> = required.into_iter().collect();
        for role in &required {
            self.matrix.roles().get_role(role.as_ref())?;
        }
        Ok(required.iter().any(|role| role.as_ref() == self.role.key))
    }

    /// The ordered role table.
    pub fn roles(&self) -> &RoleTable {
        &self.config.roles
    }

    /// The installed permission matrix.
    pub fn matrix(&self) -> &Arc<PermissionMatrix> {
        &self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorizer(identity: Option<usize>) -> AclResult<Authorizer> {
        let config = Arc::new(GuardConfig::default());
        let matrix = Arc::new(config.base_matrix()?);
        Authorizer::new(config, matrix, identity)
    }

    #[test]
    fn test_resolve_roles_by_identity() {
        let keys: Vec<String> = (0..4)
            .map(|i| authorizer(Some(i)).unwrap().role().key.clone())
            .collect();
        assert_eq!(keys, vec!["anonymous", "member", "moderator", "administrator"]);
    }

    #[test]
    fn test_identity_out_of_range() {
        let err = authorizer(Some(4)).unwrap_err();
        assert!(matches!(err, AclError::IdentityOutOfRange { index: 4, .. }));

        let anonymous = authorizer(None).unwrap();
        assert!(matches!(
            anonymous.resolve_role(Some(7)),
            Err(AclError::IdentityOutOfRange { index: 7, roles: 4 })
        ));
    }

    #[test]
    fn test_anonymous_is_index_zero() {
        let anonymous = authorizer(None).unwrap();
        assert_eq!(anonymous.identity(), 0);
        assert_eq!(anonymous.role().key, "anonymous");
        assert_eq!(anonymous.role_name(), "Anonymous");
    }

    #[test]
    fn test_has_allowed_role() {
        let required = ["moderator", "administrator"];
        assert!(authorizer(Some(3)).unwrap().has_allowed_role(required).unwrap());
        assert!(!authorizer(Some(1)).unwrap().has_allowed_role(required).unwrap());
    }

    #[test]
    fn test_has_allowed_role_is_literal() {
        // moderator inherits member's rules but is not a member
        let moderator = authorizer(Some(2)).unwrap();
        assert!(!moderator.has_allowed_role(["member"]).unwrap());
    }

    #[test]
    fn test_has_allowed_role_validates_first() {
        let administrator = authorizer(Some(3)).unwrap();
        let err = administrator.has_allowed_role(["superadmin"]).unwrap_err();
        assert!(matches!(err, AclError::RoleNotFound(ref name) if name == "superadmin"));

        // validation happens even when the caller's role is in the set
        let err = administrator
            .has_allowed_role(vec!["administrator".to_string(), "superadmin".to_string()])
            .unwrap_err();
        assert!(matches!(err, AclError::RoleNotFound(_)));
    }

    #[test]
    fn test_key_for_role() {
        let authorizer = authorizer(None).unwrap();
        assert_eq!(authorizer.key_for_role("anonymous").unwrap(), 0);
        assert_eq!(authorizer.key_for_role("administrator").unwrap(), 3);

        let err = authorizer.key_for_role("superadmin").unwrap_err();
        assert!(matches!(
            err,
            AclError::RoleLookup { ref role, ref source }
                if role == "superadmin" && matches!(**source, AclError::RoleNotFound(_))
        ));
    }

    #[test]
    fn test_is_allowed_for_any_role() {
        let authorizer = authorizer(None).unwrap();
        assert!(authorizer.is_allowed("member", "member"));
        assert!(!authorizer.is_allowed("member", "moderator"));
        assert!(authorizer.is_allowed("moderator", "member"));
        assert!(authorizer.is_allowed("administrator", "install"));
    }

    #[test]
    fn test_authorize_dispatch() {
        let member = authorizer(Some(1)).unwrap();
        assert!(member.authorize_dispatch("member", "index"));
        assert!(member.authorize_dispatch("default", "account"));
        assert!(!member.authorize_dispatch("admin", "index"));

        let anonymous = authorizer(None).unwrap();
        assert!(anonymous.authorize_dispatch("default", "index"));
        assert!(!anonymous.authorize_dispatch("member", "index"));
    }

    #[test]
    fn test_roles_are_enumerable() {
        let authorizer = authorizer(None).unwrap();
        let names: Vec<&str> = authorizer
            .roles()
            .iter()
            .map(|role| role.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Anonymous", "Member", "Moderator", "Administrator"]);
    }
}
