//! Roles and role inheritance
//!
//! Two views of the same roles live here:
//! - [`RoleTable`]: the ordered, immutable declaration. A role's position is
//!   the numeric identity index stored for users (0 = least privileged).
//! - [`RoleRegistry`]: the registered roles with their single-parent
//!   inheritance, used by the permission matrix to walk ancestors.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{AclError, AclResult};

/// A registered role.
///
/// Roles carry nothing but a name and an optional parent. A role with a
/// parent inherits every rule installed for the parent unless it has its own
/// rule for the same resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Role {
    /// Unique role name.
    pub name: String,
    /// Immediate parent, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Role {
    /// Create a root role.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
        }
    }

    /// Create a role inheriting from `parent`.
    pub fn with_parent(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent.into()),
        }
    }

    /// Check if this role has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Registry of roles and their inheritance relation.
///
/// A parent must be registered before its children, which rules out cycles.
///
/// # Example
///
/// ```
/// use platform_acl::RoleRegistry;
///
/// let mut roles = RoleRegistry::new();
/// roles.add_role("anonymous", None).unwrap();
/// roles.add_role("member", Some("anonymous")).unwrap();
///
/// assert_eq!(roles.parent_of("member").unwrap().map(|r| r.name.as_str()), Some("anonymous"));
/// assert!(roles.inherits("member", "anonymous"));
/// assert!(roles.add_role("editor", Some("missing")).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    /// Roles in registration order.
    roles: Vec<Role>,
    /// Role name to position in `roles`.
    index: HashMap<String, usize>,
}

impl RoleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a role, optionally inheriting from an already registered parent.
    ///
    /// # Errors
    ///
    /// - `RoleNotFound` if `parent` is given but not registered
    /// - `DuplicateRole` if `name` is already registered
    pub fn add_role(&mut self, name: &str, parent: Option<&str>) -> AclResult<&Role> {
        if self.index.contains_key(name) {
            return Err(AclError::DuplicateRole(name.to_string()));
        }
        if let Some(parent) = parent {
            if !self.index.contains_key(parent) {
                return Err(AclError::RoleNotFound(parent.to_string()));
            }
        }

        debug!(role = %name, parent = ?parent, "Registering role");
        let role = Role {
            name: name.to_string(),
            parent: parent.map(str::to_string),
        };
        let position = self.roles.len();
        self.index.insert(role.name.clone(), position);
        self.roles.push(role);
        Ok(&self.roles[position])
    }

    /// Get a registered role.
    ///
    /// # Errors
    ///
    /// `RoleNotFound` if the role was never registered.
    pub fn get_role(&self, name: &str) -> AclResult<&Role> {
        self.find(name)
            .ok_or_else(|| AclError::RoleNotFound(name.to_string()))
    }

    /// Get the immediate parent of a role, or `None` for a root role.
    ///
    /// # Errors
    ///
    /// `RoleNotFound` if the role was never registered.
    pub fn parent_of(&self, name: &str) -> AclResult<Option<&Role>> {
        let role = self.get_role(name)?;
        Ok(role.parent.as_deref().and_then(|parent| self.find(parent)))
    }

    /// Check if a role is registered.
    pub fn has_role(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Walk a role and its ancestors: the role itself first, then its parent,
    /// grandparent, and so on. Empty for an unregistered role.
    pub fn ancestry<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Role> + 'a {
        std::iter::successors(self.find(name), move |role| {
            role.parent.as_deref().and_then(|parent| self.find(parent))
        })
    }

    /// Check if `name` is `ancestor` or inherits from it, directly or not.
    pub fn inherits(&self, name: &str, ancestor: &str) -> bool {
        self.ancestry(name).any(|role| role.name == ancestor)
    }

    /// Iterate roles in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter()
    }

    /// Number of registered roles.
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Check if no role is registered.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    fn find(&self, name: &str) -> Option<&Role> {
        self.index.get(name).map(|&position| &self.roles[position])
    }
}

/// Declaration of one role in the [`RoleTable`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleDefinition {
    /// Role name used in rules (e.g. `member`).
    pub key: String,
    /// Human-readable name shown to users (e.g. `Member`).
    pub display_name: String,
    /// Parent role key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl RoleDefinition {
    /// Create a role definition.
    pub fn new(
        key: impl Into<String>,
        display_name: impl Into<String>,
        parent: Option<&str>,
    ) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            parent: parent.map(str::to_string),
        }
    }
}

/// Ordered list of declared roles.
///
/// The position of a role is its identity index: the authentication provider
/// stores that integer for each user, and [`RoleTable::resolve`] maps it back.
/// Anonymous callers resolve to position 0.
///
/// # Example
///
/// ```
/// use platform_acl::RoleTable;
///
/// let table = RoleTable::default();
/// assert_eq!(table.len(), 4);
/// assert_eq!(table.resolve(None).unwrap().key, "anonymous");
/// assert_eq!(table.resolve(Some(3)).unwrap().display_name, "Administrator");
/// assert!(table.resolve(Some(4)).is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct RoleTable {
    roles: Vec<RoleDefinition>,
}

impl RoleTable {
    /// Create a table from definitions in identity order.
    pub fn new(roles: Vec<RoleDefinition>) -> Self {
        Self { roles }
    }

    /// Map an identity index to its role. `None` (no identity) means index 0.
    ///
    /// # Errors
    ///
    /// `IdentityOutOfRange` if the index has no corresponding role.
    pub fn resolve(&self, identity: Option<usize>) -> AclResult<&RoleDefinition> {
        let index = identity.unwrap_or(0);
        self.roles.get(index).ok_or(AclError::IdentityOutOfRange {
            index,
            roles: self.roles.len(),
        })
    }

    /// Get the identity index of a role key.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.roles.iter().position(|role| role.key == key)
    }

    /// Get a role definition by position.
    pub fn get(&self, index: usize) -> Option<&RoleDefinition> {
        self.roles.get(index)
    }

    /// The most privileged role (last in the table).
    pub fn most_privileged(&self) -> Option<&RoleDefinition> {
        self.roles.last()
    }

    /// Build a [`RoleRegistry`] from this table.
    ///
    /// Roles are registered in table order, so a parent has to appear before
    /// its children.
    ///
    /// # Errors
    ///
    /// `RoleNotFound` for a parent declared later or not at all,
    /// `DuplicateRole` for a repeated key.
    pub fn registry(&self) -> AclResult<RoleRegistry> {
        let mut registry = RoleRegistry::new();
        for role in &self.roles {
            registry.add_role(&role.key, role.parent.as_deref())?;
        }
        Ok(registry)
    }

    /// Iterate role definitions in identity order.
    pub fn iter(&self) -> std::slice::Iter<'_, RoleDefinition> {
        self.roles.iter()
    }

    /// Number of declared roles.
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl Default for RoleTable {
    /// The standard site hierarchy: anonymous → member → moderator, with
    /// administrator as a separate root.
    fn default() -> Self {
        Self::new(vec![
            RoleDefinition::new("anonymous", "Anonymous", None),
            RoleDefinition::new("member", "Member", Some("anonymous")),
            RoleDefinition::new("moderator", "Moderator", Some("member")),
            RoleDefinition::new("administrator", "Administrator", None),
        ])
    }
}

impl<'a> IntoIterator for &'a RoleTable {
    type Item = &'a RoleDefinition;
    type IntoIter = std::slice::Iter<'a, RoleDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.roles.iter()
    }
}
