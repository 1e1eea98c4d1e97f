//! # Resources
//!
//! Protected resources are coarse boundaries: one per module or controller
//! area (`admin`, `member`, `login`, ...). They have no internal structure.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{AclError, AclResult};

/// A protected resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Resource {
    /// Unique resource name.
    pub name: String,
}

impl Resource {
    /// Create a resource.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Get the resource name.
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

/// Registry of protected resources.
///
/// Registering the same name twice is an error, so a typo'd duplicate in a
/// resource list is caught during setup.
///
/// # Example
///
/// ```
/// use platform_acl::ResourceRegistry;
///
/// let mut resources = ResourceRegistry::new();
/// resources.add_resource("admin").unwrap();
///
/// assert!(resources.get_resource("admin").is_ok());
/// assert!(resources.get_resource("blog").is_err());
/// assert!(resources.add_resource("admin").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    /// Resources in registration order.
    resources: Vec<Resource>,
    /// Name to position in `resources`.
    index: HashMap<String, usize>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from a list of names.
    ///
    /// # Errors
    ///
    /// `DuplicateResource` on the first repeated name.
    pub fn from_names<I, S>(names: I) -> AclResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.add_resource(name.as_ref())?;
        }
        Ok(registry)
    }

    /// Register a resource.
    ///
    /// # Errors
    ///
    /// `DuplicateResource` if the name is already registered.
    pub fn add_resource(&mut self, name: &str) -> AclResult<&Resource> {
        if self.index.contains_key(name) {
            return Err(AclError::DuplicateResource(name.to_string()));
        }
        debug!(resource = %name, "Registering resource");
        let position = self.resources.len();
        self.index.insert(name.to_string(), position);
        self.resources.push(Resource::new(name));
        Ok(&self.resources[position])
    }

    /// Get a registered resource.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` if the resource was never registered.
    pub fn get_resource(&self, name: &str) -> AclResult<&Resource> {
        self.index
            .get(name)
            .map(|&position| &self.resources[position])
            .ok_or_else(|| AclError::ResourceNotFound(name.to_string()))
    }

    /// Check if a resource is registered.
    pub fn has_resource(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterate resources in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if no resource is registered.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
