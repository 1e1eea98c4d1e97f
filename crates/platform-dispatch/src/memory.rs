//! In-memory collaborators.
//!
//! Suitable for tests and for hosts that keep request state in plain structs.
//! Each type implements one or more of the traits in
//! [`collaborators`](crate::collaborators).

use platform_acl::PermissionMatrix;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::authorizer::Authorizer;
use crate::collaborators::{
    AuthProvider, AuthStorage, NavigationMenu, ProcessRegistry, RequestContext, StoredIdentity,
    ViewSink,
};

/// Fixed authentication state: an optional identity index plus the stored
/// profile record.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    identity: Option<usize>,
    profile: StoredIdentity,
}

impl StaticAuth {
    /// An anonymous caller with an empty profile.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated caller holding the role at `identity`.
    pub fn authenticated(identity: usize) -> Self {
        Self {
            identity: Some(identity),
            profile: StoredIdentity::default(),
        }
    }

    /// Attach a stored profile record.
    pub fn with_profile(mut self, id: u64, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.profile = StoredIdentity {
            id: Some(id),
            name: Some(name.into()),
            email: Some(email.into()),
        };
        self
    }
}

impl AuthProvider for StaticAuth {
    fn has_identity(&self) -> bool {
        self.identity.is_some()
    }

    fn identity_index(&self) -> usize {
        self.identity.unwrap_or(0)
    }
}

impl AuthStorage for StaticAuth {
    fn read(&self) -> StoredIdentity {
        self.profile.clone()
    }
}

/// A request target plus its dispatched flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRequest {
    module: String,
    controller: String,
    action: String,
    dispatched: bool,
}

impl MemoryRequest {
    /// Create a request for `module/controller/action`, marked dispatched as
    /// it is when the dispatch loop invokes the guard.
    pub fn new(
        module: impl Into<String>,
        controller: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            controller: controller.into(),
            action: action.into(),
            dispatched: true,
        }
    }

    /// Check the dispatched flag.
    pub fn is_dispatched(&self) -> bool {
        self.dispatched
    }
}

impl RequestContext for MemoryRequest {
    fn module_name(&self) -> &str {
        &self.module
    }

    fn controller_name(&self) -> &str {
        &self.controller
    }

    fn action_name(&self) -> &str {
        &self.action
    }

    fn set_module_name(&mut self, module: &str) {
        self.module = module.to_string();
    }

    fn set_controller_name(&mut self, controller: &str) {
        self.controller = controller.to_string();
    }

    fn set_action_name(&mut self, action: &str) {
        self.action = action.to_string();
    }

    fn set_dispatched(&mut self, dispatched: bool) {
        self.dispatched = dispatched;
    }
}

/// Template variables collected in a map.
#[derive(Debug, Clone, Default)]
pub struct MemoryView {
    values: BTreeMap<String, Value>,
    assignments: usize,
}

impl MemoryView {
    /// Create an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an assigned value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Number of `assign` calls received, including overwrites.
    pub fn assignments(&self) -> usize {
        self.assignments
    }

    /// All assigned values.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }
}

impl ViewSink for MemoryView {
    fn assign(&mut self, key: &str, value: Value) {
        self.assignments += 1;
        self.values.insert(key.to_string(), value);
    }
}

/// Records what the guard hands to the navigation menu.
#[derive(Debug, Clone, Default)]
pub struct MemoryNavigation {
    permission_source: Option<Arc<PermissionMatrix>>,
    default_role: Option<String>,
}

impl MemoryNavigation {
    /// Create an unconfigured menu.
    pub fn new() -> Self {
        Self::default()
    }

    /// Matrix the menu filters entries with.
    pub fn permission_source(&self) -> Option<&Arc<PermissionMatrix>> {
        self.permission_source.as_ref()
    }

    /// Role the menu renders for.
    pub fn default_role(&self) -> Option<&str> {
        self.default_role.as_deref()
    }

    /// Check if the menu would show an entry guarded by `resource`.
    pub fn is_visible(&self, resource: &str) -> bool {
        match (&self.permission_source, &self.default_role) {
            (Some(matrix), Some(role)) => matrix.is_allowed(role, resource),
            _ => false,
        }
    }
}

impl NavigationMenu for MemoryNavigation {
    fn set_default_permission_source(&mut self, matrix: Arc<PermissionMatrix>) {
        self.permission_source = Some(matrix);
    }

    fn set_default_role(&mut self, role: &str) {
        self.default_role = Some(role.to_string());
    }
}

/// Request-scoped registry backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    entries: HashMap<String, Arc<Authorizer>>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a published authorizer.
    pub fn get(&self, key: &str) -> Option<&Arc<Authorizer>> {
        self.entries.get(key)
    }

    /// Number of published entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ProcessRegistry for MemoryRegistry {
    fn set(&mut self, key: &str, authorizer: Arc<Authorizer>) {
        self.entries.insert(key.to_string(), authorizer);
    }
}
