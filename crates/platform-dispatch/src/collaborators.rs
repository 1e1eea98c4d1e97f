//! Contracts for the pipeline pieces the guard talks to.
//!
//! The guard does not authenticate users, render views, draw menus, or route
//! requests. It only needs the narrow method sets below from whatever host
//! framework does.

use platform_acl::PermissionMatrix;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::authorizer::Authorizer;

/// Reports whether the caller is authenticated and which role index they hold.
pub trait AuthProvider {
    /// Check if an authenticated identity is present.
    fn has_identity(&self) -> bool;

    /// The caller's identity index into the role table.
    ///
    /// Only meaningful when [`has_identity`](Self::has_identity) is `true`.
    fn identity_index(&self) -> usize;
}

/// Profile record kept by the authentication layer for the current session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredIdentity {
    /// User ID
    #[serde(default)]
    pub id: Option<u64>,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Email address
    #[serde(default)]
    pub email: Option<String>,
}

/// Session storage of the authentication layer.
pub trait AuthStorage {
    /// Read the stored profile record. Empty for anonymous callers.
    fn read(&self) -> StoredIdentity;
}

/// The in-flight request as seen by the dispatcher.
///
/// The mutators are only used when a request is denied.
pub trait RequestContext {
    /// Requested module.
    fn module_name(&self) -> &str;

    /// Requested controller.
    fn controller_name(&self) -> &str;

    /// Requested action.
    fn action_name(&self) -> &str;

    /// Retarget the module.
    fn set_module_name(&mut self, module: &str);

    /// Retarget the controller.
    fn set_controller_name(&mut self, controller: &str);

    /// Retarget the action.
    fn set_action_name(&mut self, action: &str);

    /// Mark the request as dispatched or not. `false` makes the pipeline run
    /// the dispatch cycle again.
    fn set_dispatched(&mut self, dispatched: bool);
}

/// Data handed to the template layer.
pub trait ViewSink {
    /// Assign a template variable.
    fn assign(&mut self, key: &str, value: Value);
}

/// Navigation menu renderer hooks.
pub trait NavigationMenu {
    /// Matrix used to hide menu entries the caller may not access.
    fn set_default_permission_source(&mut self, matrix: Arc<PermissionMatrix>);

    /// Role the menu is rendered for.
    fn set_default_role(&mut self, role: &str);
}

/// Request-scoped registry later pipeline stages read the authorizer from.
pub trait ProcessRegistry {
    /// Publish `authorizer` under `key`.
    fn set(&mut self, key: &str, authorizer: Arc<Authorizer>);
}

/// Everything the guard needs besides the request itself.
pub struct Collaborators<'a> {
    /// Authentication provider.
    pub auth: &'a dyn AuthProvider,
    /// Authentication session storage.
    pub storage: &'a dyn AuthStorage,
    /// Template variable sink.
    pub view: &'a mut dyn ViewSink,
    /// Navigation menu hooks.
    pub navigation: &'a mut dyn NavigationMenu,
    /// Request-scoped registry.
    pub registry: &'a mut dyn ProcessRegistry,
}
