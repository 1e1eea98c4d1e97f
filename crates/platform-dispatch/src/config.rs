//! Guard configuration.
//!
//! The role table, resource list, and rule set are an immutable value built
//! once at process bootstrap and shared as `Arc<GuardConfig>` into every
//! request's [`DispatchGuard`](crate::DispatchGuard). The defaults are the
//! standard site setup; a JSON file or environment variables can override
//! them.

use platform_acl::{AclError, AclResult, PermissionMatrix, ResourceRegistry, RoleTable, Rule};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::collaborators::RequestContext;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },

    /// Configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration JSON is malformed.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// Role table or rule set is inconsistent.
    #[error("Invalid access control setup: {0}")]
    Acl(#[from] AclError),
}

/// Where a denied request is sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedirectTarget {
    /// Target module.
    pub module: String,
    /// Target controller.
    pub controller: String,
    /// Target action.
    pub action: String,
}

impl Default for RedirectTarget {
    /// The login page: `default/login/index`.
    fn default() -> Self {
        Self {
            module: "default".to_string(),
            controller: "login".to_string(),
            action: "index".to_string(),
        }
    }
}

impl RedirectTarget {
    /// Point `request` at this target and mark it not yet dispatched, so the
    /// pipeline resolves and runs the dispatch cycle again.
    pub fn apply(&self, request: &mut dyn RequestContext) {
        request.set_module_name(&self.module);
        request.set_controller_name(&self.controller);
        request.set_action_name(&self.action);
        request.set_dispatched(false);
    }
}

/// Rules that depend on whether the caller is authenticated. They are
/// installed for the caller's resolved role, after the base rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRules {
    /// Resources denied to an authenticated caller.
    #[serde(default)]
    pub authenticated_denies: Vec<String>,
    /// Resources denied to an anonymous caller.
    #[serde(default)]
    pub anonymous_denies: Vec<String>,
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            authenticated_denies: vec!["login".to_string(), "register".to_string()],
            anonymous_denies: vec!["logout".to_string()],
        }
    }
}

impl SessionRules {
    /// The deny rules for `role`.
    pub fn rules_for(&self, role: &str, authenticated: bool) -> Vec<Rule> {
        let resources = if authenticated {
            &self.authenticated_denies
        } else {
            &self.anonymous_denies
        };
        resources
            .iter()
            .map(|resource| Rule::deny(role, Some(resource)))
            .collect()
    }
}

/// Dispatch guard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Ordered role table; position is the identity index.
    #[serde(default)]
    pub roles: RoleTable,

    /// Protected resources.
    #[serde(default = "default_resources")]
    pub resources: Vec<String>,

    /// Rules installed for every request.
    #[serde(default = "default_rules")]
    pub rules: Vec<Rule>,

    /// Rules installed for the caller's role depending on authentication.
    #[serde(default)]
    pub session_rules: SessionRules,

    /// Where denied requests are sent.
    #[serde(default)]
    pub redirect: RedirectTarget,

    /// Key the authorizer is published under in the process registry.
    #[serde(default = "default_registry_key")]
    pub registry_key: String,
}

fn default_resources() -> Vec<String> {
    [
        // default module
        "default", "index", "login", "logout", "register", "error", "install", "account",
        // member, moderator and admin modules
        "member", "moderator", "admin",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

fn default_rules() -> Vec<Rule> {
    vec![
        Rule::allow("anonymous", Some("default")),
        Rule::allow("anonymous", Some("login")),
        Rule::allow("anonymous", Some("logout")),
        Rule::allow("anonymous", Some("register")),
        Rule::allow("anonymous", Some("error")),
        // TODO: drop once the installer is removed from deployed sites
        Rule::allow("anonymous", Some("install")),
        Rule::allow("member", Some("account")),
        Rule::allow("member", Some("member")),
        Rule::allow("moderator", Some("moderator")),
        Rule::allow("administrator", None),
    ]
}

fn default_registry_key() -> String {
    "acl".to_string()
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            roles: RoleTable::default(),
            resources: default_resources(),
            rules: default_rules(),
            session_rules: SessionRules::default(),
            redirect: RedirectTarget::default(),
            registry_key: default_registry_key(),
        }
    }
}

impl GuardConfig {
    /// Parse configuration from JSON. Missing sections fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ACL_CONFIG_PATH`: JSON file to start from (default: built-in setup)
    /// - `ACL_REDIRECT_MODULE`: Module denied requests go to (default: default)
    /// - `ACL_REDIRECT_CONTROLLER`: Controller denied requests go to (default: login)
    /// - `ACL_REDIRECT_ACTION`: Action denied requests go to (default: index)
    /// - `ACL_REGISTRY_KEY`: Registry key for the authorizer (default: acl)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("ACL_CONFIG_PATH") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(module) = std::env::var("ACL_REDIRECT_MODULE") {
            config.redirect.module = module;
        }
        if let Ok(controller) = std::env::var("ACL_REDIRECT_CONTROLLER") {
            config.redirect.controller = controller;
        }
        if let Ok(action) = std::env::var("ACL_REDIRECT_ACTION") {
            config.redirect.action = action;
        }
        if let Ok(key) = std::env::var("ACL_REGISTRY_KEY") {
            config.registry_key = key;
        }

        Ok(config)
    }

    /// Build the registries and install the base rules.
    ///
    /// # Errors
    ///
    /// The first `AclError` from registering roles, resources, or rules.
    pub fn base_matrix(&self) -> AclResult<PermissionMatrix> {
        let roles = self.roles.registry()?;
        let resources = ResourceRegistry::from_names(&self.resources)?;
        let mut matrix = PermissionMatrix::new(roles, resources);
        matrix.install(self.rules.iter().cloned())?;
        Ok(matrix)
    }

    /// Check the whole setup once, so mistakes surface at bootstrap instead
    /// of on the first request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roles.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "roles".to_string(),
                message: "at least one role is required".to_string(),
            });
        }

        let matrix = self.base_matrix()?;
        for resource in self
            .session_rules
            .authenticated_denies
            .iter()
            .chain(&self.session_rules.anonymous_denies)
        {
            matrix.resources().get_resource(resource)?;
        }

        let redirect = [
            ("redirect.module", &self.redirect.module),
            ("redirect.controller", &self.redirect.controller),
            ("redirect.action", &self.redirect.action),
        ];
        for (key, value) in redirect {
            if value.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must not be empty".to_string(),
                });
            }
        }

        if self.registry_key.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "registry_key".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
