//! # Permissions
//!
//! Allow/deny rules keyed by role and resource, and the matrix that
//! evaluates them through role inheritance.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::error::AclResult;
use crate::resources::ResourceRegistry;
use crate::roles::RoleRegistry;

/// The effect of a rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Access is allowed.
    Allow,
    /// Access is denied.
    Deny,
}

impl Effect {
    /// Get the string representation of the effect.
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        }
    }

    /// Check if this effect is `Allow`.
    pub fn is_allow(&self) -> bool {
        matches!(self, Effect::Allow)
    }
}

/// A permission rule: `(role, resource-or-wildcard, effect)`.
///
/// A rule without a resource is a wildcard and applies to every resource for
/// its role.
///
/// # Example
///
/// ```
/// use platform_acl::Rule;
///
/// assert_eq!(Rule::allow("member", Some("account")).to_string(), "allow(member, account)");
/// assert_eq!(Rule::allow("administrator", None).to_string(), "allow(administrator, *)");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rule {
    /// Role the rule applies to.
    pub role: String,
    /// Resource the rule applies to; `None` for every resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Allow or deny.
    pub effect: Effect,
}

impl Rule {
    /// Create an allow rule.
    pub fn allow(role: impl Into<String>, resource: Option<&str>) -> Self {
        Self {
            role: role.into(),
            resource: resource.map(str::to_string),
            effect: Effect::Allow,
        }
    }

    /// Create a deny rule.
    pub fn deny(role: impl Into<String>, resource: Option<&str>) -> Self {
        Self {
            role: role.into(),
            resource: resource.map(str::to_string),
            effect: Effect::Deny,
        }
    }

    /// Check if this rule applies to every resource.
    pub fn is_wildcard(&self) -> bool {
        self.resource.is_none()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}, {})",
            self.effect.as_str(),
            self.role,
            self.resource.as_deref().unwrap_or("*")
        )
    }
}

/// Rules installed for a single role. Re-installing a key overwrites it, so
/// each slot holds the most recently installed effect.
#[derive(Debug, Clone, Default)]
struct RoleRules {
    exact: HashMap<String, Effect>,
    wildcard: Option<Effect>,
}

impl RoleRules {
    fn lookup(&self, resource: &str) -> Option<Effect> {
        self.exact.get(resource).copied().or(self.wildcard)
    }
}

/// Role/resource permission matrix.
///
/// Evaluation for `(role, resource)`:
/// 1. Walk the role, then its parent, grandparent, and so on.
/// 2. At each level an exact-resource rule wins over that level's wildcard;
///    the first level with any applicable rule decides.
/// 3. No rule anywhere in the chain means deny.
///
/// Rules reference registered roles and resources only; installation fails
/// fast otherwise. Once setup is done the matrix is read-only and every
/// decision is a pure function of the installed rules.
///
/// # Example
///
/// ```
/// use platform_acl::{PermissionMatrix, ResourceRegistry, RoleRegistry};
///
/// let mut roles = RoleRegistry::new();
/// roles.add_role("anonymous", None).unwrap();
/// roles.add_role("member", Some("anonymous")).unwrap();
/// let resources = ResourceRegistry::from_names(["login", "account"]).unwrap();
///
/// let mut matrix = PermissionMatrix::new(roles, resources);
/// matrix.allow("anonymous", Some("login")).unwrap();
/// matrix.allow("member", Some("account")).unwrap();
/// matrix.deny("member", Some("login")).unwrap();
///
/// assert!(matrix.is_allowed("anonymous", "login"));
/// assert!(!matrix.is_allowed("member", "login"));
/// assert!(matrix.is_allowed("member", "account"));
/// assert!(!matrix.is_allowed("anonymous", "account"));
/// ```
#[derive(Debug, Clone)]
pub struct PermissionMatrix {
    roles: RoleRegistry,
    resources: ResourceRegistry,
    /// Effective rules per role name.
    rules: HashMap<String, RoleRules>,
    /// Every installed rule, in installation order.
    installed: Vec<Rule>,
}

impl PermissionMatrix {
    /// Create an empty matrix over the given roles and resources.
    pub fn new(roles: RoleRegistry, resources: ResourceRegistry) -> Self {
        Self {
            roles,
            resources,
            rules: HashMap::new(),
            installed: Vec::new(),
        }
    }

    /// Install an allow rule. `None` allows every resource for the role.
    ///
    /// # Errors
    ///
    /// `RoleNotFound` / `ResourceNotFound` for unregistered names.
    pub fn allow(&mut self, role: &str, resource: Option<&str>) -> AclResult<()> {
        self.add_rule(Rule::allow(role, resource))
    }

    /// Install a deny rule. `None` denies every resource for the role.
    ///
    /// A deny installed after an allow for the same key supersedes it.
    ///
    /// # Errors
    ///
    /// `RoleNotFound` / `ResourceNotFound` for unregistered names.
    pub fn deny(&mut self, role: &str, resource: Option<&str>) -> AclResult<()> {
        self.add_rule(Rule::deny(role, resource))
    }

    /// Install a rule.
    ///
    /// # Errors
    ///
    /// `RoleNotFound` / `ResourceNotFound` for unregistered names.
    pub fn add_rule(&mut self, rule: Rule) -> AclResult<()> {
        self.roles.get_role(&rule.role)?;
        if let Some(ref resource) = rule.resource {
            self.resources.get_resource(resource)?;
        }

        debug!(rule = %rule, "Installing rule");
        let slot = self.rules.entry(rule.role.clone()).or_default();
        match rule.resource {
            Some(ref resource) => {
                slot.exact.insert(resource.clone(), rule.effect);
            }
            None => slot.wildcard = Some(rule.effect),
        }
        self.installed.push(rule);
        Ok(())
    }

    /// Install several rules in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// The first `RoleNotFound` / `ResourceNotFound` encountered.
    pub fn install<I>(&mut self, rules: I) -> AclResult<()>
    where
        I: IntoIterator<Item = Rule>,
    {
        for rule in rules {
            self.add_rule(rule)?;
        }
        Ok(())
    }

    /// Find the effect deciding `(role, resource)`, or `None` if no role in
    /// the inheritance chain has an applicable rule.
    pub fn effect_for(&self, role: &str, resource: &str) -> Option<Effect> {
        self.roles.ancestry(role).find_map(|level| {
            self.rules
                .get(&level.name)
                .and_then(|rules| rules.lookup(resource))
                .map(|effect| {
                    debug!(
                        role = %role,
                        resource = %resource,
                        decided_by = %level.name,
                        effect = effect.as_str(),
                        "Rule matched"
                    );
                    effect
                })
        })
    }

    /// Check if `role` may access `resource`. Defaults to deny.
    ///
    /// An unregistered resource has no exact rules, so only wildcard rules
    /// can allow it. An unregistered role is always denied.
    pub fn is_allowed(&self, role: &str, resource: &str) -> bool {
        self.effect_for(role, resource) == Some(Effect::Allow)
    }

    /// Check if an explicit deny decides `(role, resource)`.
    ///
    /// Unlike `!is_allowed`, this is `false` when no rule applies at all.
    pub fn is_explicitly_denied(&self, role: &str, resource: &str) -> bool {
        self.effect_for(role, resource) == Some(Effect::Deny)
    }

    /// The role registry the matrix evaluates against.
    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    /// The resource registry the matrix evaluates against.
    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    /// Every installed rule, in installation order.
    pub fn rules(&self) -> &[Rule] {
        &self.installed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AclError;
    use crate::roles::RoleTable;

    const RESOURCES: [&str; 11] = [
        "default", "index", "login", "logout", "register", "error", "install", "account",
        "member", "moderator", "admin",
    ];

    fn site_matrix() -> PermissionMatrix {
        let roles = RoleTable::default().registry().unwrap();
        let resources = ResourceRegistry::from_names(RESOURCES).unwrap();
        let mut matrix = PermissionMatrix::new(roles, resources);
        matrix
            .install(vec![
                Rule::allow("anonymous", Some("default")),
                Rule::allow("anonymous", Some("login")),
                Rule::allow("anonymous", Some("logout")),
                Rule::allow("anonymous", Some("register")),
                Rule::allow("anonymous", Some("error")),
                Rule::allow("anonymous", Some("install")),
                Rule::allow("member", Some("account")),
                Rule::allow("member", Some("member")),
                Rule::allow("moderator", Some("moderator")),
                Rule::allow("administrator", None),
            ])
            .unwrap();
        matrix
    }

    #[test]
    fn test_own_rules() {
        let matrix = site_matrix();
        assert!(matrix.is_allowed("member", "member"));
        assert!(!matrix.is_allowed("member", "moderator"));
        assert!(matrix.is_allowed("moderator", "moderator"));
    }

    #[test]
    fn test_inherited_rules() {
        let matrix = site_matrix();
        assert!(matrix.is_allowed("moderator", "member"));
        assert!(matrix.is_allowed("moderator", "account"));
        assert!(matrix.is_allowed("member", "login"));
        assert!(!matrix.is_allowed("moderator", "admin"));
    }

    #[test]
    fn test_default_deny() {
        let matrix = site_matrix();
        assert!(!matrix.is_allowed("anonymous", "admin"));
        assert!(!matrix.is_allowed("anonymous", "index"));
        assert_eq!(matrix.effect_for("anonymous", "index"), None);
        assert!(!matrix.is_explicitly_denied("anonymous", "index"));
    }

    #[test]
    fn test_administrator_wildcard() {
        let matrix = site_matrix();
        for resource in RESOURCES {
            assert!(matrix.is_allowed("administrator", resource), "{resource}");
        }
        // administrator does not inherit from anonymous
        assert!(!matrix.roles().inherits("administrator", "anonymous"));
    }

    #[test]
    fn test_deny_after_allow_supersedes() {
        let mut matrix = site_matrix();
        matrix.deny("anonymous", Some("logout")).unwrap();
        assert!(!matrix.is_allowed("anonymous", "logout"));
        assert!(matrix.is_explicitly_denied("anonymous", "logout"));
        assert!(matrix.is_allowed("anonymous", "login"));
    }

    #[test]
    fn test_own_deny_beats_inherited_allow() {
        let mut matrix = site_matrix();
        matrix.deny("member", Some("login")).unwrap();
        matrix.deny("member", Some("register")).unwrap();

        assert!(!matrix.is_allowed("member", "login"));
        assert!(!matrix.is_allowed("member", "register"));
        // moderator inherits the closer deny from member
        assert!(!matrix.is_allowed("moderator", "login"));
        // the ancestor itself is untouched
        assert!(matrix.is_allowed("anonymous", "login"));
    }

    #[test]
    fn test_exact_deny_beats_own_wildcard() {
        let mut matrix = site_matrix();
        matrix.deny("administrator", Some("login")).unwrap();
        assert!(!matrix.is_allowed("administrator", "login"));
        assert!(matrix.is_allowed("administrator", "admin"));
    }

    #[test]
    fn test_own_wildcard_stops_walk() {
        let mut matrix = site_matrix();
        matrix.deny("member", None).unwrap();
        // member's wildcard deny applies before anonymous' allow is reached
        assert!(!matrix.is_allowed("member", "default"));
        // but member's exact allow still wins at the same level
        assert!(matrix.is_allowed("member", "account"));
    }

    #[test]
    fn test_unknown_names_fail_at_installation() {
        let mut matrix = site_matrix();
        let err = matrix.allow("superadmin", Some("admin")).unwrap_err();
        assert!(matches!(err, AclError::RoleNotFound(_)));

        let err = matrix.deny("member", Some("blog")).unwrap_err();
        assert!(matches!(err, AclError::ResourceNotFound(_)));

        assert_eq!(matrix.rules().len(), 10);
    }

    #[test]
    fn test_unknown_names_at_evaluation() {
        let matrix = site_matrix();
        assert!(!matrix.is_allowed("superadmin", "admin"));
        assert!(!matrix.is_allowed("member", "blog"));
        assert!(matrix.is_allowed("administrator", "blog"));
    }

    #[test]
    fn test_rules_keep_installation_order() {
        let matrix = site_matrix();
        let first = matrix.rules().first().map(Rule::to_string);
        let last = matrix.rules().last().map(Rule::to_string);
        assert_eq!(first.as_deref(), Some("allow(anonymous, default)"));
        assert_eq!(last.as_deref(), Some("allow(administrator, *)"));
    }

    #[test]
    fn test_rule_serde() {
        let rule: Rule = serde_json::from_str(r#"{"role": "administrator", "effect": "allow"}"#)
            .unwrap();
        assert!(rule.is_wildcard());
        assert!(rule.effect.is_allow());

        let json = serde_json::to_string(&Rule::deny("member", Some("login"))).unwrap();
        assert_eq!(json, r#"{"role":"member","resource":"login","effect":"deny"}"#);
    }
}
